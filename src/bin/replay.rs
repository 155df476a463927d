//! plaza-replay binary
//!
//! Replays a recorded channel trace through the sync engine and prints one
//! JSON frame per rendered frame on stdout.  Logs go to stderr.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                              | Default | Description                         |
//! |----------------------------------|---------|-------------------------------------|
//! | `PLAZA_INTERPOLATION_DURATION_MS`| `100`   | Interpolation segment length        |
//! | `PLAZA_IDLE_TIMEOUT_MS`          | `500`   | Silence before snapping to target   |
//! | `PLAZA_DISCONNECT_TIMEOUT_MS`    | `10000` | Silence before "disconnected"       |
//! | `PLAZA_BUBBLE_DURATION_MS`       | `5000`  | Speech bubble lifetime              |
//! | `PLAZA_BUBBLE_FADE_MS`           | `500`   | Bubble fade-out window              |
//! | `PLAZA_BUBBLE_POP_MS`            | `200`   | Bubble pop-in window                |
//! | `PLAZA_MAX_PHRASE_CHARS`         | `100`   | Phrase truncation length            |

use anyhow::{Context, Result};
use clap::Parser;
use plaza_sync::{
    clock::ManualClock,
    config::SyncConfig,
    replay::{self, parse_trace, ReplayFrame, Replayer},
    store::SyncStore,
    types::LocalEntity,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "plaza-replay", about = "Replay a plaza channel trace", version)]
struct Args {
    /// JSON-lines trace file
    trace: PathBuf,

    /// Optional TOML file with sync timing overrides
    #[arg(long, env = "PLAZA_CONFIG")]
    config: Option<PathBuf>,

    /// Room the local client is in
    #[arg(long, env = "PLAZA_ROOM", default_value = "lobby")]
    room: String,

    /// Local participant id (its own echoes are ignored)
    #[arg(long, env = "PLAZA_LOCAL_ID", default_value = "observer")]
    local_id: String,

    /// Render frame rate (Hz)
    #[arg(long, env = "PLAZA_FPS", default_value_t = 60.0)]
    fps: f32,

    /// Stop after this many milliseconds of trace time
    #[arg(long)]
    end_ms: Option<f64>,

    /// Print every Nth frame (frames with notifications are always printed)
    #[arg(long, default_value_t = 1)]
    every: u64,

    /// Pace frames in wall-clock time instead of running flat out
    #[arg(long)]
    realtime: bool,
}

fn load_sync_config(path: Option<&Path>) -> Result<SyncConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let sync_config: SyncConfig = builder
        .add_source(config::Environment::with_prefix("PLAZA").try_parsing(true))
        .build()
        .context("Failed to load sync configuration")?
        .try_deserialize()
        .context("Invalid sync configuration")?;
    sync_config.validate()?;
    Ok(sync_config)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plaza_sync=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let sync_config = load_sync_config(args.config.as_deref())?;

    log::info!(
        "Starting plaza-replay (trace='{}', room='{}', fps={}, window={}ms)",
        args.trace.display(),
        args.room,
        args.fps,
        sync_config.interpolation_duration_ms,
    );

    let text = std::fs::read_to_string(&args.trace)
        .with_context(|| format!("Failed to read trace {}", args.trace.display()))?;
    let entries = parse_trace(&text)?;

    let clock = ManualClock::new(0.0);
    let mut store = SyncStore::new(
        sync_config,
        clock.clone(),
        LocalEntity::new(&args.local_id, &args.local_id),
    );
    store.enter_room(&args.room, serde_json::Value::Null);

    let mut replayer = Replayer::new(store, clock, entries, args.fps, args.end_ms);

    let pacing = args
        .realtime
        .then(|| Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1.0))));
    let every = args.every.max(1);
    let sink = move |f: &ReplayFrame| {
        if f.index % every != 0 && f.events.is_empty() {
            return;
        }
        match serde_json::to_string(f) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("Failed to encode frame {}: {}", f.index, e),
        }
    };

    tokio::select! {
        stats = replay::run(&mut replayer, pacing, sink) => {
            log::info!(
                "Replay finished: {} frames, {} applied, {} dropped, {} malformed",
                stats.frames, stats.applied, stats.dropped, stats.malformed,
            );
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted");
        }
    }

    log::info!("{} remote entities at end of replay", replayer.store().remote_count());
    Ok(())
}
