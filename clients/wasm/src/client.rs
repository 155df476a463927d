//! `PlazaClient`: the primary wasm-bindgen export.
//!
//! ## JavaScript usage
//!
//! ```js
//! import init, { PlazaClient } from './pkg/plaza_sync_wasm.js';
//!
//! await init();
//!
//! const plaza = new PlazaClient('me', 'Ada');
//! plaza.enterRoom('lobby');
//!
//! plaza.onParticipantAnnounced((id) => showJoinToast(id));
//! plaza.onEntityLeft((id) => removeSprite(id));
//! plaza.onBubbleExpired((id) => hideBubble(id));
//!
//! channel.on('message', (subject, json) => plaza.ingest(subject, json));
//!
//! // In your render loop:
//! let last = performance.now();
//! function frame(t) {
//!   plaza.tick((t - last) / 1000);
//!   last = t;
//!   draw(JSON.parse(plaza.frameJson()));
//!   requestAnimationFrame(frame);
//! }
//! requestAnimationFrame(frame);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use plaza_sync::config::SyncConfig;
use plaza_sync::protocol::parse_event;
use plaza_sync::store::{StoreEvent, SyncStore};
use plaza_sync::types::{Facing, LocalEntity, Vec2};

use crate::clock::PerformanceClock;

// ---------------------------------------------------------------------------
// PlazaClient
// ---------------------------------------------------------------------------

/// Primary Wasm API object.
///
/// Instantiate with `new PlazaClient(localId, localName, configJson?)`.
/// Feed channel messages with `ingest()`, call `tick()` each animation frame.
#[wasm_bindgen]
pub struct PlazaClient {
    store: SyncStore<PerformanceClock>,
    /// Store notifications waiting to be delivered to JS callbacks.
    pending: Rc<RefCell<VecDeque<StoreEvent>>>,

    // JS callback storage (Option<js_sys::Function>)
    on_entity_joined: Option<js_sys::Function>,
    on_participant_announced: Option<js_sys::Function>,
    on_entity_left: Option<js_sys::Function>,
    on_liveness_changed: Option<js_sys::Function>,
    on_bubble_started: Option<js_sys::Function>,
    on_bubble_expired: Option<js_sys::Function>,
}

#[wasm_bindgen]
impl PlazaClient {
    // -----------------------------------------------------------------------
    // Constructor
    // -----------------------------------------------------------------------

    /// Create a new client.
    ///
    /// @param localId    - Participant id of this browser's avatar
    /// @param localName  - Display name of this browser's avatar
    /// @param configJson - Optional JSON object overriding timing constants
    #[wasm_bindgen(constructor)]
    pub fn new(
        local_id: &str,
        local_name: &str,
        config_json: Option<String>,
    ) -> Result<PlazaClient, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str::<SyncConfig>(&json)
                .map_err(|e| JsValue::from_str(&format!("invalid config: {e}")))?,
            None => SyncConfig::default(),
        };
        config
            .validate()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let mut store = SyncStore::new(
            config,
            PerformanceClock,
            LocalEntity::new(local_id, local_name),
        );

        // Single-threaded: Rc<RefCell> is enough for the listener closure.
        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&pending);
        store.subscribe(move |event| sink.borrow_mut().push_back(event.clone()));

        Ok(Self {
            store,
            pending,
            on_entity_joined: None,
            on_participant_announced: None,
            on_entity_left: None,
            on_liveness_changed: None,
            on_bubble_started: None,
            on_bubble_expired: None,
        })
    }

    // -----------------------------------------------------------------------
    // Channel input
    // -----------------------------------------------------------------------

    /// Switch to `roomId`, forgetting every avatar from the previous room.
    #[wasm_bindgen(js_name = enterRoom)]
    pub fn enter_room(&mut self, room_id: &str) {
        self.store.enter_room(room_id, serde_json::Value::Null);
        self.flush();
    }

    /// Apply one raw channel message.  Returns `false` if it was rejected.
    #[wasm_bindgen]
    pub fn ingest(&mut self, subject: &str, payload: &str) -> bool {
        let applied = match parse_event(subject, payload.as_bytes()) {
            Ok(event) => self.store.apply_event(event),
            Err(e) => {
                log::warn!("[client] Rejected {} message: {}", subject, e);
                false
            }
        };
        self.flush();
        applied
    }

    // -----------------------------------------------------------------------
    // tick(): must be called each animation frame
    // -----------------------------------------------------------------------

    /// Advance every remote avatar by `dtSec` seconds and fire callbacks.
    #[wasm_bindgen]
    pub fn tick(&mut self, dt_sec: f32) {
        self.store.tick(dt_sec);
        self.flush();
    }

    // -----------------------------------------------------------------------
    // Local avatar
    // -----------------------------------------------------------------------

    /// `facing` is `"up"` | `"down"` | `"left"` | `"right"`; anything else keeps the current facing.
    #[wasm_bindgen(js_name = setLocal)]
    pub fn set_local(&mut self, x: f32, y: f32, facing: &str, is_moving: bool) {
        let facing = facing
            .parse::<Facing>()
            .unwrap_or(self.store.local().facing);
        self.store.set_local(Vec2::new(x, y), facing, is_moving);
    }

    /// Show a bubble over the local avatar.
    #[wasm_bindgen]
    pub fn say(&mut self, phrase: &str) -> bool {
        let shown = self.store.say(phrase);
        self.flush();
        shown
    }

    #[wasm_bindgen(js_name = setChatFocused)]
    pub fn set_chat_focused(&mut self, focused: bool) {
        self.store.ui_mut().chat_focused = focused;
    }

    #[wasm_bindgen(js_name = isChatFocused)]
    pub fn is_chat_focused(&self) -> bool {
        self.store.ui().chat_focused
    }

    // -----------------------------------------------------------------------
    // Callback registration
    // -----------------------------------------------------------------------

    /// `callback(participantId: string)`
    #[wasm_bindgen(js_name = onEntityJoined)]
    pub fn on_entity_joined(&mut self, cb: js_sys::Function) {
        self.on_entity_joined = Some(cb);
    }

    /// `callback(participantId: string)`: presence join with no position yet.
    #[wasm_bindgen(js_name = onParticipantAnnounced)]
    pub fn on_participant_announced(&mut self, cb: js_sys::Function) {
        self.on_participant_announced = Some(cb);
    }

    /// `callback(participantId: string)`
    #[wasm_bindgen(js_name = onEntityLeft)]
    pub fn on_entity_left(&mut self, cb: js_sys::Function) {
        self.on_entity_left = Some(cb);
    }

    /// `callback(participantId: string, from: string, to: string)`: `"active"` | `"idle"` | `"disconnected"`
    #[wasm_bindgen(js_name = onLivenessChanged)]
    pub fn on_liveness_changed(&mut self, cb: js_sys::Function) {
        self.on_liveness_changed = Some(cb);
    }

    /// `callback(ownerId: string)`
    #[wasm_bindgen(js_name = onBubbleStarted)]
    pub fn on_bubble_started(&mut self, cb: js_sys::Function) {
        self.on_bubble_started = Some(cb);
    }

    /// `callback(ownerId: string)`: once per bubble that ran its full course.
    #[wasm_bindgen(js_name = onBubbleExpired)]
    pub fn on_bubble_expired(&mut self, cb: js_sys::Function) {
        self.on_bubble_expired = Some(cb);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Number of tracked remote avatars.
    #[wasm_bindgen(js_name = remoteCount)]
    pub fn remote_count(&self) -> u32 {
        self.store.remote_count() as u32
    }

    /// Visual position `[x, y]` for this frame, or `null` if unknown.
    #[wasm_bindgen(js_name = entityPosition)]
    pub fn entity_position(&self, participant_id: &str) -> Option<Vec<f32>> {
        self.store.remote(participant_id).map(|e| {
            let p = e.position();
            vec![p.x, p.y]
        })
    }

    #[wasm_bindgen(js_name = entityFacing)]
    pub fn entity_facing(&self, participant_id: &str) -> Option<String> {
        self.store
            .remote(participant_id)
            .map(|e| e.facing().as_str().to_string())
    }

    #[wasm_bindgen(js_name = isMoving)]
    pub fn is_moving(&self, participant_id: &str) -> bool {
        self.store
            .remote(participant_id)
            .is_some_and(|e| e.is_moving())
    }

    #[wasm_bindgen(js_name = isIdle)]
    pub fn is_idle(&self, participant_id: &str) -> bool {
        self.store.is_idle(participant_id)
    }

    #[wasm_bindgen(js_name = isDisconnected)]
    pub fn is_disconnected(&self, participant_id: &str) -> bool {
        self.store.is_disconnected(participant_id)
    }

    /// Current bubble text for `ownerId`, or `null`.
    #[wasm_bindgen(js_name = bubbleText)]
    pub fn bubble_text(&self, owner_id: &str) -> Option<String> {
        self.store.bubble_view(owner_id).map(|v| v.text)
    }

    /// `[opacity, scale]` for the bubble over `ownerId`, or `null`.
    #[wasm_bindgen(js_name = bubbleStyle)]
    pub fn bubble_style(&self, owner_id: &str) -> Option<Vec<f32>> {
        self.store
            .bubble_view(owner_id)
            .map(|v| vec![v.opacity, v.scale])
    }

    /// The whole frame (local + remotes + bubbles) as a JSON string.
    #[wasm_bindgen(js_name = frameJson)]
    pub fn frame_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.store.frame()).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

impl PlazaClient {
    /// Deliver queued store notifications to the registered JS callbacks.
    fn flush(&mut self) {
        let events: Vec<StoreEvent> = self.pending.borrow_mut().drain(..).collect();

        for event in events {
            match event {
                StoreEvent::EntityJoined { participant_id } => {
                    call_fn(&self.on_entity_joined, &[JsValue::from_str(&participant_id)]);
                }
                StoreEvent::ParticipantAnnounced { participant_id } => {
                    call_fn(
                        &self.on_participant_announced,
                        &[JsValue::from_str(&participant_id)],
                    );
                }
                StoreEvent::EntityLeft { participant_id } => {
                    call_fn(&self.on_entity_left, &[JsValue::from_str(&participant_id)]);
                }
                StoreEvent::LivenessChanged {
                    participant_id,
                    from,
                    to,
                } => {
                    call_fn(
                        &self.on_liveness_changed,
                        &[
                            JsValue::from_str(&participant_id),
                            JsValue::from_str(liveness_str(from)),
                            JsValue::from_str(liveness_str(to)),
                        ],
                    );
                }
                StoreEvent::BubbleStarted { owner_id } => {
                    call_fn(&self.on_bubble_started, &[JsValue::from_str(&owner_id)]);
                }
                StoreEvent::BubbleExpired { owner_id } => {
                    call_fn(&self.on_bubble_expired, &[JsValue::from_str(&owner_id)]);
                }
                StoreEvent::RoomChanged { room_id } => {
                    log::info!("[client] Entered room {}", room_id);
                }
            }
        }
    }
}

fn liveness_str(l: plaza_sync::liveness::Liveness) -> &'static str {
    use plaza_sync::liveness::Liveness;
    match l {
        Liveness::Active => "active",
        Liveness::Idle => "idle",
        Liveness::Disconnected => "disconnected",
    }
}

// ---------------------------------------------------------------------------
// JS callback helper
// ---------------------------------------------------------------------------

fn call_fn(f: &Option<js_sys::Function>, args: &[JsValue]) {
    if let Some(func) = f {
        let this = JsValue::NULL;
        let arr = js_sys::Array::new();
        for a in args {
            arr.push(a);
        }
        if let Err(e) = func.apply(&this, &arr) {
            log::warn!("[client] Callback error: {:?}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
