//! SyncStore integration tests

#[cfg(test)]
mod tests {
    use plaza_sync::{
        bubble::BubblePhase,
        clock::ManualClock,
        config::SyncConfig,
        entity::Waypoint,
        liveness::Liveness,
        store::{StoreEvent, SyncStore},
        types::{Facing, LocalEntity, Vec2},
    };
    use std::sync::{Arc, Mutex};

    const EPS: f32 = 1e-4;

    fn make_store() -> (SyncStore<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0.0);
        let mut store = SyncStore::new(
            SyncConfig::default(),
            clock.clone(),
            LocalEntity::new("me", "Me"),
        );
        store.enter_room("lobby", serde_json::Value::Null);
        (store, clock)
    }

    fn record_events(store: &mut SyncStore<ManualClock>) -> Arc<Mutex<Vec<StoreEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        seen
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn first_waypoint_creates_resting_record() {
        let (mut s, _) = make_store();
        assert!(s.apply_waypoint("lobby", "u1", &Waypoint::at(3.0, 4.0)));

        let e = s.remote("u1").unwrap();
        assert_eq!(e.prev(), e.target());
        assert_eq!(e.position(), Vec2::new(3.0, 4.0));
        assert_eq!(e.progress(), 1.0);
        assert!(!e.is_moving());
    }

    #[test]
    fn waypoint_for_other_room_is_dropped() {
        let (mut s, _) = make_store();
        assert!(!s.apply_waypoint("garden", "u1", &Waypoint::at(1.0, 1.0)));
        assert_eq!(s.remote_count(), 0);
    }

    #[test]
    fn leave_removes_record_and_bubble() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.add_bubble("u1", "bye");
        let seen = record_events(&mut s);

        assert!(s.remove_entity("u1"));
        assert!(s.remote("u1").is_none());
        assert!(s.bubble("u1").is_none());

        // No late expiry for a departed owner.
        clock.set(6_000.0);
        s.tick(0.016);
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![StoreEvent::EntityLeft {
                participant_id: "u1".into()
            }]
        );
    }

    #[test]
    fn unknown_ids_are_noops() {
        let (mut s, _) = make_store();
        assert!(!s.remove_entity("ghost"));
        assert!(!s.remove_bubble("ghost"));
        assert!(!s.add_bubble("ghost", "boo"));
        s.advance_entity("ghost", 0.016);
        assert!(s.liveness("ghost").is_none());
        assert!(!s.is_idle("ghost"));
        assert!(!s.is_disconnected("ghost"));
    }

    #[test]
    fn disconnect_does_not_remove() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        clock.set(60_000.0);
        s.tick(0.016);
        assert!(s.is_disconnected("u1"));
        assert_eq!(s.remote_count(), 1);
    }

    #[test]
    fn room_change_clears_remotes() {
        let (mut s, _) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.add_bubble("u1", "hello");
        s.enter_room("garden", serde_json::json!({ "name": "Garden" }));
        assert_eq!(s.remote_count(), 0);
        assert!(s.bubble("u1").is_none());
        assert_eq!(s.room_id(), Some("garden"));
        assert_eq!(s.room().unwrap().metadata["name"], "Garden");
    }

    // -----------------------------------------------------------------------
    // Interpolation properties
    // -----------------------------------------------------------------------

    #[test]
    fn progress_converges_within_window_without_new_updates() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.apply_waypoint("lobby", "u1", &Waypoint::at(5.0, 5.0));

        let mut last = s.remote("u1").unwrap().progress();
        for _ in 0..10 {
            clock.advance(10.0);
            s.tick(0.01);
            let p = s.remote("u1").unwrap().progress();
            assert!(p >= last);
            last = p;
        }
        assert!((last - 1.0).abs() < EPS);
    }

    #[test]
    fn update_mid_segment_has_no_discontinuity() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.apply_waypoint("lobby", "u1", &Waypoint::at(10.0, 0.0));
        clock.advance(40.0);
        s.tick(0.04);

        let before = s.remote("u1").unwrap().clone();
        assert!(before.progress() > 0.0 && before.progress() < 1.0);

        s.apply_waypoint("lobby", "u1", &Waypoint::at(20.0, 0.0));
        let after = s.remote("u1").unwrap();
        assert!((after.prev().x - before.position().x).abs() < EPS);
        assert!((after.prev().y - before.position().y).abs() < EPS);
        assert!((after.position().x - before.position().x).abs() < EPS);
    }

    #[test]
    fn out_of_order_sample_is_ignored() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0).sent_at(100.0));
        clock.advance(100.0);
        s.apply_waypoint("lobby", "u1", &Waypoint::at(10.0, 0.0).sent_at(300.0));
        clock.advance(10.0);
        assert!(!s.apply_waypoint("lobby", "u1", &Waypoint::at(5.0, 0.0).sent_at(200.0)));

        let e = s.remote("u1").unwrap();
        assert_eq!(e.target(), Vec2::new(10.0, 0.0));
        assert_eq!(e.last_update_ms(), 100.0);
    }

    #[test]
    fn idle_entity_snaps_to_target() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.apply_waypoint("lobby", "u1", &Waypoint::at(7.0, -3.0));
        clock.advance(20.0);
        s.tick(0.02);

        clock.set(600.0);
        s.tick(0.016);
        let e = s.remote("u1").unwrap();
        assert_eq!(e.position(), Vec2::new(7.0, -3.0));
        assert!(!e.is_moving());
        assert!(s.is_idle("u1"));
        assert!(!s.is_disconnected("u1"));
    }

    #[test]
    fn long_silence_reports_disconnected() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.apply_waypoint("lobby", "u1", &Waypoint::at(1.0, 0.0));
        assert!(s.remote("u1").unwrap().is_moving());

        clock.set(11_000.0);
        assert!(s.is_disconnected("u1"));
        s.tick(0.016);
        assert!(s.is_disconnected("u1"));
        assert!(!s.remote("u1").unwrap().is_moving());
    }

    #[test]
    fn end_to_end_walk_then_idle() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.apply_waypoint("lobby", "u1", &Waypoint::at(10.0, 0.0).facing(Facing::Right));

        for _ in 0..6 {
            clock.advance(50.0);
            s.tick(0.05);
        }
        let e = s.remote("u1").unwrap();
        assert_eq!(e.position(), Vec2::new(10.0, 0.0));
        assert_eq!(e.facing(), Facing::Right);

        clock.set(501.0);
        s.tick(0.05);
        let e = s.remote("u1").unwrap();
        assert_eq!(e.position(), Vec2::new(10.0, 0.0));
        assert!(!e.is_moving());
        assert!(s.is_idle("u1"));
    }

    #[test]
    fn liveness_transitions_are_reported_once() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        let seen = record_events(&mut s);

        clock.set(600.0);
        let events = s.tick(0.016);
        assert_eq!(
            events,
            vec![StoreEvent::LivenessChanged {
                participant_id: "u1".into(),
                from: Liveness::Active,
                to: Liveness::Idle,
            }]
        );
        clock.set(700.0);
        assert!(s.tick(0.016).is_empty());

        clock.set(10_700.0);
        s.tick(0.016);
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(s.remote("u1").unwrap().liveness(), Liveness::Disconnected);
    }

    #[test]
    fn liveness_thresholds_shared_with_advance_step() {
        let cfg = SyncConfig {
            idle_timeout_ms: 200.0,
            disconnect_timeout_ms: 1_000.0,
            ..Default::default()
        };
        let clock = ManualClock::new(0.0);
        let mut s = SyncStore::new(cfg, clock.clone(), LocalEntity::new("me", "Me"));
        s.enter_room("lobby", serde_json::Value::Null);
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        s.apply_waypoint("lobby", "u1", &Waypoint::at(1.0, 0.0));

        for now in [150.0, 201.0, 999.0, 1_001.0] {
            clock.set(now);
            s.tick(0.016);
            assert_eq!(
                s.remote("u1").unwrap().liveness(),
                s.liveness("u1").unwrap(),
                "disagreement at {now} ms"
            );
        }
    }

    #[test]
    fn fresh_waypoint_after_idle_reports_active() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));

        clock.set(600.0);
        s.tick(0.016);
        assert!(s.is_idle("u1"));

        clock.set(610.0);
        assert!(s.apply_waypoint("lobby", "u1", &Waypoint::at(3.0, 0.0)));
        clock.set(626.0);
        assert_eq!(
            s.tick(0.016),
            vec![StoreEvent::LivenessChanged {
                participant_id: "u1".into(),
                from: Liveness::Idle,
                to: Liveness::Active,
            }]
        );
        assert!(s.remote("u1").unwrap().is_moving());
    }

    #[test]
    fn reconnect_after_disconnect_reports_active() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        let seen = record_events(&mut s);

        clock.set(11_000.0);
        assert_eq!(
            s.tick(0.016),
            vec![StoreEvent::LivenessChanged {
                participant_id: "u1".into(),
                from: Liveness::Active,
                to: Liveness::Disconnected,
            }]
        );

        clock.set(11_010.0);
        s.apply_waypoint("lobby", "u1", &Waypoint::at(5.0, 0.0));
        clock.set(11_026.0);
        let back = StoreEvent::LivenessChanged {
            participant_id: "u1".into(),
            from: Liveness::Disconnected,
            to: Liveness::Active,
        };
        assert_eq!(s.tick(0.016), vec![back.clone()]);
        assert_eq!(seen.lock().unwrap().last(), Some(&back));
        assert!(!s.is_disconnected("u1"));
    }

    #[test]
    fn advance_entity_reports_transition_once() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        let seen = record_events(&mut s);

        clock.set(600.0);
        let idle = StoreEvent::LivenessChanged {
            participant_id: "u1".into(),
            from: Liveness::Active,
            to: Liveness::Idle,
        };
        assert_eq!(s.advance_entity("u1", 0.016), Some(idle.clone()));
        assert!(s.tick(0.016).is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![idle]);
    }

    #[test]
    fn tick_events_are_ordered_by_id() {
        let (mut s, clock) = make_store();
        let ids = ["u5", "u2", "u9", "u1", "u7", "u3"];
        for id in ids {
            s.apply_waypoint("lobby", id, &Waypoint::at(0.0, 0.0));
            s.add_bubble(id, "hi");
        }

        clock.set(6_000.0);
        let events = s.tick(0.016);

        let mut sorted = ids.to_vec();
        sorted.sort();
        let liveness: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StoreEvent::LivenessChanged { participant_id, .. } => Some(participant_id.as_str()),
                _ => None,
            })
            .collect();
        let expired: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StoreEvent::BubbleExpired { owner_id } => Some(owner_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(liveness, sorted);
        assert_eq!(expired, sorted);
        assert!(matches!(events[0], StoreEvent::LivenessChanged { .. }));
    }

    // -----------------------------------------------------------------------
    // Bubbles
    // -----------------------------------------------------------------------

    #[test]
    fn bubble_phases_and_expiry() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        assert!(s.add_bubble("u1", "hi"));

        clock.set(4_400.0);
        s.tick(0.016);
        assert_eq!(s.bubble_view("u1").unwrap().phase, BubblePhase::Visible);

        clock.set(4_600.0);
        s.tick(0.016);
        let v = s.bubble_view("u1").unwrap();
        assert_eq!(v.phase, BubblePhase::Fading);
        assert!(v.opacity > 0.0 && v.opacity < 1.0);

        clock.set(5_000.0);
        let events = s.tick(0.016);
        assert!(events.contains(&StoreEvent::BubbleExpired {
            owner_id: "u1".into()
        }));
        assert!(s.bubble("u1").is_none());
        assert!(s.frame().remotes[0].bubble.is_none());
    }

    #[test]
    fn replacing_bubble_restarts_timer_without_old_expiry() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        let seen = record_events(&mut s);

        s.add_bubble("u1", "first");
        clock.set(3_000.0);
        s.add_bubble("u1", "second");

        clock.set(5_000.0);
        s.tick(0.016);
        let v = s.bubble_view("u1").unwrap();
        assert_eq!(v.text, "second");

        clock.set(8_000.0);
        s.tick(0.016);
        clock.set(9_000.0);
        s.tick(0.016);

        let expiries = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, StoreEvent::BubbleExpired { .. }))
            .count();
        assert_eq!(expiries, 1);
    }

    #[test]
    fn phrases_are_truncated() {
        let (mut s, _) = make_store();
        let long = "x".repeat(500);
        assert!(s.say(&long));
        assert_eq!(s.bubble("me").unwrap().phrase.chars().count(), 100);
        assert!(!s.say("   "));
    }

    #[test]
    fn local_bubble_appears_in_frame() {
        let (mut s, clock) = make_store();
        s.set_local(Vec2::new(2.0, 3.0), Facing::Left, true);
        s.say("hello plaza");
        clock.set(1_000.0);

        let f = s.frame();
        assert_eq!(f.local.x, 2.0);
        assert_eq!(f.local.facing, Facing::Left);
        assert_eq!(f.local.bubble.unwrap().text, "hello plaza");
        assert_eq!(f.room_id.as_deref(), Some("lobby"));
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    #[test]
    fn frame_lists_remotes_sorted_with_flags() {
        let (mut s, clock) = make_store();
        s.apply_waypoint("lobby", "zed", &Waypoint::at(1.0, 0.0));
        clock.set(400.0);
        s.apply_waypoint("lobby", "amy", &Waypoint::at(2.0, 0.0));
        clock.set(700.0);
        s.tick(0.016);

        let f = s.frame();
        let ids: Vec<_> = f.remotes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["amy", "zed"]);
        assert!(!f.remotes[0].is_idle);
        assert!(f.remotes[1].is_idle);

        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["remotes"][1]["facing"], "down");
    }
}
