//! Unit tests for er-tracker.
//!
//! Async tests run on a paused clock (`start_paused = true`): the runtime
//! auto-advances time whenever every task is idle, so tick timing is exact.

#[cfg(test)]
mod helpers {
    use er_core::GeoPoint;

    /// Three points on the equator, 0.01° apart (about 1.11 km each).
    pub fn straight_route() -> Vec<GeoPoint> {
        vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01), GeoPoint::new(0.0, 0.02)]
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use std::time::Duration;

    use crate::{TrackerConfig, TrackerError};

    #[test]
    fn default_is_valid() {
        let cfg = TrackerConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn duration_scales_and_clamps() {
        let cfg = TrackerConfig { speedup: 2.0, ..TrackerConfig::default() };
        // 12 minutes at 2× → 360 s.
        assert_eq!(cfg.trip_duration(12.0), Duration::from_secs(360));
        // Zero weight is lifted to the minimum.
        assert_eq!(cfg.trip_duration(0.0), Duration::from_secs(1));
        // Enormous weight is capped.
        assert_eq!(cfg.trip_duration(1e9), Duration::from_secs(3_600));
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            TrackerConfig { tick_interval_secs: 0.0, ..TrackerConfig::default() },
            TrackerConfig { speedup: -1.0, ..TrackerConfig::default() },
            TrackerConfig { seconds_per_weight_unit: f64::NAN, ..TrackerConfig::default() },
            TrackerConfig { min_duration_secs: 10.0, max_duration_secs: 5.0, ..TrackerConfig::default() },
            TrackerConfig { channel_capacity: 0, ..TrackerConfig::default() },
        ];
        for cfg in cases {
            assert!(matches!(cfg.validate(), Err(TrackerError::InvalidConfig(_))), "{cfg:?}");
        }
    }
}

// ── Route interpolation ───────────────────────────────────────────────────────

#[cfg(test)]
mod route {
    use er_core::GeoPoint;
    use crate::RoutePath;
    use super::helpers::straight_route;

    fn close(a: GeoPoint, b: GeoPoint) -> bool {
        (a.lat - b.lat).abs() < 1e-9 && (a.lon - b.lon).abs() < 1e-9
    }

    #[test]
    fn empty_route_rejected() {
        assert!(RoutePath::new(vec![]).is_none());
    }

    #[test]
    fn endpoints_and_midpoint() {
        let r = RoutePath::new(straight_route()).unwrap();
        assert!(close(r.position_at(0.0), GeoPoint::new(0.0, 0.0)));
        assert!(close(r.position_at(1.0), GeoPoint::new(0.0, 0.02)));
        assert!(close(r.position_at(0.5), GeoPoint::new(0.0, 0.01)));
        assert!(close(r.position_at(0.25), GeoPoint::new(0.0, 0.005)));
        // Out-of-range progress is clamped.
        assert!(close(r.position_at(7.0), r.end()));
    }

    #[test]
    fn progress_follows_distance_not_node_count() {
        // First segment is three times longer than the second.
        let r = RoutePath::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.03),
            GeoPoint::new(0.0, 0.04),
        ])
        .unwrap();
        // Halfway by length is inside the first segment, not at node 1.
        let mid = r.position_at(0.5);
        assert!((mid.lon - 0.02).abs() < 1e-6, "{mid}");
    }

    #[test]
    fn zero_length_falls_back_to_equal_segments() {
        let p = GeoPoint::new(10.0, 10.0);
        let r = RoutePath::new(vec![p, p, p]).unwrap();
        assert_eq!(r.length_km(), 0.0);
        assert!(close(r.position_at(0.3), p));
    }

    #[test]
    fn single_point_holds_position() {
        let p = GeoPoint::new(24.86, 67.02);
        let r = RoutePath::new(vec![p]).unwrap();
        assert_eq!(r.position_at(0.0), p);
        assert_eq!(r.position_at(0.9), p);
    }
}

// ── Live tracking ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod live {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use er_core::{GeoPoint, RequestId};
    use crate::{
        LiveTracker, TrackerConfig, TrackerError, TrackerObserver, TrackingEvent, TrackingStatus,
    };
    use super::helpers::straight_route;

    /// 0.05 weight units × 60 s = a 3-second trip.
    const WEIGHT: f64 = 0.05;

    fn tracker() -> LiveTracker {
        LiveTracker::new(TrackerConfig::default()).unwrap()
    }

    async fn drain(mut sub: crate::Subscription) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        while let Some(e) = sub.next().await {
            events.push(e);
        }
        events
    }

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    impl TrackerObserver for Recorder {
        fn on_started(&self, r: RequestId, d: Duration) {
            self.log.lock().unwrap().push(format!("started {r} {}", d.as_secs()));
        }
        fn on_completed(&self, r: RequestId) {
            self.log.lock().unwrap().push(format!("completed {r}"));
        }
        fn on_cancelled(&self, r: RequestId) {
            self.log.lock().unwrap().push(format!("cancelled {r}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_monotonic_and_ends_with_one_completion() {
        let t = tracker();
        let d = t.start(RequestId(1), straight_route(), WEIGHT).unwrap();
        assert_eq!(d, Duration::from_secs(3));

        let events = drain(t.subscribe(RequestId(1)).unwrap()).await;
        assert!(events.len() >= 4, "{events:?}");
        for pair in events.windows(2) {
            assert!(pair[1].progress >= pair[0].progress);
            assert!(pair[1].eta_seconds <= pair[0].eta_seconds);
        }
        let completed: Vec<_> = events.iter().filter(|e| e.is_completed()).collect();
        assert_eq!(completed.len(), 1);
        let last = events.last().unwrap();
        assert_eq!(last.status, TrackingStatus::Completed);
        assert_eq!(last.progress, 1.0);
        assert_eq!(last.eta_seconds, 0);
        assert_eq!(last.current_location, GeoPoint::new(0.0, 0.02));
        assert!(events[..events.len() - 1].iter().all(|e| e.progress < 1.0));

        tokio::task::yield_now().await;
        assert!(!t.is_tracking(RequestId(1)));
        assert_eq!(t.subscribe(RequestId(1)).err(), Some(TrackerError::NotTracking(RequestId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn late_subscriber_sees_elapsed_progress() {
        let t = tracker();
        t.start(RequestId(2), straight_route(), WEIGHT).unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let mut sub = t.subscribe(RequestId(2)).unwrap();
        let first = sub.next().await.unwrap();
        assert_eq!(first.status, TrackingStatus::EnRoute);
        assert!((first.progress - 0.5).abs() < 1e-6, "{first:?}");
        assert_eq!(first.eta_seconds, 2); // 1.5 s remaining, rounded up
        // Halfway by length is the middle node.
        assert!((first.current_location.lon - 0.01).abs() < 1e-9);

        let rest = drain(sub).await;
        assert!(rest.iter().all(|e| e.progress >= first.progress));
        assert!(rest.last().unwrap().is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_identical_live_sequences() {
        let t = tracker();
        t.start(RequestId(3), straight_route(), WEIGHT).unwrap();
        let a = t.subscribe(RequestId(3)).unwrap();
        let b = t.subscribe(RequestId(3)).unwrap();
        let (ea, eb) = tokio::join!(drain(a), drain(b));
        assert_eq!(ea, eb);
    }

    #[tokio::test(start_paused = true)]
    async fn single_node_route_completes_immediately() {
        let t = tracker();
        let p = GeoPoint::new(24.86, 67.02);
        assert_eq!(t.start(RequestId(4), vec![p], 0.0).unwrap(), Duration::ZERO);
        let events = drain(t.subscribe(RequestId(4)).unwrap()).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_completed());
        assert_eq!(events[0].current_location, p);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_closes_feed_without_completion() {
        let recorder = Arc::new(Recorder::default());
        let t = LiveTracker::with_observer(TrackerConfig::default(), recorder.clone()).unwrap();
        t.start(RequestId(5), straight_route(), WEIGHT).unwrap();
        let sub = t.subscribe(RequestId(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        t.cancel(RequestId(5)).unwrap();

        let events = drain(sub).await;
        assert!(events.iter().all(|e| !e.is_completed()));
        assert!(!t.is_tracking(RequestId(5)));
        assert!(matches!(t.subscribe(RequestId(5)), Err(TrackerError::NotTracking(_))));
        assert_eq!(t.cancel(RequestId(5)), Err(TrackerError::NotTracking(RequestId(5))));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(log, vec!["started 5 3".to_string(), "cancelled 5".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_completion() {
        let recorder = Arc::new(Recorder::default());
        let t = LiveTracker::with_observer(TrackerConfig::default(), recorder.clone()).unwrap();
        t.start(RequestId(6), straight_route(), WEIGHT).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(log, vec!["started 6 3".to_string(), "completed 6".to_string()]);
        assert_eq!(t.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_is_recorded_before_the_terminal_event() {
        let recorder = Arc::new(Recorder::default());
        let t = LiveTracker::with_observer(TrackerConfig::default(), recorder.clone()).unwrap();
        t.start(RequestId(8), straight_route(), WEIGHT).unwrap();

        let mut sub = t.subscribe(RequestId(8)).unwrap();
        while let Some(e) = sub.next().await {
            let log = recorder.log.lock().unwrap().clone();
            if e.is_completed() {
                assert_eq!(log.last().map(String::as_str), Some("completed 8"));
                assert!(!t.is_tracking(RequestId(8)));
                assert_eq!(t.cancel(RequestId(8)), Err(TrackerError::NotTracking(RequestId(8))));
            } else {
                assert!(!log.iter().any(|l| l.starts_with("completed")), "{log:?}");
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completion_and_cancel_never_both_fire() {
        let recorder = Arc::new(Recorder::default());
        let config = TrackerConfig {
            tick_interval_secs: 0.001,
            min_duration_secs: 0.0,
            max_duration_secs: 0.003,
            ..TrackerConfig::default()
        };
        let t = LiveTracker::with_observer(config, recorder.clone()).unwrap();

        for i in 0..200u64 {
            let id = RequestId(100 + i);
            t.start(id, straight_route(), WEIGHT).unwrap();
            // Cancel somewhere between the first tick and a little past the end.
            tokio::time::sleep(Duration::from_micros(i * 20)).await;
            let cancelled = t.cancel(id).is_ok();

            // Whichever side lost must not report its own ending.
            tokio::time::sleep(Duration::from_millis(10)).await;
            let log = recorder.log.lock().unwrap().clone();
            let (done, gone) = (format!("completed {id}"), format!("cancelled {id}"));
            let ends: Vec<&String> = log.iter().filter(|l| **l == done || **l == gone).collect();
            assert_eq!(ends.len(), 1, "{log:?}");
            assert_eq!(*ends[0] == gone, cancelled);
        }
        assert_eq!(t.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_rejected_until_finished() {
        let t = tracker();
        t.start(RequestId(7), straight_route(), WEIGHT).unwrap();
        assert_eq!(
            t.start(RequestId(7), straight_route(), WEIGHT),
            Err(TrackerError::AlreadyTracking(RequestId(7)))
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(t.start(RequestId(7), straight_route(), WEIGHT).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_routes_rejected() {
        let t = tracker();
        assert_eq!(t.start(RequestId(8), vec![], 1.0), Err(TrackerError::EmptyRoute(RequestId(8))));
        assert!(matches!(
            t.start(RequestId(8), straight_route(), f64::NAN),
            Err(TrackerError::InvalidWeight { .. })
        ));
        assert_eq!(t.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_without_subscribing() {
        let t = tracker();
        assert!(t.snapshot(RequestId(9)).is_none());
        t.start(RequestId(9), straight_route(), WEIGHT).unwrap();
        tokio::time::sleep(Duration::from_millis(750)).await;
        let s = t.snapshot(RequestId(9)).unwrap();
        assert!((s.progress - 0.25).abs() < 1e-6);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let t = tracker();
        assert_eq!(
            t.start(RequestId(10), straight_route(), WEIGHT),
            Err(TrackerError::NoRuntime)
        );
    }

    #[test]
    fn event_serializes_snake_case_status() {
        let e = TrackingEvent {
            request:          RequestId(1),
            status:           TrackingStatus::EnRoute,
            current_location: GeoPoint::new(1.0, 2.0),
            eta_seconds:      30,
            progress:         0.5,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["status"], "en_route");
        assert_eq!(json["current_location"]["lat"], 1.0);
    }
}
