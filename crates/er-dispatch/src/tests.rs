//! Unit tests for er-dispatch.

#[cfg(test)]
mod helpers {
    use er_core::{CityId, EdgeId, GeoPoint, NodeId, Timestamp};
    use er_graph::{CityRecords, EdgeRecord, MemorySource, Node, NodeKind, Roadblock, TrafficUpdate};
    use er_tracker::TrackerConfig;

    use crate::{DispatchConfig, Dispatcher};

    pub const T: Timestamp = Timestamp(1_700_000_000);

    /// Traffic on 7→8 and a closure on 7→9.
    pub const SCENARIO: CityId = CityId(1);
    /// Every road into either hospital closed.
    pub const CUT_OFF: CityId = CityId(2);
    /// Two intersections and no hospital.
    pub const NO_HOSPITALS: CityId = CityId(3);

    /// Where node 7 sits; patients here snap to it.
    pub const AT_7: GeoPoint = GeoPoint { lat: 24.860, lon: 67.000 };

    /// The seven-node city plus a second hospital, 14, behind node 8.
    ///
    /// | Edge | Route    | Base |
    /// |------|----------|------|
    /// | 1    | 7 → 8    | 5    |
    /// | 2    | 8 → 13   | 5    |
    /// | 3    | 7 → 9    | 1    |
    /// | 4    | 9 → 13   | 1    |
    /// | 5    | 7 → 10   | 3    |
    /// | 6    | 10 → 11  | 3    |
    /// | 7    | 11 → 12  | 3    |
    /// | 8    | 12 → 13  | 3    |
    /// | 9    | 8 → 14   | 20   |
    pub fn records(city: CityId) -> CityRecords {
        let mut nodes: Vec<Node> = [
            (7, 24.860, 67.000),
            (8, 24.870, 67.005),
            (9, 24.860, 67.010),
            (10, 24.850, 67.005),
            (11, 24.850, 67.010),
            (12, 24.850, 67.015),
        ]
        .into_iter()
        .map(|(id, lat, lon)| Node::new(NodeId(id), GeoPoint::new(lat, lon), NodeKind::Intersection))
        .collect();
        nodes.push(
            Node::new(NodeId(13), GeoPoint::new(24.860, 67.020), NodeKind::Hospital).named("Civil Hospital"),
        );
        nodes.push(
            Node::new(NodeId(14), GeoPoint::new(24.880, 67.005), NodeKind::Hospital).named("North Clinic"),
        );
        let edges = [
            (1, 7, 8, 5.0),
            (2, 8, 13, 5.0),
            (3, 7, 9, 1.0),
            (4, 9, 13, 1.0),
            (5, 7, 10, 3.0),
            (6, 10, 11, 3.0),
            (7, 11, 12, 3.0),
            (8, 12, 13, 3.0),
            (9, 8, 14, 20.0),
        ]
        .into_iter()
        .map(|(id, from, to, w)| EdgeRecord::new(EdgeId(id), NodeId(from), NodeId(to), w, w * 0.5))
        .collect();
        CityRecords { city, nodes, edges }
    }

    pub fn source() -> MemorySource {
        let source = MemorySource::new();

        source.insert_city(records(SCENARIO));
        source.add_traffic_update(SCENARIO, TrafficUpdate::new(EdgeId(1), 15.0, T.offset_secs(-600)));
        source.add_roadblock(
            SCENARIO,
            Roadblock::new(EdgeId(3), T.offset_secs(-3_600), None).with_reason("accident"),
        );

        source.insert_city(records(CUT_OFF));
        for edge in [2, 4, 8, 9] {
            source.add_roadblock(CUT_OFF, Roadblock::new(EdgeId(edge), T.offset_secs(-60), None));
        }

        source.insert_city(CityRecords {
            city:  NO_HOSPITALS,
            nodes: vec![
                Node::new(NodeId(1), GeoPoint::new(10.0, 10.0), NodeKind::Intersection),
                Node::new(NodeId(2), GeoPoint::new(10.0, 10.01), NodeKind::Intersection),
            ],
            edges: vec![EdgeRecord::new(EdgeId(1), NodeId(1), NodeId(2), 1.0, 1.0)],
        });
        source
    }

    /// 12 minutes at 240× plays back in 3 s.
    pub fn config() -> DispatchConfig {
        DispatchConfig {
            tracker: TrackerConfig { speedup: 240.0, ..TrackerConfig::default() },
            ..DispatchConfig::default()
        }
    }

    pub fn dispatcher() -> Dispatcher<MemorySource> {
        Dispatcher::new(source(), config()).unwrap()
    }

    pub fn ids(raw: &[u32]) -> Vec<NodeId> {
        raw.iter().map(|&n| NodeId(n)).collect()
    }
}

// ── Resolve ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod resolve {
    use er_core::{CityId, GeoPoint, NodeId, RequestId};

    use crate::{DispatchError, ErrorKind, RequestStatus};
    use super::helpers::*;

    #[test]
    fn scenario_takes_the_long_way_round() {
        let d = dispatcher();
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();

        assert_eq!(decision.request_id, RequestId(1));
        assert_eq!(decision.source_node, NodeId(7));
        assert_eq!(decision.destination_node, NodeId(13));
        assert_eq!(decision.path, ids(&[7, 10, 11, 12, 13]));
        assert_eq!(decision.total_weight, Some(12.0));
        assert_eq!(decision.total_distance_km, Some(6.0));
        assert_eq!(decision.at, T);
        assert_eq!(decision.route.len(), 5);
        assert_eq!(decision.route[0], AT_7);
        assert_eq!(decision.route[4], GeoPoint::new(24.860, 67.020));

        let request = d.request(decision.request_id).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.city_id, SCENARIO);
    }

    #[test]
    fn overlays_apply_only_once_active() {
        let d = dispatcher();
        // Before the closure started and the traffic report arrived.
        let early = T.offset_secs(-7_200);
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), early).unwrap();
        assert_eq!(decision.path, ids(&[7, 9, 13]));
        assert_eq!(decision.total_weight, Some(2.0));
    }

    #[test]
    fn request_ids_increase() {
        let d = dispatcher();
        let a = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let b = d.resolve_request(SCENARIO, AT_7, NodeId(14), T).unwrap();
        assert!(b.request_id > a.request_id);
    }

    #[test]
    fn patient_snaps_to_nearest_node() {
        let d = dispatcher();
        // Just off node 10.
        let decision = d.resolve_request(SCENARIO, GeoPoint::new(24.8501, 67.0049), NodeId(13), T).unwrap();
        assert_eq!(decision.source_node, NodeId(10));
        assert_eq!(decision.path, ids(&[10, 11, 12, 13]));
        assert_eq!(decision.total_weight, Some(9.0));
    }

    #[test]
    fn invalid_coordinates() {
        let d = dispatcher();
        let err = d.resolve_request(SCENARIO, GeoPoint::new(91.0, 0.0), NodeId(13), T).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidLocation(_)), "{err}");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = d.resolve_request(SCENARIO, GeoPoint::new(0.0, f64::NAN), NodeId(13), T).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn unknown_city() {
        let d = dispatcher();
        let err = d.resolve_request(CityId(99), AT_7, NodeId(13), T).unwrap_err();
        assert!(matches!(err, DispatchError::CityNotFound(CityId(99))), "{err}");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn bad_destinations() {
        let d = dispatcher();
        let err = d.resolve_request(SCENARIO, AT_7, NodeId(12), T).unwrap_err();
        assert!(matches!(err, DispatchError::NotAHospital { node: NodeId(12), .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = d.resolve_request(SCENARIO, AT_7, NodeId(500), T).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownDestination { node: NodeId(500), .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn unreachable_is_a_decision_not_an_error() {
        let d = dispatcher();
        let decision = d.resolve_request(CUT_OFF, AT_7, NodeId(13), T).unwrap();
        assert!(!decision.is_reachable());
        assert!(decision.route.is_empty());
        assert_eq!(decision.total_weight, None);
        assert_eq!(decision.total_distance_km, None);

        // The trace is still there to explain why.
        let trace = d.get_trace(decision.request_id).unwrap();
        assert!(trace.shortest_path.is_empty());
        assert!(!trace.steps.is_empty());
    }

    #[test]
    fn graph_cache_can_be_disabled() {
        let mut config = config();
        config.cache_graphs = false;
        let d = crate::Dispatcher::new(source(), config).unwrap();
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        assert_eq!(decision.total_weight, Some(12.0));
        assert!(!d.invalidate_city(SCENARIO));
    }
}

// ── Nearest hospital ──────────────────────────────────────────────────────────

#[cfg(test)]
mod nearest {
    use er_core::NodeId;

    use crate::{DispatchError, ErrorKind, HospitalInfo};
    use super::helpers::*;

    #[test]
    fn picks_the_quickest_hospital() {
        let d = dispatcher();
        let decision = d.resolve_nearest_hospital(SCENARIO, AT_7, T).unwrap();
        assert_eq!(decision.destination_node, NodeId(13));
        assert_eq!(decision.total_weight, Some(12.0));
    }

    #[test]
    fn falls_back_to_geographically_closest() {
        let d = dispatcher();
        let decision = d.resolve_nearest_hospital(CUT_OFF, AT_7, T).unwrap();
        assert_eq!(decision.destination_node, NodeId(13));
        assert!(!decision.is_reachable());
    }

    #[test]
    fn city_without_hospitals() {
        let d = dispatcher();
        let err = d.resolve_nearest_hospital(NO_HOSPITALS, AT_7, T).unwrap_err();
        assert!(matches!(err, DispatchError::NoHospitals(NO_HOSPITALS)), "{err}");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(d.list_hospitals(NO_HOSPITALS).unwrap().is_empty());
    }

    #[test]
    fn lists_cities() {
        let d = dispatcher();
        d.source().set_city_name(SCENARIO, "Karachi");
        let cities = d.list_cities().unwrap();
        let ids: Vec<_> = cities.iter().map(|c| c.id).collect();
        assert_eq!(ids, [SCENARIO, CUT_OFF, NO_HOSPITALS]);
        assert_eq!(cities[0].name.as_deref(), Some("Karachi"));
        assert_eq!(cities[1].name, None);
    }

    #[test]
    fn lists_hospitals_in_id_order() {
        let d = dispatcher();
        let hospitals = d.list_hospitals(SCENARIO).unwrap();
        let found: Vec<NodeId> = hospitals.iter().map(|h: &HospitalInfo| h.id).collect();
        assert_eq!(found, ids(&[13, 14]));
        assert_eq!(hospitals[0].name.as_deref(), Some("Civil Hospital"));
    }
}

// ── Debug traces ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod traces {
    use er_core::{EdgeId, NodeId, RequestId};

    use crate::{DebugTrace, DispatchError, ErrorKind, MemoryTraceStore, TraceStore};
    use super::helpers::*;

    #[test]
    fn trace_marks_overlays() {
        let d = dispatcher();
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let trace = d.get_trace(decision.request_id).unwrap();

        assert_eq!(trace.request_id, decision.request_id);
        assert_eq!(trace.city_id, SCENARIO);
        assert_eq!(trace.at, T);
        assert_eq!(trace.nodes.len(), 8);
        assert_eq!(trace.edges.len(), 9);
        assert_eq!(trace.shortest_path, decision.path);
        assert_eq!(trace.total_weight, Some(12.0));

        let edge = |id| trace.edges.iter().find(|e| e.id == EdgeId(id)).unwrap();
        let busy = edge(1);
        assert!(busy.traffic && !busy.blocked);
        assert_eq!(busy.weight, 5.0);
        assert_eq!(busy.adjusted_weight, Some(15.0));

        let closed = edge(3);
        assert!(closed.blocked && !closed.traffic);
        assert_eq!(closed.adjusted_weight, None);

        let plain = edge(5);
        assert!(!plain.blocked && !plain.traffic);
        assert_eq!(plain.adjusted_weight, Some(3.0));
    }

    #[test]
    fn trace_steps_replay_the_search() {
        let d = dispatcher();
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let trace = d.get_trace(decision.request_id).unwrap();

        let first = &trace.steps[0];
        assert_eq!(first.current, None);
        assert_eq!(first.distances.get(&NodeId(7)), Some(&0.0));

        let last = trace.steps.last().unwrap();
        assert_eq!(last.current, Some(NodeId(13)));
        assert_eq!(last.distances.get(&NodeId(13)), Some(&12.0));
        for pair in trace.steps.windows(2) {
            assert!(pair[1].visited.len() >= pair[0].visited.len());
        }
    }

    #[test]
    fn missing_trace() {
        let d = dispatcher();
        let err = d.get_trace(RequestId(42)).unwrap_err();
        assert!(matches!(err, DispatchError::TraceNotFound(RequestId(42))), "{err}");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn json_round_trip() {
        let d = dispatcher();
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let trace = d.get_trace(decision.request_id).unwrap();
        let json = trace.to_json().unwrap();
        assert!(json.contains("\"adjusted_weight\":15.0"), "{json}");
        assert_eq!(DebugTrace::from_json(&json).unwrap(), *trace);
    }

    #[test]
    fn memory_store_keeps_each_request() {
        let d = dispatcher();
        let a = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let b = d.resolve_request(SCENARIO, AT_7, NodeId(14), T).unwrap();
        assert_eq!(d.store().len(), 2);
        assert_eq!(d.get_trace(a.request_id).unwrap().destination, NodeId(13));
        assert_eq!(d.get_trace(b.request_id).unwrap().destination, NodeId(14));

        let empty = MemoryTraceStore::new();
        assert!(empty.is_empty());
        assert!(empty.get(a.request_id).unwrap().is_none());
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod sqlite_store {
    use er_core::NodeId;

    use crate::{Dispatcher, MemoryTraceStore, SqliteTraceStore, TraceStore};
    use er_solver::TracedDijkstra;
    use super::helpers::*;

    #[test]
    fn traces_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.db");

        let decision;
        let expected;
        {
            let store = SqliteTraceStore::open(&path).unwrap();
            let d = Dispatcher::with_parts(source(), store, TracedDijkstra, config()).unwrap();
            decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
            expected = d.get_trace(decision.request_id).unwrap();
            assert_eq!(d.store().len().unwrap(), 1);
        }

        let reopened = SqliteTraceStore::open(&path).unwrap();
        let trace = reopened.get(decision.request_id).unwrap().unwrap();
        assert_eq!(*trace, *expected);
        assert_eq!(trace.shortest_path, ids(&[7, 10, 11, 12, 13]));
    }

    #[test]
    fn matches_memory_store() {
        let memory = Dispatcher::with_parts(source(), MemoryTraceStore::new(), TracedDijkstra, config()).unwrap();
        let sqlite =
            Dispatcher::with_parts(source(), SqliteTraceStore::open_in_memory().unwrap(), TracedDijkstra, config())
                .unwrap();
        let a = memory.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let b = sqlite.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        assert_eq!(a.request_id, b.request_id);
        assert_eq!(*memory.get_trace(a.request_id).unwrap(), *sqlite.get_trace(b.request_id).unwrap());
        assert!(sqlite.store().get(er_core::RequestId(9)).unwrap().is_none());
    }
}

// ── Request lifecycle ─────────────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle {
    use std::time::Duration;

    use er_core::{NodeId, RequestId};
    use er_tracker::{TrackerConfig, TrackingEvent, TrackingStatus};

    use crate::{DispatchConfig, DispatchError, Dispatcher, ErrorKind, RequestStatus};
    use super::helpers::*;

    #[test]
    fn status_transitions() {
        use RequestStatus::*;
        assert!(Pending.can_transition(Confirmed));
        assert!(Confirmed.can_transition(EnRoute));
        assert!(EnRoute.can_transition(Completed));
        assert!(EnRoute.can_transition(Pending));
        assert!(Confirmed.can_transition(Pending));
        assert!(!Pending.can_transition(EnRoute));
        assert!(!Pending.can_transition(Completed));
        assert!(!Completed.can_transition(Pending));
        assert!(!Completed.can_transition(Confirmed));
        assert_eq!(EnRoute.to_string(), "en_route");
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_tracks_to_completion() {
        let d = dispatcher();
        let decision = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap();
        let id = decision.request_id;

        let duration = d.confirm(id).unwrap();
        assert_eq!(duration, Duration::from_secs(3));
        assert_eq!(d.request(id).unwrap().status, RequestStatus::EnRoute);

        let mut sub = d.subscribe(id).unwrap();
        let mut events: Vec<TrackingEvent> = Vec::new();
        while let Some(e) = sub.next().await {
            events.push(e);
        }
        assert_eq!(events[0].request, id);
        assert_eq!(events[0].progress, 0.0);
        assert_eq!(events[0].current_location, AT_7);
        let last = events.last().unwrap();
        assert_eq!(last.status, TrackingStatus::Completed);
        assert_eq!(last.current_location, *decision.route.last().unwrap());
        assert_eq!(events.iter().filter(|e| e.is_completed()).count(), 1);

        // Recorded before the completed event went out.
        assert_eq!(d.request(id).unwrap().status, RequestStatus::Completed);
        assert!(!d.tracker().is_tracking(id));

        // Completed requests stay completed.
        let err = d.reset(id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }), "{err}");
        assert!(d.confirm(id).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn double_confirm_is_rejected() {
        let d = dispatcher();
        let id = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap().request_id;
        d.confirm(id).unwrap();
        let err = d.confirm(id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { from: RequestStatus::EnRoute, .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_tracking() {
        let d = dispatcher();
        let id = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap().request_id;
        d.confirm(id).unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let mut sub = d.subscribe(id).unwrap();
        let first = sub.next().await.unwrap();
        assert_eq!(first.status, TrackingStatus::EnRoute);
        assert!(first.progress > 0.0 && first.progress < 1.0, "{first:?}");

        let reset = d.reset(id).unwrap();
        assert_eq!(reset.status, RequestStatus::Pending);
        assert!(!d.tracker().is_tracking(id));
        // The feed ends without a completion event.
        assert!(sub.next().await.is_none());

        // A reset request can be confirmed again and starts from scratch.
        assert_eq!(d.confirm(id).unwrap(), Duration::from_secs(3));
        let restarted = d.tracker().snapshot(id).unwrap();
        assert_eq!(restarted.progress, 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reset_after_completed_event_is_rejected() {
        // Millisecond ticks over a 5 ms trip, so the tick task and this
        // subscriber race on separate workers.
        let config = DispatchConfig {
            tracker: TrackerConfig {
                tick_interval_secs: 0.001,
                min_duration_secs: 0.0,
                max_duration_secs: 0.005,
                ..TrackerConfig::default()
            },
            ..DispatchConfig::default()
        };
        let d = Dispatcher::new(source(), config).unwrap();

        for _ in 0..200 {
            let id = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap().request_id;
            d.confirm(id).unwrap();
            // A trip that ends before we subscribe has already been recorded.
            if let Ok(mut sub) = d.subscribe(id) {
                while let Some(e) = sub.next().await {
                    if e.is_completed() {
                        break;
                    }
                }
            }
            assert_eq!(d.request(id).unwrap().status, RequestStatus::Completed);
            let err = d.reset(id).unwrap_err();
            assert!(
                matches!(err, DispatchError::InvalidTransition { from: RequestStatus::Completed, .. }),
                "{err}"
            );
            assert_eq!(d.request(id).unwrap().status, RequestStatus::Completed);
            assert!(d.confirm(id).is_err());
        }
        assert_eq!(d.tracker().active_count(), 0);
    }

    #[test]
    fn reset_of_pending_request_is_a_no_op() {
        let d = dispatcher();
        let id = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap().request_id;
        assert_eq!(d.reset(id).unwrap().status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn unreachable_request_cannot_be_confirmed() {
        let d = dispatcher();
        let id = d.resolve_request(CUT_OFF, AT_7, NodeId(13), T).unwrap().request_id;
        let err = d.confirm(id).unwrap_err();
        assert!(matches!(err, DispatchError::Unreachable(r) if r == id), "{err}");
        assert_eq!(d.request(id).unwrap().status, RequestStatus::Pending);
    }

    #[test]
    fn unknown_request() {
        let d = dispatcher();
        for err in [
            d.request(RequestId(7)).unwrap_err(),
            d.confirm(RequestId(7)).unwrap_err(),
            d.reset(RequestId(7)).unwrap_err(),
        ] {
            assert!(matches!(err, DispatchError::RequestNotFound(RequestId(7))), "{err}");
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert!(matches!(d.subscribe(RequestId(7)), Err(DispatchError::RequestNotFound(_))));
    }

    #[test]
    fn subscribe_before_confirm_is_not_tracking() {
        let d = dispatcher();
        let id = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap().request_id;
        let err = d.subscribe(id).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn confirm_outside_runtime_reverts() {
        let d = dispatcher();
        let id = d.resolve_request(SCENARIO, AT_7, NodeId(13), T).unwrap().request_id;
        let err = d.confirm(id).unwrap_err();
        assert!(matches!(err, DispatchError::Tracker(er_tracker::TrackerError::NoRuntime)), "{err}");
        assert_eq!(d.request(id).unwrap().status, RequestStatus::Pending);
    }
}

// ── Batches ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod batch {
    use er_core::{CityId, GeoPoint, NodeId};

    use crate::{DispatchError, ResolveQuery};
    use super::helpers::*;

    #[test]
    fn results_follow_query_order() {
        let d = dispatcher();
        let queries = [
            ResolveQuery { city: SCENARIO, patient: AT_7, hospital: Some(NodeId(13)), at: T },
            ResolveQuery { city: SCENARIO, patient: AT_7, hospital: None, at: T.offset_secs(-7_200) },
            ResolveQuery { city: CityId(99), patient: AT_7, hospital: None, at: T },
            ResolveQuery { city: SCENARIO, patient: GeoPoint::new(0.0, 200.0), hospital: Some(NodeId(13)), at: T },
        ];
        let results = d.resolve_batch(&queries);
        assert_eq!(results.len(), 4);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.total_weight, Some(12.0));
        let second = results[1].as_ref().unwrap();
        assert_eq!(second.destination_node, NodeId(13));
        assert_eq!(second.total_weight, Some(2.0));
        assert_ne!(first.request_id, second.request_id);

        assert!(matches!(results[2], Err(DispatchError::CityNotFound(_))));
        assert!(matches!(results[3], Err(DispatchError::InvalidLocation(_))));
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use std::io::Write;

    use crate::{DispatchConfig, DispatchError};

    #[test]
    fn empty_document_is_default() {
        assert_eq!(DispatchConfig::from_toml_str("").unwrap(), DispatchConfig::default());
    }

    #[test]
    fn parses_tracker_table() {
        let cfg = DispatchConfig::from_toml_str(
            "cache_graphs = false\n[tracker]\nspeedup = 20.0\nchannel_capacity = 8\n",
        )
        .unwrap();
        assert!(!cfg.cache_graphs);
        assert_eq!(cfg.tracker.speedup, 20.0);
        assert_eq!(cfg.tracker.channel_capacity, 8);
        assert_eq!(cfg.tracker.tick_interval_secs, 1.0);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = DispatchConfig::from_toml_str("[tracker]\nspeedup = 0.0\n").unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)), "{err}");
        let err = DispatchConfig::from_toml_str("cache_graphs = \"yes\"\n").unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)), "{err}");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tracker]\ntick_interval_secs = 0.5").unwrap();
        let cfg = DispatchConfig::load(file.path()).unwrap();
        assert_eq!(cfg.tracker.tick_interval_secs, 0.5);
    }

    #[test]
    fn dispatcher_rejects_invalid_config() {
        let mut cfg = DispatchConfig::default();
        cfg.tracker.channel_capacity = 0;
        let err = crate::Dispatcher::new(super::helpers::source(), cfg).err().unwrap();
        assert!(matches!(err, DispatchError::Config(_)), "{err}");
    }
}
