//! Synthetic Karachi road network used when no CSV directory is given.
//!
//! Seven junctions around Saddar, two hospitals, and the overlays of a bad
//! afternoon: an accident closing the short cut to Civil Hospital and heavy
//! traffic on the northern road.

use er_core::{CityId, EdgeId, GeoPoint, NodeId, Timestamp};
use er_graph::{CityRecords, EdgeRecord, MemorySource, Node, NodeKind, Roadblock, TrafficUpdate};

pub const KARACHI: CityId = CityId(1);

pub const CIVIL_HOSPITAL: NodeId = NodeId(13);

/// Saddar junction; the patient in the demo is a few metres from it.
pub const PATIENT: GeoPoint = GeoPoint { lat: 24.8601, lon: 67.0002 };

/// Populate a [`MemorySource`] with the city and its overlays as of `now`.
pub fn build_source(now: Timestamp) -> MemorySource {
    let source = MemorySource::new();

    let nodes = vec![
        Node::new(NodeId(7), GeoPoint::new(24.860, 67.000), NodeKind::Intersection).named("Saddar"),
        Node::new(NodeId(8), GeoPoint::new(24.870, 67.005), NodeKind::Intersection).named("Garden"),
        Node::new(NodeId(9), GeoPoint::new(24.860, 67.010), NodeKind::Intersection).named("Empress Market"),
        Node::new(NodeId(10), GeoPoint::new(24.850, 67.005), NodeKind::Intersection).named("Lines Area"),
        Node::new(NodeId(11), GeoPoint::new(24.850, 67.010), NodeKind::Intersection).named("Jamshed Road"),
        Node::new(NodeId(12), GeoPoint::new(24.850, 67.015), NodeKind::Intersection).named("Soldier Bazaar"),
        Node::new(CIVIL_HOSPITAL, GeoPoint::new(24.860, 67.020), NodeKind::Hospital).named("Civil Hospital"),
        Node::new(NodeId(14), GeoPoint::new(24.880, 67.005), NodeKind::Hospital).named("Abbasi Shaheed"),
    ];

    // Directed roads: (id, from, to, minutes, km).
    let edges = [
        (1, 7, 8, 5.0, 1.2),
        (2, 8, 13, 5.0, 1.7),
        (3, 7, 9, 1.0, 1.0),
        (4, 9, 13, 1.0, 1.0),
        (5, 7, 10, 3.0, 1.1),
        (6, 10, 11, 3.0, 0.5),
        (7, 11, 12, 3.0, 0.5),
        (8, 12, 13, 3.0, 1.1),
        (9, 8, 14, 6.0, 1.1),
    ]
    .into_iter()
    .map(|(id, from, to, w, km)| EdgeRecord::new(EdgeId(id), NodeId(from), NodeId(to), w, km))
    .collect();

    source.insert_city(CityRecords { city: KARACHI, nodes, edges });
    source.set_city_name(KARACHI, "Karachi");

    source.add_roadblock(
        KARACHI,
        Roadblock::new(EdgeId(3), now.offset_secs(-1_800), Some(now.offset_secs(7_200)))
            .with_reason("accident at Empress Market"),
    );
    source.add_traffic_update(KARACHI, TrafficUpdate::new(EdgeId(1), 15.0, now.offset_secs(-300)));
    source
}
