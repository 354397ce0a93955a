//! Values returned to callers of the dispatcher.

use serde::{Deserialize, Serialize};

use er_core::{CityId, GeoPoint, NodeId, RequestId, Timestamp};

/// Outcome of resolving one emergency request.
///
/// An empty `path` is a valid decision: the destination is unreachable under
/// the current overlays.  Check [`is_reachable`](Self::is_reachable).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub request_id:        RequestId,
    pub city_id:           CityId,
    pub source_node:       NodeId,
    pub destination_node:  NodeId,
    /// Estimated travel time in minutes.
    pub total_weight:      Option<f64>,
    pub total_distance_km: Option<f64>,
    pub path:              Vec<NodeId>,
    /// Coordinates of `path`, in order.
    pub route:             Vec<GeoPoint>,
    /// The overlay time the route was computed for.
    pub at:                Timestamp,
}

impl RoutingDecision {
    #[inline]
    pub fn is_reachable(&self) -> bool {
        !self.path.is_empty()
    }
}

/// A hospital node as offered to a caller choosing a destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HospitalInfo {
    pub id:   NodeId,
    pub name: Option<String>,
    pub pos:  GeoPoint,
}

/// One entry of a batch.  `hospital: None` selects the nearest hospital.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolveQuery {
    pub city:     CityId,
    pub patient:  GeoPoint,
    pub hospital: Option<NodeId>,
    pub at:       Timestamp,
}
