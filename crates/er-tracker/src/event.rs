//! Events published to subscribers.

use serde::{Deserialize, Serialize};

use er_core::{GeoPoint, RequestId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    EnRoute,
    Completed,
}

/// Vehicle state at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub request:          RequestId,
    pub status:           TrackingStatus,
    pub current_location: GeoPoint,
    /// Whole seconds remaining, rounded up.
    pub eta_seconds:      u64,
    /// Fraction of the trip completed, in `[0, 1]`.
    pub progress:         f64,
}

impl TrackingEvent {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == TrackingStatus::Completed
    }
}
