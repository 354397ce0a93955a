//! Request records and their status lifecycle.
//!
//! ```text
//! pending ──confirm──▶ confirmed ──tracking starts──▶ en_route ──tracker──▶ completed
//!    ▲                     │                             │
//!    └──────── reset ──────┴─────────────────────────────┘
//! ```

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use er_core::{CityId, GeoPoint, NodeId, RequestId, Timestamp};
use er_tracker::TrackerObserver;

use crate::{DispatchError, DispatchResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Confirmed,
    EnRoute,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending   => "pending",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::EnRoute   => "en_route",
            RequestStatus::Completed => "completed",
        }
    }

    /// Whether `self → to` is a legal move.  Any non-completed request may
    /// be reset to pending; otherwise status only moves forward one step.
    pub fn can_transition(self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Pending | Confirmed | EnRoute, Pending)
                | (Pending, Confirmed)
                | (Confirmed, EnRoute)
                | (EnRoute, Completed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emergency request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id:               RequestId,
    pub city_id:          CityId,
    pub source_node:      NodeId,
    pub destination_node: NodeId,
    pub created_at:       Timestamp,
    pub status:           RequestStatus,
}

struct Entry {
    request:      Request,
    route:        Vec<GeoPoint>,
    total_weight: Option<f64>,
}

/// All requests known to a dispatcher.
///
/// Also the tracker's observer: tracking start moves a request to
/// `en_route`, tracking completion to `completed`.
#[derive(Default)]
pub struct RequestBook {
    entries: Mutex<FxHashMap<RequestId, Entry>>,
}

impl RequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<RequestId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a freshly resolved request along with the route it would
    /// follow.
    pub fn insert(&self, request: Request, route: Vec<GeoPoint>, total_weight: Option<f64>) {
        self.lock().insert(request.id, Entry { request, route, total_weight });
    }

    pub fn get(&self, id: RequestId) -> Option<Request> {
        self.lock().get(&id).map(|e| e.request.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route coordinates and weight, or `None` for an unknown request.
    pub fn route(&self, id: RequestId) -> Option<(Vec<GeoPoint>, Option<f64>)> {
        self.lock().get(&id).map(|e| (e.route.clone(), e.total_weight))
    }

    /// Move `id` to `to`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::RequestNotFound`] for an unknown request.
    /// - [`DispatchError::InvalidTransition`] if the move is not legal.
    pub fn transition(&self, id: RequestId, to: RequestStatus) -> DispatchResult<Request> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&id).ok_or(DispatchError::RequestNotFound(id))?;
        let from = entry.request.status;
        if !from.can_transition(to) {
            return Err(DispatchError::InvalidTransition { request: id, from, to });
        }
        entry.request.status = to;
        tracing::debug!(request = %id, %from, %to, "request status changed");
        Ok(entry.request.clone())
    }
}

impl TrackerObserver for RequestBook {
    fn on_started(&self, request: RequestId, _duration: Duration) {
        if let Err(e) = self.transition(request, RequestStatus::EnRoute) {
            tracing::warn!(%request, error = %e, "tracking started for request not awaiting it");
        }
    }

    fn on_completed(&self, request: RequestId) {
        if let Err(e) = self.transition(request, RequestStatus::Completed) {
            tracing::warn!(%request, error = %e, "tracking completed for request not en route");
        }
    }
}
