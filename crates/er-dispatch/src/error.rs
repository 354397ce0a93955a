//! Dispatch error type.

use thiserror::Error;

use er_core::{CityId, CoreError, NodeId, RequestId};
use er_graph::GraphError;
use er_solver::SolveError;
use er_tracker::TrackerError;

use crate::request::RequestStatus;

/// Errors produced by `er-dispatch`.  See [`DispatchError::kind`] for the
/// coarse classification callers usually branch on.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("city {0} has no graph data")]
    CityNotFound(CityId),

    #[error("city {0} has no hospitals")]
    NoHospitals(CityId),

    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    #[error("no debug trace stored for request {0}")]
    TraceNotFound(RequestId),

    #[error("invalid patient location: {0}")]
    InvalidLocation(#[from] CoreError),

    #[error("city {city}: destination node {node} does not exist")]
    UnknownDestination { city: CityId, node: NodeId },

    #[error("city {city}: destination node {node} is not a hospital")]
    NotAHospital { city: CityId, node: NodeId },

    #[error("request {request}: cannot move from {from} to {to}")]
    InvalidTransition { request: RequestId, from: RequestStatus, to: RequestStatus },

    #[error("request {0} has no route to its destination and cannot be tracked")]
    Unreachable(RequestId),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("trace store error: {0}")]
    Store(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Coarse error classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown city, node, request, or trace.
    NotFound,
    /// Malformed coordinates, a bad destination, or an invalid transition.
    InvalidInput,
    /// Source, storage, or configuration failures.
    Internal,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::CityNotFound(_)
            | DispatchError::NoHospitals(_)
            | DispatchError::RequestNotFound(_)
            | DispatchError::TraceNotFound(_)
            | DispatchError::Graph(GraphError::CityNotFound(_))
            | DispatchError::Solve(SolveError::UnknownNode { .. })
            | DispatchError::Tracker(TrackerError::NotTracking(_)) => ErrorKind::NotFound,

            DispatchError::InvalidLocation(_)
            | DispatchError::UnknownDestination { .. }
            | DispatchError::NotAHospital { .. }
            | DispatchError::InvalidTransition { .. }
            | DispatchError::Unreachable(_)
            | DispatchError::Tracker(TrackerError::EmptyRoute(_))
            | DispatchError::Tracker(TrackerError::InvalidWeight { .. })
            | DispatchError::Tracker(TrackerError::AlreadyTracking(_)) => ErrorKind::InvalidInput,

            _ => ErrorKind::Internal,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
