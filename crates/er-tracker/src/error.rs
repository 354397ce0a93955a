use thiserror::Error;

use er_core::RequestId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("request {0}: cannot track an empty route")]
    EmptyRoute(RequestId),

    #[error("request {request}: route weight {weight} is not a finite non-negative number")]
    InvalidWeight { request: RequestId, weight: f64 },

    #[error("request {0} is already being tracked")]
    AlreadyTracking(RequestId),

    #[error("request {0} is not being tracked")]
    NotTracking(RequestId),

    #[error("tracking requires a running tokio runtime")]
    NoRuntime,

    #[error("invalid tracker config: {0}")]
    InvalidConfig(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
