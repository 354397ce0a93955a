//! Graph-subsystem error type.

use thiserror::Error;

use er_core::{CityId, EdgeId, NodeId};

/// Errors produced by `er-graph`.
///
/// Every variant names the city and ids involved so a failed load can be
/// reproduced against the same source data.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("city {0} has no graph data")]
    CityNotFound(CityId),

    #[error("city {city}: duplicate node {node}")]
    DuplicateNode { city: CityId, node: NodeId },

    #[error("city {city}: node {node} is invalid: {reason}")]
    InvalidNode { city: CityId, node: NodeId, reason: String },

    #[error("city {city}: duplicate edge {edge}")]
    DuplicateEdge { city: CityId, edge: EdgeId },

    #[error("city {city}: edge {edge} references node {node}, which is not in the city")]
    DanglingEdge { city: CityId, edge: EdgeId, node: NodeId },

    #[error("city {city}: edge {edge} is invalid: {reason}")]
    InvalidEdge { city: CityId, edge: EdgeId, reason: String },

    #[error("overlay record for edge {edge} is invalid: {reason}")]
    InvalidOverlay { edge: EdgeId, reason: String },

    #[error("graph parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
