use thiserror::Error;

use er_core::{CityId, NodeId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("city {city}: node {node} is not in the graph")]
    UnknownNode { city: CityId, node: NodeId },
}

pub type SolveResult<T> = Result<T, SolveError>;
