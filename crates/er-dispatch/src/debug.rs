//! Debug view of one solve: the adjusted graph plus the full search trace.

use serde::{Deserialize, Serialize};

use er_core::{CityId, EdgeId, GeoPoint, NodeId, RequestId, Timestamp};
use er_graph::{AdjustedGraph, EdgeState, NodeKind};
use er_solver::{Solution, Step};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugNode {
    pub id:   NodeId,
    pub pos:  GeoPoint,
    pub name: Option<String>,
    pub kind: NodeKind,
}

/// One directed edge as the solver saw it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugEdge {
    pub id:              EdgeId,
    pub from:            NodeId,
    pub to:              NodeId,
    /// Base weight from the edges table.
    pub weight:          f64,
    /// Effective weight at solve time; `None` when blocked.
    pub adjusted_weight: Option<f64>,
    pub distance_km:     f64,
    pub blocked:         bool,
    pub traffic:         bool,
}

/// Everything needed to replay a routing decision step by step.
///
/// Built once at solve time and never modified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugTrace {
    pub request_id:        RequestId,
    pub city_id:           CityId,
    pub at:                Timestamp,
    pub source:            NodeId,
    pub destination:       NodeId,
    pub nodes:             Vec<DebugNode>,
    pub edges:             Vec<DebugEdge>,
    pub steps:             Vec<Step>,
    pub shortest_path:     Vec<NodeId>,
    pub total_weight:      Option<f64>,
    pub total_distance_km: Option<f64>,
}

impl DebugTrace {
    /// Snapshot `graph` and take ownership of `solution`'s trace.
    pub fn build(request_id: RequestId, graph: &AdjustedGraph, solution: Solution) -> Self {
        let base = graph.base();
        let nodes = base
            .nodes()
            .iter()
            .map(|n| DebugNode { id: n.id, pos: n.pos, name: n.name.clone(), kind: n.kind })
            .collect();
        let edges = graph
            .edges()
            .map(|(e, state)| DebugEdge {
                id:              e.id,
                from:            e.from,
                to:              e.to,
                weight:          e.base_weight,
                adjusted_weight: state.weight(),
                distance_km:     e.distance_km,
                blocked:         state.is_blocked(),
                traffic:         matches!(state, EdgeState::Open { traffic: true, .. }),
            })
            .collect();
        DebugTrace {
            request_id,
            city_id: base.city(),
            at: graph.at(),
            source: solution.source,
            destination: solution.destination,
            nodes,
            edges,
            steps: solution.trace,
            shortest_path: solution.path,
            total_weight: solution.total_weight,
            total_distance_km: solution.total_distance_km,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
