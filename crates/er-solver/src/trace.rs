//! Search trace and solver output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use er_core::{EdgeId, NodeId};

/// Snapshot of the search state.
///
/// Step 0 is the initial state (`current == None`, only the source touched).
/// Step `k` is the state immediately after the `k`-th node was finalized and
/// its outgoing edges relaxed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Node finalized in this step; `None` for step 0.
    pub current:   Option<NodeId>,
    /// Best tentative distance of every node touched so far.
    pub distances: BTreeMap<NodeId, f64>,
    /// Finalized nodes in finalization order.
    pub visited:   Vec<NodeId>,
    /// Touched but not yet finalized, ascending by id.
    pub frontier:  Vec<NodeId>,
}

/// Result of one source → destination search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub source:      NodeId,
    pub destination: NodeId,
    /// Node sequence from source to destination; empty if unreachable.
    pub path:        Vec<NodeId>,
    /// Edges taken, `path.len() - 1` of them.
    pub edges:       Vec<EdgeId>,
    /// Sum of adjusted weights along `edges` (minutes).
    pub total_weight:      Option<f64>,
    /// Sum of `distance_km` along `edges`.
    pub total_distance_km: Option<f64>,
    pub trace:       Vec<Step>,
}

impl Solution {
    #[inline]
    pub fn is_reachable(&self) -> bool {
        !self.path.is_empty()
    }

    /// Nodes finalized by the search, in order.
    pub fn visited(&self) -> &[NodeId] {
        self.trace.last().map(|s| s.visited.as_slice()).unwrap_or(&[])
    }
}
