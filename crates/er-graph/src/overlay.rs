//! Live overlay resolution: roadblocks and traffic applied at a query time.
//!
//! The base [`CityGraph`] is never mutated.  [`adjust`] evaluates every
//! overlay record against a single timestamp and produces a fresh
//! [`AdjustedGraph`] owned by that query.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use er_core::{EdgeId, NodeId, Timestamp};

use crate::model::{OverlayRecords, Roadblock, TrafficUpdate};
use crate::network::{CityGraph, Edge};
use crate::{GraphError, GraphResult};

// ── OverlaySet ────────────────────────────────────────────────────────────────

/// Roadblocks and traffic updates for one city, grouped by edge.
///
/// Records are append-only; within an edge they keep insertion order, which
/// decides ties between traffic updates sharing a timestamp (the later row
/// wins).
#[derive(Clone, Debug, Default)]
pub struct OverlaySet {
    roadblocks: FxHashMap<EdgeId, Vec<Roadblock>>,
    traffic:    FxHashMap<EdgeId, Vec<TrafficUpdate>>,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and group a source's overlay rows.
    pub fn from_records(records: OverlayRecords) -> GraphResult<Self> {
        let mut set = Self::new();
        for rb in records.roadblocks {
            set.push_roadblock(rb)?;
        }
        for tu in records.traffic {
            set.push_traffic(tu)?;
        }
        Ok(set)
    }

    /// # Errors
    ///
    /// [`GraphError::InvalidOverlay`] if `end` precedes `start`.
    pub fn push_roadblock(&mut self, rb: Roadblock) -> GraphResult<()> {
        if let Some(end) = rb.end {
            if end < rb.start {
                return Err(GraphError::InvalidOverlay {
                    edge:   rb.edge,
                    reason: format!("roadblock ends ({end}) before it starts ({})", rb.start),
                });
            }
        }
        self.roadblocks.entry(rb.edge).or_default().push(rb);
        Ok(())
    }

    /// # Errors
    ///
    /// [`GraphError::InvalidOverlay`] if `new_weight` is negative or not finite.
    pub fn push_traffic(&mut self, tu: TrafficUpdate) -> GraphResult<()> {
        if !tu.new_weight.is_finite() || tu.new_weight < 0.0 {
            return Err(GraphError::InvalidOverlay {
                edge:   tu.edge,
                reason: format!("traffic weight {} must be finite and non-negative", tu.new_weight),
            });
        }
        self.traffic.entry(tu.edge).or_default().push(tu);
        Ok(())
    }

    pub fn roadblock_count(&self) -> usize {
        self.roadblocks.values().map(Vec::len).sum()
    }

    pub fn traffic_count(&self) -> usize {
        self.traffic.values().map(Vec::len).sum()
    }

    /// The first roadblock on `edge` active at `at`, if any.
    pub fn active_roadblock(&self, edge: EdgeId, at: Timestamp) -> Option<&Roadblock> {
        self.roadblocks.get(&edge)?.iter().find(|rb| rb.is_active(at))
    }

    #[inline]
    pub fn is_blocked(&self, edge: EdgeId, at: Timestamp) -> bool {
        self.active_roadblock(edge, at).is_some()
    }

    /// The governing traffic update for `edge` at `at`: the one with the
    /// latest timestamp not after `at`.  Updates never expire.
    pub fn traffic_update(&self, edge: EdgeId, at: Timestamp) -> Option<&TrafficUpdate> {
        let mut best: Option<&TrafficUpdate> = None;
        for tu in self.traffic.get(&edge)?.iter().filter(|tu| tu.timestamp <= at) {
            if best.is_none_or(|b| tu.timestamp >= b.timestamp) {
                best = Some(tu);
            }
        }
        best
    }

    #[inline]
    pub fn traffic_weight(&self, edge: EdgeId, at: Timestamp) -> Option<f64> {
        self.traffic_update(edge, at).map(|tu| tu.new_weight)
    }
}

// ── EdgeState ─────────────────────────────────────────────────────────────────

/// Resolved state of one directed edge at a query time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgeState {
    /// Traversable at `weight`.  `traffic` is true when a traffic update,
    /// not the base weight, supplied it.
    Open { weight: f64, traffic: bool },
    /// An active roadblock removes the edge from the adjusted graph.
    Blocked,
}

impl EdgeState {
    #[inline]
    pub fn is_blocked(self) -> bool {
        matches!(self, EdgeState::Blocked)
    }

    /// Effective weight, or `None` if blocked.
    #[inline]
    pub fn weight(self) -> Option<f64> {
        match self {
            EdgeState::Open { weight, .. } => Some(weight),
            EdgeState::Blocked => None,
        }
    }
}

// ── AdjustedGraph ─────────────────────────────────────────────────────────────

/// A query-local view of a [`CityGraph`] with overlays applied.
///
/// Carries its own CSR adjacency restricted to open edges, in the same
/// per-node order as the base graph.  Node indices are shared with the base.
pub struct AdjustedGraph {
    base:   Arc<CityGraph>,
    at:     Timestamp,
    /// Indexed by base edge index.
    states: Vec<EdgeState>,

    out_start:  Vec<u32>,
    adj_edge:   Vec<u32>,
    adj_weight: Vec<f64>,
}

impl AdjustedGraph {
    pub fn base(&self) -> &CityGraph {
        &self.base
    }

    /// Shared handle to the base graph.
    pub fn base_arc(&self) -> &Arc<CityGraph> {
        &self.base
    }

    pub fn at(&self) -> Timestamp {
        self.at
    }

    pub fn node_count(&self) -> usize {
        self.base.node_count()
    }

    /// Number of open edges.
    pub fn open_edge_count(&self) -> usize {
        self.adj_edge.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_blocked()).count()
    }

    /// State of the edge at base edge index `edge`.
    #[inline]
    pub fn edge_state(&self, edge: usize) -> EdgeState {
        self.states[edge]
    }

    pub fn state_of(&self, id: EdgeId) -> Option<EdgeState> {
        self.base.edge_index(id).map(|i| self.states[i])
    }

    /// Base edges paired with their resolved state, in base order.
    pub fn edges(&self) -> impl Iterator<Item = (&Edge, EdgeState)> + '_ {
        self.base.edges().iter().zip(self.states.iter().copied())
    }

    #[inline]
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.base.node_index(id)
    }

    /// Open outgoing edges of node index `node` as
    /// `(target node index, effective weight, base edge index)`.
    #[inline]
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64, usize)> + '_ {
        let start = self.out_start[node] as usize;
        let end   = self.out_start[node + 1] as usize;
        (start..end).map(move |k| {
            let e = self.adj_edge[k] as usize;
            (self.base.edge_target(e), self.adj_weight[k], e)
        })
    }
}

impl std::fmt::Debug for AdjustedGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdjustedGraph")
            .field("city", &self.base.city())
            .field("at", &self.at)
            .field("open_edges", &self.adj_edge.len())
            .field("blocked", &self.blocked_count())
            .finish()
    }
}

/// Apply `overlays` to `graph` as of `at`.
///
/// Roadblock status is resolved first; a blocked edge is omitted in that
/// direction only, regardless of traffic.  Open edges take the governing
/// traffic weight, else their base weight.
pub fn adjust(graph: &Arc<CityGraph>, overlays: &OverlaySet, at: Timestamp) -> AdjustedGraph {
    let node_count = graph.node_count();
    let mut states = Vec::with_capacity(graph.edge_count());
    let mut out_start = Vec::with_capacity(node_count + 1);
    let mut adj_edge = Vec::with_capacity(graph.edge_count());
    let mut adj_weight = Vec::with_capacity(graph.edge_count());

    out_start.push(0u32);
    for node in 0..node_count {
        for e in graph.out_edges(node) {
            let edge = graph.edge_at(e);
            let state = if overlays.is_blocked(edge.id, at) {
                EdgeState::Blocked
            } else {
                match overlays.traffic_weight(edge.id, at) {
                    Some(weight) => EdgeState::Open { weight, traffic: true },
                    None => EdgeState::Open { weight: edge.base_weight, traffic: false },
                }
            };
            if let EdgeState::Open { weight, .. } = state {
                adj_edge.push(e as u32);
                adj_weight.push(weight);
            }
            states.push(state);
        }
        out_start.push(adj_edge.len() as u32);
    }

    let adjusted = AdjustedGraph {
        base: Arc::clone(graph),
        at,
        states,
        out_start,
        adj_edge,
        adj_weight,
    };
    tracing::debug!(
        city = %graph.city(),
        %at,
        open = adjusted.open_edge_count(),
        blocked = adjusted.blocked_count(),
        "overlays applied"
    );
    adjusted
}
