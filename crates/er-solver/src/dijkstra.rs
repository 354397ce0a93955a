//! Solver trait and the default traced Dijkstra.
//!
//! # Pluggability
//!
//! The dispatcher calls search through the [`PathSolver`] trait, so a
//! different algorithm can be swapped in as long as it produces the same
//! [`Solution`] shape, trace included.
//!
//! # Ordering
//!
//! The priority queue orders by tentative distance, then by node id.  Node
//! indices in a [`CityGraph`](er_graph::CityGraph) follow id order, so the
//! secondary key compares indices directly.  Neighbors are relaxed in edge-id
//! order.  Together these make every trace reproducible.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use er_core::{EdgeId, NodeId};
use er_graph::AdjustedGraph;

use crate::trace::{Solution, Step};
use crate::{SolveError, SolveResult};

// ── PathSolver trait ──────────────────────────────────────────────────────────

/// Pluggable shortest-path engine.
///
/// Implementations must be `Send + Sync` so one solver can serve parallel
/// batch queries.
pub trait PathSolver: Send + Sync {
    /// Shortest path from `from` to `to` with its full search trace.
    ///
    /// An unreachable destination is a normal [`Solution`] with an empty
    /// path; only unknown nodes are errors.
    fn solve(&self, graph: &AdjustedGraph, from: NodeId, to: NodeId) -> SolveResult<Solution>;

    /// Best distance from `from` to every reachable node.
    fn distances(&self, graph: &AdjustedGraph, from: NodeId) -> SolveResult<BTreeMap<NodeId, f64>> {
        shortest_distances(graph, from)
    }
}

// ── TracedDijkstra ────────────────────────────────────────────────────────────

/// Dijkstra's algorithm recording a [`Step`] after every finalized node.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracedDijkstra;

impl PathSolver for TracedDijkstra {
    fn solve(&self, graph: &AdjustedGraph, from: NodeId, to: NodeId) -> SolveResult<Solution> {
        traced_dijkstra(graph, from, to)
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

/// Heap entry.  `Ord` is reversed so `BinaryHeap` (a max-heap) pops the
/// smallest cost first, then the smallest node index.
#[derive(Clone, Copy, Debug)]
struct State {
    cost: f64,
    node: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

fn index_of(graph: &AdjustedGraph, node: NodeId) -> SolveResult<usize> {
    graph
        .node_index(node)
        .ok_or(SolveError::UnknownNode { city: graph.base().city(), node })
}

/// Per-query search arrays, indexed by dense node index.
struct Search {
    dist:      Vec<f64>,
    /// Base edge index that reached each node; `u32::MAX` when unreached.
    prev_edge: Vec<u32>,
    settled:   Vec<bool>,
    heap:      BinaryHeap<State>,
}

const NO_EDGE: u32 = u32::MAX;

impl Search {
    fn new(n: usize, source: usize) -> Self {
        let mut search = Search {
            dist:      vec![f64::INFINITY; n],
            prev_edge: vec![NO_EDGE; n],
            settled:   vec![false; n],
            heap:      BinaryHeap::new(),
        };
        search.dist[source] = 0.0;
        search.heap.push(State { cost: 0.0, node: source as u32 });
        search
    }

    /// Pop the next unsettled node and relax its open edges.  Returns `None`
    /// once the queue is exhausted.
    fn advance(&mut self, graph: &AdjustedGraph) -> Option<usize> {
        while let Some(State { cost, node }) = self.heap.pop() {
            let u = node as usize;
            // Stale entry: a cheaper one already finalized this node.
            if self.settled[u] {
                continue;
            }
            self.settled[u] = true;
            for (v, w, e) in graph.neighbors(u) {
                if self.settled[v] {
                    continue;
                }
                let nc = cost + w;
                if nc < self.dist[v] {
                    self.dist[v] = nc;
                    self.prev_edge[v] = e as u32;
                    self.heap.push(State { cost: nc, node: v as u32 });
                }
            }
            return Some(u);
        }
        None
    }

    /// Record the current state.  Node indices ascend with node ids, so a
    /// single scan yields both maps in id order.
    fn snapshot(&self, graph: &AdjustedGraph, current: Option<usize>, visited: &[NodeId]) -> Step {
        let base = graph.base();
        let mut distances = BTreeMap::new();
        let mut frontier = Vec::new();
        for (i, &d) in self.dist.iter().enumerate() {
            if d.is_finite() {
                let id = base.node_at(i).id;
                distances.insert(id, d);
                if !self.settled[i] {
                    frontier.push(id);
                }
            }
        }
        Step {
            current: current.map(|i| base.node_at(i).id),
            distances,
            visited: visited.to_vec(),
            frontier,
        }
    }
}

fn traced_dijkstra(graph: &AdjustedGraph, from: NodeId, to: NodeId) -> SolveResult<Solution> {
    let source = index_of(graph, from)?;
    let target = index_of(graph, to)?;
    let base = graph.base();

    let mut search = Search::new(graph.node_count(), source);
    let mut visited: Vec<NodeId> = Vec::new();
    let mut trace = vec![search.snapshot(graph, None, &visited)];

    let mut reached = false;
    while let Some(u) = search.advance(graph) {
        visited.push(base.node_at(u).id);
        trace.push(search.snapshot(graph, Some(u), &visited));
        if u == target {
            reached = true;
            break;
        }
    }

    if !reached {
        tracing::debug!(city = %base.city(), %from, %to, visited = visited.len(), "destination unreachable");
        return Ok(Solution {
            source: from,
            destination: to,
            path: Vec::new(),
            edges: Vec::new(),
            total_weight: None,
            total_distance_km: None,
            trace,
        });
    }

    // ── Reconstruct via predecessor edges ─────────────────────────────────
    let mut edge_idx = Vec::new();
    let mut cur = target;
    while search.prev_edge[cur] != NO_EDGE {
        let e = search.prev_edge[cur] as usize;
        edge_idx.push(e);
        cur = base.edge_source(e);
    }
    edge_idx.reverse();

    let mut path = Vec::with_capacity(edge_idx.len() + 1);
    path.push(from);
    let mut edges: Vec<EdgeId> = Vec::with_capacity(edge_idx.len());
    let mut distance_km = 0.0;
    for &e in &edge_idx {
        let edge = base.edge_at(e);
        path.push(edge.to);
        edges.push(edge.id);
        distance_km += edge.distance_km;
    }

    Ok(Solution {
        source: from,
        destination: to,
        path,
        edges,
        total_weight: Some(search.dist[target]),
        total_distance_km: Some(distance_km),
        trace,
    })
}

/// Single-source distances to every reachable node, without a trace.
pub fn shortest_distances(graph: &AdjustedGraph, from: NodeId) -> SolveResult<BTreeMap<NodeId, f64>> {
    let source = index_of(graph, from)?;
    let mut search = Search::new(graph.node_count(), source);
    while search.advance(graph).is_some() {}

    let base = graph.base();
    Ok(search
        .dist
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_finite())
        .map(|(i, &d)| (base.node_at(i).id, d))
        .collect())
}
