//! Per-city road graph and builder.
//!
//! # Data layout
//!
//! Nodes are stored sorted by `NodeId`, so a node's dense index orders the
//! same way as its id.  Outgoing edges use **Compressed Sparse Row (CSR)**
//! format over those dense indices:
//!
//! ```text
//! edges[ node_out_start[i] .. node_out_start[i+1] ]
//! ```
//!
//! Within a node's slice, edges are sorted by `EdgeId`, which makes neighbor
//! iteration order (and therefore every search trace) deterministic.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `(lat, lon)` to the nearest node.  Used to
//! snap a patient location to the graph.

use std::ops::Range;

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use rustc_hash::FxHashMap;

use er_core::{CityId, EdgeId, GeoPoint, NodeId};

use crate::model::{CityRecords, EdgeRecord, Node};
use crate::{GraphError, GraphResult};

// ── R-tree node entry ─────────────────────────────────────────────────────────

/// Entry stored in the R-tree: a `[lat, lon]` point with the node's dense
/// index.
#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2], // [lat, lon]
    idx:   u32,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in lat/lon space.  Sufficient for
    /// nearest-node queries within a city.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

// ── Edge ──────────────────────────────────────────────────────────────────────

/// A directed road segment as stored in the base graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub id:          EdgeId,
    pub from:        NodeId,
    pub to:          NodeId,
    /// Base travel time in minutes.  Never overwritten by traffic.
    pub base_weight: f64,
    pub distance_km: f64,
}

// ── CityGraph ─────────────────────────────────────────────────────────────────

/// Directed road graph for one city in CSR format plus a spatial index.
///
/// Immutable after [`CityGraphBuilder::build`].  Shared across concurrent
/// queries as `Arc<CityGraph>`; per-query edge weights live in
/// [`AdjustedGraph`](crate::AdjustedGraph).
pub struct CityGraph {
    city: CityId,

    // ── Node data (sorted by NodeId) ──────────────────────────────────────
    nodes:      Vec<Node>,
    node_index: FxHashMap<NodeId, u32>,

    // ── CSR edge adjacency ────────────────────────────────────────────────
    /// Outgoing edges of node index `i` are at edge indices
    /// `node_out_start[i] .. node_out_start[i+1]`.  Length = `node_count + 1`.
    node_out_start: Vec<u32>,

    // ── Edge data (indexed by position in sorted order) ───────────────────
    edges: Vec<Edge>,
    /// Dense index of each edge's source node.
    edge_from: Vec<u32>,
    /// Dense index of each edge's destination node.
    edge_to:    Vec<u32>,
    edge_index: FxHashMap<EdgeId, u32>,

    spatial_idx: RTree<NodeEntry>,
}

impl CityGraph {
    pub fn city(&self) -> CityId {
        self.city
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges, grouped by source node.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index(id).map(|i| &self.nodes[i])
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index(id).map(|i| &self.edges[i])
    }

    /// Dense index of `id`, usable with [`node_at`](Self::node_at) and
    /// [`out_edges`](Self::out_edges).
    #[inline]
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.node_index.get(&id).map(|&i| i as usize)
    }

    #[inline]
    pub fn edge_index(&self, id: EdgeId) -> Option<usize> {
        self.edge_index.get(&id).map(|&i| i as usize)
    }

    #[inline]
    pub fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    #[inline]
    pub fn edge_at(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    pub fn hospitals(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| n.is_hospital())
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Edge indices of all outgoing edges from node index `node`.
    ///
    /// A contiguous index range; no allocation.
    #[inline]
    pub fn out_edges(&self, node: usize) -> Range<usize> {
        let start = self.node_out_start[node] as usize;
        let end   = self.node_out_start[node + 1] as usize;
        start..end
    }

    /// Dense index of the source node of edge index `edge`.
    #[inline]
    pub fn edge_source(&self, edge: usize) -> usize {
        self.edge_from[edge] as usize
    }

    /// Dense index of the destination node of edge index `edge`.
    #[inline]
    pub fn edge_target(&self, edge: usize) -> usize {
        self.edge_to[edge] as usize
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// The node nearest to `pos` by straight-line distance in lat/lon space.
    ///
    /// Equidistant candidates resolve to the smallest `NodeId`.  Returns
    /// `None` only if the graph has no nodes, which `build` never produces.
    pub fn snap_to_node(&self, pos: GeoPoint) -> Option<NodeId> {
        let mut candidates = self
            .spatial_idx
            .nearest_neighbor_iter_with_distance_2(&[pos.lat, pos.lon]);
        let (first, best) = candidates.next()?;
        let mut winner = first.idx;
        for (entry, d2) in candidates {
            if d2 > best {
                break;
            }
            winner = winner.min(entry.idx);
        }
        Some(self.nodes[winner as usize].id)
    }
}

impl std::fmt::Debug for CityGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CityGraph")
            .field("city", &self.city)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

// ── CityGraphBuilder ──────────────────────────────────────────────────────────

/// Construct a [`CityGraph`] incrementally, then call [`build`](Self::build).
///
/// Nodes and edges may be added in any order.  `build()` validates the
/// records, sorts nodes by id and edges by (source, id), builds the CSR
/// arrays, and bulk-loads the R-tree.
///
/// # Example
///
/// ```
/// use er_core::{CityId, EdgeId, GeoPoint, NodeId};
/// use er_graph::{CityGraphBuilder, EdgeRecord, Node, NodeKind};
///
/// let mut b = CityGraphBuilder::new(CityId(1));
/// b.add_node(Node::new(NodeId(1), GeoPoint::new(24.86, 67.00), NodeKind::Intersection));
/// b.add_node(Node::new(NodeId(2), GeoPoint::new(24.87, 67.01), NodeKind::Hospital));
/// b.add_road(EdgeId(10), EdgeId(11), NodeId(1), NodeId(2), 4.0, 1.6);
/// let graph = b.build().unwrap();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 2); // bidirectional
/// ```
pub struct CityGraphBuilder {
    city:  CityId,
    nodes: Vec<Node>,
    edges: Vec<EdgeRecord>,
}

impl CityGraphBuilder {
    pub fn new(city: CityId) -> Self {
        Self { city, nodes: Vec::new(), edges: Vec::new() }
    }

    /// Seed a builder from a source's records.
    pub fn from_records(records: CityRecords) -> Self {
        Self { city: records.city, nodes: records.nodes, edges: records.edges }
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Add a **directed** edge.
    pub fn add_edge(&mut self, edge: EdgeRecord) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Convenience: add a two-way road as two directed edges, `forward`
    /// running `a → b` and `backward` running `b → a`.
    pub fn add_road(
        &mut self,
        forward:     EdgeId,
        backward:    EdgeId,
        a:           NodeId,
        b:           NodeId,
        weight:      f64,
        distance_km: f64,
    ) -> &mut Self {
        self.add_edge(EdgeRecord::new(forward, a, b, weight, distance_km));
        self.add_edge(EdgeRecord::new(backward, b, a, weight, distance_km));
        self
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    /// Consume the builder and produce a [`CityGraph`].
    ///
    /// # Errors
    ///
    /// - [`GraphError::CityNotFound`] if no nodes were added.
    /// - [`GraphError::DuplicateNode`] / [`GraphError::DuplicateEdge`].
    /// - [`GraphError::InvalidNode`] for out-of-range coordinates.
    /// - [`GraphError::DanglingEdge`] if an edge endpoint is not a node.
    /// - [`GraphError::InvalidEdge`] for negative or non-finite weights or
    ///   distances.
    pub fn build(self) -> GraphResult<CityGraph> {
        let city = self.city;
        if self.nodes.is_empty() {
            return Err(GraphError::CityNotFound(city));
        }

        // ── Nodes ─────────────────────────────────────────────────────────
        let mut nodes = self.nodes;
        nodes.sort_unstable_by_key(|n| n.id);
        for pair in nodes.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(GraphError::DuplicateNode { city, node: pair[0].id });
            }
        }
        if let Some(bad) = nodes.iter().find(|n| !n.pos.is_valid()) {
            return Err(GraphError::InvalidNode {
                city,
                node:   bad.id,
                reason: format!("coordinate {} is out of range", bad.pos),
            });
        }
        let node_index: FxHashMap<NodeId, u32> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i as u32))
            .collect();

        // ── Edges ─────────────────────────────────────────────────────────
        let mut raw: Vec<(u32, u32, EdgeRecord)> = Vec::with_capacity(self.edges.len());
        for e in self.edges {
            validate_edge(city, &e)?;
            let from = *node_index
                .get(&e.from)
                .ok_or(GraphError::DanglingEdge { city, edge: e.id, node: e.from })?;
            let to = *node_index
                .get(&e.to)
                .ok_or(GraphError::DanglingEdge { city, edge: e.id, node: e.to })?;
            raw.push((from, to, e));
        }
        raw.sort_unstable_by_key(|(from, _, e)| (*from, e.id));

        let mut edge_index: FxHashMap<EdgeId, u32> =
            FxHashMap::with_capacity_and_hasher(raw.len(), Default::default());
        for (i, (_, _, e)) in raw.iter().enumerate() {
            if edge_index.insert(e.id, i as u32).is_some() {
                return Err(GraphError::DuplicateEdge { city, edge: e.id });
            }
        }

        let edge_from: Vec<u32> = raw.iter().map(|(from, _, _)| *from).collect();
        let edge_to:   Vec<u32> = raw.iter().map(|(_, to, _)| *to).collect();
        let edges: Vec<Edge> = raw
            .iter()
            .map(|(_, _, e)| Edge {
                id:          e.id,
                from:        e.from,
                to:          e.to,
                base_weight: e.weight,
                distance_km: e.distance_km,
            })
            .collect();

        // ── CSR row pointer ───────────────────────────────────────────────
        let node_count = nodes.len();
        let mut node_out_start = vec![0u32; node_count + 1];
        for &from in &edge_from {
            node_out_start[from as usize + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edges.len());

        // Bulk-load R-tree for O(N log N) construction.
        let entries: Vec<NodeEntry> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| NodeEntry { point: [n.pos.lat, n.pos.lon], idx: i as u32 })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        Ok(CityGraph {
            city,
            nodes,
            node_index,
            node_out_start,
            edges,
            edge_from,
            edge_to,
            edge_index,
            spatial_idx,
        })
    }
}

fn validate_edge(city: CityId, e: &EdgeRecord) -> GraphResult<()> {
    let reason = if !e.weight.is_finite() || e.weight < 0.0 {
        format!("weight {} must be finite and non-negative", e.weight)
    } else if !e.distance_km.is_finite() || e.distance_km < 0.0 {
        format!("distance {} km must be finite and non-negative", e.distance_km)
    } else {
        return Ok(());
    };
    Err(GraphError::InvalidEdge { city, edge: e.id, reason })
}
