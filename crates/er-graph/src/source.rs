//! Graph sources: where city records and overlay rows come from.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::{FxHashMap, FxHashSet};

use er_core::{CityId, EdgeId, NodeId};

use crate::model::{CityInfo, CityRecords, OverlayRecords, Roadblock, TrafficUpdate};
use crate::network::{CityGraph, CityGraphBuilder};
use crate::overlay::OverlaySet;
use crate::{GraphError, GraphResult};

/// A provider of per-city graph data.
///
/// Implementations return the nodes belonging to `city`, the edges whose
/// endpoints both belong to it, and the overlay rows for those edges.
/// An unknown city yields empty records; [`load_city_graph`] turns that into
/// [`GraphError::CityNotFound`].
pub trait GraphSource: Send + Sync {
    /// Every city with at least one node, in [`sort_cities`] order.
    fn cities(&self) -> GraphResult<Vec<CityInfo>>;

    fn load_city(&self, city: CityId) -> GraphResult<CityRecords>;

    fn load_overlays(&self, city: CityId) -> GraphResult<OverlayRecords>;

    /// Overlay rows for the edges of `graph`, which was built from this
    /// source.  Sources that can only scope rows by reloading the city
    /// override this to scope against `graph` instead.
    fn load_graph_overlays(&self, graph: &CityGraph) -> GraphResult<OverlayRecords> {
        self.load_overlays(graph.city())
    }
}

impl<S: GraphSource + ?Sized> GraphSource for Arc<S> {
    fn cities(&self) -> GraphResult<Vec<CityInfo>> {
        (**self).cities()
    }

    fn load_city(&self, city: CityId) -> GraphResult<CityRecords> {
        (**self).load_city(city)
    }

    fn load_overlays(&self, city: CityId) -> GraphResult<OverlayRecords> {
        (**self).load_overlays(city)
    }

    fn load_graph_overlays(&self, graph: &CityGraph) -> GraphResult<OverlayRecords> {
        (**self).load_graph_overlays(graph)
    }
}

/// Load and build the base graph for `city`.
///
/// # Errors
///
/// [`GraphError::CityNotFound`] when the source has no nodes for `city`, or
/// any validation error from [`CityGraphBuilder::build`].
pub fn load_city_graph<S: GraphSource + ?Sized>(source: &S, city: CityId) -> GraphResult<Arc<CityGraph>> {
    let records = source.load_city(city)?;
    if records.nodes.is_empty() {
        return Err(GraphError::CityNotFound(city));
    }
    let (nodes, edges) = (records.nodes.len(), records.edges.len());
    let graph = CityGraphBuilder::from_records(records).build()?;
    tracing::debug!(%city, nodes, edges, "city graph built");
    Ok(Arc::new(graph))
}

/// Load and validate the overlay rows for `city`.
pub fn load_overlay_set<S: GraphSource + ?Sized>(source: &S, city: CityId) -> GraphResult<OverlaySet> {
    OverlaySet::from_records(source.load_overlays(city)?)
}

/// Load and validate the overlay rows for an already built `graph`.
pub fn load_graph_overlay_set<S: GraphSource + ?Sized>(source: &S, graph: &CityGraph) -> GraphResult<OverlaySet> {
    OverlaySet::from_records(source.load_graph_overlays(graph)?)
}

// ── Scoping helpers ───────────────────────────────────────────────────────────

/// Named cities alphabetically, then unnamed ones by id.
pub fn sort_cities(cities: &mut [CityInfo]) {
    cities.sort_by(|a, b| (a.name.is_none(), &a.name, a.id).cmp(&(b.name.is_none(), &b.name, b.id)));
}

/// Keep only edges whose endpoints both belong to `records.nodes`.
pub(crate) fn scope_edges(records: &mut CityRecords) {
    let ids: FxHashSet<NodeId> = records.nodes.iter().map(|n| n.id).collect();
    records.edges.retain(|e| ids.contains(&e.from) && ids.contains(&e.to));
}

/// Ids of the edges [`scope_edges`] would keep.
pub(crate) fn scoped_edge_ids(records: &CityRecords) -> FxHashSet<EdgeId> {
    let ids: FxHashSet<NodeId> = records.nodes.iter().map(|n| n.id).collect();
    records
        .edges
        .iter()
        .filter(|e| ids.contains(&e.from) && ids.contains(&e.to))
        .map(|e| e.id)
        .collect()
}

/// Keep only overlay rows whose edge passes `keep`.
pub(crate) fn scope_overlays(overlays: &mut OverlayRecords, keep: impl Fn(EdgeId) -> bool) {
    overlays.roadblocks.retain(|rb| keep(rb.edge));
    overlays.traffic.retain(|tu| keep(tu.edge));
}

// ── MemorySource ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct CityData {
    name:     Option<String>,
    records:  CityRecords,
    overlays: OverlayRecords,
}

/// In-memory graph source.  Overlay rows may be appended at runtime; the
/// next [`adjust`](crate::adjust) call sees them.
#[derive(Default)]
pub struct MemorySource {
    cities: RwLock<FxHashMap<CityId, CityData>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a city's nodes and edges.  Existing overlay rows
    /// for the city are kept.
    pub fn insert_city(&self, records: CityRecords) {
        let city = records.city;
        let mut cities = self.cities.write().unwrap_or_else(PoisonError::into_inner);
        cities.entry(city).or_default().records = records;
    }

    pub fn set_city_name(&self, city: CityId, name: impl Into<String>) {
        let mut cities = self.cities.write().unwrap_or_else(PoisonError::into_inner);
        cities.entry(city).or_default().name = Some(name.into());
    }

    pub fn add_roadblock(&self, city: CityId, roadblock: Roadblock) {
        let mut cities = self.cities.write().unwrap_or_else(PoisonError::into_inner);
        cities.entry(city).or_default().overlays.roadblocks.push(roadblock);
    }

    pub fn add_traffic_update(&self, city: CityId, update: TrafficUpdate) {
        let mut cities = self.cities.write().unwrap_or_else(PoisonError::into_inner);
        cities.entry(city).or_default().overlays.traffic.push(update);
    }

    pub fn city_count(&self) -> usize {
        let cities = self.cities.read().unwrap_or_else(PoisonError::into_inner);
        cities.values().filter(|c| !c.records.nodes.is_empty()).count()
    }
}

impl GraphSource for MemorySource {
    fn cities(&self) -> GraphResult<Vec<CityInfo>> {
        let cities = self.cities.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<CityInfo> = cities
            .iter()
            .filter(|(_, c)| !c.records.nodes.is_empty())
            .map(|(&id, c)| CityInfo::new(id, c.name.clone()))
            .collect();
        sort_cities(&mut out);
        Ok(out)
    }

    fn load_city(&self, city: CityId) -> GraphResult<CityRecords> {
        let cities = self.cities.read().unwrap_or_else(PoisonError::into_inner);
        let Some(data) = cities.get(&city) else {
            return Ok(CityRecords { city, ..CityRecords::default() });
        };
        let mut records = data.records.clone();
        scope_edges(&mut records);
        Ok(records)
    }

    fn load_overlays(&self, city: CityId) -> GraphResult<OverlayRecords> {
        let cities = self.cities.read().unwrap_or_else(PoisonError::into_inner);
        let Some(data) = cities.get(&city) else {
            return Ok(OverlayRecords::default());
        };
        let edges = scoped_edge_ids(&data.records);
        let mut overlays = data.overlays.clone();
        scope_overlays(&mut overlays, |e| edges.contains(&e));
        Ok(overlays)
    }
}
