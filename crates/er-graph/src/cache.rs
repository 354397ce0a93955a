//! Read-mostly memo of base graphs, one per city.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;

use er_core::CityId;

use crate::network::CityGraph;
use crate::source::{GraphSource, load_city_graph};
use crate::GraphResult;

/// Shares each city's immutable [`CityGraph`] across queries.
///
/// Lookups take the read lock only.  A miss builds the graph without holding
/// any lock, then inserts it; if two queries race on the same city the first
/// insert wins and both receive the same `Arc`.
#[derive(Default)]
pub struct GraphCache {
    graphs: RwLock<FxHashMap<CityId, Arc<CityGraph>>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, city: CityId) -> Option<Arc<CityGraph>> {
        let graphs = self.graphs.read().unwrap_or_else(PoisonError::into_inner);
        graphs.get(&city).cloned()
    }

    /// Return the cached graph for `city`, loading it from `source` on a miss.
    pub fn get_or_load<S: GraphSource + ?Sized>(&self, source: &S, city: CityId) -> GraphResult<Arc<CityGraph>> {
        if let Some(graph) = self.get(city) {
            tracing::debug!(%city, "graph cache hit");
            return Ok(graph);
        }
        let loaded = load_city_graph(source, city)?;
        let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
        let graph = graphs.entry(city).or_insert(loaded);
        tracing::debug!(%city, "graph cached");
        Ok(Arc::clone(graph))
    }

    /// Drop the cached graph for `city`; the next query reloads it.
    pub fn invalidate(&self, city: CityId) -> bool {
        let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
        graphs.remove(&city).is_some()
    }

    pub fn clear(&self) {
        self.graphs.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.graphs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
