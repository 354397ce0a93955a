//! The request resolver and lifecycle driver.
//!
//! # Resolve pipeline
//!
//! ```text
//! validate coords ─▶ load graph (cached) ─▶ load overlays ─▶ adjust(at)
//!        ─▶ snap patient ─▶ solve ─▶ mint id ─▶ store trace ─▶ record pending
//! ```
//!
//! Every resolve builds its own [`AdjustedGraph`]; the only state shared
//! between concurrent resolves is the base-graph cache, the trace store, and
//! the request book.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use er_core::{CityId, GeoPoint, NodeId, RequestId, Timestamp};
use er_graph::{
    AdjustedGraph, CityGraph, CityInfo, GraphCache, GraphError, GraphSource, adjust, load_city_graph,
    load_graph_overlay_set,
};
use er_solver::{PathSolver, Solution, TracedDijkstra};
use er_tracker::{LiveTracker, Subscription, TrackerError};

use crate::config::DispatchConfig;
use crate::debug::DebugTrace;
use crate::decision::{HospitalInfo, ResolveQuery, RoutingDecision};
use crate::request::{Request, RequestBook, RequestStatus};
use crate::store::{MemoryTraceStore, TraceStore};
use crate::{DispatchError, DispatchResult};

/// Resolves emergency requests against one graph source and drives their
/// lifecycle through the live tracker.
///
/// Generic over the graph source `S`, trace store `T`, and solver `P`, the
/// way a simulation is generic over its behavior model and router.
pub struct Dispatcher<S: GraphSource, T: TraceStore = MemoryTraceStore, P: PathSolver = TracedDijkstra> {
    source:   S,
    store:    T,
    solver:   P,
    config:   DispatchConfig,
    cache:    GraphCache,
    requests: Arc<RequestBook>,
    tracker:  LiveTracker,
    next_id:  AtomicU64,
}

impl<S: GraphSource> Dispatcher<S> {
    /// In-memory traces and the traced Dijkstra solver.
    pub fn new(source: S, config: DispatchConfig) -> DispatchResult<Self> {
        Dispatcher::with_parts(source, MemoryTraceStore::new(), TracedDijkstra, config)
    }
}

impl<S: GraphSource, T: TraceStore, P: PathSolver> Dispatcher<S, T, P> {
    /// # Errors
    ///
    /// [`DispatchError::Config`] if `config` fails validation.
    pub fn with_parts(source: S, store: T, solver: P, config: DispatchConfig) -> DispatchResult<Self> {
        config.validate()?;
        let requests = Arc::new(RequestBook::new());
        let tracker = LiveTracker::with_observer(config.tracker.clone(), requests.clone())?;
        Ok(Self {
            source,
            store,
            solver,
            config,
            cache: GraphCache::new(),
            requests,
            tracker,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn tracker(&self) -> &LiveTracker {
        &self.tracker
    }

    /// Drop the cached base graph for `city` so the next query rebuilds it.
    pub fn invalidate_city(&self, city: CityId) -> bool {
        self.cache.invalidate(city)
    }

    // ── Graph access ──────────────────────────────────────────────────────

    fn graph(&self, city: CityId) -> DispatchResult<Arc<CityGraph>> {
        let loaded = if self.config.cache_graphs {
            self.cache.get_or_load(&self.source, city)
        } else {
            load_city_graph(&self.source, city)
        };
        loaded.map_err(|e| match e {
            GraphError::CityNotFound(city) => DispatchError::CityNotFound(city),
            other => DispatchError::Graph(other),
        })
    }

    fn adjusted(&self, graph: &Arc<CityGraph>, at: Timestamp) -> DispatchResult<AdjustedGraph> {
        let overlays = load_graph_overlay_set(&self.source, graph)?;
        Ok(adjust(graph, &overlays, at))
    }

    fn snap(graph: &CityGraph, patient: GeoPoint) -> DispatchResult<NodeId> {
        graph.snap_to_node(patient).ok_or(DispatchError::CityNotFound(graph.city()))
    }

    // ── Resolve ───────────────────────────────────────────────────────────

    /// Route from `patient` to the hospital node `hospital` as of `at`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidLocation`] for out-of-range coordinates.
    /// - [`DispatchError::CityNotFound`] if the city has no graph data.
    /// - [`DispatchError::UnknownDestination`] / [`DispatchError::NotAHospital`]
    ///   for a bad destination.
    ///
    /// An unreachable hospital is not an error: the decision comes back with
    /// an empty path.
    pub fn resolve_request(
        &self,
        city:     CityId,
        patient:  GeoPoint,
        hospital: NodeId,
        at:       Timestamp,
    ) -> DispatchResult<RoutingDecision> {
        let patient = GeoPoint::try_new(patient.lat, patient.lon)?;
        let graph = self.graph(city)?;
        let node = graph
            .node(hospital)
            .ok_or(DispatchError::UnknownDestination { city, node: hospital })?;
        if !node.is_hospital() {
            return Err(DispatchError::NotAHospital { city, node: hospital });
        }

        let adjusted = self.adjusted(&graph, at)?;
        let source = Self::snap(&graph, patient)?;
        let solution = self.solver.solve(&adjusted, source, hospital)?;
        self.record(adjusted, solution)
    }

    /// Route from `patient` to whichever hospital is quickest to reach as of
    /// `at`, smallest id on ties.
    ///
    /// If no hospital is reachable, the geographically closest one is chosen
    /// so the caller still receives an (unreachable) decision and its trace.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NoHospitals`] if the city has no hospital nodes, plus
    /// the errors of [`resolve_request`](Self::resolve_request).
    pub fn resolve_nearest_hospital(
        &self,
        city:    CityId,
        patient: GeoPoint,
        at:      Timestamp,
    ) -> DispatchResult<RoutingDecision> {
        let patient = GeoPoint::try_new(patient.lat, patient.lon)?;
        let graph = self.graph(city)?;
        if graph.hospitals().next().is_none() {
            return Err(DispatchError::NoHospitals(city));
        }

        let adjusted = self.adjusted(&graph, at)?;
        let source = Self::snap(&graph, patient)?;
        let distances = self.solver.distances(&adjusted, source)?;

        // Hospitals iterate in id order, so strict `<` keeps the smallest id.
        let mut best: Option<(NodeId, f64)> = None;
        for h in graph.hospitals() {
            if let Some(&d) = distances.get(&h.id) {
                if best.is_none_or(|(_, b)| d < b) {
                    best = Some((h.id, d));
                }
            }
        }
        let hospital = match best {
            Some((id, _)) => id,
            None => {
                let mut closest: Option<(NodeId, f64)> = None;
                for h in graph.hospitals() {
                    let d = patient.distance_deg2(h.pos);
                    if closest.is_none_or(|(_, b)| d < b) {
                        closest = Some((h.id, d));
                    }
                }
                let (id, _) = closest.ok_or(DispatchError::NoHospitals(city))?;
                tracing::warn!(%city, hospital = %id, "no hospital reachable; using the closest one");
                id
            }
        };

        let solution = self.solver.solve(&adjusted, source, hospital)?;
        self.record(adjusted, solution)
    }

    /// Mint an id, persist the trace, and record the request as pending.
    fn record(&self, adjusted: AdjustedGraph, solution: Solution) -> DispatchResult<RoutingDecision> {
        let request_id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let graph = adjusted.base();
        let route: Vec<GeoPoint> = solution
            .path
            .iter()
            .filter_map(|&n| graph.node(n).map(|node| node.pos))
            .collect();

        let decision = RoutingDecision {
            request_id,
            city_id: graph.city(),
            source_node: solution.source,
            destination_node: solution.destination,
            total_weight: solution.total_weight,
            total_distance_km: solution.total_distance_km,
            path: solution.path.clone(),
            route: route.clone(),
            at: adjusted.at(),
        };

        self.store.put(DebugTrace::build(request_id, &adjusted, solution))?;
        self.requests.insert(
            Request {
                id:               request_id,
                city_id:          decision.city_id,
                source_node:      decision.source_node,
                destination_node: decision.destination_node,
                created_at:       Timestamp::now(),
                status:           RequestStatus::Pending,
            },
            route,
            decision.total_weight,
        );

        if decision.is_reachable() {
            tracing::info!(
                request = %request_id,
                city = %decision.city_id,
                source = %decision.source_node,
                destination = %decision.destination_node,
                minutes = decision.total_weight.unwrap_or_default(),
                hops = decision.path.len().saturating_sub(1),
                "request resolved"
            );
        } else {
            tracing::warn!(
                request = %request_id,
                city = %decision.city_id,
                source = %decision.source_node,
                destination = %decision.destination_node,
                "destination unreachable"
            );
        }
        Ok(decision)
    }

    /// Resolve every query; `hospital: None` selects the nearest hospital.
    /// Results are in query order.  Runs in parallel with feature `parallel`.
    pub fn resolve_batch(&self, queries: &[ResolveQuery]) -> Vec<DispatchResult<RoutingDecision>> {
        let one = |q: &ResolveQuery| match q.hospital {
            Some(h) => self.resolve_request(q.city, q.patient, h, q.at),
            None => self.resolve_nearest_hospital(q.city, q.patient, q.at),
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            queries.par_iter().map(one).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            queries.iter().map(one).collect()
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Cities the source can route in: named ones alphabetically, then the
    /// rest by id.
    pub fn list_cities(&self) -> DispatchResult<Vec<CityInfo>> {
        Ok(self.source.cities()?)
    }

    /// Hospitals of `city` in id order.
    pub fn list_hospitals(&self, city: CityId) -> DispatchResult<Vec<HospitalInfo>> {
        let graph = self.graph(city)?;
        Ok(graph
            .hospitals()
            .map(|h| HospitalInfo { id: h.id, name: h.name.clone(), pos: h.pos })
            .collect())
    }

    pub fn get_trace(&self, request: RequestId) -> DispatchResult<Arc<DebugTrace>> {
        self.store.get(request)?.ok_or(DispatchError::TraceNotFound(request))
    }

    pub fn request(&self, request: RequestId) -> DispatchResult<Request> {
        self.requests.get(request).ok_or(DispatchError::RequestNotFound(request))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Confirm a pending request and start tracking it.  Returns the
    /// simulated trip duration.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::RequestNotFound`] for an unknown request.
    /// - [`DispatchError::Unreachable`] if the decision has no path.
    /// - [`DispatchError::InvalidTransition`] unless the request is pending.
    pub fn confirm(&self, request: RequestId) -> DispatchResult<Duration> {
        let (route, weight) = self
            .requests
            .route(request)
            .ok_or(DispatchError::RequestNotFound(request))?;
        let Some(weight) = weight.filter(|_| !route.is_empty()) else {
            return Err(DispatchError::Unreachable(request));
        };

        self.requests.transition(request, RequestStatus::Confirmed)?;
        // The tracker's start callback moves the request to en_route before
        // the first tick can complete it.
        match self.tracker.start(request, route, weight) {
            Ok(duration) => {
                tracing::info!(%request, secs = duration.as_secs_f64(), "request confirmed");
                Ok(duration)
            }
            Err(e) => {
                self.requests.transition(request, RequestStatus::Pending)?;
                Err(e.into())
            }
        }
    }

    /// Subscribe to a confirmed request's live feed.
    pub fn subscribe(&self, request: RequestId) -> DispatchResult<Subscription> {
        if self.requests.get(request).is_none() {
            return Err(DispatchError::RequestNotFound(request));
        }
        Ok(self.tracker.subscribe(request)?)
    }

    /// Stop any tracking and return a non-completed request to pending.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidTransition`] if the request already completed.
    pub fn reset(&self, request: RequestId) -> DispatchResult<Request> {
        let current = self.request(request)?;
        if current.status == RequestStatus::Completed {
            return Err(DispatchError::InvalidTransition {
                request,
                from: RequestStatus::Completed,
                to:   RequestStatus::Pending,
            });
        }
        match self.tracker.cancel(request) {
            // Never confirmed, or the trip finished after the check above;
            // the completed status then fails the transition below.
            Ok(()) | Err(TrackerError::NotTracking(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let reset = self.requests.transition(request, RequestStatus::Pending)?;
        tracing::info!(%request, "request reset");
        Ok(reset)
    }
}
