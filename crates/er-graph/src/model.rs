//! Records exchanged with graph sources.
//!
//! These are the engine's view of the persistence tables: plain values with
//! no behavior beyond parsing and time checks.  `CityGraph` is built from
//! `CityRecords`; `OverlaySet` is built from `OverlayRecords`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use er_core::{CityId, EdgeId, GeoPoint, NodeId, Timestamp};

use crate::GraphError;

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// What a node represents in the city.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Intersection,
    Hospital,
    PatientSnap,
}

impl NodeKind {
    /// Label as stored in the `nodes.type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Intersection => "intersection",
            NodeKind::Hospital     => "hospital",
            NodeKind::PatientSnap  => "patient_snap",
        }
    }
}

impl FromStr for NodeKind {
    type Err = GraphError;

    /// Parses the `nodes.type` column.  An empty value means intersection.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "intersection"                       => Ok(NodeKind::Intersection),
            "hospital"                                => Ok(NodeKind::Hospital),
            "patient_snap" | "patient-snap" | "patient" => Ok(NodeKind::PatientSnap),
            other => Err(GraphError::Parse(format!(
                "unknown node type {other:?}: expected \"intersection\", \"hospital\", or \"patient_snap\""
            ))),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph node.  Immutable once loaded for a city.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id:   NodeId,
    pub pos:  GeoPoint,
    pub name: Option<String>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, pos: GeoPoint, kind: NodeKind) -> Self {
        Self { id, pos, name: None, kind }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn is_hospital(&self) -> bool {
        self.kind == NodeKind::Hospital
    }
}

// ── Edges ─────────────────────────────────────────────────────────────────────

/// One row of the `edges` table: a directed road segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeRecord {
    pub id:          EdgeId,
    pub from:        NodeId,
    pub to:          NodeId,
    /// Base travel time in minutes.
    pub weight:      f64,
    pub distance_km: f64,
}

impl EdgeRecord {
    pub fn new(id: EdgeId, from: NodeId, to: NodeId, weight: f64, distance_km: f64) -> Self {
        Self { id, from, to, weight, distance_km }
    }
}

// ── Cities ────────────────────────────────────────────────────────────────────

/// A city a source can serve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityInfo {
    pub id:   CityId,
    pub name: Option<String>,
}

impl CityInfo {
    pub fn new(id: CityId, name: Option<String>) -> Self {
        Self { id, name: name.filter(|n| !n.trim().is_empty()) }
    }
}

/// Everything needed to build one city's base graph.
#[derive(Clone, Debug, Default)]
pub struct CityRecords {
    pub city:  CityId,
    pub nodes: Vec<Node>,
    pub edges: Vec<EdgeRecord>,
}

// ── Overlays ──────────────────────────────────────────────────────────────────

/// A time-bounded closure of one directed edge.
#[derive(Clone, Debug, PartialEq)]
pub struct Roadblock {
    pub edge:   EdgeId,
    pub start:  Timestamp,
    /// `None` means the closure is open-ended.
    pub end:    Option<Timestamp>,
    pub reason: Option<String>,
}

impl Roadblock {
    pub fn new(edge: EdgeId, start: Timestamp, end: Option<Timestamp>) -> Self {
        Self { edge, start, end, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// `start <= at` and (`end` is open or `end >= at`).
    #[inline]
    pub fn is_active(&self, at: Timestamp) -> bool {
        self.start <= at && self.end.is_none_or(|end| end >= at)
    }
}

/// A time-stamped override of one directed edge's travel time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrafficUpdate {
    pub edge:       EdgeId,
    pub new_weight: f64,
    pub timestamp:  Timestamp,
}

impl TrafficUpdate {
    pub fn new(edge: EdgeId, new_weight: f64, timestamp: Timestamp) -> Self {
        Self { edge, new_weight, timestamp }
    }
}

/// Append-only overlay rows for one city, in source order.
#[derive(Clone, Debug, Default)]
pub struct OverlayRecords {
    pub roadblocks: Vec<Roadblock>,
    pub traffic:    Vec<TrafficUpdate>,
}
