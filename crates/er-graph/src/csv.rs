//! CSV directory graph source.
//!
//! # Directory layout
//!
//! | File                  | Required | Columns                                  |
//! |-----------------------|----------|------------------------------------------|
//! | `nodes.csv`           | yes      | `id,lat,lon,name,type,city_id`           |
//! | `edges.csv`           | yes      | `id,from_node,to_node,weight,distance`   |
//! | `roadblocks.csv`      | no       | `edge_id,start_time,end_time,reason`     |
//! | `traffic_updates.csv` | no       | `edge_id,new_weight,timestamp`           |
//! | `cities.csv`          | no       | `id,name`                                |
//!
//! ```csv
//! id,lat,lon,name,type,city_id
//! 7,24.8600,67.0000,Saddar,intersection,1
//! 13,24.8700,67.0200,Civil Hospital,hospital,1
//! ```
//!
//! Times are unix seconds.  An empty `end_time` means the roadblock is
//! open-ended; an empty `type` means intersection; an empty `distance`
//! means 0 km.
//!
//! Files are re-read on every load, so rows appended between queries are
//! picked up by the next one.  Overlay loads for an already built graph
//! read only the two overlay tables.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::Deserialize;

use er_core::{CityId, EdgeId, GeoPoint, NodeId, Timestamp};

use crate::model::{CityInfo, CityRecords, EdgeRecord, Node, NodeKind, OverlayRecords, Roadblock, TrafficUpdate};
use crate::network::CityGraph;
use crate::source::{GraphSource, scope_edges, scope_overlays, scoped_edge_ids, sort_cities};
use crate::{GraphError, GraphResult};

// ── CSV records ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NodeRow {
    id:      u32,
    lat:     f64,
    lon:     f64,
    #[serde(default)]
    name:    Option<String>,
    #[serde(default, rename = "type")]
    kind:    Option<String>,
    city_id: u32,
}

#[derive(Deserialize)]
struct EdgeRow {
    id:        u32,
    from_node: u32,
    to_node:   u32,
    weight:    f64,
    #[serde(default)]
    distance:  Option<f64>,
}

#[derive(Deserialize)]
struct CityRow {
    id:   u32,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RoadblockRow {
    edge_id:    u32,
    start_time: i64,
    #[serde(default)]
    end_time:   Option<i64>,
    #[serde(default)]
    reason:     Option<String>,
}

#[derive(Deserialize)]
struct TrafficRow {
    edge_id:    u32,
    new_weight: f64,
    timestamp:  i64,
}

// ── Readers ───────────────────────────────────────────────────────────────────

/// Parse `nodes.csv` rows belonging to `city`.
pub fn read_nodes<R: Read>(reader: R, city: CityId) -> GraphResult<Vec<Node>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut nodes = Vec::new();
    for result in rdr.deserialize::<NodeRow>() {
        let row = result.map_err(|e| GraphError::Parse(format!("nodes.csv: {e}")))?;
        if row.city_id != city.get() {
            continue;
        }
        let kind = match row.kind.as_deref() {
            Some(s) => s.parse::<NodeKind>()?,
            None => NodeKind::Intersection,
        };
        nodes.push(Node {
            id:   NodeId(row.id),
            pos:  GeoPoint::new(row.lat, row.lon),
            name: row.name.filter(|n| !n.trim().is_empty()),
            kind,
        });
    }
    Ok(nodes)
}

/// Distinct `city_id` values of `nodes.csv`, ascending.
pub fn read_node_cities<R: Read>(reader: R) -> GraphResult<Vec<CityId>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut ids = Vec::new();
    for result in rdr.deserialize::<NodeRow>() {
        let row = result.map_err(|e| GraphError::Parse(format!("nodes.csv: {e}")))?;
        ids.push(CityId(row.city_id));
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Parse `cities.csv` into an id to name map.
pub fn read_city_names<R: Read>(reader: R) -> GraphResult<FxHashMap<CityId, String>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut names = FxHashMap::default();
    for result in rdr.deserialize::<CityRow>() {
        let row = result.map_err(|e| GraphError::Parse(format!("cities.csv: {e}")))?;
        if let Some(name) = row.name.filter(|n| !n.trim().is_empty()) {
            names.insert(CityId(row.id), name);
        }
    }
    Ok(names)
}

/// Parse every row of `edges.csv`.  City scoping happens afterwards.
pub fn read_edges<R: Read>(reader: R) -> GraphResult<Vec<EdgeRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<EdgeRow>()
        .map(|result| {
            let row = result.map_err(|e| GraphError::Parse(format!("edges.csv: {e}")))?;
            Ok(EdgeRecord::new(
                EdgeId(row.id),
                NodeId(row.from_node),
                NodeId(row.to_node),
                row.weight,
                row.distance.unwrap_or(0.0),
            ))
        })
        .collect()
}

pub fn read_roadblocks<R: Read>(reader: R) -> GraphResult<Vec<Roadblock>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<RoadblockRow>()
        .map(|result| {
            let row = result.map_err(|e| GraphError::Parse(format!("roadblocks.csv: {e}")))?;
            Ok(Roadblock {
                edge:   EdgeId(row.edge_id),
                start:  Timestamp(row.start_time),
                end:    row.end_time.map(Timestamp),
                reason: row.reason.filter(|r| !r.trim().is_empty()),
            })
        })
        .collect()
}

pub fn read_traffic<R: Read>(reader: R) -> GraphResult<Vec<TrafficUpdate>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<TrafficRow>()
        .map(|result| {
            let row = result.map_err(|e| GraphError::Parse(format!("traffic_updates.csv: {e}")))?;
            Ok(TrafficUpdate::new(EdgeId(row.edge_id), row.new_weight, Timestamp(row.timestamp)))
        })
        .collect()
}

// ── CsvSource ─────────────────────────────────────────────────────────────────

/// Reads a directory of CSV tables.
#[derive(Clone, Debug)]
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn open(&self, name: &str) -> GraphResult<File> {
        Ok(File::open(self.dir.join(name))?)
    }

    /// `None` when the optional table is absent.
    fn open_optional(&self, name: &str) -> GraphResult<Option<File>> {
        let path = self.dir.join(name);
        if path.exists() { Ok(Some(File::open(path)?)) } else { Ok(None) }
    }

    fn city_records(&self, city: CityId) -> GraphResult<CityRecords> {
        let nodes = read_nodes(self.open("nodes.csv")?, city)?;
        let edges = read_edges(self.open("edges.csv")?)?;
        Ok(CityRecords { city, nodes, edges })
    }

    /// Every roadblock and traffic row, unscoped.
    fn overlay_records(&self) -> GraphResult<OverlayRecords> {
        Ok(OverlayRecords {
            roadblocks: match self.open_optional("roadblocks.csv")? {
                Some(f) => read_roadblocks(f)?,
                None => Vec::new(),
            },
            traffic: match self.open_optional("traffic_updates.csv")? {
                Some(f) => read_traffic(f)?,
                None => Vec::new(),
            },
        })
    }
}

impl GraphSource for CsvSource {
    fn cities(&self) -> GraphResult<Vec<CityInfo>> {
        let ids = read_node_cities(self.open("nodes.csv")?)?;
        let mut names = match self.open_optional("cities.csv")? {
            Some(f) => read_city_names(f)?,
            None => FxHashMap::default(),
        };
        let mut cities: Vec<CityInfo> = ids.into_iter().map(|id| CityInfo::new(id, names.remove(&id))).collect();
        sort_cities(&mut cities);
        Ok(cities)
    }

    fn load_city(&self, city: CityId) -> GraphResult<CityRecords> {
        let mut records = self.city_records(city)?;
        scope_edges(&mut records);
        Ok(records)
    }

    fn load_overlays(&self, city: CityId) -> GraphResult<OverlayRecords> {
        let edges = scoped_edge_ids(&self.city_records(city)?);
        let mut overlays = self.overlay_records()?;
        scope_overlays(&mut overlays, |e| edges.contains(&e));
        Ok(overlays)
    }

    /// Reads only the overlay tables; `graph` supplies the city's edges.
    fn load_graph_overlays(&self, graph: &CityGraph) -> GraphResult<OverlayRecords> {
        let mut overlays = self.overlay_records()?;
        scope_overlays(&mut overlays, |e| graph.edge_index(e).is_some());
        Ok(overlays)
    }
}
