//! SQLite graph source (feature `sqlite`).
//!
//! Reads four tables, plus an optional `cities` table of display names.
//! Times are INTEGER unix seconds.
//!
//! ```sql
//! nodes(id, lat, lon, name, type, city_id)
//! edges(id, from_node, to_node, weight, distance)
//! roadblocks(edge_id, start_time, end_time, reason)
//! traffic_updates(edge_id, new_weight, timestamp)
//! cities(id, name)
//! ```
//!
//! A NULL `type` is an intersection; a NULL `distance` is 0 km.  Edges and
//! overlay rows are scoped to the city by joining both endpoints against
//! `nodes`.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, params};

use er_core::{CityId, EdgeId, GeoPoint, NodeId, Timestamp};

use crate::model::{CityInfo, CityRecords, EdgeRecord, Node, NodeKind, OverlayRecords, Roadblock, TrafficUpdate};
use crate::source::{GraphSource, sort_cities};
use crate::GraphResult;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS nodes (
        id      INTEGER PRIMARY KEY,
        lat     REAL    NOT NULL,
        lon     REAL    NOT NULL,
        name    TEXT,
        type    TEXT,
        city_id INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS nodes_city ON nodes (city_id);
    CREATE TABLE IF NOT EXISTS edges (
        id        INTEGER PRIMARY KEY,
        from_node INTEGER NOT NULL,
        to_node   INTEGER NOT NULL,
        weight    REAL    NOT NULL,
        distance  REAL
    );
    CREATE TABLE IF NOT EXISTS roadblocks (
        edge_id    INTEGER NOT NULL,
        start_time INTEGER NOT NULL,
        end_time   INTEGER,
        reason     TEXT
    );
    CREATE TABLE IF NOT EXISTS traffic_updates (
        edge_id    INTEGER NOT NULL,
        new_weight REAL    NOT NULL,
        timestamp  INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS cities (
        id   INTEGER PRIMARY KEY,
        name TEXT
    );";

/// Edges whose endpoints both belong to `?1`.
const CITY_EDGES: &str = "
    SELECT e.id FROM edges e
    JOIN nodes a ON a.id = e.from_node AND a.city_id = ?1
    JOIN nodes b ON b.id = e.to_node   AND b.city_id = ?1";

/// Reads city graphs and overlays from an SQLite database.
pub struct SqliteSource {
    conn: Mutex<Connection>,
}

impl SqliteSource {
    /// Open an existing database.  The schema is not created.
    pub fn open(path: &Path) -> GraphResult<Self> {
        Ok(Self { conn: Mutex::new(Connection::open(path)?) })
    }

    /// A fresh in-memory database with the schema created.
    pub fn open_in_memory() -> GraphResult<Self> {
        let source = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        source.init_schema()?;
        Ok(source)
    }

    /// Create the tables if they do not exist.
    pub fn init_schema(&self) -> GraphResult<()> {
        self.with_connection(|conn| Ok(conn.execute_batch(SCHEMA)?))
    }

    /// Run `f` with exclusive access to the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> GraphResult<T>) -> GraphResult<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    /// Insert a city's nodes and edges in one transaction.
    pub fn insert_city(&self, records: &CityRecords) -> GraphResult<()> {
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO nodes (id, lat, lon, name, type, city_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for n in &records.nodes {
                    stmt.execute(params![
                        n.id.get(),
                        n.pos.lat,
                        n.pos.lon,
                        n.name,
                        n.kind.as_str(),
                        records.city.get(),
                    ])?;
                }
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO edges (id, from_node, to_node, weight, distance) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for e in &records.edges {
                    stmt.execute(params![e.id.get(), e.from.get(), e.to.get(), e.weight, e.distance_km])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Set a city's display name, replacing any earlier one.
    pub fn set_city_name(&self, city: CityId, name: &str) -> GraphResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cities (id, name) VALUES (?1, ?2)",
                params![city.get(), name],
            )?;
            Ok(())
        })
    }

    pub fn add_roadblock(&self, rb: &Roadblock) -> GraphResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO roadblocks (edge_id, start_time, end_time, reason) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![rb.edge.get(), rb.start.unix_secs(), rb.end.map(Timestamp::unix_secs), rb.reason],
            )?;
            Ok(())
        })
    }

    pub fn add_traffic_update(&self, tu: &TrafficUpdate) -> GraphResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO traffic_updates (edge_id, new_weight, timestamp) VALUES (?1, ?2, ?3)",
                params![tu.edge.get(), tu.new_weight, tu.timestamp.unix_secs()],
            )?;
            Ok(())
        })
    }
}

impl GraphSource for SqliteSource {
    fn cities(&self) -> GraphResult<Vec<CityInfo>> {
        self.with_connection(|conn| {
            let has_names: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'cities')",
                [],
                |r| r.get(0),
            )?;
            let sql = if has_names {
                "SELECT n.city_id, c.name FROM (SELECT DISTINCT city_id FROM nodes) n \
                 LEFT JOIN cities c ON c.id = n.city_id"
            } else {
                "SELECT DISTINCT city_id, NULL FROM nodes"
            };
            let mut stmt = conn.prepare_cached(sql)?;
            let mut cities = stmt
                .query_map([], |r| Ok(CityInfo::new(CityId(r.get(0)?), r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            sort_cities(&mut cities);
            Ok(cities)
        })
    }

    fn load_city(&self, city: CityId) -> GraphResult<CityRecords> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, lat, lon, name, type FROM nodes WHERE city_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![city.get()], |r| {
                Ok((
                    r.get::<_, u32>(0)?,
                    r.get::<_, f64>(1)?,
                    r.get::<_, f64>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                ))
            })?;
            let mut nodes = Vec::new();
            for row in rows {
                let (id, lat, lon, name, kind) = row?;
                let kind = match kind {
                    Some(s) => s.parse::<NodeKind>()?,
                    None => NodeKind::Intersection,
                };
                nodes.push(Node { id: NodeId(id), pos: GeoPoint::new(lat, lon), name, kind });
            }

            let mut stmt = conn.prepare_cached(&format!(
                "SELECT id, from_node, to_node, weight, distance FROM edges \
                 WHERE id IN ({CITY_EDGES}) ORDER BY id"
            ))?;
            let edges = stmt
                .query_map(params![city.get()], |r| {
                    Ok(EdgeRecord::new(
                        EdgeId(r.get(0)?),
                        NodeId(r.get(1)?),
                        NodeId(r.get(2)?),
                        r.get(3)?,
                        r.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(CityRecords { city, nodes, edges })
        })
    }

    fn load_overlays(&self, city: CityId) -> GraphResult<OverlayRecords> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT edge_id, start_time, end_time, reason FROM roadblocks \
                 WHERE edge_id IN ({CITY_EDGES}) ORDER BY rowid"
            ))?;
            let roadblocks = stmt
                .query_map(params![city.get()], |r| {
                    Ok(Roadblock {
                        edge:   EdgeId(r.get(0)?),
                        start:  Timestamp(r.get(1)?),
                        end:    r.get::<_, Option<i64>>(2)?.map(Timestamp),
                        reason: r.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare_cached(&format!(
                "SELECT edge_id, new_weight, timestamp FROM traffic_updates \
                 WHERE edge_id IN ({CITY_EDGES}) ORDER BY rowid"
            ))?;
            let traffic = stmt
                .query_map(params![city.get()], |r| {
                    Ok(TrafficUpdate::new(EdgeId(r.get(0)?), r.get(1)?, Timestamp(r.get(2)?)))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(OverlayRecords { roadblocks, traffic })
        })
    }
}
