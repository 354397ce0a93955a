//! `er-graph`: per-city road graph, live overlays, and graph sources.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                     |
//! |-------------|--------------------------------------------------------------|
//! | [`model`]   | `Node`, `NodeKind`, `EdgeRecord`, `Roadblock`, `TrafficUpdate` |
//! | [`network`] | `CityGraph` (CSR + R-tree), `CityGraphBuilder`               |
//! | [`overlay`] | `OverlaySet`, `AdjustedGraph`, `adjust`                      |
//! | [`source`]  | `GraphSource` trait, `MemorySource`, `load_city_graph`       |
//! | [`csv`]     | `CsvSource` (directory of CSV tables)                        |
//! | [`cache`]   | `GraphCache`: read-mostly memo of base graphs per city       |
//! | [`sqlite`]  | `SqliteSource` (feature = `"sqlite"` only)                   |
//! | [`error`]   | `GraphError`, `GraphResult<T>`                               |
//!
//! # Feature flags
//!
//! | Flag     | Effect                                                     |
//! |----------|------------------------------------------------------------|
//! | `sqlite` | Enables `SqliteSource` via the `rusqlite` crate.           |

pub mod cache;
pub mod csv;
pub mod error;
pub mod model;
pub mod network;
pub mod overlay;
pub mod source;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use cache::GraphCache;
pub use csv::CsvSource;
pub use error::{GraphError, GraphResult};
pub use model::{CityInfo, CityRecords, EdgeRecord, Node, NodeKind, OverlayRecords, Roadblock, TrafficUpdate};
pub use network::{CityGraph, CityGraphBuilder, Edge};
pub use overlay::{AdjustedGraph, EdgeState, OverlaySet, adjust};
pub use source::{GraphSource, MemorySource, load_city_graph, load_graph_overlay_set, load_overlay_set, sort_cities};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;
