//! `er-core`: foundational types for the `rust_er` emergency routing engine.
//!
//! This crate is a dependency of every other `er-*` crate.  It has no `er-*`
//! dependencies and only two external ones (`serde` and `thiserror`).
//!
//! # What lives here
//!
//! | Module    | Contents                                              |
//! |-----------|-------------------------------------------------------|
//! | [`ids`]   | `CityId`, `NodeId`, `EdgeId`, `RequestId`             |
//! | [`geo`]   | `GeoPoint`, haversine distance, interpolation         |
//! | [`time`]  | `Timestamp` (unix seconds)                            |
//! | [`error`] | `CoreError`, `CoreResult`                             |

pub mod error;
pub mod geo;
pub mod ids;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::GeoPoint;
pub use ids::{CityId, EdgeId, NodeId, RequestId};
pub use time::Timestamp;
