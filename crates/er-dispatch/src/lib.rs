//! `er-dispatch`: turns a patient location into a routed, tracked request.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                     |
//! |----------------|--------------------------------------------------------------|
//! | [`dispatcher`] | `Dispatcher`: resolve, confirm, reset, subscribe, batch      |
//! | [`decision`]   | `RoutingDecision`, `HospitalInfo`, `ResolveQuery`            |
//! | [`debug`]      | `DebugTrace`: the serializable debug view of one solve       |
//! | [`store`]      | `TraceStore` trait, `MemoryTraceStore`, `SqliteTraceStore`   |
//! | [`request`]    | `Request`, `RequestStatus`, `RequestBook`                    |
//! | [`config`]     | `DispatchConfig` (TOML)                                      |
//! | [`error`]      | `DispatchError`, `ErrorKind`, `DispatchResult<T>`            |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                      |
//! |------------|-------------------------------------------------------------|
//! | `parallel` | `resolve_batch` runs on the Rayon thread pool.              |
//! | `sqlite`   | Enables `SqliteTraceStore` and `er_graph::SqliteSource`.    |

pub mod config;
pub mod debug;
pub mod decision;
pub mod dispatcher;
pub mod error;
pub mod request;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::DispatchConfig;
pub use debug::{DebugEdge, DebugNode, DebugTrace};
pub use decision::{HospitalInfo, ResolveQuery, RoutingDecision};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use request::{Request, RequestBook, RequestStatus};
pub use store::{MemoryTraceStore, TraceStore};

#[cfg(feature = "sqlite")]
pub use store::SqliteTraceStore;
