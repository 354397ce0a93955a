//! Debug trace persistence.
//!
//! Traces are written once per resolved request and read back on demand.
//! Backends implement [`TraceStore`]; the dispatcher is generic over it.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;

use er_core::RequestId;

use crate::debug::DebugTrace;
use crate::DispatchResult;

/// Storage for debug traces keyed by request id.
///
/// Implementations must be `Send + Sync`; one store serves every query of a
/// dispatcher, including parallel batches.
pub trait TraceStore: Send + Sync {
    /// Store `trace` under its `request_id`.  Request ids are never reused,
    /// so a put never overwrites another request's trace.
    fn put(&self, trace: DebugTrace) -> DispatchResult<()>;

    /// `Ok(None)` if nothing is stored for `request`.
    fn get(&self, request: RequestId) -> DispatchResult<Option<Arc<DebugTrace>>>;
}

// ── MemoryTraceStore ──────────────────────────────────────────────────────────

/// Keeps every trace in memory for the dispatcher's lifetime.
#[derive(Default)]
pub struct MemoryTraceStore {
    traces: RwLock<FxHashMap<RequestId, Arc<DebugTrace>>>,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.traces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceStore for MemoryTraceStore {
    fn put(&self, trace: DebugTrace) -> DispatchResult<()> {
        let mut traces = self.traces.write().unwrap_or_else(PoisonError::into_inner);
        traces.insert(trace.request_id, Arc::new(trace));
        Ok(())
    }

    fn get(&self, request: RequestId) -> DispatchResult<Option<Arc<DebugTrace>>> {
        let traces = self.traces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(traces.get(&request).cloned())
    }
}

// ── SqliteTraceStore ──────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTraceStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::path::Path;
    use std::sync::{Arc, Mutex, PoisonError};

    use rusqlite::{Connection, OptionalExtension, params};

    use er_core::RequestId;

    use super::TraceStore;
    use crate::debug::DebugTrace;
    use crate::{DispatchError, DispatchResult};

    /// Stores each trace as one JSON document in a `debug_traces` table.
    pub struct SqliteTraceStore {
        conn: Mutex<Connection>,
    }

    impl SqliteTraceStore {
        /// Open (or create) the database at `path` and initialise the schema.
        pub fn open(path: &Path) -> DispatchResult<Self> {
            Self::init(Connection::open(path)?)
        }

        pub fn open_in_memory() -> DispatchResult<Self> {
            Self::init(Connection::open_in_memory()?)
        }

        fn init(conn: Connection) -> DispatchResult<Self> {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS debug_traces (
                     request_id INTEGER PRIMARY KEY,
                     city_id    INTEGER NOT NULL,
                     at         INTEGER NOT NULL,
                     trace      TEXT    NOT NULL
                 );",
            )?;
            Ok(Self { conn: Mutex::new(conn) })
        }

        pub fn len(&self) -> DispatchResult<usize> {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM debug_traces", [], |r| r.get(0))?;
            Ok(n as usize)
        }
    }

    impl TraceStore for SqliteTraceStore {
        fn put(&self, trace: DebugTrace) -> DispatchResult<()> {
            let json = trace.to_json().map_err(|e| DispatchError::Store(e.to_string()))?;
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.execute(
                "INSERT OR REPLACE INTO debug_traces (request_id, city_id, at, trace) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![trace.request_id.get() as i64, trace.city_id.get(), trace.at.unix_secs(), json],
            )?;
            Ok(())
        }

        fn get(&self, request: RequestId) -> DispatchResult<Option<Arc<DebugTrace>>> {
            let json: Option<String> = {
                let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
                conn.query_row(
                    "SELECT trace FROM debug_traces WHERE request_id = ?1",
                    params![request.get() as i64],
                    |r| r.get(0),
                )
                .optional()?
            };
            json.map(|j| {
                DebugTrace::from_json(&j)
                    .map(Arc::new)
                    .map_err(|e| DispatchError::Store(format!("request {request}: {e}")))
            })
            .transpose()
        }
    }
}
