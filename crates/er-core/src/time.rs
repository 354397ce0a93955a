//! Query time model.
//!
//! Overlay records (roadblocks, traffic updates) are resolved as a pure
//! function of a query time.  That time is a `Timestamp`: whole seconds since
//! the Unix epoch, the same unit the persistence layer stores.  Integer
//! seconds keep comparisons exact and make replaying a query trivial.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch (UTC).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    /// The current wall-clock time, truncated to whole seconds.
    ///
    /// A system clock set before 1970 yields `EPOCH`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Timestamp(secs)
    }

    #[inline]
    pub fn from_unix_secs(secs: i64) -> Self {
        Timestamp(secs)
    }

    #[inline]
    pub fn unix_secs(self) -> i64 {
        self.0
    }

    /// The timestamp `secs` seconds after `self` (negative moves backwards).
    #[inline]
    pub fn offset_secs(self, secs: i64) -> Timestamp {
        Timestamp(self.0.saturating_add(secs))
    }
}

impl std::ops::Sub for Timestamp {
    type Output = i64;
    #[inline]
    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
