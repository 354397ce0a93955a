//! Lifecycle callbacks for tracked requests.

use std::time::Duration;

use er_core::RequestId;

/// Callbacks invoked by [`LiveTracker`](crate::LiveTracker) as sessions
/// start and end.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Callbacks run on the tracker's tokio
/// tasks and must not block.
pub trait TrackerObserver: Send + Sync {
    /// A session began; the trip will take `duration`.
    fn on_started(&self, _request: RequestId, _duration: Duration) {}

    /// The trip finished.  Runs before the terminal event is sent, under the
    /// tracker's session lock, so it must not call back into the tracker.
    fn on_completed(&self, _request: RequestId) {}

    /// The session was cancelled before completing.
    fn on_cancelled(&self, _request: RequestId) {}
}

/// A [`TrackerObserver`] that does nothing.
pub struct NoopObserver;

impl TrackerObserver for NoopObserver {}
