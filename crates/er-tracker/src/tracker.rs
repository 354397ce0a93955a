//! Per-request tracking sessions and their subscribers.
//!
//! # Locking
//!
//! The session table sits behind one mutex that is held only to insert,
//! look up, or remove a session.  Each session guards its broadcast sender
//! with its own mutex; computing and sending an event, and subscribing,
//! both happen under it, so a subscriber's initial snapshot is never newer
//! than the first live event it receives.  Neither lock is held across an
//! `.await`.
//!
//! Completion takes the table lock while holding the feed lock, removes the
//! session, and runs [`TrackerObserver::on_completed`] before the terminal
//! event is sent.  Whoever removes the session from the table owns its end:
//! the tick loop completes it, or [`LiveTracker::cancel`] cancels it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use er_core::{GeoPoint, RequestId};

use crate::event::{TrackingEvent, TrackingStatus};
use crate::observer::{NoopObserver, TrackerObserver};
use crate::route::RoutePath;
use crate::{TrackerConfig, TrackerError, TrackerResult};

// ── Session ───────────────────────────────────────────────────────────────────

struct Session {
    request:  RequestId,
    route:    RoutePath,
    started:  Instant,
    duration: Duration,
    /// `None` once the terminal event is sent or the session is cancelled.
    feed:     Mutex<Option<broadcast::Sender<TrackingEvent>>>,
    task:     Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn event_at(&self, now: Instant) -> TrackingEvent {
        let elapsed = now.saturating_duration_since(self.started);
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };
        if progress >= 1.0 {
            return TrackingEvent {
                request:          self.request,
                status:           TrackingStatus::Completed,
                current_location: self.route.end(),
                eta_seconds:      0,
                progress:         1.0,
            };
        }
        let remaining = self.duration.saturating_sub(elapsed);
        TrackingEvent {
            request:          self.request,
            status:           TrackingStatus::EnRoute,
            current_location: self.route.position_at(progress),
            eta_seconds:      remaining.as_secs_f64().ceil() as u64,
            progress,
        }
    }

    /// Publish the current state.  Returns `false` once the session has
    /// nothing more to send.
    fn publish(&self, sessions: &Registry, observer: &dyn TrackerObserver) -> bool {
        let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = feed.as_ref() else {
            return false;
        };
        let event = self.event_at(Instant::now());
        if !event.is_completed() {
            // No receivers is not an error: nobody is watching yet.
            let _ = sender.send(event);
            return true;
        }

        {
            let mut table = lock(sessions);
            match table.get(&self.request) {
                Some(current) if std::ptr::eq(Arc::as_ptr(current), self) => {
                    table.remove(&self.request);
                }
                // Cancelled first; `cancel` closes the feed.
                _ => return false,
            }
            observer.on_completed(self.request);
        }
        tracing::info!(request = %self.request, "tracking completed");
        let _ = sender.send(event);
        // Dropping the sender closes every receiver after it drains.
        *feed = None;
        false
    }

    /// Take the sender, closing the feed.  `true` if it was still open.
    fn close(&self) -> bool {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner).take().is_some()
    }

    fn subscribe(&self) -> TrackerResult<Subscription> {
        let feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = feed.as_ref().ok_or(TrackerError::NotTracking(self.request))?;
        Ok(Subscription {
            request: self.request,
            initial: Some(self.event_at(Instant::now())),
            rx:      sender.subscribe(),
            done:    false,
        })
    }
}

type Registry = Arc<Mutex<FxHashMap<RequestId, Arc<Session>>>>;

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, FxHashMap<RequestId, Arc<Session>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── LiveTracker ───────────────────────────────────────────────────────────────

/// Runs one tick loop per tracked request and fans events out to subscribers.
///
/// Cheap to clone; clones share the same session table.
#[derive(Clone)]
pub struct LiveTracker {
    config:   TrackerConfig,
    sessions: Registry,
    observer: Arc<dyn TrackerObserver>,
}

impl LiveTracker {
    /// # Errors
    ///
    /// [`TrackerError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    pub fn with_observer(config: TrackerConfig, observer: Arc<dyn TrackerObserver>) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self { config, sessions: Arc::default(), observer })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Begin tracking `request` along `route`.
    ///
    /// The trip lasts [`TrackerConfig::trip_duration`] of `total_weight`; a
    /// single-point route lasts zero time and completes on the first tick.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::EmptyRoute`] if `route` is empty.
    /// - [`TrackerError::InvalidWeight`] for a negative or non-finite weight.
    /// - [`TrackerError::AlreadyTracking`] if a session for `request` is live.
    /// - [`TrackerError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self, request: RequestId, route: Vec<GeoPoint>, total_weight: f64) -> TrackerResult<Duration> {
        let route = RoutePath::new(route).ok_or(TrackerError::EmptyRoute(request))?;
        if !total_weight.is_finite() || total_weight < 0.0 {
            return Err(TrackerError::InvalidWeight { request, weight: total_weight });
        }
        let handle = Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;
        let duration = if route.len() == 1 {
            Duration::ZERO
        } else {
            self.config.trip_duration(total_weight)
        };

        let (sender, _) = broadcast::channel(self.config.channel_capacity);
        let session = Arc::new(Session {
            request,
            route,
            started: Instant::now(),
            duration,
            feed: Mutex::new(Some(sender)),
            task: Mutex::new(None),
        });

        {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(&request) {
                return Err(TrackerError::AlreadyTracking(request));
            }
            sessions.insert(request, Arc::clone(&session));
        }

        self.observer.on_started(request, duration);
        tracing::info!(%request, duration_secs = duration.as_secs_f64(), "tracking started");

        let task = handle.spawn(run_session(
            Arc::clone(&session),
            Arc::clone(&self.sessions),
            Arc::clone(&self.observer),
            self.config.tick_interval(),
        ));
        *session.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(duration)
    }

    /// Subscribe to `request`'s live feed.
    ///
    /// # Errors
    ///
    /// [`TrackerError::NotTracking`] if the request has no live session
    /// (never started, already completed, or cancelled).
    pub fn subscribe(&self, request: RequestId) -> TrackerResult<Subscription> {
        let session = lock(&self.sessions)
            .get(&request)
            .cloned()
            .ok_or(TrackerError::NotTracking(request))?;
        session.subscribe()
    }

    /// Current state of `request` without subscribing.
    pub fn snapshot(&self, request: RequestId) -> Option<TrackingEvent> {
        let session = lock(&self.sessions).get(&request).cloned()?;
        Some(session.event_at(Instant::now()))
    }

    /// Stop tracking `request` and close its feed.  Subscribers see the feed
    /// end without a terminal event.
    ///
    /// # Errors
    ///
    /// [`TrackerError::NotTracking`] if there is no live session.
    pub fn cancel(&self, request: RequestId) -> TrackerResult<()> {
        let session = lock(&self.sessions)
            .remove(&request)
            .ok_or(TrackerError::NotTracking(request))?;
        if !session.close() {
            return Err(TrackerError::NotTracking(request));
        }
        if let Some(task) = session.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
        self.observer.on_cancelled(request);
        tracing::info!(%request, "tracking cancelled");
        Ok(())
    }

    pub fn is_tracking(&self, request: RequestId) -> bool {
        lock(&self.sessions).contains_key(&request)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

async fn run_session(
    session:  Arc<Session>,
    sessions: Registry,
    observer: Arc<dyn TrackerObserver>,
    tick:     Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !session.publish(&sessions, observer.as_ref()) {
            break;
        }
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// One subscriber's view of a tracked request.
///
/// Yields the state at subscription time first, then live events.  Ends
/// after the `completed` event, or when the session is cancelled.
pub struct Subscription {
    request: RequestId,
    initial: Option<TrackingEvent>,
    rx:      broadcast::Receiver<TrackingEvent>,
    done:    bool,
}

impl Subscription {
    pub fn request(&self) -> RequestId {
        self.request
    }

    /// The state captured when subscribing, if not yet consumed.
    pub fn initial(&self) -> Option<&TrackingEvent> {
        self.initial.as_ref()
    }

    /// Next event, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<TrackingEvent> {
        if self.done {
            return None;
        }
        if let Some(event) = self.initial.take() {
            self.done = event.is_completed();
            return Some(event);
        }
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    self.done = event.is_completed();
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(request = %self.request, skipped, "subscriber lagging; events skipped");
                }
                Err(RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
