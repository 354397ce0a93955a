//! `er-tracker`: simulated vehicle progress along a confirmed route.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`config`]   | `TrackerConfig` (tick interval, duration model, capacity) |
//! | [`route`]    | `RoutePath`: distance-based interpolation along a path    |
//! | [`event`]    | `TrackingEvent`, `TrackingStatus`                         |
//! | [`observer`] | `TrackerObserver` lifecycle callbacks, `NoopObserver`     |
//! | [`tracker`]  | `LiveTracker`, `Subscription`                             |
//! | [`error`]    | `TrackerError`, `TrackerResult<T>`                        |
//!
//! # Model
//!
//! Each tracked request owns one tokio task and one broadcast channel.  The
//! task publishes a [`TrackingEvent`] every tick until progress reaches 1,
//! sends exactly one `completed` event, and closes the channel.  Subscribers
//! get the current state immediately and the live feed afterwards.

pub mod config;
pub mod error;
pub mod event;
pub mod observer;
pub mod route;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use event::{TrackingEvent, TrackingStatus};
pub use observer::{NoopObserver, TrackerObserver};
pub use route::RoutePath;
pub use tracker::{LiveTracker, Subscription};
