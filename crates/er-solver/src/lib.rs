//! `er-solver`: shortest paths with a complete, inspectable search trace.
//!
//! # Crate layout
//!
//! | Module       | Contents                                             |
//! |--------------|------------------------------------------------------|
//! | [`dijkstra`] | `PathSolver` trait, `TracedDijkstra`, `shortest_distances` |
//! | [`trace`]    | `Step`, `Solution`                                   |
//! | [`error`]    | `SolveError`, `SolveResult<T>`                       |
//!
//! Solvers work on an [`AdjustedGraph`](er_graph::AdjustedGraph): blocked
//! edges are already gone and traffic weights already applied, so the search
//! itself never looks at the clock.

pub mod dijkstra;
pub mod error;
pub mod trace;


pub use dijkstra::{PathSolver, TracedDijkstra, shortest_distances};
pub use error::{SolveError, SolveResult};
pub use trace::{Solution, Step};
