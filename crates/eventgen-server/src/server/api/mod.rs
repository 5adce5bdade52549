//! HTTP control surface of the generator.
//!
//! All routes live under `/api/msg` and operate on the single
//! [`GeneratorSupervisor`](eventgen_core::GeneratorSupervisor) owned by the
//! binary:
//!
//! - `POST /api/msg/random`: start a generator. Query parameters `threads`,
//!   `runtime` (minutes), `times` and `sleep` (seconds) override the
//!   configured defaults.
//! - `POST /api/msg/shutdown`: stop the active generator, if any.
//! - `POST /api/msg/scale?delta=`: add or remove workers while running.
//! - `GET /api/msg/status`: current state and worker count.

pub mod handler;

pub use handler::{AppState, router};
