//! Dynamically sized pool of publishing workers.
//!
//! ## Structure
//!
//! - [`manager`] - [`WorkerPool`](manager::WorkerPool): tracks live workers,
//!   scales them up and down, and signals when the last one leaves.
//! - [`worker`] - The publish loop each worker task runs.

pub mod manager;
pub mod worker;
