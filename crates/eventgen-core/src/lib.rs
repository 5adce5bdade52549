#![doc = include_str!("../README.md")]

pub mod common;
pub mod pool;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use common::*;
pub use pool::{
    manager::WorkerPool,
    worker::{WorkerHandle, WorkerSettings},
};
pub use supervisor::{GeneratorState, GeneratorSupervisor, StartRequest};
