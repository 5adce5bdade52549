//! Error types for the event generator.
//!
//! This module defines the central `Error` enum, which captures every failure
//! the generator core can report. Only a subset ever reaches the operator:
//!
//! ## Error Cases
//! - `Connection`: The message-bus connection could not be opened. Returned
//!   from `start`; the generator stays idle.
//! - `AlreadyRunning`: `start` was called while another generator is active.
//! - `InvalidRequest`: `start` was called with parameters the pool cannot
//!   honor, e.g. more workers than it can address. Nothing changes.
//! - `NotRunning`: A scaling request arrived while no generator is running.
//! - `Publish`: A single publish attempt failed. Workers log it and move on.
//! - `Release`: Closing the connection failed while draining. Logged only; the
//!   generator still returns to idle.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the event generator.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Opening the message-bus connection failed.
    #[error("Connection error: {context}")]
    Connection { context: String },

    /// A generator already occupies the starting, running or draining state.
    #[error("There is already a running generator")]
    AlreadyRunning,

    /// The start request cannot be honored.
    #[error("Invalid request: {context}")]
    InvalidRequest { context: String },

    /// The operation requires a running generator.
    #[error("There is no running generator")]
    NotRunning,

    /// A single message could not be published.
    #[error("Publish error: {context}")]
    Publish { context: String },

    /// Releasing the connection failed during drain.
    #[error("Release error: {context}")]
    Release { context: String },
}

impl Error {
    pub fn connection(context: impl Into<String>) -> Self {
        Self::Connection {
            context: context.into(),
        }
    }

    pub fn invalid_request(context: impl Into<String>) -> Self {
        Self::InvalidRequest {
            context: context.into(),
        }
    }

    pub fn publish(context: impl Into<String>) -> Self {
        Self::Publish {
            context: context.into(),
        }
    }

    pub fn release(context: impl Into<String>) -> Self {
        Self::Release {
            context: context.into(),
        }
    }
}
