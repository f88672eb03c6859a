//! Error types for loopguard.
//!
//! Errors are split by the operation that produces them so that callers can
//! match on exactly the failures an operation can report:
//!
//! - **ResourceCreationError**: starting an event loop group failed
//! - **NotInitializedError**: the guard was asked for a group while stopped
//! - **RejectedExecutionError**: a task was submitted to a loop that is shutting down
//! - **ConfigError**: a configuration value failed validation
//!
//! Shutdown has no error type. Teardown problems are logged, never returned,
//! so that cleanup cannot mask the outcome of the test that ran before it.

use std::io;

use thiserror::Error;

use crate::types::{GracePeriodMsError, WorkerCountError};

/// Errors that can occur while starting an event loop group.
///
/// When one of these is returned every event loop that had already started
/// has been shut down and joined, so a failed start leaks no threads.
#[derive(Debug, Error)]
pub enum ResourceCreationError {
    /// The thread factory could not create the thread for an event loop.
    #[error("thread factory failed to create event loop {index}: {source}")]
    ThreadSpawn {
        /// Position of the event loop within its group
        index: usize,
        /// The error reported by the thread factory
        #[source]
        source: io::Error,
    },

    /// The event loop thread started but could not build its runtime.
    #[error("event loop {index} failed to build its runtime: {source}")]
    RuntimeBuild {
        /// Position of the event loop within its group
        index: usize,
        /// The error reported by the runtime builder
        #[source]
        source: io::Error,
    },

    /// The thread factory returned a thread that never reported readiness.
    #[error("event loop {index} exited before it became ready")]
    LoopExited {
        /// Position of the event loop within its group
        index: usize,
    },
}

impl ResourceCreationError {
    /// Position of the event loop that failed to start.
    pub const fn index(&self) -> usize {
        match self {
            Self::ThreadSpawn { index, .. }
            | Self::RuntimeBuild { index, .. }
            | Self::LoopExited { index } => *index,
        }
    }
}

/// Returned when a guard's resource is requested while the guard is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event loop group not initialized")]
pub struct NotInitializedError;

/// Returned when a task is submitted to an event loop that is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event loop {index} is shutting down and rejected the task")]
pub struct RejectedExecutionError {
    /// Position of the rejecting event loop within its group
    pub index: usize,
}

/// Errors produced while validating configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The worker count was zero or above the maximum.
    #[error("invalid worker count: {0}")]
    InvalidWorkerCount(#[from] WorkerCountError),

    /// The grace period was above the maximum.
    #[error("invalid grace period: {0}")]
    InvalidGracePeriod(#[from] GracePeriodMsError),
}
