//! `loopguard` - lifecycle guard for thread-pooled event loop groups in tests
//!
//! This library gives test fixtures deterministic setup and teardown around
//! an expensive, multi-threaded resource: a group of event loops, each a
//! dedicated OS thread driving a single-threaded tokio runtime.
//!
//! - [`LifecycleGuard`]: STOPPED/STARTED guard with `before()`, `resource()`
//!   and `after()`
//! - [`EventLoopGroup`] / [`EventLoop`]: the managed resource
//! - [`ThreadFactory`]: how event loop threads are created
//! - [`EventLoopGroupFixture`], [`EventLoopFixture`],
//!   [`with_event_loop_group`]: drop-based fixtures for Rust test harnesses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod errors;
pub mod event_loop;
pub mod fixture;
pub mod guard;
pub mod thread_factory;
pub mod types;

pub use config::GroupConfig;
pub use errors::{ConfigError, NotInitializedError, RejectedExecutionError, ResourceCreationError};
pub use event_loop::{EventLoop, EventLoopGroup, TERMINATION_SLACK};
pub use fixture::{with_event_loop_group, EventLoopFixture, EventLoopGroupFixture};
pub use guard::LifecycleGuard;
pub use thread_factory::{NamedThreadFactory, ThreadBody, ThreadFactory, DEFAULT_THREAD_NAME_PREFIX};
pub use types::{GracePeriodMs, WorkerCount, MAX_WORKER_COUNT};
