//! Ready-made test fixtures on top of [`LifecycleGuard`].
//!
//! Rust test harnesses have no before/after hooks, so these fixtures start
//! their group on construction and release it on drop. Drop also runs while
//! a failing test unwinds, so teardown cannot be skipped by a panic.
//!
//! ```rust,no_run
//! use loopguard::{EventLoopFixture, EventLoopGroupFixture, WorkerCount};
//!
//! let fixture = EventLoopGroupFixture::start(WorkerCount::try_new(4)?)?;
//! fixture.group().execute(|| println!("on one of four loops"))?;
//!
//! let single = EventLoopFixture::start()?;
//! assert_eq!(single.event_loop().index(), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use crate::config::GroupConfig;
use crate::errors::ResourceCreationError;
use crate::event_loop::{EventLoop, EventLoopGroup};
use crate::guard::LifecycleGuard;
use crate::thread_factory::{NamedThreadFactory, ThreadFactory};
use crate::types::WorkerCount;

/// Thread name prefix used by fixtures that are not given a factory.
pub const FIXTURE_THREAD_NAME_PREFIX: &str = "loopguard-testing-event-loop";

/// A started event loop group released when the fixture is dropped.
#[derive(Debug)]
pub struct EventLoopGroupFixture {
    group: Arc<EventLoopGroup>,
    guard: LifecycleGuard,
}

impl EventLoopGroupFixture {
    /// Start a group of `worker_count` loops with fixture-named threads.
    pub fn start(worker_count: WorkerCount) -> Result<Self, ResourceCreationError> {
        Self::with_thread_factory(
            worker_count,
            Arc::new(NamedThreadFactory::new(FIXTURE_THREAD_NAME_PREFIX)),
        )
    }

    /// Start a group whose threads come from `thread_factory`.
    pub fn with_thread_factory(
        worker_count: WorkerCount,
        thread_factory: Arc<dyn ThreadFactory>,
    ) -> Result<Self, ResourceCreationError> {
        Self::from_guard(LifecycleGuard::new(worker_count, thread_factory))
    }

    /// Start a group described by `config`.
    pub fn from_config(config: &GroupConfig) -> Result<Self, ResourceCreationError> {
        Self::from_guard(LifecycleGuard::from_config(config))
    }

    fn from_guard(guard: LifecycleGuard) -> Result<Self, ResourceCreationError> {
        let group = guard.start()?;
        Ok(Self { group, guard })
    }

    /// The running group.
    pub fn group(&self) -> &Arc<EventLoopGroup> {
        &self.group
    }

    /// The guard that owns the group's lifecycle.
    pub const fn guard(&self) -> &LifecycleGuard {
        &self.guard
    }
}

impl Drop for EventLoopGroupFixture {
    fn drop(&mut self) {
        self.guard.after();
    }
}

/// A single started event loop released when the fixture is dropped.
#[derive(Debug)]
pub struct EventLoopFixture {
    inner: EventLoopGroupFixture,
}

impl EventLoopFixture {
    /// Start one event loop.
    pub fn start() -> Result<Self, ResourceCreationError> {
        Ok(Self {
            inner: EventLoopGroupFixture::start(WorkerCount::one())?,
        })
    }

    /// Start one event loop on a thread from `thread_factory`.
    pub fn with_thread_factory(
        thread_factory: Arc<dyn ThreadFactory>,
    ) -> Result<Self, ResourceCreationError> {
        Ok(Self {
            inner: EventLoopGroupFixture::with_thread_factory(WorkerCount::one(), thread_factory)?,
        })
    }

    /// The running event loop.
    pub fn event_loop(&self) -> &EventLoop {
        self.inner.group().next()
    }

    /// The single-loop group backing this fixture.
    pub fn group(&self) -> &Arc<EventLoopGroup> {
        self.inner.group()
    }
}

/// Run `test` against a freshly started group of `worker_count` loops.
///
/// The group is released when `test` returns or panics.
pub fn with_event_loop_group<T, R>(
    worker_count: WorkerCount,
    test: T,
) -> Result<R, ResourceCreationError>
where
    T: FnOnce(&EventLoopGroup) -> R,
{
    let fixture = EventLoopGroupFixture::start(worker_count)?;
    Ok(test(fixture.group()))
}
