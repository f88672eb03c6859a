//! Start/stop lifecycle guard around an [`EventLoopGroup`].
//!
//! A [`LifecycleGuard`] is created with configuration only. `before()`
//! starts a group and publishes it, `resource()` hands it out, and `after()`
//! takes it back and shuts it down. The guard is either STOPPED (no group)
//! or STARTED (exactly one group); asking for the group while STOPPED is a
//! typed [`NotInitializedError`], never a stale handle.
//!
//! `before()` and `after()` are meant to be called from one controlling
//! thread, typically the thread running a test's setup and teardown.
//! `resource()` may be called from any thread.
//!
//! # Example
//!
//! ```rust,no_run
//! use loopguard::{LifecycleGuard, NamedThreadFactory, WorkerCount};
//! use std::sync::Arc;
//!
//! let guard = LifecycleGuard::new(WorkerCount::one(), Arc::new(NamedThreadFactory::default()));
//! assert!(guard.resource().is_err());
//!
//! guard.before()?;
//! let group = guard.resource()?;
//! group.execute(|| println!("hello from the event loop"))?;
//!
//! guard.after();
//! assert!(guard.resource().is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::GroupConfig;
use crate::errors::{NotInitializedError, ResourceCreationError};
use crate::event_loop::{EventLoopGroup, TERMINATION_SLACK};
use crate::thread_factory::ThreadFactory;
use crate::types::{GracePeriodMs, WorkerCount};

/// Owns the lifecycle of one event loop group at a time.
///
/// Dropping a started guard releases its group as `after()` would.
pub struct LifecycleGuard {
    worker_count: WorkerCount,
    thread_factory: Arc<dyn ThreadFactory>,
    grace_period: GracePeriodMs,
    group: RwLock<Option<Arc<EventLoopGroup>>>,
}

impl LifecycleGuard {
    /// Create a stopped guard.
    ///
    /// `worker_count` is a [`WorkerCount`], so it is already known to be
    /// between 1 and [`MAX_WORKER_COUNT`](crate::types::MAX_WORKER_COUNT).
    pub fn new(worker_count: WorkerCount, thread_factory: Arc<dyn ThreadFactory>) -> Self {
        Self {
            worker_count,
            thread_factory,
            grace_period: GracePeriodMs::default(),
            group: RwLock::new(None),
        }
    }

    /// Create a stopped guard from a [`GroupConfig`].
    pub fn from_config(config: &GroupConfig) -> Self {
        Self::new(config.worker_count, config.thread_factory()).with_grace_period(config.grace_period)
    }

    /// Replace the grace period used when releasing the group.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: GracePeriodMs) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Number of event loops each started group gets.
    pub const fn worker_count(&self) -> WorkerCount {
        self.worker_count
    }

    /// Grace period used when releasing the group.
    pub const fn grace_period(&self) -> GracePeriodMs {
        self.grace_period
    }

    /// Whether the guard currently holds a group.
    pub fn is_started(&self) -> bool {
        self.group.read().is_some()
    }

    /// Start a new event loop group and publish it.
    ///
    /// On error the guard stays stopped and can be started again. Calling
    /// this while already started keeps the current group.
    pub fn before(&self) -> Result<(), ResourceCreationError> {
        self.start().map(drop)
    }

    #[tracing::instrument(
        name = "before",
        skip(self),
        fields(worker_count = %self.worker_count, grace_period_ms = %self.grace_period)
    )]
    pub(crate) fn start(&self) -> Result<Arc<EventLoopGroup>, ResourceCreationError> {
        let mut slot = self.group.write();
        if let Some(group) = slot.as_ref() {
            tracing::warn!("guard already started, keeping the running event loop group");
            return Ok(Arc::clone(group));
        }

        let group = Arc::new(EventLoopGroup::new(
            self.worker_count,
            self.thread_factory.as_ref(),
            self.grace_period,
        )?);
        *slot = Some(Arc::clone(&group));

        tracing::info!("event loop group started");
        Ok(group)
    }

    /// Release the group, if any.
    ///
    /// The group is removed from the guard before shutdown starts, so no
    /// caller of `resource()` can obtain a group that is shutting down. This
    /// then waits for the loops to terminate, up to the grace period plus
    /// [`TERMINATION_SLACK`]. A no-op when stopped; never fails.
    #[tracing::instrument(name = "after", skip(self), fields(worker_count = %self.worker_count))]
    pub fn after(&self) {
        let taken = self.group.write().take();
        let Some(group) = taken else {
            return;
        };

        group.shutdown_gracefully();

        if group.in_event_loop() {
            tracing::debug!("released from inside the group, not waiting for termination");
            return;
        }

        let timeout = group.grace_period().as_duration() + TERMINATION_SLACK;
        if group.await_termination(timeout) {
            tracing::info!("event loop group released");
        } else {
            tracing::warn!(
                timeout = ?timeout,
                "event loop group did not terminate in time"
            );
        }
    }

    /// The started group.
    pub fn resource(&self) -> Result<Arc<EventLoopGroup>, NotInitializedError> {
        self.group.read().clone().ok_or(NotInitializedError)
    }
}

impl fmt::Debug for LifecycleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGuard")
            .field("worker_count", &self.worker_count)
            .field("thread_factory", &self.thread_factory)
            .field("grace_period", &self.grace_period)
            .field("started", &self.is_started())
            .finish()
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.after();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_factory::{NamedThreadFactory, ThreadBody};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::JoinHandle;
    use std::time::Duration;

    fn guard(workers: usize) -> LifecycleGuard {
        LifecycleGuard::new(
            WorkerCount::try_new(workers).expect("valid worker count"),
            Arc::new(NamedThreadFactory::new("guard-test")),
        )
        .with_grace_period(GracePeriodMs::try_new(100).expect("valid grace period"))
    }

    /// Refuses the first `failures` threads it is asked for.
    #[derive(Debug)]
    struct FlakyFactory {
        failures: AtomicUsize,
        inner: NamedThreadFactory,
    }

    impl ThreadFactory for FlakyFactory {
        fn new_thread(&self, body: ThreadBody) -> io::Result<JoinHandle<()>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(io::Error::other("thread factory exhausted"));
            }
            self.inner.new_thread(body)
        }
    }

    #[test]
    fn resource_before_start_is_not_initialized() {
        let guard = guard(1);

        assert_eq!(guard.resource().err(), Some(NotInitializedError));
        assert!(!guard.is_started());
    }

    #[test]
    fn before_then_resource_yields_group() {
        let guard = guard(2);

        guard.before().expect("group starts");
        let group = guard.resource().expect("group available");

        assert_eq!(group.worker_count(), 2);
        assert!(guard.is_started());
        guard.after();
    }

    #[test]
    fn after_without_before_is_noop() {
        let guard = guard(1);

        guard.after();

        assert!(!guard.is_started());
    }

    #[test]
    fn after_twice_is_noop_second_time() {
        let guard = guard(1);
        guard.before().expect("group starts");

        guard.after();
        guard.after();

        assert_eq!(guard.resource().err(), Some(NotInitializedError));
    }

    #[test]
    fn after_shuts_down_and_joins_group() {
        let guard = guard(2);
        guard.before().expect("group starts");
        let group = guard.resource().expect("group available");

        guard.after();

        assert!(group.is_shutting_down());
        assert!(group.is_terminated());
        assert_eq!(guard.resource().err(), Some(NotInitializedError));
    }

    #[test]
    fn guard_is_reusable_across_cycles() {
        let guard = guard(1);

        guard.before().expect("first start");
        let first = guard.resource().expect("first group");
        guard.after();
        guard.before().expect("second start");
        let second = guard.resource().expect("second group");

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.is_terminated());
        assert!(!second.is_shutting_down());
        guard.after();
    }

    #[test]
    fn before_while_started_keeps_current_group() {
        let guard = guard(1);
        guard.before().expect("group starts");
        let first = guard.resource().expect("group available");

        guard.before().expect("second before is accepted");

        let current = guard.resource().expect("group available");
        assert!(Arc::ptr_eq(&first, &current));
        guard.after();
    }

    #[test]
    fn failed_before_leaves_guard_stopped_and_retryable() {
        let factory = Arc::new(FlakyFactory {
            failures: AtomicUsize::new(1),
            inner: NamedThreadFactory::new("flaky"),
        });
        let guard = LifecycleGuard::new(WorkerCount::one(), factory);

        let error = guard.before().expect_err("first start fails");

        assert!(matches!(error, ResourceCreationError::ThreadSpawn { index: 0, .. }));
        assert_eq!(guard.resource().err(), Some(NotInitializedError));

        guard.before().expect("retry succeeds");
        assert!(guard.resource().is_ok());
        guard.after();
    }

    #[test]
    fn resource_is_visible_from_other_threads() {
        let guard = Arc::new(guard(1));
        guard.before().expect("group starts");

        let reader = Arc::clone(&guard);
        let worker_count = std::thread::spawn(move || {
            reader.resource().map(|group| group.worker_count())
        })
        .join()
        .expect("reader thread finishes");

        assert_eq!(worker_count, Ok(1));
        guard.after();
    }

    #[test]
    fn after_from_inside_event_loop_does_not_deadlock() {
        let guard = Arc::new(guard(1));
        guard.before().expect("group starts");
        let group = guard.resource().expect("group available");

        let inner = Arc::clone(&guard);
        let handle = group
            .spawn(async move { inner.after() })
            .expect("task accepted");
        futures::executor::block_on(handle).expect("task completes");

        assert!(!guard.is_started());
        assert!(group.await_termination(Duration::from_secs(10)));
    }

    #[test]
    fn dropping_started_guard_releases_group() {
        let guard = guard(1);
        guard.before().expect("group starts");
        let group = guard.resource().expect("group available");

        drop(guard);

        assert!(group.is_terminated());
    }

    #[test]
    fn from_config_uses_configured_values() {
        let config = GroupConfig::try_from_parts(3, 250).expect("valid configuration");

        let guard = LifecycleGuard::from_config(&config);

        assert_eq!(guard.worker_count().get(), 3);
        assert_eq!(guard.grace_period().as_duration(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn after_inside_async_context_completes() {
        let guard = guard(1);
        guard.before().expect("group starts");
        let group = guard.resource().expect("group available");

        let value = group.spawn(async { 21 * 2 }).expect("task accepted").await;
        guard.after();

        assert_eq!(value.expect("task completes"), 42);
        assert!(group.is_terminated());
    }

    #[test]
    #[tracing_test::traced_test]
    fn lifecycle_transitions_are_logged() {
        let guard = guard(1);

        guard.before().expect("group starts");
        guard.after();

        assert!(logs_contain("event loop group started"));
        assert!(logs_contain("event loop group released"));
    }
}
