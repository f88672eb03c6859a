//! Event loops and event loop groups.
//!
//! An [`EventLoop`] is one OS thread, created through a [`ThreadFactory`],
//! that drives a tokio current-thread runtime until it is told to shut down.
//! An [`EventLoopGroup`] owns a fixed number of loops and hands work to them
//! round-robin.
//!
//! # Shutdown
//!
//! [`EventLoopGroup::shutdown_gracefully`] only signals the loops. Each loop
//! then stops accepting tasks, waits up to the group's grace period for the
//! tasks it already accepted, and finally drops its runtime, which cancels
//! whatever is still pending. Blocking work only gets what is left of the
//! same grace period, so a loop thread exits within roughly one grace period
//! of being signalled. [`EventLoopGroup::await_termination`] blocks
//! until the loop threads have exited and joins them.
//!
//! ```rust,no_run
//! use loopguard::{EventLoopGroup, GracePeriodMs, NamedThreadFactory, WorkerCount};
//! use std::time::Duration;
//!
//! let factory = NamedThreadFactory::new("example");
//! let group = EventLoopGroup::new(WorkerCount::one(), &factory, GracePeriodMs::default())?;
//!
//! group.execute(|| println!("running on an event loop"))?;
//!
//! group.shutdown_gracefully();
//! assert!(group.await_termination(Duration::from_secs(5)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::future::Future;
use std::io;
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder, Handle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::errors::{RejectedExecutionError, ResourceCreationError};
use crate::thread_factory::ThreadFactory;
use crate::types::{GracePeriodMs, WorkerCount};

/// Time allowed on top of the grace period for loop threads to exit after
/// their runtime has been dropped.
pub const TERMINATION_SLACK: Duration = Duration::from_secs(1);

/// One-shot gate opened when an event loop thread finishes.
#[derive(Debug, Default)]
struct Latch {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Latch {
    fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    fn is_open(&self) -> bool {
        *self.open.lock()
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut open = self.open.lock();
        while !*open {
            match deadline {
                Some(deadline) => {
                    if self.opened.wait_until(&mut open, deadline).timed_out() {
                        break;
                    }
                }
                None => self.opened.wait(&mut open),
            }
        }
        *open
    }
}

// Opens the latch when the loop thread leaves `run`, including by panic.
struct OpenOnDrop(Arc<Latch>);

impl Drop for OpenOnDrop {
    fn drop(&mut self) {
        self.0.open();
    }
}

/// A single-threaded event loop.
#[derive(Debug)]
pub struct EventLoop {
    index: usize,
    handle: Handle,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    terminated: Arc<Latch>,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    fn start(
        index: usize,
        thread_factory: &dyn ThreadFactory,
        grace_period: Duration,
    ) -> Result<Self, ResourceCreationError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<Handle>>(1);
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let terminated = Arc::new(Latch::default());

        let body = {
            let shutdown = shutdown.clone();
            let tracker = tracker.clone();
            let terminated = Arc::clone(&terminated);
            Box::new(move || run(index, ready_tx, shutdown, tracker, grace_period, terminated))
        };

        let thread = thread_factory
            .new_thread(body)
            .map_err(|source| ResourceCreationError::ThreadSpawn { index, source })?;

        // A factory that drops the body without running it closes the channel.
        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(source)) => {
                join_unstarted(index, thread);
                return Err(ResourceCreationError::RuntimeBuild { index, source });
            }
            Err(_) => {
                join_unstarted(index, thread);
                return Err(ResourceCreationError::LoopExited { index });
            }
        };

        tracing::debug!(
            event_loop = index,
            thread = thread.thread().name().unwrap_or("<unnamed>"),
            "event loop started"
        );

        Ok(Self {
            index,
            handle,
            tracker,
            shutdown,
            terminated,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Position of this loop within its group.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Handle to the runtime this loop drives.
    ///
    /// Tasks spawned directly through the handle bypass shutdown tracking and
    /// get no grace period.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Submit a future to run on this loop.
    pub fn spawn<F>(
        &self,
        future: F,
    ) -> Result<tokio::task::JoinHandle<F::Output>, RejectedExecutionError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(RejectedExecutionError { index: self.index });
        }
        Ok(self.handle.spawn(self.tracker.track_future(future)))
    }

    /// Submit a closure to run on this loop.
    pub fn execute<T>(&self, task: T) -> Result<(), RejectedExecutionError>
    where
        T: FnOnce() + Send + 'static,
    {
        self.spawn(async move { task() }).map(drop)
    }

    /// Whether the calling thread is this loop's thread.
    pub fn in_event_loop(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Number of accepted tasks that have not completed yet.
    pub fn pending_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Whether the loop thread has finished.
    pub fn is_terminated(&self) -> bool {
        self.terminated.is_open()
    }

    fn shutdown_gracefully(&self) {
        self.shutdown.cancel();
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        if self.in_event_loop() || !self.terminated.wait_for(timeout) {
            return false;
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                tracing::warn!(event_loop = self.index, "event loop thread panicked");
            }
        }
        true
    }
}

fn join_unstarted(index: usize, thread: JoinHandle<()>) {
    if thread.join().is_err() {
        tracing::warn!(event_loop = index, "event loop thread panicked before starting");
    }
}

fn run(
    index: usize,
    ready: mpsc::SyncSender<io::Result<Handle>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    grace_period: Duration,
    terminated: Arc<Latch>,
) {
    let _terminated = OpenOnDrop(terminated);

    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            // The creator is blocked on this channel; a send can only fail if it is gone.
            let _ = ready.send(Err(error));
            return;
        }
    };
    if ready.send(Ok(runtime.handle().clone())).is_err() {
        return;
    }
    drop(ready);

    let remaining = runtime.block_on(async {
        shutdown.cancelled().await;
        let deadline = Instant::now() + grace_period;
        tracker.close();
        if tokio::time::timeout(grace_period, tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                event_loop = index,
                pending_tasks = tracker.len(),
                grace_period = ?grace_period,
                "grace period elapsed, cancelling remaining tasks"
            );
        }
        deadline.saturating_duration_since(Instant::now())
    });
    // Blocking work gets whatever is left of the same grace period.
    runtime.shutdown_timeout(remaining);

    tracing::debug!(event_loop = index, "event loop terminated");
}

/// A fixed-size group of event loops.
///
/// Created with [`EventLoopGroup::new`]; released with
/// [`shutdown_gracefully`](Self::shutdown_gracefully). A group dropped
/// without an explicit shutdown signals its loops to stop but does not wait
/// for them.
#[derive(Debug)]
pub struct EventLoopGroup {
    loops: Vec<EventLoop>,
    next: AtomicUsize,
    grace_period: GracePeriodMs,
    shutdown_requested: AtomicBool,
}

impl EventLoopGroup {
    /// Start `worker_count` event loops, each on a thread from `thread_factory`.
    ///
    /// Loops start one after another. If any loop fails to start, the loops
    /// that already started are shut down and joined before the error is
    /// returned.
    pub fn new(
        worker_count: WorkerCount,
        thread_factory: &dyn ThreadFactory,
        grace_period: GracePeriodMs,
    ) -> Result<Self, ResourceCreationError> {
        let grace = grace_period.as_duration();
        let mut loops = Vec::with_capacity(worker_count.get());

        for index in 0..worker_count.get() {
            match EventLoop::start(index, thread_factory, grace) {
                Ok(event_loop) => loops.push(event_loop),
                Err(error) => {
                    tracing::warn!(
                        event_loop = index,
                        started = loops.len(),
                        %error,
                        "event loop group failed to start, releasing started loops"
                    );
                    let partial = Self::from_loops(loops, grace_period);
                    partial.shutdown_gracefully();
                    if !partial.await_termination(grace + TERMINATION_SLACK) {
                        tracing::warn!("started event loops did not terminate in time");
                    }
                    return Err(error);
                }
            }
        }

        tracing::debug!(worker_count = %worker_count, "event loop group started");
        Ok(Self::from_loops(loops, grace_period))
    }

    fn from_loops(loops: Vec<EventLoop>, grace_period: GracePeriodMs) -> Self {
        Self {
            loops,
            next: AtomicUsize::new(0),
            grace_period,
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// Pick the next event loop, round-robin.
    pub fn next(&self) -> &EventLoop {
        let position = self.next.fetch_add(1, Ordering::Relaxed) % self.loops.len();
        &self.loops[position]
    }

    /// Submit a future to the next event loop.
    pub fn spawn<F>(
        &self,
        future: F,
    ) -> Result<tokio::task::JoinHandle<F::Output>, RejectedExecutionError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.next().spawn(future)
    }

    /// Submit a closure to the next event loop.
    pub fn execute<T>(&self, task: T) -> Result<(), RejectedExecutionError>
    where
        T: FnOnce() + Send + 'static,
    {
        self.next().execute(task)
    }

    /// Iterate over the loops in index order.
    pub fn iter(&self) -> slice::Iter<'_, EventLoop> {
        self.loops.iter()
    }

    /// Number of event loops in the group.
    pub fn worker_count(&self) -> usize {
        self.loops.len()
    }

    /// Grace period granted to in-flight tasks on shutdown.
    pub const fn grace_period(&self) -> GracePeriodMs {
        self.grace_period
    }

    /// Whether the calling thread belongs to one of this group's loops.
    pub fn in_event_loop(&self) -> bool {
        self.loops.iter().any(EventLoop::in_event_loop)
    }

    /// Ask every loop to shut down. Returns without waiting.
    ///
    /// Calling this more than once has no further effect.
    pub fn shutdown_gracefully(&self) {
        if !self.shutdown_requested.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                worker_count = self.loops.len(),
                grace_period_ms = %self.grace_period,
                "shutting down event loop group"
            );
        }
        for event_loop in &self.loops {
            event_loop.shutdown_gracefully();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Whether every loop thread has finished.
    pub fn is_terminated(&self) -> bool {
        self.loops.iter().all(EventLoop::is_terminated)
    }

    /// Wait up to `timeout` for every loop thread to finish, joining each.
    ///
    /// Returns `false` if any loop is still running when the timeout expires.
    /// A loop whose thread is the caller is never waited on and always counts
    /// as still running.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut terminated = true;
        for event_loop in &self.loops {
            let remaining =
                deadline.map_or(timeout, |deadline| deadline.saturating_duration_since(Instant::now()));
            terminated &= event_loop.await_termination(remaining);
        }
        terminated
    }
}

impl<'a> IntoIterator for &'a EventLoopGroup {
    type Item = &'a EventLoop;
    type IntoIter = slice::Iter<'a, EventLoop>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Drop for EventLoopGroup {
    fn drop(&mut self) {
        if !self.is_shutting_down() && !self.loops.is_empty() {
            tracing::warn!(
                worker_count = self.loops.len(),
                "EventLoopGroup dropped without shutdown - stopping loops in background"
            );
            self.shutdown_gracefully();
        }
    }
}
