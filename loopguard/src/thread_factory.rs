//! Thread construction capability for event loops.
//!
//! An [`EventLoopGroup`](crate::EventLoopGroup) never calls
//! `std::thread::spawn` itself. Every event loop thread is created through a
//! [`ThreadFactory`], which decides how threads are named and sized and may
//! refuse to create one at all. A refusal surfaces as
//! [`ResourceCreationError::ThreadSpawn`](crate::ResourceCreationError::ThreadSpawn).

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Prefix used for event loop thread names when none is configured.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "loopguard-event-loop";

/// Work a factory-created thread must run.
pub type ThreadBody = Box<dyn FnOnce() + Send + 'static>;

/// Creates the OS threads that event loops run on.
///
/// Implementations must run `body` on the returned thread exactly once.
/// Returning an error leaves the group that asked for the thread unstarted.
pub trait ThreadFactory: Send + Sync + fmt::Debug {
    /// Create and start a thread running `body`.
    fn new_thread(&self, body: ThreadBody) -> io::Result<JoinHandle<()>>;
}

/// Thread factory that names threads `{prefix}-{n}`.
///
/// `n` counts up from zero for every thread this factory creates, so
/// successive groups built from one factory get distinct names.
#[derive(Debug)]
pub struct NamedThreadFactory {
    prefix: String,
    stack_size: Option<usize>,
    next_id: AtomicUsize,
}

impl NamedThreadFactory {
    /// Create a factory naming its threads after `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stack_size: None,
            next_id: AtomicUsize::new(0),
        }
    }

    /// Use a fixed stack size, in bytes, for every created thread.
    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// The thread name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of threads this factory has created so far.
    pub fn created(&self) -> usize {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl Default for NamedThreadFactory {
    fn default() -> Self {
        Self::new(DEFAULT_THREAD_NAME_PREFIX)
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn new_thread(&self, body: ThreadBody) -> io::Result<JoinHandle<()>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!("{}-{id}", self.prefix));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder.spawn(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_are_named_with_prefix_and_counter() {
        let factory = NamedThreadFactory::new("fixture");

        let first = factory
            .new_thread(Box::new(|| {}))
            .expect("thread should start");
        let second = factory
            .new_thread(Box::new(|| {}))
            .expect("thread should start");

        assert_eq!(first.thread().name(), Some("fixture-0"));
        assert_eq!(second.thread().name(), Some("fixture-1"));
        assert_eq!(factory.created(), 2);

        first.join().expect("thread should finish");
        second.join().expect("thread should finish");
    }

    #[test]
    fn body_runs_on_created_thread() {
        let factory = NamedThreadFactory::default().with_stack_size(256 * 1024);
        let (tx, rx) = std::sync::mpsc::channel();

        let handle = factory
            .new_thread(Box::new(move || {
                let name = thread::current().name().map(str::to_owned);
                tx.send(name).expect("receiver alive");
            }))
            .expect("thread should start");

        let name = rx.recv().expect("body should run");
        assert_eq!(name.as_deref(), Some("loopguard-event-loop-0"));
        handle.join().expect("thread should finish");
    }
}
