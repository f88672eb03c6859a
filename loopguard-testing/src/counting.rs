//! Thread factory that counts the threads it creates.
//!
//! Used to prove the "no leaked threads" side of the lifecycle contract: a
//! thread counts as live from the moment it is requested until its body has
//! returned, so after a group has been released and joined
//! [`CountingThreadFactory::live_threads`] must be back to zero.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use loopguard::{NamedThreadFactory, ThreadBody, ThreadFactory};

/// Prefix for threads created by a default `CountingThreadFactory`.
pub const COUNTING_THREAD_NAME_PREFIX: &str = "loopguard-counting";

/// Wraps another factory, counting spawned and live threads.
///
/// An optional limit makes the factory refuse further threads once that many
/// have been created, simulating thread exhaustion.
#[derive(Debug)]
pub struct CountingThreadFactory {
    inner: Arc<dyn ThreadFactory>,
    limit: Option<usize>,
    spawned: AtomicUsize,
    refused: AtomicUsize,
    live: Arc<AtomicUsize>,
}

// Decrements the live counter when the thread body finishes, including by panic.
struct LiveThread(Arc<AtomicUsize>);

impl Drop for LiveThread {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CountingThreadFactory {
    /// Count threads created by a [`NamedThreadFactory`].
    pub fn new() -> Self {
        Self::wrapping(Arc::new(NamedThreadFactory::new(COUNTING_THREAD_NAME_PREFIX)))
    }

    /// Count threads created by `inner`.
    pub fn wrapping(inner: Arc<dyn ThreadFactory>) -> Self {
        Self {
            inner,
            limit: None,
            spawned: AtomicUsize::new(0),
            refused: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Refuse every thread after the first `limit`.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Threads successfully created so far.
    pub fn spawned_threads(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Thread requests refused so far, by the limit or the inner factory.
    pub fn refused_threads(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }

    /// Threads created whose body has not finished yet.
    pub fn live_threads(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for CountingThreadFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadFactory for CountingThreadFactory {
    fn new_thread(&self, body: ThreadBody) -> io::Result<JoinHandle<()>> {
        if self
            .limit
            .is_some_and(|limit| self.spawned.load(Ordering::SeqCst) >= limit)
        {
            self.refused.fetch_add(1, Ordering::SeqCst);
            return Err(io::Error::other("thread factory exhausted"));
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        let live = LiveThread(Arc::clone(&self.live));
        match self.inner.new_thread(Box::new(move || {
            let _live = live;
            body();
        })) {
            Ok(thread) => {
                self.spawned.fetch_add(1, Ordering::SeqCst);
                Ok(thread)
            }
            Err(error) => {
                // The rejected body, and with it `live`, has already been dropped.
                self.refused.fetch_add(1, Ordering::SeqCst);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_count_drops_when_body_finishes() {
        let factory = CountingThreadFactory::new();

        let thread = factory
            .new_thread(Box::new(|| {}))
            .expect("thread should start");
        thread.join().expect("thread should finish");

        assert_eq!(factory.spawned_threads(), 1);
        assert_eq!(factory.live_threads(), 0);
    }

    #[test]
    fn limit_refuses_extra_threads() {
        let factory = CountingThreadFactory::new().with_limit(1);

        let first = factory
            .new_thread(Box::new(|| {}))
            .expect("first thread allowed");
        let second = factory.new_thread(Box::new(|| {}));

        assert!(second.is_err());
        assert_eq!(factory.refused_threads(), 1);
        first.join().expect("thread should finish");
        assert_eq!(factory.live_threads(), 0);
    }
}
