//! Assertions for lifecycle invariants.
//!
//! Each assertion panics with a message naming the violated invariant, so a
//! failing fixture test reads as "what went wrong" rather than as a bare
//! boolean mismatch.

use std::time::Duration;

use loopguard::{EventLoopGroup, LifecycleGuard, NotInitializedError};

use crate::counting::CountingThreadFactory;

/// Asserts that the guard is stopped and reports it as not initialized.
pub fn assert_not_initialized(guard: &LifecycleGuard) {
    assert!(!guard.is_started(), "guard should be stopped");
    match guard.resource() {
        Err(NotInitializedError) => {}
        Ok(group) => panic!(
            "stopped guard handed out a group of {} loops",
            group.worker_count()
        ),
    }
}

/// Asserts that the guard is started with a group of `worker_count` loops
/// that is still accepting work.
pub fn assert_started(guard: &LifecycleGuard, worker_count: usize) {
    let group = guard
        .resource()
        .unwrap_or_else(|error| panic!("started guard reported: {error}"));
    assert_eq!(
        group.worker_count(),
        worker_count,
        "group has the wrong number of loops"
    );
    assert!(
        !group.is_shutting_down(),
        "group of a started guard is already shutting down"
    );
}

/// Asserts that every loop of `group` has shut down and its thread exited.
pub fn assert_group_terminated(group: &EventLoopGroup) {
    assert!(group.is_shutting_down(), "group was never shut down");
    assert!(
        group.await_termination(Duration::ZERO),
        "group still has running event loops"
    );
}

/// Asserts that no thread created by `factory` is still running.
pub fn assert_no_live_threads(factory: &CountingThreadFactory) {
    assert_eq!(
        factory.live_threads(),
        0,
        "{} of {} created threads are still running",
        factory.live_threads(),
        factory.spawned_threads()
    );
}
