//! Validated value types for event loop group configuration.
//!
//! Every type here uses a smart constructor so that an invalid worker count
//! or grace period cannot be represented once construction succeeds.

use std::time::Duration;

use nutype::nutype;

/// Largest number of event loops a single group may own.
pub const MAX_WORKER_COUNT: usize = 1024;

/// Default grace period granted to in-flight tasks during shutdown.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2_000;

/// Upper bound for the configurable grace period (5 minutes).
pub const MAX_GRACE_PERIOD_MS: u64 = 300_000;

/// Number of event loops (and therefore worker threads) in a group.
///
/// Validated to be between 1 and [`MAX_WORKER_COUNT`] (1024); larger values
/// are rejected by `try_new` rather than spawning that many threads.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = MAX_WORKER_COUNT),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// A group with exactly one event loop.
    pub fn one() -> Self {
        Self::try_new(1).expect("1 is always a valid worker count")
    }

    /// One event loop per available CPU, capped at [`MAX_WORKER_COUNT`].
    pub fn available_parallelism() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::try_new(cpus.clamp(1, MAX_WORKER_COUNT))
            .expect("clamped parallelism is always a valid worker count")
    }

    /// The count as a plain `usize`.
    pub fn get(self) -> usize {
        self.into_inner()
    }
}

/// Time granted to in-flight tasks after a graceful shutdown is requested,
/// in milliseconds.
///
/// Zero is allowed and means "cancel outstanding tasks immediately".
#[nutype(
    validate(less_or_equal = MAX_GRACE_PERIOD_MS),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct GracePeriodMs(u64);

impl GracePeriodMs {
    /// Convert to Duration for use with tokio::time::timeout.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

impl Default for GracePeriodMs {
    fn default() -> Self {
        Self::try_new(DEFAULT_GRACE_PERIOD_MS).expect("default grace period is always valid")
    }
}
