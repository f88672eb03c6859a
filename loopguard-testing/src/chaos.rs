//! Failure injection for thread creation.
//!
//! [`ChaosThreadFactory`] wraps another factory and refuses thread requests
//! with a configured probability, so tests can drive `before()` down its
//! creation-failure path without exhausting real system resources.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use loopguard::{ThreadBody, ThreadFactory};
use nutype::nutype;
use parking_lot::Mutex;
use rand::{random, rngs::StdRng, Rng, SeedableRng};

/// Probability value for chaos engineering injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// # Examples
///
/// ```ignore
/// use loopguard_testing::chaos::Probability;
///
/// let never = Probability::try_new(0.0).unwrap();
/// let always = Probability::try_new(1.0).unwrap();
///
/// // Values outside [0.0, 1.0] are rejected
/// assert!(Probability::try_new(1.5).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

/// Failure injection settings for [`ChaosThreadFactory`].
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    spawn_failure_probability: Probability,
}

impl ChaosConfig {
    /// Seeded configuration, so refusal patterns repeat across runs.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Use `seed` for the refusal decisions.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.deterministic_seed = Some(seed);
        self
    }

    /// Chance that a thread request is refused, clamped to [0.0, 1.0].
    #[must_use]
    pub fn with_spawn_failure_probability(mut self, probability: f32) -> Self {
        self.spawn_failure_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            spawn_failure_probability: Probability::try_new(0.0)
                .expect("0.0 is valid probability"),
        }
    }
}

/// Wrap a thread factory with failure injection.
pub trait ChaosThreadFactoryExt: Sized {
    /// Wrap `self` using `config`.
    fn with_chaos(self, config: ChaosConfig) -> ChaosThreadFactory;
}

/// Thread factory that refuses threads at random.
#[derive(Debug)]
pub struct ChaosThreadFactory {
    inner: Arc<dyn ThreadFactory>,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
}

impl ChaosThreadFactory {
    /// Wrap `inner` using `config`.
    pub fn new(inner: Arc<dyn ThreadFactory>, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            inner,
            config,
            rng: Mutex::new(rng),
        }
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let prob_f32: f32 = probability.into();

        if prob_f32 <= 0.0 {
            return false;
        }

        if prob_f32 >= 1.0 {
            return true;
        }

        self.rng.lock().random_bool(f64::from(prob_f32))
    }
}

impl ThreadFactory for ChaosThreadFactory {
    fn new_thread(&self, body: ThreadBody) -> io::Result<JoinHandle<()>> {
        if self.should_inject(self.config.spawn_failure_probability) {
            tracing::debug!("chaos thread factory refusing thread");
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "chaos: thread creation refused",
            ));
        }

        self.inner.new_thread(body)
    }
}

impl<F> ChaosThreadFactoryExt for Arc<F>
where
    F: ThreadFactory + 'static,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosThreadFactory {
        ChaosThreadFactory::new(self, config)
    }
}
