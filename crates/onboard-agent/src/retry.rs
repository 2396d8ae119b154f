//! Unbounded retry with capped exponential backoff.
//!
//! After each failed attempt the delay becomes `2 * (delay + unit)`, capped at
//! the ceiling, and the executor sleeps that long before the next attempt.
//! There is no attempt limit and no jitter. Only [`AttemptError`]s can come out
//! of an operation, so nothing fatal is ever retried.

use crate::config::RetryConfig;
use crate::error::AttemptError;
use std::time::Duration;

/// Blocks the current thread between attempts.
pub trait Sleeper {
    fn sleep(&mut self, delay: Duration);
}

/// Sleeps for real.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &mut S {
    fn sleep(&mut self, delay: Duration) {
        (**self).sleep(delay);
    }
}

/// Backoff state for one sequence of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    unit: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(unit: Duration, ceiling: Duration) -> Self {
        Self {
            unit,
            ceiling,
            current: Duration::ZERO,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Records a failure and returns the new delay.
    pub fn advance(&mut self) -> Duration {
        self.current = ((self.current + self.unit) * 2).min(self.ceiling);
        self.current
    }
}

/// The delay that follows the `(step + 1)`-th consecutive failure.
pub fn capped_backoff(unit: Duration, ceiling: Duration, step: usize) -> Duration {
    let mut backoff = Backoff::new(unit, ceiling);
    let mut delay = Duration::ZERO;
    for _ in 0..=step {
        delay = backoff.advance();
    }
    delay
}

/// Runs an operation until it succeeds.
#[derive(Debug)]
pub struct RetryExecutor<S> {
    unit: Duration,
    ceiling: Duration,
    sleeper: S,
}

impl<S: Sleeper> RetryExecutor<S> {
    pub fn new(unit: Duration, ceiling: Duration, sleeper: S) -> Self {
        Self {
            unit,
            ceiling,
            sleeper,
        }
    }

    pub fn from_config(config: &RetryConfig, sleeper: S) -> Self {
        Self::new(config.unit(), config.max_delay(), sleeper)
    }

    /// Calls `operation` until it returns `Ok`, sleeping between attempts.
    ///
    /// Backoff state is local to this call, so consecutive calls each start
    /// from a zero delay.
    pub fn execute<T, F>(&mut self, label: &str, mut operation: F) -> T
    where
        F: FnMut() -> Result<T, AttemptError>,
    {
        let mut backoff = Backoff::new(self.unit, self.ceiling);
        let mut attempt: u64 = 0;
        loop {
            let delay = backoff.current();
            if !delay.is_zero() {
                self.sleeper.sleep(delay);
            }
            attempt += 1;

            match operation() {
                Ok(value) => {
                    tracing::info!(operation = label, attempts = attempt, "request succeeded");
                    return value;
                }
                Err(e) => {
                    let next = backoff.advance();
                    tracing::warn!(
                        operation = label,
                        attempt,
                        error = %e,
                        retry_in_secs = next.as_secs_f64(),
                        "request attempt failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSleeper(Vec<Duration>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, delay: Duration) {
            self.0.push(delay);
        }
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    fn transient() -> AttemptError {
        AttemptError::Status {
            status: 503,
            body: String::new(),
        }
    }

    #[test]
    fn delays_double_plus_unit_until_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(600));
        assert_eq!(backoff.current(), Duration::ZERO);
        let delays: Vec<Duration> = (0..11).map(|_| backoff.advance()).collect();
        assert_eq!(
            delays,
            secs(&[2, 6, 14, 30, 62, 126, 254, 510, 600, 600, 600])
        );
    }

    #[test]
    fn delays_never_decrease_and_hold_at_ceiling() {
        let ceiling = Duration::from_secs(600);
        let mut backoff = Backoff::new(Duration::from_secs(1), ceiling);
        let mut previous = Duration::ZERO;
        let mut reached = false;
        for _ in 0..64 {
            let delay = backoff.advance();
            assert!(delay >= previous);
            assert!(delay <= ceiling);
            if reached {
                assert_eq!(delay, ceiling);
            }
            reached |= delay == ceiling;
            previous = delay;
        }
        assert!(reached);
    }

    #[test]
    fn n_failures_take_n_plus_one_attempts() {
        let unit = Duration::from_secs(1);
        let ceiling = Duration::from_secs(600);

        for failures in [0usize, 1, 3, 9, 12] {
            let mut sleeper = RecordingSleeper::default();
            let mut executor = RetryExecutor::new(unit, ceiling, &mut sleeper);
            let mut calls = 0usize;

            let value = executor.execute("test", || {
                calls += 1;
                if calls <= failures {
                    Err(transient())
                } else {
                    Ok(calls)
                }
            });

            assert_eq!(value, failures + 1);
            assert_eq!(calls, failures + 1);

            let expected: Vec<Duration> = (0..failures)
                .map(|i| capped_backoff(unit, ceiling, i))
                .collect();
            assert_eq!(sleeper.0, expected);
            let total: Duration = sleeper.0.iter().sum();
            assert_eq!(total, expected.iter().sum::<Duration>());
        }
    }

    #[test]
    fn each_execution_starts_without_delay() {
        let mut sleeper = RecordingSleeper::default();
        let mut executor =
            RetryExecutor::new(Duration::from_secs(1), Duration::from_secs(600), &mut sleeper);

        let mut first = 0;
        executor.execute("first", || {
            first += 1;
            if first < 3 {
                Err(transient())
            } else {
                Ok(())
            }
        });
        executor.execute("second", || Ok::<_, AttemptError>(()));

        assert_eq!(sleeper.0, secs(&[2, 6]));
    }

    #[test]
    fn config_scales_the_unit() {
        let config = RetryConfig {
            unit_ms: 10,
            max_delay_secs: 1,
        };
        let mut sleeper = RecordingSleeper::default();
        let mut executor = RetryExecutor::from_config(&config, &mut sleeper);
        let mut calls = 0;
        executor.execute("scaled", || {
            calls += 1;
            if calls < 8 {
                Err(transient())
            } else {
                Ok(())
            }
        });
        let expected: Vec<Duration> = [20, 60, 140, 300, 620, 1000, 1000]
            .into_iter()
            .map(Duration::from_millis)
            .collect();
        assert_eq!(sleeper.0, expected);
    }
}
