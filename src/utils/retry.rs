use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use std::thread::sleep;
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total number of executions, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Retries the execution of `f` after the `interval` has elapsed, until `max_attempts` is reached
/// or `f` fails with an error `is_retryable` rejects.
/// Returns the result of the first successful execution of `f` or the latest error.
/// `f` always runs at least once.
pub fn retry<F, P, T, E>(config: &RetryConfig, is_retryable: P, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match f() {
            Ok(result) => return Ok(result),
            Err(err) if attempt < config.max_attempts && is_retryable(&err) => {
                debug!(attempt, "retrying in {:?}", config.interval);
                sleep(config.interval);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_retry_success() {
        let result: Result<&str, &str> = retry(&config(3), |_| true, || Ok("success"));
        assert_eq!(result, Ok("success"));
    }

    #[test]
    fn test_retry_failure() {
        let mut attempts = 0;
        let result: Result<&str, &str> = retry(&config(3), |_| true, || {
            attempts += 1;
            Err("failure")
        });
        assert_eq!(result, Err("failure"));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_retry_with_multiple_attempts() {
        let mut attempts = 0;
        let result = retry(&config(3), |_| true, || {
            attempts += 1;
            if attempts < 3 {
                Err("try again")
            } else {
                Ok("finally succeeded")
            }
        });
        assert_eq!(result, Ok("finally succeeded"));
    }

    #[test]
    fn test_retry_stops_on_non_retryable_error() {
        let mut attempts = 0;
        let result: Result<(), &str> = retry(&config(5), |err| *err == "conflict", || {
            attempts += 1;
            if attempts == 1 { Err("conflict") } else { Err("fatal") }
        });
        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_retry_zero_attempts_runs_once() {
        let mut attempts = 0;
        let _: Result<(), &str> = retry(&config(0), |_| true, || {
            attempts += 1;
            Err("failure")
        });
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_deserialize_config() {
        let config: RetryConfig = serde_yaml::from_str("interval: 1s\n").unwrap();
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.interval, Duration::from_secs(1));
    }
}
