//! Timing configuration for reconciliation.
//!
//! All waits and budgets are external tunables. Defaults model a scrape job
//! that needs at least half a minute before anything lands in the store.

use std::time::Duration;

use crate::error::{Error, Result};

const ENV_SETTLE_WAIT_SECS: &str = "PULLUP_SETTLE_WAIT_SECS";
const ENV_POLL_INTERVAL_SECS: &str = "PULLUP_POLL_INTERVAL_SECS";
const ENV_POLL_BUDGET: &str = "PULLUP_POLL_BUDGET";
const ENV_FINAL_SETTLE_WAIT_SECS: &str = "PULLUP_FINAL_SETTLE_WAIT_SECS";
const ENV_CALL_TIMEOUT_SECS: &str = "PULLUP_CALL_TIMEOUT_SECS";

const DEFAULT_SETTLE_WAIT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_POLL_BUDGET: u32 = 12;
const DEFAULT_FINAL_SETTLE_WAIT_SECS: u64 = 60;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Waits, budgets and timeouts for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Delay after a successful trigger before the first store re-check.
    pub settle_wait: Duration,
    /// Delay between consecutive polls.
    pub poll_interval: Duration,
    /// Maximum number of polls shared across the whole invocation.
    pub poll_budget: u32,
    /// Delay before the last re-check once the poll budget is spent.
    pub final_settle_wait: Duration,
    /// Upper bound on any single store query or trigger call.
    pub call_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            settle_wait: Duration::from_secs(DEFAULT_SETTLE_WAIT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_budget: DEFAULT_POLL_BUDGET,
            final_settle_wait: Duration::from_secs(DEFAULT_FINAL_SETTLE_WAIT_SECS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

impl ReconcileConfig {
    /// Sets the settle wait.
    #[must_use]
    pub const fn with_settle_wait(mut self, wait: Duration) -> Self {
        self.settle_wait = wait;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the poll budget.
    #[must_use]
    pub const fn with_poll_budget(mut self, budget: u32) -> Self {
        self.poll_budget = budget;
        self
    }

    /// Sets the final settle wait.
    #[must_use]
    pub const fn with_final_settle_wait(mut self, wait: Duration) -> Self {
        self.final_settle_wait = wait;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Checks that the configuration can drive an invocation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the poll budget is zero or the call
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.poll_budget == 0 {
            return Err(Error::configuration("poll budget must be at least 1"));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::configuration("call timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Loads configuration from process environment with strict validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is not a positive integer
    /// or exceeds the supported range.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is not a positive integer
    /// or exceeds the supported range.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settle =
            parse_positive_u64_env(&get_env, ENV_SETTLE_WAIT_SECS, DEFAULT_SETTLE_WAIT_SECS)?;
        let interval =
            parse_positive_u64_env(&get_env, ENV_POLL_INTERVAL_SECS, DEFAULT_POLL_INTERVAL_SECS)?;
        let budget =
            parse_positive_u64_env(&get_env, ENV_POLL_BUDGET, u64::from(DEFAULT_POLL_BUDGET))?;
        let final_settle = parse_positive_u64_env(
            &get_env,
            ENV_FINAL_SETTLE_WAIT_SECS,
            DEFAULT_FINAL_SETTLE_WAIT_SECS,
        )?;
        let call_timeout =
            parse_positive_u64_env(&get_env, ENV_CALL_TIMEOUT_SECS, DEFAULT_CALL_TIMEOUT_SECS)?;

        let poll_budget = u32::try_from(budget).map_err(|_| {
            Error::configuration(format!(
                "{ENV_POLL_BUDGET} value {budget} exceeds supported range"
            ))
        })?;

        let config = Self {
            settle_wait: Duration::from_secs(settle),
            poll_interval: Duration::from_secs(interval),
            poll_budget,
            final_settle_wait: Duration::from_secs(final_settle),
            call_timeout: Duration::from_secs(call_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let config = ReconcileConfig::from_env_with(env(&[])).unwrap();
        assert_eq!(config, ReconcileConfig::default());
        assert_eq!(config.poll_budget, 12);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn reads_every_knob() {
        let config = ReconcileConfig::from_env_with(env(&[
            (ENV_SETTLE_WAIT_SECS, "10"),
            (ENV_POLL_INTERVAL_SECS, "2"),
            (ENV_POLL_BUDGET, "3"),
            (ENV_FINAL_SETTLE_WAIT_SECS, "20"),
            (ENV_CALL_TIMEOUT_SECS, "4"),
        ]))
        .unwrap();
        assert_eq!(config.settle_wait, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_budget, 3);
        assert_eq!(config.final_settle_wait, Duration::from_secs(20));
        assert_eq!(config.call_timeout, Duration::from_secs(4));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let err = ReconcileConfig::from_env_with(env(&[(ENV_POLL_BUDGET, "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let err =
            ReconcileConfig::from_env_with(env(&[(ENV_POLL_INTERVAL_SECS, "soon")])).unwrap_err();
        assert!(err.to_string().contains("positive integer"));
    }

    #[test]
    fn rejects_budget_beyond_u32() {
        let err = ReconcileConfig::from_env_with(env(&[(ENV_POLL_BUDGET, "99999999999")]))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds supported range"));
    }

    #[test]
    fn validate_catches_builder_mistakes() {
        assert!(ReconcileConfig::default().with_poll_budget(0).validate().is_err());
        assert!(
            ReconcileConfig::default()
                .with_call_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(ReconcileConfig::default().validate().is_ok());
    }
}
