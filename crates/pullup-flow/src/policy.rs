//! Wait schedule for the settle-and-poll loop.
//!
//! [`PollPolicy`] maps each waiting state to the delay observed on entering
//! it:
//!
//! | State | Delay | Then |
//! |-------|-------|------|
//! | `SETTLING` | settle wait | `SettleElapsed` |
//! | `POLLING(1)` | none | store query |
//! | `POLLING(n > 1)` | poll interval | store query |
//! | `FINAL_SETTLING` | final settle wait | store query |
//!
//! The budget is shared across the whole invocation: narrowing the pending
//! set after a partial match does not restore attempts.

use std::time::Duration;

use crate::config::ReconcileConfig;
use crate::state::ReconcileState;

/// Fixed-interval poll schedule with a settle wait in front and a final
/// settle wait behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    settle_wait: Duration,
    poll_interval: Duration,
    poll_budget: u32,
    final_settle_wait: Duration,
}

impl PollPolicy {
    /// Creates a policy from explicit values.
    #[must_use]
    pub const fn new(
        settle_wait: Duration,
        poll_interval: Duration,
        poll_budget: u32,
        final_settle_wait: Duration,
    ) -> Self {
        Self {
            settle_wait,
            poll_interval,
            poll_budget,
            final_settle_wait,
        }
    }

    /// Returns the number of polls before escalating to the final settle.
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.poll_budget
    }

    /// Returns the delay to observe on entering `state`, before the work that
    /// state performs.
    ///
    /// `SETTLING` waits the settle wait and then fires `SettleElapsed`;
    /// polling states wait and then query the store. States that never wait
    /// return [`Duration::ZERO`].
    #[must_use]
    pub const fn delay_for(&self, state: ReconcileState) -> Duration {
        match state {
            ReconcileState::Settling => self.settle_wait,
            ReconcileState::Polling { attempt } if attempt > 1 => self.poll_interval,
            ReconcileState::FinalSettling => self.final_settle_wait,
            _ => Duration::ZERO,
        }
    }

    /// Returns the number of store queries made after a successful trigger
    /// when nothing ever appears: every budgeted poll plus the final check.
    #[must_use]
    pub const fn max_store_queries(&self) -> u32 {
        self.poll_budget.saturating_add(1)
    }

    /// Returns the longest an invocation can spend waiting after the
    /// trigger, excluding collaborator call latency.
    ///
    /// Saturates at [`Duration::MAX`].
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.poll_budget.saturating_sub(1))
            .and_then(|polls| polls.checked_add(self.settle_wait))
            .and_then(|total| total.checked_add(self.final_settle_wait))
            .unwrap_or(Duration::MAX)
    }
}

impl From<&ReconcileConfig> for PollPolicy {
    fn from(config: &ReconcileConfig) -> Self {
        Self::new(
            config.settle_wait,
            config.poll_interval,
            config.poll_budget,
            config.final_settle_wait,
        )
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&ReconcileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(30),
            Duration::from_secs(5),
            12,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn first_poll_follows_settle_without_extra_delay() {
        let p = policy();
        assert_eq!(p.delay_for(ReconcileState::Settling), Duration::from_secs(30));
        assert_eq!(
            p.delay_for(ReconcileState::Polling { attempt: 1 }),
            Duration::ZERO
        );
        assert_eq!(
            p.delay_for(ReconcileState::Polling { attempt: 2 }),
            Duration::from_secs(5)
        );
        assert_eq!(
            p.delay_for(ReconcileState::FinalSettling),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn non_waiting_states_have_no_delay() {
        let p = policy();
        for state in [
            ReconcileState::Idle,
            ReconcileState::CheckingStore,
            ReconcileState::Triggering,
            ReconcileState::Succeeded,
        ] {
            assert_eq!(p.delay_for(state), Duration::ZERO);
        }
    }

    #[test]
    fn bounds() {
        let p = policy();
        assert_eq!(p.max_store_queries(), 13);
        // 30 + 11 * 5 + 60
        assert_eq!(p.max_wait(), Duration::from_secs(145));
    }

    #[test]
    fn max_wait_saturates_on_huge_waits() {
        let config = ReconcileConfig::default()
            .with_poll_interval(Duration::from_secs(u64::MAX / 2))
            .with_poll_budget(12);
        assert!(config.validate().is_ok());
        assert_eq!(PollPolicy::from(&config).max_wait(), Duration::MAX);

        let config = ReconcileConfig::default()
            .with_settle_wait(Duration::MAX)
            .with_final_settle_wait(Duration::from_secs(1));
        assert_eq!(PollPolicy::from(&config).max_wait(), Duration::MAX);
    }

    #[test]
    fn built_from_config() {
        let config = ReconcileConfig::default().with_poll_budget(3);
        let p = PollPolicy::from(&config);
        assert_eq!(p.budget(), 3);
        assert_eq!(p, PollPolicy::from(&config));
    }
}
