//! Connection lifecycle with a bounded retry budget.
//!
//! ```text
//! disconnected -> connecting -> connected -> disconnected -> reconnecting(n)
//!                      ^                                        |
//!                      +----------------------------------------+
//!                                  (budget spent) -> exhausted
//! ```

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::config::RealtimeConfig;

/// Observable channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting before retry number `attempt`.
    Reconnecting { attempt: u32 },
    /// Retry budget spent; updates arrive by polling.
    Exhausted,
}

impl ChannelState {
    /// Whether pushed updates are currently flowing.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Exhausted => write!(f, "polling"),
        }
    }
}

/// The reconnect state machine.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ChannelState,
    failures: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ConnectionMachine {
    #[must_use]
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            state: ChannelState::Disconnected,
            failures: 0,
            max_attempts: config.max_reconnect_attempts,
            base_delay: config.reconnect_delay,
            max_delay: config.max_reconnect_delay,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Retries used since the last successful connect.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// A connect attempt starts.
    pub const fn connecting(&mut self) -> ChannelState {
        if !matches!(self.state, ChannelState::Exhausted) {
            self.state = ChannelState::Connecting;
        }
        self.state
    }

    /// The connection is open and interest announced. Resets the budget.
    pub const fn connected(&mut self) -> ChannelState {
        self.failures = 0;
        self.state = ChannelState::Connected;
        self.state
    }

    /// The connection dropped or could not be opened.
    pub const fn disconnected(&mut self) -> ChannelState {
        if !matches!(self.state, ChannelState::Exhausted) {
            self.state = ChannelState::Disconnected;
        }
        self.state
    }

    /// Spend one retry. Returns the delay before the next attempt, or `None`
    /// once the budget is exhausted.
    pub fn retry(&mut self) -> Option<Duration> {
        if matches!(self.state, ChannelState::Exhausted) {
            return None;
        }
        if self.failures >= self.max_attempts {
            self.state = ChannelState::Exhausted;
            return None;
        }
        self.failures += 1;
        self.state = ChannelState::Reconnecting {
            attempt: self.failures,
        };
        let jitter = rand::rng().random_range(0.0..=0.5);
        Some(self.delay_for(self.failures, jitter))
    }

    /// Exponential backoff for `attempt` (1-based) with `jitter` as a
    /// fraction of the base delay, capped at the maximum delay.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1 << exponent);
        let jitter = self.base_delay.mul_f64(jitter.clamp(0.0, 1.0));
        backoff.saturating_add(jitter).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(attempts: u32) -> RealtimeConfig {
        RealtimeConfig {
            max_reconnect_attempts: attempts,
            reconnect_delay: Duration::from_millis(100),
            max_reconnect_delay: Duration::from_millis(1000),
            ..RealtimeConfig::default()
        }
    }

    #[test]
    fn test_budget_exhausts_after_max_attempts() {
        let mut machine = ConnectionMachine::new(&config(2));
        machine.connecting();
        machine.disconnected();

        assert!(machine.retry().is_some());
        assert_eq!(machine.state(), ChannelState::Reconnecting { attempt: 1 });
        machine.connecting();
        machine.disconnected();
        assert!(machine.retry().is_some());
        machine.connecting();
        machine.disconnected();

        assert_eq!(machine.retry(), None);
        assert_eq!(machine.state(), ChannelState::Exhausted);
        assert_eq!(machine.retry(), None);
        assert_eq!(machine.connecting(), ChannelState::Exhausted);
    }

    #[test]
    fn test_successful_connect_resets_budget() {
        let mut machine = ConnectionMachine::new(&config(1));
        machine.connecting();
        assert!(machine.retry().is_some());
        assert_eq!(machine.failures(), 1);

        machine.connecting();
        assert_eq!(machine.connected(), ChannelState::Connected);
        assert_eq!(machine.failures(), 0);

        machine.disconnected();
        assert!(machine.retry().is_some());
    }

    #[test]
    fn test_zero_budget_goes_straight_to_polling() {
        let mut machine = ConnectionMachine::new(&config(0));
        machine.connecting();
        machine.disconnected();
        assert_eq!(machine.retry(), None);
        assert_eq!(machine.state(), ChannelState::Exhausted);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let machine = ConnectionMachine::new(&config(10));
        assert_eq!(machine.delay_for(1, 0.0), Duration::from_millis(100));
        assert_eq!(machine.delay_for(2, 0.0), Duration::from_millis(200));
        assert_eq!(machine.delay_for(3, 0.5), Duration::from_millis(450));
        assert_eq!(machine.delay_for(8, 0.0), Duration::from_millis(1000));
        assert_eq!(machine.delay_for(u32::MAX, 1.0), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_delay_within_bounds() {
        let mut machine = ConnectionMachine::new(&config(3));
        let delay = machine.retry().unwrap_or_default();
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(150));
    }
}
