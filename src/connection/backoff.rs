//! Reconnect delay policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every attempt
    #[default]
    Fixed,
    /// `delay * 2^(attempt-1)`, capped at `max_delay`
    Exponential,
}

impl Backoff {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backoff::Fixed => "fixed",
            Backoff::Exponential => "exponential",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(Backoff::Fixed),
            "exponential" | "exp" => Some(Backoff::Exponential),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Backoff,
    pub delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { backoff: Backoff::Fixed, delay, max_delay: delay }
    }

    pub fn exponential(delay: Duration, max_delay: Duration) -> Self {
        Self { backoff: Backoff::Exponential, delay, max_delay }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 1u32 << attempt.saturating_sub(1).min(31);
                self.delay.saturating_mul(factor).min(self.max_delay.max(self.delay))
            }
        }
    }
}
