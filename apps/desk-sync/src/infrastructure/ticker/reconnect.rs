//! Ticker Reconnection Backoff
//!
//! Exponential backoff with jitter between ticker connection attempts. The
//! attempt budget is per outage: a successful connect resets it.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::TickerSettings;

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts allowed per outage (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from_ticker_settings(&TickerSettings::default())
    }
}

impl ReconnectConfig {
    /// Build from ticker settings.
    #[must_use]
    pub const fn from_ticker_settings(settings: &TickerSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: 0.1,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Stateful backoff over one outage.
///
/// # Example
///
/// ```rust
/// use desk_sync::infrastructure::ticker::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
/// assert!(policy.next_delay().is_some());
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    next: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Fresh policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let next = config.initial_delay;
        Self {
            config,
            next,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempts += 1;
        let delay = jittered(self.next, self.config.jitter_factor);
        self.next = grown(self.next, self.config.multiplier).min(self.config.max_delay);
        Some(delay.min(self.config.max_delay))
    }

    /// Forget the outage after a successful connect.
    pub const fn reset(&mut self) {
        self.next = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Attempts made in the current outage.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn grown(delay: Duration, multiplier: f64) -> Duration {
    let millis = (delay.as_millis() as f64 * multiplier).round();
    if millis.is_finite() && millis > 0.0 {
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    } else {
        Duration::ZERO
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn jittered(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return delay;
    }
    let base = delay.as_millis() as f64;
    let spread = base * factor;
    let offset: f64 = rand::rng().random_range(-spread..=spread);
    Duration::from_millis((base + offset).max(1.0) as u64)
}
