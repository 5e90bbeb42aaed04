//! Adaptive request pacing.
//!
//! One cooperative delay loop serialises every request: the next fetch
//! waits until the monotonic clock has advanced past the previous request
//! plus a jittered delay, with time already elapsed credited against the
//! sleep. Successes decay the delay toward the floor; challenges and
//! rate-limit signals double it up to the backoff ceiling.

use rand::Rng;
use std::time::{Duration, Instant};

/// A pause this long since the last request resets the delay to the floor.
const IDLE_RESET_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Floor of the adaptive delay, seconds.
    pub min_delay: f64,
    /// Upper edge of the jitter band while the delay sits at its floor.
    pub max_delay: f64,
    pub backoff_factor: f64,
    pub recovery_factor: f64,
    /// Ceiling the delay may be driven to by repeated challenges.
    pub max_backoff: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay: 3.0,
            max_delay: 8.0,
            backoff_factor: 2.0,
            recovery_factor: 0.95,
            max_backoff: 120.0,
        }
    }
}

#[derive(Debug)]
pub struct AdaptiveDelay {
    config: PacingConfig,
    current: f64,
    last_request: Option<Instant>,
}

impl AdaptiveDelay {
    pub fn new(config: PacingConfig) -> Self {
        let current = config.min_delay;
        Self {
            config,
            current,
            last_request: None,
        }
    }

    /// How long to sleep before the next request may go out. The first
    /// request of a run, and the first after a long idle, go immediately.
    pub fn next_wait(&mut self) -> Duration {
        let Some(last) = self.last_request else {
            return Duration::ZERO;
        };
        let elapsed = last.elapsed();
        if elapsed >= IDLE_RESET_AFTER {
            self.current = self.config.min_delay;
            return Duration::ZERO;
        }

        // jitter band is [current, 1.5*current); max_delay caps its upper
        // edge until backoff has pushed the whole band past it
        let upper = if self.current < self.config.max_delay {
            (self.current * 1.5).min(self.config.max_delay)
        } else {
            self.current * 1.5
        };
        let target = rand::thread_rng().gen_range(self.current..upper);
        let remaining = target - elapsed.as_secs_f64();
        if remaining <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(remaining)
        }
    }

    /// Stamp the request start; elapsed time since this instant is credited
    /// against the next wait.
    pub fn mark_request(&mut self) {
        self.last_request = Some(Instant::now());
    }

    pub fn on_success(&mut self) {
        self.current = (self.current * self.config.recovery_factor).max(self.config.min_delay);
    }

    pub fn on_backoff(&mut self) {
        self.current = (self.current * self.config.backoff_factor).min(self.config.max_backoff);
    }

    pub fn current_delay(&self) -> f64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay() -> AdaptiveDelay {
        AdaptiveDelay::new(PacingConfig::default())
    }

    #[test]
    fn first_request_goes_immediately() {
        let mut pacing = delay();
        assert_eq!(pacing.next_wait(), Duration::ZERO);
    }

    #[test]
    fn floor_state_waits_at_most_one_and_a_half_times_the_delay() {
        let mut pacing = delay();
        pacing.mark_request();
        // at the floor the delay is min_delay (3.0), so the jittered target
        // is below 1.5 * 3.0
        for _ in 0..50 {
            let wait = pacing.next_wait().as_secs_f64();
            assert!(wait < 4.5, "wait {wait} above 1.5x the current delay");
        }
    }

    #[test]
    fn backed_off_state_keeps_the_multiplicative_band() {
        let mut pacing = delay();
        // two backoffs: 3.0 -> 6.0 -> 12.0, past the 8.0 band ceiling
        pacing.on_backoff();
        pacing.on_backoff();
        assert_eq!(pacing.current_delay(), 12.0);
        pacing.mark_request();
        for _ in 0..50 {
            let wait = pacing.next_wait().as_secs_f64();
            assert!(wait < 18.0, "wait {wait} above 1.5x the current delay");
        }
    }

    #[test]
    fn success_decays_toward_the_floor() {
        let mut pacing = delay();
        pacing.on_backoff();
        let backed_off = pacing.current_delay();
        assert_eq!(backed_off, 6.0);
        for _ in 0..200 {
            pacing.on_success();
        }
        assert_eq!(pacing.current_delay(), 3.0);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut pacing = delay();
        for _ in 0..10 {
            pacing.on_backoff();
        }
        assert_eq!(pacing.current_delay(), 120.0);
    }

    #[test]
    fn elapsed_time_is_credited() {
        let mut pacing = AdaptiveDelay::new(PacingConfig {
            min_delay: 0.01,
            max_delay: 0.02,
            ..Default::default()
        });
        pacing.mark_request();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(pacing.next_wait(), Duration::ZERO);
    }
}
