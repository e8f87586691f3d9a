use std::time::{Duration, Instant};

pub const SEARCH_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Holds the latest submitted value until no new one arrived for `quiet`.
/// Time is passed in so callers and tests own the clock.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Debouncer { quiet, pending: None }
    }

    /// Replaces any pending value and restarts the quiet period.
    pub fn submit(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Releases the pending value once the quiet period has elapsed.
    pub fn ready(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.saturating_duration_since(*at) >= self.quiet => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// Time left until the pending value is released, if any is pending.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, at)| self.quiet.saturating_sub(now.saturating_duration_since(*at)))
    }

    /// Releases the pending value without waiting, e.g. when input ended.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Debouncer::new(SEARCH_QUIET_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_releases_only_last_value() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.submit("r".to_string(), t0);
        d.submit("ra".to_string(), t0 + Duration::from_millis(100));
        d.submit("radar".to_string(), t0 + Duration::from_millis(200));

        assert_eq!(d.ready(t0 + Duration::from_millis(400)), None);
        assert_eq!(d.remaining(t0 + Duration::from_millis(400)), Some(Duration::from_millis(100)));
        assert_eq!(d.ready(t0 + Duration::from_millis(500)), Some("radar".to_string()));
        assert_eq!(d.ready(t0 + Duration::from_millis(900)), None);
        assert_eq!(d.remaining(t0), None);
    }

    #[test]
    fn nothing_pending_nothing_released() {
        let mut d: Debouncer<String> = Debouncer::new(Duration::from_millis(10));
        assert_eq!(d.ready(Instant::now()), None);
        assert_eq!(d.remaining(Instant::now()), None);
        assert_eq!(d.flush(), None);
    }

    #[test]
    fn flush_skips_the_quiet_period() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.submit("ra".to_string(), t0);
        d.submit("radar".to_string(), t0 + Duration::from_millis(10));
        assert_eq!(d.flush(), Some("radar".to_string()));
        assert_eq!(d.remaining(t0), None);
        assert_eq!(d.ready(t0 + Duration::from_secs(1)), None);
    }
}
