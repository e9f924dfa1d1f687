//! Debouncer - coalesces bursts of triggers into one delayed firing.
//!
//! Used for the timeline region redraw (bursts of task edits) and for the
//! navigation-triggered autosave. Rescheduling while pending resets the timer.
//!
//! `*_at` variants take an explicit `Instant` so callers driving the UI loop
//! (and tests) control time.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    delay: Duration,
    pending: Option<(K, Instant)>,
}

impl<K: Clone + std::fmt::Debug> Debouncer<K> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn set_delay(&mut self, delay_ms: u64) {
        self.delay = Duration::from_millis(delay_ms);
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    /// Schedule (or reschedule) a trigger for `key`.
    pub fn schedule(&mut self, key: K) {
        self.schedule_at(key, Instant::now());
    }

    pub fn schedule_at(&mut self, key: K, now: Instant) {
        log::trace!("Debouncer: scheduled {:?} in {}ms", key, self.delay.as_millis());
        self.pending = Some((key, now + self.delay));
    }

    pub fn cancel(&mut self) {
        if self.pending.is_some() {
            log::trace!("Debouncer: cancelled pending trigger");
        }
        self.pending = None;
    }

    /// Returns the key once the delay has elapsed, clearing the pending state.
    pub fn tick(&mut self) -> Option<K> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<K> {
        let (_, trigger_at) = self.pending.as_ref()?;
        if now >= *trigger_at {
            self.pending.take().map(|(key, _)| key)
        } else {
            None
        }
    }

    /// Fire immediately regardless of the remaining delay.
    pub fn flush(&mut self) -> Option<K> {
        self.pending.take().map(|(key, _)| key)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_key(&self) -> Option<&K> {
        self.pending.as_ref().map(|(key, _)| key)
    }

    /// Time left before firing, for repaint scheduling.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, at)| at.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_no_trigger() {
        let mut d = Debouncer::new(100);
        let t0 = Instant::now();
        d.schedule_at(7u32, t0);
        assert!(d.is_pending());
        assert!(d.tick_at(t0).is_none());
        assert!(d.tick_at(t0 + Duration::from_millis(99)).is_none());
    }

    #[test]
    fn test_trigger_after_delay() {
        let mut d = Debouncer::new(120);
        let t0 = Instant::now();
        d.schedule_at("redraw", t0);
        assert_eq!(d.tick_at(t0 + Duration::from_millis(120)), Some("redraw"));
        assert!(!d.is_pending());
        assert!(d.tick_at(t0 + Duration::from_millis(500)).is_none());
    }

    #[test]
    fn test_debounce_resets_timer() {
        let mut d = Debouncer::new(50);
        let t0 = Instant::now();
        d.schedule_at(1u8, t0);
        d.schedule_at(2u8, t0 + Duration::from_millis(30));

        assert!(d.tick_at(t0 + Duration::from_millis(60)).is_none());
        assert_eq!(d.pending_key(), Some(&2));
        assert_eq!(d.tick_at(t0 + Duration::from_millis(80)), Some(2));
    }

    #[test]
    fn test_flush_and_cancel() {
        let mut d = Debouncer::new(500);
        d.schedule(());
        assert_eq!(d.flush(), Some(()));
        assert!(d.flush().is_none());
        d.schedule(());
        d.cancel();
        assert!(!d.is_pending());
    }
}
