use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use crate::state::{ButtonState, PressEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Suppressed,
}

/// Turns sampled button levels into at most one `PressEvent` per debounce window.
///
/// The window opens on an accepted press and closes once `interval` has
/// elapsed, whatever the level did in between. A held button therefore fires
/// once per window instead of once per sample.
#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Debouncer {
            interval,
            last_accepted: None,
        }
    }

    pub fn state(&self, now: Instant) -> DebounceState {
        match self.last_accepted {
            Some(at) if now.saturating_duration_since(at) < self.interval => {
                DebounceState::Suppressed
            }
            _ => DebounceState::Idle,
        }
    }

    pub fn sample(&mut self, button: ButtonState, now: Instant) -> Option<PressEvent> {
        if button == ButtonState::Released {
            return None;
        }

        match self.state(now) {
            DebounceState::Idle => {
                self.last_accepted = Some(now);
                Some(PressEvent)
            }
            DebounceState::Suppressed => {
                trace!("Press suppressed by debounce window");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn held(debouncer: &mut Debouncer, start: Instant, step: Duration, samples: u32) -> usize {
        (0..samples)
            .filter_map(|i| debouncer.sample(ButtonState::Pressed, start + step * i))
            .count()
    }

    #[test]
    fn test_first_press_is_accepted() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(SECOND);
        assert_eq!(debouncer.state(now), DebounceState::Idle);
        assert_eq!(debouncer.sample(ButtonState::Pressed, now), Some(PressEvent));
        assert_eq!(debouncer.state(now), DebounceState::Suppressed);
    }

    #[test]
    fn test_released_never_fires() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(SECOND);
        for i in 0..5 {
            assert_eq!(debouncer.sample(ButtonState::Released, now + SECOND * i), None);
        }
        assert_eq!(debouncer.state(now), DebounceState::Idle);
    }

    #[test]
    fn test_bounce_inside_window_is_suppressed() {
        let now = Instant::now();
        let step = Duration::from_millis(10);
        let mut debouncer = Debouncer::new(SECOND);
        assert!(debouncer.sample(ButtonState::Pressed, now).is_some());
        assert!(debouncer.sample(ButtonState::Released, now + step).is_none());
        assert!(debouncer.sample(ButtonState::Pressed, now + step * 2).is_none());
        assert!(debouncer.sample(ButtonState::Released, now + step * 3).is_none());
        assert!(debouncer.sample(ButtonState::Pressed, now + SECOND).is_some());
    }

    #[test]
    fn test_window_closes_regardless_of_level() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(SECOND);
        debouncer.sample(ButtonState::Pressed, now);
        assert_eq!(
            debouncer.state(now + Duration::from_millis(999)),
            DebounceState::Suppressed
        );
        assert_eq!(debouncer.state(now + SECOND), DebounceState::Idle);
    }

    #[test]
    fn test_held_button_fires_once_per_window() {
        // held for 5s, sampled every 100ms, 2s window: presses at 0s, 2s, 4s
        let now = Instant::now();
        let mut debouncer = Debouncer::new(SECOND * 2);
        let fired = held(&mut debouncer, now, Duration::from_millis(100), 50);
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_held_button_never_exceeds_duration_over_interval() {
        let now = Instant::now();
        let step = Duration::from_millis(250);
        for interval_ms in [250u64, 400, 1000, 3000] {
            let interval = Duration::from_millis(interval_ms);
            let mut debouncer = Debouncer::new(interval);
            let samples = 40;
            let fired = held(&mut debouncer, now, step, samples);
            // the first press is accepted at t=0, so the hold fits ceil(D / interval) windows
            let held_for = (step * samples).as_millis();
            let bound = held_for.div_ceil(interval.as_millis()) as usize;
            assert!(fired >= 1);
            assert!(fired <= bound, "{fired} presses for {interval_ms}ms window");
        }
    }

    #[test]
    fn test_zero_interval_accepts_every_sample() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert_eq!(held(&mut debouncer, now, SECOND, 4), 4);
    }
}
