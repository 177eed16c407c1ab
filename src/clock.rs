//! The rollover clock.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// An epoch-millisecond clock with an optional simulated override.
///
/// When no override is set the wall clock is authoritative. The override
/// exists to drive period crossings deterministically from tests; it is an
/// explicit optional slot, so a legitimately small timestamp is never
/// mistaken for "unset".
#[derive(Debug, Default)]
pub struct Clock {
    simulated: ArcSwapOption<i64>,
}

impl Clock {
    pub fn new() -> Clock {
        Clock::default()
    }

    /// The current time in milliseconds since the epoch.
    pub fn now_millis(&self) -> i64 {
        match self.simulated.load_full() {
            Some(millis) => *millis,
            None => chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Forces the clock to report `millis` until cleared.
    pub fn set_simulated(&self, millis: i64) {
        self.simulated.store(Some(Arc::new(millis)));
    }

    /// Returns authority to the wall clock.
    pub fn clear_simulated(&self) {
        self.simulated.store(None);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wall_clock_is_authoritative_when_unset() {
        let clock = Clock::new();
        let before = chrono::Utc::now().timestamp_millis();
        let now = clock.now_millis();
        let after = chrono::Utc::now().timestamp_millis();
        assert!(before <= now && now <= after);
    }

    #[test]
    fn simulated_time_overrides_and_clears() {
        let clock = Clock::new();
        clock.set_simulated(0);
        assert_eq!(clock.now_millis(), 0);
        clock.set_simulated(1_234);
        assert_eq!(clock.now_millis(), 1_234);
        clock.clear_simulated();
        assert!(clock.now_millis() > 1_234);
    }
}
