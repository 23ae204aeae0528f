use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Wall-clock source for capture timestamps and log times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock that never runs backwards. After the host clock is
/// stepped back, readings hold at the latest value returned until wall time
/// catches up.
#[derive(Debug, Default)]
pub struct SystemClock {
    latest: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let now = match *latest {
            Some(previous) if previous > wall => previous,
            _ => wall,
        };
        *latest = Some(now);
        now
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }
}

/// Clock that only moves when told to. Each call to `now` advances it by
/// `step` so successive captures stay non-decreasing.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_step(start, chrono::Duration::zero())
    }

    pub fn with_step(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let now = *current;
        *current += self.step;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_steps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::with_step(start, chrono::Duration::milliseconds(5));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + chrono::Duration::milliseconds(5));
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(
            clock.now(),
            start + chrono::Duration::milliseconds(1010)
        );
    }

    #[test]
    fn system_clock_holds_through_a_backwards_step() {
        let clock = SystemClock::new();
        let t = Utc.with_ymd_and_hms(2024, 5, 17, 9, 4, 33).unwrap();

        assert_eq!(clock.observe(t), t);
        assert_eq!(clock.observe(t - chrono::Duration::seconds(5)), t);
        assert_eq!(clock.observe(t), t);
        assert_eq!(
            clock.observe(t + chrono::Duration::milliseconds(1)),
            t + chrono::Duration::milliseconds(1)
        );
    }

    #[test]
    fn system_clock_never_decreases() {
        let clock = SystemClock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next >= previous, "{next} < {previous}");
            previous = next;
        }
    }
}
