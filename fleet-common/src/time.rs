use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

/// Clock abstraction so the adapter's ingestion stamp and the store's expiry
/// can be driven by a manual clock in tests.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Default)]
pub struct SystemClock {}

impl TimeSource for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manual clock for tests. Only moves when told to.
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(start: OffsetDateTime) -> Self {
        FixedClock {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("poisoned FixedClock mutex");
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        let mut now = self.now.lock().expect("poisoned FixedClock mutex");
        *now = to;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("poisoned FixedClock mutex")
    }
}
