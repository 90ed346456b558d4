//! Injectable clock abstraction.
//!
//! Intervention timing is always computed from an injected clock so the
//! state machine is testable with a fake clock, decoupled from any
//! rendering or event loop. Production code uses `SystemClock`; tests and
//! the CLI simulation drive a `ManualClock`.

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Source of the current time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
///
/// Clones share the same underlying instant, so a tracker holding one
/// clone observes advances made through another.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.now.set(instant);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
