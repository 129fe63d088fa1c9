//! Countdown timers decremented from the tick context.
//!
//! [`TimerBank`] is shared between the periodic tick handler and the main
//! loop. All countdown state sits behind one critical section so a reader
//! never observes a half-applied prescaler reload; the free-running uptime
//! counter is a plain atomic because nothing else depends on it.

use core::cell::Cell;

use critical_section::Mutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::timing::PRESCALER_RELOAD;

/// Snapshot of every countdown in the bank.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerCounters {
    /// Ticks until the flashing LED toggles again.
    pub flash: u16,
    /// Coarse units until the safety timer expires (0 == inactive/expired).
    pub safety: u16,
    /// Ticks left in the current coarse unit.
    pub prescaler: u16,
}

impl TimerCounters {
    /// All counters cleared.
    pub const ZERO: Self = Self {
        flash: 0,
        safety: 0,
        prescaler: 0,
    };

    /// Returns `true` while the safety countdown is running.
    #[must_use]
    pub const fn safety_armed(&self) -> bool {
        self.safety > 0
    }

    fn tick(&mut self) {
        if self.flash > 0 {
            self.flash -= 1;
        }

        if self.safety > 0 {
            if self.prescaler > 0 {
                self.prescaler -= 1;
            } else {
                self.prescaler = PRESCALER_RELOAD;
                self.safety -= 1;
            }
        }
    }
}

/// Flash and safety countdowns shared between the tick handler and main loop.
pub struct TimerBank {
    counters: Mutex<Cell<TimerCounters>>,
    uptime: AtomicU32,
}

impl TimerBank {
    /// Creates a bank with every counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Cell::new(TimerCounters::ZERO)),
            uptime: AtomicU32::new(0),
        }
    }

    /// Advances every countdown by one tick.
    ///
    /// Called from the tick context at [`TICK_PERIOD`](crate::timing::TICK_PERIOD).
    pub fn tick(&self) {
        self.uptime.fetch_add(1, Ordering::Relaxed);
        self.update(TimerCounters::tick);
    }

    /// Ticks observed since the bank was created (wrapping).
    #[must_use]
    pub fn uptime_ticks(&self) -> u32 {
        self.uptime.load(Ordering::Relaxed)
    }

    /// Returns a consistent copy of all counters.
    #[must_use]
    pub fn counters(&self) -> TimerCounters {
        critical_section::with(|cs| self.counters.borrow(cs).get())
    }

    /// Coarse units left on the safety countdown.
    #[must_use]
    pub fn safety_remaining(&self) -> u16 {
        self.counters().safety
    }

    /// Starts the safety countdown at `units`, restarting the prescaler so
    /// the span is exactly `units` coarse units long.
    pub fn arm_safety(&self, units: u16) {
        self.update(|counters| {
            counters.safety = units;
            counters.prescaler = PRESCALER_RELOAD;
        });
    }

    /// Stops the safety countdown.
    pub fn disarm_safety(&self) {
        self.update(|counters| counters.safety = 0);
    }

    /// Returns `true` and reloads the flash countdown to `reload` when it has
    /// reached zero; otherwise leaves it untouched.
    pub fn take_flash_expiry(&self, reload: u16) -> bool {
        critical_section::with(|cs| {
            let cell = self.counters.borrow(cs);
            let mut counters = cell.get();
            if counters.flash > 0 {
                return false;
            }
            counters.flash = reload;
            cell.set(counters);
            true
        })
    }

    /// Clears every countdown.
    pub fn reset(&self) {
        critical_section::with(|cs| self.counters.borrow(cs).set(TimerCounters::ZERO));
    }

    fn update(&self, apply: impl FnOnce(&mut TimerCounters)) {
        critical_section::with(|cs| {
            let cell = self.counters.borrow(cs);
            let mut counters = cell.get();
            apply(&mut counters);
            cell.set(counters);
        });
    }
}

impl Default for TimerBank {
    fn default() -> Self {
        Self::new()
    }
}
