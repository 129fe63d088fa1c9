//! Change-detecting renderers for the status LED and the power relay.
//!
//! The sequencer only sets logical targets. Drivers remember what they last
//! rendered and touch the pin only when that changes, except while flashing,
//! where the LED is re-evaluated on every call against the flash countdown.
//! A write the board rejects leaves nothing recorded, so the next call
//! writes again.

use core::fmt;

use crate::io::{OutputLine, PowerIo};
use crate::timers::TimerBank;
use crate::timing::FLASH_RELOAD_TICKS;

/// Logical target for the status LED.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedTarget {
    #[default]
    Off,
    On,
    Flash,
}

impl fmt::Display for LedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LedTarget::Off => "off",
            LedTarget::On => "on",
            LedTarget::Flash => "flash",
        })
    }
}

/// Logical target for the power relay.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayTarget {
    #[default]
    Off,
    On,
}

impl RelayTarget {
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, RelayTarget::On)
    }
}

impl fmt::Display for RelayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_on() { "on" } else { "off" })
    }
}

/// Renders [`LedTarget`]s onto the LED line.
#[derive(Clone, Debug, Default)]
pub struct LedDriver {
    rendered: Option<LedTarget>,
    lit: bool,
}

impl LedDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rendered: None,
            lit: false,
        }
    }

    /// Physical LED level last written.
    #[must_use]
    pub const fn is_lit(&self) -> bool {
        self.lit
    }

    /// Target rendered on the previous call, if any.
    #[must_use]
    pub const fn rendered(&self) -> Option<LedTarget> {
        self.rendered
    }

    pub fn render<P: PowerIo + ?Sized>(&mut self, target: LedTarget, io: &mut P, timers: &TimerBank) {
        if self.rendered == Some(target) && target != LedTarget::Flash {
            return;
        }

        let written = match target {
            LedTarget::On => self.write(io, true),
            LedTarget::Off => self.write(io, false),
            LedTarget::Flash => {
                !timers.take_flash_expiry(FLASH_RELOAD_TICKS) || self.write(io, !self.lit)
            }
        };
        self.rendered = written.then_some(target);
    }

    fn write<P: PowerIo + ?Sized>(&mut self, io: &mut P, lit: bool) -> bool {
        let written = io.drive(OutputLine::Led, lit);
        if written {
            self.lit = lit;
        }
        written
    }
}

/// Renders [`RelayTarget`]s onto the relay line.
#[derive(Clone, Debug, Default)]
pub struct RelayDriver {
    rendered: Option<RelayTarget>,
}

impl RelayDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self { rendered: None }
    }

    /// Target rendered on the previous call, if any.
    #[must_use]
    pub const fn rendered(&self) -> Option<RelayTarget> {
        self.rendered
    }

    pub fn render<P: PowerIo + ?Sized>(&mut self, target: RelayTarget, io: &mut P) {
        if self.rendered == Some(target) {
            return;
        }
        let written = io.drive(OutputLine::Relay, target.is_on());
        self.rendered = written.then_some(target);
    }
}
