//! Controller aggregate tying the sequencer to its drivers and timers.
//!
//! [`PowerController::step`] is one main-loop iteration: render the LED,
//! render the relay, sample the button, then evaluate the state table. The
//! [`TimerBank`] is borrowed rather than owned so the tick context can reach
//! it through the same reference.

use crate::input;
use crate::io::PowerIo;
use crate::outputs::{LedDriver, LedTarget, RelayDriver, RelayTarget};
use crate::sequencer::{InvalidState, Sequencer, SequencerState, Transition};
use crate::timers::{TimerBank, TimerCounters};

/// Point-in-time view of the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerStatus {
    pub state: SequencerState,
    pub led: LedTarget,
    pub led_lit: bool,
    pub relay: RelayTarget,
    pub shutdown_requested: bool,
    pub timers: TimerCounters,
    pub uptime_ticks: u32,
}

/// Owns the power sequencer and output drivers for one board.
pub struct PowerController<'t> {
    timers: &'t TimerBank,
    sequencer: Sequencer,
    led: LedDriver,
    relay: RelayDriver,
}

impl<'t> PowerController<'t> {
    #[must_use]
    pub const fn new(timers: &'t TimerBank) -> Self {
        Self {
            timers,
            sequencer: Sequencer::new(),
            led: LedDriver::new(),
            relay: RelayDriver::new(),
        }
    }

    /// Timer bank shared with the tick handler.
    #[must_use]
    pub fn timers(&self) -> &'t TimerBank {
        self.timers
    }

    #[must_use]
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    /// Restores the sequencer from a raw state code.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidState`] when `raw` is unknown; the controller is then
    /// back in [`SequencerState::Idle`].
    pub fn resume(&mut self, raw: u8) -> Result<(), InvalidState> {
        self.sequencer.resume(raw)
    }

    /// Runs one main-loop iteration.
    pub fn step<P: PowerIo + ?Sized>(&mut self, io: &mut P) -> Option<Transition> {
        self.led.render(self.sequencer.led_target(), io, self.timers);
        self.relay.render(self.sequencer.relay_target(), io);
        let pressed = input::read_button(io);
        self.sequencer.evaluate(pressed, io, self.timers)
    }

    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.sequencer.state(),
            led: self.sequencer.led_target(),
            led_lit: self.led.is_lit(),
            relay: self.sequencer.relay_target(),
            shutdown_requested: self.sequencer.shutdown_requested(),
            timers: self.timers.counters(),
            uptime_ticks: self.timers.uptime_ticks(),
        }
    }
}
