//! Power-on / power-off state machine.
//!
//! The sequencer runs once per main-loop iteration. It consumes the debounced
//! button state, samples the confirmation line while waiting on the SBC, sets
//! the LED and relay targets, drives the shutdown request directly, and arms
//! the safety countdown on entry to each waiting state. Every anomaly
//! (unresponsive SBC, unknown state) ends in [`SequencerState::Idle`] with
//! power removed.

use core::fmt;

use crate::input;
use crate::io::{OutputLine, PowerIo};
use crate::outputs::{LedTarget, RelayTarget};
use crate::timers::TimerBank;
use crate::timing::{SAFETY_START_TIME, SAFETY_STOP_TIME, TURN_OFF_TIME};

/// Phases of the power sequence.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerState {
    /// SBC unpowered, waiting for a button press.
    #[default]
    Idle,
    /// Button pressed from idle; waiting for release.
    PowerOnStart,
    /// Relay closed; waiting for the SBC to report it is running.
    PowerOnWait,
    /// SBC running.
    PowerOn,
    /// Button pressed while running; waiting for release.
    PowerOffStart,
    /// Shutdown requested; waiting for the SBC to report it stopped.
    PowerOffWait,
    /// SBC stopped; grace delay before opening the relay.
    PowerOff,
}

impl SequencerState {
    /// Every state in sequence order.
    pub const ALL: [SequencerState; 7] = [
        SequencerState::Idle,
        SequencerState::PowerOnStart,
        SequencerState::PowerOnWait,
        SequencerState::PowerOn,
        SequencerState::PowerOffStart,
        SequencerState::PowerOffWait,
        SequencerState::PowerOff,
    ];

    /// Stable code for the state.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            SequencerState::Idle => 0,
            SequencerState::PowerOnStart => 1,
            SequencerState::PowerOnWait => 2,
            SequencerState::PowerOn => 3,
            SequencerState::PowerOffStart => 4,
            SequencerState::PowerOffWait => 5,
            SequencerState::PowerOff => 6,
        }
    }

    /// Decodes a raw code, returning `None` for unknown values.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SequencerState::Idle),
            1 => Some(SequencerState::PowerOnStart),
            2 => Some(SequencerState::PowerOnWait),
            3 => Some(SequencerState::PowerOn),
            4 => Some(SequencerState::PowerOffStart),
            5 => Some(SequencerState::PowerOffWait),
            6 => Some(SequencerState::PowerOff),
            _ => None,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SequencerState::Idle => "idle",
            SequencerState::PowerOnStart => "poweron-start",
            SequencerState::PowerOnWait => "poweron-wait",
            SequencerState::PowerOn => "poweron",
            SequencerState::PowerOffStart => "poweroff-start",
            SequencerState::PowerOffWait => "poweroff-wait",
            SequencerState::PowerOff => "poweroff",
        }
    }
}

impl TryFrom<u8> for SequencerState {
    type Error = InvalidState;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or(InvalidState(raw))
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw state code that does not name a [`SequencerState`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidState(pub u8);

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sequencer state {:#04x}", self.0)
    }
}

impl core::error::Error for InvalidState {}

/// Reason a transition fired.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionCause {
    ButtonPressed,
    ButtonReleased,
    SbcRunning,
    SbcStopped,
    BootTimeout,
    ShutdownTimeout,
    GraceElapsed,
}

impl TransitionCause {
    /// Returns `true` when a safety timeout forced the power-off.
    #[must_use]
    pub const fn is_timeout(self) -> bool {
        matches!(
            self,
            TransitionCause::BootTimeout | TransitionCause::ShutdownTimeout
        )
    }
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionCause::ButtonPressed => "button-pressed",
            TransitionCause::ButtonReleased => "button-released",
            TransitionCause::SbcRunning => "sbc-running",
            TransitionCause::SbcStopped => "sbc-stopped",
            TransitionCause::BootTimeout => "boot-timeout",
            TransitionCause::ShutdownTimeout => "shutdown-timeout",
            TransitionCause::GraceElapsed => "grace-elapsed",
        })
    }
}

/// State change reported by [`Sequencer::evaluate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: SequencerState,
    pub to: SequencerState,
    pub cause: TransitionCause,
}

impl Transition {
    #[must_use]
    pub const fn new(from: SequencerState, to: SequencerState, cause: TransitionCause) -> Self {
        Self { from, to, cause }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.cause)
    }
}

/// The power sequencing state machine and the logical output targets it owns.
#[derive(Clone, Debug, Default)]
pub struct Sequencer {
    state: SequencerState,
    led: LedTarget,
    relay: RelayTarget,
    shutdown_requested: bool,
    /// Set when the last shutdown request write was rejected by the board.
    shutdown_line_stale: bool,
}

impl Sequencer {
    /// Creates a sequencer in [`SequencerState::Idle`] with every output off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SequencerState::Idle,
            led: LedTarget::Off,
            relay: RelayTarget::Off,
            shutdown_requested: false,
            shutdown_line_stale: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    #[must_use]
    pub const fn led_target(&self) -> LedTarget {
        self.led
    }

    #[must_use]
    pub const fn relay_target(&self) -> RelayTarget {
        self.relay
    }

    /// Level last driven onto the shutdown request line.
    #[must_use]
    pub const fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Restores the state from a raw code.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidState`] for an unknown code, after resetting the
    /// sequencer to [`SequencerState::Idle`].
    pub fn resume(&mut self, raw: u8) -> Result<(), InvalidState> {
        match SequencerState::try_from(raw) {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(err) => {
                self.state = SequencerState::Idle;
                Err(err)
            }
        }
    }

    /// Removes power: LED and relay off, shutdown request released, every
    /// countdown cleared. Safe to call repeatedly.
    pub fn power_off<P: PowerIo + ?Sized>(&mut self, io: &mut P, timers: &TimerBank) {
        self.led = LedTarget::Off;
        self.relay = RelayTarget::Off;
        self.set_shutdown_request(io, false);
        timers.reset();
    }

    /// Runs one evaluation of the state table.
    pub fn evaluate<P: PowerIo + ?Sized>(
        &mut self,
        button_pressed: bool,
        io: &mut P,
        timers: &TimerBank,
    ) -> Option<Transition> {
        use SequencerState as S;
        use TransitionCause as C;

        if self.shutdown_line_stale {
            self.set_shutdown_request(io, self.shutdown_requested);
        }

        let (next, cause) = match self.state {
            S::Idle if button_pressed => (S::PowerOnStart, C::ButtonPressed),
            S::PowerOnStart if !button_pressed => {
                self.led = LedTarget::Flash;
                self.relay = RelayTarget::On;
                timers.arm_safety(SAFETY_START_TIME);
                (S::PowerOnWait, C::ButtonReleased)
            }
            S::PowerOnWait => {
                if timers.safety_remaining() == 0 {
                    self.power_off(io, timers);
                    (S::Idle, C::BootTimeout)
                } else if input::is_running(io) {
                    timers.disarm_safety();
                    self.led = LedTarget::On;
                    (S::PowerOn, C::SbcRunning)
                } else {
                    return None;
                }
            }
            S::PowerOn if button_pressed => (S::PowerOffStart, C::ButtonPressed),
            S::PowerOffStart if !button_pressed => {
                self.led = LedTarget::Flash;
                self.set_shutdown_request(io, true);
                timers.arm_safety(SAFETY_STOP_TIME);
                (S::PowerOffWait, C::ButtonReleased)
            }
            S::PowerOffWait => {
                if timers.safety_remaining() == 0 {
                    self.power_off(io, timers);
                    (S::Idle, C::ShutdownTimeout)
                } else if input::is_running(io) {
                    return None;
                } else {
                    timers.arm_safety(TURN_OFF_TIME);
                    (S::PowerOff, C::SbcStopped)
                }
            }
            S::PowerOff if timers.safety_remaining() == 0 => {
                self.power_off(io, timers);
                (S::Idle, C::GraceElapsed)
            }
            _ => return None,
        };

        let transition = Transition::new(self.state, next, cause);
        self.state = next;
        Some(transition)
    }

    fn set_shutdown_request<P: PowerIo + ?Sized>(&mut self, io: &mut P, asserted: bool) {
        self.shutdown_requested = asserted;
        self.shutdown_line_stale = !io.drive(OutputLine::ShutdownRequest, asserted);
    }
}
