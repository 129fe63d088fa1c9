//! Digital I/O boundary between the sequencer and the board.
//!
//! The core never touches registers. A platform implements [`PowerIo`] to
//! expose raw line levels, the debounce settle wait, and output drives;
//! [`PinIo`] does so for any set of `embedded-hal` pins.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::timing::DEBOUNCE_SETTLE;

/// Electrical level read from an input line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineLevel {
    Low,
    High,
}

impl LineLevel {
    #[must_use]
    pub const fn from_high(high: bool) -> Self {
        if high { LineLevel::High } else { LineLevel::Low }
    }

    #[must_use]
    pub const fn is_low(self) -> bool {
        matches!(self, LineLevel::Low)
    }
}

/// Which electrical level means "active" for a signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    /// Returns `true` when `level` is the active level for this polarity.
    #[must_use]
    pub const fn is_active(self, level: LineLevel) -> bool {
        match self {
            Polarity::ActiveLow => level.is_low(),
            Polarity::ActiveHigh => !level.is_low(),
        }
    }
}

/// Digital inputs sampled by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputLine {
    /// Front-panel pushbutton; pulls the line low while pressed.
    Button,
    /// SBC status line; held high while the SBC is running.
    Confirmation,
}

impl InputLine {
    /// Static wiring metadata for the line.
    #[must_use]
    pub const fn signal(self) -> Signal {
        match self {
            InputLine::Button => Signal::new("PUSHBTN", Polarity::ActiveLow),
            InputLine::Confirmation => Signal::new("SHTDIN", Polarity::ActiveHigh),
        }
    }
}

/// Digital outputs driven by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputLine {
    /// Pushbutton status LED.
    Led,
    /// Relay gating SBC power.
    Relay,
    /// Request asking the SBC to begin an orderly shutdown.
    ShutdownRequest,
}

impl OutputLine {
    /// Static wiring metadata for the line.
    #[must_use]
    pub const fn signal(self) -> Signal {
        match self {
            OutputLine::Led => Signal::new("LED", Polarity::ActiveHigh),
            OutputLine::Relay => Signal::new("RELAY", Polarity::ActiveHigh),
            OutputLine::ShutdownRequest => Signal::new("SHTDOUT", Polarity::ActiveHigh),
        }
    }
}

/// Name and polarity of a board signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Signal {
    pub name: &'static str,
    pub polarity: Polarity,
}

impl Signal {
    #[must_use]
    pub const fn new(name: &'static str, polarity: Polarity) -> Self {
        Self { name, polarity }
    }
}

/// Board services consumed by the sequencer.
pub trait PowerIo {
    /// Reads the instantaneous level of an input line.
    fn sample(&mut self, line: InputLine) -> LineLevel;

    /// Waits the debounce settle interval between two samples.
    fn settle(&mut self);

    /// Drives an output line to its active (`true`) or inactive level.
    /// Returns `false` when the write did not take effect.
    fn drive(&mut self, line: OutputLine, active: bool) -> bool;

    /// Returns `true` when the input currently reads its active level.
    fn is_active(&mut self, line: InputLine) -> bool {
        line.signal().polarity.is_active(self.sample(line))
    }
}

/// [`PowerIo`] over `embedded-hal` pins and a blocking delay.
///
/// A failed input read reports the level that keeps the controller in its
/// safe interpretation: button released, SBC still running. Failed writes are
/// counted and reported back to the caller so it can retry.
pub struct PinIo<B, C, L, R, S, D> {
    button: B,
    confirmation: C,
    led: L,
    relay: R,
    shutdown_request: S,
    delay: D,
    write_errors: u32,
}

impl<B, C, L, R, S, D> PinIo<B, C, L, R, S, D>
where
    B: InputPin,
    C: InputPin,
    L: OutputPin,
    R: OutputPin,
    S: OutputPin,
    D: DelayNs,
{
    pub fn new(button: B, confirmation: C, led: L, relay: R, shutdown_request: S, delay: D) -> Self {
        Self {
            button,
            confirmation,
            led,
            relay,
            shutdown_request,
            delay,
            write_errors: 0,
        }
    }

    /// Number of output writes the HAL has rejected.
    #[must_use]
    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }
}

fn drive_pin<P: OutputPin>(pin: &mut P, high: bool) -> bool {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.is_ok()
}

impl<B, C, L, R, S, D> PowerIo for PinIo<B, C, L, R, S, D>
where
    B: InputPin,
    C: InputPin,
    L: OutputPin,
    R: OutputPin,
    S: OutputPin,
    D: DelayNs,
{
    fn sample(&mut self, line: InputLine) -> LineLevel {
        let high = match line {
            InputLine::Button => self.button.is_high().unwrap_or(true),
            InputLine::Confirmation => self.confirmation.is_high().unwrap_or(true),
        };
        LineLevel::from_high(high)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn settle(&mut self) {
        self.delay.delay_us(DEBOUNCE_SETTLE.as_micros() as u32);
    }

    fn drive(&mut self, line: OutputLine, active: bool) -> bool {
        let high = active == matches!(line.signal().polarity, Polarity::ActiveHigh);
        let written = match line {
            OutputLine::Led => drive_pin(&mut self.led, high),
            OutputLine::Relay => drive_pin(&mut self.relay, high),
            OutputLine::ShutdownRequest => drive_pin(&mut self.shutdown_request, high),
        };
        if !written {
            self.write_errors = self.write_errors.saturating_add(1);
        }
        written
    }
}
