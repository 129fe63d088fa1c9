#![no_std]

// Power sequencing logic for a pushbutton-controlled SBC supply.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. The board is reached only through the `io::PowerIo`
// trait and the tick source only through `timers::TimerBank`.

pub mod controller;
pub mod input;
pub mod io;
pub mod outputs;
pub mod sequencer;
pub mod telemetry;
pub mod timers;
pub mod timing;

pub use controller::{ControllerStatus, PowerController};
pub use sequencer::{InvalidState, Sequencer, SequencerState, Transition, TransitionCause};
pub use timers::TimerBank;
