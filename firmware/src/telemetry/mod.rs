//! Transition log for the firmware.
//!
//! Every transition is kept in the shared [`TelemetryRecorder`] ring and
//! mirrored to defmt (stdout on host builds). Safety timeouts log at `warn`.

#![allow(dead_code)]

use sequencer_core::Transition;
use sequencer_core::telemetry::{TelemetryRecorder, TransitionRecord};

pub struct TransitionLog {
    recorder: TelemetryRecorder,
}

impl TransitionLog {
    pub const fn new() -> Self {
        Self {
            recorder: TelemetryRecorder::new(),
        }
    }

    /// Stores a transition observed at `at_ticks` and emits it.
    pub fn record(&mut self, transition: Transition, at_ticks: u32) -> TransitionRecord {
        let record = self.recorder.record(transition, at_ticks);
        emit_log(&record);
        record
    }

    pub fn recorder(&self) -> &TelemetryRecorder {
        &self.recorder
    }
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn emit_log(record: &TransitionRecord) {
    let transition = record.transition;
    if transition.cause.is_timeout() {
        defmt::warn!(
            "telemetry:sequencer #{} {} -> {} ({}) t={}ticks",
            record.id,
            transition.from,
            transition.to,
            transition.cause,
            record.at_ticks
        );
    } else if let Some(elapsed) = record.elapsed_ticks {
        defmt::info!(
            "telemetry:sequencer #{} {} -> {} ({}) t={}ticks Δ={}ticks",
            record.id,
            transition.from,
            transition.to,
            transition.cause,
            record.at_ticks,
            elapsed
        );
    } else {
        defmt::info!(
            "telemetry:sequencer #{} {} -> {} ({}) t={}ticks",
            record.id,
            transition.from,
            transition.to,
            transition.cause,
            record.at_ticks
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(record: &TransitionRecord) {
    if record.transition.cause.is_timeout() {
        println!("telemetry:sequencer WARN {record}");
    } else {
        println!("telemetry:sequencer {record}");
    }
}
