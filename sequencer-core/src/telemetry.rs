//! Transition history shared by firmware and host targets.
//!
//! Records are stamped with the timer bank uptime (in ticks) and kept in a
//! fixed-capacity ring so the history never allocates.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::sequencer::Transition;
use crate::timing::TICK_PERIOD;

/// Number of transition records retained by default.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Identifier assigned to each record in arrival order.
pub type EventId = u32;

/// One recorded state transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionRecord {
    pub id: EventId,
    pub at_ticks: u32,
    pub transition: Transition,
    /// Ticks spent in the state being left, when a previous record exists.
    pub elapsed_ticks: Option<u32>,
}

impl TransitionRecord {
    /// Timestamp converted to wall-clock time since boot.
    #[must_use]
    pub fn at(&self) -> Duration {
        TICK_PERIOD * self.at_ticks
    }

    /// Time spent in the previous state, if known.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_ticks.map(|ticks| TICK_PERIOD * ticks)
    }
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} t=+{}ms {}",
            self.id,
            self.at().as_millis(),
            self.transition
        )?;
        if let Some(elapsed) = self.elapsed() {
            write!(f, " after {}ms", elapsed.as_millis())?;
        }
        Ok(())
    }
}

/// Ring buffer of the most recent transitions.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TransitionRecord, CAPACITY>,
    last_at: Option<u32>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_at: None,
            next_event_id: 0,
        }
    }

    /// Stores a transition observed at `at_ticks` and returns its record.
    pub fn record(&mut self, transition: Transition, at_ticks: u32) -> TransitionRecord {
        let elapsed_ticks = self.last_at.map(|previous| at_ticks.wrapping_sub(previous));
        self.last_at = Some(at_ticks);

        let record = TransitionRecord {
            id: self.next_event_id,
            at_ticks,
            transition,
            elapsed_ticks,
        };
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(record);
        record
    }

    /// Records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TransitionRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TransitionRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
