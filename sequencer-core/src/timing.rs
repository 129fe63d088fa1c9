//! Compile-time timing model shared by firmware and host targets.
//!
//! Every interval is declared as a [`Duration`] and converted to the integer
//! counts the timer bank works in. The tick source runs at [`TICK_PERIOD`];
//! long timeouts are counted in coarse units, one unit per full prescaler
//! cycle.

use core::time::Duration;

/// Period of the external tick source.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

/// Half period of the flashing LED (time between toggles).
pub const FLASH_HALF_PERIOD: Duration = Duration::from_millis(500);

/// Length of one coarse safety-timer unit.
pub const COARSE_UNIT: Duration = Duration::from_millis(500);

/// Settle delay between the two samples of a debounced input.
pub const DEBOUNCE_SETTLE: Duration = Duration::from_micros(1_500);

/// Time allowed for the SBC to report it is running after power is applied.
pub const BOOT_TIMEOUT: Duration = Duration::from_secs(100);

/// Time allowed for the SBC to finish shutting down once asked.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(100);

/// Grace delay between shutdown confirmation and opening the relay.
pub const TURN_OFF_DELAY: Duration = Duration::from_secs(4);

/// Tick count of one flash half period.
pub const FLASH_RELOAD_TICKS: u16 = ticks(FLASH_HALF_PERIOD);

/// Prescaler reload value; a full cycle (reload plus countdown to zero) spans
/// one [`COARSE_UNIT`].
pub const PRESCALER_RELOAD: u16 = ticks(COARSE_UNIT) - 1;

/// Boot safety timeout in coarse units.
pub const SAFETY_START_TIME: u16 = coarse_units(BOOT_TIMEOUT);

/// Shutdown safety timeout in coarse units.
pub const SAFETY_STOP_TIME: u16 = coarse_units(SHUTDOWN_TIMEOUT);

/// Post-shutdown grace delay in coarse units.
pub const TURN_OFF_TIME: u16 = coarse_units(TURN_OFF_DELAY);

const _: () = assert!(DEBOUNCE_SETTLE.as_nanos() < TICK_PERIOD.as_nanos());
const _: () = assert!(FLASH_HALF_PERIOD.as_nanos() % TICK_PERIOD.as_nanos() == 0);
const _: () = assert!(COARSE_UNIT.as_nanos() % TICK_PERIOD.as_nanos() == 0);
const _: () = assert!(PRESCALER_RELOAD > 0);
const _: () = assert!(TURN_OFF_TIME > 0 && SAFETY_START_TIME > 0 && SAFETY_STOP_TIME > 0);

/// Converts a duration into whole ticks, rounding down.
///
/// # Panics
///
/// Panics at compile time (when used in a `const`) if the count does not fit
/// in a `u16`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn ticks(duration: Duration) -> u16 {
    let count = duration.as_nanos() / TICK_PERIOD.as_nanos();
    assert!(count <= u16::MAX as u128, "tick count overflows u16");
    count as u16
}

/// Converts a duration into whole coarse units, rounding down.
///
/// # Panics
///
/// Panics at compile time (when used in a `const`) if the count does not fit
/// in a `u16`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn coarse_units(duration: Duration) -> u16 {
    let count = duration.as_nanos() / COARSE_UNIT.as_nanos();
    assert!(count <= u16::MAX as u128, "coarse unit count overflows u16");
    count as u16
}

/// Number of ticks an armed safety countdown of `units` takes to expire.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn ticks_for_coarse_units(units: u16) -> u32 {
    units as u32 * (PRESCALER_RELOAD as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_counts_match_reference_timing() {
        assert_eq!(FLASH_RELOAD_TICKS, 50);
        assert_eq!(PRESCALER_RELOAD, 49);
        assert_eq!(SAFETY_START_TIME, 200);
        assert_eq!(SAFETY_STOP_TIME, 200);
        assert_eq!(TURN_OFF_TIME, 8);
    }

    #[test]
    fn coarse_unit_spans_match_wall_clock() {
        let grace = TICK_PERIOD * ticks_for_coarse_units(TURN_OFF_TIME);
        assert_eq!(grace, TURN_OFF_DELAY);

        let boot = TICK_PERIOD * ticks_for_coarse_units(SAFETY_START_TIME);
        assert_eq!(boot, BOOT_TIMEOUT);
    }

    #[test]
    fn conversions_round_down() {
        assert_eq!(ticks(Duration::from_millis(19)), 1);
        assert_eq!(coarse_units(Duration::from_millis(999)), 1);
        assert_eq!(ticks(Duration::ZERO), 0);
    }
}
