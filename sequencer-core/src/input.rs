//! Debounced reads of the pushbutton and the SBC confirmation line.

use crate::io::{InputLine, PowerIo};

/// Reports `true` only if `sample_active` sees the active condition twice,
/// separated by the platform settle delay. A first negative sample returns
/// immediately.
pub fn confirm<P, F>(io: &mut P, mut sample_active: F) -> bool
where
    P: PowerIo + ?Sized,
    F: FnMut(&mut P) -> bool,
{
    if !sample_active(io) {
        return false;
    }
    io.settle();
    sample_active(io)
}

/// Returns `true` when the pushbutton is held down on both samples.
pub fn read_button<P: PowerIo + ?Sized>(io: &mut P) -> bool {
    confirm(io, |io| io.is_active(InputLine::Button))
}

/// Returns `true` unless the confirmation line reads inactive on both
/// samples, so a single bad sample never reports the SBC as stopped.
pub fn is_running<P: PowerIo + ?Sized>(io: &mut P) -> bool {
    !confirm(io, |io| !io.is_active(InputLine::Confirmation))
}
