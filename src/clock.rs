use std::time::{SystemTime, UNIX_EPOCH};

/// The monotonic millisecond tick the engine times ACK waits and retransmissions
/// against. Generalizes the original's `SSPOSAL_GetTickCount()` into an injectable
/// trait (per the "explicit context handle" guidance) so tests can supply a fake
/// clock instead of racing real time.
///
/// Implementations are free to wrap on overflow: callers always compare ticks with
/// wrapping subtraction, never with ordering.
pub trait Clock: Send {
    fn now_ms(&self) -> u32;
}

/// A `Clock` backed by the system's real-time clock, matching the teacher's use of
/// `SystemTime::now().duration_since(UNIX_EPOCH)` for its tick source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u32
    }
}

/// Returns `now - then` interpreted as an unsigned duration, tolerant of the tick
/// counter wrapping around (§3 of the specification).
pub(crate) fn elapsed_ms(now: u32, then: u32) -> u32 {
    now.wrapping_sub(then)
}
