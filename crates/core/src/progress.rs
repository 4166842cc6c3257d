//! Step-to-percentage conversion for engine progress callbacks.

/// Convert an engine step callback into a whole percentage.
///
/// Returns `None` for malformed input (`total <= 0`, a negative step, or
/// `step > total`) so the caller can skip reporting it.
pub fn step_percent(step: i64, total: i64) -> Option<u8> {
    if total <= 0 || step < 0 || step > total {
        return None;
    }
    // Widened so `step * 100` cannot overflow; step <= total bounds the
    // quotient at 100.
    Some((i128::from(step) * 100 / i128::from(total)) as u8)
}
