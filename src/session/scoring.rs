//! Latency-weighted scoring for correct answers.

use std::time::Duration;

/// Points earned by a correct answer submitted with `remaining` time
/// left in a `question_time`-long answer window.
///
/// 4 points above 95% of the window, 3 above 85%, 2 above 50%, 1 for
/// anything else still inside the window, 0 once it has expired. All
/// thresholds are strict. Wrong answers never reach this function.
#[must_use]
pub fn award(remaining: Duration, question_time: Duration) -> u64 {
    if remaining.is_zero() {
        return 0;
    }

    let remaining = remaining.as_secs_f64();
    let window = question_time.as_secs_f64();
    if remaining > window * 0.95 {
        4
    } else if remaining > window * 0.85 {
        3
    } else if remaining > window * 0.50 {
        2
    } else {
        1
    }
}
