//! Completion percentage of a topic-group.

/// Percentage of completed topics, `0.0` when there are none.
///
/// `completed <= total` is maintained by storage, so the result stays in
/// `0.0..=100.0` without clamping.
#[must_use]
pub fn compute(total: u32, completed: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(completed) / f64::from(total) * 100.0
}
