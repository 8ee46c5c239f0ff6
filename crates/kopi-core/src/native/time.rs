//! Monotonic millisecond clock
//!
//! The wall clock is read once, at first use, and every later reading adds
//! monotonic elapsed time to it. Values look like epoch milliseconds but never
//! go backwards within a process.

use std::sync::LazyLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock anchor paired with the monotonic instant it was taken at
static CLOCK_ANCHOR: LazyLock<(i64, Instant)> = LazyLock::new(|| {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis();
    (i64::try_from(wall).unwrap_or(i64::MAX), Instant::now())
});

/// Milliseconds since the Unix epoch, non-decreasing across calls
pub fn current_time_millis() -> i64 {
    let (wall, start) = *CLOCK_ANCHOR;
    let elapsed = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
    wall.saturating_add(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_is_non_decreasing() {
        let mut last = current_time_millis();
        for _ in 0..1000 {
            let now = current_time_millis();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_time_looks_like_epoch_millis() {
        // 2020-01-01T00:00:00Z
        assert!(current_time_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_time_advances() {
        let before = current_time_millis();
        std::thread::sleep(Duration::from_millis(15));
        assert!(current_time_millis() >= before + 10);
    }
}
