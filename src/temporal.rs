//! Matching an event to the position samples of its ride by time.

use chrono::NaiveDateTime;

use crate::records::PositionSample;

/// Absolute time between a sample and an event, in microseconds.
fn delta(sample: &PositionSample, at: NaiveDateTime) -> i64 {
    (sample.timestamp - at)
        .num_microseconds()
        .map_or(i64::MAX, i64::abs)
}

/// The sample closest in time to `at`. The earliest of equally close
/// samples wins.
pub fn closest(samples: &[PositionSample], at: NaiveDateTime) -> Option<&PositionSample> {
    samples.iter().min_by_key(|s| delta(s, at))
}

/// Up to two samples ordered by closeness to `at`. Equally close samples
/// keep their chronological order. Rides with fewer than two samples give
/// a shorter list.
pub fn closest_two(samples: &[PositionSample], at: NaiveDateTime) -> Vec<&PositionSample> {
    let mut by_delta: Vec<&PositionSample> = samples.iter().collect();
    by_delta.sort_by_key(|s| delta(s, at));
    by_delta.truncate(2);
    by_delta
}
