//! Maps a playback time to the caption being spoken and reports when that changes.

use crate::model::{Segment, Timed};

/// Index of the item being played at `t`.
///
/// `items` must be sorted ascending by start. Returns the `i` with `items[i].start <= t` whose
/// successor (if any) starts after `t`, so the last item stays current past its end. Returns
/// `None` for an empty slice, for `t` before the first start, and for NaN.
///
/// Among items sharing a start time, the last of that run is returned; it is the only one
/// whose successor starts later.
pub fn locate<T: Timed>(items: &[T], t: f64) -> Option<usize> {
  items.partition_point(|item| item.start() <= t).checked_sub(1)
}

/// Tracks the current segment across playback ticks.
#[derive(Debug, Default)]
pub struct TranscriptSync {
  segments: Vec<Segment>,
  current: Option<usize>,
}

impl TranscriptSync {
  pub fn new(segments: Vec<Segment>) -> Self {
    Self { segments, current: None }
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  pub fn current(&self) -> Option<usize> {
    self.current
  }

  /// Update the current index for time `t`. Returns `true` when it changed, including a
  /// change to `None`, which means the highlight should be cleared.
  pub fn on_time_update(&mut self, t: f64) -> bool {
    let found = locate(&self.segments, t);
    if found == self.current {
      return false;
    }
    self.current = found;
    true
  }

  /// Swap in a new segment list and forget the current index.
  pub fn replace(&mut self, segments: Vec<Segment>) {
    self.segments = segments;
    self.current = None;
  }
}
