//! Per-video view state.
//!
//! A session owns one video's segments, chapters, highlight state, and list scroll state.
//! Loading another video builds a fresh session. Reloading the same video swaps the content
//! in place with [`TranscriptSession::replace_transcript`], keeping the filter and follow state.

use std::time::{Duration, Instant};

use crate::model::{self, Chapter, Row, Segment};
use crate::pacing::AutoScrollGate;
use crate::sync::{TranscriptSync, locate};
use crate::transcript::LoadedTranscript;

pub struct TranscriptSession {
  pub video_id: Option<String>,
  pub title: Option<String>,
  pub track: Option<String>,
  chapters: Vec<Chapter>,
  sync: TranscriptSync,
  gate: AutoScrollGate,
  auto_follow: bool,
  filter: String,
  rows: Vec<Row>,
  /// Selected row, moved by the user or pulled along by playback.
  cursor: Option<usize>,
  /// First visible row.
  offset: usize,
  /// Visible row count, as of the last render.
  viewport: usize,
}

/// Sort segments, drop non-finite starts, and fold segments sharing a start time into the
/// first one (its text gains the later texts).
pub fn ingest_segments(mut segments: Vec<Segment>) -> Vec<Segment> {
  segments.retain(|s| s.start.is_finite());
  segments.sort_by(|a, b| a.start.total_cmp(&b.start));
  let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
  for seg in segments {
    match out.last_mut() {
      Some(prev) if prev.start == seg.start => {
        if !seg.text.is_empty() {
          if !prev.text.is_empty() {
            prev.text.push(' ');
          }
          prev.text.push_str(&seg.text);
        }
        prev.end = prev.end.max(seg.end);
      }
      _ => out.push(seg),
    }
  }
  out
}

impl TranscriptSession {
  pub fn new(loaded: LoadedTranscript, cooldown: Duration, auto_follow: bool) -> Self {
    let segments = ingest_segments(loaded.segments);
    let chapters = model::normalize_chapters(loaded.chapters);
    let rows = model::rows(&segments, &chapters, "");
    Self {
      video_id: loaded.video_id,
      title: loaded.title,
      track: loaded.track,
      chapters,
      sync: TranscriptSync::new(segments),
      gate: AutoScrollGate::new(cooldown),
      auto_follow,
      filter: String::new(),
      rows,
      cursor: None,
      offset: 0,
      viewport: 0,
    }
  }

  /// Swap in freshly loaded content for the same video.
  pub fn replace_transcript(&mut self, loaded: LoadedTranscript) {
    self.title = loaded.title;
    self.track = loaded.track;
    self.chapters = model::normalize_chapters(loaded.chapters);
    self.sync.replace(ingest_segments(loaded.segments));
    self.rows = model::rows(self.sync.segments(), &self.chapters, &self.filter);
    self.cursor = (!self.rows.is_empty()).then_some(0);
    self.offset = 0;
  }

  pub fn segments(&self) -> &[Segment] {
    self.sync.segments()
  }

  pub fn chapters(&self) -> &[Chapter] {
    &self.chapters
  }

  pub fn rows(&self) -> &[Row] {
    &self.rows
  }

  pub fn cursor(&self) -> Option<usize> {
    self.cursor
  }

  pub fn offset(&self) -> usize {
    self.offset
  }

  pub fn filter(&self) -> &str {
    &self.filter
  }

  pub fn auto_follow(&self) -> bool {
    self.auto_follow
  }

  pub fn active_segment(&self) -> Option<usize> {
    self.sync.current()
  }

  /// Row showing the active segment, if it is visible under the current filter.
  pub fn active_row(&self) -> Option<usize> {
    let active = self.sync.current()?;
    self.rows.iter().position(|r| *r == Row::Segment(active))
  }

  pub fn current_chapter(&self, t: f64) -> Option<&Chapter> {
    locate(&self.chapters, t).map(|i| &self.chapters[i])
  }

  /// Feed a playback time. Returns `true` when the active segment changed.
  ///
  /// On a change, the cursor follows the new active row unless following is off or the
  /// user scrolled within the cooldown window.
  pub fn tick(&mut self, t: f64, now: Instant) -> bool {
    if !self.sync.on_time_update(t) {
      return false;
    }
    if self.auto_follow
      && self.gate.allows(now)
      && let Some(row) = self.active_row()
    {
      self.cursor = Some(row);
      self.reveal(row);
    }
    true
  }

  pub fn set_auto_follow(&mut self, on: bool) {
    self.auto_follow = on;
    if on {
      self.follow_now();
    }
  }

  /// Drop any scroll cooldown and bring the active row into view.
  pub fn follow_now(&mut self) {
    self.gate.clear();
    if let Some(row) = self.active_row() {
      self.cursor = Some(row);
      self.reveal(row);
    }
  }

  /// Move the cursor by `delta` rows. Counts as a manual scroll.
  pub fn move_cursor(&mut self, delta: isize, now: Instant) {
    if self.rows.is_empty() {
      return;
    }
    self.gate.user_scrolled(now);
    let last = self.rows.len() - 1;
    let from = self.cursor.or(self.active_row()).unwrap_or(self.offset.min(last));
    let to = from.saturating_add_signed(delta).min(last);
    self.cursor = Some(to);
    self.reveal(to);
  }

  pub fn page(&mut self, pages: isize, now: Instant) {
    let step = self.viewport.max(1).saturating_sub(1).max(1) as isize;
    self.move_cursor(pages * step, now);
  }

  pub fn cursor_to_first(&mut self, now: Instant) {
    self.move_cursor(isize::MIN, now);
  }

  pub fn cursor_to_last(&mut self, now: Instant) {
    self.move_cursor(isize::MAX, now);
  }

  /// Playback time of the row under the cursor.
  pub fn seek_target(&self) -> Option<f64> {
    match self.rows.get(self.cursor?)? {
      Row::Chapter(i) => self.chapters.get(*i).map(|c| c.start),
      Row::Segment(i) => self.segments().get(*i).map(|s| s.start),
    }
  }

  /// Change the search filter. The cursor lands on the active row if it is still listed.
  pub fn set_filter(&mut self, filter: &str) {
    self.filter = filter.to_string();
    self.rows = model::rows(self.sync.segments(), &self.chapters, &self.filter);
    self.offset = 0;
    self.cursor = self.active_row().or((!self.rows.is_empty()).then_some(0));
    if let Some(row) = self.cursor {
      self.reveal(row);
    }
  }

  pub fn set_viewport(&mut self, height: usize) {
    self.viewport = height;
  }

  pub fn set_offset(&mut self, offset: usize) {
    self.offset = offset;
  }

  /// Scroll so `row` is visible, centering it. Rows already on screen stay put.
  fn reveal(&mut self, row: usize) {
    if self.viewport == 0 {
      return;
    }
    if row >= self.offset && row < self.offset + self.viewport {
      return;
    }
    let max_offset = self.rows.len().saturating_sub(self.viewport);
    self.offset = row.saturating_sub(self.viewport / 2).min(max_offset);
  }

  pub fn export_text(&self) -> String {
    model::export_text(self.segments(), &self.chapters)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const COOLDOWN: Duration = Duration::from_secs(2);

  fn seg(start: f64, end: f64, text: &str) -> Segment {
    Segment { start, end, text: text.to_string() }
  }

  fn session(segments: Vec<Segment>, chapters: Vec<Chapter>) -> TranscriptSession {
    let loaded = LoadedTranscript { segments, chapters, ..Default::default() };
    TranscriptSession::new(loaded, COOLDOWN, true)
  }

  fn numbered(n: usize) -> Vec<Segment> {
    (0..n).map(|i| seg(i as f64 * 2.0, i as f64 * 2.0 + 2.0, &format!("line {i}"))).collect()
  }

  #[test]
  fn ingest_sorts_and_folds_duplicates() {
    let segments = ingest_segments(vec![
      seg(5.0, 6.0, "b"),
      seg(0.0, 1.0, "a"),
      seg(5.0, 7.0, "b2"),
      seg(f64::NAN, 1.0, "bad"),
    ]);
    assert_eq!(segments, vec![seg(0.0, 1.0, "a"), seg(5.0, 7.0, "b b2")]);
  }

  #[test]
  fn tick_follows_scenario() {
    let mut s = session(vec![seg(0.0, 5.0, "a"), seg(5.0, 12.0, "b"), seg(12.0, 20.0, "c")], Vec::new());
    let now = Instant::now();
    let flags: Vec<bool> = [0.0, 2.0, 2.0, 6.0].iter().map(|&t| s.tick(t, now)).collect();
    assert_eq!(flags, vec![true, false, false, true]);
    assert_eq!(s.active_segment(), Some(1));
    assert_eq!(s.cursor(), Some(1));
  }

  #[test]
  fn active_row_accounts_for_chapter_headers() {
    let chapters = vec![Chapter { start: 0.0, title: "one".into() }, Chapter { start: 4.0, title: "two".into() }];
    let mut s = session(numbered(4), chapters);
    s.tick(4.5, Instant::now());
    // rows: ch0, seg0, seg1, ch1, seg2, seg3
    assert_eq!(s.active_row(), Some(4));
    assert_eq!(s.current_chapter(4.5).map(|c| c.title.as_str()), Some("two"));
    assert_eq!(s.current_chapter(1.0).map(|c| c.title.as_str()), Some("one"));
  }

  #[test]
  fn manual_scroll_pauses_follow_for_cooldown() {
    let mut s = session(numbered(100), Vec::new());
    s.set_viewport(10);
    let start = Instant::now();
    s.tick(0.0, start);
    s.move_cursor(50, start);
    assert_eq!(s.cursor(), Some(50));

    assert!(s.tick(2.0, start + Duration::from_millis(500)));
    assert_eq!(s.cursor(), Some(50), "cursor stays where the user put it");

    assert!(s.tick(4.0, start + Duration::from_millis(2500)));
    assert_eq!(s.cursor(), Some(2));
    assert_eq!(s.offset(), 0);
  }

  #[test]
  fn follow_off_leaves_cursor() {
    let mut s = session(numbered(10), Vec::new());
    s.set_auto_follow(false);
    s.tick(8.0, Instant::now());
    assert_eq!(s.cursor(), None);
    s.set_auto_follow(true);
    assert_eq!(s.cursor(), Some(4));
  }

  #[test]
  fn reveal_centers_offscreen_rows_only() {
    let mut s = session(numbered(100), Vec::new());
    s.set_viewport(10);
    let now = Instant::now();
    s.tick(8.0, now);
    assert_eq!(s.offset(), 0, "row 4 already visible");
    s.tick(100.0, now);
    assert_eq!(s.offset(), 45);
    s.tick(1000.0, now);
    assert_eq!(s.offset(), 90, "clamped to the last full page");
  }

  #[test]
  fn cursor_movement_is_clamped() {
    let mut s = session(numbered(5), Vec::new());
    let now = Instant::now();
    s.cursor_to_last(now);
    assert_eq!(s.cursor(), Some(4));
    s.move_cursor(3, now);
    assert_eq!(s.cursor(), Some(4));
    s.cursor_to_first(now);
    assert_eq!(s.cursor(), Some(0));
    s.move_cursor(-1, now);
    assert_eq!(s.cursor(), Some(0));
  }

  #[test]
  fn seek_target_for_chapter_and_segment_rows() {
    let chapters = vec![Chapter { start: 1.0, title: "c".into() }];
    let mut s = session(numbered(3), chapters);
    // rows: seg0, ch0, seg1, seg2
    let now = Instant::now();
    s.cursor_to_first(now);
    assert_eq!(s.seek_target(), Some(0.0));
    s.move_cursor(1, now);
    assert_eq!(s.seek_target(), Some(1.0));
    s.move_cursor(1, now);
    assert_eq!(s.seek_target(), Some(2.0));
  }

  #[test]
  fn filter_keeps_active_row_when_listed() {
    let mut s = session(vec![seg(0.0, 1.0, "apple"), seg(1.0, 2.0, "banana"), seg(2.0, 3.0, "apricot")], Vec::new());
    s.tick(2.5, Instant::now());
    s.set_filter("ap");
    assert_eq!(s.rows(), &[Row::Segment(0), Row::Segment(2)]);
    assert_eq!(s.cursor(), Some(1));
    s.set_filter("nothing");
    assert!(s.rows().is_empty());
    assert_eq!(s.cursor(), None);
    assert_eq!(s.seek_target(), None);
    s.set_filter("");
    assert_eq!(s.rows().len(), 3);
  }

  #[test]
  fn export_includes_chapters() {
    let s = session(vec![seg(0.0, 1.0, "hi")], vec![Chapter { start: 0.0, title: "Start".into() }]);
    assert_eq!(s.export_text(), "00:00 Start\n\n00:00 hi");
  }

  #[test]
  fn replace_transcript_keeps_filter() {
    let mut s = session(numbered(6), Vec::new());
    s.set_filter("line 1");
    s.tick(3.0, Instant::now());
    assert_eq!(s.active_segment(), Some(1));

    let loaded = LoadedTranscript {
      title: Some("again".into()),
      segments: vec![seg(4.0, 6.0, "line 1 revised"), seg(0.0, 4.0, "intro")],
      chapters: vec![Chapter { start: 0.0, title: "top".into() }],
      ..Default::default()
    };
    s.replace_transcript(loaded);
    assert_eq!(s.title.as_deref(), Some("again"));
    assert_eq!(s.active_segment(), None);
    assert_eq!(s.segments()[0].text, "intro");
    assert_eq!(s.rows(), &[Row::Segment(1)]);
    assert_eq!(s.cursor(), Some(0));
    assert!(s.tick(5.0, Instant::now()));
  }
}
