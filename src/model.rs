//! Transcript data: caption segments, chapter markers, and the text/JSON forms they are
//! exported and imported in.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One caption line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
  pub start: f64,
  pub end: f64,
  pub text: String,
}

/// A named marker at a start time, used to group segments under a heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
  pub start: f64,
  pub title: String,
}

/// Anything positioned on the playback timeline by its start time.
pub trait Timed {
  fn start(&self) -> f64;
}

impl Timed for Segment {
  fn start(&self) -> f64 {
    self.start
  }
}

impl Timed for Chapter {
  fn start(&self) -> f64 {
    self.start
  }
}

/// Sort chapters by start, drop non-finite starts, and keep the first of any equal starts.
pub fn normalize_chapters(mut chapters: Vec<Chapter>) -> Vec<Chapter> {
  chapters.retain(|c| c.start.is_finite());
  // Stable sort keeps input order among equal starts, so dedup keeps the first.
  chapters.sort_by(|a, b| a.start.total_cmp(&b.start));
  chapters.dedup_by(|later, earlier| later.start == earlier.start);
  chapters
}

/// Parse `m:ss` or `h:mm:ss` into seconds.
pub fn parse_timestamp(s: &str) -> Option<f64> {
  let parts: Vec<u64> = s.trim().split(':').map(|p| p.parse().ok()).collect::<Option<_>>()?;
  let (h, m, s) = match parts.as_slice() {
    [m, s] => (0, *m, *s),
    [h, m, s] => (*h, *m, *s),
    _ => return None,
  };
  let secs = h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(s)?;
  Some(secs as f64)
}

/// Format seconds as `MM:SS`. Minutes keep counting past an hour.
pub fn format_time(seconds: f64) -> String {
  let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
  format!("{:02}:{:02}", total / 60, total % 60)
}

/// Case-insensitive substring match on segment text. An empty filter matches everything.
pub fn matches_filter(segment: &Segment, filter: &str) -> bool {
  let needle = filter.trim().to_lowercase();
  needle.is_empty() || segment.text.to_lowercase().contains(&needle)
}

/// One visible line of the transcript list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
  Chapter(usize),
  Segment(usize),
}

/// Interleave chapter headers with segments.
///
/// Each chapter header goes right before the first segment starting at or after it.
/// Chapters that start after the last segment are not shown. With a non-empty filter,
/// only matching segments are listed and headers are hidden.
pub fn rows(segments: &[Segment], chapters: &[Chapter], filter: &str) -> Vec<Row> {
  let filtering = !filter.trim().is_empty();
  let mut out = Vec::with_capacity(segments.len() + chapters.len());
  let mut ci = 0;
  for (i, seg) in segments.iter().enumerate() {
    if filtering {
      if matches_filter(seg, filter) {
        out.push(Row::Segment(i));
      }
      continue;
    }
    while ci < chapters.len() && seg.start >= chapters[ci].start {
      out.push(Row::Chapter(ci));
      ci += 1;
    }
    out.push(Row::Segment(i));
  }
  out
}

/// Render the transcript as plain text with chapter headings.
///
/// Headings are written as `MM:SS title` followed by a blank line; segments as `MM:SS text`.
pub fn export_text(segments: &[Segment], chapters: &[Chapter]) -> String {
  let lines: Vec<String> = rows(segments, chapters, "")
    .into_iter()
    .flat_map(|row| match row {
      Row::Chapter(i) => {
        let ch = &chapters[i];
        vec![format!("{} {}", format_time(ch.start), ch.title).trim().to_string(), String::new()]
      }
      Row::Segment(i) => vec![format!("{} {}", format_time(segments[i].start), segments[i].text)],
    })
    .collect();
  lines.join("\n")
}

/// On-disk JSON form of a transcript.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TranscriptFile {
  pub segments: Vec<Segment>,
  #[serde(default)]
  pub chapters: Vec<Chapter>,
}

pub fn export_json(segments: &[Segment], chapters: &[Chapter]) -> Result<String> {
  let file = TranscriptFile { segments: segments.to_vec(), chapters: chapters.to_vec() };
  serde_json::to_string_pretty(&file).context("Failed to serialize transcript")
}

/// Read a JSON transcript: either `{ "segments": [...], "chapters": [...] }` or a bare
/// segment array.
pub fn parse_json(text: &str) -> Result<TranscriptFile> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Either {
    File(TranscriptFile),
    Bare(Vec<Segment>),
  }
  let parsed: Either = serde_json::from_str(text).context("Invalid transcript JSON")?;
  Ok(match parsed {
    Either::File(f) => f,
    Either::Bare(segments) => TranscriptFile { segments, chapters: Vec::new() },
  })
}

/// Comment line in the header of an exported document. Chapter headings are only
/// recognized in text carrying it.
pub const EXPORT_HEADER: &str = "# exported";

fn split_stamp(line: &str) -> Option<(f64, String)> {
  let (stamp, rest) = line.split_once(' ').unwrap_or((line, ""));
  Some((parse_timestamp(stamp)?, rest.trim().to_string()))
}

/// Read `MM:SS text` lines, including the document written by [`export_text`].
///
/// Lines starting with `#` are comments. Under an [`EXPORT_HEADER`] comment, a timestamped
/// line followed by a blank line and then more captions is a chapter heading; elsewhere blank
/// lines are just paragraph gaps. A segment ends where the next one starts; the last one
/// lasts `default_secs`.
pub fn parse_plain(text: &str, default_secs: f64) -> TranscriptFile {
  let headings = text.lines().any(|l| l.trim_start().starts_with(EXPORT_HEADER));
  let mut lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.starts_with('#')).collect();
  while lines.last().is_some_and(|l| l.is_empty()) {
    lines.pop();
  }
  let stamped: Vec<Option<(f64, String)>> = lines.iter().map(|l| split_stamp(l)).collect();
  let mut file = TranscriptFile::default();

  for (i, entry) in stamped.iter().enumerate() {
    let Some((start, rest)) = entry else { continue };
    let heading = headings
      && lines.get(i + 1).is_some_and(|l| l.is_empty())
      && stamped[i + 1..].iter().flatten().any(|(_, text)| !text.is_empty());
    if heading {
      file.chapters.push(Chapter { start: *start, title: rest.clone() });
    } else if !rest.is_empty() {
      file.segments.push(Segment { start: *start, end: start + default_secs, text: rest.clone() });
    }
  }

  let starts: Vec<f64> = file.segments.iter().skip(1).map(|s| s.start).collect();
  for (seg, next) in file.segments.iter_mut().zip(starts) {
    seg.end = next.max(seg.start);
  }
  file.chapters = normalize_chapters(file.chapters);
  file
}
