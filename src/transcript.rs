use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::constants::constants;
use crate::model::{self, Chapter, Segment};
use crate::youtube;

/// Where a transcript comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptSource {
  /// A local file: timedtext XML, JSON, or the plain-text export format.
  File(PathBuf),
  /// A YouTube video, by id.
  YouTube { video_id: String },
}

impl TranscriptSource {
  pub fn video_id(&self) -> Option<&str> {
    match self {
      TranscriptSource::YouTube { video_id } => Some(video_id),
      TranscriptSource::File(_) => None,
    }
  }

  pub fn describe(&self) -> String {
    match self {
      TranscriptSource::File(path) => path.display().to_string(),
      TranscriptSource::YouTube { video_id } => youtube::watch_url(video_id),
    }
  }
}

/// Everything one video's transcript view starts from.
#[derive(Debug, Clone, Default)]
pub struct LoadedTranscript {
  pub video_id: Option<String>,
  pub title: Option<String>,
  /// Label of the caption track used, when fetched from YouTube.
  pub track: Option<String>,
  pub segments: Vec<Segment>,
  pub chapters: Vec<Chapter>,
}

/// Progress reported by the loading pipeline.
pub enum TranscriptEvent {
  /// The watch page was scraped; the caption track is being fetched.
  PageFetched { title: Option<String> },
  /// Transcript ready.
  Loaded(Box<LoadedTranscript>),
  /// Pipeline failed with an error message.
  Failed(String),
}

/// Loading state machine.
#[derive(Default)]
pub enum TranscriptState {
  /// Nothing loaded and nothing in flight.
  #[default]
  Idle,
  /// Pipeline task running.
  Loading { handle: JoinHandle<()> },
  /// A transcript is loaded into the session.
  Ready,
}

/// Read a transcript file, picking the parser from its content.
pub async fn load_file(path: &Path) -> Result<LoadedTranscript> {
  let text = tokio::fs::read_to_string(path).await.with_context(|| format!("Failed to read {}", path.display()))?;
  parse_file(path, &text)
}

fn parse_file(path: &Path, text: &str) -> Result<LoadedTranscript> {
  let default_secs = constants().default_segment_secs;
  let trimmed = text.trim_start();

  let (segments, chapters) = if trimmed.starts_with('{') || trimmed.starts_with('[') {
    let file = model::parse_json(text).with_context(|| format!("Failed to parse {}", path.display()))?;
    (file.segments, model::normalize_chapters(file.chapters))
  } else if trimmed.contains("<text") {
    (youtube::parse_timedtext(text, default_secs), Vec::new())
  } else {
    let file = model::parse_plain(text, default_secs);
    (file.segments, file.chapters)
  };

  if segments.is_empty() {
    return Err(anyhow!("No transcript lines found in {}", path.display()));
  }
  info!(path = %path.display(), segments = segments.len(), chapters = chapters.len(), "transcript: file loaded");
  let title = path.file_stem().map(|s| s.to_string_lossy().into_owned());
  Ok(LoadedTranscript { video_id: None, title, track: None, segments, chapters })
}

/// Scrape the watch page, pick a caption track, and fetch it.
async fn load_youtube(
  video_id: &str,
  languages: &[String],
  progress: Option<&mpsc::UnboundedSender<TranscriptEvent>>,
) -> Result<LoadedTranscript> {
  let client = youtube::http_client()?;
  let html = youtube::fetch_watch_page(&client, video_id).await?;
  let player_response = youtube::extract_player_response(&html)?;

  let title = youtube::video_title(&player_response);
  let chapters = youtube::chapters_from_player_response(&player_response);
  info!(video_id, chapters = chapters.len(), "transcript: watch page scraped");
  if let Some(tx) = progress {
    let _ = tx.send(TranscriptEvent::PageFetched { title: title.clone() });
  }

  let tracks = youtube::caption_tracks(&player_response);
  info!(video_id, tracks = tracks.len(), "transcript: caption tracks found");
  let track = youtube::select_track(&tracks, languages).ok_or_else(|| anyhow!("No transcript available for this video"))?;
  info!(lang = %track.language_code, label = %track.label(), auto = track.is_auto(), "transcript: selected caption track");

  let xml = youtube::fetch_timedtext(&client, track).await?;
  let segments = youtube::parse_timedtext(&xml, constants().default_segment_secs);
  if segments.is_empty() {
    return Err(anyhow!("Caption track '{}' has no lines", track.label()));
  }
  info!(segments = segments.len(), "transcript: captions parsed");

  Ok(LoadedTranscript {
    video_id: Some(video_id.to_string()),
    title,
    track: Some(track.describe()),
    segments,
    chapters,
  })
}

/// Load a transcript without progress reporting.
pub async fn load(source: &TranscriptSource, languages: &[String]) -> Result<LoadedTranscript> {
  match source {
    TranscriptSource::File(path) => load_file(path).await,
    TranscriptSource::YouTube { video_id } => load_youtube(video_id, languages, None).await,
  }
}

/// Run the loading pipeline as an async task, reporting through `tx`.
pub fn spawn_load_pipeline(
  tx: mpsc::UnboundedSender<TranscriptEvent>,
  source: TranscriptSource,
  languages: Vec<String>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let result = match &source {
      TranscriptSource::File(path) => load_file(path).await,
      TranscriptSource::YouTube { video_id } => load_youtube(video_id, &languages, Some(&tx)).await,
    };
    match result {
      Ok(loaded) => {
        let _ = tx.send(TranscriptEvent::Loaded(Box::new(loaded)));
      }
      Err(e) => {
        error!(source = %source.describe(), err = %e, "transcript: load failed");
        let _ = tx.send(TranscriptEvent::Failed(format!("{:#}", e)));
      }
    }
  })
}
