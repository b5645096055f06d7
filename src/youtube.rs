use anyhow::{Context, Result, anyhow};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::constants;
use crate::model::{Chapter, Segment, normalize_chapters};

static VIDEO_ID_IN_URL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/|/live/)([A-Za-z0-9_-]{11})").unwrap_or_else(|_| unreachable!())
});

static BARE_VIDEO_ID: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap_or_else(|_| unreachable!()));

static PLAYER_RESPONSE_START: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").unwrap_or_else(|_| unreachable!()));

/// Pull the 11-character video id out of a YouTube URL, or accept a bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
  let trimmed = input.trim();
  if BARE_VIDEO_ID.is_match(trimmed) {
    return Some(trimmed.to_string());
  }
  if !trimmed.contains("youtube.com") && !trimmed.contains("youtu.be") {
    return None;
  }
  VIDEO_ID_IN_URL.captures(trimmed).map(|c| c[1].to_string())
}

pub fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={}", video_id)
}

/// A caption track listed in the player response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
  pub base_url: String,
  pub language_code: String,
  /// `"asr"` for auto-generated captions.
  #[serde(default)]
  pub kind: Option<String>,
  #[serde(default)]
  name: Option<Value>,
}

impl CaptionTrack {
  /// Human-readable track name, falling back to the language code.
  pub fn label(&self) -> String {
    self.name.as_ref().and_then(text_of).unwrap_or_else(|| self.language_code.clone())
  }

  pub fn is_auto(&self) -> bool {
    self.kind.as_deref() == Some("asr")
  }

  /// Label for the status line, marking auto-generated tracks.
  pub fn describe(&self) -> String {
    let label = self.label();
    if self.is_auto() && !label.to_lowercase().contains("auto") {
      format!("{} (auto)", label)
    } else {
      label
    }
  }
}

/// Read a YouTube text object: either `{"simpleText": ...}` or `{"runs": [{"text": ...}]}`.
fn text_of(v: &Value) -> Option<String> {
  if let Some(s) = v.get("simpleText").and_then(Value::as_str) {
    return Some(s.to_string());
  }
  let runs = v.get("runs")?.as_array()?;
  let joined: String = runs.iter().filter_map(|r| r.get("text").and_then(Value::as_str)).collect();
  (!joined.is_empty()).then_some(joined)
}

/// Locate `ytInitialPlayerResponse = {...}` in a watch page and read exactly one JSON value.
pub fn extract_player_response(html: &str) -> Result<Value> {
  let doc = Html::parse_document(html);
  let script_sel = Selector::parse("script").unwrap_or_else(|_| unreachable!());
  for script in doc.select(&script_sel) {
    let body: String = script.text().collect();
    if !body.contains("ytInitialPlayerResponse") {
      continue;
    }
    let Some(m) = PLAYER_RESPONSE_START.find(&body) else { continue };
    // The match ends just past the opening brace.
    let json = &body[m.end() - 1..];
    match serde_json::Deserializer::from_str(json).into_iter::<Value>().next() {
      Some(Ok(value)) => return Ok(value),
      Some(Err(e)) => debug!(err = %e, "youtube: player response candidate did not parse"),
      None => {}
    }
  }
  Err(anyhow!("ytInitialPlayerResponse not found in watch page"))
}

pub fn caption_tracks(player_response: &Value) -> Vec<CaptionTrack> {
  player_response
    .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
    .and_then(|v| serde_json::from_value(v.clone()).ok())
    .unwrap_or_default()
}

/// Pick the first track matching a preferred language (in preference order), else the
/// first track listed.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], preferred: &[String]) -> Option<&'a CaptionTrack> {
  preferred
    .iter()
    .find_map(|lang| tracks.iter().find(|t| t.language_code.eq_ignore_ascii_case(lang)))
    .or_else(|| tracks.first())
}

pub fn video_title(player_response: &Value) -> Option<String> {
  player_response.pointer("/videoDetails/title").and_then(Value::as_str).map(str::to_string)
}

/// Chapters from the player bar's `DESCRIPTION_CHAPTERS` markers.
pub fn chapters_from_player_response(player_response: &Value) -> Vec<Chapter> {
  let markers = player_response
    .pointer(
      "/playerOverlays/playerOverlayRenderer/decoratedPlayerBarRenderer/decoratedPlayerBarRenderer/playerBar/multiMarkersPlayerBarRenderer/markersMap",
    )
    .and_then(Value::as_array);
  let Some(markers) = markers else { return Vec::new() };

  let Some(entry) = markers.iter().find(|m| m.get("key").and_then(Value::as_str) == Some("DESCRIPTION_CHAPTERS"))
  else {
    return Vec::new();
  };

  let chapters = entry
    .pointer("/value/chapters")
    .and_then(Value::as_array)
    .map(|list| {
      list
        .iter()
        .filter_map(|c| c.get("chapterRenderer"))
        .filter_map(|r| {
          let millis = r.get("timeRangeStartMillis").and_then(Value::as_f64)?;
          let title = r.get("title").and_then(text_of).unwrap_or_default();
          Some(Chapter { start: millis / 1000.0, title })
        })
        .collect()
    })
    .unwrap_or_default();
  normalize_chapters(chapters)
}

/// Decode one more level of HTML entities; caption XML arrives double-escaped.
fn decode_entities(s: &str) -> String {
  if !s.contains('&') {
    return s.to_string();
  }
  Html::parse_fragment(s).root_element().text().collect()
}

/// Parse timedtext XML (`<text start=".." dur="..">..</text>`) into segments.
///
/// Cues whose text is empty after decoding are skipped. A missing `dur` counts as
/// `default_secs`.
pub fn parse_timedtext(xml: &str, default_secs: f64) -> Vec<Segment> {
  let doc = Html::parse_fragment(xml);
  let text_sel = Selector::parse("text").unwrap_or_else(|_| unreachable!());
  doc
    .select(&text_sel)
    .filter_map(|el| {
      let start: f64 = el.value().attr("start")?.trim().parse().ok()?;
      if !start.is_finite() {
        return None;
      }
      let dur = el.value().attr("dur").and_then(|d| d.trim().parse::<f64>().ok()).unwrap_or(default_secs);
      let raw: String = el.text().collect();
      let text = decode_entities(&raw).split_whitespace().collect::<Vec<_>>().join(" ");
      if text.is_empty() {
        return None;
      }
      Some(Segment { start, end: start + dur, text })
    })
    .collect()
}

pub fn http_client() -> Result<Client> {
  let c = constants();
  Client::builder()
    .user_agent(c.user_agent.as_str())
    .timeout(Duration::from_secs(c.http_timeout_secs))
    .build()
    .context("Failed to build HTTP client")
}

pub async fn fetch_watch_page(client: &Client, video_id: &str) -> Result<String> {
  let url = watch_url(video_id);
  info!(url = %url, "youtube: fetching watch page");
  let response = client
    .get(&url)
    .header(reqwest::header::ACCEPT_LANGUAGE, constants().accept_language.as_str())
    .header(reqwest::header::COOKIE, "CONSENT=YES+1")
    .send()
    .await
    .context("Failed to request watch page")?
    .error_for_status()
    .context("Watch page request failed")?;
  response.text().await.context("Failed to read watch page")
}

pub async fn fetch_timedtext(client: &Client, track: &CaptionTrack) -> Result<String> {
  info!(lang = %track.language_code, "youtube: fetching caption track");
  let body = client
    .get(&track.base_url)
    .send()
    .await
    .context("Failed to request caption track")?
    .error_for_status()
    .context("Caption track request failed")?
    .text()
    .await
    .context("Failed to read caption track")?;
  if body.trim().is_empty() {
    return Err(anyhow!("Caption track returned no data"));
  }
  Ok(body)
}
