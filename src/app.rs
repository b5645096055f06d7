use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::constants;
use crate::model::format_time;
use crate::pacing::Throttle;
use crate::player::{Clock, MpvPlayer, PlaybackClock, SimulatedClock};
use crate::session::TranscriptSession;
use crate::theme::{THEMES, Theme, theme_index};
use crate::transcript::{self, TranscriptEvent, TranscriptSource, TranscriptState};
use crate::youtube;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Browse,
  Search,
}

pub struct App {
  pub source: Option<TranscriptSource>,
  pub session: Option<TranscriptSession>,
  pub clock: Clock,
  /// mpv process owned by this app, if it started one.
  pub player: Option<MpvPlayer>,
  pub mode: AppMode,
  /// Search text, applied to the session as it is typed.
  pub search: String,
  /// Cursor position within the search input (char index).
  pub search_cursor: usize,
  pub theme_index: usize,
  pub languages: Vec<String>,
  pub auto_follow: bool,
  /// Last position read from the clock.
  pub position: Option<f64>,
  pub paused: bool,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message, shown below status and error in priority.
  pub info_message: Option<String>,
  /// Title reported by the pipeline before the transcript arrives.
  pub pending_title: Option<String>,
  pub should_quit: bool,
  pub transcript_state: TranscriptState,
  pub(crate) transcript_rx: Option<mpsc::UnboundedReceiver<TranscriptEvent>>,
  clock_throttle: Throttle,
  /// Where prefs are written on change. `None` disables saving.
  prefs_path: Option<PathBuf>,
  /// Languages as stored in prefs; `--lang` overrides are not persisted.
  prefs_languages: Option<Vec<String>>,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(source: Option<TranscriptSource>, clock: Clock, config: Config, prefs_path: Option<PathBuf>) -> Self {
    let languages = config.preferred_languages.clone().unwrap_or_else(|| constants().preferred_languages.clone());
    Self {
      source,
      session: None,
      clock,
      player: None,
      mode: AppMode::Browse,
      search: String::new(),
      search_cursor: 0,
      theme_index: theme_index(config.theme_name.as_deref()),
      languages,
      auto_follow: config.auto_follow.unwrap_or(true),
      position: None,
      paused: false,
      last_error: None,
      status_message: None,
      info_message: None,
      pending_title: None,
      should_quit: false,
      transcript_state: TranscriptState::default(),
      transcript_rx: None,
      clock_throttle: Throttle::new(constants().clock_poll()),
      prefs_path,
      prefs_languages: config.preferred_languages,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.clear_error();
    }
  }

  fn save_config(&self) {
    let Some(ref path) = self.prefs_path else { return };
    let config = Config {
      theme_name: Some(self.theme().name.to_string()),
      preferred_languages: self.prefs_languages.clone(),
      auto_follow: Some(self.auto_follow),
    };
    config.save_to(path);
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  /// Title to show in the header: the session's, the pipeline's early one, or the source.
  pub fn title(&self) -> String {
    self
      .session
      .as_ref()
      .and_then(|s| s.title.clone())
      .or_else(|| self.pending_title.clone())
      .or_else(|| self.source.as_ref().map(|s| s.describe()))
      .unwrap_or_else(|| "ytscript".to_string())
  }

  // --- Loading ---

  /// Start (or restart) loading the transcript for the current source.
  pub fn trigger_load(&mut self) {
    let Some(source) = self.source.clone() else {
      self.set_error("No video or file to load.".to_string());
      return;
    };
    self.cancel_load();
    self.clear_error();
    self.info_message = None;
    self.status_message = Some("Loading transcript…".to_string());

    let (tx, rx) = mpsc::unbounded_channel();
    self.transcript_rx = Some(rx);
    info!(source = %source.describe(), "transcript: load triggered");
    let handle = transcript::spawn_load_pipeline(tx, source, self.languages.clone());
    self.transcript_state = TranscriptState::Loading { handle };
  }

  pub fn cancel_load(&mut self) {
    if let TranscriptState::Loading { handle } = std::mem::take(&mut self.transcript_state) {
      info!("transcript: cancelling load");
      handle.abort();
    }
    self.transcript_rx = None;
  }

  /// Fetch the transcript again. The current one stays on screen until the new one arrives.
  pub fn reload(&mut self) {
    self.pending_title = None;
    self.trigger_load();
  }

  /// Apply pipeline events and notice a player that went away.
  pub fn check_pending(&mut self) {
    if let Some(ref mut rx) = self.transcript_rx {
      let mut finished = false;
      let mut events = Vec::new();
      while let Ok(event) = rx.try_recv() {
        events.push(event);
      }
      for event in events {
        match event {
          TranscriptEvent::PageFetched { title } => {
            if let Some(ref t) = title {
              self.status_message = Some(format!("Fetching captions for '{}'…", t));
            }
            self.pending_title = title;
          }
          TranscriptEvent::Loaded(loaded) => {
            let mut session = match self.session.take() {
              Some(mut current) if current.video_id == loaded.video_id => {
                current.replace_transcript(*loaded);
                current
              }
              _ => {
                let mut fresh = TranscriptSession::new(*loaded, constants().autoscroll_cooldown(), self.auto_follow);
                if !self.search.is_empty() {
                  fresh.set_filter(&self.search);
                }
                fresh
              }
            };
            if let Some(t) = self.position {
              session.tick(t, Instant::now());
            }
            info!(segments = session.segments().len(), chapters = session.chapters().len(), "transcript: session ready");
            self.info_message = Some(match session.track {
              Some(ref track) => format!("{} lines ({})", session.segments().len(), track),
              None => format!("{} lines", session.segments().len()),
            });
            self.session = Some(session);
            self.status_message = None;
            self.transcript_state = TranscriptState::Ready;
            self.clock_throttle.reset();
            finished = true;
          }
          TranscriptEvent::Failed(msg) => {
            self.status_message = None;
            self.set_error(msg);
            self.transcript_state = TranscriptState::Idle;
            finished = true;
          }
        }
      }
      if finished {
        self.transcript_rx = None;
      }
    }

    if let Some(ref mut player) = self.player
      && !player.is_running()
    {
      self.player = None;
      let mut fallback = SimulatedClock::starting_at(self.position.unwrap_or(0.0));
      fallback.toggle_pause_at(Instant::now());
      self.clock = Clock::Simulated(fallback);
      self.paused = true;
      self.info_message = Some("Player exited; clock paused.".to_string());
    }
  }

  // --- Playback ---

  /// Sample the clock (at most once per poll interval) and move the highlight.
  pub async fn tick_clock(&mut self) {
    let now = Instant::now();
    if !self.clock_throttle.ready(now) {
      return;
    }
    match self.clock.position().await {
      Ok(Some(t)) => {
        self.position = Some(t);
        if let Some(ref mut session) = self.session
          && session.tick(t, now)
        {
          debug!(t, active = ?session.active_segment(), "sync: active segment changed");
        }
      }
      Ok(None) => {}
      Err(e) => debug!(err = %e, clock = self.clock.label(), "sync: position unavailable"),
    }
    match self.clock.is_paused().await {
      Ok(paused) => self.paused = paused,
      Err(e) => debug!(err = %e, "sync: pause state unavailable"),
    }
  }

  /// Seek playback to the row under the cursor and follow from there.
  pub async fn seek_to_cursor(&mut self) {
    let Some(target) = self.session.as_ref().and_then(|s| s.seek_target()) else { return };
    if let Err(e) = self.clock.seek(target).await {
      self.set_error(format!("Seek failed: {:#}", e));
      return;
    }
    info!(target, "player: seek");
    self.position = Some(target);
    if let Some(ref mut session) = self.session {
      session.tick(target, Instant::now());
      session.follow_now();
    }
    self.clock_throttle.reset();
  }

  pub async fn toggle_pause(&mut self) {
    match self.clock.toggle_pause().await {
      Ok(()) => {
        self.paused = !self.paused;
        self.clock_throttle.reset();
      }
      Err(e) => self.set_error(format!("Pause error: {:#}", e)),
    }
  }

  pub fn toggle_follow(&mut self) {
    self.auto_follow = !self.auto_follow;
    if let Some(ref mut session) = self.session {
      session.set_auto_follow(self.auto_follow);
    }
    self.info_message = Some(if self.auto_follow { "Following playback" } else { "Follow off" }.to_string());
    self.save_config();
  }

  // --- Search ---

  /// Push the search text into the session.
  pub fn apply_search(&mut self) {
    if let Some(ref mut session) = self.session {
      session.set_filter(&self.search);
    }
  }

  pub fn clear_search(&mut self) {
    self.search.clear();
    self.search_cursor = 0;
    self.apply_search();
  }

  // --- Clipboard ---

  pub fn copy_transcript(&mut self) {
    let Some(text) = self.session.as_ref().map(|s| s.export_text()) else {
      self.set_error("Nothing to copy yet.".to_string());
      return;
    };
    match copy_to_clipboard(&text) {
      Ok(()) => self.info_message = Some("Transcript copied".to_string()),
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  pub fn copy_url(&mut self) {
    let Some(url) = self.video_url() else {
      self.set_error("No video URL for a local file.".to_string());
      return;
    };
    match copy_to_clipboard(&url) {
      Ok(()) => self.info_message = Some(format!("Copied {}", url)),
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  /// Watch URL at the current position, when the source is a video.
  pub fn video_url(&self) -> Option<String> {
    let id = self.source.as_ref().and_then(|s| s.video_id())?;
    let base = youtube::watch_url(id);
    Some(match self.position {
      Some(t) if t >= 1.0 => format!("{}&t={}s", base, t as u64),
      _ => base,
    })
  }

  /// One-line playback summary for the status bar.
  pub fn position_label(&self) -> String {
    let time = self.position.map_or_else(|| "--:--".to_string(), format_time);
    let state = if self.paused { "paused" } else { "playing" };
    format!("{} {} [{}]", time, state, self.clock.label())
  }

  pub async fn shutdown(&mut self) -> Result<()> {
    self.cancel_load();
    if let Some(mut player) = self.player.take() {
      player.stop().await?;
    }
    Ok(())
  }
}

fn copy_to_clipboard(text: &str) -> Result<()> {
  let mut clipboard = arboard::Clipboard::new().map_err(|e| anyhow!("Clipboard unavailable: {}", e))?;
  clipboard.set_text(text.to_string()).context("Failed to copy to clipboard")?;
  debug!(bytes = text.len(), "clipboard: copied");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn simulated_app(source: Option<TranscriptSource>) -> App {
    App::new(source, Clock::Simulated(SimulatedClock::starting_at(0.0)), Config::default(), None)
  }

  async fn wait_for_load(app: &mut App) {
    for _ in 0..200 {
      app.check_pending();
      if !matches!(app.transcript_state, TranscriptState::Loading { .. }) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("load did not finish");
  }

  fn transcript_file(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("talk.txt");
    std::fs::write(&path, "# exported 2026-01-02\n\n00:00 Intro\n\n00:00 hello\n00:05 world\n00:12 again\n").unwrap();
    path
  }

  #[test]
  fn config_drives_initial_state() {
    let config = Config {
      theme_name: Some("terminal".to_string()),
      preferred_languages: Some(vec!["en".to_string()]),
      auto_follow: Some(false),
    };
    let app = App::new(None, Clock::Simulated(SimulatedClock::starting_at(0.0)), config, None);
    assert_eq!(app.theme().name, "terminal");
    assert_eq!(app.languages, vec!["en".to_string()]);
    assert!(!app.auto_follow);
  }

  #[test]
  fn default_languages_come_from_constants() {
    let app = simulated_app(None);
    assert_eq!(app.languages, constants().preferred_languages);
  }

  #[test]
  fn errors_are_tracked_and_cleared() {
    let mut app = simulated_app(None);
    app.trigger_load();
    assert!(app.last_error.is_some());
    app.expire_error();
    assert!(app.last_error.is_some(), "fresh error survives");
    app.clear_error();
    assert!(app.last_error.is_none());
  }

  #[test]
  fn theme_cycles_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.toml");
    let mut app =
      App::new(None, Clock::Simulated(SimulatedClock::starting_at(0.0)), Config::default(), Some(prefs.clone()));
    for _ in 0..THEMES.len() {
      app.next_theme();
    }
    assert_eq!(app.theme_index, 0);
    assert_eq!(Config::load_from(&prefs).theme_name.as_deref(), Some(THEMES[0].name));
  }

  #[tokio::test]
  async fn loads_file_into_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = simulated_app(Some(TranscriptSource::File(transcript_file(&dir))));
    app.trigger_load();
    wait_for_load(&mut app).await;
    assert!(matches!(app.transcript_state, TranscriptState::Ready));
    let session = app.session.as_ref().unwrap();
    assert_eq!(session.segments().len(), 3);
    assert_eq!(session.chapters().len(), 1);
    assert_eq!(app.title(), "talk");
  }

  #[tokio::test]
  async fn failed_load_sets_error() {
    let mut app = simulated_app(Some(TranscriptSource::File("/nonexistent/x.txt".into())));
    app.trigger_load();
    wait_for_load(&mut app).await;
    assert!(matches!(app.transcript_state, TranscriptState::Idle));
    assert!(app.session.is_none());
    assert!(app.last_error.is_some());
  }

  #[tokio::test]
  async fn seek_moves_clock_and_highlight() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = simulated_app(Some(TranscriptSource::File(transcript_file(&dir))));
    app.trigger_load();
    wait_for_load(&mut app).await;

    app.toggle_pause().await;
    assert!(app.paused);
    // rows: chapter, hello, world, again
    app.session.as_mut().unwrap().cursor_to_last(Instant::now());
    app.seek_to_cursor().await;
    assert_eq!(app.position, Some(12.0));
    assert_eq!(app.session.as_ref().unwrap().active_segment(), Some(2));

    app.tick_clock().await;
    assert_eq!(app.position, Some(12.0), "paused clock holds its position");
    assert!(app.paused);
  }

  #[tokio::test]
  async fn search_filters_session_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = simulated_app(Some(TranscriptSource::File(transcript_file(&dir))));
    app.trigger_load();
    wait_for_load(&mut app).await;
    app.search = "WOR".to_string();
    app.apply_search();
    assert_eq!(app.session.as_ref().unwrap().rows().len(), 1);
    app.clear_search();
    assert_eq!(app.session.as_ref().unwrap().rows().len(), 4);
  }

  #[tokio::test]
  async fn reload_keeps_filter_and_content_on_screen() {
    let dir = tempfile::tempdir().unwrap();
    let path = transcript_file(&dir);
    let mut app = simulated_app(Some(TranscriptSource::File(path.clone())));
    app.trigger_load();
    wait_for_load(&mut app).await;
    app.search = "again".to_string();
    app.apply_search();

    std::fs::write(&path, "00:00 hello\n00:05 again and again\n00:09 more\n").unwrap();
    app.reload();
    assert!(app.session.is_some(), "old transcript stays up while loading");
    wait_for_load(&mut app).await;
    let session = app.session.as_ref().unwrap();
    assert_eq!(session.segments().len(), 3);
    assert!(session.chapters().is_empty());
    assert_eq!(session.filter(), "again");
    assert_eq!(session.rows().len(), 1);
  }

  #[test]
  fn follow_toggle() {
    let mut app = simulated_app(None);
    assert!(app.auto_follow);
    app.toggle_follow();
    assert!(!app.auto_follow);
  }

  #[test]
  fn url_carries_position() {
    let mut app = simulated_app(Some(TranscriptSource::YouTube { video_id: "dQw4w9WgXcQ".to_string() }));
    assert_eq!(app.video_url().as_deref(), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
    app.position = Some(83.6);
    assert_eq!(app.video_url().as_deref(), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=83s"));
    let file_app = simulated_app(Some(TranscriptSource::File("a.txt".into())));
    assert_eq!(file_app.video_url(), None);
  }

  #[test]
  fn position_label_formats() {
    let mut app = simulated_app(None);
    assert_eq!(app.position_label(), "--:-- playing [simulated]");
    app.position = Some(75.0);
    app.paused = true;
    assert_eq!(app.position_label(), "01:15 paused [simulated]");
  }
}
