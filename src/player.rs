use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::{
  io::BufReader as TokioBufReader,
  io::{AsyncBufReadExt, AsyncWriteExt},
  net::UnixStream,
  process::{Child as TokioChild, Command},
};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::wait::wait_until;

/// A source of the current playback position, owned by whatever plays the media.
pub trait PlaybackClock {
  /// Current position in seconds, or `None` when nothing is loaded yet.
  fn position(&mut self) -> impl Future<Output = Result<Option<f64>>> + Send;
  fn is_paused(&mut self) -> impl Future<Output = Result<bool>> + Send;
  fn seek(&mut self, seconds: f64) -> impl Future<Output = Result<()>> + Send;
  fn toggle_pause(&mut self) -> impl Future<Output = Result<()>> + Send;
}

// --- mpv JSON IPC ---

/// Client for mpv's `--input-ipc-server` socket. One connection per request.
#[derive(Debug, Clone)]
pub struct MpvIpc {
  socket_path: PathBuf,
  next_id: Arc<AtomicU64>,
}

impl MpvIpc {
  pub fn new(socket_path: impl Into<PathBuf>) -> Self {
    Self { socket_path: socket_path.into(), next_id: Arc::new(AtomicU64::new(1)) }
  }

  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }

  /// Send one command and return its `data` field.
  ///
  /// mpv may emit event lines before the reply; lines are read until the matching
  /// `request_id` shows up.
  pub async fn command(&self, command: Value) -> Result<Value> {
    let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let timeout = constants().ipc_response_timeout();

    let mut stream = tokio::time::timeout(timeout, UnixStream::connect(&self.socket_path))
      .await
      .context("Timeout connecting to mpv IPC socket")?
      .context("Failed to connect to mpv IPC socket")?;

    let mut line = serde_json::to_vec(&json!({ "command": command, "request_id": request_id }))
      .context("Failed to encode mpv IPC command")?;
    line.push(b'\n');
    stream.write_all(&line).await.context("Failed to write to mpv IPC socket")?;

    let mut lines = TokioBufReader::new(stream).lines();
    for _ in 0..constants().ipc_max_lines {
      let Some(line) = tokio::time::timeout(timeout, lines.next_line())
        .await
        .context("Timeout waiting for mpv IPC response")?
        .context("Failed to read from mpv IPC socket")?
      else {
        break;
      };
      if let Some(data) = parse_reply(&line, request_id)? {
        return Ok(data);
      }
    }
    Err(anyhow!("No reply from mpv for request {}", request_id))
  }

  pub async fn get_property(&self, name: &str) -> Result<Value> {
    self.command(json!(["get_property", name])).await
  }

  pub async fn set_property(&self, name: &str, value: Value) -> Result<()> {
    self.command(json!(["set_property", name, value])).await.map(|_| ())
  }

  /// Whether something is listening on the socket.
  pub async fn is_reachable(&self) -> bool {
    UnixStream::connect(&self.socket_path).await.is_ok()
  }
}

/// Match one IPC line against `request_id`.
///
/// Returns `Ok(None)` for unrelated lines (events, other replies), `Ok(Some(data))` for a
/// successful reply, and an error for a failed one. A property that is not available yet
/// (`"property unavailable"`) replies with `Value::Null`.
fn parse_reply(line: &str, request_id: u64) -> Result<Option<Value>> {
  let Ok(val) = serde_json::from_str::<Value>(line) else { return Ok(None) };
  if val.get("request_id").and_then(Value::as_u64) != Some(request_id) {
    return Ok(None);
  }
  match val.get("error").and_then(Value::as_str) {
    Some("success") => Ok(Some(val.get("data").cloned().unwrap_or(Value::Null))),
    Some("property unavailable") => Ok(Some(Value::Null)),
    Some(other) => Err(anyhow!("mpv error: {}", other)),
    None => Err(anyhow!("mpv reply without status")),
  }
}

/// Follows an mpv instance through its IPC socket.
#[derive(Debug, Clone)]
pub struct MpvClock {
  ipc: MpvIpc,
}

impl MpvClock {
  pub fn new(ipc: MpvIpc) -> Self {
    Self { ipc }
  }
}

impl PlaybackClock for MpvClock {
  fn position(&mut self) -> impl Future<Output = Result<Option<f64>>> + Send {
    let ipc = self.ipc.clone();
    async move { Ok(ipc.get_property("time-pos").await?.as_f64()) }
  }

  fn is_paused(&mut self) -> impl Future<Output = Result<bool>> + Send {
    let ipc = self.ipc.clone();
    async move { Ok(ipc.get_property("pause").await?.as_bool().unwrap_or(false)) }
  }

  fn seek(&mut self, seconds: f64) -> impl Future<Output = Result<()>> + Send {
    let ipc = self.ipc.clone();
    async move { ipc.set_property("time-pos", json!(seconds.max(0.0))).await }
  }

  fn toggle_pause(&mut self) -> impl Future<Output = Result<()>> + Send {
    let ipc = self.ipc.clone();
    async move { ipc.command(json!(["cycle", "pause"])).await.map(|_| ()) }
  }
}

/// An mpv process started and owned by this program.
pub struct MpvPlayer {
  process: Option<TokioChild>,
  ipc: MpvIpc,
}

impl MpvPlayer {
  /// Spawn mpv on `url` and wait until its IPC socket accepts connections.
  pub async fn spawn(url: &str, audio_only: bool) -> Result<Self> {
    let socket_path = std::env::temp_dir().join(format!("ytscript-mpv-{}.sock", std::process::id()));
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);
    let socket_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();

    let mut cmd = Command::new("mpv");
    cmd.arg(format!("--input-ipc-server={}", socket_str));
    cmd.arg("--really-quiet");
    if audio_only {
      cmd.arg("--no-video");
    }
    cmd.arg(url);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;
    info!(url, socket = %socket_str, "player: mpv spawned");

    let ipc = MpvIpc::new(socket_path);
    let c = constants();
    let probe_ipc = ipc.clone();
    let ready = wait_until(
      || {
        let ipc = probe_ipc.clone();
        async move { ipc.is_reachable().await.then_some(()) }
      },
      Duration::from_millis(c.ipc_connect_timeout_ms),
      Duration::from_millis(c.ipc_retry_interval_ms),
    )
    .await;

    let mut player = Self { process: Some(child), ipc };
    if ready.is_none() {
      player.stop().await?;
      return Err(anyhow!("mpv did not open its IPC socket in time"));
    }
    debug!("player: mpv IPC ready");
    Ok(player)
  }

  pub fn clock(&self) -> MpvClock {
    MpvClock::new(self.ipc.clone())
  }

  /// Whether the mpv process is still running.
  pub fn is_running(&mut self) -> bool {
    match self.process.as_mut().map(|p| p.try_wait()) {
      Some(Ok(None)) => true,
      Some(Ok(Some(status))) => {
        info!(code = ?status.code(), "player: mpv exited");
        self.process = None;
        false
      }
      Some(Err(e)) => {
        warn!(err = %e, "player: failed to poll mpv");
        false
      }
      None => false,
    }
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(mut child) = self.process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
      info!("player: mpv stopped");
    }
    let _ = std::fs::remove_file(self.ipc.socket_path());
    Ok(())
  }
}

// --- Simulated clock ---

/// Wall-clock playback for transcripts without a player attached.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
  base: f64,
  resumed_at: Option<Instant>,
}

impl SimulatedClock {
  /// A running clock starting at `start` seconds.
  pub fn starting_at(start: f64) -> Self {
    Self { base: start.max(0.0), resumed_at: Some(Instant::now()) }
  }

  pub fn position_at(&self, now: Instant) -> f64 {
    match self.resumed_at {
      Some(since) => self.base + now.saturating_duration_since(since).as_secs_f64(),
      None => self.base,
    }
  }

  pub fn paused(&self) -> bool {
    self.resumed_at.is_none()
  }

  pub fn seek_at(&mut self, seconds: f64, now: Instant) {
    self.base = seconds.max(0.0);
    if self.resumed_at.is_some() {
      self.resumed_at = Some(now);
    }
  }

  pub fn toggle_pause_at(&mut self, now: Instant) {
    match self.resumed_at {
      Some(_) => {
        self.base = self.position_at(now);
        self.resumed_at = None;
      }
      None => self.resumed_at = Some(now),
    }
  }
}

impl PlaybackClock for SimulatedClock {
  fn position(&mut self) -> impl Future<Output = Result<Option<f64>>> + Send {
    let pos = self.position_at(Instant::now());
    async move { Ok(Some(pos)) }
  }

  fn is_paused(&mut self) -> impl Future<Output = Result<bool>> + Send {
    let paused = self.paused();
    async move { Ok(paused) }
  }

  fn seek(&mut self, seconds: f64) -> impl Future<Output = Result<()>> + Send {
    self.seek_at(seconds, Instant::now());
    async { Ok(()) }
  }

  fn toggle_pause(&mut self) -> impl Future<Output = Result<()>> + Send {
    self.toggle_pause_at(Instant::now());
    async { Ok(()) }
  }
}

/// The clock the app follows.
pub enum Clock {
  Mpv(MpvClock),
  Simulated(SimulatedClock),
}

impl Clock {
  pub fn label(&self) -> &'static str {
    match self {
      Clock::Mpv(_) => "mpv",
      Clock::Simulated(_) => "simulated",
    }
  }
}

impl PlaybackClock for Clock {
  fn position(&mut self) -> impl Future<Output = Result<Option<f64>>> + Send {
    let mpv = match self {
      Clock::Mpv(c) => Some(c.clone()),
      Clock::Simulated(_) => None,
    };
    let simulated = match self {
      Clock::Simulated(c) => Some(c.position_at(Instant::now())),
      Clock::Mpv(_) => None,
    };
    async move {
      match (mpv, simulated) {
        (Some(mut c), _) => c.position().await,
        (None, pos) => Ok(pos),
      }
    }
  }

  fn is_paused(&mut self) -> impl Future<Output = Result<bool>> + Send {
    let mpv = match self {
      Clock::Mpv(c) => Some(c.clone()),
      Clock::Simulated(_) => None,
    };
    let simulated = matches!(self, Clock::Simulated(c) if c.paused());
    async move {
      match mpv {
        Some(mut c) => c.is_paused().await,
        None => Ok(simulated),
      }
    }
  }

  fn seek(&mut self, seconds: f64) -> impl Future<Output = Result<()>> + Send {
    let mpv = match self {
      Clock::Mpv(c) => Some(c.clone()),
      Clock::Simulated(c) => {
        c.seek_at(seconds, Instant::now());
        None
      }
    };
    async move {
      match mpv {
        Some(mut c) => c.seek(seconds).await,
        None => Ok(()),
      }
    }
  }

  fn toggle_pause(&mut self) -> impl Future<Output = Result<()>> + Send {
    let mpv = match self {
      Clock::Mpv(c) => Some(c.clone()),
      Clock::Simulated(c) => {
        c.toggle_pause_at(Instant::now());
        None
      }
    };
    async move {
      match mpv {
        Some(mut c) => c.toggle_pause().await,
        None => Ok(()),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::net::UnixListener;

  // --- parse_reply ---

  #[test]
  fn reply_success() {
    let line = r#"{"data":12.5,"request_id":3,"error":"success"}"#;
    assert_eq!(parse_reply(line, 3).unwrap(), Some(json!(12.5)));
  }

  #[test]
  fn reply_other_request_or_event_is_skipped() {
    assert_eq!(parse_reply(r#"{"event":"playback-restart"}"#, 3).unwrap(), None);
    assert_eq!(parse_reply(r#"{"data":1,"request_id":2,"error":"success"}"#, 3).unwrap(), None);
    assert_eq!(parse_reply("not json", 3).unwrap(), None);
  }

  #[test]
  fn reply_unavailable_is_null() {
    let line = r#"{"request_id":3,"error":"property unavailable"}"#;
    assert_eq!(parse_reply(line, 3).unwrap(), Some(Value::Null));
  }

  #[test]
  fn reply_error() {
    assert!(parse_reply(r#"{"request_id":3,"error":"invalid parameter"}"#, 3).is_err());
  }

  // --- MpvIpc against a fake mpv ---

  #[tokio::test]
  async fn ipc_reads_time_pos_past_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let server = tokio::spawn(async move {
      let (stream, _) = listener.accept().await.unwrap();
      let (read, mut write) = stream.into_split();
      let mut lines = TokioBufReader::new(read).lines();
      let request: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
      assert_eq!(request["command"], json!(["get_property", "time-pos"]));
      let id = request["request_id"].as_u64().unwrap();
      write.write_all(b"{\"event\":\"audio-reconfig\"}\n").await.unwrap();
      let reply = format!("{{\"data\":42.25,\"request_id\":{},\"error\":\"success\"}}\n", id);
      write.write_all(reply.as_bytes()).await.unwrap();
    });

    let mut clock = MpvClock::new(MpvIpc::new(&path));
    assert_eq!(clock.position().await.unwrap(), Some(42.25));
    server.await.unwrap();
  }

  #[tokio::test]
  async fn ipc_missing_socket_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let ipc = MpvIpc::new(dir.path().join("absent.sock"));
    assert!(!ipc.is_reachable().await);
    assert!(ipc.get_property("time-pos").await.is_err());
  }

  // --- SimulatedClock ---

  #[test]
  fn simulated_clock_advances() {
    let start = Instant::now();
    let clock = SimulatedClock { base: 10.0, resumed_at: Some(start) };
    assert_eq!(clock.position_at(start), 10.0);
    assert_eq!(clock.position_at(start + Duration::from_millis(2500)), 12.5);
  }

  #[test]
  fn simulated_clock_pause_and_resume() {
    let start = Instant::now();
    let mut clock = SimulatedClock { base: 0.0, resumed_at: Some(start) };
    clock.toggle_pause_at(start + Duration::from_secs(3));
    assert!(clock.paused());
    assert_eq!(clock.position_at(start + Duration::from_secs(10)), 3.0);
    clock.toggle_pause_at(start + Duration::from_secs(10));
    assert_eq!(clock.position_at(start + Duration::from_secs(11)), 4.0);
  }

  #[test]
  fn simulated_clock_seek() {
    let start = Instant::now();
    let mut clock = SimulatedClock { base: 0.0, resumed_at: Some(start) };
    clock.seek_at(60.0, start + Duration::from_secs(5));
    assert_eq!(clock.position_at(start + Duration::from_secs(6)), 61.0);
    clock.toggle_pause_at(start + Duration::from_secs(6));
    clock.seek_at(-4.0, start + Duration::from_secs(7));
    assert_eq!(clock.position_at(start + Duration::from_secs(9)), 0.0);
  }

  #[tokio::test]
  async fn clock_enum_dispatches_to_simulated() {
    let mut clock = Clock::Simulated(SimulatedClock::starting_at(5.0));
    clock.toggle_pause().await.unwrap();
    assert!(clock.is_paused().await.unwrap());
    clock.seek(30.0).await.unwrap();
    assert_eq!(clock.position().await.unwrap(), Some(30.0));
    assert_eq!(clock.label(), "simulated");
  }
}
