use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use ytscript::app::App;
use ytscript::config::{Config, prefs_path};
use ytscript::constants::constants;
use ytscript::input::handle_key_event;
use ytscript::logging;
use ytscript::model;
use ytscript::player::{Clock, MpvClock, MpvIpc, MpvPlayer, SimulatedClock};
use ytscript::session::TranscriptSession;
use ytscript::transcript::{self, TranscriptSource};
use ytscript::{ui, youtube};

// --- CLI ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
  Text,
  Json,
}

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// YouTube URL or 11-character video id
  source: Option<String>,

  /// Read the transcript from a file (timedtext XML, JSON, or an exported text file)
  #[arg(short, long, value_name = "PATH", conflicts_with = "source")]
  file: Option<PathBuf>,

  /// Start mpv on the video and follow its playback
  #[arg(short, long)]
  play: bool,

  /// With --play, open no video window
  #[arg(long, requires = "play")]
  audio_only: bool,

  /// Follow an mpv already started with --input-ipc-server=SOCKET
  #[arg(long, value_name = "SOCKET", conflicts_with = "play")]
  ipc: Option<PathBuf>,

  /// Caption language to prefer; repeat to give a fallback order
  #[arg(short, long = "lang", value_name = "CODE")]
  langs: Vec<String>,

  /// Write the transcript to PATH ('-' for stdout) and exit
  #[arg(short, long, value_name = "PATH")]
  export: Option<String>,

  /// Format for --export
  #[arg(long, value_enum, default_value = "text")]
  format: ExportFormat,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,

  /// Log at debug level
  #[arg(short, long)]
  verbose: bool,
}

fn resolve_source(args: &Args) -> Result<Option<TranscriptSource>> {
  if let Some(ref path) = args.file {
    return Ok(Some(TranscriptSource::File(path.clone())));
  }
  match args.source {
    Some(ref input) => {
      let video_id =
        youtube::extract_video_id(input).ok_or_else(|| anyhow!("Not a YouTube URL or video id: {}", input))?;
      Ok(Some(TranscriptSource::YouTube { video_id }))
    }
    None => Ok(None),
  }
}

// --- Export ---

/// Text export with a `#` comment header, which the plain-text reader skips.
fn export_document(session: &TranscriptSession, url: Option<&str>, date: &str) -> String {
  let mut out = String::new();
  if let Some(ref title) = session.title {
    out.push_str(&format!("# {}\n", title));
  }
  if let Some(url) = url {
    out.push_str(&format!("# {}\n", url));
  }
  out.push_str(&format!("{} {}\n\n", model::EXPORT_HEADER, date));
  out.push_str(&session.export_text());
  out.push('\n');
  out
}

async fn run_export(source: &TranscriptSource, languages: &[String], target: &str, format: ExportFormat) -> Result<()> {
  let loaded = transcript::load(source, languages).await?;
  let session = TranscriptSession::new(loaded, constants().autoscroll_cooldown(), false);
  let body = match format {
    ExportFormat::Text => {
      let url = source.video_id().map(youtube::watch_url);
      let date = chrono::Local::now().format("%Y-%m-%d").to_string();
      export_document(&session, url.as_deref(), &date)
    }
    ExportFormat::Json => model::export_json(session.segments(), session.chapters())? + "\n",
  };

  if target == "-" {
    std::io::stdout().write_all(body.as_bytes()).context("Failed to write to stdout")?;
  } else {
    std::fs::write(target, body).with_context(|| format!("Failed to write {}", target))?;
    info!(path = target, segments = session.segments().len(), "export: written");
  }
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "ytscript", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = logging::default_log_dir().and_then(|dir| match logging::init(args.verbose, &dir) {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("warning: logging disabled: {:#}", e);
      None
    }
  });

  let config = Config::load();
  let source = resolve_source(&args)?;
  let languages = if args.langs.is_empty() {
    config.preferred_languages.clone().unwrap_or_else(|| constants().preferred_languages.clone())
  } else {
    args.langs.clone()
  };

  if let Some(ref target) = args.export {
    let source = source.ok_or_else(|| anyhow!("--export needs a video or --file"))?;
    return run_export(&source, &languages, target, args.format).await;
  }

  // Start the player before taking over the terminal so failures print normally.
  let mut player = None;
  let clock = if args.play {
    let video_id = source
      .as_ref()
      .and_then(|s| s.video_id())
      .ok_or_else(|| anyhow!("--play needs a YouTube video"))?;
    let spawned = MpvPlayer::spawn(&youtube::watch_url(video_id), args.audio_only).await?;
    let clock = Clock::Mpv(spawned.clock());
    player = Some(spawned);
    clock
  } else if let Some(ref socket) = args.ipc {
    let ipc = MpvIpc::new(socket.clone());
    if !ipc.is_reachable().await {
      warn!(socket = %socket.display(), "player: mpv socket not reachable yet");
    }
    Clock::Mpv(MpvClock::new(ipc))
  } else {
    Clock::Simulated(SimulatedClock::starting_at(0.0))
  };
  info!(clock = clock.label(), "startup");

  let mut app = App::new(source, clock, config, prefs_path());
  app.languages = languages;
  app.player = player;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app).await;
  ratatui::restore();
  app.shutdown().await?;
  result
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
  if app.source.is_some() {
    app.trigger_load();
  }

  loop {
    app.check_pending();
    app.expire_error();
    app.tick_clock().await;

    terminal.draw(|frame| ui::ui(frame, app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          handle_key_event(app, key).await;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }
  Ok(())
}
