use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, HighlightSpacing, List, ListItem, ListState, Padding, Paragraph},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, AppMode};
use crate::model::{Row, format_time};
use crate::session::TranscriptSession;
use crate::theme::Theme;
use crate::transcript::TranscriptState;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Cut `s` to at most `max_width` terminal columns, appending "…" if anything was dropped.
pub fn truncate_str(s: &str, max_width: usize) -> String {
  if display_width(s, usize::MAX) <= max_width {
    return s.to_string();
  }
  let budget = max_width.saturating_sub(1);
  let mut used = 0;
  let mut out = String::new();
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w > budget {
      break;
    }
    used += w;
    out.push(c);
  }
  out.push('…');
  out
}

/// Split `text` into spans, styling case-insensitive occurrences of `needle` with `mark`.
fn mark_matches(text: &str, needle: &str, base: Style, mark: Style) -> Vec<Span<'static>> {
  let needle = needle.trim().to_lowercase();
  let lower = text.to_lowercase();
  // Byte offsets in `lower` only map back onto `text` when lowercasing kept the length.
  if needle.is_empty() || lower.len() != text.len() {
    return vec![Span::styled(text.to_string(), base)];
  }
  let mut spans = Vec::new();
  let mut pos = 0;
  for (at, m) in lower.match_indices(&needle) {
    let end = at + m.len();
    if !text.is_char_boundary(at) || !text.is_char_boundary(end) {
      continue;
    }
    if at > pos {
      spans.push(Span::styled(text[pos..at].to_string(), base));
    }
    spans.push(Span::styled(text[at..end].to_string(), mark));
    pos = end;
  }
  if pos < text.len() || spans.is_empty() {
    spans.push(Span::styled(text[pos..].to_string(), base));
  }
  spans
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let search_height = if app.mode == AppMode::Search || !app.search.is_empty() { 3 } else { 0 };
  let [header_area, main_area, status_area, search_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(search_height),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  if search_height > 0 {
    render_search(frame, app, search_area);
  }
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let brand = " ▶ ytscript ";
  let title_w = (area.width as usize).saturating_sub(brand.len() + version.len() + 1);
  let left = Line::from(vec![
    Span::styled(brand, Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(truncate_str(&app.title(), title_w), Style::default().fg(theme.fg)),
  ]);
  frame.render_widget(left, area);

  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area = Rect {
    x: area.x + area.width.saturating_sub(version.len() as u16),
    width: (version.len() as u16).min(area.width),
    ..area
  };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  match app.session {
    Some(ref mut session) => render_transcript(frame, theme, session, area),
    None => render_placeholder(frame, app, area),
  }
}

fn render_placeholder(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let message = match app.transcript_state {
    TranscriptState::Loading { .. } => "Fetching the transcript…",
    _ if app.source.is_none() => "Pass a YouTube URL or --file to get started.",
    _ => "No transcript loaded. Press r to retry.",
  };
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▶  ytscript", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Transcripts that follow along.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled(message, Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_transcript(frame: &mut Frame, theme: &Theme, session: &mut TranscriptSession, area: Rect) {
  session.set_viewport(area.height.saturating_sub(2) as usize);
  // Borders plus the two-column highlight symbol.
  let inner_w = area.width.saturating_sub(4) as usize;
  let active = session.active_row();
  let cursor = session.cursor();

  let items: Vec<ListItem> = session
    .rows()
    .iter()
    .enumerate()
    .map(|(i, row)| {
      let (fg, bg) = if Some(i) == active {
        (theme.highlight_fg, theme.highlight_bg)
      } else if Some(i) == cursor {
        (theme.fg, theme.cursor_bg)
      } else if i % 2 == 1 {
        (theme.fg, theme.stripe_bg)
      } else {
        (theme.fg, theme.bg)
      };
      let line = match *row {
        Row::Chapter(c) => {
          let chapter = &session.chapters()[c];
          let label = format!("{} {}", format_time(chapter.start), chapter.title);
          Line::from(Span::styled(
            truncate_str(&label, inner_w),
            Style::default().fg(theme.chapter).add_modifier(Modifier::BOLD),
          ))
        }
        Row::Segment(s) => {
          let segment = &session.segments()[s];
          let stamp = format!("{} ", format_time(segment.start));
          let text_w = inner_w.saturating_sub(stamp.len());
          let stamp_fg = if Some(i) == active { fg } else { theme.muted };
          let mark = Style::default().fg(theme.bg).bg(theme.accent).add_modifier(Modifier::BOLD);
          let mut spans = vec![Span::styled(stamp, Style::default().fg(stamp_fg))];
          let text = truncate_str(&segment.text, text_w);
          spans.extend(mark_matches(&text, session.filter(), Style::default().fg(fg), mark));
          Line::from(spans)
        }
      };
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = if session.filter().is_empty() {
    format!(" Transcript · {} lines ", session.segments().len())
  } else {
    let matches = session.rows().len();
    format!(" Transcript · {} of {} lines match ", matches, session.segments().len())
  };

  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border)),
    )
    .highlight_symbol("▶ ")
    .highlight_spacing(HighlightSpacing::Always)
    .highlight_style(Style::default().add_modifier(Modifier::BOLD));

  let mut state = ListState::default().with_offset(session.offset()).with_selected(cursor);
  frame.render_stateful_widget(list, area, &mut state);
  // The list may have nudged the offset to keep the cursor on screen.
  session.set_offset(state.offset());
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ  {}", info), Style::default().fg(theme.muted))
  } else {
    let chapter = app
      .position
      .and_then(|t| app.session.as_ref().and_then(|s| s.current_chapter(t)))
      .map(|c| format!("  · {}", c.title))
      .unwrap_or_default();
    (format!(" ♪ {}{}", app.position_label(), chapter), Style::default().fg(theme.status))
  };
  let width = area.width.saturating_sub(8) as usize;
  frame.render_widget(Paragraph::new(truncate_str(&text, width)).style(style), area);

  let follow = if app.auto_follow { "follow " } else { "manual " };
  let right = Line::from(Span::styled(follow, Style::default().fg(theme.muted)));
  let right_area = Rect {
    x: area.x + area.width.saturating_sub(follow.len() as u16),
    width: (follow.len() as u16).min(area.width),
    ..area
  };
  frame.render_widget(right, right_area);
}

fn render_search(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let editing = app.mode == AppMode::Search;
  let border_color = if editing { theme.accent } else { theme.border };
  let block = Block::bordered()
    .title(" Search transcript ")
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.search, app.search_cursor);
  let scroll = (cursor_col + 1).saturating_sub(inner_w);

  let visible: String = app
    .search
    .chars()
    .scan(0usize, |col, c| {
      let start = *col;
      *col += c.width().unwrap_or(0);
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), area);

  if editing && inner_w > 0 && area.height > 2 {
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Browse => {
      let mut k = vec![("Enter", "Seek"), ("j/k", "Move")];
      k.push(("Space", if app.paused { "Play" } else { "Pause" }));
      k.push(("/", "Search"));
      k.push(("f", "Follow"));
      k.push(("y/Y", "Copy"));
      k.push(("r", "Reload"));
      if !app.search.is_empty() {
        k.push(("Esc", "Clear"));
      }
      k.push(("q", "Quit"));
      k
    }
    AppMode::Search => vec![("Enter", "Done"), ("↑/↓", "Move"), ("Esc", "Clear")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw(" "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area = Rect {
    x: area.x + area.width.saturating_sub(theme_label.len() as u16),
    width: (theme_label.len() as u16).min(area.width),
    ..area
  };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::model::{Chapter, Segment};
  use crate::player::{Clock, SimulatedClock};
  use crate::transcript::LoadedTranscript;
  use ratatui::{Terminal, backend::TestBackend};
  use std::time::{Duration, Instant};

  #[test]
  fn width_counts_wide_chars() {
    assert_eq!(display_width("abc", 2), 2);
    assert_eq!(display_width("字幕", 2), 4);
    assert_eq!(display_width("字幕", 1), 2);
  }

  #[test]
  fn truncate_keeps_short_strings() {
    assert_eq!(truncate_str("hello", 5), "hello");
    assert_eq!(truncate_str("", 0), "");
  }

  #[test]
  fn truncate_by_columns() {
    assert_eq!(truncate_str("hello world", 6), "hello…");
    // each CJK char is two columns; "…" takes one
    assert_eq!(truncate_str("字幕字幕", 6), "字幕…");
    assert_eq!(truncate_str("字幕字幕", 5), "字幕…");
    assert_eq!(truncate_str("字幕字幕", 4), "字…");
  }

  #[test]
  fn matches_are_marked() {
    let base = Style::default();
    let mark = Style::default().add_modifier(Modifier::BOLD);
    let spans = mark_matches("Hello world, WORLD", "world", base, mark);
    let parts: Vec<(&str, bool)> = spans.iter().map(|s| (s.content.as_ref(), s.style == mark)).collect();
    assert_eq!(parts, vec![("Hello ", false), ("world", true), (", ", false), ("WORLD", true)]);

    assert_eq!(mark_matches("字幕", "", base, mark), vec![Span::styled("字幕", base)]);
    assert_eq!(mark_matches("abc", "x", base, mark), vec![Span::styled("abc", base)]);
  }

  #[test]
  fn narrow_search_box_does_not_panic() {
    let mut app = App::new(None, Clock::Simulated(SimulatedClock::starting_at(0.0)), Config::default(), None);
    app.mode = AppMode::Search;
    app.search = "ab".to_string();
    app.search_cursor = 2;
    for width in [1, 3, 4, 5] {
      let mut terminal = Terminal::new(TestBackend::new(width, 12)).unwrap();
      terminal.draw(|frame| ui(frame, &mut app)).unwrap();
    }
  }

  fn screen(terminal: &Terminal<TestBackend>) -> String {
    terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
  }

  #[test]
  fn renders_transcript_rows() {
    let mut app = App::new(None, Clock::Simulated(SimulatedClock::starting_at(0.0)), Config::default(), None);
    let segments = (0..40)
      .map(|i| Segment { start: i as f64 * 2.0, end: i as f64 * 2.0 + 2.0, text: format!("line number {i}") })
      .collect();
    let chapters = vec![Chapter { start: 0.0, title: "Opening".to_string() }];
    let loaded = LoadedTranscript { title: Some("Demo".to_string()), segments, chapters, ..Default::default() };
    app.session = Some(TranscriptSession::new(loaded, Duration::from_secs(2), true));

    let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
    terminal.draw(|frame| ui(frame, &mut app)).unwrap();
    let text = screen(&terminal);
    assert!(text.contains("Demo"));
    assert!(text.contains("Opening"));
    assert!(text.contains("line number 0"));

    // Jump far ahead; the next frame scrolls the active line into view.
    app.session.as_mut().unwrap().tick(70.0, Instant::now());
    terminal.draw(|frame| ui(frame, &mut app)).unwrap();
    let text = screen(&terminal);
    assert!(text.contains("line number 35"));
    assert!(app.session.as_ref().unwrap().offset() > 0);
  }

  #[test]
  fn renders_placeholder_without_session() {
    let mut app = App::new(None, Clock::Simulated(SimulatedClock::starting_at(0.0)), Config::default(), None);
    let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
    terminal.draw(|frame| ui(frame, &mut app)).unwrap();
    assert!(screen(&terminal).contains("get started"));
  }
}
