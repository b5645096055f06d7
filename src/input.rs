use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key).await,
    AppMode::Search => handle_search_key(app, key),
  }
}

async fn handle_browse_key(app: &mut App, key: KeyEvent) {
  let now = Instant::now();
  match key.code {
    KeyCode::Char('q') => app.should_quit = true,
    KeyCode::Enter => app.seek_to_cursor().await,
    KeyCode::Char(' ') => app.toggle_pause().await,
    KeyCode::Char('/') => {
      app.search_cursor = app.search.chars().count();
      app.mode = AppMode::Search;
    }
    KeyCode::Esc => {
      if !app.search.is_empty() {
        app.clear_search();
      } else {
        app.clear_error();
      }
    }
    KeyCode::Char('f') => app.toggle_follow(),
    KeyCode::Char('y') => app.copy_transcript(),
    KeyCode::Char('Y') => app.copy_url(),
    KeyCode::Char('r') => app.reload(),
    code => {
      let Some(ref mut session) = app.session else { return };
      match code {
        KeyCode::Down | KeyCode::Char('j') => session.move_cursor(1, now),
        KeyCode::Up | KeyCode::Char('k') => session.move_cursor(-1, now),
        KeyCode::PageDown => session.page(1, now),
        KeyCode::PageUp => session.page(-1, now),
        KeyCode::Home | KeyCode::Char('g') => session.cursor_to_first(now),
        KeyCode::End | KeyCode::Char('G') => session.cursor_to_last(now),
        _ => {}
      }
    }
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.search, app.search_cursor);
      app.search.insert(byte_idx, c);
      app.search_cursor += 1;
      app.apply_search();
    }
    KeyCode::Backspace => {
      if app.search_cursor > 0 {
        app.search_cursor -= 1;
        let byte_idx = char_to_byte_index(&app.search, app.search_cursor);
        app.search.remove(byte_idx);
        app.apply_search();
      }
    }
    KeyCode::Delete => {
      if app.search_cursor < app.search.chars().count() {
        let byte_idx = char_to_byte_index(&app.search, app.search_cursor);
        app.search.remove(byte_idx);
        app.apply_search();
      }
    }
    KeyCode::Left => {
      app.search_cursor = app.search_cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.search_cursor < app.search.chars().count() {
        app.search_cursor += 1;
      }
    }
    KeyCode::Home => {
      app.search_cursor = 0;
    }
    KeyCode::End => {
      app.search_cursor = app.search.chars().count();
    }
    KeyCode::Down => {
      if let Some(ref mut session) = app.session {
        session.move_cursor(1, Instant::now());
      }
    }
    KeyCode::Up => {
      if let Some(ref mut session) = app.session {
        session.move_cursor(-1, Instant::now());
      }
    }
    KeyCode::Enter => {
      // Keep the filter and go back to browsing it
      app.mode = AppMode::Browse;
    }
    KeyCode::Esc => {
      app.clear_search();
      app.mode = AppMode::Browse;
    }
    _ => {}
  }
}
