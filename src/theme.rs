use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub accent: Color,
  pub border: Color,
  /// Line being spoken right now.
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  /// Row under the user's cursor.
  pub cursor_bg: Color,
  pub stripe_bg: Color,
  pub chapter: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "pastel",
    bg: Color::Rgb(35, 33, 54),
    fg: Color::Rgb(224, 222, 244),
    muted: Color::Rgb(144, 140, 170),
    accent: Color::Rgb(196, 167, 231),
    border: Color::Rgb(110, 106, 134),
    highlight_fg: Color::Rgb(35, 33, 54),
    highlight_bg: Color::Rgb(156, 207, 216),
    cursor_bg: Color::Rgb(68, 65, 90),
    stripe_bg: Color::Rgb(42, 39, 63),
    chapter: Color::Rgb(246, 193, 119),
    status: Color::Rgb(156, 207, 216),
    error: Color::Rgb(235, 111, 146),
    key_fg: Color::Rgb(35, 33, 54),
    key_bg: Color::Rgb(196, 167, 231),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(250, 244, 237),
    fg: Color::Rgb(87, 82, 121),
    muted: Color::Rgb(152, 147, 165),
    accent: Color::Rgb(144, 122, 169),
    border: Color::Rgb(206, 202, 205),
    highlight_fg: Color::Rgb(250, 244, 237),
    highlight_bg: Color::Rgb(40, 105, 131),
    cursor_bg: Color::Rgb(223, 218, 217),
    stripe_bg: Color::Rgb(255, 250, 243),
    chapter: Color::Rgb(215, 130, 126),
    status: Color::Rgb(40, 105, 131),
    error: Color::Rgb(180, 99, 122),
    key_fg: Color::Rgb(250, 244, 237),
    key_bg: Color::Rgb(144, 122, 169),
  },
  Theme {
    name: "terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    muted: Color::DarkGray,
    accent: Color::Cyan,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Green,
    cursor_bg: Color::DarkGray,
    stripe_bg: Color::Reset,
    chapter: Color::Yellow,
    status: Color::Cyan,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name == n)).unwrap_or(0)
}
