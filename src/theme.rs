use std::sync::OnceLock;

use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;

use crate::config::{config_dir, load_toml};

static THEME: OnceLock<Theme> = OnceLock::new();

/// Get the active theme (loaded once on first call).
pub fn current() -> &'static Theme {
    THEME.get_or_init(|| Theme::load().unwrap_or_default())
}

// Const fallbacks used in places that need compile-time styles
pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::White)
    .add_modifier(Modifier::BOLD);
pub const DIM_STYLE: Style = Style::new().fg(Color::DarkGray);
pub const BORDER_STYLE: Style = Style::new().fg(Color::Gray);
pub const SELECTED_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Cyan);

#[derive(Debug, Clone)]
pub struct Theme {
    /// Label of the slot in progress.
    pub today: Style,
    /// Cells of the slot in progress.
    pub highlight: Style,
    pub status: Style,
    /// Clock digits and current temperature.
    pub accent: Style,
    pub error: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            today: Style::default().fg(Color::Black).bg(Color::Yellow),
            highlight: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            status: Style::default().fg(Color::White).bg(Color::DarkGray),
            accent: Style::default().fg(Color::Cyan),
            error: Style::default().fg(Color::LightRed),
        }
    }
}

impl Theme {
    /// `theme.toml` next to the configuration, if present and valid.
    pub fn load() -> Option<Self> {
        let path = config_dir().ok()?.join("theme.toml");
        let config: ThemeConfig = load_toml(&path)?;
        Some(config.into_theme())
    }
}

// ── TOML config types ──

#[derive(Debug, Deserialize, Default)]
struct ThemeConfig {
    today_fg: Option<String>,
    today_bg: Option<String>,
    highlight_bg: Option<String>,
    status_fg: Option<String>,
    status_bg: Option<String>,
    accent_fg: Option<String>,
    error_fg: Option<String>,
}

impl ThemeConfig {
    fn into_theme(self) -> Theme {
        let mut theme = Theme::default();

        if let Some(c) = self.today_fg.as_deref().and_then(parse_color) {
            theme.today = theme.today.fg(c);
        }
        if let Some(c) = self.today_bg.as_deref().and_then(parse_color) {
            theme.today = theme.today.bg(c);
        }
        if let Some(c) = self.highlight_bg.as_deref().and_then(parse_color) {
            theme.highlight = theme.highlight.bg(c);
        }
        if let Some(c) = self.status_fg.as_deref().and_then(parse_color) {
            theme.status = theme.status.fg(c);
        }
        if let Some(c) = self.status_bg.as_deref().and_then(parse_color) {
            theme.status = theme.status.bg(c);
        }
        if let Some(c) = self.accent_fg.as_deref().and_then(parse_color) {
            theme.accent = theme.accent.fg(c);
        }
        if let Some(c) = self.error_fg.as_deref().and_then(parse_color) {
            theme.error = theme.error.fg(c);
        }

        theme
    }
}

/// Parse a color string: hex "#rrggbb", or named colors.
fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#').filter(|h| h.len() == 6) {
        let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
        let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
        let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
        return Some(Color::Rgb(r, g, b));
    }
    match s.to_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" => Some(Color::White),
        "gray" | "grey" => Some(Color::Gray),
        "darkgray" | "darkgrey" => Some(Color::DarkGray),
        "lightred" => Some(Color::LightRed),
        "lightgreen" => Some(Color::LightGreen),
        "lightblue" => Some(Color::LightBlue),
        "lightcyan" => Some(Color::LightCyan),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_parse_from_hex_and_names() {
        assert_eq!(parse_color("#ff8000"), Some(Color::Rgb(255, 128, 0)));
        assert_eq!(parse_color(" Grey "), Some(Color::Gray));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("#gg0000"), None);
        assert_eq!(parse_color("mauve"), None);
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let config: ThemeConfig = toml::from_str("accent_fg = \"yellow\"\nerror_fg = \"nonsense\"").unwrap();
        let theme = config.into_theme();
        assert_eq!(theme.accent.fg, Some(Color::Yellow));
        assert_eq!(theme.error.fg, Theme::default().error.fg);
    }
}
