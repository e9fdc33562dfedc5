use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, InputMode};
use crate::theme;

pub struct StatusBar;

impl StatusBar {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let w = area.width as usize;
        let style = theme::current().status;

        let mut left = match app.last_ingest {
            Some(at) => format!(" Timetable {} ", at.format("%a %H:%M")),
            None => " Timetable not refreshed ".to_string(),
        };
        if app.ingesting() {
            left.push_str("\u{21bb} ");
        }
        if app.input_mode == InputMode::Settings {
            left.push_str("[Settings] ");
        }

        let problem = app
            .ingest_failures
            .as_deref()
            .filter(|summary| !summary.is_empty());

        let right = if let Some(ref msg) = app.status_message {
            format!(" {msg} ")
        } else if let Some(summary) = problem {
            format!(" {summary} ")
        } else if w >= 70 {
            " r:Timetable w:Weather s:Settings ?:Help q:Quit ".to_string()
        } else {
            " ?:Help q:Quit ".to_string()
        };

        let right_style = if app.status_message.is_none() && problem.is_some() {
            style.patch(theme::current().error)
        } else {
            style
        };

        let padding = " ".repeat(w.saturating_sub(left.chars().count() + right.chars().count()));

        let line = Line::from(vec![
            Span::styled(left, style),
            Span::styled(padding, style),
            Span::styled(right, right_style),
        ]);

        frame.render_widget(Paragraph::new(line).style(style), area);
    }
}
