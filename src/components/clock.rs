use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::theme;

pub struct Clock;

impl Clock {
    pub fn render(frame: &mut Frame, area: Rect, now: DateTime<Local>) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::BORDER_STYLE);

        let lines = vec![
            Line::from(Span::styled(
                now.format("%H:%M:%S").to_string(),
                theme::current().accent.add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                now.format("%A %-d %B %Y").to_string(),
                theme::DIM_STYLE,
            )),
        ];

        let para = Paragraph::new(lines).block(block).alignment(Alignment::Center);
        frame.render_widget(para, area);
    }
}
