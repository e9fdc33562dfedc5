use chrono::Timelike;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::theme;
use crate::weather::{icon_glyph, WeatherReport};

pub struct WeatherCard;

impl WeatherCard {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        city: &str,
        report: Option<&WeatherReport>,
        error: Option<&str>,
        loading: bool,
    ) {
        let title = if loading {
            format!(" {city} \u{21bb} ")
        } else {
            format!(" {city} ")
        };
        let block = Block::default()
            .title(title)
            .title_style(theme::HEADER_STYLE)
            .borders(Borders::ALL)
            .border_style(theme::BORDER_STYLE);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::vertical([
            Constraint::Length(2), // current
            Constraint::Min(0),    // hourly strip
            Constraint::Length(if error.is_some() { 2 } else { 0 }),
        ])
        .split(inner);

        if let Some(err) = error {
            let msg = Paragraph::new(Span::styled(err.to_string(), theme::current().error))
                .wrap(Wrap { trim: true });
            frame.render_widget(msg, rows[2]);
        }

        let Some(report) = report else {
            let placeholder = if loading { "Loading weather..." } else { "No weather yet" };
            frame.render_widget(Paragraph::new(Span::styled(placeholder, theme::DIM_STYLE)), rows[0]);
            return;
        };

        let now = &report.current;
        let current = vec![
            Line::from(vec![
                Span::raw(format!("{} ", icon_glyph(now.icon.as_deref()))),
                Span::styled(format!("{}\u{b0}C", now.temp), theme::current().accent),
                Span::styled(format!("  {} m/s", now.wind), theme::DIM_STYLE),
            ]),
            Line::from(Span::styled(now.description.clone(), theme::DIM_STYLE)),
        ];
        frame.render_widget(Paragraph::new(current), rows[0]);

        let strip: Vec<Line> = report
            .hours
            .iter()
            .take(rows[1].height as usize)
            .map(|hour| {
                Line::from(vec![
                    Span::styled(format!("{:>2}:00 ", hour.time.hour()), theme::DIM_STYLE),
                    Span::raw(format!("{} ", icon_glyph(hour.conditions.icon.as_deref()))),
                    Span::raw(format!("{:>3}\u{b0}", hour.conditions.temp)),
                    Span::styled(format!(" {:>2} m/s", hour.conditions.wind), theme::DIM_STYLE),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(strip), rows[1]);
    }
}
