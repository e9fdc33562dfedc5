use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::config::Config;
use crate::theme;
use crate::timetable::Weekday;

const EMPTY_CELL: &str = "\u{2014}";

pub struct TimetableView;

impl TimetableView {
    /// One weekday of the merged timetable: a row per slot, a column per
    /// person. `current_slot` is highlighted when the day shown is today.
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        config: &Config,
        day: Weekday,
        current_slot: Option<&str>,
    ) {
        let block = Block::default()
            .title(format!(" {} ", day.name()))
            .title_style(theme::HEADER_STYLE)
            .borders(Borders::ALL)
            .border_style(theme::BORDER_STYLE);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let persons = config.persons.len();
        if inner.width < 10 || inner.height < 2 || persons == 0 {
            return;
        }

        let label_w: u16 = if inner.width >= 60 { 7 } else { 6 };
        let mut col_constraints = vec![Constraint::Length(label_w)];
        col_constraints.extend(std::iter::repeat(Constraint::Fill(1)).take(persons));
        let cols = Layout::horizontal(col_constraints).split(inner);

        // Header row + one row per slot
        let visible = config.slots.len().min(inner.height.saturating_sub(1) as usize);
        let mut row_constraints = vec![Constraint::Length(1); visible + 1];
        row_constraints.push(Constraint::Min(0));
        let rows = Layout::vertical(row_constraints).split(inner);

        for (p, person) in config.persons.iter().enumerate() {
            let name = truncate(&person.name, cols[p + 1].width as usize);
            let header = Paragraph::new(Line::from(Span::styled(name, theme::HEADER_STYLE)));
            frame.render_widget(header, cols[p + 1].intersection(rows[0]));
        }

        for (s, slot) in config.slots.iter().take(visible).enumerate() {
            let row = rows[s + 1];
            let is_now = current_slot == Some(slot.as_str());

            let label_style = if is_now {
                theme::current().today
            } else {
                theme::DIM_STYLE
            };
            let label = Paragraph::new(Line::from(Span::styled(format!("{slot:>5} "), label_style)));
            frame.render_widget(label, cols[0].intersection(row));

            for p in 0..persons {
                let cell_area = cols[p + 1].intersection(row);
                if cell_area.width == 0 {
                    continue;
                }

                let text = config.timetable.cell(day, slot, p).trim();
                let span = if text.is_empty() {
                    Span::styled(EMPTY_CELL, theme::DIM_STYLE)
                } else if is_now {
                    Span::styled(
                        truncate(text, cell_area.width as usize),
                        theme::current().highlight.add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw(truncate(text, cell_area.width as usize))
                };
                frame.render_widget(Paragraph::new(Line::from(span)), cell_area);
            }
        }
    }
}

/// Cut `text` to `width` characters, leaving one column of spacing.
fn truncate(text: &str, width: usize) -> String {
    let max = width.saturating_sub(1).max(1);
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('\u{2026}');
    cut
}
