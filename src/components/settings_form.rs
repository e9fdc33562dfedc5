use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use crate::config::{Config, Person};
use crate::theme;
use crate::timetable::{normalize, Weekday};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Section {
    General,
    Persons,
    Overrides,
}

impl Section {
    pub fn next(&self) -> Self {
        match self {
            Section::General => Section::Persons,
            Section::Persons => Section::Overrides,
            Section::Overrides => Section::General,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Section::General => Section::Overrides,
            Section::Persons => Section::General,
            Section::Overrides => Section::Persons,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Section::General => "General",
            Section::Persons => "Persons",
            Section::Overrides => "Overrides",
        }
    }
}

const GENERAL_FIELDS: [&str; 5] = ["City:", "Proxy:", "Slots:", "Long:", "API key:"];
const PERSON_FIELDS: [&str; 3] = ["Name:", "Feed:", "Proxy:"];

/// A staged copy of the configuration. Nothing reaches the live config until
/// [`SettingsFormState::into_config`] is called on save.
#[derive(Debug, Clone)]
pub struct SettingsFormState {
    pub draft: Config,
    pub section: Section,
    /// Focused row within General or Persons.
    pub field: usize,
    pub day: Weekday,
    pub slot: usize,
    pub person: usize,
    proxy: String,
    slots: String,
    long_lesson: String,
    /// Person columns removed so far, each index relative to the list at the
    /// time of removal.
    removed: Vec<usize>,
}

impl SettingsFormState {
    pub fn new(config: &Config, day: Weekday) -> Self {
        Self {
            draft: config.clone(),
            section: Section::General,
            field: 0,
            day,
            slot: 0,
            person: 0,
            proxy: config.feed_proxy.clone().unwrap_or_default(),
            slots: config.slots.join(", "),
            long_lesson: config.long_lesson.join(", "),
            removed: Vec::new(),
        }
    }

    pub fn next_section(&mut self) {
        self.section = self.section.next();
        self.field = 0;
    }

    pub fn prev_section(&mut self) {
        self.section = self.section.prev();
        self.field = 0;
    }

    fn field_count(&self) -> usize {
        match self.section {
            Section::General => GENERAL_FIELDS.len(),
            Section::Persons => self.draft.persons.len() * PERSON_FIELDS.len(),
            Section::Overrides => 0,
        }
    }

    pub fn up(&mut self) {
        match self.section {
            Section::Overrides => self.slot = self.slot.saturating_sub(1),
            _ => self.field = self.field.saturating_sub(1),
        }
    }

    pub fn down(&mut self) {
        match self.section {
            Section::Overrides => {
                if self.slot + 1 < self.draft.slots.len() {
                    self.slot += 1;
                }
            }
            _ => {
                if self.field + 1 < self.field_count() {
                    self.field += 1;
                }
            }
        }
    }

    pub fn left(&mut self) {
        if self.section == Section::Overrides {
            self.person = self.person.saturating_sub(1);
        }
    }

    pub fn right(&mut self) {
        if self.section == Section::Overrides && self.person + 1 < self.draft.persons.len() {
            self.person += 1;
        }
    }

    pub fn next_day(&mut self) {
        self.day = self.day.succ();
    }

    pub fn prev_day(&mut self) {
        self.day = self.day.pred();
    }

    pub fn input_char(&mut self, c: char) {
        self.edit(|text| text.push(c));
    }

    pub fn backspace(&mut self) {
        self.edit(|text| {
            text.pop();
        });
    }

    /// Empty the focused override cell so the feed shows through again.
    pub fn clear_cell(&mut self) {
        if self.section == Section::Overrides {
            self.edit(String::clear);
        }
    }

    pub fn add_person(&mut self) {
        if self.section != Section::Persons {
            return;
        }
        let n = self.draft.persons.len() + 1;
        self.draft.persons.push(Person::named(&format!("Person {n}")));
        self.draft = normalize(&self.draft);
        self.field = (self.draft.persons.len() - 1) * PERSON_FIELDS.len();
    }

    pub fn remove_person(&mut self) {
        if self.section != Section::Persons || self.draft.persons.len() <= 1 {
            return;
        }
        let idx = self.field / PERSON_FIELDS.len();
        self.draft.persons.remove(idx);
        self.draft.timetable.remove_column(idx);
        self.draft.overrides.remove_column(idx);
        self.removed.push(idx);
        self.field = self.field.min(self.field_count().saturating_sub(1));
        self.person = self.person.min(self.draft.persons.len() - 1);
    }

    fn edit(&mut self, change: impl FnOnce(&mut String)) {
        match self.section {
            Section::General => match self.field {
                0 => change(&mut self.draft.city),
                1 => change(&mut self.proxy),
                2 => change(&mut self.slots),
                3 => change(&mut self.long_lesson),
                _ => change(&mut self.draft.weather.api_key),
            },
            Section::Persons => {
                let idx = self.field / PERSON_FIELDS.len();
                let Some(person) = self.draft.persons.get_mut(idx) else {
                    return;
                };
                match self.field % PERSON_FIELDS.len() {
                    0 => change(&mut person.name),
                    1 => change(person.feed_url.get_or_insert_with(String::new)),
                    _ => change(person.proxy_url.get_or_insert_with(String::new)),
                }
            }
            Section::Overrides => {
                let Some(slot) = self.draft.slots.get(self.slot).cloned() else {
                    return;
                };
                let mut text = self.draft.overrides.cell(self.day, &slot, self.person).to_string();
                change(&mut text);
                self.draft.overrides.set(self.day, &slot, self.person, text);
            }
        }
    }

    pub fn removed_columns(&self) -> &[usize] {
        &self.removed
    }

    /// The edited configuration, normalised and with blank optional fields
    /// cleared.
    pub fn into_config(self) -> Config {
        let mut config = self.draft;
        config.feed_proxy = Some(self.proxy.trim().to_string()).filter(|p| !p.is_empty());
        config.slots = split_list(&self.slots);
        config.long_lesson = split_list(&self.long_lesson);
        config.city = config.city.trim().to_string();
        for person in &mut config.persons {
            person.name = person.name.trim().to_string();
            person.feed_url = person.feed().map(str::to_string);
            person.proxy_url = person.proxy(None).map(str::to_string);
        }
        normalize(&config)
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct SettingsForm;

impl SettingsForm {
    pub fn render(frame: &mut Frame, area: Rect, state: &SettingsFormState) {
        let form_w = area.width.min(72).max(40);
        let form_h = area.height.min(22).max(12);
        let x = area.x + (area.width.saturating_sub(form_w)) / 2;
        let y = area.y + (area.height.saturating_sub(form_h)) / 2;
        let form_area = Rect::new(x, y, form_w, form_h);

        frame.render_widget(Clear, form_area);

        let block = Block::default()
            .title(" Settings ")
            .title_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));

        let inner = block.inner(form_area);
        frame.render_widget(block, form_area);

        let rows = Layout::vertical([
            Constraint::Length(1), // section tabs
            Constraint::Length(1), // spacer
            Constraint::Min(1),    // body
            Constraint::Length(1), // help
        ])
        .split(inner);

        let mut tabs = Vec::new();
        for section in [Section::General, Section::Persons, Section::Overrides] {
            let style = if section == state.section {
                theme::SELECTED_STYLE
            } else {
                theme::DIM_STYLE
            };
            tabs.push(Span::styled(format!(" {} ", section.title()), style));
            tabs.push(Span::raw(" "));
        }
        frame.render_widget(Paragraph::new(Line::from(tabs)), rows[0]);

        match state.section {
            Section::General => render_general(frame, rows[2], state),
            Section::Persons => render_persons(frame, rows[2], state),
            Section::Overrides => render_overrides(frame, rows[2], state),
        }

        let extra = match state.section {
            Section::General => "",
            Section::Persons => " ^N:Add ^D:Remove",
            Section::Overrides => " PgUp/PgDn:Day Del:Clear",
        };
        let help = Line::from(vec![
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(":Section ", theme::DIM_STYLE),
            Span::styled("^S", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(":Save ", theme::DIM_STYLE),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(":Cancel", theme::DIM_STYLE),
            Span::styled(extra, theme::DIM_STYLE),
        ]);
        frame.render_widget(Paragraph::new(help), rows[3]);
    }
}

fn render_general(frame: &mut Frame, area: Rect, state: &SettingsFormState) {
    let key = mask(&state.draft.weather.api_key);
    let values = [
        state.draft.city.as_str(),
        state.proxy.as_str(),
        state.slots.as_str(),
        state.long_lesson.as_str(),
        key.as_str(),
    ];

    let rows = Layout::vertical(vec![Constraint::Length(1); values.len()]).split(area);
    for (i, (label, value)) in GENERAL_FIELDS.iter().zip(values).enumerate() {
        render_field(frame, rows[i], label, value, state.field == i);
    }
}

fn render_persons(frame: &mut Frame, area: Rect, state: &SettingsFormState) {
    let per_person = PERSON_FIELDS.len() + 1;
    let visible = (area.height as usize / per_person).max(1);
    let focused = state.field / PERSON_FIELDS.len();
    let first = focused.saturating_sub(visible - 1);

    let mut y = area.y;
    for (idx, person) in state.draft.persons.iter().enumerate().skip(first).take(visible) {
        let values = [
            person.name.as_str(),
            person.feed_url.as_deref().unwrap_or_default(),
            person.proxy_url.as_deref().unwrap_or_default(),
        ];
        for (f, (label, value)) in PERSON_FIELDS.iter().zip(values).enumerate() {
            if y >= area.bottom() {
                return;
            }
            let row = Rect::new(area.x, y, area.width, 1);
            render_field(frame, row, label, value, state.field == idx * PERSON_FIELDS.len() + f);
            y += 1;
        }
        y += 1;
    }
}

fn render_overrides(frame: &mut Frame, area: Rect, state: &SettingsFormState) {
    let rows = Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).split(area);

    let day = Line::from(vec![
        Span::styled("\u{25c0} ", theme::DIM_STYLE),
        Span::styled(state.day.name(), theme::HEADER_STYLE),
        Span::styled(" \u{25b6}", theme::DIM_STYLE),
    ]);
    frame.render_widget(Paragraph::new(day), rows[0]);

    let header = Row::new(
        std::iter::once(Cell::from(""))
            .chain(state.draft.persons.iter().map(|p| Cell::from(p.name.clone()))),
    )
    .style(theme::HEADER_STYLE);

    let body = state.draft.slots.iter().enumerate().map(|(s, slot)| {
        let cells = (0..state.draft.persons.len()).map(|p| {
            let text = state.draft.overrides.cell(state.day, slot, p);
            let active = s == state.slot && p == state.person;
            let shown = if active { format!("{text}_") } else { text.to_string() };
            let style = if active {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Cell::from(shown).style(style)
        });
        Row::new(std::iter::once(Cell::from(slot.clone()).style(theme::DIM_STYLE)).chain(cells))
    });

    let mut widths = vec![Constraint::Length(6)];
    widths.extend(std::iter::repeat(Constraint::Fill(1)).take(state.draft.persons.len()));

    frame.render_widget(Table::new(body, widths).header(header), rows[1]);
}

fn render_field(frame: &mut Frame, area: Rect, label: &str, value: &str, active: bool) {
    let cursor = if active { "_" } else { "" };

    let style = if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let spans = vec![
        Span::styled(format!("{label:<9}"), theme::DIM_STYLE),
        Span::styled(format!("{value}{cursor}"), style),
    ];

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
