mod app;
mod cloud;
mod components;
mod config;
mod event;
mod schedule;
mod tasks;
mod theme;
mod timetable;
mod tui;
mod weather;

use std::sync::Mutex;
use std::time::Duration;

use app::{App, InputMode, Message};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use config::ConfigStore;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Rect};
use schedule::{Trigger, WeeklyGate};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "HOME_DISPLAY_LOG";
const SCHEDULE_POLL: Duration = Duration::from_secs(60);
const WEATHER_REFRESH: Duration = Duration::from_secs(15 * 60);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging()?;

    let store = ConfigStore::default_location()?;
    tracing::info!(path = %store.path().display(), "loading configuration");
    let trigger = Trigger::persistent(WeeklyGate::default(), config::config_dir()?.join("state.toml"));
    let (tx, rx) = mpsc::unbounded_channel();
    let mut app = App::new(store, trigger, tx);
    tracing::info!(persons = app.config.persons.len(), city = %app.config.city, "starting");

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, rx).await;
    tui::restore()?;
    result
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let dir = config::data_dir()?;
    std::fs::create_dir_all(&dir).wrap_err_with(|| format!("Failed to create {}", dir.display()))?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("home-display.log"))
        .wrap_err("Failed to open log file")?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(
    terminal: &mut tui::Tui,
    app: &mut App,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> Result<()> {
    let mut events = event::Events::new();
    let mut clock = tokio::time::interval(Duration::from_secs(1));
    let mut schedule = tokio::time::interval(SCHEDULE_POLL);
    let mut weather = tokio::time::interval(WEATHER_REFRESH);

    app.start_cloud_load();

    while app.running {
        terminal.draw(|frame| draw(frame, app))?;

        tokio::select! {
            key = events.next_key() => match key? {
                Some(key) => handle_key(app, key),
                None => app.running = false,
            },
            Some(message) = rx.recv() => app.handle_message(message),
            _ = clock.tick() => app.tick(chrono::Local::now()),
            _ = schedule.tick() => app.poll_schedule(),
            _ = weather.tick() => app.start_weather(),
        }
    }

    Ok(())
}

fn draw(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();

    // Main layout: content + status bar
    let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);

    let side_w = if area.width >= 100 { 34 } else { 28 };
    let content = Layout::horizontal([Constraint::Min(30), Constraint::Length(side_w)]).split(layout[0]);
    let side = Layout::vertical([Constraint::Length(4), Constraint::Min(4)]).split(content[1]);

    components::TimetableView::render(
        frame,
        content[0],
        &app.config,
        app.display_day(),
        app.current_slot(),
    );
    components::Clock::render(frame, side[0], app.now);
    components::WeatherCard::render(
        frame,
        side[1],
        &app.config.city,
        app.weather.as_ref(),
        app.weather_error.as_deref(),
        app.weather_loading(),
    );

    if let Some(ref form) = app.settings {
        components::SettingsForm::render(frame, area, form);
    }

    if app.show_help {
        render_help(frame, area);
    }

    components::StatusBar::render(frame, layout[1], app);
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Clear status message on any key
    app.status_message = None;

    if app.show_help {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            app.show_help = false;
        }
        return;
    }

    match app.input_mode {
        InputMode::Settings => handle_settings_input(app, key.code, key.modifiers),
        InputMode::Normal => handle_normal_input(app, key.code, key.modifiers),
    }
}

fn handle_normal_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            app.running = false;
        }
        (KeyCode::Char('r'), _) => {
            app.start_ingest();
            app.status_message = Some("Refreshing timetable...".to_string());
        }
        (KeyCode::Char('w'), _) => app.start_weather(),
        (KeyCode::Char('s'), _) => app.open_settings(),
        (KeyCode::Char('?'), _) => app.show_help = true,
        _ => {}
    }
}

fn handle_settings_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if modifiers.contains(KeyModifiers::CONTROL) {
        match code {
            KeyCode::Char('s') => app.save_settings(),
            KeyCode::Char('n') => {
                if let Some(form) = app.settings_mut() {
                    form.add_person();
                }
            }
            KeyCode::Char('d') => {
                if let Some(form) = app.settings_mut() {
                    form.remove_person();
                }
            }
            KeyCode::Char('c') => app.close_settings(),
            _ => {}
        }
        return;
    }

    if code == KeyCode::Esc {
        app.close_settings();
        return;
    }

    let Some(form) = app.settings_mut() else {
        return;
    };
    match code {
        KeyCode::Tab => form.next_section(),
        KeyCode::BackTab => form.prev_section(),
        KeyCode::Up => form.up(),
        KeyCode::Down | KeyCode::Enter => form.down(),
        KeyCode::Left => form.left(),
        KeyCode::Right => form.right(),
        KeyCode::PageUp => form.prev_day(),
        KeyCode::PageDown => form.next_day(),
        KeyCode::Delete => form.clear_cell(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) => form.input_char(c),
        _ => {}
    }
}

fn render_help(frame: &mut ratatui::Frame, area: Rect) {
    use ratatui::style::{Color, Modifier, Style};
    use ratatui::text::{Line, Span};
    use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

    let popup_w = area.width.min(52).max(30);
    let popup_h = area.height.min(20).max(12);
    let x = area.x + (area.width.saturating_sub(popup_w)) / 2;
    let y = area.y + (area.height.saturating_sub(popup_h)) / 2;
    let popup_area = Rect::new(x, y, popup_w, popup_h);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Keybindings ")
        .title_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let key_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let section_style = Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED);

    let entry = |key: &'static str, desc: &'static str| {
        Line::from(vec![Span::styled(format!("  {key:<10}"), key_style), Span::raw(desc)])
    };

    let lines = vec![
        Line::from(Span::styled("Dashboard", section_style)),
        entry("r", "Refresh timetable from feeds"),
        entry("w", "Refresh weather"),
        entry("s", "Open settings"),
        entry("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled("Settings", section_style)),
        entry("Tab", "Next section"),
        entry("\u{2191}/\u{2193}", "Previous/next field or slot"),
        entry("\u{2190}/\u{2192}", "Previous/next person (overrides)"),
        entry("PgUp/PgDn", "Previous/next day (overrides)"),
        entry("Del", "Clear override cell"),
        entry("Ctrl+N/D", "Add/remove person"),
        entry("Ctrl+S", "Save"),
        entry("Esc", "Cancel"),
    ];

    let para = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(para, inner);
}
