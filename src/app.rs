use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike};
use tokio::sync::mpsc::UnboundedSender;

use crate::cloud::{self, CloudClient, CloudDocument};
use crate::components::SettingsFormState;
use crate::config::{Config, ConfigStore};
use crate::schedule::Trigger;
use crate::tasks::TaskSlot;
use crate::timetable::slots::slot_for;
use crate::timetable::{normalize, HttpFeed, IngestOptions, Ingestor, Refresh, Weekday};
use crate::weather::{WeatherClient, WeatherReport};

/// From this hour on, the dashboard shows the next school day.
const EVENING_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Settings,
}

/// Results coming back from background tasks, tagged with the generation
/// they were started with.
#[derive(Debug)]
pub enum Message {
    Weather(u64, Result<WeatherReport, String>),
    Ingest(u64, Box<Refresh>),
    CloudLoaded(u64, Result<Option<CloudDocument>, String>),
    CloudSaved(u64, Result<(), String>),
}

pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub input_mode: InputMode,
    pub now: DateTime<Local>,
    pub config: Config,
    pub settings: Option<SettingsFormState>,
    pub weather: Option<WeatherReport>,
    pub weather_error: Option<String>,
    pub last_ingest: Option<DateTime<Local>>,
    pub ingest_failures: Option<String>,
    pub status_message: Option<String>,
    store: ConfigStore,
    trigger: Trigger,
    tx: UnboundedSender<Message>,
    weather_task: TaskSlot,
    ingest_task: TaskSlot,
    cloud_task: TaskSlot,
}

impl App {
    pub fn new(store: ConfigStore, mut trigger: Trigger, tx: UnboundedSender<Message>) -> Self {
        let config = store.load();
        trigger.set_gate(config.refresh);

        Self {
            running: true,
            show_help: false,
            input_mode: InputMode::Normal,
            now: Local::now(),
            config,
            settings: None,
            weather: None,
            weather_error: None,
            last_ingest: None,
            ingest_failures: None,
            status_message: None,
            store,
            trigger,
            tx,
            weather_task: TaskSlot::new("weather"),
            ingest_task: TaskSlot::new("ingest"),
            cloud_task: TaskSlot::new("cloud"),
        }
    }

    /// The weekday the timetable card shows.
    pub fn display_day(&self) -> Weekday {
        display_day(self.now.naive_local())
    }

    /// The slot in progress, if the card is showing today.
    pub fn current_slot(&self) -> Option<&str> {
        let today = Weekday::of(&self.now)?;
        if today != self.display_day() {
            return None;
        }
        slot_for(&self.config.slots, &self.now)
    }

    pub fn ingesting(&self) -> bool {
        self.ingest_task.is_running()
    }

    pub fn weather_loading(&self) -> bool {
        self.weather_task.is_running()
    }

    pub fn tick(&mut self, now: DateTime<Local>) {
        self.now = now;
    }

    /// Start ingestion if the weekly gate is open.
    pub fn poll_schedule(&mut self) {
        if self.trigger.poll(self.now.naive_local()) {
            self.start_ingest();
        }
    }

    pub fn start_ingest(&mut self) {
        let feed = match HttpFeed::new() {
            Ok(feed) => feed,
            Err(err) => {
                tracing::error!("cannot create feed client: {err}");
                self.status_message = Some(format!("Timetable refresh failed: {err}"));
                return;
            }
        };

        let config = self.config.clone();
        let ingestor = Ingestor::new(feed, IngestOptions::from_config(&config));
        let now = self.now;
        let tx = self.tx.clone();

        self.ingest_task.spawn(move |generation| async move {
            let refresh = ingestor.refresh_all(&config, now).await;
            let _ = tx.send(Message::Ingest(generation, Box::new(refresh)));
        });
    }

    pub fn start_weather(&mut self) {
        let client = match WeatherClient::new(self.config.weather.clone()) {
            Ok(client) => client,
            Err(err) => {
                self.weather_error = Some(format!("{err:#}"));
                return;
            }
        };

        let city = self.config.city.clone();
        let tx = self.tx.clone();

        self.weather_task.spawn(move |generation| async move {
            let result = client
                .report(&city, chrono::Utc::now())
                .await
                .map_err(|err| format!("{err:#}"));
            let _ = tx.send(Message::Weather(generation, result));
        });
    }

    /// Pull the shared settings document, when cloud sync is configured.
    pub fn start_cloud_load(&mut self) {
        let Some(client) = self.cloud_client() else {
            return;
        };
        let tx = self.tx.clone();

        self.cloud_task.spawn(move |generation| async move {
            let result = client.load().await.map_err(|err| err.to_string());
            let _ = tx.send(Message::CloudLoaded(generation, result));
        });
    }

    fn start_cloud_save(&mut self) {
        let Some(client) = self.cloud_client() else {
            return;
        };
        let doc = CloudDocument::from_config(&self.config);
        let tx = self.tx.clone();

        self.cloud_task.spawn(move |generation| async move {
            let result = client.save(&doc).await.map_err(|err| err.to_string());
            let _ = tx.send(Message::CloudSaved(generation, result));
        });
    }

    fn cloud_client(&self) -> Option<CloudClient> {
        match CloudClient::configured(&self.config.cloud) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!("cloud sync unavailable: {err}");
                None
            }
        }
    }

    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::Weather(generation, result) => {
                if !self.weather_task.finish(generation) {
                    return;
                }
                match result {
                    Ok(report) => {
                        self.weather = Some(report);
                        self.weather_error = None;
                    }
                    Err(err) => {
                        tracing::warn!("weather refresh failed: {err}");
                        self.weather_error = Some(err);
                    }
                }
            }
            Message::Ingest(generation, refresh) => {
                if !self.ingest_task.finish(generation) {
                    return;
                }
                self.apply_refresh(*refresh);
            }
            Message::CloudLoaded(generation, result) => {
                if !self.cloud_task.finish(generation) {
                    return;
                }
                match result {
                    Ok(Some(doc)) => {
                        let merged = cloud::apply(&doc, &self.config);
                        if merged != self.config && self.replace_config(merged) {
                            self.status_message = Some("Settings synced".to_string());
                        }
                    }
                    Ok(None) => tracing::info!("no shared settings stored yet"),
                    Err(err) => {
                        tracing::warn!("settings sync failed: {err}");
                        self.status_message = Some(format!("Sync failed: {err}"));
                    }
                }
            }
            Message::CloudSaved(generation, result) => {
                if !self.cloud_task.finish(generation) {
                    return;
                }
                if let Err(err) = result {
                    tracing::warn!("settings upload failed: {err}");
                    self.status_message = Some(format!("Upload failed: {err}"));
                }
            }
        }
    }

    fn apply_refresh(&mut self, refresh: Refresh) {
        let summary = refresh.summary();
        self.config.timetable = refresh.config.timetable;
        self.last_ingest = Some(self.now);
        if self.persist() {
            self.status_message = Some(format!("Timetable updated ({} entries)", refresh.placed));
        }
        self.ingest_failures = Some(summary).filter(|s| !s.is_empty());
    }

    /// Write the live config to disk; `false` (and a status message) on failure.
    fn persist(&mut self) -> bool {
        match self.store.save(&self.config) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("could not save configuration: {err:#}");
                self.status_message = Some(format!("Save failed: {err}"));
                false
            }
        }
    }

    pub fn open_settings(&mut self) {
        self.settings = Some(SettingsFormState::new(&self.config, self.display_day()));
        self.input_mode = InputMode::Settings;
    }

    pub fn close_settings(&mut self) {
        self.settings = None;
        self.input_mode = InputMode::Normal;
    }

    /// Commit the staged settings: persist, push to the cloud and refresh
    /// whatever depends on what changed.
    pub fn save_settings(&mut self) {
        let Some(form) = self.settings.take() else {
            return;
        };
        self.input_mode = InputMode::Normal;

        let removed = form.removed_columns().to_vec();
        let mut config = form.into_config();

        // The timetable belongs to ingestion: keep the live grid, minus the
        // removed persons, with the override edits applied.
        let mut timetable = self.config.timetable.clone();
        let mut before = self.config.overrides.clone();
        for idx in removed {
            timetable.remove_column(idx);
            before.remove_column(idx);
        }
        timetable.merge_override_edits(&before, &config.overrides, &config.slots);
        config.timetable = timetable;
        let config = normalize(&config);

        if config == self.config {
            self.status_message = Some("No changes".to_string());
            return;
        }

        if self.replace_config(config) {
            self.status_message = Some("Settings saved".to_string());
        }
        self.start_cloud_save();
    }

    /// Install a new live config and persist it. Ingestion is restarted when
    /// one was in flight (it works on the old persons and slots) or when
    /// anything it reads changed. `false` if saving failed.
    fn replace_config(&mut self, next: Config) -> bool {
        let rerun = self.ingest_task.is_running() || changes_ingest(&self.config, &next);
        let weather_changed = next.city != self.config.city || next.weather != self.config.weather;

        self.ingest_task.cancel();
        self.trigger.set_gate(next.refresh);
        self.config = next;
        let saved = self.persist();

        if rerun {
            self.start_ingest();
        }
        if weather_changed {
            self.start_weather();
        }
        saved
    }

    pub fn settings_mut(&mut self) -> Option<&mut SettingsFormState> {
        self.settings.as_mut()
    }
}

/// Whether ingesting with `next` could produce a different timetable.
fn changes_ingest(current: &Config, next: &Config) -> bool {
    current.persons != next.persons
        || current.slots != next.slots
        || current.feed_proxy != next.feed_proxy
        || current.long_lesson != next.long_lesson
}

/// Today's weekday, the next one from 18:00, and Monday over the weekend.
pub fn display_day(now: NaiveDateTime) -> Weekday {
    let evening = now.hour() >= EVENING_HOUR;
    match Weekday::from_chrono(now.weekday()) {
        Some(Weekday::Friday) if evening => Weekday::Monday,
        Some(day) if evening => day.succ(),
        Some(day) => day,
        None => Weekday::Monday,
    }
}
