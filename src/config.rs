use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::schedule::WeeklyGate;
use crate::timetable::{normalize, WeeklyGrid};

const APP_DIR: &str = "home-display";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub city: String,
    /// Shared proxy prefix for persons without their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_proxy: Option<String>,
    pub slots: Vec<String>,
    pub long_lesson: Vec<String>,
    pub persons: Vec<Person>,
    pub refresh: WeeklyGate,
    pub weather: WeatherOptions,
    pub cloud: CloudOptions,
    pub timetable: WeeklyGrid,
    /// Hand-entered cells that win over feed content.
    pub overrides: WeeklyGrid,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self::empty();
        config.city = "Raahe".to_string();
        config.long_lesson = vec!["Onerva".to_string()];
        normalize(&config)
    }
}

impl Config {
    /// A config with nothing filled in, not even the seeds `normalize` adds.
    pub fn empty() -> Self {
        Self {
            city: String::new(),
            feed_proxy: None,
            slots: Vec::new(),
            long_lesson: Vec::new(),
            persons: Vec::new(),
            refresh: WeeklyGate::default(),
            weather: WeatherOptions::default(),
            cloud: CloudOptions::default(),
            timetable: WeeklyGrid::default(),
            overrides: WeeklyGrid::default(),
        }
    }

    pub fn person_names(&self) -> Vec<String> {
        self.persons.iter().map(|p| p.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_feed(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            feed_url: Some(url.to_string()),
            proxy_url: None,
        }
    }

    /// The configured feed URL, if it is not blank.
    pub fn feed(&self) -> Option<&str> {
        non_blank(self.feed_url.as_deref())
    }

    /// This person's proxy prefix, else `shared`.
    pub fn proxy<'a>(&'a self, shared: Option<&'a str>) -> Option<&'a str> {
        non_blank(self.proxy_url.as_deref()).or_else(|| non_blank(shared))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherOptions {
    pub api_key: String,
    pub language: String,
    pub base_url: String,
}

impl Default for WeatherOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: "fi".to_string(),
            base_url: "https://api.openweathermap.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudOptions {
    /// Base URL of the settings document store; cloud sync is off without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub document: String,
    /// Identity token required for writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for CloudOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            document: "family".to_string(),
            token: None,
        }
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| eyre!("Could not determine config directory"))
}

pub fn data_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| eyre!("Could not determine data directory"))
}

/// Read a TOML file, `None` when it is missing or unreadable.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(path = %path.display(), "could not read file: {err}");
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(path = %path.display(), "ignoring unparsable file: {err}");
            None
        }
    }
}

pub fn save_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(value).wrap_err("Failed to serialize")?;
    std::fs::write(path, content).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// The persisted configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored config, or the defaults when there is none or it is broken.
    /// Always normalised.
    pub fn load(&self) -> Config {
        let config = load_toml(&self.path).unwrap_or_else(|| {
            tracing::info!(path = %self.path.display(), "using default configuration");
            Config::default()
        });
        normalize(&config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        save_toml(&self.path, config)?;
        tracing::debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::Weekday;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));

        let config = store.load();
        assert_eq!(config, Config::default());
        assert_eq!(config.city, "Raahe");
        assert_eq!(config.persons.len(), 3);
    }

    #[test]
    fn broken_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "city = [not toml").unwrap();

        assert_eq!(ConfigStore::new(path).load(), Config::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.toml"));

        let mut config = Config::default();
        config.city = "Oulu".to_string();
        config.persons[0].feed_url = Some("https://wilma.example/ical/1".to_string());
        config.feed_proxy = Some("https://proxy.example/?url=".to_string());
        config.overrides.set(Weekday::Thursday, "12-13", 2, "Hammaslääkäri");
        config.timetable.set(Weekday::Monday, "8-9", 0, "Kemia");

        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn partial_file_is_completed_and_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
city = "Kempele"
slots = ["8-9", "9-10"]

[[persons]]
name = "Aino"
feed_url = "https://wilma.example/ical/aino"

[timetable.monday]
"8-9" = ["Musiikki"]
"#,
        )
        .unwrap();

        let config = ConfigStore::new(path).load();
        assert_eq!(config.city, "Kempele");
        assert_eq!(config.persons.len(), 1);
        assert_eq!(config.persons[0].feed(), Some("https://wilma.example/ical/aino"));
        assert_eq!(config.timetable.cell(Weekday::Monday, "8-9", 0), "Musiikki");
        assert_eq!(config.timetable.row(Weekday::Friday, "9-10").unwrap().len(), 1);
    }

    #[test]
    fn person_proxy_falls_back_to_shared() {
        let mut person = Person::with_feed("Nanni", "https://x.example");
        assert_eq!(person.proxy(Some("https://shared/?u=")), Some("https://shared/?u="));
        person.proxy_url = Some("https://own/?u=".to_string());
        assert_eq!(person.proxy(Some("https://shared/?u=")), Some("https://own/?u="));
        person.proxy_url = Some("   ".to_string());
        assert_eq!(person.proxy(None), None);
        person.feed_url = Some(" ".to_string());
        assert_eq!(person.feed(), None);
    }
}
