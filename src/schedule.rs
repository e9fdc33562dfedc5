//! When the timetable refreshes itself.
//!
//! Automatic ingestion runs once a week: on the configured weekday, at or
//! after the configured hour, at most once per calendar date. The date of
//! the last automatic run is persisted so restarts do not re-trigger it.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::{load_toml, save_toml};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyGate {
    pub weekday: Weekday,
    pub hour: u32,
}

impl Default for WeeklyGate {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour: 6,
        }
    }
}

impl WeeklyGate {
    pub fn is_due(&self, now: NaiveDateTime, last_run: Option<&str>) -> bool {
        now.weekday() == self.weekday
            && now.hour() >= self.hour
            && last_run != Some(date_key(now.date()).as_str())
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_auto_refresh: Option<String>,
}

/// The weekly gate plus its persisted last-run date.
#[derive(Debug)]
pub struct Trigger {
    gate: WeeklyGate,
    state: ScheduleState,
    path: Option<PathBuf>,
}

impl Trigger {
    /// A trigger whose state lives in `path` (loaded now, saved on every fire).
    pub fn persistent(gate: WeeklyGate, path: PathBuf) -> Self {
        let state = load_toml(&path).unwrap_or_default();
        Self {
            gate,
            state,
            path: Some(path),
        }
    }

    pub fn in_memory(gate: WeeklyGate) -> Self {
        Self {
            gate,
            state: ScheduleState::default(),
            path: None,
        }
    }

    pub fn set_gate(&mut self, gate: WeeklyGate) {
        self.gate = gate;
    }

    pub fn last_run(&self) -> Option<&str> {
        self.state.last_auto_refresh.as_deref()
    }

    /// Whether ingestion should start now. A `true` is recorded immediately,
    /// so the same date never fires twice.
    pub fn poll(&mut self, now: NaiveDateTime) -> bool {
        if !self.gate.is_due(now, self.last_run()) {
            return false;
        }

        self.state.last_auto_refresh = Some(date_key(now.date()));
        if let Some(path) = &self.path {
            if let Err(err) = save_toml(path, &self.state) {
                tracing::warn!("could not persist schedule state: {err:#}");
            }
        }
        tracing::info!(date = ?self.state.last_auto_refresh, "weekly refresh due");
        true
    }
}
