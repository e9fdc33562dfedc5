use chrono::{DateTime, Duration, Local, Utc};

/// Placeholder written into the grid when a feed event has no summary.
pub const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn local_start(&self) -> DateTime<Local> {
        self.start.with_timezone(&Local)
    }

    /// Text shown in a timetable cell.
    pub fn display_text(&self) -> &str {
        let summary = self.summary.trim();
        if summary.is_empty() {
            UNTITLED
        } else {
            summary
        }
    }
}
