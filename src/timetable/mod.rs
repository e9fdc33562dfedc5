//! Calendar feeds in, weekly timetable out.

pub mod event;
pub mod feed;
pub mod grid;
pub mod ics;
pub mod ingest;
pub mod slots;

pub use feed::HttpFeed;
pub use grid::{normalize, Weekday, WeeklyGrid};
pub use ingest::{IngestOptions, Ingestor, Refresh};
