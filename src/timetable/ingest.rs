//! Rebuilds the weekly timetable from each person's calendar feed.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, NaiveTime};
use futures::future::join_all;

use super::event::CalendarEvent;
use super::feed::{feed_request_url, FeedSource};
use super::grid::{normalize, Weekday, WeeklyGrid};
use super::ics::parse_calendar;
use super::slots::{next_slot, slot_for};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Length of the active window, counted from Monday.
    pub window_days: i64,
    /// Persons whose long lessons spill into the following slot.
    pub long_lesson: Vec<String>,
    pub continuation_threshold: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            window_days: 7,
            long_lesson: Vec::new(),
            continuation_threshold: Duration::minutes(70),
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            long_lesson: config.long_lesson.clone(),
            ..Self::default()
        }
    }

    fn is_long_lesson(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.long_lesson
            .iter()
            .any(|candidate| candidate.trim().to_lowercase() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub person: String,
    pub message: String,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub config: Config,
    pub failures: Vec<FeedFailure>,
    /// Events written into the grid, continuations not counted.
    pub placed: usize,
}

impl Refresh {
    /// Failures as one line, empty when every configured feed succeeded.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|failure| format!("{}: {}", failure.person, failure.message))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// First and last instant of the active window in local wall-clock time.
///
/// The window starts on the Monday of the ISO week containing `now`, so on
/// a weekend it still covers the week that is ending.
pub fn active_window(now: NaiveDateTime, days: i64) -> (NaiveDateTime, NaiveDateTime) {
    let since_monday = i64::from(now.weekday().num_days_from_monday());
    let monday = now.date() - Duration::days(since_monday);
    let last_day = monday + Duration::days(days.max(1) - 1);

    let start = monday.and_time(NaiveTime::MIN);
    let end = last_day.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN));
    (start, end)
}

pub struct Ingestor<S> {
    source: S,
    options: IngestOptions,
}

impl<S: FeedSource> Ingestor<S> {
    pub fn new(source: S, options: IngestOptions) -> Self {
        Self { source, options }
    }

    /// Fetch every configured feed and rebuild the timetable.
    ///
    /// The returned config always carries a normalised grid. A person whose
    /// feed fails keeps their previous column and is listed in `failures`;
    /// the other persons are unaffected.
    pub async fn refresh_all(&self, config: &Config, now: DateTime<Local>) -> Refresh {
        let base = normalize(config);
        let window = active_window(now.naive_local(), self.options.window_days);
        let mut grid = WeeklyGrid::empty(&base.slots, base.persons.len());

        let fetches = base.persons.iter().enumerate().filter_map(|(idx, person)| {
            let url = person.feed()?;
            let request = feed_request_url(url, person.proxy(base.feed_proxy.as_deref()));
            Some(async move { (idx, person, self.source.fetch(&request).await) })
        });

        let mut failures = Vec::new();
        let mut placed = 0;

        for (idx, person, result) in join_all(fetches).await {
            match result {
                Ok(text) => {
                    let events = parse_calendar(&text);
                    let count = self.place(&mut grid, &base.slots, idx, &person.name, &events, window);
                    tracing::info!(person = %person.name, parsed = events.len(), placed = count, "feed ingested");
                    placed += count;
                }
                Err(err) => {
                    tracing::warn!(person = %person.name, "feed failed: {err}");
                    grid.copy_column(&base.timetable, &base.slots, idx);
                    failures.push(FeedFailure {
                        person: person.name.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        for (day, slot, person, text) in base.overrides.filled() {
            if base.slots.iter().any(|s| s == slot) {
                grid.set(day, slot, person, text);
            }
        }

        let mut config = base;
        config.timetable = grid;

        Refresh {
            config,
            failures,
            placed,
        }
    }

    /// Write one person's events into their column; returns how many landed.
    fn place(
        &self,
        grid: &mut WeeklyGrid,
        slots: &[String],
        person: usize,
        name: &str,
        events: &[CalendarEvent],
        (from, to): (NaiveDateTime, NaiveDateTime),
    ) -> usize {
        let long_lesson = self.options.is_long_lesson(name);
        let mut placed = 0;

        for event in events {
            let start = event.local_start();
            let wall = start.naive_local();
            if wall < from || wall > to {
                continue;
            }

            let Some(day) = Weekday::of(&wall) else {
                continue;
            };

            let Some(slot) = slot_for(slots, &start) else {
                tracing::debug!(summary = %event.summary, start = %wall, "no slot for event");
                continue;
            };

            let text = event.display_text();
            grid.set(day, slot, person, text);
            placed += 1;

            if long_lesson && event.duration() >= self.options.continuation_threshold {
                if let Some(next) = next_slot(slots, slot) {
                    grid.set(day, next, person, text);
                }
            }
        }

        placed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::config::Person;
    use crate::timetable::feed::{FeedError, HttpFeed};

    /// Feeds served from memory; a missing URL answers 404.
    struct CannedFeeds(HashMap<String, Result<String, u16>>);

    impl FeedSource for CannedFeeds {
        fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FeedError>> + Send {
            let result = match self.0.get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(FeedError::Status(*status)),
                None => Err(FeedError::Status(404)),
            };
            async move { result }
        }
    }

    fn vevent(start: &str, end: &str, summary: &str) -> String {
        format!("BEGIN:VEVENT\nDTSTART:{start}\nDTEND:{end}\nSUMMARY:{summary}\nEND:VEVENT\n")
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn family(slots: &[&str]) -> Config {
        let mut config = Config::empty();
        config.persons = vec![
            Person::with_feed("Onerva", "https://feeds.example/onerva"),
            Person::with_feed("Nanni", "https://feeds.example/nanni"),
            Person::named("Elmeri"),
        ];
        config.slots = slots.iter().map(|s| s.to_string()).collect();
        config.long_lesson = vec!["onerva".to_string()];
        normalize(&config)
    }

    fn ingestor(feeds: &[(&str, Result<String, u16>)], config: &Config) -> Ingestor<CannedFeeds> {
        let feeds = feeds
            .iter()
            .map(|(url, body)| (url.to_string(), body.clone()))
            .collect();
        Ingestor::new(CannedFeeds(feeds), IngestOptions::from_config(config))
    }

    #[test]
    fn window_starts_on_monday_of_the_iso_week() {
        let at = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(15, 0, 0).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_time(NaiveTime::MIN);

        for day in [1, 3, 6, 7] {
            let (start, end) = active_window(at(day), 7);
            assert_eq!(start, monday);
            assert_eq!(
                end,
                NaiveDate::from_ymd_opt(2024, 1, 7)
                    .unwrap()
                    .and_hms_milli_opt(23, 59, 59, 999)
                    .unwrap()
            );
        }

        let (start, _) = active_window(at(8), 7);
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[tokio::test]
    async fn short_lesson_lands_in_its_own_slot_only() {
        let config = family(&["8-9", "9-10", "10-11"]);
        let blob = "BEGIN:VEVENT\nDTSTART:20240101T090000\nDTEND:20240101T095000\nSUMMARY:Matematiikka\nEND:VEVENT";
        let ingestor = ingestor(&[("https://feeds.example/onerva", Ok(blob.to_string()))], &config);

        let refresh = ingestor.refresh_all(&config, local(2024, 1, 3, 12, 0)).await;
        let grid = &refresh.config.timetable;

        assert_eq!(grid.row(Weekday::Monday, "9-10").unwrap(), &["Matematiikka", "", ""]);
        assert_eq!(grid.row(Weekday::Monday, "10-11").unwrap(), &["", "", ""]);
        assert_eq!(refresh.placed, 1);
    }

    #[tokio::test]
    async fn long_lesson_continues_into_next_slot_for_that_person_only() {
        let config = family(&["9-10", "10-11", "11-12", "12-13"]);
        let onerva = vevent("20240102T100000", "20240102T111000", "Kemia");
        let nanni = vevent("20240102T110000", "20240102T114500", "Musiikki")
            + &vevent("20240102T100000", "20240102T111500", "Historia");
        let ingestor = ingestor(
            &[
                ("https://feeds.example/onerva", Ok(onerva)),
                ("https://feeds.example/nanni", Ok(nanni)),
            ],
            &config,
        );

        let refresh = ingestor.refresh_all(&config, local(2024, 1, 2, 8, 0)).await;
        let grid = &refresh.config.timetable;

        assert_eq!(grid.cell(Weekday::Tuesday, "10-11", 0), "Kemia");
        assert_eq!(grid.cell(Weekday::Tuesday, "11-12", 0), "Kemia");
        assert_eq!(grid.cell(Weekday::Tuesday, "12-13", 0), "");
        // Nanni is not a long-lesson person: no spill-over despite 75 minutes
        assert_eq!(grid.cell(Weekday::Tuesday, "10-11", 1), "Historia");
        assert_eq!(grid.cell(Weekday::Tuesday, "11-12", 1), "Musiikki");
        assert_eq!(grid.cell(Weekday::Tuesday, "11-12", 2), "");
    }

    #[tokio::test]
    async fn events_outside_the_week_or_slots_are_dropped() {
        let config = family(&["8-9", "9-10"]);
        let blob = vevent("20231229T080000", "20231229T090000", "Last week")
            + &vevent("20240108T080000", "20240108T090000", "Next week")
            + &vevent("20240106T080000", "20240106T090000", "Saturday")
            + &vevent("20240103T170000", "20240103T180000", "Evening")
            + &vevent("20240103T080000", "20240103T090000", "");
        let ingestor = ingestor(&[("https://feeds.example/onerva", Ok(blob))], &config);

        let refresh = ingestor.refresh_all(&config, local(2024, 1, 3, 12, 0)).await;

        let filled: Vec<_> = refresh.config.timetable.filled().collect();
        assert_eq!(filled, vec![(Weekday::Wednesday, "8-9", 0, "(untitled)")]);
    }

    #[tokio::test]
    async fn overrides_win_for_their_exact_cell() {
        let mut config = family(&["8-9", "9-10"]);
        config.overrides.set(Weekday::Monday, "9-10", 1, "Retki");
        let nanni = vevent("20240101T090000", "20240101T100000", "Englanti")
            + &vevent("20240101T080000", "20240101T090000", "Ruotsi");
        let ingestor = ingestor(&[("https://feeds.example/nanni", Ok(nanni))], &config);

        let refresh = ingestor.refresh_all(&config, local(2024, 1, 1, 7, 0)).await;
        let grid = &refresh.config.timetable;

        assert_eq!(grid.cell(Weekday::Monday, "9-10", 1), "Retki");
        assert_eq!(grid.cell(Weekday::Monday, "8-9", 1), "Ruotsi");
        assert!(refresh.failures.len() == 1 && refresh.failures[0].person == "Onerva");
    }

    #[tokio::test]
    async fn failed_feed_keeps_previous_column() {
        let mut config = family(&["8-9"]);
        config.timetable.set(Weekday::Friday, "8-9", 0, "Fysiikka");
        let ingestor = ingestor(
            &[
                ("https://feeds.example/onerva", Err(503)),
                ("https://feeds.example/nanni", Ok(vevent("20240105T080000", "20240105T090000", "Kuvis"))),
            ],
            &config,
        );

        let refresh = ingestor.refresh_all(&config, local(2024, 1, 5, 7, 0)).await;

        assert_eq!(refresh.config.timetable.cell(Weekday::Friday, "8-9", 0), "Fysiikka");
        assert_eq!(refresh.config.timetable.cell(Weekday::Friday, "8-9", 1), "Kuvis");
        assert_eq!(refresh.summary(), "Onerva: HTTP 503");
    }

    #[tokio::test]
    async fn one_failing_feed_does_not_block_the_others() {
        let mut server = mockito::Server::new_async().await;
        let monday = server
            .mock("GET", "/onerva.ics")
            .with_status(200)
            .with_body(vevent("20240101T080000", "20240101T090000", "Biologia"))
            .create_async()
            .await;
        let broken = server
            .mock("GET", "/nanni.ics")
            .with_status(500)
            .create_async()
            .await;
        let tuesday = server
            .mock("GET", "/elmeri.ics")
            .with_status(200)
            .with_body(vevent("20240102T090000", "20240102T100000", "Liikunta"))
            .create_async()
            .await;

        let mut config = Config::empty();
        config.persons = ["Onerva", "Nanni", "Elmeri"]
            .into_iter()
            .map(|name| Person::with_feed(name, &format!("{}/{}.ics", server.url(), name.to_lowercase())))
            .collect();
        let config = normalize(&config);

        let ingestor = Ingestor::new(HttpFeed::new().unwrap(), IngestOptions::from_config(&config));
        let refresh = ingestor.refresh_all(&config, local(2024, 1, 3, 12, 0)).await;

        let grid = &refresh.config.timetable;
        assert_eq!(grid.cell(Weekday::Monday, "8-9", 0), "Biologia");
        assert_eq!(grid.cell(Weekday::Tuesday, "9-10", 2), "Liikunta");

        let summary = refresh.summary();
        assert!(summary.contains("Nanni"), "{summary}");
        assert!(!summary.contains("Onerva") && !summary.contains("Elmeri"), "{summary}");

        monday.assert_async().await;
        broken.assert_async().await;
        tuesday.assert_async().await;
    }

    #[tokio::test]
    async fn feeds_are_routed_through_the_proxy() {
        let mut server = mockito::Server::new_async().await;
        let proxied = server
            .mock("GET", "/proxy")
            .match_query(mockito::Matcher::UrlEncoded(
                "url".into(),
                "https://wilma.example/ical/onerva".into(),
            ))
            .with_status(200)
            .with_body(vevent("20240101T080000", "20240101T090000", "Kemia"))
            .create_async()
            .await;

        let mut config = Config::empty();
        config.persons = vec![Person::with_feed("Onerva", "https://wilma.example/ical/onerva")];
        config.feed_proxy = Some(format!("{}/proxy?url=", server.url()));
        let config = normalize(&config);

        let ingestor = Ingestor::new(HttpFeed::new().unwrap(), IngestOptions::from_config(&config));
        let refresh = ingestor.refresh_all(&config, local(2024, 1, 1, 7, 0)).await;

        assert!(refresh.failures.is_empty(), "{}", refresh.summary());
        assert_eq!(refresh.config.timetable.cell(Weekday::Monday, "8-9", 0), "Kemia");
        proxied.assert_async().await;
    }
}
