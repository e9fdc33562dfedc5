//! Calendar-interchange (iCalendar) text decoding.
//!
//! Only the subset a school timetable feed needs is understood: `VEVENT`
//! blocks with `DTSTART`, `DTEND`, `SUMMARY` and `LOCATION`. Anything the
//! decoder cannot make sense of is skipped, so a damaged feed yields fewer
//! events instead of an error.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use thiserror::Error;

use super::event::CalendarEvent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("timestamp '{0}' is too short")]
    TooShort(String),

    #[error("timestamp '{0}' has a non-numeric {1} component")]
    NotNumeric(String, &'static str),

    #[error("timestamp '{0}' is not a valid date or time")]
    OutOfRange(String),
}

/// Join folded lines back into logical lines.
///
/// Any of CRLF, CR or LF ends a physical line. A physical line starting with
/// a space or tab continues the previous logical line; the leading whitespace
/// character is dropped.
pub fn unfold(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = Vec::new();

    for raw in normalized.split('\n') {
        match (raw.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(rest), Some(previous)) => previous.push_str(rest),
            _ => lines.push(raw.to_string()),
        }
    }

    lines
}

/// Decode every complete `VEVENT` in `text`, sorted by start time.
pub fn parse_calendar(text: &str) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    // Components nested inside an event (VALARM and friends)
    let mut nested = 0usize;

    for line in unfold(text) {
        let line = line.trim_end();

        if line.eq_ignore_ascii_case("BEGIN:VEVENT") {
            current = Some(HashMap::new());
            nested = 0;
            continue;
        }

        if line.eq_ignore_ascii_case("END:VEVENT") {
            if let Some(props) = current.take() {
                if let Some(event) = build_event(&props) {
                    events.push(event);
                }
            }
            continue;
        }

        let Some(props) = current.as_mut() else {
            continue;
        };

        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        let name = name
            .split(';')
            .next()
            .unwrap_or(name)
            .trim()
            .to_ascii_uppercase();

        match name.as_str() {
            "BEGIN" => nested += 1,
            "END" => nested = nested.saturating_sub(1),
            _ if nested > 0 => {}
            _ => {
                props.insert(name, value.to_string());
            }
        }
    }

    events.sort_by_key(|event| event.start);
    events
}

fn build_event(props: &HashMap<String, String>) -> Option<CalendarEvent> {
    let (Some(raw_start), Some(raw_end)) = (props.get("DTSTART"), props.get("DTEND")) else {
        tracing::debug!("skipping event without DTSTART/DTEND");
        return None;
    };

    let decoded = decode_timestamp(raw_start)
        .and_then(|start| decode_timestamp(raw_end).map(|end| (start, end)));
    let (start, end) = match decoded {
        Ok(range) => range,
        Err(err) => {
            tracing::warn!(
                summary = props.get("SUMMARY").map(String::as_str).unwrap_or_default(),
                "dropping event: {err}"
            );
            return None;
        }
    };

    Some(CalendarEvent {
        summary: props.get("SUMMARY").map(|s| unescape(s)).unwrap_or_default(),
        start,
        end,
        location: props.get("LOCATION").map(|s| unescape(s)).unwrap_or_default(),
    })
}

/// Decode a `DATE` or `DATE-TIME` value.
///
/// Eight characters are an all-day date at UTC midnight. Longer values are
/// `YYYYMMDDTHHMMSS`, in UTC when suffixed with `Z` and in local time
/// otherwise. Time components missing from a short value count as zero.
pub fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    let raw = value.trim();
    if raw.len() < 8 {
        return Err(DecodeError::TooShort(raw.to_string()));
    }

    let (value, utc) = match raw.strip_suffix(['Z', 'z']) {
        Some(body) => (body, true),
        None => (raw, false),
    };

    let year = component(value, 0..4, "year")?;
    let month = component(value, 4..6, "month")?;
    let day = component(value, 6..8, "day")?;
    let out_of_range = || DecodeError::OutOfRange(raw.to_string());

    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(out_of_range)?;

    if value.len() == 8 {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(out_of_range)?;
        return Ok(midnight.and_utc());
    }

    let hour = component(value, 9..11, "hour")?;
    let minute = component(value, 11..13, "minute")?;
    let second = component(value, 13..15, "second")?;
    let naive = date
        .and_hms_opt(hour, minute, second)
        .ok_or_else(out_of_range)?;

    if utc {
        Ok(naive.and_utc())
    } else {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(out_of_range)
    }
}

/// Numeric field at `range`; absent (past the end of `value`) reads as zero.
fn component(
    value: &str,
    range: std::ops::Range<usize>,
    what: &'static str,
) -> Result<u32, DecodeError> {
    let end = range.end.min(value.len());
    if range.start >= end {
        return Ok(0);
    }

    let digits = value
        .get(range.start..end)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| DecodeError::NotNumeric(value.to_string(), what))?;

    digits
        .parse()
        .map_err(|_| DecodeError::NotNumeric(value.to_string(), what))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out.trim().to_string()
}
