use chrono::{DateTime, TimeZone, Timelike};

/// School-day template used when no slot list is configured.
pub const DEFAULT_SLOTS: [&str; 8] = [
    "8-9", "9-10", "10-11", "11-12", "12-13", "13-14", "14-15", "15-16",
];

pub fn default_slots() -> Vec<String> {
    DEFAULT_SLOTS.iter().map(|s| s.to_string()).collect()
}

/// Label of the one-hour slot starting at `hour`, e.g. `"9-10"`.
pub fn slot_label(hour: u32) -> String {
    format!("{}-{}", hour, hour + 1)
}

/// Map an event start onto one of the configured slot labels.
///
/// The start is rounded to the nearest hour (half past rounds up) and
/// clamped to 0..=23. If that label is not configured the raw hour and then
/// the hour after it are tried. `None` means the event has no place in the
/// grid.
pub fn slot_for<'a, Tz: TimeZone>(slots: &'a [String], start: &DateTime<Tz>) -> Option<&'a str> {
    let raw = start.hour();
    let rounded = if start.minute() >= 30 { raw + 1 } else { raw }.min(23);

    [rounded, raw, raw + 1]
        .into_iter()
        .map(slot_label)
        .find_map(|label| find(slots, &label))
}

/// The slot following `label` in configuration order.
pub fn next_slot<'a>(slots: &'a [String], label: &str) -> Option<&'a str> {
    let idx = slots.iter().position(|slot| slot == label)?;
    slots.get(idx + 1).map(String::as_str)
}

fn find<'a>(slots: &'a [String], label: &str) -> Option<&'a str> {
    slots.iter().find(|slot| *slot == label).map(String::as_str)
}
