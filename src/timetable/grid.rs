use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::slots::{default_slots, DEFAULT_SLOTS};
use crate::config::{Config, Person};

/// Persons seeded into a configuration that has none.
pub const DEFAULT_PERSONS: [&str; 3] = ["Onerva", "Nanni", "Elmeri"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
        }
    }

    /// `None` on weekends.
    pub fn from_chrono(day: chrono::Weekday) -> Option<Self> {
        Self::ALL.get(day.num_days_from_monday() as usize).copied()
    }

    pub fn of<D: Datelike>(date: &D) -> Option<Self> {
        Self::from_chrono(date.weekday())
    }

    pub fn succ(self) -> Self {
        let idx = Self::ALL.iter().position(|d| *d == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn pred(self) -> Self {
        let idx = Self::ALL.iter().position(|d| *d == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<Weekday> for String {
    fn from(day: Weekday) -> Self {
        day.key().to_string()
    }
}

impl TryFrom<String> for Weekday {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|day| day.key().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown weekday '{value}'"))
    }
}

/// Weekday -> slot label -> one text per person, in person order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyGrid(BTreeMap<Weekday, BTreeMap<String, Vec<String>>>);

impl WeeklyGrid {
    /// A grid with an all-empty row for every weekday and slot.
    pub fn empty(slots: &[String], persons: usize) -> Self {
        let mut grid = Self::default();
        grid.repair(slots, persons);
        grid
    }

    pub fn cell(&self, day: Weekday, slot: &str, person: usize) -> &str {
        self.0
            .get(&day)
            .and_then(|slots| slots.get(slot))
            .and_then(|row| row.get(person))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set(&mut self, day: Weekday, slot: &str, person: usize, text: impl Into<String>) {
        let row = self
            .0
            .entry(day)
            .or_default()
            .entry(slot.to_string())
            .or_default();
        if row.len() <= person {
            row.resize(person + 1, String::new());
        }
        row[person] = text.into();
    }

    pub fn row(&self, day: Weekday, slot: &str) -> Option<&[String]> {
        self.0.get(&day)?.get(slot).map(Vec::as_slice)
    }

    /// Copy one person's column for every weekday and `slots` from `other`.
    pub fn copy_column(&mut self, other: &WeeklyGrid, slots: &[String], person: usize) {
        for day in Weekday::ALL {
            for slot in slots {
                self.set(day, slot, person, other.cell(day, slot, person));
            }
        }
    }

    /// Drop one person's column, shifting later persons left.
    pub fn remove_column(&mut self, person: usize) {
        for row in self.0.values_mut().flat_map(|slots| slots.values_mut()) {
            if person < row.len() {
                row.remove(person);
            }
        }
    }

    /// Carry override edits into an already merged timetable. Cells still
    /// showing an override that was cleared or changed are emptied, then the
    /// current overrides for `slots` are written.
    pub fn merge_override_edits(&mut self, before: &WeeklyGrid, after: &WeeklyGrid, slots: &[String]) {
        for (day, slot, person, text) in before.filled() {
            if after.cell(day, slot, person) != text && self.cell(day, slot, person) == text {
                self.set(day, slot, person, "");
            }
        }
        for (day, slot, person, text) in after.filled() {
            if slots.iter().any(|s| s == slot) {
                self.set(day, slot, person, text);
            }
        }
    }

    /// Every (weekday, slot, person, text) with non-blank text.
    pub fn filled(&self) -> impl Iterator<Item = (Weekday, &str, usize, &str)> {
        self.0.iter().flat_map(|(day, slots)| {
            slots.iter().flat_map(move |(slot, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, text)| !text.trim().is_empty())
                    .map(move |(person, text)| (*day, slot.as_str(), person, text.as_str()))
            })
        })
    }

    /// Ensure every weekday has a row for every slot, at least `persons` long.
    fn repair(&mut self, slots: &[String], persons: usize) {
        for day in Weekday::ALL {
            let day_slots = self.0.entry(day).or_default();
            for slot in slots {
                let row = day_slots.entry(slot.clone()).or_default();
                if row.len() < persons {
                    row.resize(persons, String::new());
                }
            }
        }
    }
}

/// Repair the structural invariants of `config`.
///
/// Idempotent: `normalize(&normalize(c)) == normalize(c)`. Rows longer than
/// the person count are left alone.
pub fn normalize(config: &Config) -> Config {
    let mut next = config.clone();

    if next.persons.is_empty() {
        next.persons = DEFAULT_PERSONS.iter().map(|name| Person::named(name)).collect();
    }
    next.slots = repair_slots(&next.slots);

    let persons = next.persons.len();
    next.timetable.repair(&next.slots, persons);
    next.overrides.repair(&next.slots, persons);

    next
}

fn repair_slots(slots: &[String]) -> Vec<String> {
    if slots.is_empty() {
        return default_slots();
    }

    let mut repaired: Vec<String> = Vec::with_capacity(slots.len());
    for (idx, label) in slots.iter().enumerate() {
        let label = match label.trim() {
            "" => DEFAULT_SLOTS
                .get(idx)
                .map(|s| s.to_string())
                .unwrap_or_else(|| idx.to_string()),
            trimmed => trimmed.to_string(),
        };
        if !repaired.contains(&label) {
            repaired.push(label);
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_config_gets_seed_persons_and_school_day() {
        let config = normalize(&Config::empty());

        let names: Vec<&str> = config.persons.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, DEFAULT_PERSONS);
        assert_eq!(config.slots, default_slots());
        for day in Weekday::ALL {
            for slot in &config.slots {
                assert_eq!(config.timetable.row(day, slot).map(<[String]>::len), Some(3));
                assert_eq!(config.overrides.row(day, slot).map(<[String]>::len), Some(3));
            }
        }
    }

    #[test]
    fn short_rows_are_padded_and_long_rows_kept() {
        let mut config = Config::empty();
        config.persons = vec![Person::named("A"), Person::named("B")];
        config.slots = vec!["8-9".into()];
        config.timetable.0.entry(Weekday::Monday).or_default().insert(
            "8-9".into(),
            vec!["Matikka".into()],
        );
        config.timetable.0.entry(Weekday::Tuesday).or_default().insert(
            "8-9".into(),
            vec!["a".into(), "b".into(), "c".into()],
        );

        let config = normalize(&config);
        assert_eq!(
            config.timetable.row(Weekday::Monday, "8-9").unwrap(),
            &["Matikka".to_string(), String::new()]
        );
        assert_eq!(config.timetable.row(Weekday::Tuesday, "8-9").unwrap().len(), 3);
    }

    #[test]
    fn blank_and_duplicate_slot_labels_are_repaired() {
        let labels: Vec<String> = vec!["8-9".into(), "".into(), "8-9".into(), " 12-13 ".into()];
        assert_eq!(repair_slots(&labels), vec!["8-9", "9-10", "12-13"]);
    }

    #[test]
    fn weekday_keys_round_trip_through_strings() {
        for day in Weekday::ALL {
            assert_eq!(Weekday::try_from(String::from(day)), Ok(day));
        }
        assert!(Weekday::try_from("saturday".to_string()).is_err());
        assert_eq!(Weekday::Friday.succ(), Weekday::Monday);
        assert_eq!(Weekday::Monday.pred(), Weekday::Friday);
        assert_eq!(Weekday::from_chrono(chrono::Weekday::Sun), None);
    }

    #[test]
    fn set_grows_short_rows() {
        let mut grid = WeeklyGrid::default();
        grid.set(Weekday::Wednesday, "9-10", 2, "Liikunta");
        assert_eq!(grid.cell(Weekday::Wednesday, "9-10", 2), "Liikunta");
        assert_eq!(grid.cell(Weekday::Wednesday, "9-10", 0), "");
        assert_eq!(grid.cell(Weekday::Thursday, "9-10", 2), "");
    }

    fn arb_config() -> impl Strategy<Value = Config> {
        let names = prop::collection::vec("[A-Za-z]{0,6}", 0..5);
        let slots = prop::collection::vec(prop::sample::select(vec!["", "8-9", "9-10", "x", " 10-11"]), 0..6);
        let rows = prop::collection::vec(
            (
                0usize..5,
                prop::sample::select(vec!["8-9", "9-10", "stale"]),
                prop::collection::vec("[a-z]{0,3}", 0..6),
            ),
            0..10,
        );

        (names, slots, rows).prop_map(|(names, slots, rows)| {
            let mut config = Config::empty();
            config.persons = names.iter().map(|n| Person::named(n)).collect();
            config.slots = slots.iter().map(|s| s.to_string()).collect();
            for (day, slot, row) in rows {
                config
                    .timetable
                    .0
                    .entry(Weekday::ALL[day])
                    .or_default()
                    .insert(slot.to_string(), row);
            }
            config
        })
    }

    #[test]
    fn removing_a_column_shifts_later_persons() {
        let mut grid = WeeklyGrid::empty(&default_slots(), 3);
        grid.set(Weekday::Wednesday, "10-11", 0, "Liikunta");
        grid.set(Weekday::Wednesday, "10-11", 2, "Kuvataide");

        grid.remove_column(1);
        assert_eq!(grid.row(Weekday::Wednesday, "10-11").unwrap(), &["Liikunta", "Kuvataide"]);

        grid.remove_column(5);
        assert_eq!(grid.row(Weekday::Monday, "8-9").unwrap().len(), 2);
    }

    #[test]
    fn override_edits_reach_the_merged_timetable() {
        let slots = default_slots();
        let mut before = WeeklyGrid::empty(&slots, 2);
        before.set(Weekday::Monday, "8-9", 0, "Kuoro");
        before.set(Weekday::Monday, "9-10", 1, "Sähly");

        let mut timetable = WeeklyGrid::empty(&slots, 2);
        timetable.set(Weekday::Monday, "8-9", 0, "Kuoro");
        timetable.set(Weekday::Monday, "9-10", 1, "Sähly");
        timetable.set(Weekday::Monday, "10-11", 1, "Kemia");

        let mut after = before.clone();
        after.set(Weekday::Monday, "8-9", 0, "");
        after.set(Weekday::Friday, "12-13", 1, "Hammaslääkäri");

        timetable.merge_override_edits(&before, &after, &slots);
        assert_eq!(timetable.cell(Weekday::Monday, "8-9", 0), "");
        assert_eq!(timetable.cell(Weekday::Monday, "9-10", 1), "Sähly");
        assert_eq!(timetable.cell(Weekday::Monday, "10-11", 1), "Kemia");
        assert_eq!(timetable.cell(Weekday::Friday, "12-13", 1), "Hammaslääkäri");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(config in arb_config()) {
            let once = normalize(&config);
            let twice = normalize(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalized_rows_cover_every_person(config in arb_config()) {
            let config = normalize(&config);
            let persons = config.persons.len();
            for day in Weekday::ALL {
                for slot in &config.slots {
                    let row = config.timetable.row(day, slot).unwrap();
                    prop_assert!(row.len() >= persons);
                }
            }
        }
    }
}
