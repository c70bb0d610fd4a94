use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const GENDER: &str = "Gender";
pub const YEAR: &str = "Year";
pub const AGE_GROUP: &str = "Age_Group";
pub const VEHICLE_TYPE: &str = "Vehicle_Type";
pub const DEATH_RATE: &str = "Death_Rate_per_100k";
pub const INJURY_RATE: &str = "Injury_Rate_per_100k";

/// Columns every dataset must carry, in the order they are reported when missing
pub const REQUIRED_COLUMNS: [&str; 6] = [
    GENDER,
    YEAR,
    AGE_GROUP,
    VEHICLE_TYPE,
    DEATH_RATE,
    INJURY_RATE,
];

/// One reported road-traffic observation
///
/// Rates are optional: an empty or `NaN` cell is kept as `None` so that the
/// averaging step can leave it out of the denominator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub gender: String,
    pub year: i32,
    pub age_group: String,
    pub vehicle_type: String,
    pub death_rate: Option<f64>,
    pub injury_rate: Option<f64>,
}

impl Record {
    pub fn rate(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Death => self.death_rate,
            Metric::Injury => self.injury_rate,
        }
    }
}

/// The two rate columns that get averaged
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    Death,
    Injury,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Death, Metric::Injury];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Death => "Death",
            Metric::Injury => "Injury",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Metric::Death => DEATH_RATE,
            Metric::Injury => INJURY_RATE,
        }
    }
}

/// The loaded CSV, one entry per data row
///
/// Read-only once loaded; filters borrow from it instead of copying it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    pub records: Vec<Record>,
}

impl RecordTable {
    pub fn new(records: Vec<Record>) -> Self {
        RecordTable { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Distinct gender labels, sorted; used to fill the filter dropdown
    pub fn genders(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.gender.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct years, ascending
    pub fn years(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.records.iter().map(|r| r.year).collect();
        set.into_iter().collect()
    }
}

impl FromIterator<Record> for RecordTable {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        RecordTable::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gender: &str, year: i32) -> Record {
        Record {
            gender: gender.to_string(),
            year,
            age_group: "18-25".to_string(),
            vehicle_type: "Car".to_string(),
            death_rate: Some(1.0),
            injury_rate: None,
        }
    }

    #[test]
    fn distinct_genders_and_years_are_sorted() {
        let table: RecordTable = vec![
            record("Male", 2021),
            record("Female", 2019),
            record("Male", 2019),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.genders(), vec!["Female", "Male"]);
        assert_eq!(table.years(), vec![2019, 2021]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn rate_lookup_by_metric() {
        let r = record("Male", 2020);
        assert_eq!(r.rate(Metric::Death), Some(1.0));
        assert_eq!(r.rate(Metric::Injury), None);
        assert_eq!(Metric::Injury.column(), INJURY_RATE);
    }
}
