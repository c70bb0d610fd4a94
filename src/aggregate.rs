//! Grouped means and counts over the record table
//!
//! Every function here is pure: the same table and filter always produce the
//! same four results. Missing rates are skipped, so they never count toward a
//! mean's denominator, and a group with no usable value reports `None`.

use crate::error::{DashboardError, Result};
use crate::record::{Metric, Record, RecordTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Dropdown value that disables a filter
pub const ALL: &str = "All";

/// Gender / year restriction applied before aggregation
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub gender: Option<String>,
    pub year: Option<YearSelection>,
}

/// A chosen year, or a value that names no year at all
///
/// An unrecognised value still filters: it matches nothing, the same way an
/// unknown gender does.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearSelection {
    Year(i32),
    Unrecognised(String),
}

impl YearSelection {
    fn parse(raw: &str) -> Self {
        raw.parse()
            .map(YearSelection::Year)
            .unwrap_or_else(|_| YearSelection::Unrecognised(raw.to_string()))
    }

    pub fn matches(&self, year: i32) -> bool {
        matches!(self, YearSelection::Year(y) if *y == year)
    }
}

impl fmt::Display for YearSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSelection::Year(y) => write!(f, "{}", y),
            YearSelection::Unrecognised(raw) => f.write_str(raw),
        }
    }
}

impl Filter {
    /// Build a filter from raw dropdown selections
    ///
    /// `"All"` or an empty string leave that dimension unfiltered.
    pub fn from_selection(gender: Option<&str>, year: Option<&str>) -> Self {
        let active = |v: &&str| !v.is_empty() && *v != ALL;
        Filter {
            gender: gender.map(str::trim).filter(active).map(str::to_string),
            year: year.map(str::trim).filter(active).map(YearSelection::parse),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.gender.as_ref().is_none_or(|g| *g == record.gender)
            && self.year.as_ref().is_none_or(|y| y.matches(record.year))
    }

    /// Borrow the rows that pass the filter; the source table is untouched
    pub fn apply<'a>(&self, table: &'a RecordTable) -> Vec<&'a Record> {
        table.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Running sum and count of the non-missing values seen for one metric
#[derive(Clone, Copy, Debug, Default)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RateAcc {
    death: MeanAcc,
    injury: MeanAcc,
}

impl RateAcc {
    fn push(&mut self, record: &Record) {
        self.death.push(record.rate(Metric::Death));
        self.injury.push(record.rate(Metric::Injury));
    }

    fn finish(&self) -> RateMeans {
        RateMeans {
            death: self.death.mean(),
            injury: self.injury.mean(),
        }
    }
}

/// Mean death and injury rate for one group
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RateMeans {
    pub death: Option<f64>,
    pub injury: Option<f64>,
}

impl RateMeans {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Death => self.death,
            Metric::Injury => self.injury,
        }
    }
}

fn grouped_means<'a, K, F>(records: &[&'a Record], key: F) -> BTreeMap<K, RateMeans>
where
    K: Ord,
    F: Fn(&'a Record) -> K,
{
    let mut groups: BTreeMap<K, RateAcc> = BTreeMap::new();
    for &record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(k, acc)| (k, acc.finish()))
        .collect()
}

/// Mean rates per gender, in gender name order
pub fn gender_averages(records: &[&Record]) -> BTreeMap<String, RateMeans> {
    grouped_means(records, |r| r.gender.clone())
}

/// Mean rates per year, ascending
pub fn yearly_averages(records: &[&Record]) -> BTreeMap<i32, RateMeans> {
    grouped_means(records, |r| r.year)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleCount {
    pub vehicle_type: String,
    pub count: usize,
}

/// Occurrences of each vehicle type, most frequent first
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleCounts {
    pub entries: Vec<VehicleCount>,
}

impl VehicleCounts {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn get(&self, vehicle_type: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.vehicle_type == vehicle_type)
            .map(|e| e.count)
    }

    /// Each type's share of the total as a percentage
    pub fn shares(&self) -> Vec<(String, f64)> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        self.entries
            .iter()
            .map(|e| {
                (
                    e.vehicle_type.clone(),
                    e.count as f64 * 100.0 / total as f64,
                )
            })
            .collect()
    }
}

pub fn vehicle_counts(records: &[&Record]) -> VehicleCounts {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.vehicle_type.as_str()).or_insert(0) += 1;
    }

    let mut entries: Vec<VehicleCount> = counts
        .into_iter()
        .map(|(vehicle_type, count)| VehicleCount {
            vehicle_type: vehicle_type.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.vehicle_type.cmp(&b.vehicle_type))
    });

    VehicleCounts { entries }
}

/// One age group with its per-gender means
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeGenderRow {
    pub age_group: String,
    pub by_gender: BTreeMap<String, RateMeans>,
}

/// Means by (age group, gender), pivoted so each age group is one row
///
/// A gender with no rows in an age group has no entry in that row; lookups
/// return `None` for it rather than zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeGenderTable {
    pub genders: Vec<String>,
    pub rows: Vec<AgeGenderRow>,
}

impl AgeGenderTable {
    /// Every (metric, gender) column, death columns first
    pub fn columns(&self) -> Vec<(Metric, &str)> {
        Metric::ALL
            .iter()
            .flat_map(|&m| self.genders.iter().map(move |g| (m, g.as_str())))
            .collect()
    }

    pub fn get(&self, age_group: &str, gender: &str, metric: Metric) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.age_group == age_group)
            .and_then(|row| row.by_gender.get(gender))
            .and_then(|means| means.get(metric))
    }
}

pub fn age_gender_averages(records: &[&Record]) -> AgeGenderTable {
    let pairs = grouped_means(records, |r| (r.age_group.clone(), r.gender.clone()));

    let genders: BTreeSet<String> = pairs.keys().map(|(_, g)| g.clone()).collect();

    let mut rows: Vec<AgeGenderRow> = Vec::new();
    for ((age_group, gender), means) in pairs {
        // Keys arrive sorted by age group, so a new group always starts a new row
        match rows.last_mut() {
            Some(row) if row.age_group == age_group => {
                row.by_gender.insert(gender, means);
            }
            _ => rows.push(AgeGenderRow {
                age_group,
                by_gender: BTreeMap::from([(gender, means)]),
            }),
        }
    }

    AgeGenderTable {
        genders: genders.into_iter().collect(),
        rows,
    }
}

/// The four derived tables for one render pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub filter: Filter,
    pub row_count: usize,
    pub gender: BTreeMap<String, RateMeans>,
    pub yearly: BTreeMap<i32, RateMeans>,
    pub vehicles: VehicleCounts,
    pub age_gender: AgeGenderTable,
}

impl Aggregates {
    /// Filter the table and compute all four aggregations
    ///
    /// # Errors
    /// * `EmptySelection` when no row survives the filter
    pub fn compute(table: &RecordTable, filter: &Filter) -> Result<Self> {
        let rows = filter.apply(table);
        if rows.is_empty() {
            return Err(DashboardError::EmptySelection);
        }

        Ok(Aggregates {
            filter: filter.clone(),
            row_count: rows.len(),
            gender: gender_averages(&rows),
            yearly: yearly_averages(&rows),
            vehicles: vehicle_counts(&rows),
            age_gender: age_gender_averages(&rows),
        })
    }
}
