//! Configuration input types and normalization. A `Config` is the
//! structured, named-field input described in spec §6: parsed once at
//! ingestion, never re-parsed at hot paths (worker date ranges are
//! resolved into `Vec<(NaiveDate, NaiveDate)>` here, not re-parsed from
//! strings during scheduling).

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date;
use crate::error::ConfigError;

pub type WorkerId = String;

const DEFAULT_GAP: i64 = 3;
const DEFAULT_MAX_CONSECUTIVE_WEEKENDS: u32 = 3;
const DEFAULT_WORK_PERCENTAGE: f64 = 100.0;
/// Buffer added on top of a worker's target shifts to derive
/// `max_shifts_per_worker`, per §9: "derived, configurable but with a
/// sane default".
const DEFAULT_MAX_SHIFTS_BUFFER: i64 = 5;

/// Raw, wire-format worker record — one entry of `workers_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub id: WorkerId,
    #[serde(default = "default_percentage")]
    pub work_percentage: f64,
    #[serde(default)]
    pub work_periods: String,
    #[serde(default)]
    pub days_off: String,
    #[serde(default)]
    pub mandatory_days: String,
    #[serde(default)]
    pub incompatible_with: Vec<WorkerId>,
}

fn default_percentage() -> f64 {
    DEFAULT_WORK_PERCENTAGE
}

/// An interval during which `num_shifts` is overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableShifts {
    pub start: String,
    pub end: String,
    pub shifts: usize,
}

/// Raw, wire-format configuration — mirrors spec §6 exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    pub start_date: String,
    pub end_date: String,
    pub num_shifts: usize,
    #[serde(default)]
    pub variable_shifts: Vec<VariableShifts>,
    #[serde(default = "default_gap")]
    pub gap_between_shifts: i64,
    #[serde(default = "default_max_weekends")]
    pub max_consecutive_weekends: u32,
    #[serde(default)]
    pub holidays: Vec<String>,
    pub workers_data: Vec<WorkerConfig>,
    #[serde(default = "default_min_coverage")]
    pub min_coverage_threshold: f64,
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default = "default_improvement_iterations")]
    pub max_improvement_iterations: usize,
}

fn default_gap() -> i64 {
    DEFAULT_GAP
}
fn default_max_weekends() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_WEEKENDS
}
fn default_min_coverage() -> f64 {
    0.95
}
fn default_restarts() -> usize {
    5
}
fn default_improvement_iterations() -> usize {
    70
}

/// Fully resolved worker record: date ranges parsed once, incompatibility
/// checked against the roster, mandatory days resolved and sorted.
#[derive(Debug, Clone)]
pub struct Worker {
    pub id: WorkerId,
    pub work_percentage: f64,
    pub work_periods: Vec<(NaiveDate, NaiveDate)>,
    pub days_off: Vec<(NaiveDate, NaiveDate)>,
    pub mandatory_days: Vec<NaiveDate>,
    pub incompatible_with: HashSet<WorkerId>,
}

impl Worker {
    pub fn is_part_time(&self) -> bool {
        self.work_percentage < 70.0
    }

    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        let in_period = if self.work_periods.is_empty() {
            true
        } else {
            self.work_periods.iter().any(|(s, e)| *s <= date && date <= *e)
        };
        let off = self.days_off.iter().any(|(s, e)| *s <= date && date <= *e);
        in_period && !off
    }

    pub fn is_mandatory_on(&self, date: NaiveDate) -> bool {
        self.mandatory_days.contains(&date)
    }
}

/// Fully resolved configuration, ready for the scheduler.
#[derive(Debug, Clone)]
pub struct Config {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_shifts: usize,
    pub variable_shifts: Vec<(NaiveDate, NaiveDate, usize)>,
    pub gap_between_shifts: i64,
    pub max_consecutive_weekends: u32,
    pub holidays: HashSet<NaiveDate>,
    pub workers: Vec<Worker>,
    pub min_coverage_threshold: f64,
    pub restarts: usize,
    pub max_improvement_iterations: usize,
    pub max_shifts_buffer: i64,
}

impl Config {
    /// Number of posts scheduled on `date`, honoring `variable_shifts`
    /// overrides.
    pub fn shifts_for_date(&self, date: NaiveDate) -> usize {
        for (start, end, shifts) in &self.variable_shifts {
            if *start <= date && date <= *end {
                return *shifts;
            }
        }
        self.num_shifts
    }

    pub fn worker(&self, id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn total_slots(&self) -> usize {
        date::iter_days(self.start_date, self.end_date)
            .map(|d| self.shifts_for_date(d))
            .sum()
    }
}

/// Parse and validate a `RawConfig`, producing a fully resolved `Config`.
/// Raises `ConfigError` synchronously; never partially constructs a
/// `Config` on failure.
pub fn build_config(raw: RawConfig) -> Result<Config, ConfigError> {
    let start_date = parse_date_field(&raw.start_date)?;
    let end_date = parse_date_field(&raw.end_date)?;
    if start_date > end_date {
        return Err(ConfigError::InvalidDateRange {
            start: raw.start_date.clone(),
            end: raw.end_date.clone(),
        });
    }

    if raw.num_shifts == 0 {
        return Err(ConfigError::ZeroShiftsForDate(raw.start_date.clone()));
    }

    if raw.gap_between_shifts < 0 {
        return Err(ConfigError::NegativeGap(raw.gap_between_shifts));
    }

    if raw.workers_data.is_empty() {
        return Err(ConfigError::NoWorkers);
    }

    let mut seen_ids = HashSet::with_capacity(raw.workers_data.len());
    for w in &raw.workers_data {
        if !seen_ids.insert(w.id.clone()) {
            return Err(ConfigError::DuplicateWorkerId(w.id.clone()));
        }
        if !(w.work_percentage > 0.0 && w.work_percentage <= 100.0) {
            return Err(ConfigError::InvalidPercentage {
                worker_id: w.id.clone(),
                percentage: w.work_percentage,
            });
        }
    }

    let known_ids: HashSet<&str> = raw.workers_data.iter().map(|w| w.id.as_str()).collect();
    for w in &raw.workers_data {
        for other in &w.incompatible_with {
            if !known_ids.contains(other.as_str()) {
                return Err(ConfigError::UnknownIncompatibleWorker {
                    worker_id: w.id.clone(),
                    unknown: other.clone(),
                });
            }
        }
    }

    let holidays: HashSet<NaiveDate> = raw
        .holidays
        .iter()
        .map(|s| parse_date_field(s))
        .collect::<Result<_, _>>()?;

    let mut variable_shifts = Vec::with_capacity(raw.variable_shifts.len());
    for vs in &raw.variable_shifts {
        let start = parse_date_field(&vs.start)?;
        let end = parse_date_field(&vs.end)?;
        if vs.shifts == 0 {
            return Err(ConfigError::ZeroShiftsForDate(vs.start.clone()));
        }
        variable_shifts.push((start, end, vs.shifts));
    }

    let mut workers = Vec::with_capacity(raw.workers_data.len());
    for wc in &raw.workers_data {
        let work_periods = date::parse_ranges(&wc.work_periods);
        let days_off = date::parse_ranges(&wc.days_off);
        let mut mandatory_days = date::parse_dates(&wc.mandatory_days);
        mandatory_days.sort();
        mandatory_days.dedup();
        workers.push(Worker {
            id: wc.id.clone(),
            work_percentage: wc.work_percentage,
            work_periods,
            days_off,
            mandatory_days,
            incompatible_with: wc.incompatible_with.iter().cloned().collect(),
        });
    }

    Ok(Config {
        start_date,
        end_date,
        num_shifts: raw.num_shifts,
        variable_shifts,
        gap_between_shifts: raw.gap_between_shifts,
        max_consecutive_weekends: raw.max_consecutive_weekends,
        holidays,
        workers,
        min_coverage_threshold: raw.min_coverage_threshold,
        restarts: raw.restarts.max(1),
        max_improvement_iterations: raw.max_improvement_iterations,
        max_shifts_buffer: DEFAULT_MAX_SHIFTS_BUFFER,
    })
}

fn parse_date_field(s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y").map_err(|_| ConfigError::MalformedDate(s.to_string()))
}

/// Worker lookup by id, built once per run for O(1) access in hot loops.
pub type WorkerIndex = HashMap<WorkerId, usize>;

pub fn index_workers(workers: &[Worker]) -> WorkerIndex {
    workers.iter().enumerate().map(|(i, w)| (w.id.clone(), i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RawConfig {
        RawConfig {
            start_date: "01-01-2024".to_string(),
            end_date: "31-01-2024".to_string(),
            num_shifts: 1,
            variable_shifts: vec![],
            gap_between_shifts: 3,
            max_consecutive_weekends: 3,
            holidays: vec![],
            workers_data: vec![WorkerConfig {
                id: "W1".to_string(),
                work_percentage: 100.0,
                work_periods: String::new(),
                days_off: String::new(),
                mandatory_days: String::new(),
                incompatible_with: vec![],
            }],
            min_coverage_threshold: 0.95,
            restarts: 5,
            max_improvement_iterations: 70,
        }
    }

    #[test]
    fn builds_valid_config() {
        let cfg = build_config(base_raw()).unwrap();
        assert_eq!(cfg.workers.len(), 1);
        assert_eq!(cfg.num_shifts, 1);
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut raw = base_raw();
        raw.start_date = "31-01-2024".to_string();
        raw.end_date = "01-01-2024".to_string();
        assert!(matches!(build_config(raw), Err(ConfigError::InvalidDateRange { .. })));
    }

    #[test]
    fn rejects_invalid_percentage() {
        let mut raw = base_raw();
        raw.workers_data[0].work_percentage = 0.0;
        assert!(matches!(build_config(raw), Err(ConfigError::InvalidPercentage { .. })));
    }

    #[test]
    fn rejects_unknown_incompatible_worker() {
        let mut raw = base_raw();
        raw.workers_data[0].incompatible_with.push("ghost".to_string());
        assert!(matches!(
            build_config(raw),
            Err(ConfigError::UnknownIncompatibleWorker { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_worker_ids() {
        let mut raw = base_raw();
        raw.workers_data.push(raw.workers_data[0].clone());
        assert!(matches!(build_config(raw), Err(ConfigError::DuplicateWorkerId(_))));
    }
}
