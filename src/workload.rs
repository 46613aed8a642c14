//! Proportional target allocation. Grounded in
//! `examples/original_source/workload_calculator.py::calculate_targets`:
//! each worker's weight is `available_slots * (work_percentage/100)` —
//! not `work_percentage` alone — where `available_slots` counts only the
//! horizon days the worker's `work_periods`/`days_off` actually leave
//! open (lines 201-246). Floors are assigned first, then the largest
//! fractional remainders receive the leftover slots one at a time, then
//! `adjusted_target = max(0, target - mandatory_count)` (lines 318-336)
//! subtracts each worker's own mandatory days, since those are locked
//! separately before the target-driven fill ever runs.

use std::collections::HashMap;

use chrono::Datelike;

use crate::config::{Config, Worker, WorkerId};
use crate::date;

/// A worker's target shift count for the whole horizon, plus the monthly
/// breakdown supplementing it (§9 "weighted-proportional" resolution, and
/// the per-month targets from `original_source/data_manager.py::get_worker_schedule`).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerTarget {
    pub worker_id: WorkerId,
    pub total: u32,
    pub monthly: HashMap<(i32, u32), u32>,
}

pub struct WorkloadCalculator<'c> {
    config: &'c Config,
}

impl<'c> WorkloadCalculator<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// Largest-remainder allocation of `self.config.total_slots()` across
    /// all workers, weighted by `available_slots * (work_percentage/100)`
    /// (not `work_percentage` alone — a worker whose `work_periods`/
    /// `days_off` close off half the horizon gets half the weight a
    /// fully-available worker at the same percentage would), then reduced
    /// by each worker's own mandatory-day count.
    pub fn calculate_targets(&self) -> Vec<WorkerTarget> {
        let total_slots = self.config.total_slots();

        if self.config.workers.is_empty() {
            return Vec::new();
        }

        let weights: Vec<f64> = self
            .config
            .workers
            .iter()
            .map(|w| self.available_slots(w) as f64 * (w.work_percentage / 100.0))
            .collect();
        let total_weight: f64 = weights.iter().sum();

        let raw_totals = if total_weight <= 0.0 {
            vec![0u32; self.config.workers.len()]
        } else {
            let raw_shares: Vec<f64> =
                weights.iter().map(|w| total_slots as f64 * w / total_weight).collect();
            let floors: Vec<u32> = raw_shares.iter().map(|s| s.floor() as u32).collect();
            let assigned: u32 = floors.iter().sum();
            let remainder_slots = (total_slots as u32).saturating_sub(assigned);

            let mut remainders: Vec<(usize, f64)> =
                raw_shares.iter().enumerate().map(|(i, s)| (i, s.fract())).collect();
            remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

            let mut totals = floors;
            for (i, _) in remainders.into_iter().take(remainder_slots as usize) {
                totals[i] += 1;
            }
            totals
        };

        self.config
            .workers
            .iter()
            .zip(raw_totals)
            .map(|(w, raw_total)| {
                let adjusted = raw_total.saturating_sub(w.mandatory_days.len() as u32);
                WorkerTarget {
                    worker_id: w.id.clone(),
                    total: adjusted,
                    monthly: self.monthly_targets(adjusted),
                }
            })
            .collect()
    }

    /// Count of horizon days `worker` is actually available on, per
    /// `Worker::is_available_on` (honoring `work_periods`/`days_off`).
    fn available_slots(&self, worker: &Worker) -> usize {
        date::iter_days(self.config.start_date, self.config.end_date)
            .filter(|d| worker.is_available_on(*d))
            .count()
    }

    /// Split a total target across the calendar months the horizon spans,
    /// weighted by how many of the horizon's days fall in each month
    /// (same largest-remainder method, one dimension down).
    fn monthly_targets(&self, total: u32) -> HashMap<(i32, u32), u32> {
        let mut days_per_month: HashMap<(i32, u32), u32> = HashMap::new();
        for d in date::iter_days(self.config.start_date, self.config.end_date) {
            *days_per_month.entry((d.year(), d.month())).or_insert(0) += 1;
        }
        let total_days: u32 = days_per_month.values().sum();
        if total_days == 0 {
            return HashMap::new();
        }

        let mut keys: Vec<(i32, u32)> = days_per_month.keys().copied().collect();
        keys.sort();

        let shares: Vec<f64> = keys.iter().map(|k| total as f64 * days_per_month[k] as f64 / total_days as f64).collect();
        let floors: Vec<u32> = shares.iter().map(|s| s.floor() as u32).collect();
        let assigned: u32 = floors.iter().sum();
        let remainder_slots = total.saturating_sub(assigned);

        let mut remainders: Vec<(usize, f64)> = shares.iter().enumerate().map(|(i, s)| (i, s.fract())).collect();
        remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let mut monthly = floors;
        for (i, _) in remainders.into_iter().take(remainder_slots as usize) {
            monthly[i] += 1;
        }

        keys.into_iter().zip(monthly).collect()
    }
}

/// Helper kept for tests and reporting: the target for a single worker by
/// id, or `None` if unknown.
pub fn target_for<'a>(targets: &'a [WorkerTarget], worker_id: &str) -> Option<&'a WorkerTarget> {
    targets.iter().find(|t| t.worker_id == worker_id)
}
