//! Scoring a finished schedule attempt, and the per-worker report
//! supplementing the original spec's output (§9, grounded in
//! `examples/original_source/data_manager.py::get_worker_schedule`'s gap
//! analysis).

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::{Config, WorkerId};
use crate::data_manager::{ConstraintSkip, DataManager};
use crate::workload::{target_for, WorkerTarget};

/// Aggregate quality measure for one completed build attempt. Lower
/// `balance_score` and `violation_count`, higher `coverage`, is better;
/// `Scheduler` compares attempts with `Statistics::is_better_than`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub coverage: f64,
    pub balance_score: f64,
    pub violation_count: usize,
    pub filled_slots: usize,
    pub total_slots: usize,
}

impl Statistics {
    pub fn compute(config: &Config, dm: &DataManager, targets: &[WorkerTarget]) -> Self {
        let total_slots = dm.schedule.total_slots();
        let filled_slots = dm.schedule.filled_slots();
        let coverage = if total_slots == 0 { 1.0 } else { filled_slots as f64 / total_slots as f64 };

        let mut squared_deviation = 0.0;
        for w in &config.workers {
            let Some(target) = target_for(targets, &w.id) else { continue };
            let actual = dm.indexes.worker_assignments.get(&w.id).map(|s| s.len()).unwrap_or(0) as f64;
            let diff = actual - target.total as f64;
            squared_deviation += diff * diff;
        }
        let balance_score = if config.workers.is_empty() {
            0.0
        } else {
            (squared_deviation / config.workers.len() as f64).sqrt()
        };

        let violation_count = dm.constraint_skips.values().map(Vec::len).sum();

        Statistics { coverage, balance_score, violation_count, filled_slots, total_slots }
    }

    /// Coverage dominates (an unfilled post is worse than any imbalance),
    /// then fewer relaxations used, then tighter balance.
    pub fn is_better_than(&self, other: &Statistics) -> bool {
        if (self.coverage - other.coverage).abs() > f64::EPSILON {
            return self.coverage > other.coverage;
        }
        if self.violation_count != other.violation_count {
            return self.violation_count < other.violation_count;
        }
        self.balance_score < other.balance_score
    }
}

/// One worker's slice of the final schedule: their assigned dates, the
/// largest gap between consecutive assignments, and any constraint
/// relaxations that were required to place them.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: WorkerId,
    pub target: u32,
    pub actual: u32,
    pub assigned_dates: Vec<NaiveDate>,
    pub longest_gap_days: i64,
    pub skips: Vec<ConstraintSkip>,
}

pub fn build_worker_reports(
    config: &Config,
    dm: &DataManager,
    targets: &[WorkerTarget],
) -> HashMap<WorkerId, WorkerReport> {
    let mut reports = HashMap::new();
    for w in &config.workers {
        let mut dates: Vec<NaiveDate> =
            dm.indexes.worker_assignments.get(&w.id).cloned().unwrap_or_default().into_iter().collect();
        dates.sort();

        let longest_gap_days = dates
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .max()
            .unwrap_or(0);

        let target = target_for(targets, &w.id).map(|t| t.total).unwrap_or(0);
        reports.insert(
            w.id.clone(),
            WorkerReport {
                worker_id: w.id.clone(),
                target,
                actual: dates.len() as u32,
                longest_gap_days,
                skips: dm.constraint_skips.get(&w.id).cloned().unwrap_or_default(),
                assigned_dates: dates,
            },
        );
    }
    reports
}
