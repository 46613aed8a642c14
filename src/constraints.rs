//! Admissibility checks for a candidate `(worker, date, post)` assignment,
//! and the three-level relaxation ladder described in §4.4. Grounded in
//! `examples/original_source/constraint_checker.py`: the gap rule, the
//! Friday/Monday rule, the 7/14-day weekday-repeat rule and the
//! consecutive-weekend cap are all ports of that module's checks, with the
//! incompatibility lookup rebuilt on `petgraph` instead of the original's
//! adjacency dict.

use chrono::{Datelike, Duration, NaiveDate};
use petgraph::graphmap::UnGraphMap;

use crate::config::{Config, Worker, WorkerId};
use crate::data_manager::DataManager;
use crate::date;

/// How strictly constraints are enforced. Level 0 is full enforcement;
/// each further level relaxes one more rule, in the fixed order the
/// builder escalates through when it cannot otherwise fill a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelaxationLevel {
    /// Gap, weekday-repeat, Friday/Monday, weekend cap and incompatibility
    /// all enforced.
    Strict,
    /// Friday/Monday rule relaxed: a Friday/Monday pair is allowed when
    /// the gap is exactly at the configured minimum.
    RelaxFridayMonday,
    /// Weekday-repeat rule (7/14-day spacing) relaxed as well.
    RelaxWeekdayRepeat,
}

impl RelaxationLevel {
    pub fn from_u8(level: u8) -> Self {
        match level {
            0 => RelaxationLevel::Strict,
            1 => RelaxationLevel::RelaxFridayMonday,
            _ => RelaxationLevel::RelaxWeekdayRepeat,
        }
    }
}

/// Why a candidate assignment was rejected. Never an `Error`: rejection is
/// ordinary control flow inside the builder's search, checked on every
/// candidate for every open post, so it carries no owned data and never
/// unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAvailable,
    AlreadyWorkingThatDay,
    GapTooSmall,
    FridayMondayPair,
    WeekdayRepeatTooSoon,
    WeekendCapExceeded,
    Incompatible,
    MaxShiftsReached,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::NotAvailable => "not_available",
            Rejection::AlreadyWorkingThatDay => "already_working_that_day",
            Rejection::GapTooSmall => "gap_too_small",
            Rejection::FridayMondayPair => "friday_monday_pair",
            Rejection::WeekdayRepeatTooSoon => "weekday_repeat_too_soon",
            Rejection::WeekendCapExceeded => "weekend_cap_exceeded",
            Rejection::Incompatible => "incompatible",
            Rejection::MaxShiftsReached => "max_shifts_reached",
        }
    }
}

/// Holds the incompatibility graph (an undirected edge per pair) so
/// `are_incompatible` is an O(1) edge lookup rather than a linear scan of
/// each worker's list.
pub struct ConstraintChecker<'c> {
    config: &'c Config,
    incompatibility: UnGraphMap<u32, ()>,
    id_to_node: std::collections::HashMap<WorkerId, u32>,
}

impl<'c> ConstraintChecker<'c> {
    pub fn new(config: &'c Config) -> Self {
        let mut graph = UnGraphMap::new();
        let mut id_to_node = std::collections::HashMap::new();
        for (i, w) in config.workers.iter().enumerate() {
            id_to_node.insert(w.id.clone(), graph.add_node(i as u32));
        }
        for w in &config.workers {
            let a = id_to_node[&w.id];
            for other in &w.incompatible_with {
                if let Some(&b) = id_to_node.get(other) {
                    graph.add_edge(a, b, ());
                }
            }
        }
        Self { config, incompatibility: graph, id_to_node }
    }

    pub fn are_incompatible(&self, a: &str, b: &str) -> bool {
        match (self.id_to_node.get(a), self.id_to_node.get(b)) {
            (Some(&na), Some(&nb)) => self.incompatibility.contains_edge(na, nb),
            _ => false,
        }
    }

    /// Every worker incompatible with `worker_id`.
    pub fn incompatible_with<'a>(&'a self, worker_id: &str) -> Vec<&'a WorkerId> {
        let Some(&node) = self.id_to_node.get(worker_id) else { return Vec::new() };
        self.incompatibility
            .neighbors(node)
            .map(|n| &self.config.workers[n as usize].id)
            .collect()
    }

    /// Full admissibility check at the given relaxation level. Returns the
    /// first violated rule, or `None` if the assignment is admissible.
    /// Not a `Result`: every open post checks every worker in the roster,
    /// so rejection is the common case, not an error.
    pub fn can_assign(
        &self,
        dm: &DataManager,
        worker: &Worker,
        date: NaiveDate,
        post: usize,
        level: RelaxationLevel,
    ) -> Option<Rejection> {
        if !worker.is_available_on(date) {
            return Some(Rejection::NotAvailable);
        }
        if dm.schedule.find_post(date, &worker.id).is_some() {
            return Some(Rejection::AlreadyWorkingThatDay);
        }
        if dm.schedule.worker_at(date, post).is_some() {
            return Some(Rejection::AlreadyWorkingThatDay);
        }

        let max_shifts = self.max_shifts_for(worker);
        let current_shifts = dm
            .indexes
            .worker_assignments
            .get(&worker.id)
            .map(|s| s.len())
            .unwrap_or(0);
        if current_shifts as i64 >= max_shifts {
            return Some(Rejection::MaxShiftsReached);
        }

        if let Some(r) = self.check_gap(dm, worker, date) {
            return Some(r);
        }

        if level < RelaxationLevel::RelaxFridayMonday {
            if let Some(r) = self.check_friday_monday(dm, worker, date) {
                return Some(r);
            }
        }

        if level < RelaxationLevel::RelaxWeekdayRepeat {
            if let Some(r) = self.check_weekday_repeat(dm, worker, date) {
                return Some(r);
            }
        }

        if let Some(r) = self.check_weekend_cap(dm, worker, date) {
            return Some(r);
        }
        self.check_incompatibility(dm, worker, date)
    }

    /// Derived `max_shifts_per_worker`: the worker's proportional target
    /// plus a configurable buffer, per §9's resolution of that open
    /// question.
    fn max_shifts_for(&self, worker: &Worker) -> i64 {
        let total_slots = self.config.total_slots() as f64;
        let total_percentage: f64 = self.config.workers.iter().map(|w| w.work_percentage).sum();
        let share = if total_percentage > 0.0 {
            total_slots * worker.work_percentage / total_percentage
        } else {
            0.0
        };
        share.ceil() as i64 + self.config.max_shifts_buffer
    }

    /// Part-time workers (`p < 70`) need one extra rest day beyond the
    /// configured minimum, per I3 — same part-time scaling pattern as
    /// `effective_weekend_cap`.
    fn check_gap(&self, dm: &DataManager, worker: &Worker, date: NaiveDate) -> Option<Rejection> {
        let required_gap = self.config.gap_between_shifts + if worker.is_part_time() { 1 } else { 0 };
        let dates = dm.indexes.worker_assignments.get(&worker.id)?;
        for other in dates {
            let gap = (date - *other).num_days().abs();
            if gap <= required_gap {
                return Some(Rejection::GapTooSmall);
            }
        }
        None
    }

    /// A Friday and the following Monday are treated as adjacent when the
    /// configured gap is small (`<= 1`), even though 3 calendar days
    /// separate them — working both means no real rest across the
    /// weekend.
    fn check_friday_monday(&self, dm: &DataManager, worker: &Worker, date: NaiveDate) -> Option<Rejection> {
        if self.config.gap_between_shifts > 1 {
            return None;
        }
        let dates = dm.indexes.worker_assignments.get(&worker.id)?;
        let weekday = date.weekday();
        if weekday == chrono::Weekday::Mon && dates.contains(&(date - Duration::days(3))) {
            return Some(Rejection::FridayMondayPair);
        }
        if weekday == chrono::Weekday::Fri && dates.contains(&(date + Duration::days(3))) {
            return Some(Rejection::FridayMondayPair);
        }
        None
    }

    /// Mon-Thu only: the same weekday must not repeat at exactly a 7- or
    /// 14-day offset (always landing the same worker on, say, every
    /// Tuesday). Fri/Sat/Sun are exempt — that's the weekend exception.
    fn check_weekday_repeat(&self, dm: &DataManager, worker: &Worker, date: NaiveDate) -> Option<Rejection> {
        let weekday = date.weekday();
        if !matches!(weekday, chrono::Weekday::Mon | chrono::Weekday::Tue | chrono::Weekday::Wed | chrono::Weekday::Thu)
        {
            return None;
        }
        let dates = dm.indexes.worker_assignments.get(&worker.id)?;
        for other in dates {
            let gap = (date - *other).num_days().abs();
            if (gap == 7 || gap == 14) && other.weekday() == weekday {
                return Some(Rejection::WeekdayRepeatTooSoon);
            }
        }
        None
    }

    /// A worker may not start more than `max_consecutive_weekends`
    /// weekend-like clusters in a row (clusters 5-10 days apart count as
    /// consecutive; see `date::weekend_start`).
    fn check_weekend_cap(&self, dm: &DataManager, worker: &Worker, date: NaiveDate) -> Option<Rejection> {
        if !date::is_weekend_like(date, &self.config.holidays) {
            return None;
        }
        let candidate_start = date::weekend_start(date, &self.config.holidays);
        let weekends = dm.indexes.worker_weekends.get(&worker.id)?;
        if weekends.contains(&candidate_start) {
            return None;
        }

        let mut all_starts = weekends.clone();
        all_starts.push(candidate_start);
        all_starts.sort();

        let idx = all_starts.iter().position(|d| *d == candidate_start).unwrap();
        let mut run = 1u32;
        let mut i = idx;
        while i > 0 {
            let gap = (all_starts[i] - all_starts[i - 1]).num_days();
            if (5..=10).contains(&gap) {
                run += 1;
                i -= 1;
            } else {
                break;
            }
        }
        let mut j = idx;
        while j + 1 < all_starts.len() {
            let gap = (all_starts[j + 1] - all_starts[j]).num_days();
            if (5..=10).contains(&gap) {
                run += 1;
                j += 1;
            } else {
                break;
            }
        }

        if run > self.effective_weekend_cap(worker) {
            return Some(Rejection::WeekendCapExceeded);
        }
        None
    }

    /// `max_consecutive_weekends` scaled down for part-time workers
    /// (`p < 70`), per the glossary's "effective cap". Never below 1.
    fn effective_weekend_cap(&self, worker: &Worker) -> u32 {
        if worker.is_part_time() {
            let scaled = (self.config.max_consecutive_weekends as f64 * worker.work_percentage / 100.0).round();
            (scaled as u32).max(1)
        } else {
            self.config.max_consecutive_weekends
        }
    }

    fn check_incompatibility(&self, dm: &DataManager, worker: &Worker, date: NaiveDate) -> Option<Rejection> {
        for other_id in dm.schedule.assigned_on(date) {
            if self.are_incompatible(&worker.id, other_id) {
                return Some(Rejection::Incompatible);
            }
        }
        None
    }
}
