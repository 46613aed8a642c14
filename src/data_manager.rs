//! The schedule itself, its five tracking indexes (§3), and `DataManager`,
//! the only component allowed to mutate them. `assign`/`unassign` keep the
//! indexes atomically in sync; `verify_consistency`/`repair` are the
//! safety net described in §4.5 and grounded in
//! `examples/original_source/data_manager.py::_ensure_data_integrity`
//! (schedule wins over the derived indexes whenever the two disagree).

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::config::{Config, WorkerId};
use crate::date;

/// `schedule[date]` is an ordered vector of post slots; `None` means
/// unassigned.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    days: BTreeMap<NaiveDate, Vec<Option<WorkerId>>>,
}

impl Schedule {
    pub fn new(config: &Config) -> Self {
        let mut days = BTreeMap::new();
        for date in date::iter_days(config.start_date, config.end_date) {
            days.insert(date, vec![None; config.shifts_for_date(date)]);
        }
        Self { days }
    }

    pub fn slots(&self, date: NaiveDate) -> Option<&[Option<WorkerId>]> {
        self.days.get(&date).map(|v| v.as_slice())
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    pub fn worker_at(&self, date: NaiveDate, post: usize) -> Option<&WorkerId> {
        self.days.get(&date).and_then(|v| v.get(post)).and_then(|s| s.as_ref())
    }

    pub fn find_post(&self, date: NaiveDate, worker_id: &str) -> Option<usize> {
        self.days
            .get(&date)
            .and_then(|v| v.iter().position(|s| s.as_deref() == Some(worker_id)))
    }

    pub fn assigned_on(&self, date: NaiveDate) -> impl Iterator<Item = &WorkerId> {
        self.days
            .get(&date)
            .into_iter()
            .flat_map(|slots| slots.iter().filter_map(|s| s.as_ref()))
    }

    pub fn filled_count(&self, date: NaiveDate) -> usize {
        self.assigned_on(date).count()
    }

    pub fn total_slots(&self) -> usize {
        self.days.values().map(|v| v.len()).sum()
    }

    pub fn filled_slots(&self) -> usize {
        self.days.values().flatten().filter(|s| s.is_some()).count()
    }

    pub fn empty_slots(&self) -> Vec<(NaiveDate, usize)> {
        let mut out = Vec::new();
        for (date, slots) in &self.days {
            for (post, slot) in slots.iter().enumerate() {
                if slot.is_none() {
                    out.push((*date, post));
                }
            }
        }
        out
    }
}

/// Per-worker tracking indexes, materialized views of the schedule.
#[derive(Debug, Clone, Default)]
pub struct Indexes {
    pub worker_assignments: HashMap<WorkerId, HashSet<NaiveDate>>,
    pub worker_posts: HashMap<WorkerId, HashSet<usize>>,
    pub worker_weekdays: HashMap<WorkerId, [u32; 7]>,
    pub worker_weekends: HashMap<WorkerId, Vec<NaiveDate>>,
    pub post_worker_counts: HashMap<usize, HashMap<WorkerId, u32>>,
}

impl Indexes {
    fn assignments_of<'a>(&'a self, worker_id: &str) -> impl Iterator<Item = &'a NaiveDate> {
        self.worker_assignments.get(worker_id).into_iter().flatten()
    }
}

/// One recorded relaxation: a constraint that was loosened or skipped to
/// complete an assignment, kept for the audit trail surfaced in
/// `report::WorkerReport`.
#[derive(Debug, Clone)]
pub struct ConstraintSkip {
    pub date: NaiveDate,
    pub kind: String,
    pub other_worker: Option<WorkerId>,
}

/// The four drift classes `verify_consistency` can find.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    pub schedule_without_index: Vec<(WorkerId, NaiveDate)>,
    pub index_without_schedule: Vec<(WorkerId, NaiveDate)>,
    pub weekend_out_of_sync: Vec<WorkerId>,
    pub weekday_out_of_sync: Vec<WorkerId>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.schedule_without_index.is_empty()
            && self.index_without_schedule.is_empty()
            && self.weekend_out_of_sync.is_empty()
            && self.weekday_out_of_sync.is_empty()
    }
}

/// Owns the schedule and its indexes; the sole mutation surface.
pub struct DataManager<'c> {
    pub config: &'c Config,
    pub schedule: Schedule,
    pub indexes: Indexes,
    pub locked: HashSet<(NaiveDate, WorkerId)>,
    pub constraint_skips: HashMap<WorkerId, Vec<ConstraintSkip>>,
}

impl<'c> DataManager<'c> {
    pub fn new(config: &'c Config) -> Self {
        let mut indexes = Indexes::default();
        for w in &config.workers {
            indexes.worker_assignments.insert(w.id.clone(), HashSet::new());
            indexes.worker_posts.insert(w.id.clone(), HashSet::new());
            indexes.worker_weekdays.insert(w.id.clone(), [0; 7]);
            indexes.worker_weekends.insert(w.id.clone(), Vec::new());
        }
        for post in 0..config.num_shifts {
            indexes.post_worker_counts.insert(post, HashMap::new());
        }
        Self {
            config,
            schedule: Schedule::new(config),
            indexes,
            locked: HashSet::new(),
            constraint_skips: HashMap::new(),
        }
    }

    /// Assign `worker_id` to `(date, post)`. Fails (returns `false`,
    /// leaving state untouched) if the slot is already occupied or out of
    /// range. Does not itself check admissibility — callers go through
    /// `ConstraintChecker::can_assign` first.
    pub fn assign(&mut self, worker_id: &str, date: NaiveDate, post: usize) -> bool {
        let slots = match self.schedule.days.get_mut(&date) {
            Some(s) => s,
            None => return false,
        };
        match slots.get_mut(post) {
            Some(slot @ None) => *slot = Some(worker_id.to_string()),
            _ => return false,
        }

        self.indexes
            .worker_assignments
            .entry(worker_id.to_string())
            .or_default()
            .insert(date);
        self.indexes
            .worker_posts
            .entry(worker_id.to_string())
            .or_default()
            .insert(post);
        let weekday = date::effective_weekday(date, &self.config.holidays) as usize;
        self.indexes
            .worker_weekdays
            .entry(worker_id.to_string())
            .or_insert([0; 7])[weekday] += 1;
        if date::is_weekend_like(date, &self.config.holidays) {
            let start = date::weekend_start(date, &self.config.holidays);
            let weekends = self.indexes.worker_weekends.entry(worker_id.to_string()).or_default();
            if !weekends.contains(&start) {
                weekends.push(start);
                weekends.sort();
            }
        }
        *self
            .indexes
            .post_worker_counts
            .entry(post)
            .or_default()
            .entry(worker_id.to_string())
            .or_insert(0) += 1;
        true
    }

    pub fn assign_locked(&mut self, worker_id: &str, date: NaiveDate, post: usize) -> bool {
        if self.assign(worker_id, date, post) {
            self.locked.insert((date, worker_id.to_string()));
            true
        } else {
            false
        }
    }

    pub fn is_locked(&self, date: NaiveDate, worker_id: &str) -> bool {
        self.locked.contains(&(date, worker_id.to_string()))
    }

    /// Remove whichever worker occupies `(date, post)`, if any and if not
    /// locked (mandatory). Returns `true` if something was removed.
    pub fn unassign(&mut self, date: NaiveDate, post: usize) -> bool {
        let worker_id = match self.schedule.worker_at(date, post) {
            Some(w) => w.clone(),
            None => return false,
        };
        if self.is_locked(date, &worker_id) {
            return false;
        }
        self.force_unassign(&worker_id, date, post)
    }

    /// Like `unassign` but bypasses the lock check — used only by repair.
    fn force_unassign(&mut self, worker_id: &str, date: NaiveDate, post: usize) -> bool {
        if let Some(slots) = self.schedule.days.get_mut(&date) {
            if let Some(slot) = slots.get_mut(post) {
                if slot.as_deref() == Some(worker_id) {
                    *slot = None;
                } else {
                    return false;
                }
            } else {
                return false;
            }
        } else {
            return false;
        }

        if let Some(dates) = self.indexes.worker_assignments.get_mut(worker_id) {
            dates.remove(&date);
        }
        let weekday = date::effective_weekday(date, &self.config.holidays) as usize;
        if let Some(counts) = self.indexes.worker_weekdays.get_mut(worker_id) {
            counts[weekday] = counts[weekday].saturating_sub(1);
        }
        if date::is_weekend_like(date, &self.config.holidays) {
            let start = date::weekend_start(date, &self.config.holidays);
            if let Some(weekends) = self.indexes.worker_weekends.get_mut(worker_id) {
                weekends.retain(|d| *d != start);
            }
        }
        if let Some(counts) = self.indexes.post_worker_counts.get_mut(&post) {
            if let Some(c) = counts.get_mut(worker_id) {
                *c = c.saturating_sub(1);
            }
        }
        // worker_posts is recomputed lazily from current post counts rather
        // than decremented eagerly, since a worker may still hold the same
        // post elsewhere — recompute it here for correctness.
        self.recompute_worker_posts(worker_id);
        true
    }

    fn recompute_worker_posts(&mut self, worker_id: &str) {
        let mut posts = HashSet::new();
        for date in self.schedule.dates().copied().collect::<Vec<_>>() {
            if let Some(p) = self.schedule.find_post(date, worker_id) {
                posts.insert(p);
            }
        }
        self.indexes.worker_posts.insert(worker_id.to_string(), posts);
    }

    /// Move a worker's assignment from `(from_date, from_post)` to
    /// `(to_date, to_post)` as a single logical step. Fails if the source
    /// is locked or empty, or the destination is occupied.
    pub fn swap(
        &mut self,
        from_date: NaiveDate,
        from_post: usize,
        to_date: NaiveDate,
        to_post: usize,
    ) -> bool {
        let worker_id = match self.schedule.worker_at(from_date, from_post) {
            Some(w) => w.clone(),
            None => return false,
        };
        if self.is_locked(from_date, &worker_id) {
            return false;
        }
        if self.schedule.worker_at(to_date, to_post).is_some() {
            return false;
        }
        self.force_unassign(&worker_id, from_date, from_post);
        self.assign(&worker_id, to_date, to_post)
    }

    pub fn record_skip(&mut self, worker_id: &str, date: NaiveDate, kind: &str, other: Option<&str>) {
        self.constraint_skips
            .entry(worker_id.to_string())
            .or_default()
            .push(ConstraintSkip {
                date,
                kind: kind.to_string(),
                other_worker: other.map(str::to_string),
            });
    }

    /// Find the four classes of drift between `schedule` and the derived
    /// indexes, without modifying anything.
    pub fn verify_consistency(&self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();

        for (worker_id, dates) in &self.indexes.worker_assignments {
            for date in dates {
                let present = self
                    .schedule
                    .slots(*date)
                    .map(|slots| slots.iter().any(|s| s.as_deref() == Some(worker_id.as_str())))
                    .unwrap_or(false);
                if !present {
                    report.index_without_schedule.push((worker_id.clone(), *date));
                }
            }
        }

        for date in self.schedule.dates().copied().collect::<Vec<_>>() {
            for worker_id in self.schedule.assigned_on(date).cloned().collect::<Vec<_>>() {
                let present = self
                    .indexes
                    .worker_assignments
                    .get(&worker_id)
                    .map(|dates| dates.contains(&date))
                    .unwrap_or(false);
                if !present {
                    report.schedule_without_index.push((worker_id.clone(), date));
                }
            }
        }

        for w in &self.config.workers {
            let mut expected_weekends: Vec<NaiveDate> = self
                .indexes
                .assignments_of(&w.id)
                .filter(|d| date::is_weekend_like(**d, &self.config.holidays))
                .map(|d| date::weekend_start(*d, &self.config.holidays))
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            expected_weekends.sort();
            let actual = self.indexes.worker_weekends.get(&w.id).cloned().unwrap_or_default();
            let mut actual_sorted = actual;
            actual_sorted.sort();
            if actual_sorted != expected_weekends {
                report.weekend_out_of_sync.push(w.id.clone());
            }

            let mut expected_weekdays = [0u32; 7];
            for d in self.indexes.assignments_of(&w.id) {
                expected_weekdays[date::effective_weekday(*d, &self.config.holidays) as usize] += 1;
            }
            let actual_weekdays = self.indexes.worker_weekdays.get(&w.id).copied().unwrap_or([0; 7]);
            if actual_weekdays != expected_weekdays {
                report.weekday_out_of_sync.push(w.id.clone());
            }
        }

        report
    }

    /// Rebuild every index from `schedule`, treating it as ground truth.
    /// Logs a warning for each drift class it fixes.
    pub fn repair(&mut self) -> ConsistencyReport {
        let report = self.verify_consistency();
        if report.is_clean() {
            return report;
        }

        let mut indexes = Indexes::default();
        for w in &self.config.workers {
            indexes.worker_assignments.insert(w.id.clone(), HashSet::new());
            indexes.worker_posts.insert(w.id.clone(), HashSet::new());
            indexes.worker_weekdays.insert(w.id.clone(), [0; 7]);
            indexes.worker_weekends.insert(w.id.clone(), Vec::new());
        }
        for post in 0..self.config.num_shifts {
            indexes.post_worker_counts.insert(post, HashMap::new());
        }

        for date in self.schedule.dates().copied().collect::<Vec<_>>() {
            let slots: Vec<Option<WorkerId>> = self.schedule.slots(date).unwrap().to_vec();
            for (post, slot) in slots.into_iter().enumerate() {
                let Some(worker_id) = slot else { continue };
                indexes.worker_assignments.entry(worker_id.clone()).or_default().insert(date);
                indexes.worker_posts.entry(worker_id.clone()).or_default().insert(post);
                let weekday = date::effective_weekday(date, &self.config.holidays) as usize;
                indexes.worker_weekdays.entry(worker_id.clone()).or_insert([0; 7])[weekday] += 1;
                if date::is_weekend_like(date, &self.config.holidays) {
                    let start = date::weekend_start(date, &self.config.holidays);
                    let weekends = indexes.worker_weekends.entry(worker_id.clone()).or_default();
                    if !weekends.contains(&start) {
                        weekends.push(start);
                    }
                }
                *indexes
                    .post_worker_counts
                    .entry(post)
                    .or_default()
                    .entry(worker_id)
                    .or_insert(0) += 1;
            }
        }
        for weekends in indexes.worker_weekends.values_mut() {
            weekends.sort();
        }

        log::warn!(
            "repaired {} schedule-without-index, {} index-without-schedule, {} weekend, {} weekday drifts",
            report.schedule_without_index.len(),
            report.index_without_schedule.len(),
            report.weekend_out_of_sync.len(),
            report.weekday_out_of_sync.len()
        );

        self.indexes = indexes;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_config, RawConfig, WorkerConfig};

    fn single_worker_config() -> Config {
        build_config(RawConfig {
            start_date: "01-01-2024".to_string(),
            end_date: "07-01-2024".to_string(),
            num_shifts: 1,
            variable_shifts: vec![],
            gap_between_shifts: 1,
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
            restarts: 1,
            max_improvement_iterations: 10,
        })
        .unwrap()
    }

    #[test]
    fn assign_updates_all_indexes() {
        let config = single_worker_config();
        let mut dm = DataManager::new(&config);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(dm.assign("W1", date, 0));
        assert!(dm.indexes.worker_assignments["W1"].contains(&date));
        assert!(dm.indexes.worker_posts["W1"].contains(&0));
        assert_eq!(dm.indexes.post_worker_counts[&0]["W1"], 1);
    }

    #[test]
    fn double_assign_same_slot_fails() {
        let config = single_worker_config();
        let mut dm = DataManager::new(&config);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(dm.assign("W1", date, 0));
        assert!(!dm.assign("W1", date, 0));
    }

    #[test]
    fn unassign_reverses_assign() {
        let config = single_worker_config();
        let mut dm = DataManager::new(&config);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        dm.assign("W1", date, 0);
        assert!(dm.unassign(date, 0));
        assert!(!dm.indexes.worker_assignments["W1"].contains(&date));
        assert!(dm.verify_consistency().is_clean());
    }

    #[test]
    fn locked_assignment_cannot_be_unassigned() {
        let config = single_worker_config();
        let mut dm = DataManager::new(&config);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        dm.assign_locked("W1", date, 0);
        assert!(!dm.unassign(date, 0));
    }

    #[test]
    fn repair_rebuilds_drifted_index() {
        let config = single_worker_config();
        let mut dm = DataManager::new(&config);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // Seed a drift directly: schedule says W1 is assigned, index does not.
        dm.schedule.days.get_mut(&date).unwrap()[0] = Some("W1".to_string());
        let before = dm.verify_consistency();
        assert!(!before.is_clean());
        dm.repair();
        assert!(dm.verify_consistency().is_clean());
        assert!(dm.indexes.worker_assignments["W1"].contains(&date));
    }
}
