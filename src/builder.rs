//! Builds one complete schedule attempt: lock mandatory days, fill every
//! remaining post with the best available candidate (escalating the
//! relaxation ladder when strict rules leave a post unfillable), then run
//! a bounded number of improvement passes that swap assignments to even
//! out the balance score. One `ScheduleBuilder` run is one restart
//! attempt for `scheduler::Scheduler`, and the restart's attempt number
//! shapes both the fill and the improvement passes: a higher attempt
//! starts from a less strict relaxation floor (§4.4 phase 3, "relaxation
//! level = min(attempt, 2)"), alternates the weekend-priority fill order
//! forward/reverse (phase 2), and nudges tied candidate scores apart so
//! different restarts actually explore different schedules (§5's
//! "distinct seed per restart").
//!
//! Grounded in `examples/original_source/data_manager.py`'s
//! `_assign_mandatory_guards` / fill loop structure and
//! `examples/modularflow-rust-scheduler/src/calculations/forward_pass.rs`'s
//! pattern of a single deterministic pass driven by a priority ordering.

use chrono::{Datelike, NaiveDate};

use crate::config::{Config, Worker, WorkerId};
use crate::constraints::{ConstraintChecker, RelaxationLevel, Rejection};
use crate::data_manager::DataManager;
use crate::date;
use crate::error::DataError;
use crate::workload::{target_for, WorkerTarget};

/// A deterministic per-restart, per-worker tie-break in `[0, 1)`. Not
/// randomness — a hash of `(attempt, worker_id)` — but it plays the same
/// role a seeded RNG would: two restarts see the same candidates but break
/// ties between them differently, so `config.restarts` attempts stop
/// collapsing onto the same schedule.
fn jitter(attempt: usize, worker_id: &str) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    attempt.hash(&mut hasher);
    worker_id.hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}

pub struct ScheduleBuilder<'c> {
    config: &'c Config,
    checker: ConstraintChecker<'c>,
    targets: Vec<WorkerTarget>,
}

impl<'c> ScheduleBuilder<'c> {
    pub fn new(config: &'c Config, targets: Vec<WorkerTarget>) -> Self {
        Self { config, checker: ConstraintChecker::new(config), targets }
    }

    /// Run one full attempt: lock mandatory days, fill the body, improve.
    /// `attempt` is this restart's index within `config.restarts`; it seeds
    /// the relaxation floor, the weekend-priority fill order, and the
    /// candidate tie-break (see the module docs).
    pub fn build(&self, attempt: usize) -> Result<DataManager<'c>, DataError> {
        let mut dm = DataManager::new(self.config);
        self.lock_mandatory(&mut dm)?;
        self.fill_body(&mut dm, attempt);
        self.improve(&mut dm);
        Ok(dm)
    }

    /// Pre-assign every worker's mandatory days before anything else
    /// competes for those slots. Errors if two mandatory commitments
    /// cannot coexist.
    fn lock_mandatory(&self, dm: &mut DataManager<'c>) -> Result<(), DataError> {
        for worker in &self.config.workers {
            for &date in &worker.mandatory_days {
                if date < self.config.start_date || date > self.config.end_date {
                    return Err(DataError::MandatoryDateOutsideHorizon {
                        worker_id: worker.id.clone(),
                        date: date.to_string(),
                    });
                }
                if dm.schedule.find_post(date, &worker.id).is_some() {
                    return Err(DataError::OverlappingMandatoryDates {
                        worker_id: worker.id.clone(),
                        date: date.to_string(),
                    });
                }
                for other_id in self.checker.incompatible_with(&worker.id) {
                    if let Some(other) = self.config.worker(other_id) {
                        if other.is_mandatory_on(date) {
                            return Err(DataError::UnsatisfiableIncompatibleMandatory {
                                worker_a: worker.id.clone(),
                                worker_b: other.id.clone(),
                                date: date.to_string(),
                            });
                        }
                    }
                }

                let slots = dm.schedule.slots(date).map(|s| s.len()).unwrap_or(0);
                let mut placed = false;
                for post in 0..slots {
                    if dm.schedule.worker_at(date, post).is_none() {
                        dm.assign_locked(&worker.id, date, post);
                        placed = true;
                        break;
                    }
                }
                if !placed {
                    log::warn!(
                        "no free post to lock mandatory day {date} for worker {}; all posts already committed",
                        worker.id
                    );
                }
            }
        }
        Ok(())
    }

    /// Fill every still-empty post. Weekend-like dates go first (§4.4
    /// phase 2), in forward order on even attempts and reverse order on
    /// odd ones, since the workers available for a weekend slot shrink
    /// fast once a handful are already committed and the fill order
    /// decides who gets first pick. The remaining body dates (phase 3)
    /// follow in chronological order.
    fn fill_body(&self, dm: &mut DataManager<'c>, attempt: usize) {
        let all_dates: Vec<NaiveDate> = dm.schedule.dates().copied().collect();
        let mut weekend_dates: Vec<NaiveDate> =
            all_dates.iter().copied().filter(|d| date::is_weekend_like(*d, &self.config.holidays)).collect();
        if attempt % 2 == 1 {
            weekend_dates.reverse();
        }
        for date in weekend_dates {
            self.fill_date(dm, date, attempt);
        }
        for date in all_dates {
            if date::is_weekend_like(date, &self.config.holidays) {
                continue;
            }
            self.fill_date(dm, date, attempt);
        }
    }

    fn fill_date(&self, dm: &mut DataManager<'c>, date: NaiveDate, attempt: usize) {
        let slot_count = dm.schedule.slots(date).map(|s| s.len()).unwrap_or(0);
        for post in 0..slot_count {
            if dm.schedule.worker_at(date, post).is_some() {
                continue;
            }
            self.fill_one(dm, date, post, attempt);
        }
    }

    /// Escalate the relaxation ladder from this restart's floor
    /// (`min(attempt, 2)`, §4.4 phase 3) up to full relaxation until some
    /// worker is admissible.
    fn fill_one(&self, dm: &mut DataManager<'c>, date: NaiveDate, post: usize, attempt: usize) {
        let floor = attempt.min(2) as u8;
        for level_u8 in floor..=2 {
            let level = RelaxationLevel::from_u8(level_u8);
            if let Some((worker_id, rejection_avoided)) = self.best_candidate(dm, date, post, level, attempt) {
                dm.assign(&worker_id, date, post);
                if level_u8 > 0 {
                    dm.record_skip(&worker_id, date, rejection_avoided.as_str(), None);
                }
                return;
            }
        }
        log::warn!("post {post} on {date} left unfilled: no admissible worker at any relaxation level");
    }

    /// Score every worker eligible at `level` and return the best one,
    /// along with which rule relaxation (if any) was needed to admit the
    /// runner-up rejection set — used only for the audit log.
    fn best_candidate(
        &self,
        dm: &DataManager<'c>,
        date: NaiveDate,
        post: usize,
        level: RelaxationLevel,
        attempt: usize,
    ) -> Option<(WorkerId, Rejection)> {
        let mut best: Option<(f64, WorkerId)> = None;
        let mut last_rejection = Rejection::NotAvailable;

        for worker in &self.config.workers {
            match self.checker.can_assign(dm, worker, date, post, level) {
                None => {
                    let Some(target) = target_for(&self.targets, &worker.id) else { continue };
                    let current = self.assigned_count(dm, &worker.id);
                    let days_since_last = self.days_since_last(dm, &worker.id, date);
                    let score = self.score_candidate(dm, worker, target, current, days_since_last, date, post, attempt);
                    if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                        best = Some((score, worker.id.clone()));
                    }
                }
                Some(rejection) => last_rejection = rejection,
            }
        }

        best.map(|(_, id)| (id, last_rejection))
    }

    fn assigned_count(&self, dm: &DataManager<'c>, worker_id: &str) -> u32 {
        dm.indexes.worker_assignments.get(worker_id).map(|s| s.len() as u32).unwrap_or(0)
    }

    fn days_since_last(&self, dm: &DataManager<'c>, worker_id: &str, date: NaiveDate) -> i64 {
        dm.indexes
            .worker_assignments
            .get(worker_id)
            .and_then(|dates| dates.iter().filter(|d| **d < date).max())
            .map(|last| (date - *last).num_days())
            .unwrap_or(365)
    }

    /// One candidate's score for a given empty slot: higher wins. Additive
    /// over independent fairness signals (§4.4) so each can be reasoned
    /// about in isolation: the worker's deficit against their target, a
    /// rest bonus for longer gaps, a part-time nudge, a mandatory-day
    /// override, a weekend-overload penalty, a post-rotation bonus/penalty,
    /// an ISO-week-below-average bonus, a pacing-progress bonus, and
    /// finally this restart's tie-break jitter.
    fn score_candidate(
        &self,
        dm: &DataManager<'c>,
        worker: &Worker,
        target: &WorkerTarget,
        current_assigned: u32,
        days_since_last: i64,
        date: NaiveDate,
        post: usize,
        attempt: usize,
    ) -> f64 {
        let deficit = target.total as f64 - current_assigned as f64;
        let rest_bonus = (days_since_last.min(30) as f64) * 0.5;
        let part_time_penalty = if worker.is_part_time() { -2.0 } else { 0.0 };
        let mandatory_bonus = if worker.is_mandatory_on(date) { 1000.0 } else { 0.0 };

        let weekend_penalty = if date::is_weekend_like(date, &self.config.holidays) {
            let current_weekend_count =
                dm.indexes.worker_weekends.get(&worker.id).map(|v| v.len()).unwrap_or(0) as f64;
            -300.0 * current_weekend_count
        } else {
            0.0
        };

        deficit * 10.0
            + rest_bonus
            + part_time_penalty
            + mandatory_bonus
            + weekend_penalty
            + self.last_post_bonus(dm, &worker.id, post, date)
            + self.week_balance_bonus(dm, worker, date)
            + 500.0 * self.progress(target, current_assigned, date)
            + jitter(attempt, &worker.id)
    }

    /// Rewards rotating posts, penalizes repeating the same one: `+1000`
    /// if the worker's most recent shift was a different post, `-1000` if
    /// it was this same one, `0` for a worker with no prior shift.
    fn last_post_bonus(&self, dm: &DataManager<'c>, worker_id: &str, post: usize, date: NaiveDate) -> f64 {
        let last_date =
            dm.indexes.worker_assignments.get(worker_id).and_then(|dates| dates.iter().filter(|d| **d < date).max());
        match last_date.and_then(|last| dm.schedule.find_post(*last, worker_id)) {
            Some(last_post) if last_post == post => -1000.0,
            Some(_) => 1000.0,
            None => 0.0,
        }
    }

    /// `+500` if this worker's assignment count in `date`'s ISO week is
    /// below the roster's per-worker average for that same week.
    fn week_balance_bonus(&self, dm: &DataManager<'c>, worker: &Worker, date: NaiveDate) -> f64 {
        let week = date.iso_week();
        let count_in_week = |id: &str| -> usize {
            dm.indexes
                .worker_assignments
                .get(id)
                .map(|dates| {
                    dates.iter().filter(|d| d.iso_week().year() == week.year() && d.iso_week().week() == week.week()).count()
                })
                .unwrap_or(0)
        };
        let this_count = count_in_week(&worker.id) as f64;
        let total: usize = self.config.workers.iter().map(|w| count_in_week(&w.id)).sum();
        let average = total as f64 / self.config.workers.len().max(1) as f64;
        if this_count < average {
            500.0
        } else {
            0.0
        }
    }

    /// How far behind (positive) or ahead (negative) of an even pace this
    /// worker is at `date`, normalized to `[-1, 1]` by their own target —
    /// "expected shifts by now" minus "shifts actually worked", divided by
    /// the total target.
    fn progress(&self, target: &WorkerTarget, current_assigned: u32, date: NaiveDate) -> f64 {
        if target.total == 0 {
            return 0.0;
        }
        let total_days = (self.config.end_date - self.config.start_date).num_days().max(1) as f64;
        let elapsed = (date - self.config.start_date).num_days() as f64 / total_days;
        let expected_so_far = target.total as f64 * elapsed;
        ((expected_so_far - current_assigned as f64) / target.total as f64).clamp(-1.0, 1.0)
    }

    /// Bounded local search: run every §4.4 improvement pass each
    /// iteration, stopping as soon as a full round makes no change.
    fn improve(&self, dm: &mut DataManager<'c>) {
        for _ in 0..self.config.max_improvement_iterations {
            let mut improved = false;
            improved |= self.try_fill_empty(dm);
            improved |= self.balance_workloads(dm);
            improved |= self.improve_post_rotation(dm);
            improved |= self.improve_weekend_distribution(dm);
            improved |= self.fix_incompatibility(dm);
            improved |= self.balance_last_post(dm);
            improved |= self.balance_weekday_distribution(dm);
            if !improved {
                break;
            }
        }
    }

    /// Swap the workers occupying two already-filled slots, rolling back
    /// if either new placement isn't strictly admissible. The one
    /// exchange primitive every pass below builds on.
    fn exchange(&self, dm: &mut DataManager<'c>, date_a: NaiveDate, post_a: usize, date_b: NaiveDate, post_b: usize) -> bool {
        if (date_a, post_a) == (date_b, post_b) {
            return false;
        }
        let Some(worker_a) = dm.schedule.worker_at(date_a, post_a).cloned() else { return false };
        let Some(worker_b) = dm.schedule.worker_at(date_b, post_b).cloned() else { return false };
        if worker_a == worker_b {
            return false;
        }
        if dm.is_locked(date_a, &worker_a) || dm.is_locked(date_b, &worker_b) {
            return false;
        }
        let (Some(cfg_a), Some(cfg_b)) = (self.config.worker(&worker_a), self.config.worker(&worker_b)) else {
            return false;
        };

        dm.unassign(date_a, post_a);
        dm.unassign(date_b, post_b);

        let a_ok = self.checker.can_assign(dm, cfg_b, date_a, post_a, RelaxationLevel::Strict).is_none();
        let b_ok = self.checker.can_assign(dm, cfg_a, date_b, post_b, RelaxationLevel::Strict).is_none();

        if a_ok && b_ok {
            dm.assign(&worker_b, date_a, post_a);
            dm.assign(&worker_a, date_b, post_b);
            true
        } else {
            dm.assign(&worker_a, date_a, post_a);
            dm.assign(&worker_b, date_b, post_b);
            false
        }
    }

    /// §4.4 pass: any unlocked slot that is still empty after the fill and
    /// prior improvement passes gets one more attempt, at every relaxation
    /// level, before the builder gives up on it.
    fn try_fill_empty(&self, dm: &mut DataManager<'c>) -> bool {
        let mut changed = false;
        for (date, post) in dm.schedule.empty_slots() {
            for level_u8 in 0u8..=2 {
                let level = RelaxationLevel::from_u8(level_u8);
                if let Some((worker_id, rejection_avoided)) = self.best_candidate(dm, date, post, level, 0) {
                    dm.assign(&worker_id, date, post);
                    if level_u8 > 0 {
                        dm.record_skip(&worker_id, date, rejection_avoided.as_str(), None);
                    }
                    changed = true;
                    break;
                }
            }
        }
        changed
    }

    /// §4.4 pass: move an over-target worker's assignment to an
    /// under-target worker when an admissible replacement exists.
    fn balance_workloads(&self, dm: &mut DataManager<'c>) -> bool {
        let mut improved = false;
        let dates: Vec<NaiveDate> = dm.schedule.dates().copied().collect();

        for date in dates {
            let slot_count = dm.schedule.slots(date).map(|s| s.len()).unwrap_or(0);
            for post in 0..slot_count {
                let Some(holder_id) = dm.schedule.worker_at(date, post).cloned() else { continue };
                if dm.is_locked(date, &holder_id) {
                    continue;
                }
                let Some(holder_target) = target_for(&self.targets, &holder_id) else { continue };
                let holder_current = self.assigned_count(dm, &holder_id);
                if (holder_current as f64) <= holder_target.total as f64 {
                    continue;
                }

                if let Some(replacement) = self.better_replacement(dm, date, post, &holder_id) {
                    dm.unassign(date, post);
                    if !dm.assign(&replacement, date, post) {
                        dm.assign(&holder_id, date, post);
                    } else {
                        improved = true;
                    }
                }
            }
        }
        improved
    }

    fn better_replacement(&self, dm: &DataManager<'c>, date: NaiveDate, post: usize, exclude: &str) -> Option<WorkerId> {
        let mut best: Option<(f64, WorkerId)> = None;
        for worker in &self.config.workers {
            if worker.id == exclude {
                continue;
            }
            let Some(target) = target_for(&self.targets, &worker.id) else { continue };
            let current = self.assigned_count(dm, &worker.id);
            if (current as f64) >= target.total as f64 {
                continue;
            }
            if self.checker.can_assign(dm, worker, date, post, RelaxationLevel::Strict).is_some() {
                continue;
            }
            let days_since_last = self.days_since_last(dm, &worker.id, date);
            let score = self.score_candidate(dm, worker, target, current, days_since_last, date, post, 0);
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, worker.id.clone()));
            }
        }
        best.map(|(_, id)| id)
    }

    /// §4.4 pass: a worker stuck on a single post (`worker_posts` has only
    /// one entry) trades one of their shifts for a different post held by
    /// someone else on the same day, so rotation actually happens instead
    /// of `score_candidate`'s bonus alone hoping it will.
    fn improve_post_rotation(&self, dm: &mut DataManager<'c>) -> bool {
        let mut changed = false;
        let worker_ids: Vec<WorkerId> = self.config.workers.iter().map(|w| w.id.clone()).collect();

        for worker_id in &worker_ids {
            let stuck_post = match dm.indexes.worker_posts.get(worker_id) {
                Some(posts) if posts.len() == 1 => *posts.iter().next().unwrap(),
                _ => continue,
            };
            let assigned_dates: Vec<NaiveDate> =
                dm.indexes.worker_assignments.get(worker_id).cloned().unwrap_or_default().into_iter().collect();

            for date in assigned_dates {
                if dm.is_locked(date, worker_id) {
                    continue;
                }
                let slot_count = dm.schedule.slots(date).map(|s| s.len()).unwrap_or(0);
                let mut swapped = false;
                for other_post in 0..slot_count {
                    if other_post == stuck_post {
                        continue;
                    }
                    if dm.schedule.worker_at(date, other_post).is_none() {
                        continue;
                    }
                    if self.exchange(dm, date, stuck_post, date, other_post) {
                        changed = true;
                        swapped = true;
                        break;
                    }
                }
                if swapped {
                    break;
                }
            }
        }
        changed
    }

    /// §4.4 pass: move a weekend-like shift from the worker with the most
    /// weekend clusters (`worker_weekends`) to one with the fewest, by
    /// trading it for a weekday shift that worker already holds.
    fn improve_weekend_distribution(&self, dm: &mut DataManager<'c>) -> bool {
        let mut worker_ids: Vec<WorkerId> = self.config.workers.iter().map(|w| w.id.clone()).collect();
        worker_ids.sort();
        if worker_ids.len() < 2 {
            return false;
        }

        let weekend_count = |dm: &DataManager<'c>, id: &str| dm.indexes.worker_weekends.get(id).map(|v| v.len()).unwrap_or(0);

        for over_id in worker_ids.clone() {
            let over_count = weekend_count(dm, &over_id);
            if over_count <= 1 {
                continue;
            }
            let over_weekend_dates: Vec<NaiveDate> = dm
                .indexes
                .worker_assignments
                .get(&over_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|d| date::is_weekend_like(*d, &self.config.holidays))
                .collect();

            for wd in over_weekend_dates {
                if dm.is_locked(wd, &over_id) {
                    continue;
                }
                let Some(wd_post) = dm.schedule.find_post(wd, &over_id) else { continue };

                for under_id in &worker_ids {
                    if *under_id == over_id {
                        continue;
                    }
                    if weekend_count(dm, under_id) + 1 >= over_count {
                        continue;
                    }
                    let under_dates: Vec<NaiveDate> = dm
                        .indexes
                        .worker_assignments
                        .get(under_id)
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|d| !date::is_weekend_like(*d, &self.config.holidays))
                        .collect();
                    for ud in under_dates {
                        if dm.is_locked(ud, under_id) {
                            continue;
                        }
                        let Some(ud_post) = dm.schedule.find_post(ud, under_id) else { continue };
                        if self.exchange(dm, wd, wd_post, ud, ud_post) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// §4.4 pass: find any day where two incompatible workers both ended
    /// up assigned (only possible if a relaxed-level fill or an earlier
    /// exchange created one) and unassign the non-locked one, refilling
    /// the slot through the normal relaxation ladder.
    fn fix_incompatibility(&self, dm: &mut DataManager<'c>) -> bool {
        let mut changed = false;
        let dates: Vec<NaiveDate> = dm.schedule.dates().copied().collect();

        for date in dates {
            let assigned: Vec<WorkerId> = dm.schedule.assigned_on(date).cloned().collect();
            for i in 0..assigned.len() {
                for j in (i + 1)..assigned.len() {
                    if !self.checker.are_incompatible(&assigned[i], &assigned[j]) {
                        continue;
                    }
                    let victim = if dm.is_locked(date, &assigned[j]) { &assigned[i] } else { &assigned[j] };
                    if dm.is_locked(date, victim) {
                        continue;
                    }
                    let Some(post) = dm.schedule.find_post(date, victim) else { continue };
                    dm.unassign(date, post);
                    changed = true;
                    for level_u8 in 0u8..=2 {
                        let level = RelaxationLevel::from_u8(level_u8);
                        if let Some((worker_id, rejection_avoided)) = self.best_candidate(dm, date, post, level, 0) {
                            dm.assign(&worker_id, date, post);
                            if level_u8 > 0 {
                                dm.record_skip(&worker_id, date, rejection_avoided.as_str(), None);
                            }
                            break;
                        }
                    }
                }
            }
        }
        changed
    }

    /// §4.4 pass: the highest-indexed post is treated as the "last post"
    /// (rotation through it matters most); trade one of its assignments
    /// from whoever holds it most (`post_worker_counts`) to whoever holds
    /// it least.
    fn balance_last_post(&self, dm: &mut DataManager<'c>) -> bool {
        let Some(&last_post) = dm.indexes.post_worker_counts.keys().max() else { return false };
        let counts = match dm.indexes.post_worker_counts.get(&last_post) {
            Some(c) if !c.is_empty() => c.clone(),
            _ => return false,
        };

        let mut worker_ids: Vec<WorkerId> = self.config.workers.iter().map(|w| w.id.clone()).collect();
        worker_ids.sort();

        let Some((over_id, &over_count)) = counts.iter().max_by_key(|(_, c)| **c) else { return false };
        let count_for = |id: &str| *counts.get(id).unwrap_or(&0);
        let Some(under_id) = worker_ids.iter().filter(|id| *id != over_id).min_by_key(|id| count_for(id)) else {
            return false;
        };
        if count_for(under_id) + 1 >= over_count {
            return false;
        }

        let over_dates: Vec<NaiveDate> = dm
            .indexes
            .worker_assignments
            .get(over_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| dm.schedule.find_post(*d, over_id) == Some(last_post))
            .collect();
        let under_dates: Vec<NaiveDate> = dm
            .indexes
            .worker_assignments
            .get(under_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| dm.schedule.find_post(*d, under_id) != Some(last_post))
            .collect();

        for od in over_dates {
            if dm.is_locked(od, over_id) {
                continue;
            }
            for ud in &under_dates {
                if dm.is_locked(*ud, under_id) {
                    continue;
                }
                let Some(ud_post) = dm.schedule.find_post(*ud, under_id) else { continue };
                if self.exchange(dm, od, last_post, *ud, ud_post) {
                    return true;
                }
            }
        }
        false
    }

    /// §4.4 pass: for each weekday (`worker_weekdays`), trade a shift from
    /// whoever is most over-represented on it to whoever is most
    /// under-represented, so no one worker quietly absorbs every Tuesday.
    fn balance_weekday_distribution(&self, dm: &mut DataManager<'c>) -> bool {
        let worker_ids: Vec<WorkerId> = self.config.workers.iter().map(|w| w.id.clone()).collect();
        if worker_ids.len() < 2 {
            return false;
        }

        for weekday in 0..7usize {
            let counts: Vec<(WorkerId, u32)> = worker_ids
                .iter()
                .map(|id| (id.clone(), dm.indexes.worker_weekdays.get(id).map(|c| c[weekday]).unwrap_or(0)))
                .collect();
            let Some((over_id, over_count)) = counts.iter().max_by_key(|(_, c)| *c).cloned() else { continue };
            let Some((under_id, under_count)) = counts.iter().min_by_key(|(_, c)| *c).cloned() else { continue };
            if over_id == under_id || over_count <= under_count + 1 {
                continue;
            }

            let over_dates: Vec<NaiveDate> = dm
                .indexes
                .worker_assignments
                .get(&over_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|d| date::effective_weekday(*d, &self.config.holidays) as usize == weekday)
                .collect();
            let under_dates: Vec<NaiveDate> = dm
                .indexes
                .worker_assignments
                .get(&under_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|d| date::effective_weekday(*d, &self.config.holidays) as usize != weekday)
                .collect();

            for od in over_dates {
                if dm.is_locked(od, &over_id) {
                    continue;
                }
                let Some(od_post) = dm.schedule.find_post(od, &over_id) else { continue };
                for ud in &under_dates {
                    if dm.is_locked(*ud, &under_id) {
                        continue;
                    }
                    let Some(ud_post) = dm.schedule.find_post(*ud, &under_id) else { continue };
                    if self.exchange(dm, od, od_post, *ud, ud_post) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_config, RawConfig, WorkerConfig};
    use crate::workload::WorkloadCalculator;

    fn worker(id: &str, pct: f64, mandatory: &str) -> WorkerConfig {
        WorkerConfig {
            id: id.to_string(),
            work_percentage: pct,
            work_periods: String::new(),
            days_off: String::new(),
            mandatory_days: mandatory.to_string(),
            incompatible_with: vec![],
        }
    }

    fn small_config() -> Config {
        build_config(RawConfig {
            start_date: "01-01-2024".to_string(),
            end_date: "14-01-2024".to_string(),
            num_shifts: 1,
            variable_shifts: vec![],
            gap_between_shifts: 1,
            max_consecutive_weekends: 3,
            holidays: vec![],
            workers_data: vec![worker("A", 100.0, ""), worker("B", 100.0, ""), worker("C", 100.0, "")],
            min_coverage_threshold: 0.8,
            restarts: 1,
            max_improvement_iterations: 20,
        })
        .unwrap()
    }

    #[test]
    fn builds_a_schedule_with_high_coverage() {
        let config = small_config();
        let targets = WorkloadCalculator::new(&config).calculate_targets();
        let builder = ScheduleBuilder::new(&config, targets);
        let dm = builder.build(0).unwrap();
        let filled = dm.schedule.filled_slots();
        let total = dm.schedule.total_slots();
        assert!(filled as f64 / total as f64 >= 0.8, "coverage too low: {filled}/{total}");
    }

    #[test]
    fn mandatory_day_is_always_honored() {
        let mut raw = RawConfig {
            start_date: "01-01-2024".to_string(),
            end_date: "14-01-2024".to_string(),
            num_shifts: 1,
            variable_shifts: vec![],
            gap_between_shifts: 1,
            max_consecutive_weekends: 3,
            holidays: vec![],
            workers_data: vec![worker("A", 100.0, "05-01-2024"), worker("B", 100.0, "")],
            min_coverage_threshold: 0.8,
            restarts: 1,
            max_improvement_iterations: 20,
        };
        raw.workers_data[0].mandatory_days = "05-01-2024".to_string();
        let config = build_config(raw).unwrap();
        let targets = WorkloadCalculator::new(&config).calculate_targets();
        let builder = ScheduleBuilder::new(&config, targets);
        let dm = builder.build(0).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(dm.schedule.find_post(date, "A"), Some(0));
    }

    #[test]
    fn different_attempts_explore_different_schedules() {
        // With a restart count of several and a roster that leaves real
        // slack in who gets which day, attempt 0 and attempt 1 should not
        // always agree on the full assignment (forward vs. reverse
        // weekend order, distinct relaxation floors, distinct jitter).
        let config = small_config();
        let targets = WorkloadCalculator::new(&config).calculate_targets();
        let builder = ScheduleBuilder::new(&config, targets);
        let first = builder.build(0).unwrap();
        let second = builder.build(1).unwrap();

        let mut any_difference = false;
        for date in first.schedule.dates() {
            if first.schedule.slots(*date) != second.schedule.slots(*date) {
                any_difference = true;
                break;
            }
        }
        assert!(any_difference, "attempt 0 and attempt 1 produced an identical schedule");
    }

    #[test]
    fn post_rotation_pass_breaks_a_single_stuck_post() {
        let config = small_config();
        let targets = WorkloadCalculator::new(&config).calculate_targets();
        let builder = ScheduleBuilder::new(&config, targets);
        let mut dm = DataManager::new(&config);
        // num_shifts is 1 in small_config, so this pass is a no-op there;
        // just check it never panics on a single-post schedule.
        assert!(!builder.improve_post_rotation(&mut dm));
    }
}
