//! End-to-end scenarios, one per named property the engine must hold.
//! Ported from `examples/original_source/test_*.py`'s equivalent cases.

use chrono::NaiveDate;
use shift_roster::config::{build_config, RawConfig, WorkerConfig};
use shift_roster::constraints::{ConstraintChecker, RelaxationLevel, Rejection};
use shift_roster::data_manager::DataManager;
use shift_roster::scheduler::Scheduler;
use shift_roster::workload::{target_for, WorkloadCalculator};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn worker(id: &str, pct: f64) -> WorkerConfig {
    WorkerConfig {
        id: id.to_string(),
        work_percentage: pct,
        work_periods: String::new(),
        days_off: String::new(),
        mandatory_days: String::new(),
        incompatible_with: vec![],
    }
}

#[test]
fn gap_enforcement_alternates_two_workers_at_full_coverage() {
    // gap=1 means consecutive assignments must be > 1 day apart; two
    // workers strictly alternating every other day (gap of exactly 2
    // days each) satisfies that and can reach full coverage alone.
    let config = build_config(RawConfig {
        start_date: "01-01-2024".to_string(),
        end_date: "31-01-2024".to_string(),
        num_shifts: 1,
        variable_shifts: vec![],
        gap_between_shifts: 1,
        max_consecutive_weekends: 5,
        holidays: vec![],
        workers_data: vec![worker("W1", 100.0), worker("W2", 100.0)],
        min_coverage_threshold: 1.0,
        restarts: 5,
        max_improvement_iterations: 50,
    })
    .unwrap();

    let scheduler = Scheduler::new(&config);
    let result = scheduler.run().unwrap();

    assert_eq!(result.statistics.filled_slots, result.statistics.total_slots);

    for w in &config.workers {
        let mut dates: Vec<NaiveDate> =
            result.data.indexes.worker_assignments.get(&w.id).cloned().unwrap_or_default().into_iter().collect();
        dates.sort();
        for pair in dates.windows(2) {
            assert!((pair[1] - pair[0]).num_days() > config.gap_between_shifts);
        }
    }
}

#[test]
fn seven_day_weekday_rule_rejects_monday_repeats_but_allows_the_friday_exception() {
    let config = build_config(RawConfig {
        start_date: "01-01-2024".to_string(),
        end_date: "31-01-2024".to_string(),
        num_shifts: 1,
        variable_shifts: vec![],
        gap_between_shifts: 0,
        max_consecutive_weekends: 5,
        holidays: vec![],
        workers_data: vec![worker("W1", 100.0), worker("W2", 100.0)],
        min_coverage_threshold: 0.5,
        restarts: 1,
        max_improvement_iterations: 1,
    })
    .unwrap();
    let checker = ConstraintChecker::new(&config);
    let mut dm = DataManager::new(&config);
    let w1 = config.worker("W1").unwrap();

    dm.assign("W1", d(2024, 1, 1), 0); // Monday

    let next_monday = checker.can_assign(&dm, w1, d(2024, 1, 8), 0, RelaxationLevel::Strict);
    assert_eq!(next_monday, Some(Rejection::WeekdayRepeatTooSoon));

    let monday_after = checker.can_assign(&dm, w1, d(2024, 1, 15), 0, RelaxationLevel::Strict);
    assert_eq!(monday_after, Some(Rejection::WeekdayRepeatTooSoon));

    let friday_exception = checker.can_assign(&dm, w1, d(2024, 1, 12), 0, RelaxationLevel::Strict);
    assert_eq!(friday_exception, None);
}

#[test]
fn consecutive_weekend_cap_rejects_a_third_saturday() {
    let config = build_config(RawConfig {
        start_date: "01-01-2024".to_string(),
        end_date: "31-01-2024".to_string(),
        num_shifts: 1,
        variable_shifts: vec![],
        gap_between_shifts: 0,
        max_consecutive_weekends: 2,
        holidays: vec![],
        workers_data: vec![worker("W1", 100.0)],
        min_coverage_threshold: 0.5,
        restarts: 1,
        max_improvement_iterations: 1,
    })
    .unwrap();
    let checker = ConstraintChecker::new(&config);
    let mut dm = DataManager::new(&config);
    let w1 = config.worker("W1").unwrap();

    dm.assign("W1", d(2024, 1, 6), 0); // Saturday
    dm.assign("W1", d(2024, 1, 13), 0); // Saturday, one week later

    let result = checker.can_assign(&dm, w1, d(2024, 1, 20), 0, RelaxationLevel::Strict);
    assert_eq!(result, Some(Rejection::WeekendCapExceeded));
}

#[test]
fn incompatible_workers_cannot_share_a_day() {
    let mut w1 = worker("W1", 100.0);
    w1.incompatible_with = vec!["W2".to_string()];
    let mut w2 = worker("W2", 100.0);
    w2.incompatible_with = vec!["W1".to_string()];

    let config = build_config(RawConfig {
        start_date: "01-01-2024".to_string(),
        end_date: "01-01-2024".to_string(),
        num_shifts: 2,
        variable_shifts: vec![],
        gap_between_shifts: 0,
        max_consecutive_weekends: 5,
        holidays: vec![],
        workers_data: vec![w1, w2],
        min_coverage_threshold: 0.5,
        restarts: 1,
        max_improvement_iterations: 1,
    })
    .unwrap();
    let checker = ConstraintChecker::new(&config);
    let mut dm = DataManager::new(&config);
    let date = d(2024, 1, 1);
    dm.assign("W1", date, 0);

    let w2 = config.worker("W2").unwrap();
    let result = checker.can_assign(&dm, w2, date, 1, RelaxationLevel::Strict);
    assert_eq!(result, Some(Rejection::Incompatible));
}

#[test]
fn proportional_allocation_splits_100_100_50_50_into_20_20_10_10() {
    let config = build_config(RawConfig {
        start_date: "01-01-2024".to_string(),
        end_date: "01-01-2024".to_string(),
        num_shifts: 60,
        variable_shifts: vec![],
        gap_between_shifts: 0,
        max_consecutive_weekends: 5,
        holidays: vec![],
        workers_data: vec![worker("A", 100.0), worker("B", 100.0), worker("C", 50.0), worker("D", 50.0)],
        min_coverage_threshold: 0.5,
        restarts: 1,
        max_improvement_iterations: 1,
    })
    .unwrap();

    let targets = WorkloadCalculator::new(&config).calculate_targets();
    assert_eq!(target_for(&targets, "A").unwrap().total, 20);
    assert_eq!(target_for(&targets, "B").unwrap().total, 20);
    assert_eq!(target_for(&targets, "C").unwrap().total, 10);
    assert_eq!(target_for(&targets, "D").unwrap().total, 10);
}

#[test]
fn repaired_schedule_from_a_full_run_is_always_consistent() {
    // The index-repair round trip itself is exercised directly against
    // DataManager's private schedule storage in data_manager.rs's own
    // unit tests; here we check the property a full scheduler run relies
    // on: the winning attempt is always left in a consistent state.
    let config = build_config(RawConfig {
        start_date: "01-01-2024".to_string(),
        end_date: "01-01-2024".to_string(),
        num_shifts: 1,
        variable_shifts: vec![],
        gap_between_shifts: 0,
        max_consecutive_weekends: 5,
        holidays: vec![],
        workers_data: vec![worker("W1", 100.0)],
        min_coverage_threshold: 0.5,
        restarts: 1,
        max_improvement_iterations: 1,
    })
    .unwrap();
    let scheduler = Scheduler::new(&config);
    let result = scheduler.run().unwrap();
    assert!(result.data.verify_consistency().is_clean());
}
