//! Error hierarchy for the scheduling engine.
//!
//! Three kinds, matching the three points at which a run can fail: bad
//! input (`ConfigError`), bad worker data discovered while locking
//! mandatory days (`DataError`), and an invariant that survived to the end
//! of a run without being repaired (`SchedulerError`). Per-candidate
//! admissibility failures inside the builder are never errors — see
//! `constraints::Rejection`.

use std::fmt;

/// Raised while normalizing and validating a `Config` before any
/// scheduling work starts.
#[derive(Debug)]
pub enum ConfigError {
    InvalidDateRange { start: String, end: String },
    MalformedDate(String),
    NegativeGap(i64),
    InvalidPercentage { worker_id: String, percentage: f64 },
    UnknownIncompatibleWorker { worker_id: String, unknown: String },
    DuplicateWorkerId(String),
    ZeroShiftsForDate(String),
    NoWorkers,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDateRange { start, end } => {
                write!(f, "start date {start} is after end date {end}")
            }
            ConfigError::MalformedDate(s) => write!(f, "malformed date '{s}' (expected DD-MM-YYYY)"),
            ConfigError::NegativeGap(g) => write!(f, "gap_between_shifts must be >= 0, got {g}"),
            ConfigError::InvalidPercentage { worker_id, percentage } => write!(
                f,
                "worker {worker_id} has invalid work_percentage {percentage} (must be 0 < p <= 100)"
            ),
            ConfigError::UnknownIncompatibleWorker { worker_id, unknown } => write!(
                f,
                "worker {worker_id} lists unknown incompatible worker '{unknown}'"
            ),
            ConfigError::DuplicateWorkerId(id) => write!(f, "duplicate worker id '{id}'"),
            ConfigError::ZeroShiftsForDate(date) => {
                write!(f, "num_shifts must be >= 1 for {date}")
            }
            ConfigError::NoWorkers => write!(f, "workers_data must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Raised during the mandatory-lock phase when a worker's pre-committed
/// days cannot all be honored.
#[derive(Debug)]
pub enum DataError {
    MandatoryDateOutsideHorizon { worker_id: String, date: String },
    OverlappingMandatoryDates { worker_id: String, date: String },
    UnsatisfiableIncompatibleMandatory {
        worker_a: String,
        worker_b: String,
        date: String,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::MandatoryDateOutsideHorizon { worker_id, date } => write!(
                f,
                "mandatory date {date} for worker {worker_id} falls outside the schedule horizon"
            ),
            DataError::OverlappingMandatoryDates { worker_id, date } => write!(
                f,
                "worker {worker_id} already has a mandatory assignment on {date}"
            ),
            DataError::UnsatisfiableIncompatibleMandatory { worker_a, worker_b, date } => write!(
                f,
                "workers {worker_a} and {worker_b} are incompatible but both have a mandatory assignment on {date}"
            ),
        }
    }
}

impl std::error::Error for DataError {}

/// Raised only when `verify_consistency` + `repair` could not resolve an
/// invariant violation at the end of a run.
#[derive(Debug)]
pub struct SchedulerError {
    pub violations: Vec<String>,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrepaired invariant violations: {}", self.violations.join("; "))
    }
}

impl std::error::Error for SchedulerError {}

/// Union of everything `scheduler::Scheduler::run` can fail with.
#[derive(Debug)]
pub enum RunError {
    Data(DataError),
    Scheduler(SchedulerError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Data(e) => write!(f, "{e}"),
            RunError::Scheduler(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<DataError> for RunError {
    fn from(e: DataError) -> Self {
        RunError::Data(e)
    }
}

impl From<SchedulerError> for RunError {
    fn from(e: SchedulerError) -> Self {
        RunError::Scheduler(e)
    }
}
