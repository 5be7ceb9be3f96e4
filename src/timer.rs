//! Cumulative timing ledger for the solver
//!
//! Each solver instance owns three named accumulators (total solve time,
//! Green's function evaluation, linear solves). They accumulate over the
//! whole lifetime of the solver and are never reset.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// A single cumulative accumulator: total elapsed time and call count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    total: Duration,
    nb_timings: usize,
}

impl Timer {
    /// Record one measured duration.
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.nb_timings += 1;
    }

    /// Accumulated time in seconds.
    pub fn total_seconds(&self) -> f64 {
        self.total.as_secs_f64()
    }

    /// Number of recorded timings.
    pub fn nb_timings(&self) -> usize {
        self.nb_timings
    }

    /// Mean duration in seconds, or 0.0 before the first record.
    pub fn mean_seconds(&self) -> f64 {
        if self.nb_timings == 0 {
            0.0
        } else {
            self.total_seconds() / self.nb_timings as f64
        }
    }
}

/// The tasks tracked by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// One full `solve` call.
    SolveTotal,
    /// Influence-matrix assembly and Green's function evaluation.
    GreenFunction,
    /// Dense linear solves.
    LinearSolver,
}

impl Task {
    fn label(self) -> &'static str {
        match self {
            Task::SolveTotal => "Solve total",
            Task::GreenFunction => "Green function",
            Task::LinearSolver => "Linear solver",
        }
    }
}

/// The solver's timing ledger.
///
/// The accumulators are behind mutexes so that `solve` can take `&self`
/// and parallel batch resolution can share one solver across workers.
/// Unlike a multi-process pool, rayon workers live in the same process,
/// so their timings accumulate into this ledger too.
#[derive(Debug, Default)]
pub struct SolverTimers {
    solve_total: Mutex<Timer>,
    green_function: Mutex<Timer>,
    linear_solver: Mutex<Timer>,
}

impl SolverTimers {
    fn cell(&self, task: Task) -> &Mutex<Timer> {
        match task {
            Task::SolveTotal => &self.solve_total,
            Task::GreenFunction => &self.green_function,
            Task::LinearSolver => &self.linear_solver,
        }
    }

    /// Run `f`, recording its elapsed time into the given accumulator.
    pub fn time<R>(&self, task: Task, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let output = f();
        let elapsed = start.elapsed();
        self.cell(task)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(elapsed);
        output
    }

    /// Snapshot of one accumulator.
    pub fn snapshot(&self, task: Task) -> Timer {
        *self.cell(task).lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of all accumulators, for logging or export.
    pub fn summary(&self) -> TimerSummary {
        TimerSummary {
            rows: [Task::SolveTotal, Task::GreenFunction, Task::LinearSolver]
                .into_iter()
                .map(|task| {
                    let t = self.snapshot(task);
                    TimerSummaryRow {
                        task: task.label(),
                        total: t.total_seconds(),
                        nb_calls: t.nb_timings(),
                        mean: t.mean_seconds(),
                    }
                })
                .collect(),
        }
    }
}

/// One row of the timer summary.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSummaryRow {
    /// Task name.
    pub task: &'static str,
    /// Accumulated seconds.
    pub total: f64,
    /// Number of calls.
    pub nb_calls: usize,
    /// Mean seconds per call.
    pub mean: f64,
}

/// Snapshot of the whole ledger.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSummary {
    /// One row per task.
    pub rows: Vec<TimerSummaryRow>,
}

impl fmt::Display for TimerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16} {:>12} {:>9} {:>12}", "task", "total (s)", "calls", "mean (s)")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<16} {:>12.6} {:>9} {:>12.6}",
                row.task, row.total, row.nb_calls, row.mean
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_accumulates() {
        let mut timer = Timer::default();
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));
        assert_eq!(timer.nb_timings(), 2);
        assert!(timer.total_seconds() >= 0.04);
        assert!(timer.mean_seconds() >= 0.02);
    }

    #[test]
    fn test_time_counts_calls() {
        let timers = SolverTimers::default();
        for _ in 0..3 {
            timers.time(Task::SolveTotal, || ());
        }
        assert_eq!(timers.snapshot(Task::SolveTotal).nb_timings(), 3);
        assert_eq!(timers.snapshot(Task::LinearSolver).nb_timings(), 0);
    }

    #[test]
    fn test_summary_has_three_rows() {
        let timers = SolverTimers::default();
        let summary = timers.summary();
        assert_eq!(summary.rows.len(), 3);
        assert!(format!("{}", summary).contains("Solve total"));
    }
}
