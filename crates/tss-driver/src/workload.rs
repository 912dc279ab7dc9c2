//! The worker script and the run around it.
//!
//! Each worker performs, per iteration `i`: push `3i+1`, push `3i+2`, pop,
//! push `3i+3`, pop. A full run therefore leaves `workers * iterations`
//! elements on the stack before drain.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use tss_stack::{EventSink, FileSink, SinkError, Stack};

use crate::config::DriverConfig;

/// Errors that end or degrade a run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to open log file {}: {source}", path.display())]
    LogFile { path: PathBuf, source: SinkError },
    /// A worker thread could not be started. The run continues without it.
    #[error("failed to spawn worker {worker}: {source}")]
    SpawnFailure { worker: u32, source: io::Error },
    #[error("no worker could be spawned ({requested} requested)")]
    NoWorkers { requested: u32 },
    #[error("failed to flush log file: {0}")]
    Flush(#[source] SinkError),
}

/// What one worker observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub pushes: u64,
    pub pops: u64,
    pub empty_pops: u64,
    pub rejected_pushes: u64,
}

impl WorkerReport {
    fn merge(self, other: WorkerReport) -> WorkerReport {
        WorkerReport {
            pushes: self.pushes + other.pushes,
            pops: self.pops + other.pops,
            empty_pops: self.empty_pops + other.empty_pops,
            rejected_pushes: self.rejected_pushes + other.rejected_pushes,
        }
    }
}

/// Run the worker script `iterations` times against `stack`.
pub fn worker_script<S: EventSink<u64>>(stack: &Stack<u64, S>, iterations: u32) -> WorkerReport {
    let mut report = WorkerReport::default();

    let push = |report: &mut WorkerReport, value: u64| match stack.push(value) {
        Ok(()) => report.pushes += 1,
        Err(err) => {
            warn!(value, error = %err, "push rejected");
            report.rejected_pushes += 1;
        }
    };
    let pop = |report: &mut WorkerReport| match stack.pop() {
        Ok(_) => report.pops += 1,
        Err(_) => {
            debug!("pop found the stack empty");
            report.empty_pops += 1;
        }
    };

    for i in 0..u64::from(iterations) {
        push(&mut report, 3 * i + 1);
        push(&mut report, 3 * i + 2);
        pop(&mut report);
        push(&mut report, 3 * i + 3);
        pop(&mut report);
    }
    report
}

/// Workers that ran and how many could not be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkersOutcome {
    pub reports: Vec<WorkerReport>,
    pub spawn_failures: u32,
}

/// Spawn `workers` threads running [`worker_script`] and join them all.
///
/// A worker that cannot be spawned is logged and skipped. Fails only if
/// no worker could be spawned at all.
pub fn run_workers<S>(
    stack: &Arc<Stack<u64, S>>,
    workers: u32,
    iterations: u32,
) -> Result<WorkersOutcome, DriverError>
where
    S: EventSink<u64> + 'static,
{
    let mut handles = Vec::with_capacity(workers as usize);
    let mut spawn_failures = 0;

    for worker in 0..workers {
        let stack = Arc::clone(stack);
        let spawned = thread::Builder::new()
            .name(format!("worker-{}", worker))
            .spawn(move || worker_script(&stack, iterations));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(source) => {
                let err = DriverError::SpawnFailure { worker, source };
                warn!(error = %err, "continuing with fewer workers");
                spawn_failures += 1;
            }
        }
    }

    if handles.is_empty() {
        return Err(DriverError::NoWorkers { requested: workers });
    }

    let reports = handles
        .into_iter()
        .map(|handle| match handle.join() {
            Ok(report) => report,
            Err(panic) => std::panic::resume_unwind(panic),
        })
        .collect();

    Ok(WorkersOutcome {
        reports,
        spawn_failures,
    })
}

/// Summary of one driver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub workers_requested: u32,
    pub workers_spawned: u32,
    pub spawn_failures: u32,
    pub iterations: u32,
    pub pushes: u64,
    pub pops: u64,
    pub empty_pops: u64,
    pub rejected_pushes: u64,
    /// Elements on the stack after all workers joined
    pub final_len: usize,
    /// Nodes released by drain
    pub drained: usize,
    pub sink_failures: u64,
    pub log_path: String,
    /// Lines the workers wrote, before drain
    pub worker_log_lines: u64,
    /// All lines, drain pops included
    pub log_lines: u64,
    pub elapsed_ms: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Program completed: {}/{} workers x {} iterations",
            self.workers_spawned, self.workers_requested, self.iterations
        )?;
        writeln!(
            f,
            "  pushes={} pops={} empty_pops={} rejected_pushes={}",
            self.pushes, self.pops, self.empty_pops, self.rejected_pushes
        )?;
        writeln!(f, "  final_len={} drained={}", self.final_len, self.drained)?;
        write!(
            f,
            "  log={} lines={} (workers {}) sink_failures={} elapsed_ms={}",
            self.log_path,
            self.log_lines,
            self.worker_log_lines,
            self.sink_failures,
            self.elapsed_ms
        )
    }
}

/// Open the log, run every worker, drain and flush.
pub fn run(config: &DriverConfig) -> Result<RunSummary, DriverError> {
    let sink: FileSink<File> =
        FileSink::create(&config.log_path).map_err(|source| DriverError::LogFile {
            path: config.log_path.clone(),
            source,
        })?;
    info!(
        workers = config.workers,
        iterations = config.iterations,
        log_path = %config.log_path.display(),
        "starting run"
    );

    let started = Instant::now();
    let stack = Arc::new(Stack::with_event_sink(sink));
    let outcome = run_workers(&stack, config.workers, config.iterations)?;

    let final_len = stack.len();
    let worker_log_lines = stack.with_sink(|sink| sink.lines_written());
    let drained = stack.drain();
    stack.flush_sink().map_err(DriverError::Flush)?;

    let totals = outcome
        .reports
        .iter()
        .fold(WorkerReport::default(), |acc, r| acc.merge(*r));
    let stats = stack.stats();
    let log_lines = stack.with_sink(|sink| sink.lines_written());

    let summary = RunSummary {
        workers_requested: config.workers,
        workers_spawned: outcome.reports.len() as u32,
        spawn_failures: outcome.spawn_failures,
        iterations: config.iterations,
        pushes: totals.pushes,
        pops: totals.pops,
        empty_pops: totals.empty_pops,
        rejected_pushes: totals.rejected_pushes,
        final_len,
        drained,
        sink_failures: stats.sink_failures,
        log_path: config.log_path.display().to_string(),
        worker_log_lines,
        log_lines,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        pushes = summary.pushes,
        pops = summary.pops,
        drained = summary.drained,
        elapsed_ms = summary.elapsed_ms,
        "run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_stack::MemorySink;

    #[test]
    fn test_worker_script_single_worker() {
        let stack = Stack::with_event_sink(MemorySink::new());
        let report = worker_script(&stack, 2);

        assert_eq!(
            report,
            WorkerReport {
                pushes: 6,
                pops: 4,
                empty_pops: 0,
                rejected_pushes: 0,
            }
        );
        // Iteration 0 leaves 1, iteration 1 leaves 4.
        assert_eq!(stack.snapshot(), vec![4, 1]);

        let lines: Vec<String> = stack
            .into_sink()
            .into_events()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            &lines[..5],
            ["Pushed 1", "Pushed 2", "Popped 2", "Pushed 3", "Popped 3"]
        );
    }

    #[test]
    fn test_run_workers_counts() {
        let stack = Arc::new(Stack::new());
        let outcome = run_workers(&stack, 8, 25).unwrap();

        assert_eq!(outcome.reports.len(), 8);
        assert_eq!(outcome.spawn_failures, 0);
        let totals = outcome
            .reports
            .iter()
            .fold(WorkerReport::default(), |acc, r| acc.merge(*r));
        assert_eq!(totals.pushes, 3 * 8 * 25);
        assert_eq!(totals.pops, 2 * 8 * 25);
        assert_eq!(stack.len(), 8 * 25);
    }

    #[test]
    fn test_run_writes_log_and_drains() {
        let dir = tempfile::tempdir().unwrap();
        let config = DriverConfig {
            workers: 4,
            iterations: 50,
            log_path: dir.path().join("output.txt"),
        };

        let summary = run(&config).unwrap();
        assert_eq!(summary.workers_spawned, 4);
        assert_eq!(summary.pushes, config.expected_pushes());
        assert_eq!(summary.pops, config.expected_pops());
        assert_eq!(summary.final_len, 200);
        assert_eq!(summary.drained, 200);
        assert_eq!(summary.worker_log_lines, 1_000);
        assert_eq!(summary.log_lines, 1_200);
        assert_eq!(summary.sink_failures, 0);

        let log = std::fs::read_to_string(&config.log_path).unwrap();
        assert_eq!(log.lines().count(), 1_200);
        assert!(log.lines().skip(1_000).all(|l| l.starts_with("Popped ")));
    }

    #[test]
    fn test_run_fails_on_unopenable_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = DriverConfig {
            workers: 1,
            iterations: 1,
            log_path: dir.path().join("missing").join("output.txt"),
        };

        let err = run(&config).unwrap_err();
        assert!(matches!(err, DriverError::LogFile { .. }), "{}", err);
    }

    #[test]
    fn test_summary_json_fields() {
        let summary = RunSummary {
            workers_requested: 2,
            workers_spawned: 2,
            spawn_failures: 0,
            iterations: 1,
            pushes: 6,
            pops: 4,
            empty_pops: 0,
            rejected_pushes: 0,
            final_len: 2,
            drained: 2,
            sink_failures: 0,
            log_path: "output.txt".to_string(),
            worker_log_lines: 10,
            log_lines: 12,
            elapsed_ms: 0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pushes"], 6);
        assert_eq!(json["drained"], 2);
        assert_eq!(json["log_path"], "output.txt");
        assert!(summary.to_string().starts_with("Program completed"));
    }
}
