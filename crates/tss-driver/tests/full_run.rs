//! A default-sized driver run: 200 workers x 500 iterations.

use std::fs;

use tss_driver::{run, DriverConfig};

#[test]
fn test_default_run_counts() {
    let dir = tempfile::tempdir().unwrap();
    let config = DriverConfig {
        log_path: dir.path().join("output.txt"),
        ..DriverConfig::default()
    };

    let summary = run(&config).unwrap();
    assert_eq!(summary.workers_spawned, 200);
    assert_eq!(summary.spawn_failures, 0);
    assert_eq!(summary.final_len, 100_000);
    assert_eq!(summary.drained, 100_000);
    assert_eq!(summary.empty_pops, 0);

    assert_eq!(summary.worker_log_lines, 500_000);
    assert_eq!(summary.log_lines, 600_000);

    // Workers wrote the first 500000 lines; drain appended its pops.
    let log = fs::read_to_string(&config.log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    let (workers, drain) = lines.split_at(500_000);
    let pushed = workers.iter().filter(|l| l.starts_with("Pushed ")).count();
    let popped = workers.iter().filter(|l| l.starts_with("Popped ")).count();
    assert_eq!(pushed, 300_000);
    assert_eq!(popped, 200_000);
    assert_eq!(drain.len(), 100_000);
    assert!(drain.iter().all(|l| l.starts_with("Popped ")));
}

#[test]
fn test_rerun_truncates_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = DriverConfig {
        workers: 2,
        iterations: 3,
        log_path: dir.path().join("output.txt"),
    };

    run(&config).unwrap();
    run(&config).unwrap();

    let log = fs::read_to_string(&config.log_path).unwrap();
    // Five worker lines per iteration plus one drain line per survivor.
    assert_eq!(log.lines().count(), 2 * 3 * 5 + 2 * 3);
}
