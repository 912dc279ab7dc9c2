//! DST runs of the tracked stack.
//!
//! Seeds come from `DST_SEED` (random otherwise, always printed) and the
//! number of runs from `DST_ITERATIONS`.

use tss_dst::{
    get_or_generate_seed, iterations_from_env, DeterministicRng, DstHarness, DstOp, DstRunner,
    FaultConfig, HarnessConfig, OpOutcome,
};
use tss_stack::TrackedStack;

/// Random script: mostly pushes and pops, an occasional drain.
fn random_ops(rng: &mut DeterministicRng, count: u64) -> Vec<DstOp> {
    (1..=count)
        .map(|value| match rng.gen_range(0..100u32) {
            0..=54 => DstOp::Push(value),
            55..=97 => DstOp::Pop,
            _ => DstOp::Drain,
        })
        .collect()
}

#[test]
fn test_dst_random_scripts_with_faults() {
    let base_seed = get_or_generate_seed();
    let runs = iterations_from_env(20);

    for run in 0..runs {
        let seed = base_seed.wrapping_add(run);
        let mut rng = DeterministicRng::new(seed);
        let ops = random_ops(&mut rng, 500);

        let mut runner: DstRunner<TrackedStack> = DstRunner::new(seed);
        for op in ops {
            if let Err(violation) = runner.apply(op) {
                panic!("{}\n{}", violation, runner.stats().format());
            }
        }
        if let Err(violation) = runner.check_invariants() {
            panic!("{}\n{}", violation, runner.stats().format());
        }
    }
}

#[test]
fn test_dst_aggressive_faults_keep_model_in_step() {
    let seed = get_or_generate_seed();
    let mut runner: DstRunner<TrackedStack> =
        DstRunner::with_fault_config(seed, FaultConfig::aggressive());

    let mut pushed = 0u64;
    let mut failed_allocations = 0u64;
    for value in 1..=2_000 {
        match runner.push(value) {
            Ok(OpOutcome::Pushed) => pushed += 1,
            Ok(OpOutcome::Faulted(tss_dst::FaultType::AllocationFailure)) => failed_allocations += 1,
            // A crash after the push still leaves the value on the stack.
            Ok(OpOutcome::Faulted(_)) => {}
            Ok(other) => panic!("unexpected push outcome {:?}", other),
            Err(violation) => panic!("{}", violation),
        }
        if value % 3 == 0 {
            if let Err(violation) = runner.pop() {
                panic!("{}", violation);
            }
        }
    }

    runner.check_invariants().unwrap_or_else(|v| panic!("{}", v));
    let stats = runner.stats();
    assert!(stats.faults_injected > 0, "{}", stats.format());
    assert_eq!(stats.allocation_failures, failed_allocations);
    assert!(pushed > 0);
}

#[test]
fn test_dst_same_seed_same_run() {
    let seed = get_or_generate_seed();
    let run = |seed| {
        let mut rng = DeterministicRng::new(seed);
        let ops = random_ops(&mut rng, 300);
        tss_dst::run_dst_scenario(seed, &ops)
    };

    let first = run(seed);
    let second = run(seed);
    assert!(first.passed, "{}", first.format());
    assert_eq!(first.stats.format(), second.stats.format());
    assert_eq!(first.stack_stats, second.stack_stats);
}

#[test]
fn test_dst_threaded_harness() {
    let seed = get_or_generate_seed();
    let result = DstHarness::new(seed, HarnessConfig::default()).run();
    assert!(result.all_invariants_held, "{}", result.format());
}

#[test]
#[ignore = "long-running; run with --ignored"]
fn test_dst_threaded_harness_stress() {
    let seed = get_or_generate_seed();
    for run in 0..iterations_from_env(5) {
        let result = DstHarness::new(seed.wrapping_add(run), HarnessConfig::stress()).run();
        assert!(result.all_invariants_held, "{}", result.format());
    }
}
