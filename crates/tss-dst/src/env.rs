//! The DST environment: seed, randomness, faults and time in one place.

use crate::clock::SimClock;
use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Deterministic simulation environment.
#[derive(Debug, Clone)]
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    fault: FaultInjector,
    clock: SimClock,
}

impl DstEnv {
    /// Environment with the default fault configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    pub fn with_fault_config(seed: u64, config: FaultConfig) -> Self {
        Self {
            seed,
            rng: DeterministicRng::new(seed),
            fault: FaultInjector::new(DeterministicRng::new(seed.wrapping_add(1)), config),
            clock: SimClock::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }

    pub fn clock(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    /// Advance simulated time if the injector asks for a delay.
    pub fn maybe_delay(&mut self) {
        if let Some(us) = self.fault.maybe_delay_us() {
            self.clock.advance_us(us);
        }
    }

    /// `DST_SEED=<seed>` for failure messages.
    pub fn format_seed(&self) -> String {
        format!("DST_SEED={}", self.seed)
    }

    /// One-line summary of the run so far.
    pub fn stats(&self) -> String {
        let fault = self.fault.stats();
        format!(
            "{} checks={} faults={} delays={} sim_time_ns={}",
            self.format_seed(),
            fault.checks_count,
            fault.faults_count,
            fault.delays_count,
            self.clock.now_ns()
        )
    }
}
