//! Probabilistic fault decisions driven by the seeded RNG.

use crate::random::DeterministicRng;

/// Fault injection configuration.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability that an operation boundary injects a fault
    pub failure_probability: f64,
    /// Probability that an operation boundary injects a delay
    pub delay_probability: f64,
    /// Upper bound for injected delays (microseconds)
    pub delay_us_max: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.05,
            delay_probability: 0.1,
            delay_us_max: 100,
        }
    }
}

impl FaultConfig {
    /// No faults, no delays.
    pub fn none() -> Self {
        Self {
            failure_probability: 0.0,
            delay_probability: 0.0,
            delay_us_max: 0,
        }
    }

    /// Frequent faults for stress runs.
    pub fn aggressive() -> Self {
        Self {
            failure_probability: 0.25,
            delay_probability: 0.3,
            delay_us_max: 1_000,
        }
    }
}

/// Counters for injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub checks_count: u64,
    pub faults_count: u64,
    pub delays_count: u64,
}

/// Decides when to inject faults.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Should the current operation fail?
    pub fn should_fail(&mut self) -> bool {
        self.stats.checks_count += 1;
        let fail = self.rng.gen_bool(self.config.failure_probability);
        if fail {
            self.stats.faults_count += 1;
        }
        fail
    }

    /// Delay to inject at the current boundary, if any (microseconds).
    pub fn maybe_delay_us(&mut self) -> Option<u64> {
        if self.config.delay_us_max == 0 || !self.rng.gen_bool(self.config.delay_probability) {
            return None;
        }
        self.stats.delays_count += 1;
        Some(self.rng.gen_range(1..=self.config.delay_us_max))
    }

    /// Pick one of `choices` uniformly.
    pub fn choose<T: Copy>(&mut self, choices: &[T]) -> Option<T> {
        if choices.is_empty() {
            return None;
        }
        Some(choices[self.rng.gen_range(0..choices.len())])
    }

    pub fn stats(&self) -> FaultStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_fails() {
        let mut injector = FaultInjector::new(DeterministicRng::new(1), FaultConfig::none());
        for _ in 0..1000 {
            assert!(!injector.should_fail());
            assert!(injector.maybe_delay_us().is_none());
        }
        assert_eq!(injector.stats().checks_count, 1000);
        assert_eq!(injector.stats().faults_count, 0);
    }

    #[test]
    fn test_aggressive_fails_sometimes() {
        let mut injector = FaultInjector::new(DeterministicRng::new(2), FaultConfig::aggressive());
        let faults = (0..1000).filter(|_| injector.should_fail()).count();
        assert!(faults > 100 && faults < 400, "faults={}", faults);
    }

    #[test]
    fn test_delay_bounded() {
        let mut injector = FaultInjector::new(DeterministicRng::new(5), FaultConfig::aggressive());
        for _ in 0..1000 {
            if let Some(us) = injector.maybe_delay_us() {
                assert!((1..=1_000).contains(&us));
            }
        }
        assert!(injector.stats().delays_count > 0);
    }
}
