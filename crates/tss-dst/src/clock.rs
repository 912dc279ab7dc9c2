//! Simulated time. Only advances when told to.

/// Deterministic clock in nanoseconds.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ns: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    pub fn advance_ns(&mut self, ns: u64) {
        self.now_ns = self.now_ns.saturating_add(ns);
    }

    pub fn advance_us(&mut self, us: u64) {
        self.advance_ns(us.saturating_mul(1_000));
    }
}
