use std::sync::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct StatsInner {
    total_cost: f64,
    n_calls: u64,
}

/// Shared accumulator of model usage across client instances.
///
/// Wrap in an `Arc` and pass the same instance to every
/// [`crate::model::ModelClient`] that should contribute to one total;
/// clients that should not share simply get their own instance.
#[derive(Debug, Default)]
pub struct UsageStats {
    inner: Mutex<StatsInner>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call with its cost. Cost may be 0.0 (cost
    /// tracking in ignore-errors mode) but never negative.
    pub fn add(&self, cost: f64) {
        debug_assert!(cost >= 0.0);
        let mut inner = self.inner.lock().unwrap();
        inner.total_cost += cost;
        inner.n_calls += 1;
    }

    pub fn total_cost(&self) -> f64 {
        self.inner.lock().unwrap().total_cost
    }

    pub fn n_calls(&self) -> u64 {
        self.inner.lock().unwrap().n_calls
    }
}
