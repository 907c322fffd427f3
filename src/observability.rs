use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for the writes issued through the gate
#[derive(Debug, Default)]
pub struct GateMetrics {
    pub completions: AtomicU64,
    pub rejections: AtomicU64,
    pub authorization_denials: AtomicU64,
    pub auto_advances: AtomicU64,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denial(&self) {
        self.authorization_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auto_advance(&self) {
        self.auto_advances.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> GateStats {
        GateStats {
            completions: self.completions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            authorization_denials: self.authorization_denials.load(Ordering::Relaxed),
            auto_advances: self.auto_advances.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Gate metrics: completions={}, rejections={}, denials={}, auto_advances={}",
            stats.completions, stats.rejections, stats.authorization_denials, stats.auto_advances
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateStats {
    pub completions: u64,
    pub rejections: u64,
    pub authorization_denials: u64,
    pub auto_advances: u64,
}

/// Logs how long an operation took when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
