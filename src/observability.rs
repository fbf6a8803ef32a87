use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageMetrics>,
    pub unknown_stages: Vec<String>,
    pub total_duration_ms: f64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StageMetrics {
    pub calls: u64,
    pub artifacts: u64,
    pub duration_ms: f64,
}

/// Stage timings for a single `run` invocation.
#[derive(Debug, Default)]
pub struct RunMetrics {
    inner: RefCell<MetricsSnapshot>,
}

impl RunMetrics {
    pub fn record_stage(&self, stage: &str, elapsed: Duration, artifacts: usize) {
        let duration_ms = elapsed.as_secs_f64() * 1_000.0;
        let mut snapshot = self.inner.borrow_mut();
        let entry = snapshot.stages.entry(stage.to_string()).or_default();
        entry.calls += 1;
        entry.artifacts += artifacts as u64;
        entry.duration_ms += duration_ms;
        debug!(stage, duration_ms, artifacts, "Stage finished");
    }

    pub fn record_unknown(&self, stage: &str) {
        self.inner.borrow_mut().unknown_stages.push(stage.to_string());
    }

    pub fn finish(&self, total: Duration) {
        self.inner.borrow_mut().total_duration_ms = total.as_secs_f64() * 1_000.0;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.borrow().clone()
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        total_duration_ms = snapshot.total_duration_ms,
        stages = snapshot.stages.len(),
        unknown = ?snapshot.unknown_stages,
        "Run metrics"
    );
    for (stage, metrics) in &snapshot.stages {
        info!(
            stage = stage.as_str(),
            calls = metrics.calls,
            artifacts = metrics.artifacts,
            duration_ms = metrics.duration_ms,
            "Stage metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_stages_accumulate() {
        let metrics = RunMetrics::default();
        metrics.record_stage("audio", Duration::from_millis(2), 2);
        metrics.record_stage("audio", Duration::from_millis(3), 2);
        metrics.record_unknown("color_grade");
        metrics.finish(Duration::from_millis(10));

        let snapshot = metrics.snapshot();
        let audio = &snapshot.stages["audio"];
        assert_eq!(audio.calls, 2);
        assert_eq!(audio.artifacts, 4);
        assert!((audio.duration_ms - 5.0).abs() < 1e-6);
        assert_eq!(snapshot.unknown_stages, vec!["color_grade"]);
        assert!((snapshot.total_duration_ms - 10.0).abs() < 1e-6);
    }
}
