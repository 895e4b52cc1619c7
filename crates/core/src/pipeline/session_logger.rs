use std::collections::HashMap;
use std::time::Instant;

use crate::pipeline::session_snapshot::SessionSnapshot;
use crate::pipeline::session_status::SessionStatus;

/// Cross-cutting logger for session orchestration events.
///
/// Keeps the runner independent of where its observations end up
/// (log output, a UI, or nowhere).
pub trait SessionLogger: Send {
    /// Observe the session state after a transition.
    fn snapshot(&mut self, snapshot: &SessionSnapshot);

    /// Record how long a named stage took (e.g. one pose from prompt to capture).
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. capture failures).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and embedders with their own UI.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn snapshot(&mut self, _snapshot: &SessionSnapshot) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs status changes through `log` and aggregates timings and metrics
/// into a summary.
pub struct StdoutSessionLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    last_status: Option<SessionStatus>,
    captures: usize,
    messages: Vec<String>,
}

impl StdoutSessionLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            last_status: None,
            captures: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} captures, {elapsed_s:.1}s total):",
            self.captures
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:7.1}ms  total {total_ms:7.0}ms  (n={})",
                durations.len()
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let total: f64 = self.metrics[name].iter().sum();
            lines.push(format!("  {name}: total {total:.0}"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn snapshot(&mut self, snapshot: &SessionSnapshot) {
        if self.last_status != Some(snapshot.status) {
            log::info!(
                "Session {} ({}/{} captured)",
                snapshot.status,
                snapshot.captures.len(),
                crate::shared::pose::POSE_COUNT
            );
            self.last_status = Some(snapshot.status);
        }
        self.captures = snapshot.captures.len();
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
