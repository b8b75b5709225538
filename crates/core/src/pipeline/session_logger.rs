use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for encoding-session events.
///
/// Keeps the sink's pull loop independent of where progress and timing
/// end up (log output, a UI, nowhere).
pub trait SessionLogger: Send {
    /// Frames written so far out of the source's current expected total.
    fn progress(&mut self, written: usize, total: usize);

    /// Time spent in a named stage (`pull`, `encode`) for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Adds `value` to a named counter (e.g. `backpressure_waits`).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emits an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn progress(&mut self, _written: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running total of one stage's timings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageTiming {
    pub total_ms: f64,
    pub count: usize,
}

impl StageTiming {
    pub fn average_ms(&self) -> f64 {
        self.total_ms / self.count.max(1) as f64
    }
}

/// Reports through the `log` crate: throttled progress lines while the
/// session runs, then per-stage averages, counter totals and throughput.
pub struct StdoutSessionLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, StageTiming>,
    counters: BTreeMap<String, f64>,
    start_time: Instant,
    written: usize,
}

impl StdoutSessionLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            counters: BTreeMap::new(),
            start_time: Instant::now(),
            written: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was written.
    pub fn summary_string(&self) -> Option<String> {
        if self.written == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Encoding summary ({} frames, {elapsed_s:.1}s):",
            self.written
        )];

        for (stage, timing) in &self.timings {
            let avg_ms = timing.average_ms();
            let total_ms = timing.total_ms;
            lines.push(format!(
                "  {stage:8}: avg {avg_ms:6.2}ms  total {total_ms:8.0}ms"
            ));
        }
        for (name, total) in &self.counters {
            lines.push(format!("  {name}: {total}"));
        }
        if self.written > 0 && elapsed_s > 0.0 {
            let fps = self.written as f64 / elapsed_s;
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<StageTiming> {
        self.timings.get(stage).copied()
    }

    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn progress(&mut self, written: usize, total: usize) {
        self.written = written;
        if total > 0 && (written % self.throttle_frames == 0 || written == total) {
            let pct = written as f64 / total as f64 * 100.0;
            log::info!("Encoding: {written}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        let timing = self.timings.entry(stage.to_string()).or_default();
        timing.total_ms += duration_ms;
        timing.count += 1;
    }

    fn metric(&mut self, name: &str, value: f64) {
        *self.counters.entry(name.to_string()).or_default() += value;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
