use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::{System, SystemExt};

use crate::buffer::domain::memory_pressure::MemoryPressureSignal;
use crate::shared::constants::DEFAULT_PRESSURE_THRESHOLD;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Edge detector over memory samples: fires once when available memory
/// drops below the threshold, then re-arms after it recovers.
#[derive(Debug)]
pub struct PressureTracker {
    threshold: f64,
    low: bool,
}

impl PressureTracker {
    /// `threshold` is the fraction of total memory that must stay available.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            low: false,
        }
    }

    /// Returns true when this sample enters the low-memory state.
    pub fn observe(&mut self, available: u64, total: u64) -> bool {
        if total == 0 {
            return false;
        }
        let ratio = available as f64 / total as f64;
        let was_low = self.low;
        self.low = ratio < self.threshold;
        self.low && !was_low
    }
}

impl Default for PressureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PRESSURE_THRESHOLD)
    }
}

/// Polls host memory on a background thread and raises a
/// [`MemoryPressureSignal`] when available memory runs low.
pub struct SystemMemoryMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SystemMemoryMonitor {
    pub fn start(signal: MemoryPressureSignal) -> Self {
        Self::with_settings(signal, PressureTracker::default(), DEFAULT_POLL_INTERVAL)
    }

    pub fn with_settings(
        signal: MemoryPressureSignal,
        mut tracker: PressureTracker,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            let mut sys = System::new();
            while !thread_stop.load(Ordering::Relaxed) {
                sys.refresh_memory();
                let available = sys.available_memory();
                let total = sys.total_memory();
                if tracker.observe(available, total) {
                    log::warn!(
                        "Available memory low: {} of {} MiB",
                        available / (1024 * 1024),
                        total / (1024 * 1024)
                    );
                    signal.notify();
                }
                std::thread::park_timeout(poll_interval);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for SystemMemoryMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("Memory monitor thread panicked");
            }
        }
    }
}
