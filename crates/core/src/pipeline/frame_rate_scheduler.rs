use crate::shared::media_time::MediaTime;

/// Hands out presentation times on a fixed grid.
///
/// Emission `k` is scheduled at exactly `k * interval`, however long it
/// took to produce, so output spacing never follows producer jitter.
#[derive(Clone, Copy, Debug)]
pub struct FrameRateScheduler {
    interval: MediaTime,
    emitted: u64,
}

impl FrameRateScheduler {
    pub fn new(interval: MediaTime) -> Self {
        Self {
            interval,
            emitted: 0,
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(MediaTime::frame_interval(fps))
    }

    pub fn interval(&self) -> MediaTime {
        self.interval
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Presentation time of emission `k`.
    pub fn presentation_time(&self, k: u64) -> MediaTime {
        self.interval.scaled(k as i64)
    }

    /// Schedules the next emission and returns its presentation time.
    pub fn next(&mut self) -> MediaTime {
        let time = self.presentation_time(self.emitted);
        self.emitted += 1;
        time
    }
}
