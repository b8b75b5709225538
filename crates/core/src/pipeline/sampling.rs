use crate::shared::constants::{DEFAULT_SPEED, DEFAULT_TARGET_FPS};
use crate::shared::media_time::MediaTime;
use crate::shared::pipeline_error::PipelineError;

/// Output rate and playback speed-up of a timelapse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelapseSettings {
    pub target_fps: u32,
    pub speed: f64,
}

impl TimelapseSettings {
    pub fn new(target_fps: u32, speed: f64) -> Result<Self, PipelineError> {
        if target_fps == 0 {
            return Err(PipelineError::InvalidRequest("fps must be positive".into()));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PipelineError::InvalidRequest(format!(
                "speed must be a positive number, got {speed}"
            )));
        }
        Ok(Self { target_fps, speed })
    }

    pub fn frame_interval(&self) -> MediaTime {
        MediaTime::frame_interval(self.target_fps)
    }

    /// Source frames sampled per second of source time.
    pub fn samples_per_second(&self) -> f64 {
        self.target_fps as f64 / self.speed
    }
}

impl Default for TimelapseSettings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            speed: DEFAULT_SPEED,
        }
    }
}

/// Finest grid the samples are placed on when the clip's own timescale is
/// coarser.
const MIN_SAMPLING_TIMESCALE: i32 = 600;

/// Evenly spaced source times for a timelapse of a clip lasting `duration`.
///
/// Takes `floor(seconds * fps / speed)` samples. The step is whole ticks of
/// the duration's timescale (refined to at least 1/600s), so the last
/// sample never runs past the end.
pub fn sample_timestamps(duration: MediaTime, settings: &TimelapseSettings) -> Vec<MediaTime> {
    let samples = (duration.seconds() * settings.samples_per_second()).floor();
    if !samples.is_finite() || samples < 1.0 || duration.value() <= 0 {
        return Vec::new();
    }
    let timescale = duration.timescale().max(MIN_SAMPLING_TIMESCALE);
    let ticks = duration.rescale(timescale as i64);
    let samples = (samples as i64).min(ticks);
    let step = ticks / samples;
    (0..samples)
        .map(|i| MediaTime::new(i * step, timescale))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let settings = TimelapseSettings::default();
        assert_eq!(settings.target_fps, 30);
        assert_relative_eq!(settings.speed, 2.0);
        assert_relative_eq!(settings.samples_per_second(), 15.0);
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(TimelapseSettings::new(0, 1.0).is_err());
        assert!(TimelapseSettings::new(30, 0.0).is_err());
        assert!(TimelapseSettings::new(30, -2.0).is_err());
        assert!(TimelapseSettings::new(30, f64::NAN).is_err());
        assert!(TimelapseSettings::new(24, 0.5).is_ok());
    }

    #[test]
    fn test_ten_second_clip_at_double_speed() {
        let duration = MediaTime::new(6000, 600);
        let times = sample_timestamps(duration, &TimelapseSettings::default());

        assert_eq!(times.len(), 150);
        assert_eq!(times[0], MediaTime::ZERO);
        assert_eq!(times[1], MediaTime::new(1, 15));
        assert_eq!(times[149], MediaTime::new(149 * 40, 600));
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[rstest]
    #[case::slow_motion(MediaTime::new(2, 1), 30, 0.5, 120)]
    #[case::real_time(MediaTime::new(1, 1), 25, 1.0, 25)]
    #[case::fractional_count(MediaTime::new(1001, 1000), 10, 3.0, 3)]
    #[case::too_short(MediaTime::new(1, 100), 30, 2.0, 0)]
    #[case::empty(MediaTime::ZERO, 30, 2.0, 0)]
    fn test_sample_count(
        #[case] duration: MediaTime,
        #[case] fps: u32,
        #[case] speed: f64,
        #[case] expected: usize,
    ) {
        let settings = TimelapseSettings::new(fps, speed).unwrap();
        assert_eq!(sample_timestamps(duration, &settings).len(), expected);
    }

    #[test]
    fn test_coarse_timescale_is_refined() {
        let settings = TimelapseSettings::new(10, 2.0).unwrap();
        let times = sample_timestamps(MediaTime::new(2, 1), &settings);

        assert_eq!(times.len(), 10);
        assert_eq!(times[1], MediaTime::new(1, 5));
        assert_eq!(times[9], MediaTime::new(9, 5));
    }

    #[test]
    fn test_samples_stay_inside_clip() {
        let duration = MediaTime::new(1001, 30000);
        let settings = TimelapseSettings::new(240, 0.25).unwrap();
        let times = sample_timestamps(duration, &settings);

        assert!(!times.is_empty());
        assert!(times.iter().all(|t| *t < duration));
    }
}
