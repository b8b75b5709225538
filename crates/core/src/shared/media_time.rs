use std::cmp::Ordering;
use std::fmt;

/// A point or span on a media timeline: `value / timescale` seconds.
///
/// Arithmetic stays in integer ticks so that repeated addition of a frame
/// interval never drifts. Comparison is by the represented instant, so
/// `1/30` and `2/60` are equal.
#[derive(Clone, Copy, Debug)]
pub struct MediaTime {
    value: i64,
    timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    /// Creates a time of `value / timescale` seconds.
    ///
    /// A non-positive timescale is treated as 1.
    pub fn new(value: i64, timescale: i32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    /// The interval between frames at `fps` frames per second.
    pub fn frame_interval(fps: u32) -> Self {
        Self::new(1, fps.max(1) as i32)
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn timescale(&self) -> i32 {
        self.timescale
    }

    pub fn seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Returns `self * factor`, keeping the timescale.
    pub fn scaled(&self, factor: i64) -> Self {
        Self::new(self.value.saturating_mul(factor), self.timescale)
    }

    /// Returns `self + other` in the finer of the two timescales when one
    /// divides the other, otherwise in the product timescale.
    pub fn add(&self, other: MediaTime) -> Self {
        if self.timescale == other.timescale {
            return Self::new(self.value.saturating_add(other.value), self.timescale);
        }
        let (a, b) = (self.timescale as i64, other.timescale as i64);
        let timescale = if a % b == 0 {
            a
        } else if b % a == 0 {
            b
        } else {
            a * b
        };
        let lhs = self.value.saturating_mul(timescale / a);
        let rhs = other.value.saturating_mul(timescale / b);
        Self::new(
            lhs.saturating_add(rhs),
            i32::try_from(timescale).unwrap_or(i32::MAX),
        )
    }

    /// Converts to ticks of `1 / timescale`, rounding to nearest.
    pub fn rescale(&self, timescale: i64) -> i64 {
        let num = self.value as i128 * timescale as i128;
        let den = self.timescale as i128;
        let rounded = if num >= 0 {
            (num + den / 2) / den
        } else {
            (num - den / 2) / den
        };
        rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Builds a time from a tick count in a rational time base `num / den`.
    pub fn from_time_base(ticks: i64, num: i32, den: i32) -> Self {
        if num == 1 {
            return Self::new(ticks, den);
        }
        Self::new(ticks.saturating_mul(num as i64), den)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.value, self.timescale)
    }
}
