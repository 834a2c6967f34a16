/*!
    Presentation timestamps.
*/

use std::fmt;
use std::time::Duration;

/**
    Presentation timestamp in clock-rate ticks.

    The tick rate is the session's configured clock rate (1000 Hz unless
    overridden). Timestamps are carried through the decoder untouched and are
    the key by which displayed frames are released.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pts(pub i64);

impl Pts {
    /**
        Convert this PTS to a Duration using the given clock rate in Hz.

        Negative PTS values and a zero clock rate yield zero.
    */
    #[inline]
    pub fn to_duration(self, clock_rate: u32) -> Duration {
        if self.0 <= 0 || clock_rate == 0 {
            return Duration::ZERO;
        }
        let seconds = self.0 as f64 / f64::from(clock_rate);
        Duration::from_secs_f64(seconds)
    }

    /**
        Create a PTS from a Duration using the given clock rate in Hz.
    */
    #[inline]
    pub fn from_duration(duration: Duration, clock_rate: u32) -> Self {
        let ticks = (duration.as_secs_f64() * f64::from(clock_rate)).round() as i64;
        Self(ticks)
    }
}

impl fmt::Display for Pts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Pts {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Pts> for i64 {
    fn from(pts: Pts) -> Self {
        pts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_to_duration_milliseconds() {
        // 1000 ticks at 1000 Hz = 1 second
        assert_eq!(Pts(1000).to_duration(1000), Duration::from_secs(1));
    }

    #[test]
    fn pts_to_duration_mpeg_ts() {
        assert_eq!(Pts(90000).to_duration(90000), Duration::from_secs(1));
    }

    #[test]
    fn pts_negative_clamps_to_zero() {
        assert_eq!(Pts(-100).to_duration(1000), Duration::ZERO);
        assert_eq!(Pts(100).to_duration(0), Duration::ZERO);
    }

    #[test]
    fn pts_from_duration() {
        let pts = Pts::from_duration(Duration::from_millis(1500), 1000);
        assert_eq!(pts, Pts(1500));
    }

    #[test]
    fn pts_ordering() {
        assert!(Pts(100) < Pts(200));
        assert_eq!(Pts::from(7), Pts(7));
        assert_eq!(i64::from(Pts(7)), 7);
    }
}
