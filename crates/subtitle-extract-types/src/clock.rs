use std::fmt;
use std::time::Duration;

use crate::{TypesError, TypesResult};

/// Identity of one sliced frame: whole-second timestamp plus sub-frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub time: Duration,
    pub frame: u32,
}

impl FrameKey {
    pub const fn new(time: Duration, frame: u32) -> Self {
        Self { time, frame }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", format_clock(self.time), self.frame)
    }
}

/// Enumerates frame keys in submission order.
///
/// Within one timestamp the sub-frame index steps by `stride` for `fps`
/// steps, then time advances by `interval` and the index resets to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    fps: u32,
    stride: u32,
    interval: Duration,
}

impl FrameClock {
    pub fn new(fps: u32, stride: u32, interval: Duration) -> TypesResult<Self> {
        if fps == 0 {
            return Err(TypesError::FrameClock {
                message: "fps must be positive".into(),
            });
        }
        if stride == 0 {
            return Err(TypesError::FrameClock {
                message: "fps factor must be positive".into(),
            });
        }
        if interval.is_zero() {
            return Err(TypesError::FrameClock {
                message: "frame interval must be positive".into(),
            });
        }
        Ok(Self {
            fps,
            stride,
            interval,
        })
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn first(&self, begin: Duration) -> FrameKey {
        FrameKey::new(begin, 0)
    }

    pub fn advance(&self, key: FrameKey) -> FrameKey {
        let frame = key.frame.saturating_add(self.stride);
        if frame >= self.fps.saturating_mul(self.stride) {
            FrameKey::new(key.time.saturating_add(self.interval), 0)
        } else {
            FrameKey::new(key.time, frame)
        }
    }

    /// All keys whose time lies in `[begin, end)`.
    pub fn keys(&self, begin: Duration, end: Duration) -> impl Iterator<Item = FrameKey> + use<> {
        let clock = *self;
        std::iter::successors(Some(clock.first(begin)), move |key| Some(clock.advance(*key)))
            .take_while(move |key| key.time < end)
    }

    /// Millisecond offset of a sub-frame index within its second.
    pub fn millis(&self, frame: u32) -> u32 {
        let per_second = f64::from(self.fps) * f64::from(self.stride);
        (1000.0 / per_second * f64::from(frame)) as u32
    }
}

/// Parses `hh:mm:ss` into a duration.
pub fn parse_clock(input: &str) -> TypesResult<Duration> {
    let err = || TypesError::Clock {
        input: input.to_string(),
    };
    let mut parts = input.trim().splitn(3, ':');
    let mut next = || -> TypesResult<u64> {
        let part = parts.next().ok_or_else(err)?;
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(err());
        }
        digits.parse().map_err(|_| err())
    };
    let hours = next()?;
    let minutes = next()?;
    let seconds = next()?;
    let total = hours
        .checked_mul(3600)
        .and_then(|secs| minutes.checked_mul(60)?.checked_add(secs))
        .and_then(|secs| secs.checked_add(seconds))
        .ok_or_else(err)?;
    Ok(Duration::from_secs(total))
}

pub fn format_clock(time: Duration) -> String {
    let total = time.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_after_fps_steps() {
        let clock = FrameClock::new(3, 2, Duration::from_secs(1)).unwrap();
        let mut key = clock.first(Duration::from_secs(5));
        key = clock.advance(key);
        assert_eq!(key, FrameKey::new(Duration::from_secs(5), 2));
        key = clock.advance(key);
        assert_eq!(key, FrameKey::new(Duration::from_secs(5), 4));
        key = clock.advance(key);
        assert_eq!(key, FrameKey::new(Duration::from_secs(6), 0));
    }

    #[test]
    fn keys_cover_half_open_range() {
        let clock = FrameClock::new(2, 1, Duration::from_secs(2)).unwrap();
        let keys: Vec<FrameKey> = clock
            .keys(Duration::from_secs(0), Duration::from_secs(4))
            .collect();
        assert_eq!(
            keys,
            vec![
                FrameKey::new(Duration::from_secs(0), 0),
                FrameKey::new(Duration::from_secs(0), 1),
                FrameKey::new(Duration::from_secs(2), 0),
                FrameKey::new(Duration::from_secs(2), 1),
            ]
        );
    }

    #[test]
    fn rejects_zero_parameters() {
        assert!(FrameClock::new(0, 1, Duration::from_secs(1)).is_err());
        assert!(FrameClock::new(1, 0, Duration::from_secs(1)).is_err());
        assert!(FrameClock::new(1, 1, Duration::ZERO).is_err());
    }

    #[test]
    fn millis_scale_with_stride() {
        let clock = FrameClock::new(4, 5, Duration::from_secs(1)).unwrap();
        assert_eq!(clock.millis(0), 0);
        assert_eq!(clock.millis(5), 250);
        assert_eq!(clock.millis(15), 750);
    }

    #[test]
    fn clock_text_round_trip() {
        let time = parse_clock("01:02:03").unwrap();
        assert_eq!(time, Duration::from_secs(3723));
        assert_eq!(format_clock(time), "01:02:03");
        assert_eq!(parse_clock("00:00:07.52").unwrap(), Duration::from_secs(7));
        assert!(parse_clock("1:2").is_err());
        assert!(parse_clock("aa:00:00").is_err());
    }

    #[test]
    fn oversized_clock_is_rejected() {
        assert!(parse_clock("99999999999999999:00:00").is_err());
        assert!(parse_clock("00:99999999999999999999:00").is_err());
        assert_eq!(
            parse_clock("99:59:59").unwrap(),
            Duration::from_secs(99 * 3600 + 59 * 60 + 59)
        );
    }

    #[test]
    fn key_display_pads_sub_frame() {
        let key = FrameKey::new(Duration::from_secs(61), 3);
        assert_eq!(key.to_string(), "00:01:01/03");
    }
}
