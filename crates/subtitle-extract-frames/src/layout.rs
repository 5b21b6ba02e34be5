use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use subtitle_extract_types::FrameKey;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    #[default]
    Jpg,
    Png,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameFormat::Jpg => "jpg",
            FrameFormat::Png => "png",
        }
    }
}

impl FromStr for FrameFormat {
    type Err = FrameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(FrameFormat::Jpg),
            "png" => Ok(FrameFormat::Png),
            _ => Err(FrameError::Format {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk arrangement of sliced frames.
///
/// Frames live at `<dir>/hHHmMM/sSSfFF.<format>`; while ffmpeg is still
/// running they are staged as `<dir>/NNNNNN.<format>` with a 1-based counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    dir: PathBuf,
    format: FrameFormat,
}

impl FrameLayout {
    pub fn new(dir: impl Into<PathBuf>, format: FrameFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn minute_dir(&self, time: Duration) -> PathBuf {
        let secs = time.as_secs();
        self.dir
            .join(format!("h{:02}m{:02}", secs / 3600, (secs / 60) % 60))
    }

    pub fn path(&self, key: FrameKey) -> PathBuf {
        let secs = key.time.as_secs();
        self.minute_dir(key.time).join(format!(
            "s{:02}f{:02}.{}",
            secs % 60,
            key.frame,
            self.format
        ))
    }

    pub fn staging_path(&self, counter: u64) -> PathBuf {
        self.dir.join(format!("{counter:06}.{}", self.format))
    }

    /// Output pattern handed to ffmpeg.
    pub fn staging_pattern(&self) -> PathBuf {
        self.dir.join(format!("%06d.{}", self.format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_hour_minute_second_layout() {
        let layout = FrameLayout::new("/frames", FrameFormat::Png);
        let key = FrameKey::new(Duration::from_secs(3723), 4);
        assert_eq!(
            layout.path(key),
            PathBuf::from("/frames/h01m02/s03f04.png")
        );
        assert_eq!(layout.staging_path(12), PathBuf::from("/frames/000012.png"));
        assert_eq!(
            layout.staging_pattern(),
            PathBuf::from("/frames/%06d.png")
        );
    }

    #[test]
    fn format_parsing_is_case_insensitive() {
        assert_eq!("JPG".parse::<FrameFormat>().unwrap(), FrameFormat::Jpg);
        assert_eq!("png".parse::<FrameFormat>().unwrap(), FrameFormat::Png);
        assert!("bmp".parse::<FrameFormat>().is_err());
    }
}
