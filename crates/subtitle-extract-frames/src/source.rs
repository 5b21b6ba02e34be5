use std::collections::BTreeMap;
use std::io::ErrorKind;

use image::RgbImage;
use subtitle_extract_types::FrameKey;

use crate::error::{FrameError, FrameResult};
use crate::layout::FrameLayout;

/// Supplies decoded frames by key.
///
/// `Ok(None)` means the frame does not exist, which callers treat as the
/// end of the available frames. Any other failure is an error.
pub trait FrameSource: Send + Sync {
    fn load(&self, key: FrameKey) -> FrameResult<Option<RgbImage>>;
}

/// Reads frames from a sliced directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryFrames {
    layout: FrameLayout,
}

impl DirectoryFrames {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }
}

impl FrameSource for DirectoryFrames {
    fn load(&self, key: FrameKey) -> FrameResult<Option<RgbImage>> {
        let path = self.layout.path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FrameError::io(path, err)),
        };
        let image = image::load_from_memory(&bytes)
            .map_err(|source| FrameError::Decode { path, source })?;
        Ok(Some(image.to_rgb8()))
    }
}

/// Frames held in memory; keys not present read as missing.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrames {
    frames: BTreeMap<FrameKey, RgbImage>,
}

impl MemoryFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FrameKey, image: RgbImage) {
        self.frames.insert(key, image);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<(FrameKey, RgbImage)> for MemoryFrames {
    fn from_iter<T: IntoIterator<Item = (FrameKey, RgbImage)>>(iter: T) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl FrameSource for MemoryFrames {
    fn load(&self, key: FrameKey) -> FrameResult<Option<RgbImage>> {
        Ok(self.frames.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::Rgb;

    use super::*;
    use crate::layout::FrameFormat;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let frames = DirectoryFrames::new(FrameLayout::new(dir.path(), FrameFormat::Png));
        let key = FrameKey::new(Duration::from_secs(5), 0);
        assert!(frames.load(key).unwrap().is_none());
    }

    #[test]
    fn png_frame_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FrameLayout::new(dir.path(), FrameFormat::Png);
        let key = FrameKey::new(Duration::from_secs(61), 2);
        let path = layout.path(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(1, 1, Rgb([10, 20, 30]));
        image.save(&path).unwrap();

        let frames = DirectoryFrames::new(layout);
        let loaded = frames.load(key).unwrap().unwrap();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FrameLayout::new(dir.path(), FrameFormat::Jpg);
        let key = FrameKey::new(Duration::ZERO, 0);
        let path = layout.path(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let err = DirectoryFrames::new(layout).load(key).unwrap_err();
        assert!(matches!(err, FrameError::Decode { .. }));
    }

    #[test]
    fn memory_frames_report_absent_keys() {
        let key = FrameKey::new(Duration::ZERO, 0);
        let frames: MemoryFrames = [(key, RgbImage::new(1, 1))].into_iter().collect();
        assert!(frames.load(key).unwrap().is_some());
        assert!(
            frames
                .load(FrameKey::new(Duration::from_secs(1), 0))
                .unwrap()
                .is_none()
        );
    }
}
