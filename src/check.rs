use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageError, Rgb, RgbImage};
use subtitle_extract_segment::{RegionFormat, Segmentation};
use subtitle_extract_types::Coordinate;

use crate::settings::CheckConfig;

/// Colours of the debug overlay, one per pixel class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskPalette {
    pub cropped: [u8; 3],
    pub background: [u8; 3],
    pub text: [u8; 3],
    pub discarded: [u8; 3],
    /// Weight of the mask against the source frame.
    pub level: f64,
}

impl From<&CheckConfig> for MaskPalette {
    fn from(config: &CheckConfig) -> Self {
        Self {
            cropped: config.cropped.rgb(),
            background: config.background.rgb(),
            text: config.text.rgb(),
            discarded: config.discarded.rgb(),
            level: config.mask_level.clamp(0.0, 1.0),
        }
    }
}

impl MaskPalette {
    fn classify(&self, segmentation: &Segmentation, point: Coordinate) -> [u8; 3] {
        if !segmentation.crop.contains(point) {
            self.cropped
        } else if segmentation.optimized.is_black(point) {
            self.text
        } else if segmentation.binary.is_black(point) {
            self.discarded
        } else {
            self.background
        }
    }

    fn blend(&self, mask: [u8; 3], source: [u8; 3]) -> [u8; 3] {
        let mix = |m: u8, s: u8| (f64::from(m) * self.level + f64::from(s) * (1.0 - self.level)) as u8;
        [
            mix(mask[0], source[0]),
            mix(mask[1], source[1]),
            mix(mask[2], source[2]),
        ]
    }
}

/// Paints where each segmentation stage put every pixel, over the source.
pub fn render_mask(source: &RgbImage, segmentation: &Segmentation, palette: &MaskPalette) -> RgbImage {
    RgbImage::from_fn(source.width(), source.height(), |x, y| {
        let point = Coordinate::new(x as i32, y as i32);
        let mask = palette.classify(segmentation, point);
        Rgb(palette.blend(mask, source.get_pixel(x, y).0))
    })
}

pub fn save_image(path: &Path, image: &RgbImage, format: RegionFormat) -> Result<(), ImageError> {
    let file = File::create(path).map_err(ImageError::IoError)?;
    let mut writer = BufWriter::new(file);
    let (width, height) = image.dimensions();
    match format {
        RegionFormat::Png => {
            PngEncoder::new(&mut writer).write_image(image.as_raw(), width, height, ColorType::Rgb8)?
        }
        RegionFormat::Jpeg { quality } => JpegEncoder::new_with_quality(&mut writer, quality)
            .encode(image.as_raw(), width, height, ColorType::Rgb8)?,
    }
    writer.flush().map_err(ImageError::IoError)
}
