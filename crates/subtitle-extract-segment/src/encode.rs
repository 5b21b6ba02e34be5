use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};

use crate::binary::BinaryImage;
use crate::error::SegmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionFormat {
    Png,
    Jpeg { quality: u8 },
}

impl RegionFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RegionFormat::Png => "png",
            RegionFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// Encodes a region as an 8-bit grey image.
pub fn encode_region(region: &BinaryImage, format: RegionFormat) -> Result<Vec<u8>, SegmentError> {
    if region.is_empty() {
        return Err(SegmentError::EmptyRegion);
    }
    let gray = region.to_gray();
    let (width, height) = gray.dimensions();
    let mut encoded = Vec::new();
    match format {
        RegionFormat::Png => {
            let encoder = PngEncoder::new(&mut encoded);
            encoder.write_image(gray.as_raw(), width, height, ColorType::L8)?;
        }
        RegionFormat::Jpeg { quality } => {
            let mut encoder = JpegEncoder::new_with_quality(&mut encoded, quality);
            encoder.encode(gray.as_raw(), width, height, ColorType::L8)?;
        }
    }
    Ok(encoded)
}
