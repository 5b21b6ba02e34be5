use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("unsupported pixel connectivity: {value} (expected 4 or 8)")]
    Connectivity { value: u32 },

    #[error("region has no pixels to encode")]
    EmptyRegion,

    #[error("failed to encode region: {0}")]
    Encode(#[from] image::ImageError),
}
