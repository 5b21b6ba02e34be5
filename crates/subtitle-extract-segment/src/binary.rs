use std::fmt;

use image::{GrayImage, Luma, RgbImage};
use subtitle_extract_types::{Coordinate, Rect};

pub const BLACK: u8 = 0;
pub const WHITE: u8 = 255;

/// Two-level image whose pixels live in source-image coordinates.
///
/// Every segmentation stage builds a new `BinaryImage`; once a stage returns
/// its result the pixels are never touched again.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryImage {
    bounds: Rect,
    pixels: Vec<u8>,
}

impl BinaryImage {
    pub fn new_white(bounds: Rect) -> Self {
        let len = usize::try_from(bounds.area()).unwrap_or(0);
        Self {
            bounds,
            pixels: vec![WHITE; len],
        }
    }

    /// Builds an image from row-major pixel values. Any value other than
    /// [`BLACK`] is stored as [`WHITE`]. Returns `None` on a length mismatch.
    pub fn from_pixels(bounds: Rect, pixels: Vec<u8>) -> Option<Self> {
        if i64::try_from(pixels.len()).ok()? != bounds.area() {
            return None;
        }
        let pixels = pixels
            .into_iter()
            .map(|value| if value == BLACK { BLACK } else { WHITE })
            .collect();
        Some(Self { bounds, pixels })
    }

    pub(crate) fn from_raw(bounds: Rect, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len() as i64, bounds.area());
        Self { bounds, pixels }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn width(&self) -> u32 {
        self.bounds.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.bounds.height() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Pixel value at `point`, or `None` outside the bounds.
    pub fn get(&self, point: Coordinate) -> Option<u8> {
        if !self.bounds.contains(point) {
            return None;
        }
        self.pixels.get(self.bounds.index_of(point)).copied()
    }

    pub fn is_black(&self, point: Coordinate) -> bool {
        self.get(point) == Some(BLACK)
    }

    pub(crate) fn set(&mut self, point: Coordinate, value: u8) {
        if self.bounds.contains(point) {
            let index = self.bounds.index_of(point);
            self.pixels[index] = value;
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn black_count(&self) -> usize {
        self.pixels.iter().filter(|&&value| value == BLACK).count()
    }

    /// All BLACK coordinates in row-major order.
    pub fn black_coordinates(&self) -> Vec<Coordinate> {
        let width = self.bounds.width() as usize;
        if width == 0 {
            return Vec::new();
        }
        self.pixels
            .iter()
            .enumerate()
            .filter(|(_, value)| **value == BLACK)
            .map(|(index, _)| {
                Coordinate::new(
                    self.bounds.min_x + (index % width) as i32,
                    self.bounds.min_y + (index / width) as i32,
                )
            })
            .collect()
    }

    /// Copies the pixels into an 8-bit grey buffer anchored at the origin.
    pub fn to_gray(&self) -> GrayImage {
        let mut image = GrayImage::new(self.width(), self.height());
        for (pixel, value) in image.pixels_mut().zip(self.pixels.iter()) {
            *pixel = Luma([*value]);
        }
        image
    }
}

impl fmt::Debug for BinaryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryImage")
            .field("bounds", &self.bounds)
            .field("black", &self.black_count())
            .finish()
    }
}

/// A rectangular window onto a decoded colour frame.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    image: &'a RgbImage,
    bounds: Rect,
}

impl<'a> FrameView<'a> {
    pub fn full(image: &'a RgbImage) -> Self {
        Self {
            image,
            bounds: Rect::from_size(image.width(), image.height()),
        }
    }

    /// Restricts the view to `bounds`, clipped to the image.
    pub fn new(image: &'a RgbImage, bounds: Rect) -> Self {
        let clipped = bounds.intersect(&Rect::from_size(image.width(), image.height()));
        Self {
            image,
            bounds: clipped,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn image(&self) -> &'a RgbImage {
        self.image
    }

    /// Colour at `point`, or `None` outside the view.
    pub fn rgb(&self, point: Coordinate) -> Option<[u8; 3]> {
        if !self.bounds.contains(point) {
            return None;
        }
        Some(self.image.get_pixel(point.x as u32, point.y as u32).0)
    }
}

impl fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameView")
            .field("bounds", &self.bounds)
            .finish()
    }
}
