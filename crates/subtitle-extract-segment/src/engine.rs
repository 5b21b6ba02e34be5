use image::RgbImage;
use rayon::prelude::*;
use subtitle_extract_types::{ColorGroup, Coordinate, Rect};

use crate::binary::{BLACK, BinaryImage, FrameView, WHITE};
use crate::config::{OptimizerConfig, SegmenterConfig};
use crate::scratch::{Scratch, ScratchPool};

/// Everything one frame produced on its way through the engine.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub crop: Rect,
    pub binary: BinaryImage,
    pub optimized: BinaryImage,
    pub kept: Vec<Coordinate>,
    /// Padded text region, `None` when no blob survived.
    pub region: Option<BinaryImage>,
}

impl Segmentation {
    pub fn has_text(&self) -> bool {
        self.region.is_some()
    }
}

pub struct Segmenter {
    config: SegmenterConfig,
    scratch: ScratchPool,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            scratch: ScratchPool::default(),
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Crop rectangle for a frame of the given size, clipped to the frame.
    pub fn crop_rect(&self, width: u32, height: u32) -> Rect {
        let area = &self.config.crop;
        let w = i64::from(width);
        let h = i64::from(height);
        Rect::new(
            saturate(area.left.calculate(w)),
            saturate(area.top.calculate(h)),
            saturate(area.right.calculate(w)),
            saturate(area.bottom.calculate(h)),
        )
        .intersect(&Rect::from_size(width, height))
    }

    pub fn crop<'a>(&self, image: &'a RgbImage) -> FrameView<'a> {
        FrameView::new(image, self.crop_rect(image.width(), image.height()))
    }

    /// Classifies each pixel of the view against the text colours.
    ///
    /// Rows are classified in parallel; coordinates come back in row-major
    /// order regardless of scheduling.
    pub fn binarize(&self, view: &FrameView<'_>) -> (BinaryImage, Vec<Coordinate>) {
        let bounds = view.bounds();
        if bounds.is_empty() {
            return (BinaryImage::new_white(bounds), Vec::new());
        }
        let width = bounds.width() as usize;
        let mut pixels = vec![WHITE; bounds.area() as usize];
        let colors = self.config.text_colors.as_slice();

        let rows: Vec<Vec<Coordinate>> = pixels
            .par_chunks_mut(width)
            .enumerate()
            .map(|(row, line)| {
                let y = bounds.min_y + row as i32;
                let mut hits = Vec::new();
                for (column, pixel) in line.iter_mut().enumerate() {
                    let point = Coordinate::new(bounds.min_x + column as i32, y);
                    if view
                        .rgb(point)
                        .is_some_and(|rgb| ColorGroup::any_contains(colors, rgb))
                    {
                        *pixel = BLACK;
                        hits.push(point);
                    }
                }
                hits
            })
            .collect();

        let coords = rows.into_iter().flatten().collect();
        (BinaryImage::from_raw(bounds, pixels), coords)
    }

    /// Keeps only the connected components that pass every blob filter.
    ///
    /// `coords` must list BLACK pixels of `binary`; anything else is skipped.
    /// Output coordinates are a subset of the input, grouped per blob.
    pub fn optimize(
        &self,
        view: &FrameView<'_>,
        binary: &BinaryImage,
        coords: &[Coordinate],
    ) -> (BinaryImage, Vec<Coordinate>) {
        let bounds = binary.bounds();
        let mut output = BinaryImage::new_white(bounds);
        let mut kept = Vec::new();
        if coords.is_empty() {
            return (output, kept);
        }

        let optimizer = &self.config.optimizer;
        let limits = BlobLimits::new(optimizer, bounds);
        let offsets = optimizer.connectivity.offsets();
        let border_colors = optimizer.border.colors.as_slice();

        let mut guard = self.scratch.acquire(bounds.area() as usize);
        let Scratch {
            visited,
            border_marks,
            stack,
            members,
        } = &mut *guard;

        let mut stamp = 0u32;
        for &start in coords {
            if !binary.is_black(start) {
                continue;
            }
            let start_index = bounds.index_of(start);
            if visited[start_index] {
                continue;
            }
            visited[start_index] = true;
            stamp += 1;

            let mut blob = Blob::new(start);
            stack.clear();
            members.clear();
            stack.push(start);
            while let Some(point) = stack.pop() {
                members.push(point);
                blob.include(point);
                for &(dx, dy) in offsets {
                    let next = point.offset(dx, dy);
                    if !bounds.contains(next) {
                        continue;
                    }
                    let index = bounds.index_of(next);
                    if binary.is_black(next) {
                        if !visited[index] {
                            visited[index] = true;
                            stack.push(next);
                        }
                    } else if border_marks[index] != stamp {
                        // each background pixel counts once per blob
                        border_marks[index] = stamp;
                        blob.border_total += 1;
                        if view
                            .rgb(next)
                            .is_some_and(|rgb| ColorGroup::any_contains(border_colors, rgb))
                        {
                            blob.border_matched += 1;
                        }
                    }
                }
            }

            if limits.accepts(&blob) {
                for &point in members.iter() {
                    output.set(point, BLACK);
                }
                kept.extend_from_slice(members.as_slice());
            }
        }

        (output, kept)
    }

    /// Cuts the image down to the bounding box of `coords` plus the margins.
    ///
    /// Returns `None` iff `coords` is empty. Padding that falls outside the
    /// source bounds is WHITE.
    pub fn trim(&self, binary: &BinaryImage, coords: &[Coordinate]) -> Option<BinaryImage> {
        let first = *coords.first()?;
        let (min_x, max_x, min_y, max_y) = coords.iter().fold(
            (first.x, first.x, first.y, first.y),
            |(min_x, max_x, min_y, max_y), point| {
                (
                    min_x.min(point.x),
                    max_x.max(point.x),
                    min_y.min(point.y),
                    max_y.max(point.y),
                )
            },
        );
        let margin = &self.config.margin;
        let dx = saturate(margin.x.calculate(i64::from(max_x - min_x) + 1));
        let dy = saturate(margin.y.calculate(i64::from(max_y - min_y) + 1));
        let region = Rect::new(
            min_x.saturating_sub(dx),
            min_y.saturating_sub(dy),
            max_x.saturating_add(dx).saturating_add(1),
            max_y.saturating_add(dy).saturating_add(1),
        );

        let mut pixels = Vec::with_capacity(usize::try_from(region.area()).unwrap_or(0));
        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                pixels.push(binary.get(Coordinate::new(x, y)).unwrap_or(WHITE));
            }
        }
        Some(BinaryImage::from_raw(region, pixels))
    }

    /// Runs crop, binarize, optimize and trim over one frame.
    pub fn segment(&self, image: &RgbImage) -> Segmentation {
        let view = self.crop(image);
        let (binary, coords) = self.binarize(&view);
        let (optimized, kept) = self.optimize(&view, &binary, &coords);
        let region = self.trim(&optimized, &kept);
        Segmentation {
            crop: view.bounds(),
            binary,
            optimized,
            kept,
            region,
        }
    }

    #[cfg(test)]
    pub(crate) fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }
}

struct Blob {
    size: i64,
    min_x: i32,
    max_x: i32,
    min_y: i32,
    max_y: i32,
    border_total: i64,
    border_matched: i64,
}

impl Blob {
    fn new(start: Coordinate) -> Self {
        Self {
            size: 0,
            min_x: start.x,
            max_x: start.x,
            min_y: start.y,
            max_y: start.y,
            border_total: 0,
            border_matched: 0,
        }
    }

    fn include(&mut self, point: Coordinate) {
        self.size += 1;
        self.min_x = self.min_x.min(point.x);
        self.max_x = self.max_x.max(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_y = self.max_y.max(point.y);
    }

    fn width(&self) -> i64 {
        i64::from(self.max_x) - i64::from(self.min_x) + 1
    }

    fn height(&self) -> i64 {
        i64::from(self.max_y) - i64::from(self.min_y) + 1
    }
}

/// Blob filters evaluated once per `optimize` call.
struct BlobLimits<'a> {
    config: &'a OptimizerConfig,
    bounds: Rect,
    size: (i64, i64),
    width: (i64, i64),
    height: (i64, i64),
}

impl<'a> BlobLimits<'a> {
    fn new(config: &'a OptimizerConfig, bounds: Rect) -> Self {
        Self {
            config,
            bounds,
            size: config.size.bounds(bounds.area()),
            width: config.width.bounds(bounds.width()),
            height: config.height.bounds(bounds.height()),
        }
    }

    fn accepts(&self, blob: &Blob) -> bool {
        let within = |(min, max): (i64, i64), value: i64| value >= min && value <= max;
        if !within(self.size, blob.size)
            || !within(self.width, blob.width())
            || !within(self.height, blob.height())
        {
            return false;
        }
        if blob.border_matched < self.config.border.level.calculate(blob.border_total) {
            return false;
        }
        let edges = &self.config.no_on_edge;
        let touches = (edges.left && blob.min_x == self.bounds.min_x)
            || (edges.right && blob.max_x == self.bounds.max_x - 1)
            || (edges.top && blob.min_y == self.bounds.min_y)
            || (edges.bottom && blob.max_y == self.bounds.max_y - 1);
        !touches
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
