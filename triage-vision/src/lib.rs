//! Strategy B: vision-based contour shape classification.
//!
//! Rasterizes the markup to grayscale, binarizes with an Otsu threshold
//! (inverted so ink is foreground), extracts contours, classifies each as
//! circle / rectangle / triangle / other by geometric descriptors, and
//! scores categories against the resulting shape composition.
//!
//! The public scoring entry degrades to an empty score map on any internal
//! failure; per the error policy this strategy never aborts a caller.

use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::otsu_level;
use tracing::{debug, warn};
use triage_types::{Category, ScoreMap};

mod descriptors;
mod scoring;

pub use descriptors::{ContourStats, ShapeKind};
pub use scoring::score_shapes;

pub use svg_raster::RenderError;

/// Blur applied before thresholding to suppress anti-aliasing noise.
const BLUR_SIGMA: f32 = 1.0;

/// Contours enclosing less than this fraction of the image area are noise.
const MIN_AREA_FRACTION: f64 = 0.001;

/// Tally of classified contours for one image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeCounts {
    pub circles: usize,
    pub rectangles: usize,
    pub triangles: usize,
    pub other: usize,
}

impl ShapeCounts {
    pub fn total(&self) -> usize {
        self.circles + self.rectangles + self.triangles + self.other
    }

    /// Shapes that landed in one of the canonical buckets.
    pub fn recognized(&self) -> usize {
        self.circles + self.rectangles + self.triangles
    }

    fn record(&mut self, kind: ShapeKind) {
        match kind {
            ShapeKind::Circle => self.circles += 1,
            ShapeKind::Rectangle => self.rectangles += 1,
            ShapeKind::Triangle => self.triangles += 1,
            ShapeKind::Other => self.other += 1,
        }
    }
}

/// Binarize with a global Otsu threshold, inverted so ink (dark pixels on
/// the white render background) becomes the foreground.
fn binarize_inverted(img: &GrayImage) -> GrayImage {
    let level = otsu_level(img);
    let mut binary = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let val = if pixel[0] < level { 255 } else { 0 };
        binary.put_pixel(x, y, Luma([val]));
    }
    binary
}

/// Detect and classify shapes in an already-binarized foreground image.
pub fn classify_foreground(binary: &GrayImage) -> ShapeCounts {
    let min_area = MIN_AREA_FRACTION * (binary.width() as f64) * (binary.height() as f64);
    let mut counts = ShapeCounts::default();

    for contour in find_contours::<i32>(binary) {
        if contour.points.len() < 3 {
            continue;
        }
        if descriptors::polygon_area(&contour.points) < min_area {
            continue;
        }
        let stats = ContourStats::from_contour(&contour);
        let kind = stats.classify();
        debug!(
            ?kind,
            area = stats.area,
            circularity = stats.circularity,
            solidity = stats.solidity,
            vertices = stats.vertex_count,
            "classified contour"
        );
        counts.record(kind);
    }

    counts
}

/// Rasterize, binarize and classify the shapes of one document.
pub fn detect_shapes(markup: &str) -> Result<ShapeCounts, RenderError> {
    let gray = svg_raster::rasterize_gray_blurred(markup, svg_raster::SHAPE_DETECT_SIZE, BLUR_SIGMA)?;
    let binary = binarize_inverted(&gray);
    Ok(classify_foreground(&binary))
}

/// Score every category against one document's detected shape composition.
///
/// An empty category set yields an empty map. Any failure inside the
/// pipeline (render errors included) also yields an empty map, logged for
/// diagnosis; this is the documented degrade path, never a crash.
pub fn analyze(markup: &str, categories: &[Category]) -> ScoreMap {
    if categories.is_empty() {
        return ScoreMap::new();
    }
    match detect_shapes(markup) {
        Ok(counts) => score_shapes(&counts, categories),
        Err(err) => {
            warn!(%err, "shape analysis failed, returning empty score map");
            ScoreMap::new()
        }
    }
}
