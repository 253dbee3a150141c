//! SVG rasterization: convert vector markup to a square raster at a fixed
//! target resolution, preserving aspect ratio on a white background.
//!
//! This is the leaf dependency of both image-based consumers: the contour
//! shape classifier (grayscale, optionally blurred) and the learned
//! classifier (RGB). Pixels are deterministic for deterministic markup;
//! malformed markup is an explicit [`RenderError`], never a silent blank
//! image.

use image::{GrayImage, Luma, Rgb, RgbImage};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use thiserror::Error;
use tracing::debug;

/// Target resolution for contour-based shape detection.
pub const SHAPE_DETECT_SIZE: u32 = 800;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to parse SVG markup: {0}")]
    Parse(#[from] usvg::Error),
    #[error("invalid raster target size: {0}")]
    InvalidSize(u32),
}

fn render_pixmap(markup: &str, size: u32) -> Result<Pixmap, RenderError> {
    if size == 0 {
        return Err(RenderError::InvalidSize(0));
    }

    let options = usvg::Options::default();
    let tree = usvg::Tree::from_str(markup, &options)?;

    let mut pixmap = Pixmap::new(size, size).ok_or(RenderError::InvalidSize(size))?;
    pixmap.fill(Color::WHITE);

    // Fit the document into the square target, centered.
    let doc = tree.size();
    let scale = (size as f32 / doc.width()).min(size as f32 / doc.height());
    let tx = (size as f32 - doc.width() * scale) / 2.0;
    let ty = (size as f32 - doc.height() * scale) / 2.0;
    let transform = Transform::from_scale(scale, scale).post_translate(tx, ty);

    resvg::render(&tree, transform, &mut pixmap.as_mut());
    debug!(size, doc_w = doc.width(), doc_h = doc.height(), scale, "rendered SVG");

    Ok(pixmap)
}

/// Rasterize markup to an RGB image of `size`×`size` pixels.
pub fn rasterize_rgb(markup: &str, size: u32) -> Result<RgbImage, RenderError> {
    let pixmap = render_pixmap(markup, size)?;
    let mut img = RgbImage::new(size, size);
    for (i, pixel) in pixmap.pixels().iter().enumerate() {
        let c = pixel.demultiply();
        let x = (i as u32) % size;
        let y = (i as u32) / size;
        img.put_pixel(x, y, Rgb([c.red(), c.green(), c.blue()]));
    }
    Ok(img)
}

/// Rasterize markup to a single-channel grayscale image of `size`×`size`
/// pixels (BT.601 luma).
pub fn rasterize_gray(markup: &str, size: u32) -> Result<GrayImage, RenderError> {
    let pixmap = render_pixmap(markup, size)?;
    let mut img = GrayImage::new(size, size);
    for (i, pixel) in pixmap.pixels().iter().enumerate() {
        let c = pixel.demultiply();
        let luma = 0.299 * c.red() as f32 + 0.587 * c.green() as f32 + 0.114 * c.blue() as f32;
        let x = (i as u32) % size;
        let y = (i as u32) / size;
        img.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    Ok(img)
}

/// Rasterize to grayscale and apply a light Gaussian blur to suppress
/// anti-aliasing noise before binarization.
pub fn rasterize_gray_blurred(markup: &str, size: u32, sigma: f32) -> Result<GrayImage, RenderError> {
    let gray = rasterize_gray(markup, size)?;
    Ok(imageproc::filter::gaussian_blur_f32(&gray, sigma))
}
