use std::path::Path;

use anyhow::Context as _;

use crate::{
    core::Canvas,
    error::{PulseError, PulseResult},
    visual::{premul_bytes_to_paint, premultiply_rgba8_in_place},
};

/// The cover-fit, center-cropped still image, sized exactly to the canvas.
/// Per-frame zoom is applied later, about the canvas midpoint, so the crop
/// here is the 1.0-scale frame.
#[derive(Clone)]
pub struct BaseLayer {
    pub canvas: Canvas,
    paint: vello_cpu::Image,
}

impl BaseLayer {
    pub(crate) fn paint(&self) -> &vello_cpu::Image {
        &self.paint
    }
}

pub fn decode_image_file(path: &Path) -> PulseResult<image::DynamicImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("decode image '{}'", path.display()))?;
    Ok(img)
}

/// Uniform scale that covers the canvas: the larger of the two axis ratios.
///
/// Equivalent to the aspect-ratio comparison: a relatively wide image is
/// scaled to match canvas height (then cropped in width), a relatively tall
/// one to match canvas width.
pub fn cover_scale(img_w: u32, img_h: u32, canvas: Canvas) -> f64 {
    let sx = f64::from(canvas.width) / f64::from(img_w);
    let sy = f64::from(canvas.height) / f64::from(img_h);
    sx.max(sy)
}

/// Top-left origin of the centered canvas-sized crop within a scaled image.
pub fn crop_origin(scaled_w: u32, scaled_h: u32, canvas: Canvas) -> (u32, u32) {
    ((scaled_w - canvas.width) / 2, (scaled_h - canvas.height) / 2)
}

/// Cover-fit `img` to `canvas`: scale up to cover, center-crop to exactly
/// the canvas size, premultiply for compositing.
pub fn cover_fit(img: &image::DynamicImage, canvas: Canvas) -> PulseResult<BaseLayer> {
    let (img_w, img_h) = (img.width(), img.height());
    if img_w == 0 || img_h == 0 {
        return Err(PulseError::render("source image has zero dimensions"));
    }

    let scale = cover_scale(img_w, img_h, canvas);
    // Round, then clamp up so the crop window always fits.
    let scaled_w = ((f64::from(img_w) * scale).round() as u32).max(canvas.width);
    let scaled_h = ((f64::from(img_h) * scale).round() as u32).max(canvas.height);

    tracing::debug!(img_w, img_h, scaled_w, scaled_h, "cover-fit base image");

    let resized = image::imageops::resize(
        &img.to_rgba8(),
        scaled_w,
        scaled_h,
        image::imageops::FilterType::Lanczos3,
    );
    let (x, y) = crop_origin(scaled_w, scaled_h, canvas);
    let cropped =
        image::imageops::crop_imm(&resized, x, y, canvas.width, canvas.height).to_image();

    let mut rgba = cropped.into_raw();
    premultiply_rgba8_in_place(&mut rgba);
    let paint = premul_bytes_to_paint(&rgba, canvas.width, canvas.height)?;

    Ok(BaseLayer { canvas, paint })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(w: u32, h: u32) -> Canvas {
        Canvas::new(w, h).unwrap()
    }

    #[test]
    fn wide_image_scales_to_canvas_height() {
        // 1920x1080 into 720x1280: image ratio 1.78 > canvas ratio 0.5625,
        // so the height ratio governs and width gets cropped.
        let s = cover_scale(1920, 1080, canvas(720, 1280));
        assert!((s - 1280.0 / 1080.0).abs() < 1e-12);
    }

    #[test]
    fn tall_image_scales_to_canvas_width() {
        let s = cover_scale(1080, 1920, canvas(1280, 720));
        assert!((s - 1280.0 / 1080.0).abs() < 1e-12);
    }

    #[test]
    fn crop_is_centered() {
        let (x, y) = crop_origin(2276, 1280, canvas(720, 1280));
        assert_eq!(x, (2276 - 720) / 2);
        assert_eq!(y, 0);
    }

    #[test]
    fn cover_fit_yields_exact_canvas_dims_for_landscape() {
        let img = image::DynamicImage::new_rgba8(192, 108);
        let layer = cover_fit(&img, canvas(72, 128)).unwrap();
        assert_eq!(layer.canvas.width, 72);
        assert_eq!(layer.canvas.height, 128);
    }

    #[test]
    fn cover_fit_yields_exact_canvas_dims_for_portrait() {
        let img = image::DynamicImage::new_rgba8(90, 160);
        let layer = cover_fit(&img, canvas(128, 72)).unwrap();
        assert_eq!(layer.canvas.width, 128);
        assert_eq!(layer.canvas.height, 72);
    }

    #[test]
    fn cover_fit_square_into_square_is_identity_sized() {
        let img = image::DynamicImage::new_rgba8(64, 64);
        let layer = cover_fit(&img, canvas(64, 64)).unwrap();
        assert_eq!(layer.canvas.width, 64);
        assert_eq!(layer.canvas.height, 64);
    }
}
