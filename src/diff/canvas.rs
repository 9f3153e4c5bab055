//! Dimension reconciliation: images of different sizes are extended, never scaled.

use image::{imageops, Rgba, RgbaImage};

/// Fill for canvas area not covered by a source image.
pub const PAD_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub fn reconciled_size(a: (u32, u32), b: (u32, u32)) -> (u32, u32) {
    (a.0.max(b.0), a.1.max(b.1))
}

/// Copies `img` into the top-left of a `width`×`height` canvas filled with [`PAD_COLOR`].
pub fn pad_to(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    let mut canvas = RgbaImage::from_pixel(width, height, PAD_COLOR);
    imageops::replace(&mut canvas, img, 0, 0);
    canvas
}

/// Pads both images onto a shared canvas sized to the larger of each dimension.
pub fn reconcile(a: &RgbaImage, b: &RgbaImage) -> (RgbaImage, RgbaImage) {
    let (width, height) = reconciled_size(a.dimensions(), b.dimensions());
    (pad_to(a, width, height), pad_to(b, width, height))
}
