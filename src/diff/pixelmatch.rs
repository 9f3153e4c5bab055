//! Per-pixel perceptual difference in YIQ space with anti-aliasing detection.
//!
//! The colour metric and the anti-aliased-edge heuristic follow the approach
//! popularised by the `pixelmatch` library: a pixel is an anti-aliasing artefact
//! when it sits on a gradient between neighbours that are themselves part of
//! flat regions in both images.

use image::RgbaImage;

/// Largest possible YIQ delta between two colours (black vs white).
pub const MAX_YIQ_DELTA: f64 = 35215.0;

const DIFF_COLOR: [u8; 3] = [255, 0, 0];
const AA_COLOR: [u8; 3] = [255, 255, 0];
/// Opacity of the unchanged image drawn underneath the highlighted pixels.
const BACKGROUND_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct PixelmatchOptions {
    pub threshold: f64,
    pub include_anti_aliasing: bool,
}

#[derive(Debug, Clone)]
pub struct PixelmatchOutput {
    pub mismatched: u64,
    pub anti_aliased: u64,
    pub diff: RgbaImage,
}

/// Compares two equally sized images pixel by pixel.
pub fn pixelmatch(img1: &RgbaImage, img2: &RgbaImage, options: PixelmatchOptions) -> PixelmatchOutput {
    debug_assert_eq!(img1.dimensions(), img2.dimensions());
    let (width, height) = img1.dimensions();
    let (w, h) = (width as usize, height as usize);
    let a = img1.as_raw();
    let b = img2.as_raw();

    let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;
    let mut diff = RgbaImage::new(width, height);
    let mut mismatched = 0u64;
    let mut anti_aliased = 0u64;

    {
        let out: &mut [u8] = &mut diff;
        for y in 0..h {
            for x in 0..w {
                let pos = (y * w + x) * 4;
                let delta = color_delta(a, b, pos, pos, false);

                if delta.abs() > max_delta {
                    let is_aa = !options.include_anti_aliasing
                        && (antialiased(a, x, y, w, h, b) || antialiased(b, x, y, w, h, a));
                    if is_aa {
                        draw_pixel(out, pos, AA_COLOR);
                        anti_aliased += 1;
                    } else {
                        draw_pixel(out, pos, DIFF_COLOR);
                        mismatched += 1;
                    }
                } else {
                    draw_gray_pixel(a, pos, out);
                }
            }
        }
    }

    PixelmatchOutput {
        mismatched,
        anti_aliased,
        diff,
    }
}

fn index(x: usize, y: usize, width: usize) -> usize {
    (y * width + x) * 4
}

fn same_pixel(a: &[u8], k: usize, b: &[u8], m: usize) -> bool {
    a[k..k + 4] == b[m..m + 4]
}

/// Signed squared YIQ distance; negative when the first pixel is brighter.
/// With `y_only` the signed luma difference is returned instead.
fn color_delta(a: &[u8], b: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if same_pixel(a, k, b, m) {
        return 0.0;
    }

    let (r1, g1, b1) = blend_on_white(a, k);
    let (r2, g2, b2) = blend_on_white(b, m);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;

    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

fn blend_on_white(buf: &[u8], pos: usize) -> (f64, f64, f64) {
    let (r, g, b, alpha) = (
        buf[pos] as f64,
        buf[pos + 1] as f64,
        buf[pos + 2] as f64,
        buf[pos + 3],
    );
    if alpha == 255 {
        return (r, g, b);
    }
    let a = alpha as f64 / 255.0;
    (blend(r, a), blend(g, a), blend(b, a))
}

fn blend(c: f64, a: f64) -> f64 {
    255.0 + (c - 255.0) * a
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_1 - b * 0.321_801_89
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

/// Neighbourhood bounds (inclusive) and whether the pixel touches the image edge.
fn neighbourhood(x: usize, y: usize, w: usize, h: usize) -> (usize, usize, usize, usize, bool) {
    let x0 = x.saturating_sub(1);
    let y0 = y.saturating_sub(1);
    let x2 = (x + 1).min(w - 1);
    let y2 = (y + 1).min(h - 1);
    let on_edge = x == x0 || x == x2 || y == y0 || y == y2;
    (x0, y0, x2, y2, on_edge)
}

fn antialiased(img: &[u8], x1: usize, y1: usize, w: usize, h: usize, other: &[u8]) -> bool {
    let (x0, y0, x2, y2, on_edge) = neighbourhood(x1, y1, w, h);
    let pos = index(x1, y1, w);
    let mut zeroes = usize::from(on_edge);

    let mut min = 0.0;
    let mut max = 0.0;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, index(x, y, w), true);
            if delta == 0.0 {
                zeroes += 1;
                // more than two identical neighbours: a flat area, not an edge
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = x;
                min_y = y;
            } else if delta > max {
                max = delta;
                max_x = x;
                max_y = y;
            }
        }
    }

    // no both darker and brighter neighbours
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y, w, h) && has_many_siblings(other, min_x, min_y, w, h))
        || (has_many_siblings(img, max_x, max_y, w, h)
            && has_many_siblings(other, max_x, max_y, w, h))
}

fn has_many_siblings(img: &[u8], x1: usize, y1: usize, w: usize, h: usize) -> bool {
    let (x0, y0, x2, y2, on_edge) = neighbourhood(x1, y1, w, h);
    let pos = index(x1, y1, w);
    let mut zeroes = usize::from(on_edge);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            if same_pixel(img, pos, img, index(x, y, w)) {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

fn draw_pixel(out: &mut [u8], pos: usize, rgb: [u8; 3]) {
    out[pos] = rgb[0];
    out[pos + 1] = rgb[1];
    out[pos + 2] = rgb[2];
    out[pos + 3] = 255;
}

fn draw_gray_pixel(img: &[u8], pos: usize, out: &mut [u8]) {
    let luma = rgb2y(img[pos] as f64, img[pos + 1] as f64, img[pos + 2] as f64);
    let value = blend(luma, BACKGROUND_ALPHA * img[pos + 3] as f64 / 255.0);
    let value = value.round().clamp(0.0, 255.0) as u8;
    draw_pixel(out, pos, [value, value, value]);
}
