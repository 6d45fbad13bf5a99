
use crate::models::Shape;
use crate::pixel::{Luma8Image, Raster, Rgb8Image};

/// Rectangle position and size for a target APL.
/// Returns `(x, y, rect_w, rect_h)`, the top-left corner and dimensions.
///
/// The rectangle keeps the frame's aspect ratio: scaling both axes by
/// `sqrt(apl/100)` makes its area `apl%` of the frame.
pub fn calc_rectangle(width: u32, height: u32, apl_percent: u8) -> (u32, u32, u32, u32) {
    let scale = (apl_percent as f64 / 100.0).sqrt();
    let rect_w = (width as f64 * scale).round() as u32;
    let rect_h = (height as f64 * scale).round() as u32;
    let x = (width - rect_w) / 2;
    let y = (height - rect_h) / 2;
    (x, y, rect_w, rect_h)
}

/// Circle center and radius for a target APL.
/// Returns `(cx, cy, radius)`; a disk of that radius covers `apl%` of the frame.
pub fn calc_circle(width: u32, height: u32, apl_percent: u8) -> (u32, u32, f64) {
    let radius =
        (apl_percent as f64 * width as f64 * height as f64 / (100.0 * std::f64::consts::PI)).sqrt();
    (width / 2, height / 2, radius)
}

/// Generate a grayscale test pattern: black background, white shape.
///
/// Every pixel is exactly 0 or 255. The gain-map derivation relies on this:
/// the luminance channel of the frame *is* the gain map, with no
/// tone-mapping error.
pub fn generate_pattern(width: u32, height: u32, apl_percent: u8, shape: Shape) -> Luma8Image {
    let mut img = Luma8Image::with_extent(width as usize, height as usize);
    match shape {
        Shape::Rectangle => {
            let (x, y, rect_w, rect_h) = calc_rectangle(width, height, apl_percent);
            for py in y..(y + rect_h).min(height) {
                for px in x..(x + rect_w).min(width) {
                    img.set_at(px as usize, py as usize, 255);
                }
            }
        }
        Shape::Circle => {
            let (cx, cy, radius) = calc_circle(width, height, apl_percent);
            let r = radius.round() as i64;
            let (cx, cy) = (cx as i64, cy as i64);
            for py in (cy - r).max(0)..=(cy + r).min(height as i64 - 1) {
                for px in (cx - r).max(0)..=(cx + r).min(width as i64 - 1) {
                    let (dx, dy) = (px - cx, py - cy);
                    if dx * dx + dy * dy <= r * r {
                        img.set_at(px as usize, py as usize, 255);
                    }
                }
            }
        }
    }
    img
}

/// Generate an RGB test pattern.
pub fn generate_pattern_rgb(width: u32, height: u32, apl_percent: u8, shape: Shape) -> Rgb8Image {
    generate_pattern(width, height, apl_percent, shape).to_rgb()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_at_100_percent_fills_the_frame() {
        assert_eq!(calc_rectangle(1080, 1920, 100), (0, 0, 1080, 1920));
    }

    #[test]
    fn rectangle_at_50_percent_is_centered() {
        let (x, y, rect_w, rect_h) = calc_rectangle(1080, 1920, 50);
        let scale = 0.5f64.sqrt();
        assert_eq!(rect_w, (1080.0 * scale).round() as u32);
        assert_eq!(rect_h, (1920.0 * scale).round() as u32);
        assert_eq!(x, (1080 - rect_w) / 2);
        assert_eq!(y, (1920 - rect_h) / 2);
    }

    #[test]
    fn circle_at_50_percent() {
        let (cx, cy, radius) = calc_circle(1080, 1920, 50);
        let expected = (50.0 * 1080.0 * 1920.0 / (100.0 * std::f64::consts::PI)).sqrt();
        assert_eq!(cx, 540);
        assert_eq!(cy, 960);
        assert!((radius - expected).abs() < 0.01);
    }

    #[test]
    fn rectangle_pattern_pixels() {
        let img = generate_pattern(100, 100, 50, Shape::Rectangle);
        assert_eq!(img.extent(), (100, 100));
        assert_eq!(img.get_at(50, 50), 255);
        assert_eq!(img.get_at(0, 0), 0);
    }

    #[test]
    fn circle_pattern_pixels() {
        let img = generate_pattern(100, 100, 50, Shape::Circle);
        assert_eq!(img.extent(), (100, 100));
        assert_eq!(img.get_at(50, 50), 255);
        assert_eq!(img.get_at(0, 0), 0);
    }

    #[test]
    fn pattern_is_bilevel() {
        let img = generate_pattern(64, 48, 37, Shape::Circle);
        assert!(img.as_bytes().iter().all(|&p| p == 0 || p == 255));
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_pattern(128, 96, 23, Shape::Rectangle);
        let b = generate_pattern(128, 96, 23, Shape::Rectangle);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
