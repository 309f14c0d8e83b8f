//! Image warps with the matching box mappings.
//!
//! Pixel `(x, y)` covers the continuous square `[x, x + 1) x [y, y + 1)`, so
//! an image of size `w x h` spans `[0, w] x [0, h]` and pixel centers sit at
//! half-integer coordinates.

use crate::{common::*, data::Sample};

/// The jitter of each perspective corner relative to the image size.
pub const PERSPECTIVE_AMOUNT: f64 = 0.05;

/// The standard deviation of the gaussian blur.
pub const BLUR_SIGMA: f32 = 1.0;

/// Sample the image at a continuous location with bilinear interpolation.
/// Locations outside the image read as black.
pub fn sample_bilinear(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    if width == 0
        || height == 0
        || !(0.0..=width as f64).contains(&x)
        || !(0.0..=height as f64).contains(&y)
    {
        return Rgb([0, 0, 0]);
    }

    let fx = (x - 0.5).clamp(0.0, (width - 1) as f64);
    let fy = (y - 0.5).clamp(0.0, (height - 1) as f64);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let dx = fx - x0 as f64;
    let dy = fy - y0 as f64;

    let p00 = image.get_pixel(x0, y0).0;
    let p01 = image.get_pixel(x1, y0).0;
    let p10 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    izip!(&mut out, p00, p01, p10, p11).for_each(|(out, p00, p01, p10, p11)| {
        let top = p00 as f64 * (1.0 - dx) + p01 as f64 * dx;
        let bottom = p10 as f64 * (1.0 - dx) + p11 as f64 * dx;
        *out = (top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8;
    });
    Rgb(out)
}

/// Render a `width x height` image whose pixel centers are pulled back into
/// `image` by `inverse`.
pub fn warp<F>(image: &RgbImage, width: u32, height: u32, inverse: F) -> RgbImage
where
    F: Fn([f64; 2]) -> Option<[f64; 2]>,
{
    RgbImage::from_fn(width, height, |x, y| {
        match inverse([x as f64 + 0.5, y as f64 + 0.5]) {
            Some([sx, sy]) => sample_bilinear(image, sx, sy),
            None => Rgb([0, 0, 0]),
        }
    })
}

/// Rotate around the image center onto a canvas large enough to hold the
/// whole rotated image.
pub fn rotate(image: &RgbImage, radians: f64) -> (RgbImage, Affine) {
    if radians == 0.0 {
        return (image.clone(), Affine::identity());
    }

    let (width, height) = image.dimensions();
    let (w, h) = (width as f64, height as f64);
    let (sin, cos) = radians.sin_cos();
    let new_width = (w * cos.abs() + h * sin.abs()).ceil() as u32;
    let new_height = (w * sin.abs() + h * cos.abs()).ceil() as u32;

    let center = [w / 2.0, h / 2.0];
    let new_center = [new_width as f64 / 2.0, new_height as f64 / 2.0];
    let forward = Affine::rotation(center, radians, new_center);
    let backward = Affine::rotation(new_center, -radians, center);

    let rotated = warp(image, new_width, new_height, |point| {
        Some(backward.map_point(point))
    });
    (rotated, forward)
}

/// Resize with preserved aspect ratio into a black `size x size` canvas,
/// centered.
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Transform<f64>) {
    let (width, height) = image.dimensions();
    if (width, height) == (size, size) {
        return (image.clone(), Transform::identity());
    }
    if width == 0 || height == 0 {
        return (RgbImage::new(size, size), Transform::identity());
    }

    let scale = f64::min(size as f64 / width as f64, size as f64 / height as f64);
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_width) / 2;
    let pad_y = (size - new_height) / 2;

    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);
    let mut canvas = RgbImage::new(size, size);
    imageops::replace(&mut canvas, &resized, pad_x.into(), pad_y.into());

    let placed = TLBR::from_tlhw([
        pad_y as f64,
        pad_x as f64,
        new_height as f64,
        new_width as f64,
    ]);
    let transform = Transform::from_rects(&HW::from_dims(width, height).to_rect(), &placed);

    (canvas, transform)
}

/// Letterbox an image together with its boxes.
pub fn letterbox_sample(image: &RgbImage, boxes: &[LabeledBox], size: u32) -> Sample {
    let (image, transform) = letterbox(image, size);
    let boxes = boxes.iter().map(|bbox| &transform * bbox).collect();
    Sample { image, boxes }
}

/// Resize to exact dimensions, ignoring the aspect ratio.
pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> (RgbImage, Transform<f64>) {
    let transform = Transform::from_sizes_exact(
        HW::from_dims(image.width(), image.height()),
        HW::from_dims(width, height),
    );
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    (resized, transform)
}

pub fn flip_horizontal(image: &RgbImage) -> (RgbImage, Transform<f64>) {
    let flipped = imageops::flip_horizontal(image);
    (flipped, Transform::flip_horizontal(image.width() as f64))
}

pub fn blur(image: &RgbImage) -> RgbImage {
    imageops::blur(image, BLUR_SIGMA)
}

/// Stretch the region enclosed by four randomly jittered image corners onto
/// the full image. Returns `None` if the jittered corners are degenerate.
pub fn random_perspective<R>(image: &RgbImage, rng: &mut R) -> Option<(RgbImage, Projective)>
where
    R: Rng,
{
    let (width, height) = image.dimensions();
    let bounds = HW::from_dims(width, height).to_rect();
    let frame = bounds.corners();

    let max_side = width.max(height) as f64;
    let mut jitter = || rng.gen_range(-1.0..=1.0) * PERSPECTIVE_AMOUNT * max_side;
    let quad = frame.map(|[x, y]| [x + jitter(), y + jitter()]);

    let forward = Projective::from_quads(quad, frame).ok()?;
    let backward = Projective::from_quads(frame, quad).ok()?;

    let warped = warp(image, width, height, |point| backward.map_point(point));
    Some((warped, forward))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zero_rotation_is_identity() {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8, y as u8, 0]));
        let (rotated, affine) = rotate(&image, 0.0);
        assert_eq!(rotated, image);
        assert_eq!(affine, Affine::identity());
    }

    #[test]
    fn rotation_keeps_corners_inside() {
        let image = RgbImage::new(40, 20);
        let (rotated, affine) = rotate(&image, 0.3);
        let bounds = HW::from_dims(rotated.width(), rotated.height()).to_rect();
        let mapped = HW::from_dims(40, 20)
            .to_rect()
            .map_corners(|point| affine.map_point(point));
        assert!(bounds.contains(&mapped));
    }

    #[test]
    fn letterbox_wide_image() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let (boxed, transform) = letterbox(&image, 100);
        assert_eq!(boxed.dimensions(), (100, 100));
        assert_eq!(boxed.get_pixel(50, 10).0, [0, 0, 0]);
        assert_eq!(boxed.get_pixel(50, 50).0, [255, 255, 255]);

        let rect = HW::from_dims(200, 100).to_rect().transform(&transform);
        assert_abs_diff_eq!(rect.t(), 25.0);
        assert_abs_diff_eq!(rect.b(), 75.0);
        assert_abs_diff_eq!(rect.w(), 100.0);
    }

    #[test]
    fn flip_maps_boxes_with_pixels() {
        let mut image = RgbImage::new(10, 4);
        image.put_pixel(1, 0, Rgb([255, 0, 0]));
        let (flipped, transform) = flip_horizontal(&image);
        assert_eq!(flipped.get_pixel(8, 0).0, [255, 0, 0]);

        let rect = TLBR::from_tlbr([0.0, 1.0, 1.0, 2.0]).transform(&transform);
        assert_eq!(rect.tlbr(), [0.0, 8.0, 1.0, 9.0]);
    }

    #[test]
    fn perspective_preserves_size() {
        let mut rng = StdRng::seed_from_u64(11);
        let image = RgbImage::from_pixel(32, 32, Rgb([10, 20, 30]));
        let (warped, forward) = random_perspective(&image, &mut rng).unwrap();
        assert_eq!(warped.dimensions(), (32, 32));
        assert!(forward.map_point([16.0, 16.0]).is_some());
    }
}
