//! Pixel value operations.

use crate::common::*;

/// The standard deviation of the lighting noise along each principal
/// component.
const OFFSET_STDDEV: f64 = 0.1;

/// Eigenvalues of the RGB covariance of natural images.
const RGB_EIGENVALUES: [f64; 3] = [0.2175, 0.0188, 0.0045];

/// Eigenvectors of the RGB covariance, one column per component.
const RGB_EIGENVECTORS: [[f64; 3]; 3] = [
    [-0.5675, 0.7192, 0.4009],
    [-0.5808, -0.0045, -0.8140],
    [-0.5836, -0.6948, 0.4203],
];

/// How solarization treats channel values above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolarizeMode {
    /// `128 - v` modulo 256. Matches detectors trained with the wrapping
    /// arithmetic.
    Wrapping,
    /// `128 - v` saturated at zero.
    Clamped,
}

impl Default for SolarizeMode {
    fn default() -> Self {
        Self::Wrapping
    }
}

/// Values above this threshold get solarized.
pub const SOLARIZE_THRESHOLD: u8 = 128;

pub fn solarize(image: &mut RgbImage, mode: SolarizeMode) {
    let map = |value: u8| -> u8 {
        if value <= SOLARIZE_THRESHOLD {
            return value;
        }
        match mode {
            SolarizeMode::Wrapping => SOLARIZE_THRESHOLD.wrapping_sub(value),
            SolarizeMode::Clamped => SOLARIZE_THRESHOLD.saturating_sub(value),
        }
    };

    image.pixels_mut().for_each(|pixel| {
        pixel.0.iter_mut().for_each(|value| *value = map(*value));
    });
}

/// Random gamma and per-channel gain. Gains are normalized so the strongest
/// channel keeps gain 1.
pub fn disturb_colors<R>(
    image: &mut RgbImage,
    rng: &mut R,
    gamma_magnitude: f64,
    color_magnitude: f64,
) where
    R: Rng,
{
    let mut gaussian = || -> f64 { rng.sample(StandardNormal) };

    let gamma = (gaussian() * gamma_magnitude).exp();
    let gains = {
        let gains = [
            (gaussian() * color_magnitude).exp(),
            (gaussian() * color_magnitude).exp(),
            (gaussian() * color_magnitude).exp(),
        ];
        let max = gains.iter().copied().fold(f64::MIN, f64::max);
        gains.map(|gain| gain / max)
    };

    let tables = gains.map(|gain| {
        lookup_table(|value| 255.0 * (value as f64 / 255.0).powf(gamma) * gain)
    });
    apply_tables(image, &tables);
}

/// Shift all pixels by a random color along the principal components of
/// natural image colors.
pub fn apply_random_color_offset<R>(image: &mut RgbImage, rng: &mut R)
where
    R: Rng,
{
    let alphas: [f64; 3] = [
        rng.sample::<f64, _>(StandardNormal) * OFFSET_STDDEV,
        rng.sample::<f64, _>(StandardNormal) * OFFSET_STDDEV,
        rng.sample::<f64, _>(StandardNormal) * OFFSET_STDDEV,
    ];

    let offsets = RGB_EIGENVECTORS.map(|row| {
        let offset: f64 = izip!(row, alphas, RGB_EIGENVALUES)
            .map(|(vec, alpha, lambda)| vec * alpha * lambda)
            .sum();
        offset * 255.0
    });

    let tables = offsets.map(|offset| lookup_table(|value| value as f64 + offset));
    apply_tables(image, &tables);
}

fn lookup_table<F>(map: F) -> [u8; 256]
where
    F: Fn(u8) -> f64,
{
    let mut table = [0u8; 256];
    table.iter_mut().enumerate().for_each(|(index, entry)| {
        *entry = map(index as u8).round().clamp(0.0, 255.0) as u8;
    });
    table
}

fn apply_tables(image: &mut RgbImage, tables: &[[u8; 256]; 3]) {
    image.pixels_mut().for_each(|pixel| {
        pixel
            .0
            .iter_mut()
            .zip(tables)
            .for_each(|(value, table)| *value = table[*value as usize]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(16, 16, |x, y| {
            let value = (y * 16 + x) as u8;
            Rgb([value, 255 - value, value / 2])
        })
    }

    #[test]
    fn solarize_wraps_or_clamps() {
        let mut wrapped = RgbImage::from_pixel(1, 1, Rgb([100, 129, 255]));
        solarize(&mut wrapped, SolarizeMode::Wrapping);
        assert_eq!(wrapped.get_pixel(0, 0).0, [100, 255, 129]);

        let mut clamped = RgbImage::from_pixel(1, 1, Rgb([100, 129, 255]));
        solarize(&mut clamped, SolarizeMode::Clamped);
        assert_eq!(clamped.get_pixel(0, 0).0, [100, 0, 0]);
    }

    #[test]
    fn zero_magnitude_disturbance_is_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let orig = gradient();
        let mut image = orig.clone();
        disturb_colors(&mut image, &mut rng, 0.0, 0.0);
        assert_eq!(image, orig);
    }

    #[test]
    fn color_offset_shifts_uniformly() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut image = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
        apply_random_color_offset(&mut image, &mut rng);

        let first = *image.get_pixel(0, 0);
        assert!(image.pixels().all(|pixel| *pixel == first));
    }
}
