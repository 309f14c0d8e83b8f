//! Randomized sample augmentation.

mod color;
mod cropper;
pub mod geometry;

pub use color::*;
pub use cropper::*;

use crate::{common::*, data::Sample};

/// The color step taken by an augmentation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorStep {
    Offset,
    Disturb,
}

/// Unchecked augmentation parameters.
#[derive(Debug, Clone)]
pub struct AugmentationPolicyInit {
    /// The side of the square output images.
    pub image_size: u32,
    pub mirror_prob: f64,
    pub mosaic_prob: f64,
    pub crop_prob: f64,
    pub blur_prob: f64,
    pub perspective_prob: f64,
    pub color_offset_prob: f64,
    pub solarize_prob: f64,
    pub solarize_mode: SolarizeMode,
    /// The maximum rotation in degrees.
    pub angle: f64,
    pub shift: f64,
    pub gamma_magnitude: f64,
    pub color_magnitude: f64,
    pub min_coverage: f64,
    pub min_object_size: (u32, u32),
    pub max_object_size: f64,
}

impl AugmentationPolicyInit {
    /// A policy that leaves square images of `image_size` untouched.
    pub fn identity(image_size: u32) -> Self {
        Self {
            image_size,
            mirror_prob: 0.0,
            mosaic_prob: 0.0,
            crop_prob: 0.0,
            blur_prob: 0.0,
            perspective_prob: 0.0,
            color_offset_prob: 0.0,
            solarize_prob: 0.0,
            solarize_mode: SolarizeMode::Wrapping,
            angle: 0.0,
            shift: 0.0,
            gamma_magnitude: 0.0,
            color_magnitude: 0.0,
            min_coverage: 0.0,
            min_object_size: (0, 0),
            max_object_size: 1.0,
        }
    }

    pub fn build(self) -> Result<AugmentationPolicy> {
        let Self {
            image_size,
            mirror_prob,
            mosaic_prob,
            crop_prob,
            blur_prob,
            perspective_prob,
            color_offset_prob,
            solarize_prob,
            solarize_mode,
            angle,
            shift,
            gamma_magnitude,
            color_magnitude,
            min_coverage,
            min_object_size,
            max_object_size,
        } = self;

        ensure!(image_size >= 2, "image_size must be at least 2");
        [
            ("mirror_prob", mirror_prob),
            ("mosaic_prob", mosaic_prob),
            ("crop_prob", crop_prob),
            ("blur_prob", blur_prob),
            ("perspective_prob", perspective_prob),
            ("color_offset_prob", color_offset_prob),
            ("solarize_prob", solarize_prob),
            ("min_coverage", min_coverage),
            ("color", color_magnitude),
        ]
        .into_iter()
        .try_for_each(|(name, value)| -> Result<()> {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{} must be within [0, 1], but get {}",
                name,
                value
            );
            Ok(())
        })?;
        ensure!(
            angle.is_finite() && angle >= 0.0,
            "angle must be non-negative"
        );
        ensure!(shift.is_finite() && shift >= 0.0, "shift must be non-negative");
        ensure!(
            gamma_magnitude.is_finite() && gamma_magnitude >= 0.0,
            "gamma must be non-negative"
        );
        ensure!(
            max_object_size > 0.0 && max_object_size <= 1.0,
            "max_object_size must be within (0, 1]"
        );
        {
            let (long, short) = min_object_size;
            ensure!(
                short <= long,
                "min_object_size must list the long side first, but get {:?}",
                min_object_size
            );
            ensure!(
                long <= image_size,
                "min_object_size {:?} does not fit in image_size {}",
                min_object_size,
                image_size
            );
        }

        let cropper = RandomCropper {
            chip_size: image_size,
            max_rotation: angle,
            translate_amount: shift,
            mirror_prob,
            min_object_size,
            max_object_size,
        };

        Ok(AugmentationPolicy {
            image_size,
            mirror_prob,
            mosaic_prob,
            crop_prob,
            blur_prob,
            perspective_prob,
            color_offset_prob,
            solarize_prob,
            solarize_mode,
            angle,
            gamma_magnitude,
            color_magnitude,
            min_coverage,
            cropper,
        })
    }
}

/// Validated augmentation parameters, shared read-only by the loaders.
#[derive(Debug, Clone)]
pub struct AugmentationPolicy {
    image_size: u32,
    mirror_prob: f64,
    mosaic_prob: f64,
    crop_prob: f64,
    blur_prob: f64,
    perspective_prob: f64,
    color_offset_prob: f64,
    solarize_prob: f64,
    solarize_mode: SolarizeMode,
    angle: f64,
    gamma_magnitude: f64,
    color_magnitude: f64,
    min_coverage: f64,
    cropper: RandomCropper,
}

impl AugmentationPolicy {
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    pub fn mosaic_prob(&self) -> f64 {
        self.mosaic_prob
    }

    /// Produce a training sample of `image_size x image_size`.
    ///
    /// Either a random crop is taken, or the full image is rotated,
    /// letterboxed and randomly mirrored, blurred and warped. Then one color
    /// step and optional solarization are applied. Boxes no longer covered
    /// enough by the image are marked ignored, and all boxes are clipped to
    /// the image.
    pub fn augment<R>(&self, image: &RgbImage, boxes: &[LabeledBox], rng: &mut R) -> Sample
    where
        R: Rng,
    {
        let Sample { mut image, boxes } = if rng.gen::<f64>() < self.crop_prob {
            self.cropper.crop(image, boxes, rng)
        } else {
            self.transform_full_image(image, boxes, rng)
        };

        self.apply_color_step(&mut image, rng);

        if rng.gen::<f64>() < self.solarize_prob {
            solarize(&mut image, self.solarize_mode);
        }

        let bounds = HW::from_dims(image.width(), image.height()).to_rect();
        let boxes = filter_coverage(boxes, &bounds, self.min_coverage);

        Sample { image, boxes }
    }

    /// Apply exactly one of the color offset or the gamma/color disturbance.
    pub fn apply_color_step<R>(&self, image: &mut RgbImage, rng: &mut R) -> ColorStep
    where
        R: Rng,
    {
        if rng.gen::<f64>() < self.color_offset_prob {
            apply_random_color_offset(image, rng);
            ColorStep::Offset
        } else {
            disturb_colors(image, rng, self.gamma_magnitude, self.color_magnitude);
            ColorStep::Disturb
        }
    }

    /// Compose four samples into the quadrants of a blank canvas.
    pub fn mosaic(&self, tiles: [Sample; 4]) -> Sample {
        let size = self.image_size;
        let half = size / 2;
        let mut canvas = RgbImage::new(size, size);
        let mut boxes = vec![];

        // [x, y] of each quadrant
        let origins = [[0, 0], [0, half], [half, 0], [half, half]];

        for (tile, [x, y]) in tiles.into_iter().zip(origins) {
            let Sample {
                image: tile_image,
                boxes: tile_boxes,
            } = tile;
            if tile_image.width() == 0 || tile_image.height() == 0 {
                continue;
            }

            let (resized, resize) = geometry::resize_exact(&tile_image, half, half);
            imageops::replace(&mut canvas, &resized, x.into(), y.into());

            let translate = Transform {
                sy: 1.0,
                sx: 1.0,
                ty: y as f64,
                tx: x as f64,
            };
            let transform = &translate * &resize;
            let quadrant = TLBR::from_tlhw([y as f64, x as f64, half as f64, half as f64]);

            boxes.extend(tile_boxes.iter().map(|bbox| {
                let moved = &transform * bbox;
                let clipped = moved.rect.clip_to(&quadrant);
                moved.with_rect(clipped)
            }));
        }

        Sample {
            image: canvas,
            boxes,
        }
    }

    /// Draw one sample, or four composed into a mosaic with `mosaic_prob`.
    pub fn generate<R, F>(&self, rng: &mut R, mut draw: F) -> Sample
    where
        R: Rng,
        F: FnMut(&mut R) -> Sample,
    {
        if rng.gen::<f64>() < self.mosaic_prob {
            let tiles = [draw(rng), draw(rng), draw(rng), draw(rng)];
            self.mosaic(tiles)
        } else {
            draw(rng)
        }
    }

    fn transform_full_image<R>(&self, image: &RgbImage, boxes: &[LabeledBox], rng: &mut R) -> Sample
    where
        R: Rng,
    {
        let radians = rng.gen_range(-1.0..=1.0) * self.angle.to_radians();
        let (rotated, rotation) = geometry::rotate(image, radians);
        let boxes = boxes.iter().map(|bbox| bbox.affine(&rotation)).collect_vec();

        let (mut image, letterbox) = geometry::letterbox(&rotated, self.image_size);
        let mut boxes = boxes.iter().map(|bbox| &letterbox * bbox).collect_vec();

        if rng.gen::<f64>() < self.mirror_prob {
            let (flipped, transform) = geometry::flip_horizontal(&image);
            image = flipped;
            boxes = boxes.iter().map(|bbox| &transform * bbox).collect();
        }

        if rng.gen::<f64>() < self.blur_prob {
            image = geometry::blur(&image);
        }

        if rng.gen::<f64>() < self.perspective_prob {
            if let Some((warped, projective)) = geometry::random_perspective(&image, rng) {
                image = warped;
                boxes = boxes.iter().map(|bbox| bbox.projective(&projective)).collect();
            }
        }

        Sample { image, boxes }
    }
}

/// Mark insufficiently covered boxes as ignored, then clip every box to the
/// bounds.
pub fn filter_coverage(
    boxes: Vec<LabeledBox>,
    bounds: &TLBR<f64>,
    min_coverage: f64,
) -> Vec<LabeledBox> {
    boxes
        .into_iter()
        .map(|mut bbox| {
            if !bbox.ignore && bbox.rect.coverage_in(bounds) < min_coverage {
                bbox.ignore = true;
            }
            bbox.rect = bbox.rect.clip_to(bounds);
            bbox
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(tlbr: [f64; 4], class: &str) -> LabeledBox {
        LabeledBox::ground_truth(TLBR::from_tlbr(tlbr), class.into())
    }

    fn checkerboard(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            let value = if (x / 4 + y / 4) % 2 == 0 { 200 } else { 30 };
            Rgb([value, value / 2, 255 - value])
        })
    }

    fn full_policy(image_size: u32) -> AugmentationPolicy {
        AugmentationPolicyInit {
            image_size,
            mirror_prob: 0.5,
            mosaic_prob: 0.5,
            crop_prob: 0.5,
            blur_prob: 0.5,
            perspective_prob: 0.5,
            color_offset_prob: 0.5,
            solarize_prob: 0.5,
            solarize_mode: SolarizeMode::Wrapping,
            angle: 10.0,
            shift: 0.2,
            gamma_magnitude: 0.5,
            color_magnitude: 0.2,
            min_coverage: 0.75,
            min_object_size: (8, 4),
            max_object_size: 0.9,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn identity_policy_is_idempotent() {
        let policy = AugmentationPolicyInit::identity(32).build().unwrap();
        let image = checkerboard(32);
        let boxes = vec![
            labeled([2.0, 3.0, 20.0, 30.0], "a"),
            labeled([0.0, 0.0, 32.0, 32.0], "b"),
        ];
        let mut rng = StdRng::seed_from_u64(0);

        let sample = policy.augment(&image, &boxes, &mut rng);
        assert_eq!(sample.image, image);
        assert_eq!(sample.boxes, boxes);
    }

    #[test]
    fn exactly_one_color_step() {
        let policy = full_policy(16);
        let mut rng = StdRng::seed_from_u64(5);
        let mut image = checkerboard(16);

        let steps = (0..200)
            .map(|_| policy.apply_color_step(&mut image, &mut rng))
            .collect_vec();
        assert!(steps.contains(&ColorStep::Offset));
        assert!(steps.contains(&ColorStep::Disturb));

        let always_offset = AugmentationPolicyInit {
            color_offset_prob: 1.0,
            ..AugmentationPolicyInit::identity(16)
        }
        .build()
        .unwrap();
        assert!((0..50).all(|_| {
            always_offset.apply_color_step(&mut image, &mut rng) == ColorStep::Offset
        }));
    }

    #[test]
    fn augmented_boxes_stay_in_bounds() {
        let policy = full_policy(64);
        let image = RgbImage::from_fn(120, 80, |x, y| Rgb([x as u8, y as u8, 7]));
        let boxes = vec![
            labeled([0.0, 0.0, 80.0, 120.0], "full"),
            labeled([10.0, 10.0, 40.0, 50.0], "a"),
            labeled([60.0, 90.0, 79.0, 119.0], "corner"),
        ];
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let sample = policy.augment(&image, &boxes, &mut rng);
            assert_eq!(sample.image.dimensions(), (64, 64));
            let bounds = sample.size().to_rect();
            assert!(sample.boxes.iter().all(|bbox| bounds.contains(&bbox.rect)));
        }
    }

    #[test]
    fn mosaic_dimensions_and_bounds() {
        let policy = full_policy(64);
        let tiles = [
            Sample {
                image: RgbImage::new(64, 64),
                boxes: vec![labeled([0.0, 0.0, 64.0, 64.0], "a")],
            },
            Sample {
                image: RgbImage::new(100, 30),
                boxes: vec![labeled([0.0, 0.0, 30.0, 100.0], "b")],
            },
            Sample::blank(7),
            Sample {
                image: RgbImage::new(3, 200),
                boxes: vec![labeled([190.0, 0.0, 200.0, 3.0], "c")],
            },
        ];

        let sample = policy.mosaic(tiles);
        assert_eq!(sample.image.dimensions(), (64, 64));
        assert_eq!(sample.boxes.len(), 3);

        let canvas = sample.size().to_rect();
        assert!(sample.boxes.iter().all(|bbox| canvas.contains(&bbox.rect)));

        // the second tile lands in the bottom-left quadrant
        let expect = [32.0, 0.0, 64.0, 32.0];
        izip!(sample.boxes[1].rect.tlbr(), expect).for_each(|(lhs, rhs)| {
            assert!(abs_diff_eq!(lhs, rhs, epsilon = 1e-9));
        });
        assert_eq!(sample.boxes[0].rect.tlbr(), [0.0, 0.0, 32.0, 32.0]);
    }

    #[test]
    fn coverage_filter_marks_and_clips() {
        let bounds = TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]);
        let boxes = vec![
            labeled([5.0, 5.0, 15.0, 15.0], "quarter"),
            labeled([1.0, 1.0, 9.0, 9.0], "inside"),
            labeled([3.0, 3.0, 3.0, 3.0], "empty"),
        ];

        let filtered = filter_coverage(boxes, &bounds, 0.75);
        assert!(filtered[0].ignore);
        assert_eq!(filtered[0].rect.tlbr(), [5.0, 5.0, 10.0, 10.0]);
        assert!(!filtered[1].ignore);
        assert!(filtered[2].ignore);
    }

    #[test]
    fn reject_invalid_policy() {
        let result = AugmentationPolicyInit {
            mirror_prob: 1.5,
            ..AugmentationPolicyInit::identity(16)
        }
        .build();
        assert!(result.is_err());

        let result = AugmentationPolicyInit {
            min_object_size: (64, 32),
            ..AugmentationPolicyInit::identity(16)
        }
        .build();
        assert!(result.is_err());

        let result = AugmentationPolicyInit {
            max_object_size: 0.0,
            ..AugmentationPolicyInit::identity(16)
        }
        .build();
        assert!(result.is_err());
    }
}
