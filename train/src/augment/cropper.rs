use super::geometry;
use crate::{common::*, data::Sample};

/// Takes randomly placed, scaled and rotated square chips around objects.
#[derive(Debug, Clone)]
pub struct RandomCropper {
    pub chip_size: u32,
    /// The maximum rotation in degrees.
    pub max_rotation: f64,
    /// The chip center jitter relative to the object size.
    pub translate_amount: f64,
    pub mirror_prob: f64,
    /// The minimum (long side, short side) in chip pixels of a box kept as a
    /// positive.
    pub min_object_size: (u32, u32),
    /// The maximum long side of the object relative to the chip.
    pub max_object_size: f64,
}

impl RandomCropper {
    pub fn crop<R>(&self, image: &RgbImage, boxes: &[LabeledBox], rng: &mut R) -> Sample
    where
        R: Rng,
    {
        let Self {
            chip_size,
            max_rotation,
            translate_amount,
            mirror_prob,
            min_object_size: (min_long, min_short),
            max_object_size,
        } = *self;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Sample::blank(chip_size);
        }

        let chip = chip_size as f64;
        let candidates = boxes
            .iter()
            .filter(|bbox| !bbox.ignore && bbox.rect.area() > 0.0)
            .collect_vec();

        // pick the region to crop
        let (center, crop_side) = match candidates.choose(rng) {
            Some(target) => {
                let rect = &target.rect;
                let long_side = rect.h().max(rect.w());
                let upper = max_object_size;
                let lower = (min_long as f64 / chip).min(upper);
                let fraction = if lower < upper {
                    rng.gen_range(lower..=upper)
                } else {
                    upper
                };

                let cx = rect.cx() + rng.gen_range(-1.0..=1.0) * translate_amount * rect.w();
                let cy = rect.cy() + rng.gen_range(-1.0..=1.0) * translate_amount * rect.h();
                ([cx, cy], long_side / fraction)
            }
            None => {
                let short_side = width.min(height) as f64;
                let side = rng.gen_range(0.5..=1.0) * short_side;
                let cx = rng.gen_range(0.0..=(width as f64 - side)) + side / 2.0;
                let cy = rng.gen_range(0.0..=(height as f64 - side)) + side / 2.0;
                ([cx, cy], side)
            }
        };

        let radians = rng.gen_range(-1.0..=1.0) * max_rotation.to_radians();
        let scale = chip / crop_side;
        let half = chip / 2.0;

        let forward = Affine::rotation(center, radians, [0.0, 0.0])
            .then(&Affine::scaling(scale))
            .then(&Affine::translation(half, half));
        let backward = Affine::translation(-half, -half)
            .then(&Affine::scaling(crop_side / chip))
            .then(&Affine::rotation([0.0, 0.0], -radians, center));

        let mut chip_image = geometry::warp(image, chip_size, chip_size, |point| {
            Some(backward.map_point(point))
        });
        let chip_bounds = HW::from_dims(chip_size, chip_size).to_rect();

        let mut chip_boxes = boxes
            .iter()
            .map(|bbox| bbox.affine(&forward))
            .filter(|bbox| bbox.rect.intersect_with(&chip_bounds).is_some())
            .collect_vec();

        if rng.gen::<f64>() < mirror_prob {
            let (flipped, transform) = geometry::flip_horizontal(&chip_image);
            chip_image = flipped;
            chip_boxes = chip_boxes.iter().map(|bbox| &transform * bbox).collect();
        }

        // too small objects are not positives
        chip_boxes.iter_mut().for_each(|bbox| {
            let long_side = bbox.rect.h().max(bbox.rect.w());
            let short_side = bbox.rect.h().min(bbox.rect.w());
            if long_side < min_long as f64 || short_side < min_short as f64 {
                bbox.ignore = true;
            }
        });

        Sample {
            image: chip_image,
            boxes: chip_boxes,
        }
    }
}
