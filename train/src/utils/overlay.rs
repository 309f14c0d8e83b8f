use crate::common::*;
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

const PALETTE: [[u8; 3]; 8] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
];

/// A stable color for a class name.
pub fn class_color(class: &str) -> Rgb<u8> {
    let mut hasher = DefaultHasher::new();
    class.hash(&mut hasher);
    Rgb(PALETTE[hasher.finish() as usize % PALETTE.len()])
}

/// Draw the box outlines on the image. Ignored boxes are crossed out.
pub fn draw_boxes(image: &mut RgbImage, boxes: &[LabeledBox]) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let clamp_x = |x: f64| x.round().clamp(0.0, (width - 1) as f64) as u32;
    let clamp_y = |y: f64| y.round().clamp(0.0, (height - 1) as f64) as u32;

    boxes.iter().for_each(|label| {
        let color = class_color(&label.class);
        let [t, l, b, r] = label.rect.tlbr();
        let (t, b) = (clamp_y(t), clamp_y(b));
        let (l, r) = (clamp_x(l), clamp_x(r));

        (l..=r).for_each(|x| {
            image.put_pixel(x, t, color);
            image.put_pixel(x, b, color);
        });
        (t..=b).for_each(|y| {
            image.put_pixel(l, y, color);
            image.put_pixel(r, y, color);
        });

        if label.ignore {
            let steps = (r - l).max(b - t).max(1);
            (0..=steps).for_each(|step| {
                let ratio = step as f64 / steps as f64;
                let x = l as f64 + (r - l) as f64 * ratio;
                let y0 = t as f64 + (b - t) as f64 * ratio;
                let y1 = b as f64 - (b - t) as f64 * ratio;
                image.put_pixel(clamp_x(x), clamp_y(y0), color);
                image.put_pixel(clamp_x(x), clamp_y(y1), color);
            });
        }
    });
}
