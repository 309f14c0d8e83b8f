use crate::{common::*, Transform};

/// A 2D affine mapping `p' = A p + b` stored as a 2x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    m: [[f64; 3]; 2],
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    pub fn from_matrix(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    pub fn matrix(&self) -> [[f64; 3]; 2] {
        self.m
    }

    /// Rotate counter-clockwise (in image coordinates, y pointing down) by
    /// `radians` around `center`, then move `center` to `new_center`.
    pub fn rotation(center: [f64; 2], radians: f64, new_center: [f64; 2]) -> Self {
        let (sin, cos) = radians.sin_cos();
        let [cx, cy] = center;
        let [nx, ny] = new_center;

        Self {
            m: [
                [cos, sin, nx - cos * cx - sin * cy],
                [-sin, cos, ny + sin * cx - cos * cy],
            ],
        }
    }

    /// Uniform scaling by `scale` around the origin.
    pub fn scaling(scale: f64) -> Self {
        Self {
            m: [[scale, 0.0, 0.0], [0.0, scale, 0.0]],
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            m: [[1.0, 0.0, dx], [0.0, 1.0, dy]],
        }
    }

    /// Composition that applies `self` first, then `next`.
    pub fn then(&self, next: &Self) -> Self {
        let a = &next.m;
        let b = &self.m;
        let mut m = [[0.0; 3]; 2];

        for row in 0..2 {
            for col in 0..3 {
                m[row][col] = a[row][0] * b[0][col] + a[row][1] * b[1][col];
            }
            m[row][2] += a[row][2];
        }

        Self { m }
    }

    pub fn inverse(&self) -> Result<Self> {
        let [[a, b, c], [d, e, f]] = self.m;
        let det = a * e - b * d;
        ensure!(det.abs() > f64::EPSILON, "affine transform is not invertible");

        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;

        Ok(Self {
            m: [
                [ia, ib, -(ia * c + ib * f)],
                [id, ie, -(id * c + ie * f)],
            ],
        })
    }

    pub fn map_point(&self, point: [f64; 2]) -> [f64; 2] {
        let [x, y] = point;
        let [[a, b, c], [d, e, f]] = self.m;
        [a * x + b * y + c, d * x + e * y + f]
    }
}

impl From<&Transform<f64>> for Affine {
    fn from(from: &Transform<f64>) -> Self {
        Self {
            m: [[from.sx, 0.0, from.tx], [0.0, from.sy, from.ty]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn rotation_quarter_turn() {
        let rot = Affine::rotation([5.0, 5.0], FRAC_PI_2, [5.0, 5.0]);
        let [x, y] = rot.map_point([10.0, 5.0]);
        assert_abs_diff_eq!(x, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn affine_inverse_roundtrip() {
        let tform = Affine::rotation([3.0, 4.0], 0.3, [7.0, 2.0]).then(&Affine::scaling(1.5));
        let inv = tform.inverse().unwrap();
        let [x, y] = inv.map_point(tform.map_point([1.25, -8.0]));
        assert_abs_diff_eq!(x, 1.25, epsilon = 1e-9);
        assert_abs_diff_eq!(y, -8.0, epsilon = 1e-9);
    }

    #[test]
    fn compose_order() {
        let tform = Affine::translation(1.0, 0.0).then(&Affine::scaling(2.0));
        assert_eq!(tform.map_point([1.0, 1.0]), [4.0, 2.0]);
    }
}
