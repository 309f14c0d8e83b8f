use crate::common::*;

/// A planar homography stored as a 3x3 matrix with `h[2][2] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projective {
    h: [[f64; 3]; 3],
}

impl Projective {
    pub fn identity() -> Self {
        Self {
            h: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// The homography that sends each `src[i]` to `dst[i]`.
    pub fn from_quads(src: [[f64; 2]; 4], dst: [[f64; 2]; 4]) -> Result<Self> {
        ensure!(
            src.iter().chain(&dst).flatten().all(|val| val.is_finite()),
            "non-finite point correspondence"
        );

        // Unknowns h00 h01 h02 h10 h11 h12 h20 h21, two equations per point.
        let mut system = [[0.0f64; 9]; 8];

        for (index, ([x, y], [u, v])) in src.into_iter().zip(dst).enumerate() {
            system[index * 2] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            system[index * 2 + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }

        let sol = solve(system)?;
        Ok(Self {
            h: [
                [sol[0], sol[1], sol[2]],
                [sol[3], sol[4], sol[5]],
                [sol[6], sol[7], 1.0],
            ],
        })
    }

    pub fn matrix(&self) -> [[f64; 3]; 3] {
        self.h
    }

    /// Returns `None` for points mapped to infinity.
    pub fn map_point(&self, point: [f64; 2]) -> Option<[f64; 2]> {
        let [x, y] = point;
        let h = &self.h;
        let w = h[2][0] * x + h[2][1] * y + h[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        let u = (h[0][0] * x + h[0][1] * y + h[0][2]) / w;
        let v = (h[1][0] * x + h[1][1] * y + h[1][2]) / w;
        Some([u, v])
    }
}

/// Gauss-Jordan elimination with partial pivoting on an augmented 8x9 system.
fn solve(mut system: [[f64; 9]; 8]) -> Result<[f64; 8]> {
    const N: usize = 8;

    for col in 0..N {
        let pivot = (col..N)
            .max_by(|&lhs, &rhs| system[lhs][col].abs().total_cmp(&system[rhs][col].abs()))
            .unwrap_or(col);
        ensure!(
            system[pivot][col].abs() > 1e-12,
            "degenerate point correspondence"
        );
        system.swap(col, pivot);

        let denom = system[col][col];
        system[col].iter_mut().for_each(|val| *val /= denom);

        for row in 0..N {
            if row == col {
                continue;
            }
            let factor = system[row][col];
            if factor == 0.0 {
                continue;
            }
            let pivot_row = system[col];
            system[row]
                .iter_mut()
                .zip(pivot_row)
                .for_each(|(val, pivot_val)| *val -= factor * pivot_val);
        }
    }

    let mut sol = [0.0; N];
    sol.iter_mut()
        .zip(system.iter())
        .for_each(|(sol, row)| *sol = row[N]);
    Ok(sol)
}
