use crate::substance::SubstanceField;

/// Point queries against a concentration field.
///
/// Behaviors read fields only through this trait so that they never depend on
/// the grid resolution or memory layout.
pub trait GradientSampler: Send + Sync {
    /// Interpolated concentration at `position`; outside the grid the nearest
    /// valid value is returned.
    fn concentration(&self, position: [f64; 3]) -> f64;

    /// Spatial gradient `[dC/dx, dC/dy, dC/dz]` at `position`.
    fn gradient(&self, position: [f64; 3]) -> [f64; 3];
}

impl SubstanceField {
    /// Lower cell index and weight of the upper cell for interpolation between
    /// cell centers along one axis.
    fn interpolation_axis(&self, coordinate: f64) -> (usize, usize, f64) {
        let n = self.resolution();
        if n == 1 {
            return (0, 0, 0.0);
        }
        let u = ((coordinate - self.min_bound()) / self.cell_size() - 0.5)
            .clamp(0.0, (n - 1) as f64);
        if u.is_nan() {
            return (0, 0, 0.0);
        }
        let lo = (u.floor() as usize).min(n - 2);
        (lo, lo + 1, u - lo as f64)
    }

    /// Value of the cell that contains `position` (clamped to the grid).
    pub fn concentration_nearest(&self, position: [f64; 3]) -> f64 {
        let [x, y, z] = position;
        self.cell(self.axis_cell(x), self.axis_cell(y), self.axis_cell(z))
    }
}

impl GradientSampler for SubstanceField {
    fn concentration(&self, position: [f64; 3]) -> f64 {
        let (x0, x1, tx) = self.interpolation_axis(position[0]);
        let (y0, y1, ty) = self.interpolation_axis(position[1]);
        let (z0, z1, tz) = self.interpolation_axis(position[2]);

        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
        let c00 = lerp(self.cell(x0, y0, z0), self.cell(x1, y0, z0), tx);
        let c10 = lerp(self.cell(x0, y1, z0), self.cell(x1, y1, z0), tx);
        let c01 = lerp(self.cell(x0, y0, z1), self.cell(x1, y0, z1), tx);
        let c11 = lerp(self.cell(x0, y1, z1), self.cell(x1, y1, z1), tx);
        let c0 = lerp(c00, c10, ty);
        let c1 = lerp(c01, c11, ty);
        lerp(c0, c1, tz)
    }

    fn gradient(&self, position: [f64; 3]) -> [f64; 3] {
        let n = self.resolution();
        let cell = position.map(|p| self.axis_cell(p));
        let center = self.cell(cell[0], cell[1], cell[2]);
        let denom = 2.0 * self.cell_size();

        let mut gradient = [0.0; 3];
        for (axis, g) in gradient.iter_mut().enumerate() {
            let neighbor = |offset_up: bool| {
                let idx = cell[axis];
                let moved = if offset_up {
                    (idx + 1 < n).then_some(idx + 1)
                } else {
                    idx.checked_sub(1)
                };
                match moved {
                    Some(m) => {
                        let mut c = cell;
                        c[axis] = m;
                        self.cell(c[0], c[1], c[2])
                    }
                    None => self.boundary().ghost(center),
                }
            };
            *g = (neighbor(true) - neighbor(false)) / denom;
        }
        gradient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpaceBounds;
    use crate::substance::{BoundaryCondition, SubstanceDefinition};

    fn field(n: usize) -> SubstanceField {
        let bounds = SpaceBounds {
            min: 0.0,
            max: n as f64 * 2.0,
        };
        SubstanceField::new(&SubstanceDefinition::new(1, "probe", 0.1, 0.0, n), bounds, 1.0)
            .expect("valid field")
    }

    fn norm(v: [f64; 3]) -> f64 {
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
    }

    #[test]
    fn gradient_vanishes_at_single_interior_maximum() {
        let mut f = field(7);
        f.initialize(|x, y, z| {
            let d2 = (x - 7.0).powi(2) + (y - 7.0).powi(2) + (z - 7.0).powi(2);
            100.0 * (-d2 / 20.0).exp()
        });
        // Cell 3 spans [6, 8) and is the peak.
        let g = f.gradient([7.0, 7.0, 7.0]);
        assert!(norm(g) < 1e-12, "gradient at maximum was {g:?}");
        let off_peak = f.gradient([3.0, 7.0, 7.0]);
        assert!(off_peak[0] > 0.0, "gradient should point toward the peak");
    }

    #[test]
    fn gradient_of_linear_profile_matches_slope() {
        let mut f = field(10);
        f.initialize(|x, y, _| 3.0 * x + 0.5 * y);
        let g = f.gradient([9.0, 9.0, 9.0]);
        assert!((g[0] - 3.0).abs() < 1e-9);
        assert!((g[1] - 0.5).abs() < 1e-9);
        assert!(g[2].abs() < 1e-12);
    }

    #[test]
    fn zero_flux_edge_uses_half_difference() {
        let mut f = field(4);
        f.initialize(|x, _, _| x);
        // Cell 0 center 1.0, cell 1 center 3.0; ghost equals cell 0.
        let g = f.gradient([0.0, 0.0, 0.0]);
        assert!((g[0] - (3.0 - 1.0) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn absorbing_edge_treats_outside_as_empty() {
        let def = SubstanceDefinition::new(1, "probe", 0.1, 0.0, 4)
            .with_boundary(BoundaryCondition::Absorbing);
        let bounds = SpaceBounds { min: 0.0, max: 8.0 };
        let mut f = SubstanceField::new(&def, bounds, 1.0).expect("valid field");
        f.initialize(|_, _, _| 2.0);
        let g = f.gradient([7.9, 4.0, 4.0]);
        assert!((g[0] - (0.0 - 2.0) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn trilinear_interpolation_between_centers() {
        let mut f = field(4);
        f.initialize(|x, y, z| x + 2.0 * y - z + 10.0);
        let p = [2.5, 3.25, 4.0];
        let expected = p[0] + 2.0 * p[1] - p[2] + 10.0;
        assert!((f.concentration(p) - expected).abs() < 1e-9);
    }

    #[test]
    fn queries_outside_grid_are_clamped() {
        let mut f = field(4);
        f.initialize(|x, _, _| x);
        assert_eq!(f.concentration([-50.0, 1.0, 1.0]), f.cell(0, 0, 0));
        assert_eq!(f.concentration([500.0, 1.0, 1.0]), f.cell(3, 0, 0));
        assert_eq!(f.concentration_nearest([500.0, -3.0, 1.0]), f.cell(3, 0, 0));
        let g = f.gradient([f64::NAN, 1.0, 1.0]);
        assert!(g.iter().all(|v| v.is_finite()));
    }
}
