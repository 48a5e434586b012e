//! Setup helpers: initial substance profiles and random agent placement.

use crate::agent::Agent;
use crate::config::SpaceBounds;
use crate::substance::SubstanceField;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Gaussian profile along one axis, constant across the other two.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianBand {
    pub mean: f64,
    pub sigma: f64,
    pub axis: Axis,
    pub amplitude: f64,
}

impl GaussianBand {
    /// Band with peak value 1.
    pub fn new(mean: f64, sigma: f64, axis: Axis) -> Self {
        Self {
            mean,
            sigma,
            axis,
            amplitude: 1.0,
        }
    }

    /// Band whose profile is the normal probability density.
    pub fn normalized(mean: f64, sigma: f64, axis: Axis) -> Self {
        Self {
            amplitude: 1.0 / (sigma * (2.0 * PI).sqrt()),
            ..Self::new(mean, sigma, axis)
        }
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn value(&self, position: [f64; 3]) -> f64 {
        let d = position[self.axis.index()] - self.mean;
        self.amplitude * (-(d * d) / (2.0 * self.sigma * self.sigma)).exp()
    }

    /// Add this band to `field`; bands applied one after another superimpose.
    pub fn apply(&self, field: &mut SubstanceField) {
        field.initialize(|x, y, z| self.value([x, y, z]));
    }

    /// One band per axis, all with the same mean and width.
    pub fn on_all_axes(mean: f64, sigma: f64) -> [GaussianBand; 3] {
        Axis::ALL.map(|axis| GaussianBand::new(mean, sigma, axis))
    }
}

/// Place `count` agents uniformly at random inside `bounds`.
pub fn create_agents_random<R, F>(
    bounds: SpaceBounds,
    count: usize,
    rng: &mut R,
    mut build: F,
) -> Vec<Agent>
where
    R: Rng + ?Sized,
    F: FnMut([f64; 3]) -> Agent,
{
    (0..count)
        .map(|_| {
            let position = [
                bounds.min + rng.random::<f64>() * bounds.extent(),
                bounds.min + rng.random::<f64>() * bounds.extent(),
                bounds.min + rng.random::<f64>() * bounds.extent(),
            ];
            build(position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substance::SubstanceDefinition;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn bands_on_several_axes_add_up() {
        let bounds = SpaceBounds {
            min: 0.0,
            max: 100.0,
        };
        let mut field =
            SubstanceField::new(&SubstanceDefinition::new(0, "s", 1.0, 0.0, 10), bounds, 1.0)
                .expect("valid field");
        for band in GaussianBand::on_all_axes(45.0, 20.0) {
            band.apply(&mut field);
        }
        // Cell 4 is centered at 45 on every axis: three peaks of 1.
        assert!((field.cell(4, 4, 4) - 3.0).abs() < 1e-12);
        let x_only = 1.0 + 2.0 * (-(40.0f64 * 40.0) / 800.0).exp();
        assert!((field.cell(4, 0, 0) - x_only).abs() < 1e-12);
    }

    #[test]
    fn normalized_band_matches_normal_pdf_peak() {
        let band = GaussianBand::normalized(0.0, 2.0, Axis::Y);
        let peak = band.value([5.0, 0.0, -5.0]);
        assert!((peak - 1.0 / (2.0 * (2.0 * PI).sqrt())).abs() < 1e-15);
    }

    #[test]
    fn random_placement_is_seeded_and_in_bounds() {
        let bounds = SpaceBounds {
            min: -10.0,
            max: 10.0,
        };
        let place = |seed| {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            create_agents_random(bounds, 50, &mut rng, |p| Agent::new(p).with_type(2))
        };
        let a = place(9);
        let b = place(9);
        assert_eq!(a.len(), 50);
        assert!(a.iter().all(|agent| bounds.contains(agent.position())));
        assert!(a
            .iter()
            .zip(&b)
            .all(|(x, y)| x.position() == y.position()));
    }
}
