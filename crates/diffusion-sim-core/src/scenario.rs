//! The three-substance chemotaxis model: banded substances, cells that follow
//! their gradients, regulate three genes and grow until they divide.

use crate::agent::Agent;
use crate::behavior::{Chemotaxis, GeneRegulation, GrowDivide};
use crate::config::SimConfig;
use crate::initializer::{create_agents_random, GaussianBand};
use crate::scheduler::{RunSummary, Scheduler, SetupError};
use crate::substance::{SubstanceDefinition, SubstanceId};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

pub const SUBSTANCE: SubstanceId = SubstanceId(0);
pub const Y_SUBSTANCE: SubstanceId = SubstanceId(1);
pub const Z_SUBSTANCE: SubstanceId = SubstanceId(2);

pub const SUBSTANCES: [(SubstanceId, &str); 3] = [
    (SUBSTANCE, "Substance"),
    (Y_SUBSTANCE, "Ysubstance"),
    (Z_SUBSTANCE, "Zsubstance"),
];
pub const BAND_CENTERS: [f64; 3] = [50.0, 200.0, 400.0];
pub const BAND_WIDTH: f64 = 250.0;
pub const CHEMOTAXIS_WEIGHTS: [f64; 3] = [0.5, 1.5, 1.5];
pub const CONCENTRATION_CEILING: f64 = 1e15;

/// How the three banded substances are discretized and scaled.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BandSetup {
    pub resolution: usize,
    pub diffusion_coefficient: f64,
    pub decay_constant: f64,
    /// Peak height of each band; `None` uses the normal-pdf height `1/(sigma*sqrt(2*pi))`.
    pub amplitude: Option<f64>,
}

impl Default for BandSetup {
    fn default() -> Self {
        Self {
            resolution: 10,
            diffusion_coefficient: 0.5,
            decay_constant: 0.005,
            amplitude: None,
        }
    }
}

/// Register `Substance`, `Ysubstance` and `Zsubstance`, each a Gaussian band on
/// all three axes centered at 50, 200 and 400 respectively.
pub fn add_banded_substances(
    scheduler: &mut Scheduler,
    setup: &BandSetup,
) -> Result<(), SetupError> {
    for ((id, name), center) in SUBSTANCES.into_iter().zip(BAND_CENTERS) {
        let definition = SubstanceDefinition::new(
            id.0,
            name,
            setup.diffusion_coefficient,
            setup.decay_constant,
            setup.resolution,
        )
        .with_threshold(CONCENTRATION_CEILING);
        let field = scheduler.add_substance(&definition)?;
        for band in GaussianBand::on_all_axes(center, BAND_WIDTH) {
            let band = match setup.amplitude {
                Some(amplitude) => band.with_amplitude(amplitude),
                None => GaussianBand::normalized(band.mean, band.sigma, band.axis),
            };
            band.apply(field);
        }
    }
    Ok(())
}

pub fn reference_chemotaxis() -> Chemotaxis {
    SUBSTANCES
        .into_iter()
        .zip(CHEMOTAXIS_WEIGHTS)
        .fold(Chemotaxis::new(), |module, ((id, _), weight)| {
            module.with_weight(id, weight)
        })
}

pub fn reference_genes() -> GeneRegulation {
    GeneRegulation::new()
        .with_gene(|t, c| t * c + 0.2, 1.0)
        .with_gene(|t, c| c * c * t, 5.0)
        .with_gene(|t, c| c + t + 3.0, 7.0)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoOptions {
    /// Cells created for each of the two cell types.
    pub cells_per_type: usize,
    /// Diameter increment per step for both cell types.
    ///
    /// A chosen constant, not derived from the reference model's volume rate
    /// of 3000 per unit time. A volume rate gives a diameter increment of
    /// `dV / (pi / 2 * d^2)` that shrinks as the cell grows; `GrowDivide` adds
    /// a constant increment instead. At 0.01 a type 1 cell first reaches its
    /// threshold after 500 steps.
    pub growth_rate: f64,
    pub bands: BandSetup,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            cells_per_type: 100,
            growth_rate: 0.01,
            bands: BandSetup::default(),
        }
    }
}

/// Build the full demo: banded substances plus two populations of randomly
/// placed cells (type 1: diameter 30 dividing at 35; type -1: diameter 50
/// dividing at 52).
pub fn reference_demo(config: SimConfig, options: &DemoOptions) -> Result<Scheduler, SetupError> {
    let bounds = config.bounds();
    let mut placement_rng = ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(1));
    let mut scheduler = Scheduler::new(config)?;
    add_banded_substances(&mut scheduler, &options.bands)?;

    let cell_types = [(1, 30.0, 35.0), (-1, 50.0, 52.0)];
    for (agent_type, diameter, threshold) in cell_types {
        let agents = create_agents_random(
            bounds,
            options.cells_per_type,
            &mut placement_rng,
            |position| {
                Agent::new(position)
                    .with_diameter(diameter)
                    .with_mass(1.0)
                    .with_adherence(0.4)
                    .with_type(agent_type)
                    .with_behavior(reference_genes())
                    .with_behavior(reference_chemotaxis())
                    .with_behavior(GrowDivide::new(options.growth_rate, threshold))
            },
        );
        scheduler.add_agents(agents)?;
    }
    Ok(scheduler)
}

/// Post-run view consumed by the CLI and the Python bindings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemoReport {
    pub simulated_steps: u64,
    /// Gene concentrations of the first agent, in gene order.
    pub gene_concentrations: Vec<f64>,
    pub summary: RunSummary,
}

/// Gene concentrations of the agent at index 0, in gene order.
pub fn first_agent_genes(scheduler: &Scheduler) -> Vec<f64> {
    scheduler
        .agents()
        .get(0)
        .and_then(|agent| agent.behavior::<GeneRegulation>())
        .map(GeneRegulation::concentrations)
        .unwrap_or_default()
}

pub fn run_reference_demo(
    config: SimConfig,
    options: &DemoOptions,
    steps: u64,
) -> Result<DemoReport, Box<dyn std::error::Error + Send + Sync>> {
    let mut scheduler = reference_demo(config, options)?;
    let summary = scheduler.simulate(steps)?;
    Ok(DemoReport {
        simulated_steps: scheduler.step_index(),
        gene_concentrations: first_agent_genes(&scheduler),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_demo() -> DemoOptions {
        DemoOptions {
            cells_per_type: 5,
            ..DemoOptions::default()
        }
    }

    #[test]
    fn reference_demo_builds_both_cell_types() {
        let scheduler = reference_demo(SimConfig::default(), &small_demo()).expect("valid demo");
        assert_eq!(scheduler.agents().len(), 10);
        assert_eq!(scheduler.substances().len(), 3);
        let types: Vec<i32> = scheduler.agents().iter().map(|a| a.state.agent_type).collect();
        assert_eq!(types.iter().filter(|&&t| t == 1).count(), 5);
        assert_eq!(types.iter().filter(|&&t| t == -1).count(), 5);
        assert!(scheduler
            .agents()
            .iter()
            .all(|a| a.state.adherence == 0.4 && a.mass() == 1.0));
        assert_eq!(first_agent_genes(&scheduler), vec![1.0, 5.0, 7.0]);
    }

    #[test]
    fn bands_peak_at_their_centers() {
        let mut scheduler = Scheduler::new(SimConfig::default()).expect("valid config");
        add_banded_substances(&mut scheduler, &BandSetup::default()).expect("stable fields");
        for ((id, name), center) in SUBSTANCES.into_iter().zip(BAND_CENTERS) {
            let field = scheduler.substance(id).expect("registered");
            assert_eq!(field.name(), name);
            let peak = (0..field.resolution())
                .max_by(|&a, &b| field.cell(a, 0, 0).total_cmp(&field.cell(b, 0, 0)))
                .map(|i| field.cell_center(i))
                .expect("non-empty grid");
            assert!(
                (peak - center).abs() <= field.cell_size() / 2.0,
                "{name} peaks at {peak}, expected near {center}"
            );
        }
    }

    #[test]
    fn demo_report_is_reproducible_and_serializes() {
        let options = small_demo();
        let first = run_reference_demo(SimConfig::default(), &options, 20).expect("run completes");
        let second = run_reference_demo(SimConfig::default(), &options, 20).expect("run completes");
        assert_eq!(first.simulated_steps, 20);
        assert_eq!(first.gene_concentrations.len(), 3);
        assert_eq!(
            first.gene_concentrations.iter().map(|c| c.to_bits()).collect::<Vec<_>>(),
            second.gene_concentrations.iter().map(|c| c.to_bits()).collect::<Vec<_>>()
        );
        let json = serde_json::to_string(&first).expect("report serializes");
        assert!(json.contains("\"gene_concentrations\""));
        assert!(json.contains("\"schema_version\":1"));
    }
}
