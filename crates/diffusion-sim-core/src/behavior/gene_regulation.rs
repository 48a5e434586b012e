use super::{BehaviorEvent, BehaviorModule, StepContext};
use crate::agent::AgentState;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Update rule `(simulated_time, previous_concentration) -> new_concentration`.
pub type GeneUpdate = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

#[derive(Clone)]
pub struct Gene {
    update: GeneUpdate,
    concentration: f64,
}

impl Gene {
    pub fn concentration(&self) -> f64 {
        self.concentration
    }
}

impl fmt::Debug for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gene")
            .field("concentration", &self.concentration)
            .finish_non_exhaustive()
    }
}

/// A fixed set of scalar gene concentrations, each driven by its own rule.
///
/// Genes are added while the module is being built; once attached to an agent
/// the list only changes through `run`.
#[derive(Clone, Debug, Default)]
pub struct GeneRegulation {
    genes: Vec<Gene>,
}

impl GeneRegulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gene<F>(mut self, update: F, initial_concentration: f64) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        self.genes.push(Gene {
            update: Arc::new(update),
            concentration: initial_concentration,
        });
        self
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn concentrations(&self) -> Vec<f64> {
        self.genes.iter().map(|g| g.concentration).collect()
    }

    /// Apply every rule once at `time`. Each gene sees only its own previous value.
    pub fn advance(&mut self, time: f64) {
        for gene in &mut self.genes {
            gene.concentration = (gene.update)(time, gene.concentration);
        }
    }
}

impl BehaviorModule for GeneRegulation {
    fn name(&self) -> &'static str {
        "gene_regulation"
    }

    fn run(&mut self, _agent: &mut AgentState, ctx: &StepContext<'_>) -> Option<BehaviorEvent> {
        self.advance(ctx.simulated_time);
        None
    }

    fn box_clone(&self) -> Box<dyn BehaviorModule> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_genes() -> GeneRegulation {
        GeneRegulation::new()
            .with_gene(|t, c| t * c + 0.2, 1.0)
            .with_gene(|t, c| c * c * t, 5.0)
            .with_gene(|t, c| c + t + 3.0, 7.0)
    }

    fn trajectory(steps: u64, dt: f64) -> Vec<Vec<f64>> {
        let mut genes = reference_genes();
        (0..steps)
            .map(|step| {
                genes.advance(step as f64 * dt);
                genes.concentrations()
            })
            .collect()
    }

    #[test]
    fn replay_is_bit_identical() {
        let a = trajectory(200, 0.01);
        let b = trajectory(200, 0.01);
        let bits = |v: &Vec<Vec<f64>>| -> Vec<u64> {
            v.iter().flatten().map(|x| x.to_bits()).collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn first_steps_follow_rules() {
        let mut genes = reference_genes();
        genes.advance(0.0);
        assert_eq!(genes.concentrations(), vec![0.2, 0.0, 10.0]);
        genes.advance(1.0);
        assert_eq!(genes.concentrations(), vec![0.4, 0.0, 14.0]);
    }

    #[test]
    fn clones_do_not_share_state() {
        let mut original = reference_genes();
        let copy = original.clone();
        original.advance(2.0);
        assert_eq!(copy.concentrations(), vec![1.0, 5.0, 7.0]);
        assert_ne!(original.concentrations(), copy.concentrations());
    }
}
