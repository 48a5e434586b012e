use super::{BehaviorEvent, BehaviorModule, StepContext};
use crate::agent::AgentState;
use crate::substance::SubstanceId;
use std::any::Any;

/// Moves the agent along a weighted sum of substance gradients.
///
/// All gradients are sampled at the position the agent had when the module
/// started and combined into one displacement, so the order of the weights
/// does not matter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chemotaxis {
    weights: Vec<(SubstanceId, f64)>,
}

impl Chemotaxis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weight(mut self, substance: SubstanceId, weight: f64) -> Self {
        self.weights.push((substance, weight));
        self
    }

    pub fn weights(&self) -> &[(SubstanceId, f64)] {
        &self.weights
    }

    /// Combined displacement for an agent at `position`.
    pub fn displacement(&self, position: [f64; 3], ctx: &StepContext<'_>) -> [f64; 3] {
        let mut total = [0.0; 3];
        for &(substance, weight) in &self.weights {
            let Some(sampler) = ctx.sampler(substance) else {
                continue;
            };
            let gradient = sampler.gradient(position);
            for (t, g) in total.iter_mut().zip(gradient) {
                *t += weight * g;
            }
        }
        total
    }
}

impl BehaviorModule for Chemotaxis {
    fn name(&self) -> &'static str {
        "chemotaxis"
    }

    fn run(&mut self, agent: &mut AgentState, ctx: &StepContext<'_>) -> Option<BehaviorEvent> {
        let delta = self.displacement(agent.position, ctx);
        agent.update_position(delta);
        None
    }

    fn required_substances(&self) -> Vec<SubstanceId> {
        self.weights.iter().map(|&(id, _)| id).collect()
    }

    fn box_clone(&self) -> Box<dyn BehaviorModule> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
