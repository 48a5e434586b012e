//! Per-agent behavior modules, run once per scheduler step.

mod chemotaxis;
mod gene_regulation;
mod grow_divide;

pub use chemotaxis::Chemotaxis;
pub use gene_regulation::{Gene, GeneRegulation, GeneUpdate};
pub use grow_divide::GrowDivide;

use crate::agent::AgentState;
use crate::sampler::GradientSampler;
use crate::substance::{SubstanceId, SubstanceRegistry};
use std::any::Any;
use std::fmt;

/// Read-only view of the world handed to every behavior invocation.
///
/// Fields are already diffused for the current step and cannot change while
/// behaviors run.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Index of the step being executed (the first step is 0).
    pub step: u64,
    /// `step * time_step`.
    pub simulated_time: f64,
    pub time_step: f64,
    substances: &'a SubstanceRegistry,
}

impl<'a> StepContext<'a> {
    pub fn new(step: u64, time_step: f64, substances: &'a SubstanceRegistry) -> Self {
        Self {
            step,
            simulated_time: step as f64 * time_step,
            time_step,
            substances,
        }
    }

    pub fn sampler(&self, id: SubstanceId) -> Option<&'a dyn GradientSampler> {
        self.substances
            .get(id)
            .map(|field| field as &dyn GradientSampler)
    }
}

/// Topology change requested by a behavior; applied by the scheduler between steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BehaviorEvent {
    /// Split the agent, handing `volume_ratio` of its volume to a new daughter.
    Divide { volume_ratio: f64 },
}

pub trait BehaviorModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Advance this module by one step, mutating only the owning agent.
    fn run(&mut self, agent: &mut AgentState, ctx: &StepContext<'_>) -> Option<BehaviorEvent>;

    /// Substances this module samples; checked when the agent is added.
    fn required_substances(&self) -> Vec<SubstanceId> {
        Vec::new()
    }

    /// Reject settings that cannot run correctly on an agent starting in
    /// `initial`; checked when the agent is added.
    fn validate(&self, _initial: &AgentState) -> Result<(), &'static str> {
        Ok(())
    }

    /// Deep copy used when an agent divides.
    fn box_clone(&self) -> Box<dyn BehaviorModule>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn BehaviorModule> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl fmt::Debug for dyn BehaviorModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
