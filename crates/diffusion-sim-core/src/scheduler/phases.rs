use super::{Scheduler, StepCounters, StepTimings};
use crate::agent::{Agent, AgentId, AgentState};
use crate::behavior::{BehaviorEvent, StepContext};
use crate::config::{BoundPolicy, SpaceBounds};
use crate::substance::FieldError;
use rand::Rng;
use rayon::prelude::*;
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{debug, warn};

/// Division requested during the behavior phase, committed after it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DivisionEvent {
    pub index: usize,
    pub parent: AgentId,
    pub volume_ratio: f64,
}

#[derive(Default)]
struct AgentOutcome {
    events: Vec<BehaviorEvent>,
    out_of_bounds: bool,
}

/// Bound check applied after an agent's behaviors. Returns true when the
/// agent was outside the space.
fn enforce_bounds(
    state: &mut AgentState,
    bounds: Option<(SpaceBounds, BoundPolicy)>,
    step: u64,
) -> bool {
    let Some((bounds, policy)) = bounds else {
        return false;
    };
    if bounds.contains(state.position) {
        return false;
    }
    match policy {
        BoundPolicy::Clamp => state.position = bounds.clamp(state.position),
        BoundPolicy::Warn => warn!(
            step,
            agent = state.id.0,
            position = ?state.position,
            "agent left the simulation space"
        ),
    }
    true
}

fn run_agent(
    agent: &mut Agent,
    ctx: &StepContext<'_>,
    bounds: Option<(SpaceBounds, BoundPolicy)>,
) -> AgentOutcome {
    let Agent { state, behaviors } = agent;
    let mut outcome = AgentOutcome::default();
    for behavior in behaviors.iter_mut() {
        if let Some(event) = behavior.run(state, ctx) {
            outcome.events.push(event);
        }
    }
    outcome.out_of_bounds = enforce_bounds(state, bounds, ctx.step);
    outcome
}

fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> [f64; 3] {
    let z = rng.random_range(-1.0..=1.0);
    let phi = rng.random::<f64>() * 2.0 * PI;
    let r = (1.0f64 - z * z).max(0.0).sqrt();
    [r * phi.cos(), r * phi.sin(), z]
}

impl Scheduler {
    fn active_bounds(&self) -> Option<(SpaceBounds, BoundPolicy)> {
        self.config
            .bound_space
            .then(|| (self.config.bounds(), self.config.bound_policy))
    }

    /// (a) Advance every field by one timestep.
    fn step_diffusion_phase(&mut self) -> Result<(), FieldError> {
        self.substances.diffuse_all(self.config.parallel)
    }

    /// (b) Run all behaviors of all agents against the diffused fields.
    ///
    /// Fields are borrowed immutably for the whole phase and every agent only
    /// writes its own state, so agents can be processed in parallel. Events
    /// come back in agent order regardless of scheduling.
    fn step_behavior_phase(&mut self, counters: &mut StepCounters) -> Vec<DivisionEvent> {
        let ctx = StepContext::new(self.step_index, self.config.time_step, &self.substances);
        let bounds = self.active_bounds();
        let outcomes: Vec<AgentOutcome> = if self.config.parallel {
            self.agents
                .par_iter_mut()
                .map(|agent| run_agent(agent, &ctx, bounds))
                .collect()
        } else {
            self.agents
                .iter_mut()
                .map(|agent| run_agent(agent, &ctx, bounds))
                .collect()
        };

        let mut pending = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            if outcome.out_of_bounds {
                counters.boundary_violations += 1;
            }
            for event in outcome.events {
                match event {
                    BehaviorEvent::Divide { volume_ratio } => pending.push(DivisionEvent {
                        index,
                        parent: self.agents.as_slice()[index].id(),
                        volume_ratio,
                    }),
                }
            }
        }
        pending
    }

    /// (c) Apply pending divisions on a single thread.
    fn step_commit_phase(&mut self, pending: Vec<DivisionEvent>, counters: &mut StepCounters) {
        let bounds = self.active_bounds();
        for event in pending {
            if self.agents.len() >= self.config.max_agents {
                counters.rejected_divisions += 1;
                warn!(
                    step = self.step_index,
                    agent = event.parent.0,
                    max_agents = self.config.max_agents,
                    "division rejected: agent limit reached"
                );
                continue;
            }
            let axis = random_unit_vector(&mut self.rng);
            let Some(parent) = self.agents.get_mut(event.index) else {
                continue;
            };
            match parent.divide(event.volume_ratio, axis) {
                Ok(mut child) => {
                    enforce_bounds(&mut parent.state, bounds, self.step_index);
                    enforce_bounds(&mut child.state, bounds, self.step_index);
                    self.agents.append(child);
                    counters.divisions += 1;
                }
                Err(e) => {
                    counters.rejected_divisions += 1;
                    warn!(step = self.step_index, error = %e, "division rejected");
                }
            }
        }
    }

    /// One full step; (d) the step index advances only when all phases succeed.
    pub(crate) fn run_step(&mut self) -> Result<(StepTimings, StepCounters), FieldError> {
        let total_start = Instant::now();
        let mut counters = StepCounters::default();

        let t0 = Instant::now();
        self.step_diffusion_phase()?;
        let diffusion_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        let pending = self.step_behavior_phase(&mut counters);
        let behavior_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.step_commit_phase(pending, &mut counters);
        let commit_us = t2.elapsed().as_micros() as u64;

        debug!(
            step = self.step_index,
            agents = self.agents.len(),
            divisions = counters.divisions,
            diffusion_us,
            behavior_us,
            "step finished"
        );
        self.step_index += 1;
        self.totals.accumulate(&counters);

        Ok((
            StepTimings {
                diffusion_us,
                behavior_us,
                commit_us,
                total_us: total_start.elapsed().as_micros() as u64,
            },
            counters,
        ))
    }
}
