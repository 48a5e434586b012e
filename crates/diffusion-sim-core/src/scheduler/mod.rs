pub mod metrics;
mod phases;

pub use metrics::*;

use crate::agent::{Agent, AgentId};
use crate::config::{SimConfig, SimConfigError};
use crate::store::AgentStore;
use crate::substance::{FieldError, SubstanceDefinition, SubstanceField, SubstanceId, SubstanceRegistry};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::{error::Error, fmt};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    /// A step failed; the step index is the one that did not complete.
    Aborted { step: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    Config(SimConfigError),
    Field(FieldError),
    DuplicateSubstance(SubstanceId),
    UnknownSubstance {
        agent_index: usize,
        behavior: &'static str,
        substance: SubstanceId,
    },
    InvalidAgent { agent_index: usize, reason: &'static str },
    TooManyAgents { max: usize, actual: usize },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Config(e) => write!(f, "{e}"),
            SetupError::Field(e) => write!(f, "{e}"),
            SetupError::DuplicateSubstance(id) => {
                write!(f, "substance {id} is already registered")
            }
            SetupError::UnknownSubstance {
                agent_index,
                behavior,
                substance,
            } => write!(
                f,
                "agent at index {agent_index}: {behavior} samples unregistered substance {substance}"
            ),
            SetupError::InvalidAgent {
                agent_index,
                reason,
            } => write!(f, "agent at index {agent_index}: {reason}"),
            SetupError::TooManyAgents { max, actual } => {
                write!(f, "agent count ({actual}) exceeds max_agents ({max})")
            }
        }
    }
}

impl From<SimConfigError> for SetupError {
    fn from(err: SimConfigError) -> Self {
        SetupError::Config(err)
    }
}

impl From<FieldError> for SetupError {
    fn from(err: FieldError) -> Self {
        SetupError::Field(err)
    }
}

impl Error for SetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SetupError::Config(e) => Some(e),
            SetupError::Field(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    NumericalInstability { step: u64, source: FieldError },
    /// The scheduler already aborted at `step` and cannot continue.
    Aborted { step: u64 },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::NumericalInstability { step, source } => {
                write!(f, "step {step}: {source}")
            }
            SimulationError::Aborted { step } => {
                write!(f, "simulation aborted at step {step}; no further steps possible")
            }
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimulationError::NumericalInstability { source, .. } => Some(source),
            SimulationError::Aborted { .. } => None,
        }
    }
}

/// Drives fields and agents forward in lockstep.
///
/// Each step diffuses every field, runs every agent's behaviors against the
/// freshly diffused fields, then commits the divisions requested during the
/// step.
pub struct Scheduler {
    pub(crate) config: SimConfig,
    pub(crate) substances: SubstanceRegistry,
    pub(crate) agents: AgentStore,
    pub(crate) state: SchedulerState,
    pub(crate) step_index: u64,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) totals: StepCounters,
}

impl Scheduler {
    pub fn new(config: SimConfig) -> Result<Self, SetupError> {
        config.validate()?;
        Ok(Self {
            rng: ChaCha12Rng::seed_from_u64(config.seed),
            config,
            substances: SubstanceRegistry::new(),
            agents: AgentStore::new(),
            state: SchedulerState::Idle,
            step_index: 0,
            totals: StepCounters::default(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of completed steps.
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn simulated_time(&self) -> f64 {
        self.step_index as f64 * self.config.time_step
    }

    pub fn agents(&self) -> &AgentStore {
        &self.agents
    }

    pub fn substances(&self) -> &SubstanceRegistry {
        &self.substances
    }

    pub fn substance(&self, id: SubstanceId) -> Option<&SubstanceField> {
        self.substances.get(id)
    }

    /// Mutable access for initialization between runs.
    pub fn substance_mut(&mut self, id: SubstanceId) -> Option<&mut SubstanceField> {
        self.substances.get_mut(id)
    }

    /// Cumulative population counters over all steps so far.
    pub fn totals(&self) -> &StepCounters {
        &self.totals
    }

    /// Create the field for `definition` over the configured space.
    pub fn add_substance(
        &mut self,
        definition: &SubstanceDefinition,
    ) -> Result<&mut SubstanceField, SetupError> {
        let field = SubstanceField::new(definition, self.config.bounds(), self.config.time_step)?;
        self.substances
            .insert(field)
            .map_err(|field| SetupError::DuplicateSubstance(field.id()))
    }

    /// Validate and store an agent. Every substance its behaviors sample must
    /// already be registered.
    pub fn add_agent(&mut self, agent: Agent) -> Result<AgentId, SetupError> {
        let agent_index = self.agents.len();
        if agent_index >= self.config.max_agents {
            return Err(SetupError::TooManyAgents {
                max: self.config.max_agents,
                actual: agent_index + 1,
            });
        }
        let state = &agent.state;
        if !state.position.iter().all(|p| p.is_finite()) {
            return Err(SetupError::InvalidAgent {
                agent_index,
                reason: "position must be finite",
            });
        }
        if !(state.diameter.is_finite() && state.diameter > 0.0) {
            return Err(SetupError::InvalidAgent {
                agent_index,
                reason: "diameter must be finite and positive",
            });
        }
        if !(state.mass.is_finite() && state.mass > 0.0) {
            return Err(SetupError::InvalidAgent {
                agent_index,
                reason: "mass must be finite and positive",
            });
        }
        for behavior in agent.behaviors() {
            behavior
                .validate(state)
                .map_err(|reason| SetupError::InvalidAgent {
                    agent_index,
                    reason,
                })?;
            if let Some(substance) = behavior
                .required_substances()
                .into_iter()
                .find(|id| !self.substances.contains(*id))
            {
                return Err(SetupError::UnknownSubstance {
                    agent_index,
                    behavior: behavior.name(),
                    substance,
                });
            }
        }
        Ok(self.agents.append(agent))
    }

    pub fn add_agents(
        &mut self,
        agents: impl IntoIterator<Item = Agent>,
    ) -> Result<Vec<AgentId>, SetupError> {
        agents.into_iter().map(|a| self.add_agent(a)).collect()
    }

    /// Run exactly `steps` steps.
    ///
    /// Callable from `Idle` and again after `Completed`, continuing the same
    /// timeline. A numerical failure aborts the scheduler for good.
    pub fn simulate(&mut self, steps: u64) -> Result<RunSummary, SimulationError> {
        if let SchedulerState::Aborted { step } = self.state {
            return Err(SimulationError::Aborted { step });
        }
        self.state = SchedulerState::Running;
        info!(
            steps,
            start_step = self.step_index,
            agents = self.agents.len(),
            substances = self.substances.len(),
            "simulation started"
        );

        let mut counters = StepCounters::default();
        for _ in 0..steps {
            let (_, step_counters) = self.step_inner()?;
            counters.accumulate(&step_counters);
        }

        self.state = SchedulerState::Completed;
        info!(
            final_step = self.step_index,
            agents = self.agents.len(),
            divisions = counters.divisions,
            rejected_divisions = counters.rejected_divisions,
            "simulation completed"
        );
        Ok(self.build_summary(steps, counters))
    }

    /// Run a single step outside of `simulate`. Behaves like `simulate(1)`
    /// for the state machine: the scheduler ends up `Completed` or `Aborted`.
    pub fn step(&mut self) -> Result<StepTimings, SimulationError> {
        if let SchedulerState::Aborted { step } = self.state {
            return Err(SimulationError::Aborted { step });
        }
        self.state = SchedulerState::Running;
        let (timings, _) = self.step_inner()?;
        self.state = SchedulerState::Completed;
        Ok(timings)
    }

    fn step_inner(&mut self) -> Result<(StepTimings, StepCounters), SimulationError> {
        self.run_step().map_err(|source| {
            let step = self.step_index;
            self.state = SchedulerState::Aborted { step };
            error!(step, error = %source, "simulation aborted");
            SimulationError::NumericalInstability { step, source }
        })
    }
}
