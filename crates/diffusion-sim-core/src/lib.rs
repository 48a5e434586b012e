pub mod agent;
pub mod behavior;
pub mod config;
pub mod initializer;
pub mod sampler;
pub mod scenario;
pub mod scheduler;
pub mod store;
pub mod substance;

pub use agent::{Agent, AgentId, AgentState};
pub use behavior::{BehaviorEvent, BehaviorModule, Chemotaxis, GeneRegulation, GrowDivide, StepContext};
pub use config::{BoundPolicy, SimConfig, SimConfigError, SpaceBounds};
pub use sampler::GradientSampler;
pub use scheduler::{
    RunSummary, Scheduler, SchedulerState, SetupError, SimulationError, StepCounters, StepTimings,
};
pub use substance::{
    BoundaryCondition, FieldError, SubstanceDefinition, SubstanceField, SubstanceId,
    SubstanceRegistry,
};
