use super::Scheduler;
use crate::substance::SubstanceId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default)]
pub struct StepTimings {
    pub diffusion_us: u64,
    pub behavior_us: u64,
    pub commit_us: u64,
    pub total_us: u64,
}

/// What happened to the agent population during one step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounters {
    pub divisions: usize,
    pub rejected_divisions: usize,
    pub boundary_violations: usize,
}

impl StepCounters {
    pub(crate) fn accumulate(&mut self, other: &StepCounters) {
        self.divisions += other.divisions;
        self.rejected_divisions += other.rejected_divisions;
        self.boundary_violations += other.boundary_violations;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubstanceSummary {
    pub id: SubstanceId,
    pub name: String,
    pub total_concentration: f64,
    pub max_concentration: f64,
}

fn default_schema_version() -> u32 {
    1
}

/// Report of one `simulate` call, for the reporting collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Steps executed by this call.
    pub steps: u64,
    /// Scheduler step index after the call.
    pub final_step: u64,
    pub simulated_time: f64,
    pub agent_count: usize,
    #[serde(default)]
    pub counters: StepCounters,
    #[serde(default)]
    pub substances: Vec<SubstanceSummary>,
}

impl RunSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Scheduler {
    pub(crate) fn collect_substance_summaries(&self) -> Vec<SubstanceSummary> {
        self.substances
            .iter()
            .map(|field| SubstanceSummary {
                id: field.id(),
                name: field.name().to_string(),
                total_concentration: field.total_concentration(),
                max_concentration: field.data().iter().copied().fold(0.0, f64::max),
            })
            .collect()
    }

    pub(crate) fn build_summary(&self, steps: u64, counters: StepCounters) -> RunSummary {
        RunSummary {
            schema_version: 1,
            steps,
            final_step: self.step_index,
            simulated_time: self.simulated_time(),
            agent_count: self.agents.len(),
            counters,
            substances: self.collect_substance_summaries(),
        }
    }
}
