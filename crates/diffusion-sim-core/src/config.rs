use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// What happens to an agent whose position leaves the simulation space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundPolicy {
    /// Clamp every coordinate back into `[min_bound, max_bound]`.
    #[default]
    Clamp,
    /// Keep the position, log a warning and count the violation.
    Warn,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for agent placement and division axes.
    pub seed: u64,
    /// Lower corner of the cubic simulation space (same on every axis).
    pub min_bound: f64,
    /// Upper corner of the cubic simulation space (same on every axis).
    pub max_bound: f64,
    /// Enforce `bound_policy` on agent positions after each agent's behaviors.
    pub bound_space: bool,
    pub bound_policy: BoundPolicy,
    /// Simulated time covered by one scheduler step.
    pub time_step: f64,
    /// Run the diffusion and behavior phases on the rayon pool.
    pub parallel: bool,
    /// Divisions that would grow the store past this size are rejected.
    pub max_agents: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            min_bound: 0.0,
            max_bound: 1000.0,
            bound_space: true,
            bound_policy: BoundPolicy::Clamp,
            time_step: 1.0,
            parallel: true,
            max_agents: Self::MAX_TOTAL_AGENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    InvalidBounds { min: f64, max: f64 },
    InvalidTimeStep(f64),
    InvalidMaxAgents { max: usize, actual: usize },
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::InvalidBounds { min, max } => write!(
                f,
                "min_bound ({min}) must be finite and strictly below max_bound ({max})"
            ),
            SimConfigError::InvalidTimeStep(dt) => {
                write!(f, "time_step ({dt}) must be finite and positive")
            }
            SimConfigError::InvalidMaxAgents { max, actual } => {
                write!(f, "max_agents ({actual}) must be in 1..={max}")
            }
        }
    }
}

impl Error for SimConfigError {}

impl SimConfig {
    pub const MAX_TOTAL_AGENTS: usize = 4_000_000;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if !self.min_bound.is_finite()
            || !self.max_bound.is_finite()
            || self.min_bound >= self.max_bound
        {
            return Err(SimConfigError::InvalidBounds {
                min: self.min_bound,
                max: self.max_bound,
            });
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(SimConfigError::InvalidTimeStep(self.time_step));
        }
        if self.max_agents == 0 || self.max_agents > Self::MAX_TOTAL_AGENTS {
            return Err(SimConfigError::InvalidMaxAgents {
                max: Self::MAX_TOTAL_AGENTS,
                actual: self.max_agents,
            });
        }
        Ok(())
    }

    /// Parse a JSON config; missing keys fall back to `SimConfig::default()`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn bounds(&self) -> SpaceBounds {
        SpaceBounds {
            min: self.min_bound,
            max: self.max_bound,
        }
    }
}

/// Axis-aligned cube `[min, max]^3` shared by fields and agent placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpaceBounds {
    pub min: f64,
    pub max: f64,
}

impl SpaceBounds {
    pub fn extent(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, position: [f64; 3]) -> bool {
        position.iter().all(|&p| p >= self.min && p <= self.max)
    }

    pub fn clamp(&self, position: [f64; 3]) -> [f64; 3] {
        position.map(|p| p.clamp(self.min, self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = SimConfig {
            min_bound: 10.0,
            max_bound: 10.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn non_positive_time_step_is_rejected() {
        let config = SimConfig {
            time_step: 0.0,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(SimConfigError::InvalidTimeStep(0.0))
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = SimConfig::from_json_str(r#"{"seed": 7, "bound_policy": "warn"}"#)
            .expect("valid json");
        assert_eq!(config.seed, 7);
        assert_eq!(config.bound_policy, BoundPolicy::Warn);
        assert_eq!(config.max_bound, 1000.0);
        assert!(config.parallel);
    }

    #[test]
    fn clamp_pulls_every_axis_inside() {
        let bounds = SpaceBounds {
            min: 0.0,
            max: 10.0,
        };
        assert_eq!(bounds.clamp([-1.0, 5.0, 12.0]), [0.0, 5.0, 10.0]);
        assert!(!bounds.contains([-1.0, 5.0, 12.0]));
        assert!(bounds.contains([0.0, 10.0, 3.0]));
    }
}
