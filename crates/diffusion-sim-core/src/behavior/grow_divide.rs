use super::{BehaviorEvent, BehaviorModule, StepContext};
use crate::agent::AgentState;
use std::any::Any;

/// Grows the agent's diameter each step and requests an equal split once the
/// diameter reaches `division_threshold`.
///
/// An equal split divides the diameter by `2^(1/3)`, so both halves stay
/// below the threshold only while the dividing diameter is under
/// `division_threshold * 2^(1/3)`. [`BehaviorModule::validate`] enforces that
/// for the growth rate and the agent's starting diameter.
#[derive(Clone, Debug, PartialEq)]
pub struct GrowDivide {
    growth_rate: f64,
    division_threshold: f64,
    max_active_steps: Option<u64>,
    active_steps: u64,
}

impl GrowDivide {
    /// `growth_rate` is the diameter increment per step.
    pub fn new(growth_rate: f64, division_threshold: f64) -> Self {
        Self {
            growth_rate,
            division_threshold,
            max_active_steps: None,
            active_steps: 0,
        }
    }

    /// Stop growing and dividing after `steps` active steps.
    pub fn with_max_active_steps(mut self, steps: u64) -> Self {
        self.max_active_steps = Some(steps);
        self
    }

    pub fn growth_rate(&self) -> f64 {
        self.growth_rate
    }

    pub fn division_threshold(&self) -> f64 {
        self.division_threshold
    }

    pub fn active_steps(&self) -> u64 {
        self.active_steps
    }

    /// Largest diameter whose equal halves are still below the threshold.
    pub fn max_dividing_diameter(&self) -> f64 {
        self.division_threshold * 2f64.cbrt()
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_active_steps
            .is_some_and(|max| self.active_steps >= max)
    }
}

impl BehaviorModule for GrowDivide {
    fn name(&self) -> &'static str {
        "grow_divide"
    }

    fn run(&mut self, agent: &mut AgentState, _ctx: &StepContext<'_>) -> Option<BehaviorEvent> {
        if self.is_exhausted() {
            return None;
        }
        self.active_steps += 1;
        // A rejected division leaves the agent at the threshold; it waits there.
        if agent.diameter < self.division_threshold {
            agent.set_diameter_keep_density(agent.diameter + self.growth_rate);
        }
        (agent.diameter >= self.division_threshold)
            .then_some(BehaviorEvent::Divide { volume_ratio: 0.5 })
    }

    fn validate(&self, initial: &AgentState) -> Result<(), &'static str> {
        if !(self.growth_rate.is_finite() && self.growth_rate >= 0.0) {
            return Err("grow_divide growth rate must be finite and >= 0");
        }
        if !(self.division_threshold.is_finite() && self.division_threshold > 0.0) {
            return Err("grow_divide division threshold must be finite and positive");
        }
        let limit = self.max_dividing_diameter();
        if self.division_threshold + self.growth_rate >= limit {
            return Err("grow_divide growth rate must stay below division_threshold * (2^(1/3) - 1)");
        }
        if initial.diameter >= limit {
            return Err("diameter must stay below grow_divide division_threshold * 2^(1/3)");
        }
        Ok(())
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
    use crate::agent::Agent;
    use crate::substance::SubstanceRegistry;

    #[test]
    fn grows_until_threshold_then_requests_division() {
        let registry = SubstanceRegistry::new();
        let ctx = StepContext::new(0, 1.0, &registry);
        let mut agent = Agent::new([0.0; 3]).with_diameter(9.0).with_mass(1.0);
        let mut module = GrowDivide::new(0.5, 10.0);

        assert_eq!(module.run(&mut agent.state, &ctx), None);
        assert!((agent.diameter() - 9.5).abs() < 1e-12);
        assert!(agent.mass() > 1.0);
        assert_eq!(
            module.run(&mut agent.state, &ctx),
            Some(BehaviorEvent::Divide { volume_ratio: 0.5 })
        );
        assert_eq!(module.active_steps(), 2);
    }

    #[test]
    fn rejected_division_does_not_keep_growing() {
        let registry = SubstanceRegistry::new();
        let ctx = StepContext::new(0, 1.0, &registry);
        let mut agent = Agent::new([0.0; 3]).with_diameter(9.8);
        let mut module = GrowDivide::new(0.5, 10.0);
        for _ in 0..5 {
            assert_eq!(
                module.run(&mut agent.state, &ctx),
                Some(BehaviorEvent::Divide { volume_ratio: 0.5 })
            );
        }
        assert!((agent.diameter() - 10.3).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        let state = Agent::new([0.0; 3]).with_diameter(30.0).state;
        assert!(GrowDivide::new(0.01, 35.0).validate(&state).is_ok());
        assert!(GrowDivide::new(0.0, 35.0).validate(&state).is_ok());
        assert!(GrowDivide::new(-1.0, 35.0).validate(&state).is_err());
        assert!(GrowDivide::new(f64::NAN, 35.0).validate(&state).is_err());
        assert!(GrowDivide::new(0.1, 0.0).validate(&state).is_err());
        assert!(GrowDivide::new(0.1, f64::INFINITY).validate(&state).is_err());
        // 35 * (2^(1/3) - 1) is about 9.1.
        assert!(GrowDivide::new(10.0, 35.0).validate(&state).is_err());
        assert!(GrowDivide::new(9.0, 35.0).validate(&state).is_ok());

        let module = GrowDivide::new(0.1, 35.0);
        let above_threshold = Agent::new([0.0; 3]).with_diameter(40.0).state;
        assert!(module.validate(&above_threshold).is_ok());
        let too_large = Agent::new([0.0; 3]).with_diameter(45.0).state;
        assert!(module.validate(&too_large).is_err());
    }

    #[test]
    fn exhausted_budget_freezes_agent() {
        let registry = SubstanceRegistry::new();
        let ctx = StepContext::new(0, 1.0, &registry);
        let mut agent = Agent::new([0.0; 3]).with_diameter(5.0);
        let mut module = GrowDivide::new(1.0, 100.0).with_max_active_steps(3);
        for _ in 0..10 {
            module.run(&mut agent.state, &ctx);
        }
        assert!(module.is_exhausted());
        assert!((agent.diameter() - 8.0).abs() < 1e-12);
    }
}
