use crate::behavior::BehaviorModule;
use std::f64::consts::PI;
use std::{error::Error, fmt};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {}", self.0)
    }
}

pub fn sphere_volume(diameter: f64) -> f64 {
    PI / 6.0 * diameter.powi(3)
}

pub fn sphere_diameter(volume: f64) -> f64 {
    (6.0 * volume / PI).cbrt()
}

/// Physical state of an agent. Behaviors mutate this, never the module list.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentState {
    /// Assigned by `AgentStore` on insertion.
    pub id: AgentId,
    pub position: [f64; 3],
    pub diameter: f64,
    pub mass: f64,
    pub adherence: f64,
    pub agent_type: i32,
}

impl AgentState {
    pub fn volume(&self) -> f64 {
        sphere_volume(self.diameter)
    }

    pub fn density(&self) -> f64 {
        self.mass / self.volume()
    }

    /// Move by `delta`. Bound enforcement happens after all behaviors ran.
    pub fn update_position(&mut self, delta: [f64; 3]) {
        for (p, d) in self.position.iter_mut().zip(delta) {
            *p += d;
        }
    }

    /// Change the diameter and scale mass with the volume so density is constant.
    pub fn set_diameter_keep_density(&mut self, diameter: f64) {
        let ratio = sphere_volume(diameter) / self.volume();
        self.diameter = diameter;
        if ratio.is_finite() {
            self.mass *= ratio;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DivisionError {
    InvalidVolumeRatio { agent: AgentId, ratio: f64 },
    NonPositiveResult {
        agent: AgentId,
        parent_diameter: f64,
        child_diameter: f64,
        parent_mass: f64,
        child_mass: f64,
    },
}

impl fmt::Display for DivisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivisionError::InvalidVolumeRatio { agent, ratio } => {
                write!(f, "{agent}: division volume ratio {ratio} is not a number")
            }
            DivisionError::NonPositiveResult {
                agent,
                parent_diameter,
                child_diameter,
                parent_mass,
                child_mass,
            } => write!(
                f,
                "{agent}: division would leave parent (d={parent_diameter}, m={parent_mass}) \
                 or child (d={child_diameter}, m={child_mass}) without positive size"
            ),
        }
    }
}

impl Error for DivisionError {}

#[derive(Clone, Debug)]
pub struct Agent {
    pub state: AgentState,
    pub(crate) behaviors: Vec<Box<dyn BehaviorModule>>,
}

impl Agent {
    pub fn new(position: [f64; 3]) -> Self {
        Self {
            state: AgentState {
                id: AgentId::default(),
                position,
                diameter: 10.0,
                mass: 1.0,
                adherence: 0.0,
                agent_type: 0,
            },
            behaviors: Vec::new(),
        }
    }

    pub fn with_diameter(mut self, diameter: f64) -> Self {
        self.state.diameter = diameter;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.state.mass = mass;
        self
    }

    pub fn with_adherence(mut self, adherence: f64) -> Self {
        self.state.adherence = adherence;
        self
    }

    pub fn with_type(mut self, agent_type: i32) -> Self {
        self.state.agent_type = agent_type;
        self
    }

    /// Append a behavior; behaviors run in the order they were added.
    pub fn with_behavior<B: BehaviorModule + 'static>(mut self, behavior: B) -> Self {
        self.behaviors.push(Box::new(behavior));
        self
    }

    pub fn add_behavior(&mut self, behavior: Box<dyn BehaviorModule>) {
        self.behaviors.push(behavior);
    }

    pub fn id(&self) -> AgentId {
        self.state.id
    }

    pub fn position(&self) -> [f64; 3] {
        self.state.position
    }

    pub fn diameter(&self) -> f64 {
        self.state.diameter
    }

    pub fn mass(&self) -> f64 {
        self.state.mass
    }

    pub fn volume(&self) -> f64 {
        self.state.volume()
    }

    pub fn behaviors(&self) -> &[Box<dyn BehaviorModule>] {
        &self.behaviors
    }

    /// First attached behavior of type `T`.
    pub fn behavior<T: BehaviorModule + 'static>(&self) -> Option<&T> {
        self.behaviors
            .iter()
            .find_map(|b| b.as_any().downcast_ref::<T>())
    }

    pub fn behaviors_of<T: BehaviorModule + 'static>(&self) -> impl Iterator<Item = &T> {
        self.behaviors
            .iter()
            .filter_map(|b| b.as_any().downcast_ref::<T>())
    }

    /// Split off a daughter holding `volume_ratio` of this agent's volume and mass.
    ///
    /// The daughter is a deep copy (behaviors included) with a placeholder id.
    /// Both agents are pushed apart along `axis` by a quarter of their new
    /// diameters. On error `self` is left untouched.
    pub fn divide(&mut self, volume_ratio: f64, axis: [f64; 3]) -> Result<Agent, DivisionError> {
        if volume_ratio.is_nan() {
            return Err(DivisionError::InvalidVolumeRatio {
                agent: self.state.id,
                ratio: volume_ratio,
            });
        }
        let volume = self.state.volume();
        let child_volume = volume * volume_ratio;
        let parent_volume = volume - child_volume;
        let child_diameter = sphere_diameter(child_volume);
        let parent_diameter = sphere_diameter(parent_volume);
        let child_mass = self.state.mass * volume_ratio;
        let parent_mass = self.state.mass - child_mass;

        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !(positive(child_diameter)
            && positive(parent_diameter)
            && positive(child_mass)
            && positive(parent_mass))
        {
            return Err(DivisionError::NonPositiveResult {
                agent: self.state.id,
                parent_diameter,
                child_diameter,
                parent_mass,
                child_mass,
            });
        }

        let origin = self.state.position;
        let mut child = self.clone();
        child.state.diameter = child_diameter;
        child.state.mass = child_mass;
        for axis_idx in 0..3 {
            child.state.position[axis_idx] = origin[axis_idx] + axis[axis_idx] * child_diameter / 4.0;
            self.state.position[axis_idx] =
                origin[axis_idx] - axis[axis_idx] * parent_diameter / 4.0;
        }
        self.state.diameter = parent_diameter;
        self.state.mass = parent_mass;
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_position_adds_delta() {
        let mut agent = Agent::new([1.0, 2.0, 3.0]);
        agent.state.update_position([0.5, -2.0, 0.0]);
        assert_eq!(agent.position(), [1.5, 0.0, 3.0]);
    }

    #[test]
    fn growing_keeps_density() {
        let mut state = Agent::new([0.0; 3]).with_diameter(10.0).with_mass(2.0).state;
        let density = state.density();
        state.set_diameter_keep_density(12.0);
        assert!((state.density() - density).abs() < 1e-12 * density);
        assert!(state.mass > 2.0);
    }

    #[test]
    fn equal_division_conserves_volume_and_mass() {
        let mut parent = Agent::new([5.0, 5.0, 5.0])
            .with_diameter(40.0)
            .with_mass(3.0)
            .with_type(-1);
        let before = parent.volume();
        let child = parent.divide(0.5, [1.0, 0.0, 0.0]).expect("valid division");
        let after = parent.volume() + child.volume();
        assert!((after - before).abs() < 1e-9 * before);
        assert!((parent.mass() + child.mass() - 3.0).abs() < 1e-12);
        assert!((parent.diameter() - child.diameter()).abs() < 1e-12);
        assert_eq!(child.state.agent_type, -1);
        assert!(child.position()[0] > parent.position()[0]);
        assert_eq!(child.position()[1], 5.0);
    }

    #[test]
    fn degenerate_division_leaves_parent_untouched() {
        let mut parent = Agent::new([0.0; 3]).with_diameter(20.0).with_mass(1.0);
        let snapshot = parent.state.clone();
        assert!(matches!(
            parent.divide(1.0, [0.0, 0.0, 1.0]),
            Err(DivisionError::NonPositiveResult { .. })
        ));
        assert!(matches!(
            parent.divide(f64::NAN, [0.0, 0.0, 1.0]),
            Err(DivisionError::InvalidVolumeRatio { .. })
        ));
        assert_eq!(parent.state, snapshot);
    }
}
