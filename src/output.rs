//! Per-cycle output of the trajectory generator.

use crate::trajectory::{Trajectory, TrajectoryType};

/// Output of the OTG, rewritten each control cycle.
#[derive(Debug, Clone, Default)]
pub struct OutputParameter {
    pub new_position: Vec<f64>,
    pub new_velocity: Vec<f64>,
    pub new_acceleration: Vec<f64>,

    /// Whether a new trajectory calculation was performed in the last cycle.
    pub new_calculation: bool,
    /// Duration of the last calculation, in microseconds.
    pub calculation_duration: f64,

    /// The trajectory currently being followed.
    pub trajectory: Trajectory,
    /// Elapsed time on the current trajectory.
    pub time: f64,
    /// Which trajectory variant is active.
    pub type_: TrajectoryType,
}

impl OutputParameter {
    pub fn new(dofs: usize) -> Self {
        Self {
            new_position: vec![0.0; dofs],
            new_velocity: vec![0.0; dofs],
            new_acceleration: vec![0.0; dofs],
            new_calculation: false,
            calculation_duration: 0.0,
            trajectory: Trajectory::default(),
            time: 0.0,
            type_: TrajectoryType::Waypoint,
        }
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.new_position.len()
    }

    /// Copies the freshly evaluated state into the next cycle's input, the
    /// usual driver pattern for following a trajectory.
    pub fn pass_to_input(&self, input: &mut crate::InputParameter) {
        input.current_position.copy_from_slice(&self.new_position);
        input.current_velocity.copy_from_slice(&self.new_velocity);
        input
            .current_acceleration
            .copy_from_slice(&self.new_acceleration);
    }
}
