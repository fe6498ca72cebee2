//! The per-cycle driver: validates the input, recalculates the trajectory
//! when the input changes and evaluates it at the current time.

use std::time::Instant;

use log::warn;

use crate::error::{OtgError, OtgResult};
use crate::input::InputParameter;
use crate::output::OutputParameter;
use crate::trajectory::{PathTrajectory, ProfileTrajectory, Trajectory, TrajectoryType};

/// Online trajectory generator for a fixed number of degrees of freedom.
///
/// Call [`update`](Otg::update) once per control cycle; the output holds the
/// next reference state. The trajectory is recalculated only when the input
/// differs from the previous cycle.
///
/// # Examples
///
/// ```
/// use otgen::{InputParameter, Otg, OtgResult, OutputParameter};
///
/// let mut otg = Otg::new(1, 0.01);
/// let mut input = InputParameter::new(1);
/// input.target_position = vec![1.0];
/// input.max_velocity = vec![1.0];
/// input.max_acceleration = vec![1.0];
/// input.max_jerk = vec![1.0];
/// let mut output = OutputParameter::new(1);
///
/// while otg.update(&input, &mut output) == OtgResult::Working {
///     // feed output.new_position to the plant
///     output.pass_to_input(&mut input);
/// }
/// ```
#[derive(Debug)]
pub struct Otg {
    /// Control cycle duration in seconds.
    pub delta_time: f64,
    /// Return `ErrorTrajectoryDuration` when the duration exceeds the hard
    /// ceiling.
    pub max_duration_guard: bool,

    dofs: usize,
    current_input: Option<InputParameter>,
}

impl Otg {
    pub fn new(dofs: usize, delta_time: f64) -> Self {
        Self {
            delta_time,
            max_duration_guard: true,
            dofs,
            current_input: None,
        }
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.dofs
    }

    /// Resets the internal state, forcing a recalculation on the next
    /// update.
    pub fn reset(&mut self) {
        self.current_input = None;
    }

    fn calculate(&mut self, input: &InputParameter, output: &mut OutputParameter) -> OtgResult {
        let start = Instant::now();
        // Calculate into a scratch trajectory; on failure the previously
        // computed one stays in place and remains usable for at_time.
        let result = match &input.path {
            Some(path) => {
                let mut trajectory = PathTrajectory::new(
                    path.clone(),
                    &input.current_velocity,
                    &input.current_acceleration,
                    &input.target_velocity,
                    &input.target_acceleration,
                );
                let result = trajectory.calculate(input, self.delta_time, self.max_duration_guard);
                if result == OtgResult::Working {
                    output.trajectory = Trajectory::Path(Box::new(trajectory));
                    output.type_ = TrajectoryType::Path;
                }
                result
            }
            None => {
                let mut trajectory = match &output.trajectory {
                    Trajectory::Profiles(t) => t.clone(),
                    Trajectory::Path(_) => ProfileTrajectory::new(self.dofs),
                };
                let result = trajectory.calculate(input, self.delta_time, self.max_duration_guard);
                if result == OtgResult::Working {
                    output.trajectory = Trajectory::Profiles(trajectory);
                    output.type_ = TrajectoryType::Waypoint;
                }
                result
            }
        };
        output.calculation_duration = start.elapsed().as_secs_f64() * 1e6;
        result
    }

    /// Advances the generator by one control cycle and writes the next
    /// kinematic reference state. Returns [`OtgResult::Finished`] once the
    /// trajectory end has been passed; error codes abort the cycle and leave
    /// the previous trajectory in place.
    pub fn update(&mut self, input: &InputParameter, output: &mut OutputParameter) -> OtgResult {
        if let Err(error) = input.validate() {
            warn!("{}", error);
            return error.code();
        }

        let changed = self.current_input.as_ref() != Some(input);
        if changed {
            let result = self.calculate(input, output);
            if result != OtgResult::Working {
                self.current_input = None;
                return result;
            }
            output.new_calculation = true;
            output.time = 0.0;
            self.current_input = Some(input.clone());
        } else {
            output.new_calculation = false;
        }

        output.time += self.delta_time;
        output.trajectory.at_time(
            output.time,
            &mut output.new_position,
            &mut output.new_velocity,
            &mut output.new_acceleration,
        );

        if output.time > output.trajectory.duration() {
            OtgResult::Finished
        } else {
            OtgResult::Working
        }
    }

    /// Like [`update`](Otg::update), but raises a descriptive [`OtgError`]
    /// with the input snapshot instead of returning an error code.
    pub fn update_strict(
        &mut self,
        input: &InputParameter,
        output: &mut OutputParameter,
    ) -> Result<OtgResult, OtgError> {
        input.validate()?;
        let result = self.update(input, output);
        match result {
            OtgResult::ErrorExecutionTimeCalculation => Err(OtgError::ExecutionTimeCalculation {
                dof: 0,
                input: format!("{}", input),
            }),
            OtgResult::ErrorSynchronizationCalculation => {
                Err(OtgError::SynchronizationCalculation {
                    duration: output.trajectory.duration(),
                    input: format!("{}", input),
                })
            }
            OtgResult::ErrorTrajectoryDuration => Err(OtgError::TrajectoryDuration {
                duration: output.trajectory.duration(),
                maximum: crate::trajectory::MAX_DURATION,
            }),
            OtgResult::Error | OtgResult::ErrorInvalidInput => Err(OtgError::InvalidInput {
                reason: "invalid input".to_string(),
                input: format!("{}", input),
            }),
            ok => Ok(ok),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert::close;

    fn basic_input() -> InputParameter {
        let mut input = InputParameter::new(1);
        input.target_position = vec![1.0];
        input.max_velocity = vec![1.0];
        input.max_acceleration = vec![1.0];
        input.max_jerk = vec![1.0];
        input
    }

    #[test]
    fn update_loop_runs_to_finished() {
        let mut otg = Otg::new(1, 0.01);
        let input = basic_input();
        let mut output = OutputParameter::new(1);

        let mut cycles = 0;
        loop {
            let result = otg.update(&input, &mut output);
            assert!(!result.is_error());
            cycles += 1;
            assert!(cycles < 1000, "trajectory never finished");
            if result == OtgResult::Finished {
                break;
            }
        }

        // Roughly duration / delta_time cycles, and the target is reached.
        assert!(cycles >= 318);
        close(output.new_position[0], 1.0, 1e-6);
        close(output.new_velocity[0], 0.0, 1e-6);
    }

    #[test]
    fn recalculates_only_on_change() {
        let mut otg = Otg::new(1, 0.01);
        let input = basic_input();
        let mut output = OutputParameter::new(1);

        otg.update(&input, &mut output);
        assert!(output.new_calculation);
        otg.update(&input, &mut output);
        assert!(!output.new_calculation);
        assert!(output.calculation_duration > 0.0);

        let mut changed = input.clone();
        changed.target_position[0] = 2.0;
        otg.update(&changed, &mut output);
        assert!(output.new_calculation);
    }

    #[test]
    fn invalid_input_is_rejected() {
        let mut otg = Otg::new(1, 0.01);
        let mut input = basic_input();
        input.max_jerk[0] = -1.0;
        let mut output = OutputParameter::new(1);
        assert_eq!(OtgResult::ErrorInvalidInput, otg.update(&input, &mut output));
        assert!(otg.update_strict(&input, &mut output).is_err());
    }

    #[test]
    fn time_advances_between_cycles() {
        let mut otg = Otg::new(1, 0.01);
        let input = basic_input();
        let mut output = OutputParameter::new(1);

        otg.update(&input, &mut output);
        close(output.time, 0.01, 1e-12);
        otg.update(&input, &mut output);
        close(output.time, 0.02, 1e-12);
    }

    #[test]
    fn output_tracks_monotone_position_for_forward_move() {
        let mut otg = Otg::new(1, 0.01);
        let input = basic_input();
        let mut output = OutputParameter::new(1);

        let mut last = 0.0;
        for _ in 0..400 {
            let result = otg.update(&input, &mut output);
            assert!(output.new_position[0] >= last - 1e-12);
            last = output.new_position[0];
            if result == OtgResult::Finished {
                break;
            }
        }
        close(last, 1.0, 1e-6);
    }
}
