//! Per-cycle input of the trajectory generator.

use std::fmt;

use crate::error::OtgError;
use crate::path::Path;

/// Which kinematic quantity the generator controls towards its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interface {
    #[default]
    Position,
    Velocity,
}

/// How the DoFs are aligned in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Synchronization {
    /// Every DoF reaches its target exactly at the synchronized duration.
    #[default]
    Time,
    /// DoFs whose target velocity and acceleration are zero may stop early.
    TimeIfNecessary,
    /// Every DoF runs its own time-optimal profile.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationDiscretization {
    #[default]
    Continuous,
    /// The trajectory duration must be a multiple of the control cycle.
    Discrete,
}

/// Input of the OTG, consumed each control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct InputParameter {
    pub interface: Interface,
    pub synchronization: Synchronization,
    pub duration_discretization: DurationDiscretization,

    pub current_position: Vec<f64>,
    pub current_velocity: Vec<f64>,
    pub current_acceleration: Vec<f64>,
    pub target_position: Vec<f64>,
    pub target_velocity: Vec<f64>,
    pub target_acceleration: Vec<f64>,

    pub max_velocity: Vec<f64>,
    pub max_acceleration: Vec<f64>,
    pub max_jerk: Vec<f64>,
    /// Lower velocity bound; defaults to the negated maximum.
    pub min_velocity: Option<Vec<f64>>,
    /// Lower acceleration bound; defaults to the negated maximum.
    pub min_acceleration: Option<Vec<f64>>,

    pub enabled: Vec<bool>,
    pub minimum_duration: Option<f64>,

    /// Switches the generator to path-following mode.
    pub path: Option<Path>,

    dofs: usize,
}

impl InputParameter {
    pub fn new(dofs: usize) -> Self {
        Self {
            interface: Interface::default(),
            synchronization: Synchronization::default(),
            duration_discretization: DurationDiscretization::default(),
            current_position: vec![0.0; dofs],
            current_velocity: vec![0.0; dofs],
            current_acceleration: vec![0.0; dofs],
            target_position: vec![0.0; dofs],
            target_velocity: vec![0.0; dofs],
            target_acceleration: vec![0.0; dofs],
            max_velocity: vec![0.0; dofs],
            max_acceleration: vec![0.0; dofs],
            max_jerk: vec![0.0; dofs],
            min_velocity: None,
            min_acceleration: None,
            enabled: vec![true; dofs],
            minimum_duration: None,
            path: None,
            dofs,
        }
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.dofs
    }

    /// Effective lower velocity bound of a DoF.
    pub fn min_velocity_at(&self, dof: usize) -> f64 {
        self.min_velocity
            .as_ref()
            .map_or(-self.max_velocity[dof], |v| v[dof])
    }

    /// Effective lower acceleration bound of a DoF.
    pub fn min_acceleration_at(&self, dof: usize) -> f64 {
        self.min_acceleration
            .as_ref()
            .map_or(-self.max_acceleration[dof], |v| v[dof])
    }

    /// Checks the input against the invalid-input error category: sizes,
    /// finiteness, limit signs and target reachability.
    pub fn validate(&self) -> Result<(), OtgError> {
        let invalid = |reason: String| OtgError::InvalidInput {
            reason,
            input: format!("{}", self),
        };

        let vectors = [
            ("current_position", &self.current_position),
            ("current_velocity", &self.current_velocity),
            ("current_acceleration", &self.current_acceleration),
            ("target_position", &self.target_position),
            ("target_velocity", &self.target_velocity),
            ("target_acceleration", &self.target_acceleration),
            ("max_velocity", &self.max_velocity),
            ("max_acceleration", &self.max_acceleration),
            ("max_jerk", &self.max_jerk),
        ];
        for (name, vector) in vectors {
            if vector.len() != self.dofs {
                return Err(invalid(format!("{} has wrong size", name)));
            }
            if vector.iter().any(|value| !value.is_finite()) {
                return Err(invalid(format!("{} contains a non-finite value", name)));
            }
        }
        if self.enabled.len() != self.dofs {
            return Err(invalid("enabled has wrong size".to_string()));
        }
        for min in [&self.min_velocity, &self.min_acceleration].into_iter().flatten() {
            if min.len() != self.dofs {
                return Err(invalid("minimum limit vector has wrong size".to_string()));
            }
            if min.iter().any(|value| !value.is_finite()) {
                return Err(invalid(
                    "minimum limit vector contains a non-finite value".to_string(),
                ));
            }
        }

        for dof in 0..self.dofs {
            if !self.enabled[dof] {
                continue;
            }
            if self.max_acceleration[dof] <= 0.0 || self.max_jerk[dof] <= 0.0 {
                return Err(invalid(format!(
                    "max_acceleration and max_jerk of dof {} must be positive",
                    dof
                )));
            }
            if self.min_acceleration_at(dof) >= 0.0 {
                return Err(invalid(format!(
                    "min_acceleration of dof {} must be negative",
                    dof
                )));
            }
            if self.interface == Interface::Position {
                if self.max_velocity[dof] <= 0.0 {
                    return Err(invalid(format!(
                        "max_velocity of dof {} must be positive",
                        dof
                    )));
                }
                let v_min = self.min_velocity_at(dof);
                if v_min >= 0.0 {
                    return Err(invalid(format!(
                        "min_velocity of dof {} must be negative",
                        dof
                    )));
                }
                if self.target_velocity[dof] > self.max_velocity[dof]
                    || self.target_velocity[dof] < v_min
                {
                    return Err(invalid(format!(
                        "target_velocity of dof {} is outside its limits",
                        dof
                    )));
                }
            }
            if self.target_acceleration[dof] > self.max_acceleration[dof]
                || self.target_acceleration[dof] < self.min_acceleration_at(dof)
            {
                return Err(invalid(format!(
                    "target_acceleration of dof {} is outside its limits",
                    dof
                )));
            }
        }

        if let Some(duration) = self.minimum_duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(invalid("minimum_duration must be non-negative".to_string()));
            }
        }
        if let Some(path) = &self.path {
            if path.degrees_of_freedom() != self.dofs {
                return Err(invalid("path dimension does not match".to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for InputParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &[f64]| {
            values
                .iter()
                .map(|v| format!("{:.15}", v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f)?;
        writeln!(f, "inp.current_position = [{}]", join(&self.current_position))?;
        writeln!(f, "inp.current_velocity = [{}]", join(&self.current_velocity))?;
        writeln!(
            f,
            "inp.current_acceleration = [{}]",
            join(&self.current_acceleration)
        )?;
        writeln!(f, "inp.target_position = [{}]", join(&self.target_position))?;
        writeln!(f, "inp.target_velocity = [{}]", join(&self.target_velocity))?;
        writeln!(
            f,
            "inp.target_acceleration = [{}]",
            join(&self.target_acceleration)
        )?;
        writeln!(f, "inp.max_velocity = [{}]", join(&self.max_velocity))?;
        writeln!(f, "inp.max_acceleration = [{}]", join(&self.max_acceleration))?;
        writeln!(f, "inp.max_jerk = [{}]", join(&self.max_jerk))?;
        if let Some(min_velocity) = &self.min_velocity {
            writeln!(f, "inp.min_velocity = [{}]", join(min_velocity))?;
        }
        if let Some(min_acceleration) = &self.min_acceleration {
            writeln!(f, "inp.min_acceleration = [{}]", join(min_acceleration))?;
        }
        Ok(())
    }
}
