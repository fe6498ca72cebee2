use thiserror::Error;

/// Result code of a trajectory calculation or update cycle.
///
/// The integer values are stable so that they can cross an FFI or IPC
/// boundary unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OtgResult {
    /// A trajectory is being followed.
    Working,
    /// The trajectory end was reached.
    Finished,
    /// Unspecified error.
    Error,
    ErrorInvalidInput,
    /// The calculated trajectory is longer than the duration ceiling.
    ErrorTrajectoryDuration,
    /// Step 1 found no feasible profile for some degree of freedom.
    ErrorExecutionTimeCalculation,
    /// Step 2 could not match the synchronized duration.
    ErrorSynchronizationCalculation,
}

impl OtgResult {
    /// Stable integer value of the result code.
    pub fn value(self) -> i32 {
        match self {
            OtgResult::Working => 0,
            OtgResult::Finished => 1,
            OtgResult::Error => -1,
            OtgResult::ErrorInvalidInput => -100,
            OtgResult::ErrorTrajectoryDuration => -101,
            OtgResult::ErrorExecutionTimeCalculation => -110,
            OtgResult::ErrorSynchronizationCalculation => -111,
        }
    }

    pub fn is_error(self) -> bool {
        self.value() < 0
    }
}

/// Failure of a trajectory calculation, carrying a snapshot of the offending
/// input. Returned by the strict (`*_strict`) entry points; the non-strict
/// ones only report the [`OtgResult`] code.
#[derive(Error, Debug)]
pub enum OtgError {
    #[error("invalid input: {reason}{input}")]
    InvalidInput { reason: String, input: String },

    #[error("no feasible profile in step 1, dof {dof}{input}")]
    ExecutionTimeCalculation { dof: usize, input: String },

    #[error("time synchronization failed for duration {duration}{input}")]
    SynchronizationCalculation { duration: f64, input: String },

    #[error("trajectory duration {duration} s exceeds the maximum of {maximum} s")]
    TrajectoryDuration { duration: f64, maximum: f64 },
}

impl OtgError {
    /// The result code this error maps to in non-strict mode.
    pub fn code(&self) -> OtgResult {
        match self {
            OtgError::InvalidInput { .. } => OtgResult::ErrorInvalidInput,
            OtgError::ExecutionTimeCalculation { .. } => OtgResult::ErrorExecutionTimeCalculation,
            OtgError::SynchronizationCalculation { .. } => {
                OtgResult::ErrorSynchronizationCalculation
            }
            OtgError::TrajectoryDuration { .. } => OtgResult::ErrorTrajectoryDuration,
        }
    }
}
