/*!
# otgen

**otgen** is an online trajectory generation library written for Rust - given,
at every control cycle, a current kinematic state and a target state on a
fixed number of degrees of freedom, the library calculates a time-optimal,
jerk-limited and time-synchronized trajectory within per-axis velocity,
acceleration and jerk limits, and evaluates it to produce the next reference
state.

## Features
* time-optimal seven-phase constant-jerk profiles per degree of freedom
* time synchronization across degrees of freedom, with optional
  discretization of the duration to the control cycle
* brake prelude that recovers from states outside the kinematic limits
* position and velocity control interfaces
* path following: waypoint lists compiled into linear segments with quartic
  corner blends, re-parametrized by a scalar arc-length profile

## Using **otgen**
Simply add the following to your `Cargo.toml` file:

```ignore
[dependencies]
otgen = "*"
```

and now you can generate and follow trajectories:

```
use otgen::{InputParameter, Otg, OtgResult, OutputParameter};

fn main() {
    let mut otg = Otg::new(3, 0.01);
    let mut input = InputParameter::new(3);
    let mut output = OutputParameter::new(3);

    input.current_position = vec![0.2, 0.0, -0.3];
    input.target_position = vec![1.0, -2.0, 0.5];
    input.max_velocity = vec![1.0, 2.0, 1.5];
    input.max_acceleration = vec![2.0, 2.0, 2.0];
    input.max_jerk = vec![4.0, 4.0, 4.0];

    // update once per control cycle, perhaps to drive a robot
    while otg.update(&input, &mut output) == OtgResult::Working {
        output.pass_to_input(&mut input);
    }

    println!("trajectory duration: {:.4} s", output.trajectory.duration());
}
```

## Derivation
The per-axis profiles are bang-bang jerk schedules: each candidate is
parametrized by its cruise velocity, the two bounding halves are solved in
closed form, and the remaining unknown falls to a bracketed bisection. See
the module documentation of [`steps`](crate::steps) for the details.

 */

pub mod block;
pub mod brake;
pub mod error;
pub mod input;
pub mod otg;
pub mod output;
pub mod path;
pub mod profile;
pub mod steps;
pub mod trajectory;

pub use block::{Block, Interval};
pub use error::{OtgError, OtgResult};
pub use input::{DurationDiscretization, InputParameter, Interface, Synchronization};
pub use otg::Otg;
pub use output::OutputParameter;
pub use path::{LinearSegment, Path, PathWaypoint, QuarticBlendSegment, Segment, WaypointReference};
pub use profile::{PositionExtrema, Profile};
pub use trajectory::{PathTrajectory, ProfileTrajectory, Trajectory, TrajectoryType};
