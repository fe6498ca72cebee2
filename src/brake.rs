//! Brake prelude: a short jerk-limited transient that brings a state back
//! inside the kinematic envelope before the main profile is solved.
//!
//! After the brake segments, the acceleration is within its bounds and the
//! velocity handed to step 1 satisfies `|v| <= v_max`, so the solvers never
//! see an infeasible start.

use crate::profile::integrate;

const T_EPS: f64 = 1e-12;

/// Velocity reached when the acceleration is ramped to zero with full jerk.
/// For `a > 0` this is the unavoidable overshoot peak, for `a < 0` the
/// undershoot trough.
pub(crate) fn stop_velocity(v: f64, a: f64, j_max: f64) -> f64 {
    v + a * a.abs() / (2.0 * j_max)
}

/// Computes the brake prelude for the position interface and writes up to
/// two `(duration, jerk)` segments. Zero-length segments mean the state is
/// already feasible.
pub fn get_position_brake_trajectory(
    v0: f64,
    a0: f64,
    v_max: f64,
    v_min: f64,
    a_max: f64,
    a_min: f64,
    j_max: f64,
    t_brakes: &mut [f64; 2],
    j_brakes: &mut [f64; 2],
) {
    *t_brakes = [0.0, 0.0];
    *j_brakes = [0.0, 0.0];
    if j_max <= 0.0 || a_max <= 0.0 || a_min >= 0.0 {
        return;
    }

    let over = a0 > a_max || v0 > v_max || stop_velocity(v0, a0, j_max) > v_max;
    let under = a0 < a_min || v0 < v_min || stop_velocity(v0, a0, j_max) < v_min;

    if over && a0 < a_min {
        // Crossed violations: the velocity is too high while the
        // acceleration is below its floor and already pulling the velocity
        // down hard. Restore the acceleration first, then recover the
        // velocity from wherever that leaves the state.
        restore_acceleration_then_velocity(
            v0, a0, v_max, v_min, a_max, a_min, j_max, t_brakes, j_brakes,
        );
    } else if under && a0 > a_max {
        // Mirrored crossed case.
        restore_acceleration_then_velocity(
            -v0, -a0, -v_min, -v_max, -a_min, -a_max, j_max, t_brakes, j_brakes,
        );
        j_brakes[0] = -j_brakes[0];
        j_brakes[1] = -j_brakes[1];
    } else if over {
        brake_direction(v0, a0, v_max, a_max, a_min, -j_max, t_brakes, j_brakes);
    } else if under {
        // Mirror the state, brake downwards, mirror back. The jerk signs
        // flip, the durations do not.
        brake_direction(-v0, -a0, -v_min, -a_min, -a_max, -j_max, t_brakes, j_brakes);
        j_brakes[0] = -j_brakes[0];
        j_brakes[1] = -j_brakes[1];
    }
}

/// Handles the crossed case `a0 < a_min` with the velocity at or above its
/// upper bound: the first segment ramps the acceleration back up to the
/// floor, the second recovers the velocity from the new state. While the
/// acceleration is restored the velocity keeps falling, so the remaining
/// violation can be on either side.
#[allow(clippy::too_many_arguments)]
fn restore_acceleration_then_velocity(
    v0: f64,
    a0: f64,
    v_max: f64,
    v_min: f64,
    a_max: f64,
    a_min: f64,
    j_max: f64,
    t_brakes: &mut [f64; 2],
    j_brakes: &mut [f64; 2],
) {
    let t1 = (a_min - a0) / j_max;
    if t1 <= T_EPS {
        return;
    }
    t_brakes[0] = t1;
    j_brakes[0] = j_max;
    let (_, v1, a1) = integrate(t1, 0.0, v0, a0, j_max);

    if v1 > v_max + T_EPS {
        // Still above the velocity bound: hold the floor until it is back.
        let t2 = (v_max - v1) / a1;
        if t2 > T_EPS {
            t_brakes[1] = t2;
            j_brakes[1] = 0.0;
        }
    } else if v1 < v_min || stop_velocity(v1, a1, j_max) < v_min - T_EPS {
        // The restoration overshot downwards: ramp the acceleration up
        // until the velocity comes back to v_min, capped at the ceiling.
        let disc = a1 * a1 - 2.0 * j_max * (v1 - v_min);
        if disc >= 0.0 {
            let t_velocity = (-a1 + disc.sqrt()) / j_max;
            let t_ceil = (a_max - a1) / j_max;
            let t2 = t_velocity.min(t_ceil);
            if t2 > T_EPS {
                t_brakes[1] = t2;
                j_brakes[1] = j_max;
            }
        }
    }
}

/// Brakes downwards with `j1 = -j_max` until the velocity returns to
/// `v_max` or the acceleration cap is restored (the mirrored call handles
/// the undershoot side). A second, constant-acceleration segment at the
/// floor finishes the velocity recovery when the jerk ramp alone cannot.
#[allow(clippy::too_many_arguments)]
fn brake_direction(
    v0: f64,
    a0: f64,
    v_max: f64,
    a_ceil: f64,
    a_floor: f64,
    j1: f64,
    t_brakes: &mut [f64; 2],
    j_brakes: &mut [f64; 2],
) {
    let j = -j1; // positive magnitude

    let mut candidates: [f64; 2] = [f64::INFINITY; 2];

    let velocity_unsafe = v0 > v_max || stop_velocity(v0, a0, j) > v_max;
    if velocity_unsafe {
        // Time until v(t) = v0 + a0 t - j t^2 / 2 comes back down to v_max.
        let disc = a0 * a0 + 2.0 * j * (v0 - v_max);
        if disc >= 0.0 {
            let t_velocity = (a0 + disc.sqrt()) / j;
            if t_velocity > 0.0 {
                candidates[0] = t_velocity;
            }
        }
    } else {
        // Only the acceleration cap is violated; stop ramping at the cap.
        let t_ceil = (a0 - a_ceil) / j;
        if t_ceil > 0.0 {
            candidates[0] = t_ceil;
        }
    }

    // Never ramp past the acceleration floor.
    let t_floor = (a0 - a_floor) / j;
    if t_floor > 0.0 {
        candidates[1] = t_floor;
    }

    let t1 = candidates[0].min(candidates[1]);
    if !t1.is_finite() || t1 <= T_EPS {
        return;
    }

    t_brakes[0] = t1;
    j_brakes[0] = j1;

    let (_, v1, a1) = integrate(t1, 0.0, v0, a0, j1);

    // Hold the acceleration floor until the velocity is back at v_max.
    if v1 > v_max + T_EPS && a1 < 0.0 {
        let t2 = (v_max - v1) / a1;
        if t2 > T_EPS {
            t_brakes[1] = t2;
            j_brakes[1] = 0.0;
        }
    }
}

/// Brake prelude for the velocity interface: only the acceleration bounds
/// matter, so a single full-jerk ramp back into `[a_min, a_max]` suffices.
pub fn get_velocity_brake_trajectory(
    a0: f64,
    a_max: f64,
    a_min: f64,
    j_max: f64,
    t_brakes: &mut [f64; 2],
    j_brakes: &mut [f64; 2],
) {
    *t_brakes = [0.0, 0.0];
    *j_brakes = [0.0, 0.0];
    if j_max <= 0.0 {
        return;
    }

    if a0 > a_max {
        t_brakes[0] = (a0 - a_max) / j_max;
        j_brakes[0] = -j_max;
    } else if a0 < a_min {
        t_brakes[0] = (a_min - a0) / j_max;
        j_brakes[0] = j_max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert::close;

    fn apply_brakes(v0: f64, a0: f64, t_brakes: &[f64; 2], j_brakes: &[f64; 2]) -> (f64, f64) {
        let mut v = v0;
        let mut a = a0;
        for i in 0..2 {
            if t_brakes[i] > 0.0 {
                let (_, nv, na) = integrate(t_brakes[i], 0.0, v, a, j_brakes[i]);
                v = nv;
                a = na;
            }
        }
        (v, a)
    }

    #[test]
    fn no_brake_inside_envelope() {
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(0.5, 0.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 0.0, 1e-12);
        close(t[1], 0.0, 1e-12);
    }

    #[test]
    fn brake_excess_velocity() {
        // v0 = 2 with v_max = 1: jerk down to the acceleration floor, then
        // hold it until the velocity is back at the bound.
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(2.0, 0.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 1.0, 1e-9);
        close(t[1], 0.5, 1e-9);
        let (v, a) = apply_brakes(2.0, 0.0, &t, &j);
        close(v, 1.0, 1e-9);
        close(a, -1.0, 1e-9);
        assert!(stop_velocity(v, a, 1.0) <= 1.0 + 1e-9);
    }

    #[test]
    fn brake_short_excess_without_floor_hold() {
        // A small excess is recovered by the jerk ramp alone.
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(1.1, 0.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        assert!(t[0] > 0.0);
        close(t[1], 0.0, 1e-12);
        let (v, a) = apply_brakes(1.1, 0.0, &t, &j);
        close(v, 1.0, 1e-9);
        assert!(a >= -1.0 - 1e-9);
    }

    #[test]
    fn brake_imminent_overshoot() {
        // v0 is inside the bound but the acceleration will carry it over:
        // the stop velocity 0.9 + 0.5 exceeds v_max = 1.
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(0.9, 1.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        assert!(t[0] > 0.0);
        let (v, a) = apply_brakes(0.9, 1.0, &t, &j);
        close(v, 1.0, 1e-9);
        assert!(stop_velocity(v, a, 1.0) <= 1.0 + 1e-9);
    }

    #[test]
    fn brake_excess_negative_velocity() {
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(-2.0, 0.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 1.0, 1e-9);
        close(t[1], 0.5, 1e-9);
        let (v, a) = apply_brakes(-2.0, 0.0, &t, &j);
        close(v, -1.0, 1e-9);
        close(a, 1.0, 1e-9);
    }

    #[test]
    fn brake_crossed_bound_violations() {
        // Velocity above its bound while the acceleration is below the
        // floor: the acceleration is restored first, and the velocity
        // recovered from the undershoot that causes.
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(3.0, -3.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 2.0, 1e-9);
        close(t[1], 2.0, 1e-9);
        let (v, a) = apply_brakes(3.0, -3.0, &t, &j);
        close(v, -1.0, 1e-9);
        close(a, 1.0, 1e-9);
        assert!(stop_velocity(v, a, 1.0).abs() <= 1.0 + 1e-9);
    }

    #[test]
    fn brake_crossed_bound_violations_mirrored() {
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(-3.0, 3.0, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 2.0, 1e-9);
        close(t[1], 2.0, 1e-9);
        let (v, a) = apply_brakes(-3.0, 3.0, &t, &j);
        close(v, 1.0, 1e-9);
        close(a, -1.0, 1e-9);
        assert!(stop_velocity(v, a, 1.0).abs() <= 1.0 + 1e-9);
    }

    #[test]
    fn brake_crossed_violation_still_over_after_restore() {
        // The acceleration restore is short, so the velocity is still over
        // its bound afterwards; a floor hold finishes the recovery.
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(3.0, -1.2, 1.0, -1.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 0.2, 1e-9);
        close(j[0], 1.0, 1e-12);
        close(j[1], 0.0, 1e-12);
        let (v, a) = apply_brakes(3.0, -1.2, &t, &j);
        close(v, 1.0, 1e-9);
        close(a, -1.0, 1e-9);
    }

    #[test]
    fn brake_excess_acceleration_only() {
        // Velocity is deeply inside the envelope; only the acceleration cap
        // is restored.
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_position_brake_trajectory(-3.0, 2.0, 5.0, -5.0, 1.0, -1.0, 1.0, &mut t, &mut j);
        close(t[0], 1.0, 1e-9);
        close(t[1], 0.0, 1e-12);
        let (_, a) = apply_brakes(-3.0, 2.0, &t, &j);
        close(a, 1.0, 1e-9);
    }

    #[test]
    fn velocity_brake_clamps_acceleration() {
        let mut t = [0.0; 2];
        let mut j = [0.0; 2];
        get_velocity_brake_trajectory(3.0, 1.0, -1.0, 2.0, &mut t, &mut j);
        close(t[0], 1.0, 1e-12);
        close(j[0], -2.0, 1e-12);
        let (_, a) = apply_brakes(0.0, 3.0, &t, &j);
        close(a, 1.0, 1e-12);
    }
}
