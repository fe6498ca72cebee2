//! Trajectory variants: the waypoint-mode [`ProfileTrajectory`] and the
//! path-following [`PathTrajectory`], plus the closed [`Trajectory`] sum of
//! the two.

use log::{info, warn};
use nalgebra::DVector;

use crate::block::Block;
use crate::brake;
use crate::error::OtgResult;
use crate::input::{DurationDiscretization, InputParameter, Interface, Synchronization};
use crate::path::Path;
use crate::profile::{integrate, PositionExtrema, Profile};
use crate::steps::{PositionStep1, PositionStep2, VelocityStep1, VelocityStep2};

const EPS: f64 = f64::EPSILON;
const BOUNDARY_EPS: f64 = 1e-10;
/// Hard ceiling on the trajectory duration, in seconds.
pub const MAX_DURATION: f64 = 7.6e3;

/// Which trajectory variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrajectoryType {
    #[default]
    Waypoint,
    Path,
}

/// State of a profile at `t` counted from the profile start. The brake
/// prelude runs first; past the profile end the state continues with
/// constant acceleration.
fn profile_state(p: &Profile, t: f64) -> (f64, f64, f64) {
    let mut t_diff = t;
    if p.t_brake > 0.0 {
        if t_diff < p.t_brake {
            let index = if t_diff < p.t_brakes[0] { 0 } else { 1 };
            if index > 0 {
                t_diff -= p.t_brakes[0];
            }
            return integrate(
                t_diff,
                p.p_brakes[index],
                p.v_brakes[index],
                p.a_brakes[index],
                p.j_brakes[index],
            );
        }
        t_diff -= p.t_brake;
    }
    if t_diff >= p.t_sum[6] {
        return integrate(t_diff - p.t_sum[6], p.pf, p.vf, p.af, 0.0);
    }
    p.state_at_time(t_diff)
}

/// The solvers rebuild profiles from scratch; the brake prelude fields are
/// owned by the trajectory and re-stamped afterwards.
fn copy_brake(src: &Profile, dst: &mut Profile) {
    dst.t_brakes = src.t_brakes;
    dst.j_brakes = src.j_brakes;
    dst.p_brakes = src.p_brakes;
    dst.v_brakes = src.v_brakes;
    dst.a_brakes = src.a_brakes;
    dst.t_brake = src.t_brake;
}

/// Waypoint-mode trajectory: one seven-phase profile per DoF, synchronized
/// to a common duration.
#[derive(Debug, Clone, Default)]
pub struct ProfileTrajectory {
    pub duration: f64,
    pub independent_min_durations: Vec<f64>,
    pub profiles: Vec<Profile>,
}

impl ProfileTrajectory {
    pub fn new(dofs: usize) -> Self {
        Self {
            duration: 0.0,
            independent_min_durations: vec![0.0; dofs],
            profiles: vec![Profile::default(); dofs],
        }
    }

    /// Runs the full per-cycle pipeline: brake, step 1, synchronization and
    /// step 2 for the non-limiting DoFs.
    pub fn calculate(
        &mut self,
        inp: &InputParameter,
        delta_time: f64,
        check_max_duration: bool,
    ) -> OtgResult {
        let dofs = inp.degrees_of_freedom();
        if self.profiles.len() != dofs {
            self.profiles = vec![Profile::default(); dofs];
            self.independent_min_durations = vec![0.0; dofs];
        }

        let mut blocks = vec![Block::default(); dofs];
        let mut p0s = vec![0.0; dofs];
        let mut v0s = vec![0.0; dofs];
        let mut a0s = vec![0.0; dofs];

        for dof in 0..dofs {
            let p = &mut self.profiles[dof];

            if !inp.enabled[dof] {
                // A disabled DoF continues from its current state.
                p.t = [0.0; 7];
                p.j = [0.0; 7];
                p.t_brakes = [0.0; 2];
                p.j_brakes = [0.0; 2];
                p.t_brake = 0.0;
                p.set_start(
                    inp.current_position[dof],
                    inp.current_velocity[dof],
                    inp.current_acceleration[dof],
                );
                p.update_phases();
                blocks[dof].t_min = 0.0;
                blocks[dof].p_min = p.clone();
                self.independent_min_durations[dof] = 0.0;
                continue;
            }

            let v_min = inp.min_velocity_at(dof);
            let a_min = inp.min_acceleration_at(dof);

            match inp.interface {
                Interface::Position => brake::get_position_brake_trajectory(
                    inp.current_velocity[dof],
                    inp.current_acceleration[dof],
                    inp.max_velocity[dof],
                    v_min,
                    inp.max_acceleration[dof],
                    a_min,
                    inp.max_jerk[dof],
                    &mut p.t_brakes,
                    &mut p.j_brakes,
                ),
                Interface::Velocity => brake::get_velocity_brake_trajectory(
                    inp.current_acceleration[dof],
                    inp.max_acceleration[dof],
                    a_min,
                    inp.max_jerk[dof],
                    &mut p.t_brakes,
                    &mut p.j_brakes,
                ),
            }
            p.t_brake = p.t_brakes[0] + p.t_brakes[1];

            let mut ps = inp.current_position[dof];
            let mut vs = inp.current_velocity[dof];
            let mut a_s = inp.current_acceleration[dof];
            for i in 0..2 {
                if p.t_brakes[i] > 0.0 {
                    p.p_brakes[i] = ps;
                    p.v_brakes[i] = vs;
                    p.a_brakes[i] = a_s;
                    let (np, nv, na) = integrate(p.t_brakes[i], ps, vs, a_s, p.j_brakes[i]);
                    ps = np;
                    vs = nv;
                    a_s = na;
                }
            }
            p0s[dof] = ps;
            v0s[dof] = vs;
            a0s[dof] = a_s;

            let brake_template = p.clone();
            let found = match inp.interface {
                Interface::Position => PositionStep1 {
                    p0: ps,
                    v0: vs,
                    a0: a_s,
                    pf: inp.target_position[dof],
                    vf: inp.target_velocity[dof],
                    af: inp.target_acceleration[dof],
                    v_max: inp.max_velocity[dof],
                    v_min,
                    a_max: inp.max_acceleration[dof],
                    a_min,
                    j_max: inp.max_jerk[dof],
                }
                .get_profile(p, &mut blocks[dof]),
                Interface::Velocity => VelocityStep1 {
                    p0: ps,
                    v0: vs,
                    a0: a_s,
                    vf: inp.target_velocity[dof],
                    af: inp.target_acceleration[dof],
                    a_max: inp.max_acceleration[dof],
                    a_min,
                    j_max: inp.max_jerk[dof],
                }
                .get_profile(p, &mut blocks[dof]),
            };
            if !found {
                warn!("no feasible profile in step 1 for dof {}", dof);
                return OtgResult::ErrorExecutionTimeCalculation;
            }

            copy_brake(&brake_template, p);
            let block = &mut blocks[dof];
            copy_brake(&brake_template, &mut block.p_min);
            for interval in block.a.iter_mut().chain(block.b.iter_mut()) {
                copy_brake(&brake_template, &mut interval.profile);
            }
            block.shift_brake(p.t_brake);
            self.independent_min_durations[dof] = block.t_min;
        }

        let mut t_sync = 0.0;
        let mut limiting_dof = None;
        let discrete = inp.duration_discretization == DurationDiscretization::Discrete;
        if !Block::synchronize(
            &blocks,
            inp.minimum_duration,
            &mut t_sync,
            &mut limiting_dof,
            &mut self.profiles,
            discrete,
            delta_time,
        ) {
            warn!("time synchronization found no common duration");
            return OtgResult::ErrorSynchronizationCalculation;
        }

        if check_max_duration && t_sync > MAX_DURATION {
            return OtgResult::ErrorTrajectoryDuration;
        }
        self.duration = t_sync;

        if t_sync > 0.0 && inp.synchronization != Synchronization::None {
            for dof in 0..dofs {
                if !inp.enabled[dof] || Some(dof) == limiting_dof {
                    continue;
                }
                let block = &blocks[dof];
                let p = &mut self.profiles[dof];
                let t_profile = t_sync - p.t_brake;

                if inp.synchronization == Synchronization::TimeIfNecessary
                    && inp.target_velocity[dof].abs() < EPS
                    && inp.target_acceleration[dof].abs() < EPS
                {
                    *p = block.p_min.clone();
                    continue;
                }

                // The synchronized duration may correspond to a profile
                // already calculated in step 1.
                if (t_sync - block.t_min).abs() < EPS {
                    *p = block.p_min.clone();
                    continue;
                } else if let Some(a) = block.a.as_ref().filter(|a| (t_sync - a.right).abs() < EPS)
                {
                    *p = a.profile.clone();
                    continue;
                } else if let Some(b) = block.b.as_ref().filter(|b| (t_sync - b.right).abs() < EPS)
                {
                    *p = b.profile.clone();
                    continue;
                }

                let found = match inp.interface {
                    Interface::Position => PositionStep2 {
                        t_target: t_profile,
                        p0: p0s[dof],
                        v0: v0s[dof],
                        a0: a0s[dof],
                        pf: inp.target_position[dof],
                        vf: inp.target_velocity[dof],
                        af: inp.target_acceleration[dof],
                        v_max: inp.max_velocity[dof],
                        v_min: inp.min_velocity_at(dof),
                        a_max: inp.max_acceleration[dof],
                        a_min: inp.min_acceleration_at(dof),
                        j_max: inp.max_jerk[dof],
                    }
                    .get_profile(p),
                    Interface::Velocity => VelocityStep2 {
                        t_target: t_profile,
                        p0: p0s[dof],
                        v0: v0s[dof],
                        a0: a0s[dof],
                        vf: inp.target_velocity[dof],
                        af: inp.target_acceleration[dof],
                        a_max: inp.max_acceleration[dof],
                        a_min: inp.min_acceleration_at(dof),
                        j_max: inp.max_jerk[dof],
                    }
                    .get_profile(p),
                };
                if !found {
                    warn!(
                        "step 2 failed for dof {} at synchronized duration {}",
                        dof, t_sync
                    );
                    return OtgResult::ErrorSynchronizationCalculation;
                }
            }
        } else if inp.synchronization == Synchronization::None {
            for dof in 0..dofs {
                if !inp.enabled[dof] || Some(dof) == limiting_dof {
                    continue;
                }
                self.profiles[dof] = blocks[dof].p_min.clone();
            }
        }

        info!(
            "calculated waypoint trajectory over {} DoFs, duration {:.6} s",
            dofs, self.duration
        );
        OtgResult::Working
    }

    /// Kinematic state of every DoF at `time`. Past a profile's own end (and
    /// past the synchronized duration) the state continues with constant
    /// acceleration.
    pub fn at_time(
        &self,
        time: f64,
        new_position: &mut [f64],
        new_velocity: &mut [f64],
        new_acceleration: &mut [f64],
    ) {
        for (dof, p) in self.profiles.iter().enumerate() {
            let (pos, vel, acc) = profile_state(p, time);
            new_position[dof] = pos;
            new_velocity[dof] = vel;
            new_acceleration[dof] = acc;
        }
    }

    pub fn get_position_extrema(&self) -> Vec<PositionExtrema> {
        self.profiles
            .iter()
            .map(|p| p.get_position_extrema())
            .collect()
    }
}

/// Path-following trajectory: a geometric [`Path`] re-parametrized in time
/// through a scalar arc-length profile.
#[derive(Debug, Clone)]
pub struct PathTrajectory {
    pub duration: f64,
    pub independent_min_durations: Vec<f64>,
    pub path: Path,

    main_profile: Profile,
    s0: f64,
    ds0: f64,
    dds0: f64,
    sf: f64,
    dsf: f64,
    ddsf: f64,

    v0: DVector<f64>,
    a0: DVector<f64>,
    pf: DVector<f64>,
    vf: DVector<f64>,
    af: DVector<f64>,
}

impl PathTrajectory {
    pub fn new(path: Path, v0: &[f64], a0: &[f64], vf: &[f64], af: &[f64]) -> Self {
        let dofs = path.degrees_of_freedom();
        let pf = path.q(path.length);
        Self {
            duration: 0.0,
            independent_min_durations: vec![0.0; dofs],
            s0: 0.0,
            sf: path.length,
            ds0: 0.0,
            dds0: 0.0,
            dsf: 0.0,
            ddsf: 0.0,
            v0: DVector::from_column_slice(v0),
            a0: DVector::from_column_slice(a0),
            pf,
            vf: DVector::from_column_slice(vf),
            af: DVector::from_column_slice(af),
            main_profile: Profile::default(),
            path,
        }
    }

    /// Derives the arc-length boundary derivatives from the Cartesian
    /// boundary values and checks cross-axis consistency. The oracle axis is
    /// the one with the largest tangent component at each end.
    pub fn validate_boundary(&mut self) -> bool {
        let pdq0 = self.path.pdq(self.s0);
        let pddq0 = self.path.pddq(self.s0);
        let pdqf = self.path.pdq(self.sf);
        let pddqf = self.path.pddq(self.sf);

        let argmax = |v: &DVector<f64>| {
            (0..v.len()).fold(0, |best, i| if v[i].abs() > v[best].abs() { i } else { best })
        };
        let ax0 = argmax(&pdq0);
        let axf = argmax(&pdqf);
        if pdq0[ax0].abs() < BOUNDARY_EPS || pdqf[axf].abs() < BOUNDARY_EPS {
            return false;
        }

        self.ds0 = self.v0[ax0] / pdq0[ax0];
        self.dds0 = (self.a0[ax0] - pddq0[ax0] * self.ds0 * self.ds0) / pdq0[ax0];
        self.dsf = self.vf[axf] / pdqf[axf];
        self.ddsf = (self.af[axf] - pddqf[axf] * self.dsf * self.dsf) / pdqf[axf];

        for dof in 0..self.path.degrees_of_freedom() {
            let v0_dof = pdq0[dof] * self.ds0;
            let a0_dof = pddq0[dof] * self.ds0 * self.ds0 + pdq0[dof] * self.dds0;
            let vf_dof = pdqf[dof] * self.dsf;
            let af_dof = pddqf[dof] * self.dsf * self.dsf + pdqf[dof] * self.ddsf;
            if (self.v0[dof] - v0_dof).abs() > BOUNDARY_EPS
                || (self.a0[dof] - a0_dof).abs() > BOUNDARY_EPS
                || (self.vf[dof] - vf_dof).abs() > BOUNDARY_EPS
                || (self.af[dof] - af_dof).abs() > BOUNDARY_EPS
            {
                return false;
            }
        }
        true
    }

    /// Largest per-axis tangent magnitude along the path, sampled per
    /// segment. Scales the Cartesian limits down to arc-length limits.
    fn axis_scales(&self) -> DVector<f64> {
        const SAMPLES: usize = 16;
        let dofs = self.path.degrees_of_freedom();
        let mut kappa = DVector::zeros(dofs);
        for (i, segment) in self.path.segments.iter().enumerate() {
            let s_start = self.path.cumulative_lengths[i];
            for k in 0..=SAMPLES {
                let s = s_start + segment.length() * (k as f64) / (SAMPLES as f64);
                let pdq = self.path.pdq(s.min(self.path.length));
                for dof in 0..dofs {
                    if pdq[dof].abs() > kappa[dof] {
                        kappa[dof] = pdq[dof].abs();
                    }
                }
            }
        }
        kappa
    }

    /// Builds the scalar arc-length profile under the induced limits.
    pub fn calculate(
        &mut self,
        inp: &InputParameter,
        _delta_time: f64,
        check_max_duration: bool,
    ) -> OtgResult {
        if !self.validate_boundary() {
            warn!("path boundary values are inconsistent with the path tangent");
            return OtgResult::ErrorInvalidInput;
        }

        let kappa = self.axis_scales();
        let mut ds_max = f64::INFINITY;
        let mut dds_max = f64::INFINITY;
        let mut ddds_max = f64::INFINITY;
        for dof in 0..self.path.degrees_of_freedom() {
            if kappa[dof] > BOUNDARY_EPS {
                ds_max = ds_max.min(inp.max_velocity[dof] / kappa[dof]);
                dds_max = dds_max.min(inp.max_acceleration[dof] / kappa[dof]);
                ddds_max = ddds_max.min(inp.max_jerk[dof] / kappa[dof]);
            }
        }
        if !ds_max.is_finite() || !dds_max.is_finite() || !ddds_max.is_finite() {
            return OtgResult::ErrorInvalidInput;
        }

        let p = &mut self.main_profile;
        brake::get_position_brake_trajectory(
            self.ds0,
            self.dds0,
            ds_max,
            -ds_max,
            dds_max,
            -dds_max,
            ddds_max,
            &mut p.t_brakes,
            &mut p.j_brakes,
        );
        p.t_brake = p.t_brakes[0] + p.t_brakes[1];
        let mut ss = self.s0;
        let mut dss = self.ds0;
        let mut ddss = self.dds0;
        for i in 0..2 {
            if p.t_brakes[i] > 0.0 {
                p.p_brakes[i] = ss;
                p.v_brakes[i] = dss;
                p.a_brakes[i] = ddss;
                let (ns, ndv, nda) = integrate(p.t_brakes[i], ss, dss, ddss, p.j_brakes[i]);
                ss = ns;
                dss = ndv;
                ddss = nda;
            }
        }

        let brake_template = p.clone();
        let step1 = PositionStep1 {
            p0: ss,
            v0: dss,
            a0: ddss,
            pf: self.sf,
            vf: self.dsf,
            af: self.ddsf,
            v_max: ds_max,
            v_min: -ds_max,
            a_max: dds_max,
            a_min: -dds_max,
            j_max: ddds_max,
        };
        let mut block = Block::default();
        if !step1.get_profile(p, &mut block) {
            warn!("no feasible arc-length profile for the path");
            return OtgResult::ErrorExecutionTimeCalculation;
        }
        copy_brake(&brake_template, p);
        let mut duration = p.t_brake + p.t_sum[6];

        // An optional user minimum stretches the scalar profile.
        if let Some(minimum) = inp.minimum_duration {
            if minimum > duration {
                let step2 = PositionStep2 {
                    t_target: minimum - p.t_brake,
                    ..step1_to_step2(&step1)
                };
                if !step2.get_profile(p) {
                    warn!("could not stretch the path trajectory to {}", minimum);
                    return OtgResult::ErrorSynchronizationCalculation;
                }
                copy_brake(&brake_template, p);
                duration = p.t_brake + p.t_sum[6];
            }
        }

        if check_max_duration && duration > MAX_DURATION {
            return OtgResult::ErrorTrajectoryDuration;
        }

        self.duration = duration;
        for d in self.independent_min_durations.iter_mut() {
            *d = duration;
        }
        info!("calculated path trajectory, duration {:.6} s", duration);
        OtgResult::Working
    }

    /// Maps `time` to the arc-length state `(s, ds, dds)`.
    fn time_parametrization(&self, time: f64) -> (f64, f64, f64) {
        profile_state(&self.main_profile, time)
    }

    pub fn at_time(
        &self,
        time: f64,
        new_position: &mut [f64],
        new_velocity: &mut [f64],
        new_acceleration: &mut [f64],
    ) {
        if time > self.duration {
            // Keep constant acceleration from the final state.
            for dof in 0..self.path.degrees_of_freedom() {
                let (pos, vel, acc) = integrate(
                    time - self.duration,
                    self.pf[dof],
                    self.vf[dof],
                    self.af[dof],
                    0.0,
                );
                new_position[dof] = pos;
                new_velocity[dof] = vel;
                new_acceleration[dof] = acc;
            }
            return;
        }

        let (s, ds, dds) = self.time_parametrization(time);
        let q = self.path.q(s);
        let dq = self.path.dq(s, ds);
        let ddq = self.path.ddq(s, ds, dds);
        for dof in 0..self.path.degrees_of_freedom() {
            new_position[dof] = q[dof];
            new_velocity[dof] = dq[dof];
            new_acceleration[dof] = ddq[dof];
        }
    }

    /// Per-axis position extrema, sampled over the arc-length range covered
    /// by the scalar profile.
    pub fn get_position_extrema(&self) -> Vec<PositionExtrema> {
        const SAMPLES: usize = 64;
        let s_ext = self.main_profile.get_position_extrema();
        let dofs = self.path.degrees_of_freedom();
        let mut result = vec![
            PositionExtrema {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            };
            dofs
        ];
        for k in 0..=SAMPLES {
            let s = s_ext.min + (s_ext.max - s_ext.min) * (k as f64) / (SAMPLES as f64);
            let q = self.path.q(s);
            for dof in 0..dofs {
                if q[dof] < result[dof].min {
                    result[dof].min = q[dof];
                }
                if q[dof] > result[dof].max {
                    result[dof].max = q[dof];
                }
            }
        }
        result
    }
}

fn step1_to_step2(s: &PositionStep1) -> PositionStep2 {
    PositionStep2 {
        t_target: 0.0,
        p0: s.p0,
        v0: s.v0,
        a0: s.a0,
        pf: s.pf,
        vf: s.vf,
        af: s.af,
        v_max: s.v_max,
        v_min: s.v_min,
        a_max: s.a_max,
        a_min: s.a_min,
        j_max: s.j_max,
    }
}

/// A calculated trajectory: a closed sum of the waypoint and path variants.
#[derive(Debug, Clone)]
pub enum Trajectory {
    Profiles(ProfileTrajectory),
    Path(Box<PathTrajectory>),
}

impl Default for Trajectory {
    fn default() -> Self {
        Trajectory::Profiles(ProfileTrajectory::default())
    }
}

impl Trajectory {
    /// Duration of the synchronized trajectory.
    pub fn duration(&self) -> f64 {
        match self {
            Trajectory::Profiles(t) => t.duration,
            Trajectory::Path(t) => t.duration,
        }
    }

    /// Minimum duration of each independent DoF.
    pub fn independent_min_durations(&self) -> &[f64] {
        match self {
            Trajectory::Profiles(t) => &t.independent_min_durations,
            Trajectory::Path(t) => &t.independent_min_durations,
        }
    }

    pub fn kind(&self) -> TrajectoryType {
        match self {
            Trajectory::Profiles(_) => TrajectoryType::Waypoint,
            Trajectory::Path(_) => TrajectoryType::Path,
        }
    }

    /// Kinematic state at `time`, written into the output slices.
    pub fn at_time(
        &self,
        time: f64,
        new_position: &mut [f64],
        new_velocity: &mut [f64],
        new_acceleration: &mut [f64],
    ) {
        match self {
            Trajectory::Profiles(t) => t.at_time(time, new_position, new_velocity, new_acceleration),
            Trajectory::Path(t) => t.at_time(time, new_position, new_velocity, new_acceleration),
        }
    }

    /// Min/max position of each DoF over the whole trajectory.
    pub fn get_position_extrema(&self) -> Vec<PositionExtrema> {
        match self {
            Trajectory::Profiles(t) => t.get_position_extrema(),
            Trajectory::Path(t) => t.get_position_extrema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathWaypoint;
    use assert::close;

    fn position_input(dofs: usize) -> InputParameter {
        let mut input = InputParameter::new(dofs);
        input.max_velocity = vec![1.0; dofs];
        input.max_acceleration = vec![1.0; dofs];
        input.max_jerk = vec![1.0; dofs];
        input
    }

    fn sample(traj: &ProfileTrajectory, t: f64, dofs: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut p = vec![0.0; dofs];
        let mut v = vec![0.0; dofs];
        let mut a = vec![0.0; dofs];
        traj.at_time(t, &mut p, &mut v, &mut a);
        (p, v, a)
    }

    #[test]
    fn rest_to_rest_scenario() {
        // S1: unit limits, distance 1.
        let mut input = position_input(1);
        input.target_position = vec![1.0];
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));
        close(traj.duration, 3.1748, 1e-3);

        // Boundary conditions and pointwise bounds.
        let (p, v, a) = sample(&traj, 0.0, 1);
        close(p[0], 0.0, 1e-9);
        close(v[0], 0.0, 1e-9);
        close(a[0], 0.0, 1e-9);
        let (p, v, a) = sample(&traj, traj.duration, 1);
        close(p[0], 1.0, 1e-8);
        close(v[0], 0.0, 1e-8);
        close(a[0], 0.0, 1e-8);
        let steps = 200;
        for k in 0..=steps {
            let t = traj.duration * (k as f64) / (steps as f64);
            let (_, v, a) = sample(&traj, t, 1);
            assert!(v[0].abs() <= 1.0 + 1e-8);
            assert!(a[0].abs() <= 1.0 + 1e-8);
        }
    }

    #[test]
    fn continuity_over_whole_trajectory() {
        let mut input = position_input(1);
        input.current_velocity = vec![0.3];
        input.target_position = vec![2.0];
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        // Finite-difference continuity of p and v, piecewise-linear a.
        let h = 1e-6;
        let steps = 500;
        for k in 1..steps {
            let t = traj.duration * (k as f64) / (steps as f64);
            let (p0, v0, a0) = sample(&traj, t - h, 1);
            let (p1, v1, a1) = sample(&traj, t + h, 1);
            assert!((p1[0] - p0[0]).abs() < 1e-5);
            assert!((v1[0] - v0[0]).abs() < 1e-5);
            assert!((a1[0] - a0[0]).abs() < 1e-5);
        }
    }

    #[test]
    fn moving_start_hits_velocity_plateau() {
        // S2: the profile must saturate v_max = 1.
        let mut input = position_input(1);
        input.current_velocity = vec![0.8];
        input.target_position = vec![5.0];
        input.max_acceleration = vec![2.0];
        input.max_jerk = vec![5.0];
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        let p = &traj.profiles[0];
        assert!(p.t[3] > 0.0);
        close(p.v[3], 1.0, 1e-9);
        let (pos, vel, acc) = sample(&traj, traj.duration, 1);
        close(pos[0], 5.0, 1e-8);
        close(vel[0], 0.0, 1e-8);
        close(acc[0], 0.0, 1e-8);
    }

    #[test]
    fn two_dof_time_synchronization() {
        // S3: axis 0 is limiting; axis 1 is stretched to the common
        // duration under Time synchronization.
        let mut input = position_input(2);
        input.target_position = vec![1.0, 0.1];
        let mut traj = ProfileTrajectory::new(2);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        assert!(traj.independent_min_durations[0] > traj.independent_min_durations[1]);
        close(traj.duration, traj.independent_min_durations[0], 1e-9);

        let (p, v, a) = sample(&traj, traj.duration, 2);
        for dof in 0..2 {
            close(p[dof], input.target_position[dof], 1e-7);
            close(v[dof], 0.0, 1e-7);
            close(a[dof], 0.0, 1e-7);
        }

        // Under no synchronization, axis 1 finishes early.
        input.synchronization = Synchronization::None;
        let mut traj_none = ProfileTrajectory::new(2);
        assert_eq!(OtgResult::Working, traj_none.calculate(&input, 0.01, true));
        let t_axis1 = traj_none.independent_min_durations[1];
        assert!(t_axis1 < traj_none.duration);
        let (p, v, _) = sample(&traj_none, t_axis1, 2);
        close(p[1], 0.1, 1e-7);
        close(v[1], 0.0, 1e-7);
    }

    #[test]
    fn discrete_duration_is_cycle_multiple() {
        // S4: Discrete discretization rounds the duration up to a cycle.
        let mut input = position_input(1);
        input.target_position = vec![1.0];
        input.duration_discretization = DurationDiscretization::Discrete;
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        let cycles = traj.duration / 0.01;
        close(cycles, cycles.round(), 1e-6);
        assert!(traj.duration >= 3.1748 - 1e-3);

        // The target is still reached exactly at the rounded duration.
        let (p, v, a) = sample(&traj, traj.duration, 1);
        close(p[0], 1.0, 1e-7);
        close(v[0], 0.0, 1e-7);
        close(a[0], 0.0, 1e-7);
    }

    #[test]
    fn brake_scenario_recovers_from_excess_velocity() {
        // S5: the current velocity exceeds v_max; a brake prelude must
        // bring it back before the main profile starts.
        let mut input = position_input(1);
        input.current_velocity = vec![2.0];
        input.target_position = vec![2.0];
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        let p = &traj.profiles[0];
        assert!(p.t_brake > 0.0);

        // After the brake the velocity is inside the envelope and stays
        // there; the target is reached exactly.
        let steps = 400;
        for k in 0..=steps {
            let t = traj.duration * (k as f64) / (steps as f64);
            let (_, v, _) = sample(&traj, t, 1);
            if t >= p.t_brake {
                assert!(v[0].abs() <= 1.0 + 1e-8, "v = {} at t = {}", v[0], t);
            }
        }
        let (pos, vel, acc) = sample(&traj, traj.duration, 1);
        close(pos[0], 2.0, 1e-7);
        close(vel[0], 0.0, 1e-7);
        close(acc[0], 0.0, 1e-7);
    }

    #[test]
    fn extrapolation_past_duration() {
        let mut input = position_input(1);
        input.target_position = vec![1.0];
        input.target_velocity = vec![0.5];
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        let (p_end, v_end, a_end) = sample(&traj, traj.duration, 1);
        let dt = 0.3;
        let (p, v, a) = sample(&traj, traj.duration + dt, 1);
        close(a[0], a_end[0], 1e-9);
        close(v[0], v_end[0] + a_end[0] * dt, 1e-9);
        close(p[0], p_end[0] + v_end[0] * dt + 0.5 * a_end[0] * dt * dt, 1e-8);
    }

    #[test]
    fn disabled_dof_keeps_state() {
        let mut input = position_input(2);
        input.target_position = vec![1.0, 9.0];
        input.enabled[1] = false;
        input.current_position[1] = 0.5;
        let mut traj = ProfileTrajectory::new(2);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));
        let (p, v, _) = sample(&traj, traj.duration * 0.5, 2);
        close(p[1], 0.5, 1e-12);
        close(v[1], 0.0, 1e-12);
    }

    #[test]
    fn velocity_interface_reaches_target_velocity() {
        let mut input = position_input(1);
        input.interface = Interface::Velocity;
        input.target_velocity = vec![0.8];
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));
        let (_, v, a) = sample(&traj, traj.duration, 1);
        close(v[0], 0.8, 1e-8);
        close(a[0], 0.0, 1e-8);
    }

    #[test]
    fn minimum_duration_stretches_all_dofs() {
        let mut input = position_input(1);
        input.target_position = vec![1.0];
        input.minimum_duration = Some(6.0);
        let mut traj = ProfileTrajectory::new(1);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));
        close(traj.duration, 6.0, 1e-9);
        let (p, v, a) = sample(&traj, 6.0, 1);
        close(p[0], 1.0, 1e-7);
        close(v[0], 0.0, 1e-7);
        close(a[0], 0.0, 1e-7);
    }

    fn straight_path() -> Path {
        let start = DVector::from_vec(vec![0.0, 0.0]);
        let waypoints = vec![PathWaypoint::absolute(DVector::from_vec(vec![1.0, 0.0]))];
        Path::new(start, &waypoints, 0.0).unwrap()
    }

    #[test]
    fn path_trajectory_straight_line() {
        let input = position_input(2);
        let path = straight_path();
        let zeros = [0.0, 0.0];
        let mut traj = PathTrajectory::new(path, &zeros, &zeros, &zeros, &zeros);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));
        close(traj.duration, 3.1748, 1e-3);

        let mut p = [0.0; 2];
        let mut v = [0.0; 2];
        let mut a = [0.0; 2];
        traj.at_time(traj.duration, &mut p, &mut v, &mut a);
        close(p[0], 1.0, 1e-7);
        close(p[1], 0.0, 1e-9);
        close(v[0], 0.0, 1e-7);

        // Chain rule: velocity norm equals |ds| times the tangent norm.
        traj.at_time(traj.duration / 2.0, &mut p, &mut v, &mut a);
        let (_, ds, _) = traj.time_parametrization(traj.duration / 2.0);
        let vel = DVector::from_column_slice(&v);
        close(vel.norm(), ds.abs(), 1e-10);
    }

    #[test]
    fn path_trajectory_blended_corner() {
        let input = position_input(2);
        let start = DVector::from_vec(vec![0.0, 0.0]);
        let waypoints = vec![
            PathWaypoint::absolute(DVector::from_vec(vec![1.0, 0.0])),
            PathWaypoint::absolute(DVector::from_vec(vec![1.0, 1.0])),
        ];
        let path = Path::new(start, &waypoints, 0.2).unwrap();
        let zeros = [0.0, 0.0];
        let mut traj = PathTrajectory::new(path, &zeros, &zeros, &zeros, &zeros);
        assert_eq!(OtgResult::Working, traj.calculate(&input, 0.01, true));

        let mut p = [0.0; 2];
        let mut v = [0.0; 2];
        let mut a = [0.0; 2];
        traj.at_time(0.0, &mut p, &mut v, &mut a);
        close(p[0], 0.0, 1e-9);
        close(p[1], 0.0, 1e-9);
        traj.at_time(traj.duration, &mut p, &mut v, &mut a);
        close(p[0], 1.0, 1e-7);
        close(p[1], 1.0, 1e-7);

        // Past the end the state continues with constant (zero)
        // acceleration and zero velocity: it stays at the corner exit.
        traj.at_time(traj.duration + 1.0, &mut p, &mut v, &mut a);
        close(p[0], 1.0, 1e-7);
        close(p[1], 1.0, 1e-7);
    }

    #[test]
    fn path_trajectory_rejects_inconsistent_boundary() {
        let input = position_input(2);
        let path = straight_path();
        let zeros = [0.0, 0.0];
        let sideways = [0.0, 0.5]; // velocity orthogonal to the path
        let mut traj = PathTrajectory::new(path, &sideways, &zeros, &zeros, &zeros);
        assert_eq!(
            OtgResult::ErrorInvalidInput,
            traj.calculate(&input, 0.01, true)
        );
    }

    #[test]
    fn trajectory_enum_dispatch() {
        let mut input = position_input(1);
        input.target_position = vec![1.0];
        let mut profile_traj = ProfileTrajectory::new(1);
        assert_eq!(
            OtgResult::Working,
            profile_traj.calculate(&input, 0.01, true)
        );
        let traj = Trajectory::Profiles(profile_traj);
        assert_eq!(TrajectoryType::Waypoint, traj.kind());
        assert!(traj.duration() > 0.0);
        let ext = traj.get_position_extrema();
        close(ext[0].min, 0.0, 1e-9);
        close(ext[0].max, 1.0, 1e-7);
    }
}
