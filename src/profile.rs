//! Single-DoF motion profile: seven segments of constant jerk plus an
//! optional two-segment brake prelude.
//!
//! A [`Profile`] is an inert record of segment durations, jerks and cached
//! segment-start states. All operations are plain functions over that record,
//! so profiles are cheap to copy and reuse cycle-to-cycle.

/// Advances a kinematic state by `dt` under constant jerk `j`.
///
/// # Arguments
///
/// `dt` - time step
/// `p` - position at the start of the step
/// `v` - velocity at the start of the step
/// `a` - acceleration at the start of the step
/// `j` - constant jerk applied over the step
pub fn integrate(dt: f64, p: f64, v: f64, a: f64, j: f64) -> (f64, f64, f64) {
    (
        p + dt * (v + dt * (a / 2.0 + dt * j / 6.0)),
        v + dt * (a + dt * j / 2.0),
        a + dt * j,
    )
}

/// Minimum and maximum position reached over a profile.
#[derive(Debug, Copy, Clone, Default)]
pub struct PositionExtrema {
    pub min: f64,
    pub max: f64,
}

/// Seven-phase constant-jerk profile of a single degree of freedom.
///
/// Index `i` of `p`, `v`, `a` holds the state at the *start* of phase `i`;
/// `t_sum[i]` is the cumulative time at the *end* of phase `i`. The brake
/// prelude (up to two segments) runs before phase 0 and is not part of
/// `t_sum`.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub t: [f64; 7],
    pub t_sum: [f64; 7],
    pub j: [f64; 7],
    pub p: [f64; 7],
    pub v: [f64; 7],
    pub a: [f64; 7],

    /// Terminal state of the profile (at `t_sum[6]`).
    pub pf: f64,
    pub vf: f64,
    pub af: f64,

    pub t_brakes: [f64; 2],
    pub j_brakes: [f64; 2],
    pub p_brakes: [f64; 2],
    pub v_brakes: [f64; 2],
    pub a_brakes: [f64; 2],
    /// Total brake duration, `t_brakes[0] + t_brakes[1]`.
    pub t_brake: f64,
}

impl Profile {
    /// Sets the initial state of phase 0.
    pub fn set_start(&mut self, p0: f64, v0: f64, a0: f64) {
        self.p[0] = p0;
        self.v[0] = v0;
        self.a[0] = a0;
    }

    /// Recomputes `t_sum` and all cached phase-start states from `t`, `j`
    /// and the phase-0 state, then stores the integrated terminal state in
    /// `pf`, `vf`, `af`. Establishes the continuity invariant.
    pub fn update_phases(&mut self) {
        let mut sum = 0.0;
        for i in 0..7 {
            sum += self.t[i];
            self.t_sum[i] = sum;
        }
        for i in 0..6 {
            let (p, v, a) = integrate(self.t[i], self.p[i], self.v[i], self.a[i], self.j[i]);
            self.p[i + 1] = p;
            self.v[i + 1] = v;
            self.a[i + 1] = a;
        }
        let (p, v, a) = integrate(self.t[6], self.p[6], self.v[6], self.a[6], self.j[6]);
        self.pf = p;
        self.vf = v;
        self.af = a;
    }

    /// Total duration including the brake prelude.
    pub fn duration(&self) -> f64 {
        self.t_brake + self.t_sum[6]
    }

    /// State at time `t` within `[0, t_sum[6]]`, measured from the start of
    /// phase 0 (the brake prelude is handled by the trajectory). For
    /// `t >= t_sum[6]` the terminal phase is extended; callers that need
    /// constant-acceleration extrapolation do it themselves.
    pub fn state_at_time(&self, t: f64) -> (f64, f64, f64) {
        let i = self.t_sum.partition_point(|&ts| ts < t).min(6);
        let t_local = if i == 0 { t } else { t - self.t_sum[i - 1] };
        integrate(t_local, self.p[i], self.v[i], self.a[i], self.j[i])
    }

    /// Checks that all segment durations are non-negative and that velocity
    /// and acceleration stay within the given bounds over every phase,
    /// within tolerance `eps`. Extrema inside a phase sit where the
    /// respective derivative crosses zero.
    pub fn check_validity(
        &self,
        v_min: f64,
        v_max: f64,
        a_min: f64,
        a_max: f64,
        eps: f64,
    ) -> bool {
        for i in 0..7 {
            if self.t[i] < -eps {
                return false;
            }
        }
        let a_ok = |a: f64| a >= a_min - eps && a <= a_max + eps;
        let v_ok = |v: f64| v >= v_min - eps && v <= v_max + eps;
        for i in 0..7 {
            let (_, v_end, a_end) = integrate(self.t[i], self.p[i], self.v[i], self.a[i], self.j[i]);
            if !a_ok(self.a[i]) || !a_ok(a_end) || !v_ok(self.v[i]) || !v_ok(v_end) {
                return false;
            }
            // Velocity extremum inside the phase, where a(tau) = 0.
            if self.j[i].abs() > f64::EPSILON {
                let tau = -self.a[i] / self.j[i];
                if tau > 0.0 && tau < self.t[i] {
                    let (_, v_ext, _) = integrate(tau, self.p[i], self.v[i], self.a[i], self.j[i]);
                    if !v_ok(v_ext) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Minimum and maximum position over `[0, t_sum[6]]`, brake prelude
    /// included. Position extrema are at segment boundaries or where the
    /// velocity crosses zero inside a segment.
    pub fn get_position_extrema(&self) -> PositionExtrema {
        let mut ext = PositionExtrema {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        };

        let mut consider = |p: f64, v: f64, a: f64, j: f64, t: f64| {
            scan_segment(&mut ext, p, v, a, j, t);
        };

        for i in 0..2 {
            if self.t_brakes[i] > 0.0 {
                consider(
                    self.p_brakes[i],
                    self.v_brakes[i],
                    self.a_brakes[i],
                    self.j_brakes[i],
                    self.t_brakes[i],
                );
            }
        }
        for i in 0..7 {
            consider(self.p[i], self.v[i], self.a[i], self.j[i], self.t[i]);
        }
        consider(self.pf, self.vf, self.af, 0.0, 0.0);
        ext
    }
}

/// Scans one constant-jerk segment for position extrema: both endpoints and
/// any interior roots of `v(tau) = v + a tau + j tau^2 / 2 = 0`.
fn scan_segment(ext: &mut PositionExtrema, p: f64, v: f64, a: f64, j: f64, t: f64) {
    let mut take = |pos: f64| {
        if pos < ext.min {
            ext.min = pos;
        }
        if pos > ext.max {
            ext.max = pos;
        }
    };

    take(p);
    let (p_end, _, _) = integrate(t, p, v, a, j);
    take(p_end);

    let mut check_root = |tau: f64| {
        if tau > 0.0 && tau < t {
            let (p_ext, _, _) = integrate(tau, p, v, a, j);
            take(p_ext);
        }
    };

    if j.abs() > f64::EPSILON {
        let disc = a * a - 2.0 * j * v;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            check_root((-a + sq) / j);
            check_root((-a - sq) / j);
        }
    } else if a.abs() > f64::EPSILON {
        check_root(-v / a);
    }
}
