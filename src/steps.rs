//! Per-DoF profile solvers.
//!
//! Step 1 computes the time-optimal seven-phase profile between two
//! kinematic states and summarizes the feasible-duration structure in a
//! [`Block`]. Step 2 computes a profile of an exactly given duration, used
//! to synchronize the non-limiting DoFs.
//!
//! Every candidate profile is parametrized by its cruise velocity `vp`: the
//! first three phases bring `(v0, a0)` to `(vp, 0)`, phase 3 cruises, the
//! last three phases bring `(vp, 0)` to `(vf, af)`. Both halves are
//! closed-form bang-bang acceleration moves; the travelled distance as a
//! function of `vp` is piecewise monotone, so the remaining unknowns fall to
//! a bracketed bisection with a hard iteration cap.

use crate::block::{Block, Interval};
use crate::profile::{integrate, Profile};
use log::debug;

const EPS: f64 = 1e-12;
const T_EPS: f64 = 1e-9;
/// Hard cap for all bracketed searches.
const MAX_ITERATIONS: usize = 128;

/// Three-segment bang-bang acceleration move between two `(v, a)` states.
#[derive(Debug, Clone, Copy, Default)]
struct HalfMove {
    t: [f64; 3],
    j: [f64; 3],
    distance: f64,
}

/// Solves the move `(v1, a1) -> (v2, a2)` with full jerk and a possible
/// plateau at the acceleration bound. The acceleration either rises to a
/// peak and falls back, or falls to a trough and rises back, depending on
/// how the required velocity change compares against the direct ramp
/// `a1 -> a2`.
fn half_move(
    v1: f64,
    a1: f64,
    v2: f64,
    a2: f64,
    j_max: f64,
    a_min: f64,
    a_max: f64,
) -> Option<HalfMove> {
    let dv = v2 - v1;
    let dv_direct = (a2 - a1).abs() * (a1 + a2) / (2.0 * j_max);

    let (t, j) = if dv >= dv_direct {
        let sq = (j_max * dv + 0.5 * (a1 * a1 + a2 * a2)).max(0.0).sqrt();
        let floor = a1.max(a2);
        let mut peak = if -sq >= floor - EPS { -sq } else { sq };
        peak = peak.max(floor);
        let mut t_hold = 0.0;
        if peak > a_max {
            peak = a_max;
            let dv_hat = (2.0 * peak * peak - a1 * a1 - a2 * a2) / (2.0 * j_max);
            t_hold = (dv - dv_hat) / peak;
            if t_hold < -EPS {
                return None;
            }
        }
        (
            [(peak - a1) / j_max, t_hold.max(0.0), (peak - a2) / j_max],
            [j_max, 0.0, -j_max],
        )
    } else {
        let sq = (0.5 * (a1 * a1 + a2 * a2) - j_max * dv).max(0.0).sqrt();
        let ceil = a1.min(a2);
        let mut trough = if sq <= ceil + EPS { sq } else { -sq };
        trough = trough.min(ceil);
        let mut t_hold = 0.0;
        if trough < a_min {
            trough = a_min;
            let dv_hat = (a1 * a1 + a2 * a2 - 2.0 * trough * trough) / (2.0 * j_max);
            t_hold = (dv - dv_hat) / trough;
            if t_hold < -EPS {
                return None;
            }
        }
        (
            [(a1 - trough) / j_max, t_hold.max(0.0), (a2 - trough) / j_max],
            [-j_max, 0.0, j_max],
        )
    };

    if t.iter().any(|&ti| ti < -EPS) {
        return None;
    }
    let t = [t[0].max(0.0), t[1].max(0.0), t[2].max(0.0)];

    let mut v = v1;
    let mut a = a1;
    let mut distance = 0.0;
    for i in 0..3 {
        let (p, nv, na) = integrate(t[i], 0.0, v, a, j[i]);
        distance += p;
        v = nv;
        a = na;
    }
    Some(HalfMove { t, j, distance })
}

/// A fully assembled candidate profile with its cruise parameters.
#[derive(Debug, Clone)]
struct Candidate {
    duration: f64,
    profile: Profile,
}

/// Time-optimal seven-phase profile for the position interface.
#[derive(Debug, Clone, Copy)]
pub struct PositionStep1 {
    pub p0: f64,
    pub v0: f64,
    pub a0: f64,
    pub pf: f64,
    pub vf: f64,
    pub af: f64,
    pub v_max: f64,
    pub v_min: f64,
    pub a_max: f64,
    pub a_min: f64,
    pub j_max: f64,
}

impl PositionStep1 {
    fn halves(&self, vp: f64) -> Option<(HalfMove, HalfMove)> {
        let h1 = half_move(self.v0, self.a0, vp, 0.0, self.j_max, self.a_min, self.a_max)?;
        let h2 = half_move(vp, 0.0, self.vf, self.af, self.j_max, self.a_min, self.a_max)?;
        Some((h1, h2))
    }

    fn distance(&self, vp: f64) -> Option<f64> {
        let (h1, h2) = self.halves(vp)?;
        Some(h1.distance + h2.distance)
    }

    fn assemble(&self, vp: f64, t_cruise: f64, profile: &mut Profile) -> bool {
        let Some((h1, h2)) = self.halves(vp) else {
            return false;
        };
        profile.t = [
            h1.t[0],
            h1.t[1],
            h1.t[2],
            t_cruise.max(0.0),
            h2.t[0],
            h2.t[1],
            h2.t[2],
        ];
        profile.j = [h1.j[0], h1.j[1], h1.j[2], 0.0, h2.j[0], h2.j[1], h2.j[2]];
        profile.set_start(self.p0, self.v0, self.a0);
        profile.update_phases();
        profile.check_validity(self.v_min, self.v_max, self.a_min, self.a_max, 1e-8)
    }

    /// Breakpoints of the monotone pieces of `distance(vp)`. Between the
    /// "natural" velocities `w0` (reached by ramping `a0` straight to zero)
    /// and `wf` (required to ramp into `af`), the distance runs against the
    /// cruise direction, which folds a decreasing piece around `vp = 0`.
    fn pieces(&self) -> Vec<f64> {
        let w0 = self.v0 + self.a0 * self.a0.abs() / (2.0 * self.j_max);
        let wf = self.vf - self.af * self.af.abs() / (2.0 * self.j_max);
        let (m_lo, m_hi) = (w0.min(wf), w0.max(wf));

        let mut breaks = vec![self.v_min, self.v_max];
        if m_lo > 0.0 {
            breaks.push(0.0);
            breaks.push(m_lo.clamp(self.v_min, self.v_max));
        } else if m_hi < 0.0 {
            breaks.push(m_hi.clamp(self.v_min, self.v_max));
            breaks.push(0.0);
        }
        breaks.sort_by(f64::total_cmp);
        breaks.dedup_by(|a, b| (*a - *b).abs() < EPS);
        breaks
    }

    fn candidates(&self) -> Vec<Candidate> {
        let pd = self.pf - self.p0;
        let mut found: Vec<Candidate> = Vec::new();

        let mut push = |vp: f64, t_cruise: f64, list: &mut Vec<Candidate>| {
            let mut profile = Profile::default();
            if self.assemble(vp, t_cruise, &mut profile) {
                let duration = profile.t_sum[6];
                if !list
                    .iter()
                    .any(|c: &Candidate| (c.duration - duration).abs() < T_EPS)
                {
                    list.push(Candidate { duration, profile });
                }
            }
        };

        let breaks = self.pieces();
        for pair in breaks.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if hi - lo < EPS {
                continue;
            }
            let (Some(d_lo), Some(d_hi)) = (self.distance(lo), self.distance(hi)) else {
                continue;
            };
            if (pd - d_lo) * (pd - d_hi) > 0.0 {
                continue;
            }
            // Zero-cruise root of distance(vp) = pd on this piece.
            let increasing = d_hi >= d_lo;
            let (mut a, mut b) = (lo, hi);
            for _ in 0..MAX_ITERATIONS {
                let mid = 0.5 * (a + b);
                let Some(d) = self.distance(mid) else { break };
                if (d < pd) == increasing {
                    a = mid;
                } else {
                    b = mid;
                }
            }
            push(0.5 * (a + b), 0.0, &mut found);
        }

        // Cruise at the velocity bounds.
        if self.v_max > 0.0 {
            if let Some(d) = self.distance(self.v_max) {
                if d <= pd {
                    push(self.v_max, (pd - d) / self.v_max, &mut found);
                }
            }
        }
        if self.v_min < 0.0 {
            if let Some(d) = self.distance(self.v_min) {
                if d >= pd {
                    push(self.v_min, (pd - d) / self.v_min, &mut found);
                }
            }
        }

        found.sort_by(|x, y| x.duration.total_cmp(&y.duration));
        found
    }

    /// Computes the time-optimal profile and the block summary. Returns
    /// `false` when no candidate pattern is feasible.
    pub fn get_profile(&self, profile: &mut Profile, block: &mut Block) -> bool {
        let candidates = self.candidates();
        let Some(best) = candidates.first() else {
            // Already at the target state and nowhere to go.
            if (self.pf - self.p0).abs() < EPS
                && (self.vf - self.v0).abs() < EPS
                && (self.af - self.a0).abs() < EPS
            {
                profile.t = [0.0; 7];
                profile.j = [0.0; 7];
                profile.set_start(self.p0, self.v0, self.a0);
                profile.update_phases();
                block.t_min = 0.0;
                block.p_min = profile.clone();
                block.a = None;
                block.b = None;
                return true;
            }
            debug!("step 1: no feasible cruise velocity");
            return false;
        };

        *profile = best.profile.clone();
        block.t_min = best.duration;
        block.p_min = best.profile.clone();
        block.a = match candidates.len() {
            0 | 1 => None,
            2 => Some(Interval {
                left: candidates[0].duration,
                right: candidates[1].duration,
                profile: candidates[1].profile.clone(),
            }),
            _ => Some(Interval {
                left: candidates[1].duration,
                right: candidates[2].duration,
                profile: candidates[2].profile.clone(),
            }),
        };
        block.b = None;
        true
    }
}

/// Duration-constrained profile for the position interface.
#[derive(Debug, Clone, Copy)]
pub struct PositionStep2 {
    pub t_target: f64,
    pub p0: f64,
    pub v0: f64,
    pub a0: f64,
    pub pf: f64,
    pub vf: f64,
    pub af: f64,
    pub v_max: f64,
    pub v_min: f64,
    pub a_max: f64,
    pub a_min: f64,
    pub j_max: f64,
}

impl PositionStep2 {
    fn step1(&self) -> PositionStep1 {
        PositionStep1 {
            p0: self.p0,
            v0: self.v0,
            a0: self.a0,
            pf: self.pf,
            vf: self.vf,
            af: self.af,
            v_max: self.v_max,
            v_min: self.v_min,
            a_max: self.a_max,
            a_min: self.a_min,
            j_max: self.j_max,
        }
    }

    /// Duration of the cruise-parametrized profile at `vp`, or `None` when
    /// the cruise time would be negative.
    fn duration_at(&self, vp: f64) -> Option<f64> {
        let s1 = self.step1();
        let (h1, h2) = s1.halves(vp)?;
        let pd = self.pf - self.p0;
        let residual = pd - h1.distance - h2.distance;
        let t_cruise = if residual.abs() < EPS && vp.abs() < EPS {
            0.0
        } else {
            residual / vp
        };
        if !t_cruise.is_finite() || t_cruise < -T_EPS {
            return None;
        }
        let sum: f64 = h1.t.iter().chain(h2.t.iter()).sum();
        Some(sum + t_cruise.max(0.0))
    }

    /// Finds the seven-phase profile of exactly `t_target`. The feasible
    /// cruise velocities form up to two intervals whose boundaries are the
    /// zero-cruise roots, `vp = 0` and the velocity bounds; within each, a
    /// sign-change bisection on the duration closes the search.
    pub fn get_profile(&self, profile: &mut Profile) -> bool {
        let s1 = self.step1();
        let pd = self.pf - self.p0;

        // Boundary list: piece breakpoints, vp = 0 (where the cruise time
        // diverges and flips sign) and all zero-cruise roots.
        let mut bounds = s1.pieces();
        if self.v_min < 0.0 && self.v_max > 0.0 {
            bounds.push(0.0);
        }
        bounds.sort_by(f64::total_cmp);
        let breaks = s1.pieces();
        for pair in breaks.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let (Some(d_lo), Some(d_hi)) = (s1.distance(lo), s1.distance(hi)) else {
                continue;
            };
            if (pd - d_lo) * (pd - d_hi) > 0.0 {
                continue;
            }
            let increasing = d_hi >= d_lo;
            let (mut a, mut b) = (lo, hi);
            for _ in 0..MAX_ITERATIONS {
                let mid = 0.5 * (a + b);
                let Some(d) = s1.distance(mid) else { break };
                if (d < pd) == increasing {
                    a = mid;
                } else {
                    b = mid;
                }
            }
            bounds.push(0.5 * (a + b));
        }
        bounds.sort_by(f64::total_cmp);
        bounds.dedup_by(|a, b| (*a - *b).abs() < EPS);

        for pair in bounds.windows(2) {
            // Keep a hair away from the interval ends; at vp -> 0 the
            // cruise time diverges, which is exactly what lets long target
            // durations be matched.
            let lo = if pair[0].abs() < EPS { EPS } else { pair[0] };
            let hi = if pair[1].abs() < EPS { -EPS } else { pair[1] };
            if hi <= lo {
                continue;
            }
            let (Some(t_lo), Some(t_hi)) = (self.duration_at(lo), self.duration_at(hi)) else {
                continue;
            };
            if (self.t_target - t_lo) * (self.t_target - t_hi) > 0.0 {
                continue;
            }
            let increasing = t_hi >= t_lo;
            let (mut a, mut b) = (lo, hi);
            for _ in 0..MAX_ITERATIONS {
                let mid = 0.5 * (a + b);
                match self.duration_at(mid) {
                    Some(t) => {
                        if (t < self.t_target) == increasing {
                            a = mid;
                        } else {
                            b = mid;
                        }
                    }
                    None => break,
                }
            }
            let vp = 0.5 * (a + b);
            let Some((h1, h2)) = s1.halves(vp) else {
                continue;
            };
            let t_cruise = (pd - h1.distance - h2.distance) / vp;
            if !s1.assemble(vp, t_cruise.max(0.0), profile) {
                continue;
            }
            // Snap the cruise segment so the total duration is exact.
            let others: f64 = profile.t.iter().sum::<f64>() - profile.t[3];
            let snapped = self.t_target - others;
            if snapped < -T_EPS {
                continue;
            }
            profile.t[3] = snapped.max(0.0);
            profile.update_phases();
            if (profile.t_sum[6] - self.t_target).abs() > T_EPS {
                continue;
            }
            return true;
        }

        debug!("step 2: no profile of duration {}", self.t_target);
        false
    }
}

/// Time-optimal three-phase profile for the velocity interface.
#[derive(Debug, Clone, Copy)]
pub struct VelocityStep1 {
    pub p0: f64,
    pub v0: f64,
    pub a0: f64,
    pub vf: f64,
    pub af: f64,
    pub a_max: f64,
    pub a_min: f64,
    pub j_max: f64,
}

impl VelocityStep1 {
    pub fn get_profile(&self, profile: &mut Profile, block: &mut Block) -> bool {
        let Some(h) = half_move(
            self.v0, self.a0, self.vf, self.af, self.j_max, self.a_min, self.a_max,
        ) else {
            debug!("velocity step 1: no feasible acceleration move");
            return false;
        };
        profile.t = [h.t[0], h.t[1], h.t[2], 0.0, 0.0, 0.0, 0.0];
        profile.j = [h.j[0], h.j[1], h.j[2], 0.0, 0.0, 0.0, 0.0];
        profile.set_start(self.p0, self.v0, self.a0);
        profile.update_phases();

        block.t_min = profile.t_sum[6];
        block.p_min = profile.clone();
        block.a = None;
        block.b = None;
        true
    }
}

/// Duration-constrained profile for the velocity interface. The stretch
/// parameter is the acceleration peak: lowering it below the time-optimal
/// value lengthens the hold phase monotonically.
#[derive(Debug, Clone, Copy)]
pub struct VelocityStep2 {
    pub t_target: f64,
    pub p0: f64,
    pub v0: f64,
    pub a0: f64,
    pub vf: f64,
    pub af: f64,
    pub a_max: f64,
    pub a_min: f64,
    pub j_max: f64,
}

impl VelocityStep2 {
    /// Solves the rising case `dv >= dv_direct`; the falling case is the
    /// mirror image.
    fn stretch_up(
        t_target: f64,
        dv: f64,
        a0: f64,
        af: f64,
        j_max: f64,
        a_max: f64,
    ) -> Option<[f64; 3]> {
        let duration = |peak: f64| -> f64 {
            let dv_hat = (2.0 * peak * peak - a0 * a0 - af * af) / (2.0 * j_max);
            (2.0 * peak - a0 - af) / j_max + (dv - dv_hat) / peak
        };

        let sq = (j_max * dv + 0.5 * (a0 * a0 + af * af)).max(0.0).sqrt();
        let peak_opt = sq.min(a_max);
        let peak_floor = a0.max(af);
        if peak_opt < peak_floor - EPS {
            return None;
        }

        if t_target < duration(peak_opt.max(peak_floor)) - T_EPS {
            return None;
        }

        let lo = if peak_floor > 0.0 {
            if t_target > duration(peak_floor) + T_EPS {
                return None;
            }
            peak_floor
        } else {
            // The peak may approach zero, where the hold phase diverges.
            EPS
        };

        let (mut a, mut b) = (lo, peak_opt.max(lo));
        for _ in 0..MAX_ITERATIONS {
            let mid = 0.5 * (a + b);
            if duration(mid) > t_target {
                a = mid;
            } else {
                b = mid;
            }
        }
        let peak = 0.5 * (a + b);
        let dv_hat = (2.0 * peak * peak - a0 * a0 - af * af) / (2.0 * j_max);
        Some([
            (peak - a0) / j_max,
            ((dv - dv_hat) / peak).max(0.0),
            (peak - af) / j_max,
        ])
    }

    pub fn get_profile(&self, profile: &mut Profile) -> bool {
        let dv = self.vf - self.v0;
        let dv_direct = (self.af - self.a0).abs() * (self.a0 + self.af) / (2.0 * self.j_max);

        let (t, j) = if dv >= dv_direct {
            match Self::stretch_up(self.t_target, dv, self.a0, self.af, self.j_max, self.a_max) {
                Some(t) => (t, [self.j_max, 0.0, -self.j_max]),
                None => return false,
            }
        } else {
            match Self::stretch_up(
                self.t_target,
                -dv,
                -self.a0,
                -self.af,
                self.j_max,
                -self.a_min,
            ) {
                Some(t) => (t, [-self.j_max, 0.0, self.j_max]),
                None => return false,
            }
        };

        profile.t = [t[0], t[1], t[2], 0.0, 0.0, 0.0, 0.0];
        profile.j = [j[0], j[1], j[2], 0.0, 0.0, 0.0, 0.0];
        // Snap the hold phase so the total duration is exact.
        let others = t[0] + t[2];
        if self.t_target - others < -T_EPS {
            return false;
        }
        profile.t[1] = (self.t_target - others).max(0.0);
        profile.set_start(self.p0, self.v0, self.a0);
        profile.update_phases();
        true
    }
}
