//! Piecewise parametric path: linear segments joined by quartic blends,
//! indexed by cumulative arc length for O(log n) lookups.

use nalgebra::DVector;

use crate::error::OtgError;

/// How a waypoint vector is interpreted during path construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointReference {
    Absolute,
    /// Offset from the previous (resolved) waypoint.
    Relative,
}

/// A path waypoint with an optional per-junction blend distance override.
#[derive(Debug, Clone, PartialEq)]
pub struct PathWaypoint {
    pub vector: DVector<f64>,
    pub reference: WaypointReference,
    pub max_blend_distance: Option<f64>,
}

impl PathWaypoint {
    pub fn absolute(vector: DVector<f64>) -> Self {
        Self {
            vector,
            reference: WaypointReference::Absolute,
            max_blend_distance: None,
        }
    }

    pub fn relative(vector: DVector<f64>) -> Self {
        Self {
            vector,
            reference: WaypointReference::Relative,
            max_blend_distance: None,
        }
    }

    pub fn with_blend_distance(mut self, distance: f64) -> Self {
        self.max_blend_distance = Some(distance);
        self
    }
}

/// Straight segment between two points, parametrized by arc length.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSegment {
    pub start: DVector<f64>,
    pub end: DVector<f64>,
    pub length: f64,
}

impl LinearSegment {
    pub fn new(start: DVector<f64>, end: DVector<f64>) -> Self {
        let length = (&end - &start).norm();
        Self { start, end, length }
    }

    pub fn q(&self, s: f64) -> DVector<f64> {
        &self.start + (&self.end - &self.start) * (s / self.length)
    }

    pub fn pdq(&self, _s: f64) -> DVector<f64> {
        (&self.end - &self.start) / self.length
    }

    pub fn pddq(&self, _s: f64) -> DVector<f64> {
        DVector::zeros(self.start.len())
    }

    pub fn pdddq(&self, _s: f64) -> DVector<f64> {
        DVector::zeros(self.start.len())
    }
}

/// Quartic polynomial blend `q(s) = f + s e + s^3 c + s^4 b` joining two
/// linear segments with continuous tangent and zero curvature at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarticBlendSegment {
    pub length: f64,
    b: DVector<f64>,
    c: DVector<f64>,
    e: DVector<f64>,
    f: DVector<f64>,
}

impl QuarticBlendSegment {
    /// # Arguments
    ///
    /// `lb` - start point of the left linear segment
    /// `lm` - unit tangent of the left segment
    /// `rm` - unit tangent of the right segment
    /// `s_mid` - arc length of the junction on the left segment
    /// `max_diff` - maximum allowed deviation from the sharp corner
    /// `s_abs_max` - upper bound on the blend half-length
    pub fn new(
        lb: &DVector<f64>,
        lm: &DVector<f64>,
        rm: &DVector<f64>,
        s_mid: f64,
        max_diff: f64,
        s_abs_max: f64,
    ) -> Self {
        let dofs = lb.len();
        let mut s_abs_min = s_abs_max;
        for dof in 0..dofs {
            let s_abs = ((-16.0 * max_diff) / (3.0 * (lm[dof] - rm[dof]))).abs();
            if s_abs < s_abs_min {
                s_abs_min = s_abs;
            }
        }
        let length = 2.0 * s_abs_min;

        let mut b = DVector::zeros(dofs);
        let mut c = DVector::zeros(dofs);
        let mut e = DVector::zeros(dofs);
        let mut f = DVector::zeros(dofs);
        for dof in 0..dofs {
            b[dof] = (lm[dof] - rm[dof]) / (16.0 * s_abs_min.powi(3));
            c[dof] = (-lm[dof] + rm[dof]) / (4.0 * s_abs_min.powi(2));
            e[dof] = lm[dof];
            f[dof] = lb[dof] + lm[dof] * (s_mid - s_abs_min);
        }
        Self { length, b, c, e, f }
    }

    pub fn q(&self, s: f64) -> DVector<f64> {
        &self.f + &self.e * s + &self.c * s.powi(3) + &self.b * s.powi(4)
    }

    pub fn pdq(&self, s: f64) -> DVector<f64> {
        &self.e + &self.c * (3.0 * s * s) + &self.b * (4.0 * s.powi(3))
    }

    pub fn pddq(&self, s: f64) -> DVector<f64> {
        &self.c * (6.0 * s) + &self.b * (12.0 * s * s)
    }

    pub fn pdddq(&self, s: f64) -> DVector<f64> {
        &self.c * 6.0 + &self.b * (24.0 * s)
    }
}

/// A path sub-segment. The set is closed, so evaluation dispatches by match
/// rather than through a trait object.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Linear(LinearSegment),
    QuarticBlend(QuarticBlendSegment),
}

impl Segment {
    pub fn length(&self) -> f64 {
        match self {
            Segment::Linear(s) => s.length,
            Segment::QuarticBlend(s) => s.length,
        }
    }

    pub fn q(&self, s: f64) -> DVector<f64> {
        match self {
            Segment::Linear(seg) => seg.q(s),
            Segment::QuarticBlend(seg) => seg.q(s),
        }
    }

    pub fn pdq(&self, s: f64) -> DVector<f64> {
        match self {
            Segment::Linear(seg) => seg.pdq(s),
            Segment::QuarticBlend(seg) => seg.pdq(s),
        }
    }

    pub fn pddq(&self, s: f64) -> DVector<f64> {
        match self {
            Segment::Linear(seg) => seg.pddq(s),
            Segment::QuarticBlend(seg) => seg.pddq(s),
        }
    }

    pub fn pdddq(&self, s: f64) -> DVector<f64> {
        match self {
            Segment::Linear(seg) => seg.pdddq(s),
            Segment::QuarticBlend(seg) => seg.pdddq(s),
        }
    }
}

/// Waypoint list compiled into linear segments with quartic corner blends.
///
/// # Examples
///
/// ```
/// use nalgebra::DVector;
/// use otgen::{Path, PathWaypoint};
///
/// let start = DVector::from_vec(vec![0.0, 0.0]);
/// let waypoints = vec![
///     PathWaypoint::absolute(DVector::from_vec(vec![1.0, 0.0])),
///     PathWaypoint::absolute(DVector::from_vec(vec![1.0, 1.0])),
/// ];
/// let path = Path::new(start, &waypoints, 0.2).unwrap();
/// assert_eq!(3, path.segments.len());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub length: f64,
    pub segments: Vec<Segment>,
    pub cumulative_lengths: Vec<f64>,
    absolute_waypoints: Vec<DVector<f64>>,
    dofs: usize,
}

impl Path {
    /// Compiles `start` and the waypoint list into a path. Junctions with a
    /// positive effective blend distance get a quartic blend; the adjoining
    /// linear segments are shortened by the blend half-length.
    pub fn new(
        start: DVector<f64>,
        waypoints: &[PathWaypoint],
        max_blend_distance: f64,
    ) -> Result<Self, OtgError> {
        let invalid = |reason: &str| OtgError::InvalidInput {
            reason: reason.to_string(),
            input: String::new(),
        };

        if waypoints.is_empty() {
            return Err(invalid("a path needs at least one waypoint"));
        }
        let dofs = start.len();
        if waypoints.iter().any(|w| w.vector.len() != dofs) {
            return Err(invalid("waypoint dimensions do not match the start"));
        }

        let mut absolute_waypoints = Vec::with_capacity(waypoints.len() + 1);
        absolute_waypoints.push(start);
        for waypoint in waypoints {
            let previous = &absolute_waypoints[absolute_waypoints.len() - 1];
            let resolved = match waypoint.reference {
                WaypointReference::Absolute => waypoint.vector.clone(),
                WaypointReference::Relative => previous + &waypoint.vector,
            };
            absolute_waypoints.push(resolved);
        }

        let mut line_segments = Vec::with_capacity(waypoints.len());
        for pair in absolute_waypoints.windows(2) {
            let segment = LinearSegment::new(pair[0].clone(), pair[1].clone());
            if segment.length <= 0.0 {
                return Err(invalid("path contains a zero-length segment"));
            }
            line_segments.push(segment);
        }

        let mut segments: Vec<Segment> = Vec::with_capacity(2 * waypoints.len());
        let mut cumulative_lengths = Vec::with_capacity(2 * waypoints.len());
        let mut cumulative = 0.0;
        cumulative_lengths.push(cumulative);

        let mut current = line_segments[0].clone();
        for i in 1..line_segments.len() {
            let next = &line_segments[i];
            let blend_distance = waypoints[i]
                .max_blend_distance
                .unwrap_or(max_blend_distance);

            if blend_distance > 0.0 {
                let lm = current.pdq(0.0);
                let rm = next.pdq(0.0);
                let s_abs_max = current.length.min(next.length) / 2.0;
                let blend = QuarticBlendSegment::new(
                    &current.start,
                    &lm,
                    &rm,
                    current.length,
                    blend_distance,
                    s_abs_max,
                );
                let s_abs = blend.length / 2.0;

                let new_left =
                    LinearSegment::new(current.start.clone(), current.q(current.length - s_abs));
                let new_right = LinearSegment::new(next.q(s_abs), next.end.clone());

                cumulative += new_left.length;
                segments.push(Segment::Linear(new_left));
                cumulative_lengths.push(cumulative);

                cumulative += blend.length;
                segments.push(Segment::QuarticBlend(blend));
                cumulative_lengths.push(cumulative);

                current = new_right;
            } else {
                cumulative += current.length;
                segments.push(Segment::Linear(current));
                cumulative_lengths.push(cumulative);
                current = next.clone();
            }
        }
        cumulative += current.length;
        segments.push(Segment::Linear(current));

        Ok(Self {
            length: cumulative,
            segments,
            cumulative_lengths,
            absolute_waypoints,
            dofs,
        })
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.dofs
    }

    pub fn absolute_waypoints(&self) -> &[DVector<f64>] {
        &self.absolute_waypoints
    }

    /// Segment index and segment-local arc length for a global `s`, clamped
    /// to the valid segment range.
    fn find_index(&self, s: f64) -> (usize, f64) {
        let upper = self.cumulative_lengths.partition_point(|&l| l <= s);
        let index = upper.saturating_sub(1).min(self.segments.len() - 1);
        (index, s - self.cumulative_lengths[index])
    }

    pub fn q(&self, s: f64) -> DVector<f64> {
        let (i, s_local) = self.find_index(s);
        self.segments[i].q(s_local)
    }

    pub fn pdq(&self, s: f64) -> DVector<f64> {
        let (i, s_local) = self.find_index(s);
        self.segments[i].pdq(s_local)
    }

    pub fn pddq(&self, s: f64) -> DVector<f64> {
        let (i, s_local) = self.find_index(s);
        self.segments[i].pddq(s_local)
    }

    pub fn pdddq(&self, s: f64) -> DVector<f64> {
        let (i, s_local) = self.find_index(s);
        self.segments[i].pdddq(s_local)
    }

    /// Velocity along the path: `q'(s) ds`.
    pub fn dq(&self, s: f64, ds: f64) -> DVector<f64> {
        self.pdq(s) * ds
    }

    /// Acceleration along the path: `q''(s) ds^2 + q'(s) dds`.
    pub fn ddq(&self, s: f64, ds: f64, dds: f64) -> DVector<f64> {
        self.pddq(s) * (ds * ds) + self.pdq(s) * dds
    }

    /// Jerk along the path: `q'''(s) ds^3 + 3 q''(s) ds dds + q'(s) ddds`.
    pub fn dddq(&self, s: f64, ds: f64, dds: f64, ddds: f64) -> DVector<f64> {
        self.pdddq(s) * (ds * ds * ds) + self.pddq(s) * (3.0 * ds * dds) + self.pdq(s) * ddds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert::close;

    fn v2(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    fn corner_path() -> Path {
        let waypoints = vec![
            PathWaypoint::absolute(v2(1.0, 0.0)),
            PathWaypoint::absolute(v2(1.0, 1.0)),
        ];
        Path::new(v2(0.0, 0.0), &waypoints, 0.2).unwrap()
    }

    #[test]
    fn corner_is_blended() {
        let path = corner_path();
        assert_eq!(3, path.segments.len());
        assert!(matches!(path.segments[1], Segment::QuarticBlend(_)));
        assert!(path.length <= 2.0 + 1e-12);
        assert!(path.length > 1.9);
    }

    #[test]
    fn path_closure() {
        let path = corner_path();
        let q0 = path.q(0.0);
        let qf = path.q(path.length);
        close(q0[0], 0.0, 1e-12);
        close(q0[1], 0.0, 1e-12);
        close(qf[0], 1.0, 1e-12);
        close(qf[1], 1.0, 1e-12);
    }

    #[test]
    fn cumulative_lengths_strictly_increasing() {
        let path = corner_path();
        assert_eq!(path.segments.len(), path.cumulative_lengths.len());
        for pair in path.cumulative_lengths.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn blend_joins_are_c1() {
        let path = corner_path();
        let h = 1e-7;
        for &s_join in &[path.cumulative_lengths[1], path.cumulative_lengths[2]] {
            let q_left = path.q(s_join - h);
            let q_right = path.q(s_join + h);
            let t_left = path.pdq(s_join - h);
            let t_right = path.pdq(s_join + h);
            for dof in 0..2 {
                close(q_left[dof], q_right[dof], 1e-5);
                close(t_left[dof], t_right[dof], 1e-5);
            }
        }
    }

    #[test]
    fn blend_endpoints_have_zero_curvature() {
        let path = corner_path();
        let Segment::QuarticBlend(blend) = &path.segments[1] else {
            panic!("expected a blend");
        };
        let at_start = blend.pddq(0.0);
        let at_end = blend.pddq(blend.length);
        for dof in 0..2 {
            close(at_start[dof], 0.0, 1e-9);
            close(at_end[dof], 0.0, 1e-9);
        }
    }

    #[test]
    fn relative_waypoints_accumulate() {
        let waypoints = vec![
            PathWaypoint::relative(v2(1.0, 0.0)),
            PathWaypoint::relative(v2(1.0, 0.0)),
        ];
        let path = Path::new(v2(0.5, 0.0), &waypoints, 0.0).unwrap();
        let qf = path.q(path.length);
        close(qf[0], 2.5, 1e-12);
        close(path.length, 2.0, 1e-12);
    }

    #[test]
    fn find_index_clamps_out_of_range() {
        let path = corner_path();
        // Before the start and past the end, evaluation extends the first
        // and last segments linearly.
        let q_before = path.q(-0.1);
        close(q_before[0], -0.1, 1e-12);
        let q_after = path.q(path.length + 0.1);
        close(q_after[1], 1.1, 1e-12);
    }

    #[test]
    fn chain_rule_velocity_norm() {
        let path = corner_path();
        let ds = 0.37;
        for &s in &[0.1, 0.5, 1.0, 1.5, 1.9] {
            let dq = path.dq(s, ds);
            close(dq.norm(), ds.abs() * path.pdq(s).norm(), 1e-10);
        }
    }

    #[test]
    fn rejects_empty_and_mismatched_input() {
        assert!(Path::new(v2(0.0, 0.0), &[], 0.0).is_err());
        let bad = vec![PathWaypoint::absolute(DVector::from_vec(vec![1.0]))];
        assert!(Path::new(v2(0.0, 0.0), &bad, 0.0).is_err());
        let dup = vec![
            PathWaypoint::absolute(v2(1.0, 0.0)),
            PathWaypoint::absolute(v2(1.0, 0.0)),
        ];
        assert!(Path::new(v2(0.0, 0.0), &dup, 0.0).is_err());
    }
}
