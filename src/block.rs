//! Feasible-duration summary of a single degree of freedom and the
//! cross-DoF time synchronization.

use crate::profile::Profile;

const EPS: f64 = f64::EPSILON;

/// A contiguous duration interval `(left, right)` that is *not* reachable by
/// any profile of this DoF. `profile` is the alternate profile that becomes
/// valid again at `right`.
#[derive(Debug, Clone)]
pub struct Interval {
    pub left: f64,
    pub right: f64,
    pub profile: Profile,
}

/// Summary of the feasible-duration structure of one DoF: the minimum
/// duration, the profile achieving it, and up to two blocked intervals.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub t_min: f64,
    pub p_min: Profile,
    pub a: Option<Interval>,
    pub b: Option<Interval>,
}

impl Block {
    /// Whether duration `t` is unreachable for this DoF.
    pub fn is_blocked(&self, t: f64) -> bool {
        t < self.t_min
            || matches!(&self.a, Some(i) if i.left < t && t < i.right)
            || matches!(&self.b, Some(i) if i.left < t && t < i.right)
    }

    /// Shifts all durations by the brake prelude length, so the block
    /// describes whole-DoF durations.
    pub fn shift_brake(&mut self, t_brake: f64) {
        if t_brake == 0.0 {
            return;
        }
        self.t_min += t_brake;
        for interval in self.a.iter_mut().chain(self.b.iter_mut()) {
            interval.left += t_brake;
            interval.right += t_brake;
        }
    }

    /// Selects the synchronized duration across all DoFs.
    ///
    /// Candidate durations are every DoF's `t_min` and interval right
    /// endpoints, plus the optional user minimum. Candidates are tested in
    /// ascending order and the first one not blocked by any DoF wins. With
    /// `discrete`, candidates are first rounded up to a multiple of
    /// `delta_time`.
    ///
    /// On success `t_sync` holds the winning duration and `limiting_dof` the
    /// DoF whose unmodified candidate won, with its profile stored into
    /// `profiles`; `limiting_dof` is `None` when the user minimum won or the
    /// winner was moved by discretization, in which case every DoF must run
    /// step 2.
    #[allow(clippy::too_many_arguments)]
    pub fn synchronize(
        blocks: &[Block],
        minimum_duration: Option<f64>,
        t_sync: &mut f64,
        limiting_dof: &mut Option<usize>,
        profiles: &mut [Profile],
        discrete: bool,
        delta_time: f64,
    ) -> bool {
        let dofs = blocks.len();

        // Candidate layout: [t_min per dof | a.right per dof | b.right per
        // dof | minimum_duration].
        let mut candidates = vec![f64::INFINITY; 3 * dofs + 1];
        for (dof, block) in blocks.iter().enumerate() {
            candidates[dof] = block.t_min;
            if let Some(a) = &block.a {
                candidates[dofs + dof] = a.right;
            }
            if let Some(b) = &block.b {
                candidates[2 * dofs + dof] = b.right;
            }
        }
        candidates[3 * dofs] = minimum_duration.unwrap_or(f64::INFINITY);

        let mut moved = vec![false; 3 * dofs + 1];
        if discrete && delta_time > 0.0 {
            for (candidate, was_moved) in candidates.iter_mut().zip(moved.iter_mut()) {
                if candidate.is_infinite() {
                    continue;
                }
                let remainder = *candidate % delta_time;
                if remainder > EPS {
                    *candidate += delta_time - remainder;
                    *was_moved = true;
                }
            }
        }

        let mut idx: Vec<usize> = (0..candidates.len()).collect();
        idx.sort_by(|&i, &j| candidates[i].total_cmp(&candidates[j]));

        // Anything before the largest t_min cannot synchronize all DoFs.
        for &i in &idx[dofs.saturating_sub(1)..] {
            let candidate = candidates[i];
            if candidate.is_infinite()
                || candidate < minimum_duration.unwrap_or(0.0)
                || blocks.iter().any(|block| block.is_blocked(candidate))
            {
                continue;
            }

            *t_sync = candidate;
            if i == 3 * dofs || moved[i] {
                // User minimum or discretized candidate: no DoF is exactly
                // time-optimal at this duration.
                *limiting_dof = None;
                return true;
            }

            let dof = i % dofs;
            *limiting_dof = Some(dof);
            profiles[dof] = match i / dofs {
                0 => Some(blocks[dof].p_min.clone()),
                1 => blocks[dof].a.as_ref().map(|iv| iv.profile.clone()),
                _ => blocks[dof].b.as_ref().map(|iv| iv.profile.clone()),
            }
            .unwrap_or_else(|| blocks[dof].p_min.clone());
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert::close;

    fn block_with(t_min: f64, gap: Option<(f64, f64)>) -> Block {
        Block {
            t_min,
            p_min: Profile::default(),
            a: gap.map(|(left, right)| Interval {
                left,
                right,
                profile: Profile::default(),
            }),
            b: None,
        }
    }

    #[test]
    fn blocked_inside_interval_only() {
        let block = block_with(1.0, Some((2.0, 3.0)));
        assert!(block.is_blocked(0.5));
        assert!(!block.is_blocked(1.5));
        assert!(block.is_blocked(2.5));
        assert!(!block.is_blocked(2.0));
        assert!(!block.is_blocked(3.0));
        assert!(!block.is_blocked(4.0));
    }

    #[test]
    fn synchronize_picks_largest_t_min() {
        let blocks = vec![block_with(2.0, None), block_with(0.5, None)];
        let mut t_sync = 0.0;
        let mut limiting = None;
        let mut profiles = vec![Profile::default(); 2];
        assert!(Block::synchronize(
            &blocks,
            None,
            &mut t_sync,
            &mut limiting,
            &mut profiles,
            false,
            0.01,
        ));
        close(t_sync, 2.0, 1e-12);
        assert_eq!(Some(0), limiting);
    }

    #[test]
    fn synchronize_skips_blocked_candidate() {
        // DoF 1's t_min falls inside DoF 0's blocked interval; the next
        // valid candidate is the interval's right endpoint.
        let blocks = vec![block_with(1.0, Some((1.5, 3.0))), block_with(2.0, None)];
        let mut t_sync = 0.0;
        let mut limiting = None;
        let mut profiles = vec![Profile::default(); 2];
        assert!(Block::synchronize(
            &blocks,
            None,
            &mut t_sync,
            &mut limiting,
            &mut profiles,
            false,
            0.01,
        ));
        close(t_sync, 3.0, 1e-12);
        assert_eq!(Some(0), limiting);
    }

    #[test]
    fn synchronize_honors_minimum_duration() {
        let blocks = vec![block_with(1.0, None)];
        let mut t_sync = 0.0;
        let mut limiting = Some(7);
        let mut profiles = vec![Profile::default(); 1];
        assert!(Block::synchronize(
            &blocks,
            Some(5.0),
            &mut t_sync,
            &mut limiting,
            &mut profiles,
            false,
            0.01,
        ));
        close(t_sync, 5.0, 1e-12);
        assert_eq!(None, limiting);
    }

    #[test]
    fn synchronize_discrete_rounds_up() {
        let blocks = vec![block_with(1.004, None)];
        let mut t_sync = 0.0;
        let mut limiting = Some(3);
        let mut profiles = vec![Profile::default(); 1];
        assert!(Block::synchronize(
            &blocks,
            None,
            &mut t_sync,
            &mut limiting,
            &mut profiles,
            true,
            0.01,
        ));
        close(t_sync, 1.01, 1e-9);
        // The winning candidate was moved, so no DoF is exactly optimal.
        assert_eq!(None, limiting);
    }

    #[test]
    fn shift_brake_offsets_all_durations() {
        let mut block = block_with(1.0, Some((2.0, 3.0)));
        block.shift_brake(0.25);
        close(block.t_min, 1.25, 1e-12);
        let a = block.a.as_ref().unwrap();
        close(a.left, 2.25, 1e-12);
        close(a.right, 3.25, 1e-12);
    }
}
