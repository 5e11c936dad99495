//! Bounded split: distribute a total over k slots, slot i receiving at most
//! `bounds[i]`, the slot values summing to the total.
//!
//! Used by the rank allocator to spread one channel's transferred votes over
//! a competitor's candidate ranks without exceeding what is left in each
//! rank's pool.

use sv_core::{ModelError, RankSolver};

/// Relative slack accepted when checking total ≤ Σ bounds.
const FEASIBILITY_SLACK: f64 = 1e-9;

pub trait BoundedAllocator {
    /// Stable name (logs, run record).
    fn name(&self) -> &'static str;

    /// Split `total` over `bounds.len()` slots.
    ///
    /// Postconditions: `0 ≤ out[i] ≤ bounds[i]` (up to float rounding) and
    /// `Σ out == total`. Returns `AllocationInfeasible` when `total > Σ bounds`.
    fn allocate(&self, total: f64, bounds: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Equal split capped by the bounds ("water filling"): slots with small
/// bounds are filled first, the remainder is shared evenly by the others.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaterFill;

/// Split proportional to the bounds (every slot filled to the same fraction).
#[derive(Clone, Copy, Debug, Default)]
pub struct ProportionalToBounds;

pub fn solver_for(kind: RankSolver) -> &'static dyn BoundedAllocator {
    match kind {
        RankSolver::WaterFill => &WaterFill,
        RankSolver::Proportional => &ProportionalToBounds,
    }
}

impl BoundedAllocator for WaterFill {
    fn name(&self) -> &'static str {
        "water_fill"
    }

    fn allocate(&self, total: f64, bounds: &[f64]) -> Result<Vec<f64>, ModelError> {
        let caps = check_feasible(total, bounds)?;
        let n = caps.len();
        let mut out = vec![0.0; n];
        if n == 0 {
            return Ok(out);
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| caps[a].total_cmp(&caps[b]));

        let mut remaining = total.max(0.0);
        for (pos, &i) in order.iter().enumerate() {
            let share = remaining / (n - pos) as f64;
            let give = share.min(caps[i]);
            out[i] = give;
            remaining -= give;
        }
        settle_residual(total, &caps, &mut out);
        Ok(out)
    }
}

impl BoundedAllocator for ProportionalToBounds {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn allocate(&self, total: f64, bounds: &[f64]) -> Result<Vec<f64>, ModelError> {
        let caps = check_feasible(total, bounds)?;
        let capacity: f64 = caps.iter().sum();
        let mut out = vec![0.0; caps.len()];
        if capacity > 0.0 && total > 0.0 {
            let fill = (total / capacity).min(1.0);
            for (o, c) in out.iter_mut().zip(&caps) {
                *o = c * fill;
            }
            settle_residual(total, &caps, &mut out);
        }
        Ok(out)
    }
}

// ----------------------------- Helpers -----------------------------

/// Clamp bounds at zero and verify the total fits.
fn check_feasible(total: f64, bounds: &[f64]) -> Result<Vec<f64>, ModelError> {
    let caps: Vec<f64> = bounds.iter().map(|b| b.max(0.0)).collect();
    let capacity: f64 = caps.iter().sum();
    let slack = FEASIBILITY_SLACK * (1.0 + total.abs());
    if !total.is_finite() || total < -slack || total > capacity + slack {
        return Err(ModelError::AllocationInfeasible { total, capacity });
    }
    Ok(caps)
}

/// Push the float residual Σout − total onto the slot with the most room
/// (or the fullest slot when the residual is negative).
fn settle_residual(total: f64, caps: &[f64], out: &mut [f64]) {
    let residual = total - out.iter().sum::<f64>();
    if residual == 0.0 || out.is_empty() {
        return;
    }
    let pick = if residual > 0.0 {
        (0..out.len()).max_by(|&a, &b| (caps[a] - out[a]).total_cmp(&(caps[b] - out[b])))
    } else {
        (0..out.len()).max_by(|&a, &b| out[a].total_cmp(&out[b]))
    };
    if let Some(i) = pick {
        out[i] = (out[i] + residual).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sum(v: &[f64]) -> f64 {
        v.iter().sum()
    }

    #[test]
    fn water_fill_caps_small_slots_first() {
        let out = WaterFill.allocate(9.0, &[1.0, 10.0, 10.0]).unwrap();
        assert_eq!(out, vec![1.0, 4.0, 4.0]);
    }

    #[test]
    fn water_fill_equal_when_unconstrained() {
        let out = WaterFill.allocate(6.0, &[6.0, 6.0, 6.0]).unwrap();
        assert_eq!(out, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn proportional_fills_same_fraction() {
        let out = ProportionalToBounds.allocate(5.0, &[2.0, 8.0]).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn exact_capacity_is_feasible() {
        for solver in [solver_for(RankSolver::WaterFill), solver_for(RankSolver::Proportional)] {
            let out = solver.allocate(3.0, &[1.0, 2.0]).unwrap();
            assert!((out[0] - 1.0).abs() < 1e-12, "{}", solver.name());
            assert!((out[1] - 2.0).abs() < 1e-12, "{}", solver.name());
        }
    }

    #[test]
    fn over_capacity_is_infeasible() {
        let err = WaterFill.allocate(4.0, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, ModelError::AllocationInfeasible { total: 4.0, capacity: 3.0 });
        assert!(!err.is_data_error());
        assert!(ProportionalToBounds.allocate(1.0, &[]).is_err());
    }

    #[test]
    fn zero_total_is_all_zero() {
        assert_eq!(WaterFill.allocate(0.0, &[1.0, 2.0]).unwrap(), vec![0.0, 0.0]);
        assert_eq!(ProportionalToBounds.allocate(0.0, &[0.0, 0.0]).unwrap(), vec![0.0, 0.0]);
        assert!(WaterFill.allocate(0.0, &[]).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn allocations_respect_bounds_and_total(
            bounds in prop::collection::vec(0.0f64..1000.0, 1..8),
            fill in 0.0f64..=1.0,
            proportional in any::<bool>(),
        ) {
            let capacity = sum(&bounds);
            let total = capacity * fill;
            let solver: &dyn BoundedAllocator =
                if proportional { &ProportionalToBounds } else { &WaterFill };
            let out = solver.allocate(total, &bounds).unwrap();
            prop_assert_eq!(out.len(), bounds.len());
            prop_assert!((sum(&out) - total).abs() <= 1e-6 * (1.0 + total));
            for (o, b) in out.iter().zip(&bounds) {
                prop_assert!(*o >= 0.0);
                prop_assert!(*o <= b + 1e-6 * (1.0 + total));
            }
        }
    }
}
