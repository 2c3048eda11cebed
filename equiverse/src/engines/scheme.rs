//! Application schemes: how a checker interleaves gates of the two circuits.

use gatewise::Operation;

use crate::config::{ApplicationSchemeType, GateCosts};

/// Step source for the non-lookahead schemes. Each step says how many
/// operations to advance on either side; the lookahead scheme is resolved by
/// the caller because it needs the intermediate matrix.
#[derive(Debug)]
pub(crate) struct GatePacing {
    scheme: ApplicationSchemeType,
    ratio: usize,
    costs: GateCosts,
}

impl GatePacing {
    pub(crate) fn new(
        scheme: ApplicationSchemeType,
        len1: usize,
        len2: usize,
        costs: GateCosts,
    ) -> GatePacing {
        let ratio = if len1 == 0 {
            1
        } else {
            ((len2 as f64 / len1 as f64).round() as usize).max(1)
        };
        GatePacing {
            scheme,
            ratio,
            costs,
        }
    }

    /// Amount of operations to apply next from each side. `next1` is the
    /// upcoming operation on the first side, used by the gate-cost scheme.
    pub(crate) fn step(
        &mut self,
        remaining: (usize, usize),
        next1: Option<&Operation>,
    ) -> (usize, usize) {
        let (r1, r2) = remaining;
        match self.scheme {
            ApplicationSchemeType::Sequential => (r1, r2),
            ApplicationSchemeType::OneToOne => (r1.min(1), r2.min(1)),
            ApplicationSchemeType::Proportional => {
                if r1 == 0 {
                    (0, r2)
                } else {
                    (1, self.ratio.min(r2))
                }
            }
            ApplicationSchemeType::GateCost => {
                if r1 == 0 {
                    return (0, r2);
                }
                let cost = next1
                    .map(|op| match op {
                        Operation::Unitary {
                            gate, controls, ..
                        } => self.costs.cost(gate.name(), controls.len() as u32),
                        _ => 1,
                    })
                    .unwrap_or(1) as usize;
                (1, cost.min(r2))
            }
            // resolved by the caller; advancing one op per side keeps the
            // pacing sound if it ever lands here
            ApplicationSchemeType::Lookahead => (r1.min(1), r2.min(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostProfile, CostRule};
    use gatewise::Gate;

    #[test]
    fn sequential_applies_everything_at_once() {
        let mut pacing = GatePacing::new(
            ApplicationSchemeType::Sequential,
            3,
            5,
            GateCosts::default(),
        );
        assert_eq!(pacing.step((3, 5), None), (3, 5));
    }

    #[test]
    fn one_to_one_alternates() {
        let mut pacing =
            GatePacing::new(ApplicationSchemeType::OneToOne, 3, 5, GateCosts::default());
        assert_eq!(pacing.step((3, 5), None), (1, 1));
        assert_eq!(pacing.step((0, 2), None), (0, 1));
    }

    #[test]
    fn proportional_matches_size_ratio() {
        let mut pacing = GatePacing::new(
            ApplicationSchemeType::Proportional,
            2,
            6,
            GateCosts::default(),
        );
        assert_eq!(pacing.step((2, 6), None), (1, 3));
        assert_eq!(pacing.step((1, 3), None), (1, 3));
        assert_eq!(pacing.step((0, 3), None), (0, 3));
    }

    #[test]
    fn gate_cost_follows_the_profile() {
        let profile = CostProfile::Inline(vec![CostRule("x".into(), 1, 4)]);
        let costs = GateCosts::from_profile(&profile).unwrap();
        let mut pacing = GatePacing::new(ApplicationSchemeType::GateCost, 2, 8, costs);

        let cx = Operation::controlled(Gate::X, [0], [1]);
        assert_eq!(pacing.step((2, 8), Some(&cx)), (1, 4));

        let h = Operation::unitary(Gate::H, [0]);
        assert_eq!(pacing.step((1, 4), Some(&h)), (1, 1));
    }
}
