//! Conflict Resolver - the pre-step overlap fixpoint.
//!
//! ```text
//!   ┌──────────────────────────────────────────────┐
//!   │ drop empty colonies                          │◄──────┐
//!   │ hulls → overlapping pairs (identifier order) │       │
//!   └──────────────┬───────────────────────────────┘       │
//!                  │                                       │
//!      none / ≤ 1 colony left ──► done                     │
//!                  │                                       │
//!      allied pair? ── yes ──► merge first allied pair ────┤
//!                  │                                       │
//!                  no ─────► fight every hostile pair ─────┘
//! ```

use crate::colony::{Colony, ColonyId, ColonyMap};
use crate::error::SimError;
use crate::fight::FightEngine;
use crate::geometry::ConvexPolygon;
use crate::params::{BehaviorParams, DenominatorPolicy, SmallColonyPolicy};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What one call to [`ConflictResolver::resolve`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// `(survivor, absorbed)` in the order the merges happened
    pub merges: Vec<(ColonyId, ColonyId)>,

    /// Duels fought across all passes
    pub duels: usize,

    /// Colonies deleted because they were empty or lost their last agent
    pub removed: Vec<ColonyId>,

    /// Merge or fight passes taken
    pub passes: u32,
}

impl Resolution {
    pub fn is_quiet(&self) -> bool {
        self.merges.is_empty() && self.duels == 0 && self.removed.is_empty()
    }
}

/// Overlapping pair found by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub first: ColonyId,
    pub second: ColonyId,
    pub allied: bool,
}

/// Merges allied colonies and fights hostile ones until no pair overlaps.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    fights: FightEngine,
    small_colonies: SmallColonyPolicy,
    strength_policy: DenominatorPolicy,
    max_passes: u32,
}

impl ConflictResolver {
    pub fn new(behavior: &BehaviorParams) -> Self {
        Self {
            fights: FightEngine::new(behavior),
            small_colonies: behavior.small_colony_policy,
            strength_policy: behavior.strength_policy,
            max_passes: behavior.limits.resolver_passes,
        }
    }

    /// Runs the fixpoint for `step`.
    ///
    /// On return no two colonies overlap (or at most one is left), no colony
    /// is empty and every strength is current for `step`.
    pub fn resolve<R: Rng>(
        &self,
        step: u64,
        colonies: &mut ColonyMap,
        rng: &mut R,
    ) -> Result<Resolution, SimError> {
        let mut resolution = Resolution::default();

        loop {
            colonies.retain(|id, colony| {
                if colony.is_empty() {
                    resolution.removed.push(*id);
                    false
                } else {
                    true
                }
            });
            if colonies.len() <= 1 {
                break;
            }

            let overlaps = self.overlapping_pairs(colonies);
            if overlaps.is_empty() {
                break;
            }
            if resolution.passes >= self.max_passes {
                return Err(SimError::ResolverDiverged { passes: resolution.passes });
            }
            resolution.passes += 1;

            if let Some(pair) = overlaps.iter().find(|o| o.allied) {
                if let Some(absorbed) = colonies.remove(&pair.second) {
                    if let Some(survivor) = colonies.get_mut(&pair.first) {
                        debug!(
                            "Step {}: colony {} absorbs colony {} ({} + {} agents)",
                            step,
                            pair.first,
                            pair.second,
                            survivor.len(),
                            absorbed.len()
                        );
                        survivor.merge(absorbed);
                    }
                }
                resolution.merges.push((pair.first, pair.second));
                continue;
            }

            let hostile: Vec<(ColonyId, ColonyId)> = overlaps.iter().map(|o| (o.first, o.second)).collect();
            let outcome = self.fights.fight(step, colonies, &hostile, rng)?;
            resolution.duels += outcome.duels.len();
            resolution.removed.extend(outcome.eliminated);
        }

        let colony_count = colonies.len();
        for colony in colonies.values_mut() {
            colony.update_strength_and_age(step, colony_count, self.strength_policy);
        }

        Ok(resolution)
    }

    /// Every overlapping pair, enumerated in identifier order.
    pub fn overlapping_pairs(&self, colonies: &ColonyMap) -> Vec<Overlap> {
        let hulls: Vec<(&Colony, Option<ConvexPolygon>)> =
            colonies.values().map(|colony| (colony, colony.hull())).collect();

        let mut overlaps = Vec::new();
        for (i, (a, hull_a)) in hulls.iter().enumerate() {
            for (b, hull_b) in &hulls[i + 1..] {
                if self.pair_overlaps(a, hull_a.as_ref(), b, hull_b.as_ref()) {
                    overlaps.push(Overlap {
                        first: a.id(),
                        second: b.id(),
                        allied: a.is_allied(b),
                    });
                }
            }
        }
        overlaps
    }

    fn pair_overlaps(
        &self,
        a: &Colony,
        hull_a: Option<&ConvexPolygon>,
        b: &Colony,
        hull_b: Option<&ConvexPolygon>,
    ) -> bool {
        match (hull_a, hull_b) {
            (Some(ha), Some(hb)) => ha.overlaps(hb),
            _ => match self.small_colonies {
                SmallColonyPolicy::Ignore => false,
                SmallColonyPolicy::Proximity { reach } => {
                    a.min_distance_to(b).is_some_and(|d| d <= reach)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Habitat, Position, StripLayout, Surface};
    use crate::params::{ColonyRates, RetryLimits};
    use nalgebra::Vector2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn habitat() -> Habitat {
        Habitat::new(Surface::default(), StripLayout::new(vec![0.0, 10.0]).unwrap())
    }

    /// A 3 × 3 grid of agents with spacing 0.5 starting at `origin`.
    fn patch(id: u32, tag: u32, origin: (f64, f64)) -> Colony {
        let positions: Vec<Position> = (0..9)
            .map(|i| Vector2::new(origin.0 + (i % 3) as f64 * 0.5, origin.1 + (i / 3) as f64 * 0.5))
            .collect();
        Colony::from_positions(ColonyId(id), tag, ColonyRates::default(), positions, &habitat()).unwrap()
    }

    fn map(colonies: Vec<Colony>) -> ColonyMap {
        colonies.into_iter().map(|c| (c.id(), c)).collect()
    }

    #[test]
    fn test_allied_overlap_merges_into_lower_id() {
        let mut colonies = map(vec![patch(0, 0, (1.0, 1.0)), patch(1, 0, (1.5, 1.5))]);
        let resolver = ConflictResolver::new(&BehaviorParams::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let resolution = resolver.resolve(1, &mut colonies, &mut rng).unwrap();

        assert_eq!(colonies.len(), 1);
        assert_eq!(colonies[&ColonyId(0)].len(), 18);
        assert_eq!(resolution.merges, vec![(ColonyId(0), ColonyId(1))]);
        assert_eq!(resolution.passes, 1);
        assert_eq!(resolution.duels, 0);
    }

    #[test]
    fn test_merge_chain_collapses_everything() {
        let mut colonies = map(vec![
            patch(0, 0, (1.0, 1.0)),
            patch(1, 0, (1.8, 1.0)),
            patch(2, 0, (2.6, 1.0)),
            patch(3, 0, (7.0, 7.0)),
        ]);
        let resolver = ConflictResolver::new(&BehaviorParams::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let resolution = resolver.resolve(1, &mut colonies, &mut rng).unwrap();

        assert_eq!(colonies.len(), 2);
        assert_eq!(colonies[&ColonyId(0)].len(), 27);
        assert_eq!(colonies[&ColonyId(3)].len(), 9);
        assert_eq!(resolution.merges.len(), 2);
        assert!(resolver.overlapping_pairs(&colonies).is_empty());
    }

    #[test]
    fn test_mixed_tags_merge_before_fighting() {
        let colonies = || {
            map(vec![
                patch(0, 0, (1.0, 1.0)),
                patch(1, 0, (1.5, 1.5)),
                patch(2, 7, (1.25, 1.0)),
            ])
        };
        let overlaps = ConflictResolver::new(&BehaviorParams::default()).overlapping_pairs(&colonies());
        assert_eq!(overlaps.len(), 3);
        assert_eq!(overlaps.iter().filter(|o| o.allied).count(), 1);

        // a single pass only merges the allied pair
        let one_pass = BehaviorParams {
            limits: RetryLimits { resolver_passes: 1, ..Default::default() },
            ..Default::default()
        };
        let mut after_first = colonies();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let result = ConflictResolver::new(&one_pass).resolve(1, &mut after_first, &mut rng);

        assert!(matches!(result, Err(SimError::ResolverDiverged { passes: 1 })));
        assert_eq!(after_first.len(), 2);
        assert_eq!(after_first[&ColonyId(0)].len(), 18);
        assert_eq!(after_first[&ColonyId(2)].len(), 9);

        let mut colonies = colonies();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let resolution = ConflictResolver::new(&BehaviorParams::default())
            .resolve(1, &mut colonies, &mut rng)
            .unwrap();

        assert_eq!(resolution.merges, vec![(ColonyId(0), ColonyId(1))]);
        assert!(resolution.duels >= 1);
        assert!(resolution.passes >= 2);
        assert!(!colonies.contains_key(&ColonyId(1)));
        let population: usize = colonies.values().map(Colony::len).sum();
        assert_eq!(population, 27 - resolution.duels);
    }

    #[test]
    fn test_separated_colonies_untouched() {
        let mut colonies = map(vec![patch(0, 1, (1.0, 1.0)), patch(1, 2, (6.0, 6.0))]);
        let resolver = ConflictResolver::new(&BehaviorParams::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let resolution = resolver.resolve(1, &mut colonies, &mut rng).unwrap();

        assert!(resolution.is_quiet());
        assert_eq!(resolution.passes, 0);
        assert_eq!(colonies.values().map(Colony::len).sum::<usize>(), 18);
        // strengths are refreshed even without conflict
        assert!(colonies.values().all(|c| c.strengths().iter().all(|s| *s > 0.0)));
    }

    #[test]
    fn test_hostile_overlap_fights_until_apart() {
        let mut colonies = map(vec![patch(0, 1, (1.0, 1.0)), patch(1, 2, (1.5, 1.5))]);
        let resolver = ConflictResolver::new(&BehaviorParams::default());
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        let resolution = resolver.resolve(2, &mut colonies, &mut rng).unwrap();

        assert!(resolution.duels >= 1);
        assert!(resolution.merges.is_empty());
        let population: usize = colonies.values().map(Colony::len).sum();
        assert_eq!(population, 18 - resolution.duels);
        assert!(colonies.len() <= 1 || resolver.overlapping_pairs(&colonies).is_empty());
        assert!(colonies.values().all(|c| !c.is_empty() && c.is_aligned()));
    }

    #[test]
    fn test_small_colonies_ignored_by_default() {
        let small = Colony::from_positions(
            ColonyId(1),
            0,
            ColonyRates::default(),
            vec![Vector2::new(1.5, 1.5), Vector2::new(1.6, 1.5)],
            &habitat(),
        )
        .unwrap();
        let mut colonies = map(vec![patch(0, 0, (1.0, 1.0)), small.clone()]);
        let resolver = ConflictResolver::new(&BehaviorParams::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        resolver.resolve(1, &mut colonies, &mut rng).unwrap();
        assert_eq!(colonies.len(), 2);

        let proximity = BehaviorParams {
            small_colony_policy: SmallColonyPolicy::Proximity { reach: 0.1 },
            ..Default::default()
        };
        let mut colonies = map(vec![patch(0, 0, (1.0, 1.0)), small]);
        let resolution = ConflictResolver::new(&proximity)
            .resolve(1, &mut colonies, &mut rng)
            .unwrap();

        assert_eq!(colonies.len(), 1);
        assert_eq!(colonies[&ColonyId(0)].len(), 11);
        assert_eq!(resolution.merges, vec![(ColonyId(0), ColonyId(1))]);
    }

    #[test]
    fn test_empty_colonies_removed() {
        let empty = Colony::new(ColonyId(5), 0, ColonyRates::default());
        let mut colonies = map(vec![patch(0, 0, (1.0, 1.0)), empty]);
        let resolver = ConflictResolver::new(&BehaviorParams::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let resolution = resolver.resolve(1, &mut colonies, &mut rng).unwrap();

        assert_eq!(resolution.removed, vec![ColonyId(5)]);
        assert_eq!(colonies.len(), 1);
    }

    #[test]
    fn test_pass_cap_reports_divergence() {
        let mut colonies = map(vec![
            patch(0, 0, (1.0, 1.0)),
            patch(1, 0, (1.5, 1.0)),
            patch(2, 0, (2.0, 1.0)),
        ]);
        let behavior = BehaviorParams {
            limits: RetryLimits { resolver_passes: 1, ..Default::default() },
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let result = ConflictResolver::new(&behavior).resolve(1, &mut colonies, &mut rng);

        assert!(matches!(result, Err(SimError::ResolverDiverged { passes: 1 })));
    }
}
