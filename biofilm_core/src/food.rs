//! Shared food pool.

use crate::geometry::{Position, Surface};
use crate::params::EatRule;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Food units still on the surface. A unit is gone for every colony once eaten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodPool {
    units: Vec<Position>,
}

impl FoodPool {
    pub fn new(units: Vec<Position>) -> Self {
        Self { units }
    }

    /// Drops `count` units uniformly over the surface.
    pub fn scatter<R: Rng>(count: usize, surface: &Surface, rng: &mut R) -> Self {
        Self {
            units: (0..count).map(|_| surface.sample(rng)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[Position] {
        &self.units
    }

    /// Removes one unit eligible for an agent at `at`, chosen uniformly among
    /// the units `rule` admits.
    pub fn take_for<R: Rng>(
        &mut self,
        at: &Position,
        eat_distance: f64,
        rule: EatRule,
        rng: &mut R,
    ) -> Option<Position> {
        let eligible: Vec<usize> = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, unit)| rule.admits((*unit - at).norm(), eat_distance))
            .map(|(i, _)| i)
            .collect();

        let &pick = eligible.choose(rng)?;
        Some(self.units.swap_remove(pick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pool() -> FoodPool {
        FoodPool::new(vec![
            Vector2::new(0.5, 0.0),
            Vector2::new(5.0, 0.0),
            Vector2::new(9.0, 0.0),
        ])
    }

    #[test]
    fn test_scatter_inside_surface() {
        let surface = Surface::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let food = FoodPool::scatter(300, &surface, &mut rng);

        assert_eq!(food.len(), 300);
        assert!(food.units().iter().all(|u| surface.contains(u)));
    }

    #[test]
    fn test_within_rule_takes_close_unit() {
        let mut food = pool();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let eaten = food.take_for(&Vector2::new(0.0, 0.0), 1.0, EatRule::Within, &mut rng);

        assert_eq!(eaten, Some(Vector2::new(0.5, 0.0)));
        assert_eq!(food.len(), 2);
        assert!(!food.units().contains(&Vector2::new(0.5, 0.0)));
    }

    #[test]
    fn test_beyond_rule_skips_close_unit() {
        let mut food = pool();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let eaten = food
            .take_for(&Vector2::new(0.0, 0.0), 1.0, EatRule::Beyond, &mut rng)
            .unwrap();

        assert!(eaten.x > 1.0);
        assert!(food.units().contains(&Vector2::new(0.5, 0.0)));
    }

    #[test]
    fn test_nothing_eligible() {
        let mut food = pool();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let eaten = food.take_for(&Vector2::new(20.0, 20.0), 1.0, EatRule::Within, &mut rng);

        assert!(eaten.is_none());
        assert_eq!(food.len(), 3);
        assert!(FoodPool::default()
            .take_for(&Vector2::new(0.0, 0.0), 1.0, EatRule::Beyond, &mut rng)
            .is_none());
    }
}
