//! SimWorld - owns the colonies and the food pool and runs the step loop.

use crate::error::RunError;

use biofilm_core::{
    BehaviorParams, Colony, ColonyId, ColonyMap, ColonyRates, ConflictResolver, FoodPool, Habitat, Position,
    RelationshipMode, Resolution, SimError, StepContext, StripLayout, Surface,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Step budget
    pub steps: u64,

    /// Number of colonies created at start
    pub colonies: usize,

    /// Agents placed in each colony at start
    pub agents_per_colony: usize,

    /// Radius of the initial colony disk
    pub colony_radius: f64,

    /// Food units dropped at start
    pub food: usize,

    /// Playground rectangle
    pub surface: Surface,

    /// Number of coated strips
    pub coated_strips: usize,

    /// Width of every coated strip
    pub coated_width: f64,

    /// Merge or fight on overlap
    pub mode: RelationshipMode,

    /// Action rates shared by every colony
    pub rates: ColonyRates,

    /// Agent behaviour knobs
    pub behavior: BehaviorParams,

    /// Population share (of the initial one) that counts as the half-life
    pub half_life_fraction: f64,

    /// Two-colony imbalance, in multiples of the initial population, that ends a competitive run
    pub imbalance_factor: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps: 20,
            colonies: 5,
            agents_per_colony: 100,
            colony_radius: 2.0,
            food: 2000,
            surface: Surface::default(),
            coated_strips: 1,
            coated_width: 2.0,
            mode: RelationshipMode::default(),
            rates: ColonyRates::default(),
            behavior: BehaviorParams::default(),
            half_life_fraction: 0.5,
            imbalance_factor: 2.0,
        }
    }
}

impl SimConfig {
    /// Loads a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RunError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Rejects configurations no step could run with.
    pub fn validate(&self) -> Result<(), SimError> {
        self.surface.validate()?;
        self.rates.validate()?;
        self.behavior.validate()?;

        if self.colonies == 0 || self.agents_per_colony == 0 {
            return Err(SimError::config("need at least one colony with at least one agent"));
        }
        if self.colonies > u32::MAX as usize {
            return Err(SimError::config(format!("too many colonies: {}", self.colonies)));
        }
        let r = self.colony_radius;
        if !r.is_finite() || r < 0.0 || 2.0 * r > self.surface.width() || 2.0 * r > self.surface.height() {
            return Err(SimError::config(format!("colony radius {r} does not fit the surface")));
        }
        if !(0.0..=1.0).contains(&self.half_life_fraction) {
            return Err(SimError::config(format!(
                "half_life_fraction must lie in [0, 1], got {}",
                self.half_life_fraction
            )));
        }
        if !self.imbalance_factor.is_finite() || self.imbalance_factor < 0.0 {
            return Err(SimError::config(format!(
                "imbalance_factor must be finite and >= 0, got {}",
                self.imbalance_factor
            )));
        }
        self.habitat().map(|_| ())
    }

    /// Surface plus the alternating strip layout, anchored at `y_low`.
    pub fn habitat(&self) -> Result<Habitat, SimError> {
        let layout = StripLayout::alternating(self.coated_strips, self.coated_width, self.surface.height())?;
        let anchored = layout.boundaries().iter().map(|b| b + self.surface.y_low).collect();
        Ok(Habitat::new(self.surface, StripLayout::new(anchored)?))
    }

    pub fn initial_population(&self) -> usize {
        self.colonies * self.agents_per_colony
    }
}

/// Why a competitive run ended without a definitive half-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoClearReason {
    /// Only one colony is left
    SoleSurvivor,

    /// Two colonies are left and one dwarfs the other
    Imbalance,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every colony died out
    Extinct { step: u64 },

    /// The population fell to the half-life threshold
    HalfLife { step: u64 },

    NoClearOutcome { step: u64, reason: NoClearReason },

    /// The step budget ran out first
    Exhausted { steps: u64 },
}

impl RunOutcome {
    /// Step at which the population fell to the threshold, if it did.
    pub fn half_life(&self) -> Option<u64> {
        match self {
            RunOutcome::HalfLife { step } | RunOutcome::Extinct { step } => Some(*step),
            RunOutcome::NoClearOutcome { .. } | RunOutcome::Exhausted { .. } => None,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Extinct { step } => write!(f, "extinct at step {step}"),
            RunOutcome::HalfLife { step } => write!(f, "half-life at step {step}"),
            RunOutcome::NoClearOutcome { step, reason } => write!(f, "no clear outcome at step {step} ({reason:?})"),
            RunOutcome::Exhausted { steps } => write!(f, "no half-life within {steps} steps"),
        }
    }
}

/// What happened during one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: u64,

    /// Colonies alive after the step
    pub colonies: usize,

    /// Agents alive after the step
    pub population: usize,

    pub food_left: usize,
    pub eaten: usize,
    pub moves: usize,
    pub births: usize,
    pub deaths: usize,

    /// Pre-step overlap handling
    pub resolution: Resolution,

    /// Colonies that ended the step empty
    pub extinct: Vec<ColonyId>,
}

/// The SimWorld - container for one run.
pub struct SimWorld {
    config: SimConfig,
    habitat: Habitat,
    colonies: ColonyMap,
    food: FoodPool,
    resolver: ConflictResolver,
    rng: ChaCha8Rng,
    step: u64,
}

impl SimWorld {
    /// Validates `config`, drops the food and places every colony.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let habitat = config.habitat()?;

        // Derive separate seeds for different subsystems
        let colony_seed = config.seed;
        let food_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let mut rng = ChaCha8Rng::seed_from_u64(colony_seed);
        let mut food_rng = ChaCha8Rng::seed_from_u64(food_seed);
        let mut food = FoodPool::scatter(config.food, &habitat.surface, &mut food_rng);

        let surface = habitat.surface;
        let r = config.colony_radius;
        let mut colonies = ColonyMap::new();
        for i in 0..config.colonies {
            let center = Position::new(
                rng.gen_range(surface.x_low + r..=surface.x_high - r),
                rng.gen_range(surface.y_low + r..=surface.y_high - r),
            );
            let id = ColonyId(i as u32);
            let mut colony = Colony::spawn(
                id,
                config.mode.tag_for(i),
                config.rates,
                center,
                r,
                config.agents_per_colony,
                &habitat,
                &mut rng,
            )?;
            colony.eat(0, &mut food, &config.behavior, &mut rng);
            colonies.insert(id, colony);
        }

        let colony_count = colonies.len();
        for colony in colonies.values_mut() {
            colony.update_strength_and_age(1, colony_count, config.behavior.strength_policy);
        }

        info!(
            "World ready: {} colonies × {} agents, {} food left, strips {:?}",
            config.colonies,
            config.agents_per_colony,
            food.len(),
            habitat.strips.boundaries()
        );

        Ok(Self {
            resolver: ConflictResolver::new(&config.behavior),
            config,
            habitat,
            colonies,
            food,
            rng,
            step: 0,
        })
    }

    /// Runs one step: overlap resolution, sense and decide, then act.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        self.step += 1;
        let step = self.step;
        let behavior = &self.config.behavior;

        let resolution = self.resolver.resolve(step, &mut self.colonies, &mut self.rng)?;

        let mut eaten = 0;
        for colony in self.colonies.values_mut() {
            colony.refresh_regions(&self.habitat);
            colony.compute_neighbours()?;
            eaten += colony.eat(step, &mut self.food, behavior, &mut self.rng);
            colony.compute_death_rate(step, behavior.starvation_window);
            colony.select_actions(&mut self.rng);
        }

        let ctx = StepContext {
            step,
            colony_count: self.colonies.len(),
            habitat: &self.habitat,
            behavior,
        };
        let (mut moves, mut births, mut deaths) = (0, 0, 0);
        for colony in self.colonies.values_mut() {
            moves += colony.apply_movement(&ctx, &mut self.rng)?;
            births += colony.duplicate(&ctx, &mut self.food, &mut self.rng)?;
            deaths += colony.die();
        }

        let mut extinct = Vec::new();
        self.colonies.retain(|id, colony| {
            if colony.is_empty() {
                extinct.push(*id);
                false
            } else {
                true
            }
        });

        let report = StepReport {
            step,
            colonies: self.colonies.len(),
            population: self.population(),
            food_left: self.food.len(),
            eaten,
            moves,
            births,
            deaths,
            resolution,
            extinct,
        };

        debug!(
            "  step {} | colonies={} | agents={} | +{} -{} | food={}",
            report.step, report.colonies, report.population, report.births, report.deaths, report.food_left
        );

        Ok(report)
    }

    /// Runs until a terminal condition or the step budget.
    pub fn run(&mut self) -> Result<RunOutcome, SimError> {
        self.run_with(|_, _| {})
    }

    /// Like [`SimWorld::run`], calling `observe` after every step.
    pub fn run_with<F>(&mut self, mut observe: F) -> Result<RunOutcome, SimError>
    where
        F: FnMut(&SimWorld, &StepReport),
    {
        while self.step < self.config.steps {
            let report = self.step()?;
            observe(self, &report);

            if let Some(outcome) = self.termination() {
                info!("✓ Run finished: {}", outcome);
                return Ok(outcome);
            }
        }

        let outcome = RunOutcome::Exhausted { steps: self.step };
        info!("✓ Run finished: {}", outcome);
        Ok(outcome)
    }

    /// Terminal condition reached by the current state, if any.
    pub fn termination(&self) -> Option<RunOutcome> {
        let step = self.step;
        if self.colonies.is_empty() {
            return Some(RunOutcome::Extinct { step });
        }

        let initial = self.config.initial_population() as f64;
        if self.population() as f64 <= self.config.half_life_fraction * initial {
            return Some(RunOutcome::HalfLife { step });
        }

        if self.config.mode == RelationshipMode::Competitive {
            let sizes: Vec<usize> = self.colonies.values().map(Colony::len).collect();
            match sizes.as_slice() {
                [_] => {
                    return Some(RunOutcome::NoClearOutcome {
                        step,
                        reason: NoClearReason::SoleSurvivor,
                    })
                }
                [a, b] if a.abs_diff(*b) as f64 >= self.config.imbalance_factor * initial => {
                    return Some(RunOutcome::NoClearOutcome {
                        step,
                        reason: NoClearReason::Imbalance,
                    })
                }
                _ => {}
            }
        }

        None
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn habitat(&self) -> &Habitat {
        &self.habitat
    }

    pub fn colonies(&self) -> &ColonyMap {
        &self.colonies
    }

    pub fn food(&self) -> &FoodPool {
        &self.food
    }

    /// Steps completed so far.
    pub fn current_step(&self) -> u64 {
        self.step
    }

    /// Agents alive across all colonies.
    pub fn population(&self) -> usize {
        self.colonies.values().map(Colony::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still_rates() -> ColonyRates {
        ColonyRates {
            duplicate_rate: 0.0,
            move_rate: 0.0,
            base_death_rate: 0.0,
        }
    }

    fn small_config() -> SimConfig {
        SimConfig {
            colonies: 3,
            agents_per_colony: 20,
            colony_radius: 1.0,
            food: 200,
            steps: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_sim_world_creation() {
        let world = SimWorld::new(small_config()).unwrap();

        assert_eq!(world.colonies().len(), 3);
        assert_eq!(world.population(), 60);
        assert_eq!(world.current_step(), 0);
        assert!(world.food().len() <= 200);
        for colony in world.colonies().values() {
            assert_eq!(colony.relationship(), 0);
            assert!(colony.points().iter().all(|p| world.habitat().surface.contains(p)));
            assert!(colony.strengths().iter().all(|s| s.is_finite() && *s > 0.0));
        }
    }

    #[test]
    fn test_competitive_tags_unique() {
        let config = SimConfig {
            mode: RelationshipMode::Competitive,
            ..small_config()
        };
        let world = SimWorld::new(config).unwrap();

        let tags: Vec<u32> = world.colonies().values().map(|c| c.relationship()).collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn test_sim_world_determinism() {
        let mut world1 = SimWorld::new(small_config()).unwrap();
        let mut world2 = SimWorld::new(small_config()).unwrap();

        for _ in 0..3 {
            let r1 = world1.step().unwrap();
            let r2 = world2.step().unwrap();
            assert_eq!(r1, r2);
        }

        let points = |w: &SimWorld| -> Vec<Position> {
            w.colonies().values().flat_map(|c| c.points().iter().copied()).collect()
        };
        assert_eq!(points(&world1), points(&world2));
        assert_eq!(world1.food().units(), world2.food().units());
    }

    #[test]
    fn test_still_colony_never_changes_size() {
        let config = SimConfig {
            colonies: 1,
            agents_per_colony: 30,
            steps: 15,
            rates: still_rates(),
            ..Default::default()
        };
        let mut world = SimWorld::new(config).unwrap();

        let outcome = world
            .run_with(|_, report| {
                assert_eq!(report.population, 30);
                assert_eq!(report.births + report.deaths + report.moves, 0);
            })
            .unwrap();

        assert_eq!(outcome, RunOutcome::Exhausted { steps: 15 });
        assert_eq!(outcome.half_life(), None);
    }

    #[test]
    fn test_overlapping_cooperative_colonies_merge() {
        let config = SimConfig {
            colonies: 2,
            agents_per_colony: 40,
            colony_radius: 4.5,
            rates: still_rates(),
            ..Default::default()
        };
        let mut world = SimWorld::new(config).unwrap();

        let report = world.step().unwrap();

        assert_eq!(report.resolution.merges, vec![(ColonyId(0), ColonyId(1))]);
        assert_eq!(world.colonies().len(), 1);
        assert_eq!(world.population(), 80);
    }

    #[test]
    fn test_starved_world_goes_extinct() {
        let config = SimConfig {
            food: 0,
            rates: ColonyRates {
                base_death_rate: 5.0,
                ..still_rates()
            },
            ..small_config()
        };
        let mut world = SimWorld::new(config).unwrap();

        let outcome = world.run().unwrap();

        assert_eq!(outcome, RunOutcome::Extinct { step: 1 });
        assert_eq!(outcome.half_life(), Some(1));
        assert!(world.colonies().is_empty());
    }

    #[test]
    fn test_half_life_threshold() {
        let config = SimConfig {
            rates: still_rates(),
            half_life_fraction: 1.0,
            ..small_config()
        };
        let mut world = SimWorld::new(config).unwrap();

        assert_eq!(world.run().unwrap(), RunOutcome::HalfLife { step: 1 });
    }

    #[test]
    fn test_sole_competitive_survivor_is_no_clear_outcome() {
        let config = SimConfig {
            colonies: 1,
            mode: RelationshipMode::Competitive,
            rates: still_rates(),
            ..small_config()
        };
        let mut world = SimWorld::new(config).unwrap();

        assert_eq!(
            world.run().unwrap(),
            RunOutcome::NoClearOutcome {
                step: 1,
                reason: NoClearReason::SoleSurvivor
            }
        );
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let cases = [
            SimConfig { colonies: 0, ..Default::default() },
            SimConfig { colony_radius: 6.0, ..Default::default() },
            SimConfig { coated_strips: 3, coated_width: 4.0, ..Default::default() },
            SimConfig { half_life_fraction: 1.5, ..Default::default() },
            SimConfig {
                rates: ColonyRates { duplicate_rate: f64::NAN, ..Default::default() },
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(SimWorld::new(config).is_err());
        }
    }

    #[test]
    fn test_habitat_anchored_at_surface_floor() {
        let config = SimConfig {
            surface: Surface::new(0.0, 10.0, 2.0, 12.0),
            coated_strips: 1,
            coated_width: 2.0,
            ..Default::default()
        };
        let habitat = config.habitat().unwrap();
        let b = habitat.strips.boundaries();

        assert_eq!(b.len(), 4);
        assert!((b[0] - 2.0).abs() < 1e-12);
        assert!((b[1] - 6.0).abs() < 1e-12);
        assert!((b[2] - 8.0).abs() < 1e-12);
        assert!((b[3] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_config() {
        let path = std::env::temp_dir().join(format!("biofilm_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "seed": 7, "mode": "competitive", "rates": { "move_rate": 0.0 } }"#).unwrap();

        let config = SimConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.mode, RelationshipMode::Competitive);
        assert_eq!(config.rates.move_rate, 0.0);
        assert_eq!(config.rates.duplicate_rate, ColonyRates::default().duplicate_rate);
        assert_eq!(config.steps, SimConfig::default().steps);
    }

    #[test]
    fn test_outcome_serializes_with_kind() {
        let json = serde_json::to_string(&RunOutcome::HalfLife { step: 4 }).unwrap();
        assert_eq!(json, r#"{"kind":"half_life","step":4}"#);
    }
}
