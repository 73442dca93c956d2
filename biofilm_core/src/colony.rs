//! Colony - the structure-of-arrays population of one relationship group.
//!
//! Every per-agent attribute lives in its own vector and all vectors share
//! one index space. An agent *is* its index for the duration of a step; it
//! disappears when its index is compacted out of every vector at once.
//!
//! Per step the driver calls, in order:
//! 1. `refresh_regions` / `compute_neighbours` / `eat` / `compute_death_rate`
//!    / `select_actions` (sense and decide)
//! 2. `apply_movement` / `duplicate` / `die` (act)

use crate::error::SimError;
use crate::food::FoodPool;
use crate::geometry::{sample_in_disk, ConvexPolygon, Habitat, Position};
use crate::params::{BehaviorParams, ColonyRates, DenominatorPolicy};
use crate::tessellation::neighbour_counts;
use nalgebra::Vector2;
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;

/// Stable identifier of a colony for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColonyId(pub u32);

impl std::fmt::Display for ColonyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All live colonies, addressed by identifier and iterated in identifier order.
pub type ColonyMap = BTreeMap<ColonyId, Colony>;

/// What an agent does in the act phase of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Action {
    /// Newborns, and agents whose three weights are all zero
    #[default]
    Idle,
    Die,
    Duplicate,
    Move,
}

/// Order of the weights handed to the action draw.
const DRAWN_ACTIONS: [Action; 3] = [Action::Die, Action::Duplicate, Action::Move];

/// Read-only inputs of the act phase.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Current step number
    pub step: u64,

    /// Live colonies, feeding the crowding term of strength
    pub colony_count: usize,

    pub habitat: &'a Habitat,

    pub behavior: &'a BehaviorParams,
}

/// A population of agents sharing a relationship tag.
#[derive(Debug, Clone)]
pub struct Colony {
    id: ColonyId,
    relationship: u32,
    rates: ColonyRates,

    points: Vec<Position>,
    neighbours: Vec<u32>,
    death_rate: Vec<f64>,
    actions: Vec<Action>,
    ages: Vec<u64>,
    strength: Vec<f64>,
    /// Step of the last meal; `None` until the first one
    last_meal: Vec<Option<u64>>,
    regions: Vec<usize>,
    birth_step: Vec<u64>,
}

impl Colony {
    /// Creates a colony with no agents.
    pub fn new(id: ColonyId, relationship: u32, rates: ColonyRates) -> Self {
        Self {
            id,
            relationship,
            rates,
            points: Vec::new(),
            neighbours: Vec::new(),
            death_rate: Vec::new(),
            actions: Vec::new(),
            ages: Vec::new(),
            strength: Vec::new(),
            last_meal: Vec::new(),
            regions: Vec::new(),
            birth_step: Vec::new(),
        }
    }

    /// Creates a colony whose agents sit at `positions`, born at step 0.
    ///
    /// Regions and neighbour counts are computed immediately.
    pub fn from_positions(
        id: ColonyId,
        relationship: u32,
        rates: ColonyRates,
        positions: Vec<Position>,
        habitat: &Habitat,
    ) -> Result<Self, SimError> {
        let mut colony = Self::new(id, relationship, rates);
        for p in positions {
            let region = habitat.region_of(&p);
            colony.push_agent(p, region, 0);
        }
        colony.compute_neighbours()?;
        Ok(colony)
    }

    /// Places `count` agents uniformly in the disk of `radius` around `center`.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<R: Rng>(
        id: ColonyId,
        relationship: u32,
        rates: ColonyRates,
        center: Position,
        radius: f64,
        count: usize,
        habitat: &Habitat,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        let positions = (0..count)
            .map(|_| sample_in_disk(&center, radius, rng))
            .collect();
        Self::from_positions(id, relationship, rates, positions, habitat)
    }

    fn push_agent(&mut self, position: Position, region: usize, birth_step: u64) {
        self.points.push(position);
        self.neighbours.push(0);
        self.death_rate.push(0.0);
        self.actions.push(Action::Idle);
        self.ages.push(0);
        self.strength.push(0.0);
        self.last_meal.push(None);
        self.regions.push(region);
        self.birth_step.push(birth_step);
    }

    pub fn id(&self) -> ColonyId {
        self.id
    }

    pub fn relationship(&self) -> u32 {
        self.relationship
    }

    pub fn rates(&self) -> &ColonyRates {
        &self.rates
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Position] {
        &self.points
    }

    pub fn neighbours(&self) -> &[u32] {
        &self.neighbours
    }

    pub fn death_rates(&self) -> &[f64] {
        &self.death_rate
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn ages(&self) -> &[u64] {
        &self.ages
    }

    pub fn strengths(&self) -> &[f64] {
        &self.strength
    }

    pub fn last_meals(&self) -> &[Option<u64>] {
        &self.last_meal
    }

    pub fn regions(&self) -> &[usize] {
        &self.regions
    }

    pub fn birth_steps(&self) -> &[u64] {
        &self.birth_step
    }

    /// Colonies with the same tag merge on contact; different tags fight.
    pub fn is_allied(&self, other: &Colony) -> bool {
        self.relationship == other.relationship
    }

    /// Hull used for overlap tests; `None` for colonies of three agents or fewer.
    pub fn hull(&self) -> Option<ConvexPolygon> {
        if self.len() <= 3 {
            return None;
        }
        ConvexPolygon::hull_of(&self.points)
    }

    /// Smallest distance between any agent here and any agent of `other`.
    pub fn min_distance_to(&self, other: &Colony) -> Option<f64> {
        self.points
            .iter()
            .flat_map(|a| other.points.iter().map(move |b| (a - b).norm()))
            .min_by(|x, y| x.total_cmp(y))
    }

    /// Reclassifies every agent against the strip layout.
    pub fn refresh_regions(&mut self, habitat: &Habitat) {
        self.regions = self.points.iter().map(|p| habitat.region_of(p)).collect();
    }

    /// Recomputes tessellation neighbour counts for the whole colony.
    pub fn compute_neighbours(&mut self) -> Result<(), SimError> {
        self.neighbours = neighbour_counts(&self.points)?;
        Ok(())
    }

    /// Each agent tries to eat one unit; returns how many units were eaten.
    pub fn eat<R: Rng>(
        &mut self,
        step: u64,
        food: &mut FoodPool,
        behavior: &BehaviorParams,
        rng: &mut R,
    ) -> usize {
        self.feed_range(0..self.len(), step, food, behavior, rng)
    }

    fn feed_range<R: Rng>(
        &mut self,
        agents: std::ops::Range<usize>,
        step: u64,
        food: &mut FoodPool,
        behavior: &BehaviorParams,
        rng: &mut R,
    ) -> usize {
        let mut eaten = 0;
        for i in agents {
            if food.is_empty() {
                break;
            }
            if food
                .take_for(&self.points[i], behavior.eat_distance, behavior.eat_rule, rng)
                .is_some()
            {
                self.last_meal[i] = Some(step);
                eaten += 1;
            }
        }
        eaten
    }

    /// Sets each agent's hazard for this step.
    ///
    /// Starved agents (never fed, or fed more than `starvation_window` steps
    /// ago) get `base_death_rate / neighbours`; fed agents get zero.
    pub fn compute_death_rate(&mut self, step: u64, starvation_window: u64) {
        let base = self.rates.base_death_rate;
        self.death_rate = self
            .last_meal
            .iter()
            .zip(&self.neighbours)
            .map(|(meal, &neighbours)| {
                let starved = match meal {
                    None => true,
                    Some(t) => step.saturating_sub(*t) > starvation_window,
                };
                if starved {
                    base / f64::from(neighbours.max(1))
                } else {
                    0.0
                }
            })
            .collect();
    }

    /// Draws one action per agent, weighted by (death rate, duplicate rate, move rate).
    pub fn select_actions<R: Rng>(&mut self, rng: &mut R) {
        let duplicate = self.rates.duplicate_rate;
        let movement = self.rates.move_rate;

        let actions = self
            .death_rate
            .iter()
            .map(|&death| match WeightedIndex::new([death, duplicate, movement]) {
                Ok(weights) => DRAWN_ACTIONS[weights.sample(rng)],
                // all weights zero: nothing can happen
                Err(_) => Action::Idle,
            })
            .collect();
        self.actions = actions;
    }

    /// Displaces every agent whose action is `Move` by one shared offset.
    ///
    /// The offset has a Gaussian magnitude and a uniform direction and is drawn
    /// once per call. Moves that leave the surface, cross more than one strip
    /// boundary or leave a coated strip are rejected per agent. Returns the
    /// number of accepted moves.
    pub fn apply_movement<R: Rng>(&mut self, ctx: &StepContext<'_>, rng: &mut R) -> Result<usize, SimError> {
        if !self.actions.contains(&Action::Move) {
            return Ok(0);
        }

        let behavior = ctx.behavior;
        let magnitude = Normal::new(behavior.step_mean, behavior.step_std)
            .map_err(|e| SimError::config(format!("displacement distribution: {e}")))?
            .sample(rng);
        let angle = rng.gen_range(0.0..TAU);
        let offset = Vector2::new(magnitude * angle.cos(), magnitude * angle.sin());

        let mut moved = 0;
        for i in 0..self.len() {
            if self.actions[i] != Action::Move {
                continue;
            }
            let candidate = self.points[i] + offset;
            if let Some(region) = ctx.habitat.admit(self.regions[i], &candidate) {
                self.points[i] = candidate;
                self.regions[i] = region;
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Every `Duplicate` agent spawns one offspring near itself.
    ///
    /// Offspring positions are drawn as a batch and the whole batch is redrawn
    /// until every offspring is admitted by the habitat relative to its
    /// parent's region. Accepted offspring are appended, neighbours and
    /// strengths are recomputed, then each offspring tries to eat once.
    /// Returns the number of offspring.
    pub fn duplicate<R: Rng>(
        &mut self,
        ctx: &StepContext<'_>,
        food: &mut FoodPool,
        rng: &mut R,
    ) -> Result<usize, SimError> {
        let parents: Vec<usize> = (0..self.len())
            .filter(|&i| self.actions[i] == Action::Duplicate)
            .collect();
        if parents.is_empty() {
            return Ok(0);
        }

        let behavior = ctx.behavior;
        let attempts = behavior.limits.placement_attempts;
        let offspring = (0..attempts)
            .find_map(|_| {
                parents
                    .iter()
                    .map(|&parent| {
                        let position = sample_in_disk(&self.points[parent], behavior.born_radius, rng);
                        ctx.habitat
                            .admit(self.regions[parent], &position)
                            .map(|region| (position, region))
                    })
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or(SimError::PlacementExhausted { colony: self.id, attempts })?;

        let first_born = self.len();
        for (position, region) in offspring {
            self.push_agent(position, region, ctx.step);
        }

        self.compute_neighbours()?;
        self.update_strength_and_age(ctx.step, ctx.colony_count, behavior.strength_policy);
        self.feed_range(first_born..self.len(), ctx.step, food, behavior, rng);

        Ok(self.len() - first_born)
    }

    /// Removes every agent whose action is `Die`; returns how many died.
    pub fn die(&mut self) -> usize {
        let keep: Vec<bool> = self.actions.iter().map(|a| *a != Action::Die).collect();
        let before = self.len();
        self.compact(&keep);
        before - self.len()
    }

    /// Removes the agents at `indices` in one compaction.
    pub fn remove_agents(&mut self, indices: &[usize]) -> usize {
        let mut keep = vec![true; self.len()];
        for &i in indices {
            if let Some(flag) = keep.get_mut(i) {
                *flag = false;
            }
        }
        let before = self.len();
        self.compact(&keep);
        before - self.len()
    }

    /// Keeps the agents flagged in `keep`, preserving their relative order.
    ///
    /// Returns the old → new index map (`None` for removed agents).
    pub fn compact(&mut self, keep: &[bool]) -> Vec<Option<usize>> {
        debug_assert_eq!(keep.len(), self.len());

        retain_by(&mut self.points, keep);
        retain_by(&mut self.neighbours, keep);
        retain_by(&mut self.death_rate, keep);
        retain_by(&mut self.actions, keep);
        retain_by(&mut self.ages, keep);
        retain_by(&mut self.strength, keep);
        retain_by(&mut self.last_meal, keep);
        retain_by(&mut self.regions, keep);
        retain_by(&mut self.birth_step, keep);

        let mut next = 0;
        keep.iter()
            .map(|&kept| {
                kept.then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    }

    /// Recomputes age and strength of every agent.
    ///
    /// `strength = 10 / age + sqrt(colony_count) + 10 / steps_since_meal`,
    /// where the feeding term is zero for agents that never ate.
    pub fn update_strength_and_age(&mut self, step: u64, colony_count: usize, policy: DenominatorPolicy) {
        let crowding = (colony_count as f64).sqrt();

        self.ages = self.birth_step.iter().map(|&born| step.saturating_sub(born)).collect();
        self.strength = self
            .ages
            .iter()
            .zip(&self.last_meal)
            .map(|(&age, meal)| {
                let youth = 10.0 / policy.apply(age as f64);
                let feeding = match meal {
                    Some(t) => 10.0 / policy.apply(step.saturating_sub(*t) as f64),
                    None => 0.0,
                };
                youth + crowding + feeding
            })
            .collect();
    }

    /// Appends every agent of `other` after this colony's agents.
    pub fn merge(&mut self, other: Colony) {
        self.points.extend(other.points);
        self.neighbours.extend(other.neighbours);
        self.death_rate.extend(other.death_rate);
        self.actions.extend(other.actions);
        self.ages.extend(other.ages);
        self.strength.extend(other.strength);
        self.last_meal.extend(other.last_meal);
        self.regions.extend(other.regions);
        self.birth_step.extend(other.birth_step);
    }

    /// Returns true if every per-agent vector has the same length.
    pub fn is_aligned(&self) -> bool {
        let n = self.points.len();
        [
            self.neighbours.len(),
            self.death_rate.len(),
            self.actions.len(),
            self.ages.len(),
            self.strength.len(),
            self.last_meal.len(),
            self.regions.len(),
            self.birth_step.len(),
        ]
        .iter()
        .all(|&len| len == n)
    }
}

fn retain_by<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    values.retain(|_| flags.next().copied().unwrap_or(false));
}
