//! Behavioural parameters shared by every colony of a run.

use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Per-colony rates feeding the three-way action draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyRates {
    /// Weight of the duplicate action
    pub duplicate_rate: f64,

    /// Weight of the move action
    pub move_rate: f64,

    /// Hazard of an isolated, starved agent
    pub base_death_rate: f64,
}

impl Default for ColonyRates {
    fn default() -> Self {
        Self {
            duplicate_rate: 5.0,
            move_rate: 50.0,
            base_death_rate: 5.0,
        }
    }
}

impl ColonyRates {
    /// Checks that every rate is finite and non-negative.
    pub fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("duplicate_rate", self.duplicate_rate),
            ("move_rate", self.move_rate),
            ("base_death_rate", self.base_death_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::config(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        Ok(())
    }
}

/// How colonies relate when their hulls overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipMode {
    /// Overlapping colonies merge
    #[default]
    Cooperative,

    /// Overlapping colonies fight
    Competitive,
}

impl RelationshipMode {
    /// Relationship tag for the colony created at `index`.
    ///
    /// Cooperative colonies share tag 0; competitive colonies each get a
    /// unique non-zero tag.
    pub fn tag_for(&self, index: usize) -> u32 {
        match self {
            RelationshipMode::Cooperative => 0,
            RelationshipMode::Competitive => index as u32 + 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RelationshipMode::Cooperative => "cooperative",
            RelationshipMode::Competitive => "competitive",
        }
    }
}

impl std::fmt::Display for RelationshipMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RelationshipMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cooperative" | "synergistic" | "merge" => Ok(RelationshipMode::Cooperative),
            "competitive" | "fight" => Ok(RelationshipMode::Competitive),
            _ => Err(format!("Unknown relationship mode: {}", s)),
        }
    }
}

/// Which food units an agent may pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EatRule {
    /// Units strictly farther than the eat distance are eligible
    #[default]
    Beyond,

    /// Units at most the eat distance away are eligible
    Within,
}

impl EatRule {
    /// Returns true if a unit at `distance` is eligible under this rule.
    pub fn admits(&self, distance: f64, eat_distance: f64) -> bool {
        match self {
            EatRule::Beyond => distance > eat_distance,
            EatRule::Within => distance <= eat_distance,
        }
    }
}

/// Treatment of the `10 / age` and `10 / steps-since-eat` strength terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominatorPolicy {
    /// Denominators below one are raised to one
    #[default]
    ClampToOne,

    /// Raw division; a zero denominator gives an infinite term
    Propagate,
}

impl DenominatorPolicy {
    pub fn apply(&self, denominator: f64) -> f64 {
        match self {
            DenominatorPolicy::ClampToOne => denominator.max(1.0),
            DenominatorPolicy::Propagate => denominator,
        }
    }
}

/// Overlap handling for colonies too small to form a hull (≤ 3 agents).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmallColonyPolicy {
    /// Small colonies never merge or fight
    #[default]
    Ignore,

    /// Small colonies conflict when any agent pair is within `reach`
    Proximity { reach: f64 },
}

/// Caps on every rejection loop and on the overlap fixpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryLimits {
    /// Offspring batch resamples per duplication
    pub placement_attempts: u32,

    /// Contender batch redraws per fight pass
    pub fight_draws: u32,

    /// Merge/fight passes per overlap resolution
    pub resolver_passes: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            placement_attempts: 10_000,
            fight_draws: 10_000,
            resolver_passes: 1_000_000,
        }
    }
}

/// Agent behaviour knobs, constant for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorParams {
    /// Reach used by the eating predicate
    pub eat_distance: f64,

    /// Eating predicate
    pub eat_rule: EatRule,

    /// Mean of the displacement magnitude
    pub step_mean: f64,

    /// Standard deviation of the displacement magnitude
    pub step_std: f64,

    /// Radius of the disk offspring are placed in
    pub born_radius: f64,

    /// Steps after a meal before an agent counts as starved again
    pub starvation_window: u64,

    /// Strength denominator handling
    pub strength_policy: DenominatorPolicy,

    /// Conflict handling for colonies without a hull
    pub small_colony_policy: SmallColonyPolicy,

    /// Retry caps
    pub limits: RetryLimits,
}

impl Default for BehaviorParams {
    fn default() -> Self {
        Self {
            eat_distance: 1.0,
            eat_rule: EatRule::default(),
            step_mean: 0.0,
            step_std: 1.0,
            born_radius: 0.001,
            starvation_window: 10,
            strength_policy: DenominatorPolicy::default(),
            small_colony_policy: SmallColonyPolicy::default(),
            limits: RetryLimits::default(),
        }
    }
}

impl BehaviorParams {
    /// Checks ranges; called once before any step runs.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.eat_distance.is_finite() || self.eat_distance < 0.0 {
            return Err(SimError::config(format!("eat_distance must be finite and >= 0, got {}", self.eat_distance)));
        }
        if !self.step_mean.is_finite() {
            return Err(SimError::config("step_mean must be finite"));
        }
        if !self.step_std.is_finite() || self.step_std < 0.0 {
            return Err(SimError::config(format!("step_std must be finite and >= 0, got {}", self.step_std)));
        }
        if !self.born_radius.is_finite() || self.born_radius < 0.0 {
            return Err(SimError::config(format!("born_radius must be finite and >= 0, got {}", self.born_radius)));
        }
        if let SmallColonyPolicy::Proximity { reach } = self.small_colony_policy {
            if !reach.is_finite() || reach < 0.0 {
                return Err(SimError::config(format!("proximity reach must be finite and >= 0, got {reach}")));
            }
        }
        let limits = &self.limits;
        if limits.placement_attempts == 0 || limits.fight_draws == 0 || limits.resolver_passes == 0 {
            return Err(SimError::config("retry limits must be at least 1"));
        }
        Ok(())
    }
}
