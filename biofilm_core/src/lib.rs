//! Biofilm Core - colony engine for bacterial populations on strip-coated surfaces
//!
//! Colonies of point agents live on a rectangle cut into alternating coated and
//! uncoated strips. Each step the engine:
//! 1. **Resolves overlaps**: colonies whose hulls intersect merge (same tag) or
//!    fight (different tags) until no pair overlaps
//! 2. **Senses and decides**: tessellation neighbour counts, eating, starvation
//!    hazard and a weighted action draw per agent
//! 3. **Acts**: region-constrained movement, batch duplication, then death

pub mod colony;
pub mod conflict;
pub mod error;
pub mod fight;
pub mod food;
pub mod geometry;
pub mod params;
pub mod tessellation;

// Re-export key types for convenience
pub use colony::{Action, Colony, ColonyId, ColonyMap, StepContext};
pub use conflict::{ConflictResolver, Overlap, Resolution};
pub use error::SimError;
pub use fight::{survival_probability, Contender, Duel, FightEngine, FightOutcome};
pub use food::FoodPool;
pub use geometry::{
    is_coated, sample_in_disk, transition_allowed, ConvexPolygon, Habitat, Position, StripLayout, Surface,
};
pub use params::{
    BehaviorParams, ColonyRates, DenominatorPolicy, EatRule, RelationshipMode, RetryLimits, SmallColonyPolicy,
};
pub use tessellation::neighbour_counts;
