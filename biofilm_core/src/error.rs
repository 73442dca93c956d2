//! Error types for the colony engine.

use crate::colony::ColonyId;
use thiserror::Error;

/// Errors raised while configuring or stepping a colony simulation.
///
/// Empty colonies and total extinction are ordinary terminal states and are
/// never reported through this type.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// A parameter is out of range or inconsistent with the surface.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Coordinates the tessellation cannot handle (NaN, infinite, too large).
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Offspring batch could not be placed inside the allowed regions.
    #[error("Unsatisfiable placement: colony {colony} found no valid offspring batch in {attempts} attempts")]
    PlacementExhausted { colony: ColonyId, attempts: u32 },

    /// No contender set without a repeated agent could be drawn.
    #[error("Fight draw exhausted: no unique contender set in {attempts} attempts")]
    FightExhausted { attempts: u32 },

    /// The overlap fixpoint kept finding work past its pass budget.
    #[error("Overlap resolution did not settle within {passes} passes")]
    ResolverDiverged { passes: u32 },
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }
}
