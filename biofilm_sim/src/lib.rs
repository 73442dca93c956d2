//! Biofilm Simulation Harness
//!
//! Drives the colony engine through whole runs and sweeps strip geometries to
//! find the layouts under which colonies survive longest.
//!
//! # Core Principle: One Seed per Run
//!
//! Every source of randomness in a run is derived from a single 64-bit seed:
//! - **Colonies**: centers, initial agents, action draws, movement, offspring, fights
//! - **Food**: initial drop, from a seed derived with a fixed odd multiplier
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SweepRunner                          │
//! │   StripSweep ──► StripSpec × trials ──► SimConfig           │
//! │                                            │                │
//! │  ┌─────────────────────────────────────────▼──────────────┐ │
//! │  │                       SimWorld                         │ │
//! │  │  ConflictResolver ─► sense/decide ─► act ─► terminate? │ │
//! │  │        │                                               │ │
//! │  │   ┌────▼─────┐   ┌──────────┐   ┌──────────┐           │ │
//! │  │   │ Colony 0 │   │ Colony 1 │   │ FoodPool │   ...     │ │
//! │  │   └──────────┘   └──────────┘   └──────────┘           │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use biofilm_sim::{SimConfig, SimWorld};
//!
//! let config = SimConfig {
//!     seed: 42,
//!     colonies: 3,
//!     ..Default::default()
//! };
//!
//! let mut world = SimWorld::new(config)?;
//! let outcome = world.run()?;
//! ```

mod error;
pub mod exporter;
pub mod runner;
pub mod sweep;
mod world;

pub use error::RunError;
pub use exporter::{ColonyFrame, PointXY, SimExport, SimFrame};
pub use runner::{SweepRow, SweepRunner, TrialRecord};
pub use sweep::{StripSpec, StripSweep};
pub use world::{NoClearReason, RunOutcome, SimConfig, SimWorld, StepReport};
