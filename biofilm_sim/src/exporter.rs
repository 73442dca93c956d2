//! JSON exporter for run playback.
//!
//! Exports one frame per step with every colony's agents and the food left,
//! for rendering outside the simulator.

use crate::error::RunError;
use crate::world::{RunOutcome, SimWorld};

use biofilm_core::{Colony, Position, Surface};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A point on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointXY {
    pub x: f64,
    pub y: f64,
}

impl From<&Position> for PointXY {
    fn from(p: &Position) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Agents of one colony at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyFrame {
    pub id: u32,
    pub relationship: u32,
    pub agents: Vec<PointXY>,
}

impl From<&Colony> for ColonyFrame {
    fn from(colony: &Colony) -> Self {
        Self {
            id: colony.id().0,
            relationship: colony.relationship(),
            agents: colony.points().iter().map(PointXY::from).collect(),
        }
    }
}

/// A single frame of simulation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    /// Steps completed when the frame was taken
    pub step: u64,

    pub colonies: Vec<ColonyFrame>,

    /// Food units still on the surface
    pub food: Vec<PointXY>,
}

impl SimFrame {
    /// Snapshot of the world as it is now.
    pub fn capture(world: &SimWorld) -> Self {
        Self {
            step: world.current_step(),
            colonies: world.colonies().values().map(ColonyFrame::from).collect(),
            food: world.food().units().iter().map(PointXY::from).collect(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimExport {
    /// Relationship mode name
    pub mode: String,

    /// Seed used
    pub seed: u64,

    pub surface: Surface,

    /// Strip boundaries along y
    pub boundaries: Vec<f64>,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// How the run ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
}

impl SimExport {
    /// Creates an export for `world`, seeded with its current state as the first frame.
    pub fn new(world: &SimWorld) -> Self {
        let config = world.config();
        Self {
            mode: config.mode.name().to_string(),
            seed: config.seed,
            surface: world.habitat().surface,
            boundaries: world.habitat().strips.boundaries().to_vec(),
            frames: vec![SimFrame::capture(world)],
            outcome: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    /// Records how the run ended.
    pub fn finalize(&mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), RunError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
