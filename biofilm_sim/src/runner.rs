//! Sweep runner - repeated trials of every strip geometry.

use crate::sweep::{StripSpec, StripSweep};
use crate::world::{RunOutcome, SimConfig, SimWorld};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialRecord {
    Finished { seed: u64, outcome: RunOutcome },

    /// The run stopped on an error (e.g. an unsatisfiable placement)
    Failed { seed: u64, error: String },
}

impl TrialRecord {
    pub fn seed(&self) -> u64 {
        match self {
            TrialRecord::Finished { seed, .. } | TrialRecord::Failed { seed, .. } => *seed,
        }
    }

    /// Half-life step, `None` when the trial had no definitive outcome.
    pub fn half_life(&self) -> Option<u64> {
        match self {
            TrialRecord::Finished { outcome, .. } => outcome.half_life(),
            TrialRecord::Failed { .. } => None,
        }
    }
}

/// All trials of one strip geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub spec: StripSpec,
    pub trials: Vec<TrialRecord>,
}

impl SweepRow {
    pub fn half_lives(&self) -> Vec<Option<u64>> {
        self.trials.iter().map(TrialRecord::half_life).collect()
    }

    /// Mean over the trials that reached a half-life.
    pub fn mean_half_life(&self) -> Option<f64> {
        let steps: Vec<u64> = self.trials.iter().filter_map(TrialRecord::half_life).collect();
        if steps.is_empty() {
            return None;
        }
        Some(steps.iter().sum::<u64>() as f64 / steps.len() as f64)
    }
}

/// Runs trials of a base configuration under different strip geometries.
pub struct SweepRunner {
    /// Configuration every trial starts from
    base: SimConfig,

    /// Trials per geometry
    trials: usize,
}

impl SweepRunner {
    /// Creates a runner doing one trial per geometry.
    pub fn new(base: SimConfig) -> Self {
        Self { base, trials: 1 }
    }

    /// Sets the number of trials per geometry.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Configuration of trial `trial` under `spec`.
    pub fn trial_config(&self, spec: &StripSpec, trial: usize) -> SimConfig {
        SimConfig {
            seed: self.base.seed.wrapping_add(trial as u64),
            coated_strips: spec.coated_strips,
            coated_width: spec.coated_width,
            ..self.base.clone()
        }
    }

    /// Runs every trial of one geometry.
    pub fn run_spec(&self, spec: &StripSpec) -> SweepRow {
        let trials = (0..self.trials)
            .map(|trial| {
                let config = self.trial_config(spec, trial);
                let seed = config.seed;
                match SimWorld::new(config).and_then(|mut world| world.run()) {
                    Ok(outcome) => {
                        debug!("  {} trial {} (seed={}): {}", spec, trial, seed, outcome);
                        TrialRecord::Finished { seed, outcome }
                    }
                    Err(e) => {
                        warn!("  {} trial {} (seed={}) failed: {}", spec, trial, seed, e);
                        TrialRecord::Failed {
                            seed,
                            error: e.to_string(),
                        }
                    }
                }
            })
            .collect();

        SweepRow { spec: *spec, trials }
    }

    /// Runs the whole sweep, geometry by geometry.
    pub fn run(&self, sweep: &StripSweep) -> Vec<SweepRow> {
        let specs = sweep.specs();
        info!(
            "Sweeping {} strip geometries × {} trials (seed={})",
            specs.len(),
            self.trials,
            self.base.seed
        );

        specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let row = self.run_spec(spec);
                match row.mean_half_life() {
                    Some(mean) => info!("[{}/{}] {} → mean half-life {:.1}", i + 1, specs.len(), spec, mean),
                    None => info!("[{}/{}] {} → no half-life", i + 1, specs.len(), spec),
                }
                row
            })
            .collect()
    }
}
