//! Fight Engine - one duel per hostile overlapping pair.
//!
//! A pass draws one contender from each side of every pair, checks that no
//! agent was drawn twice, resolves every duel independently and finally
//! removes all losers, one compaction per colony.

use crate::colony::{ColonyId, ColonyMap};
use crate::error::SimError;
use crate::geometry::Position;
use crate::params::{BehaviorParams, DenominatorPolicy};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One agent drawn into a duel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contender {
    pub colony: ColonyId,
    pub index: usize,
    pub position: Position,
    pub strength: f64,
}

impl Contender {
    fn same_agent(&self, other: &Contender) -> bool {
        (self.colony, self.index) == (other.colony, other.index) || self.position == other.position
    }
}

/// Result of a single duel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Duel {
    pub challenger: Contender,
    pub defender: Contender,
    pub challenger_won: bool,
}

impl Duel {
    pub fn winner(&self) -> &Contender {
        if self.challenger_won {
            &self.challenger
        } else {
            &self.defender
        }
    }

    pub fn loser(&self) -> &Contender {
        if self.challenger_won {
            &self.defender
        } else {
            &self.challenger
        }
    }
}

/// Everything one fight pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FightOutcome {
    pub duels: Vec<Duel>,

    /// Colonies emptied by the pass, already deleted from the map
    pub eliminated: Vec<ColonyId>,
}

/// Probability that an agent of strength `own` survives against `rival`.
///
/// Infinite strength beats finite strength and two infinite strengths are an
/// even draw, as is a pair whose strengths sum to zero.
pub fn survival_probability(own: f64, rival: f64) -> f64 {
    match (own.is_infinite(), rival.is_infinite()) {
        (true, true) => 0.5,
        (true, false) => 1.0,
        (false, true) => 0.0,
        (false, false) => {
            let total = own + rival;
            if total > 0.0 {
                own / total
            } else {
                0.5
            }
        }
    }
}

/// Resolves a batch of hostile pairs.
#[derive(Debug, Clone)]
pub struct FightEngine {
    policy: DenominatorPolicy,
    max_draws: u32,
}

impl FightEngine {
    pub fn new(behavior: &BehaviorParams) -> Self {
        Self {
            policy: behavior.strength_policy,
            max_draws: behavior.limits.fight_draws,
        }
    }

    /// Fights every pair in `pairs` once.
    ///
    /// Pairs naming a missing or empty colony are skipped.
    pub fn fight<R: Rng>(
        &self,
        step: u64,
        colonies: &mut ColonyMap,
        pairs: &[(ColonyId, ColonyId)],
        rng: &mut R,
    ) -> Result<FightOutcome, SimError> {
        let colony_count = colonies.len();
        for colony in colonies.values_mut() {
            colony.update_strength_and_age(step, colony_count, self.policy);
        }

        let contenders = self.draw_contenders(colonies, pairs, rng)?;

        let duels: Vec<Duel> = contenders
            .into_iter()
            .map(|(challenger, defender)| {
                let p = survival_probability(challenger.strength, defender.strength);
                Duel {
                    challenger,
                    defender,
                    challenger_won: rng.gen::<f64>() < p,
                }
            })
            .collect();

        let mut losers: BTreeMap<ColonyId, Vec<usize>> = BTreeMap::new();
        for duel in &duels {
            let loser = duel.loser();
            losers.entry(loser.colony).or_default().push(loser.index);
        }

        let mut eliminated = Vec::new();
        for (id, indices) in losers {
            let Some(colony) = colonies.get_mut(&id) else {
                continue;
            };
            colony.remove_agents(&indices);
            if colony.is_empty() {
                colonies.remove(&id);
                eliminated.push(id);
            }
        }

        debug!(
            "Fight pass at step {}: {} duels, {} colonies eliminated",
            step,
            duels.len(),
            eliminated.len()
        );

        Ok(FightOutcome { duels, eliminated })
    }

    /// Draws one contender per side of every live pair.
    ///
    /// The whole batch is redrawn until no agent appears twice, up to the
    /// configured number of draws. A colony with fewer agents than the pairs
    /// it takes part in fails before any draw.
    pub fn draw_contenders<R: Rng>(
        &self,
        colonies: &ColonyMap,
        pairs: &[(ColonyId, ColonyId)],
        rng: &mut R,
    ) -> Result<Vec<(Contender, Contender)>, SimError> {
        let live: Vec<_> = pairs
            .iter()
            .filter_map(|(a, b)| {
                let a = colonies.get(a).filter(|c| !c.is_empty())?;
                let b = colonies.get(b).filter(|c| !c.is_empty())?;
                Some((a, b))
            })
            .collect();

        // a colony drawn into more duels than it has agents can never give a unique batch
        let mut appearances: BTreeMap<ColonyId, usize> = BTreeMap::new();
        for (a, b) in &live {
            *appearances.entry(a.id()).or_default() += 1;
            *appearances.entry(b.id()).or_default() += 1;
        }
        if let Some((id, count)) = appearances
            .iter()
            .find(|(id, count)| colonies.get(id).is_some_and(|c| **count > c.len()))
        {
            debug!("Colony {} appears in {} duels, no unique contender set exists", id, count);
            return Err(SimError::FightExhausted { attempts: 0 });
        }

        for _ in 0..self.max_draws {
            let batch: Vec<(Contender, Contender)> = live
                .iter()
                .map(|(a, b)| {
                    let ia = rng.gen_range(0..a.len());
                    let ib = rng.gen_range(0..b.len());
                    (
                        Contender {
                            colony: a.id(),
                            index: ia,
                            position: a.points()[ia],
                            strength: a.strengths()[ia],
                        },
                        Contender {
                            colony: b.id(),
                            index: ib,
                            position: b.points()[ib],
                            strength: b.strengths()[ib],
                        },
                    )
                })
                .collect();

            if contenders_unique(&batch) {
                return Ok(batch);
            }
        }

        Err(SimError::FightExhausted { attempts: self.max_draws })
    }
}

/// Returns true if no agent appears twice across the batch.
pub fn contenders_unique(batch: &[(Contender, Contender)]) -> bool {
    let all: Vec<&Contender> = batch.iter().flat_map(|(a, b)| [a, b]).collect();
    all.iter()
        .enumerate()
        .all(|(i, c)| all[i + 1..].iter().all(|d| !c.same_agent(d)))
}
