use crate::agents::{Agent, PursuedStrategy, PursuerStrategy};
use crate::error::{Error, Result};
use crate::game::{Game, GameConfig, GameRng, PlayerKey};
use crate::grid::Grid;
use crate::repair::repair_map;
use crate::replay::ReplayLog;
use log::{debug, info};
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLES: usize = 5;
pub const MAX_SAMPLES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub pursued_strategy: PursuedStrategy,
    pub pursuer_strategy: PursuerStrategy,
    /// Games played per evaluation. Zero is treated as one; more than
    /// [`MAX_SAMPLES`] is rejected.
    pub samples: usize,
    pub seed: u64,
    #[serde(flatten)]
    pub game: GameConfig,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            pursued_strategy: PursuedStrategy::default(),
            pursuer_strategy: PursuerStrategy::default(),
            samples: DEFAULT_SAMPLES,
            seed: 0,
            game: GameConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub average_score: f64,
    pub scores: Vec<u32>,
    /// Cells changed while repairing the candidate map.
    pub repairs: usize,
    /// Log of the game whose score is closest to the average.
    pub replay: ReplayLog,
}

impl Evaluation {
    /// Map evolution minimizes how well the pursued side does.
    pub fn fitness(&self) -> f64 {
        -self.average_score
    }
}

/// Reads a flat row-major genome (0 open, 1 wall) as a map.
pub fn translate_genome(genome: &[u8], width: usize, height: usize) -> Result<Grid> {
    let grid = Grid::from_genome(genome, width, height)?;
    debug!(
        "translated {}x{} genome with {} walls",
        width,
        height,
        grid.walls().count()
    );
    Ok(grid)
}

/// Translates and repairs a candidate map, then plays `settings.samples`
/// independent games on it in parallel.
pub fn evaluate(
    genome: &[u8],
    width: usize,
    height: usize,
    settings: &EvaluationSettings,
) -> Result<Evaluation> {
    if settings.samples > MAX_SAMPLES {
        return Err(Error::TooManySamples {
            requested: settings.samples,
            max: MAX_SAMPLES,
        });
    }
    let mut grid = translate_genome(genome, width, height)?;
    let repairs = repair_map(&mut grid);

    let samples = settings.samples.max(1);
    let results: Vec<(u32, ReplayLog)> = (0..samples)
        .into_par_iter()
        .map(|i| {
            let seed = settings.seed.wrapping_add(i as u64);
            play(grid.clone(), settings, seed)
        })
        .collect::<Result<_>>()?;

    let scores: Vec<u32> = results.iter().map(|(score, _)| *score).collect();
    let average_score = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / samples as f64;

    // first sample nearest the mean
    let mut representative = 0;
    for (i, score) in scores.iter().enumerate() {
        let best = (f64::from(scores[representative]) - average_score).abs();
        if (f64::from(*score) - average_score).abs() < best {
            representative = i;
        }
    }
    let replay = results
        .into_iter()
        .nth(representative)
        .map(|(_, log)| log)
        .unwrap_or_default();

    info!(
        "evaluated {}x{} map: {} repairs, average score {:.2} over {} games",
        width, height, repairs, average_score, samples
    );

    Ok(Evaluation {
        average_score,
        scores,
        repairs,
        replay,
    })
}

/// Plays one game to completion and returns its final score and log.
/// The engine and the agents draw from separately seeded generators.
pub fn play(grid: Grid, settings: &EvaluationSettings, seed: u64) -> Result<(u32, ReplayLog)> {
    let mut game = Game::create(grid, settings.game.clone(), seed)?;
    let mut rng = GameRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);

    let mut agents: Vec<(PlayerKey, Box<dyn Agent>)> = game
        .keys()
        .map(|key| {
            let agent = if key.is_pursued() {
                settings.pursued_strategy.build()
            } else {
                settings.pursuer_strategy.build()
            };
            (key, agent)
        })
        .collect();

    while !game.is_over() {
        for (key, agent) in agents.iter_mut() {
            if game.is_caught(*key) || game.legal_actions(*key).is_empty() {
                continue;
            }
            let action = agent.select_action(&game, *key, &mut rng);
            game.register_action(*key, action)?;
        }
        game.step()?;
    }

    debug!(
        "game {} finished with score {} after {} ticks",
        seed,
        game.score(),
        game.log().ticks()
    );
    Ok((game.score(), game.log().clone()))
}

/// Convenience for callers holding strategy names rather than typed values.
pub fn settings_for(pursued: &str, pursuer: &str) -> Result<EvaluationSettings> {
    Ok(EvaluationSettings {
        pursued_strategy: pursued.parse()?,
        pursuer_strategy: pursuer.parse()?,
        ..EvaluationSettings::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PillPlacement;
    use crate::grid::Position;
    use crate::replay::ReplayRecord;

    fn cross_genome(size: usize) -> Vec<u8> {
        let grid = Grid::cross(size).unwrap();
        grid.positions()
            .map(|p| if grid.is_wall(p) { 1 } else { 0 })
            .collect()
    }

    #[test]
    fn genome_is_read_row_major() {
        let grid = translate_genome(&[0, 1, 0, 0, 0, 1], 3, 2).unwrap();
        assert!(grid.is_wall(Position::new(1, 0)));
        assert!(grid.is_wall(Position::new(2, 1)));
        assert!(grid.is_open(Position::new(0, 1)));
    }

    #[test]
    fn malformed_genomes_are_rejected() {
        assert_eq!(
            translate_genome(&[0, 0, 0], 2, 2),
            Err(Error::GenomeLength {
                expected: 4,
                actual: 3,
                width: 2,
                height: 2
            })
        );
        assert_eq!(
            translate_genome(&[0, 2, 0, 0], 2, 2),
            Err(Error::InvalidCell { index: 1, label: 2 })
        );
    }

    #[test]
    fn oversized_maps_fail_before_repair() {
        let huge = usize::MAX / 2 + 1;
        assert_eq!(
            evaluate(&[], huge, 2, &EvaluationSettings::default()),
            Err(Error::MapTooLarge {
                width: huge,
                height: 2
            })
        );
    }

    #[test]
    fn sample_count_is_bounded() {
        let settings = EvaluationSettings {
            samples: MAX_SAMPLES + 1,
            ..EvaluationSettings::default()
        };
        assert_eq!(
            evaluate(&[0, 0, 0, 0], 2, 2, &settings),
            Err(Error::TooManySamples {
                requested: MAX_SAMPLES + 1,
                max: MAX_SAMPLES
            })
        );
    }

    #[test]
    fn evaluation_is_reproducible() {
        let genome = cross_genome(9);
        let settings = EvaluationSettings {
            pursuer_strategy: PursuerStrategy::Chase,
            seed: 42,
            ..EvaluationSettings::default()
        };
        let a = evaluate(&genome, 9, 9, &settings).unwrap();
        let b = evaluate(&genome, 9, 9, &settings).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.scores.len(), DEFAULT_SAMPLES);
        assert_eq!(a.repairs, 0);
        assert_eq!(a.fitness(), -a.average_score);
    }

    #[test]
    fn representative_replay_is_closest_to_the_mean() {
        let genome = cross_genome(9);
        let settings = EvaluationSettings {
            samples: 7,
            seed: 3,
            ..EvaluationSettings::default()
        };
        let eval = evaluate(&genome, 9, 9, &settings).unwrap();

        let final_score = eval
            .replay
            .records()
            .iter()
            .rev()
            .find_map(|r| match r {
                ReplayRecord::Time { score, .. } => Some(*score),
                _ => None,
            })
            .unwrap();
        let gap = |s: u32| (f64::from(s) - eval.average_score).abs();
        assert!(eval.scores.iter().all(|s| gap(final_score) <= gap(*s)));
    }

    #[test]
    fn uncatchable_pill_seeker_scores_with_bonus() {
        // no pursuers and a single pill one step away
        let genome = vec![0, 0, 0, 0];
        let settings = EvaluationSettings {
            samples: 1,
            game: GameConfig {
                num_pursuers: 0,
                fruit_probability: 0.0,
                pill_placement: PillPlacement::Fixed(vec![Position::new(0, 0)]),
                ..GameConfig::default()
            },
            ..EvaluationSettings::default()
        };
        let eval = evaluate(&genome, 2, 2, &settings).unwrap();
        // 8 ticks on the clock, one used: 100 + floor(100 * 7 / 8)
        assert_eq!(eval.scores, vec![187]);
        assert_eq!(eval.replay.ticks(), 1);
    }

    #[test]
    fn disconnected_maps_are_repaired_before_play() {
        #[rustfmt::skip]
        let genome = vec![
            0, 0, 1, 0, 0,
            0, 0, 1, 0, 0,
            0, 0, 1, 0, 0,
        ];
        let eval = evaluate(&genome, 5, 3, &EvaluationSettings::default()).unwrap();
        assert_eq!(eval.repairs, 1);
    }

    #[test]
    fn strategy_names_are_checked_up_front() {
        assert_eq!(
            settings_for("pill", "teleport"),
            Err(Error::UnknownPursuerStrategy("teleport".to_string()))
        );
        assert_eq!(
            settings_for("dance", "chase"),
            Err(Error::UnknownPursuedStrategy("dance".to_string()))
        );
        let s = settings_for("avoid", "chase").unwrap();
        assert_eq!(s.pursued_strategy, PursuedStrategy::Avoid);
        assert_eq!(s.samples, DEFAULT_SAMPLES);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let s: EvaluationSettings =
            serde_json::from_str(r#"{"pursuer_strategy":"chase","num_pursuers":1}"#).unwrap();
        assert_eq!(s.pursuer_strategy, PursuerStrategy::Chase);
        assert_eq!(s.pursued_strategy, PursuedStrategy::Pill);
        assert_eq!(s.game.num_pursuers, 1);
        assert_eq!(s.samples, DEFAULT_SAMPLES);
    }
}
