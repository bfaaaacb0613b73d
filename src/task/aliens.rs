//! Aliens task: feed each sad alien the item it wants in the current season.
//!
//! A generated run schedules the phases listed in
//! [`TaskConfig::alien_phases`] in order (the first three by default):
//!
//! | Phase | Structure |
//! |-------|-----------|
//! | 1InitialLearning | 3 cycles over shuffled contexts, 13 shuffled repetitions of the 4 aliens per block |
//! | 2CloudySeason | every (context, alien) pair 10 times, fully interleaved |
//! | Refresher2 | 2 cycles over shuffled contexts, 7 repetitions per block |
//! | Refresher3 | as Refresher2 |

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::record::TrialLog;
use crate::types::{Phase, Stimulus, TaskDims};

use super::TaskConfig;

pub struct AlienTask {
    trials: Vec<(Phase, Stimulus)>,
    p_reward_correct: f64,
    p_reward_incorrect: f64,
    current: Option<Stimulus>,
    rng: SmallRng,
}

/// Correct item for `alien` in `context`.
pub fn correct_action(stimulus: Stimulus) -> usize {
    CORRECT_ACTION[CONTEXT_TASK_SET[stimulus.context]][stimulus.alien]
}

fn block_phase(
    trials: &mut Vec<(Phase, Stimulus)>,
    phase: Phase,
    n_cycles: usize,
    n_reps: usize,
    rng: &mut SmallRng,
) {
    for _ in 0..n_cycles {
        let mut contexts: Vec<usize> = (0..N_CONTEXTS).collect();
        contexts.shuffle(rng);
        for &context in &contexts {
            for _ in 0..n_reps {
                let mut aliens: Vec<usize> = (0..N_ALIENS).collect();
                aliens.shuffle(rng);
                trials.extend(aliens.into_iter().map(|a| (phase, Stimulus::new(context, a))));
            }
        }
    }
}

fn interleaved_phase(trials: &mut Vec<(Phase, Stimulus)>, phase: Phase, rng: &mut SmallRng) {
    let mut block: Vec<(Phase, Stimulus)> = Vec::with_capacity(N_CONTEXTS * N_ALIENS * N_CLOUDY_REPETITIONS);
    for _ in 0..N_CLOUDY_REPETITIONS {
        for context in 0..N_CONTEXTS {
            for alien in 0..N_ALIENS {
                block.push((phase, Stimulus::new(context, alien)));
            }
        }
    }
    block.shuffle(rng);
    trials.extend(block);
}

/// Trials of one phase appended to `trials`.
fn schedule_phase(trials: &mut Vec<(Phase, Stimulus)>, phase: Phase, rng: &mut SmallRng) {
    match phase {
        Phase::InitialLearning => block_phase(
            trials,
            phase,
            N_SEASON_REPETITIONS[0],
            N_ALIEN_REPETITIONS[0],
            rng,
        ),
        Phase::CloudySeason => interleaved_phase(trials, phase, rng),
        Phase::Refresher2 => block_phase(
            trials,
            phase,
            N_SEASON_REPETITIONS[1],
            N_ALIEN_REPETITIONS[1],
            rng,
        ),
        Phase::Refresher3 => block_phase(
            trials,
            phase,
            N_SEASON_REPETITIONS[2],
            N_ALIEN_REPETITIONS[2],
            rng,
        ),
        Phase::Switching => {}
    }
}

impl AlienTask {
    /// Random schedule over the configured phases.
    pub fn generate(config: &TaskConfig, seed: u64) -> Self {
        Self::with_phases(config, &config.alien_phases, seed)
    }

    /// Random schedule over `phases`, in order. `Switching` adds no trials.
    pub fn with_phases(config: &TaskConfig, phases: &[Phase], seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut trials = Vec::new();
        for &phase in phases {
            schedule_phase(&mut trials, phase, &mut rng);
        }
        Self::with_trials(config, trials, rng)
    }

    /// Task replaying a recorded `context, sad_alien[, phase]` sequence.
    pub fn from_sequence(config: &TaskConfig, log: &TrialLog, path: &str, seed: u64) -> Result<Self> {
        let contexts = crate::data::int_column(log, "context", path)?;
        let aliens = crate::data::int_column(log, "sad_alien", path)?;
        let dims = TaskDims::aliens();
        let mut trials = Vec::with_capacity(contexts.len());
        for (row, (&context, &alien)) in contexts.iter().zip(&aliens).enumerate() {
            let stimulus = Stimulus::new(context, alien);
            dims.check_stimulus(stimulus)?;
            let phase = match log.cell("phase", row) {
                Some(name) => name.parse().map_err(|_| Error::MalformedCell {
                    path: path.to_string(),
                    line: row + 2,
                    column: "phase".to_string(),
                    value: name.to_string(),
                })?,
                None => Phase::InitialLearning,
            };
            trials.push((phase, stimulus));
        }
        Ok(Self::with_trials(config, trials, SmallRng::seed_from_u64(seed)))
    }

    fn with_trials(config: &TaskConfig, trials: Vec<(Phase, Stimulus)>, rng: SmallRng) -> Self {
        Self {
            trials,
            p_reward_correct: config.p_reward_correct,
            p_reward_incorrect: config.p_reward_incorrect,
            current: None,
            rng,
        }
    }

    pub fn n_trials(&self) -> usize {
        self.trials.len()
    }

    pub fn phase_at(&self, trial: usize) -> Phase {
        self.trials
            .get(trial)
            .map(|&(phase, _)| phase)
            .unwrap_or(Phase::InitialLearning)
    }

    /// Consecutive runs of equal phase, in order.
    pub fn phases(&self) -> Vec<(Phase, usize)> {
        let mut runs: Vec<(Phase, usize)> = Vec::new();
        for &(phase, _) in &self.trials {
            match runs.last_mut() {
                Some((last, n)) if *last == phase => *n += 1,
                _ => runs.push((phase, 1)),
            }
        }
        runs
    }

    pub fn present_stimulus(&mut self, trial: usize) -> Result<Stimulus> {
        let &(_, stimulus) = self.trials.get(trial).ok_or(Error::TrialOutOfRange {
            trial,
            len: self.trials.len(),
        })?;
        self.current = Some(stimulus);
        Ok(stimulus)
    }

    pub fn produce_reward(&mut self, action: usize) -> Result<(f64, bool)> {
        TaskDims::aliens().check_action(action)?;
        let stimulus = self.current.ok_or(Error::TrialOutOfRange {
            trial: 0,
            len: self.trials.len(),
        })?;
        let correct = action == correct_action(stimulus);
        let p = if correct {
            self.p_reward_correct
        } else {
            self.p_reward_incorrect
        };
        let reward = if self.rng.random::<f64>() < p { 1.0 } else { 0.0 };
        Ok((reward, correct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_schedule_lengths() {
        let task = AlienTask::generate(&TaskConfig::default(), 5);
        let phases = task.phases();
        assert_eq!(
            phases,
            vec![
                (Phase::InitialLearning, 3 * 3 * 13 * 4),
                (Phase::CloudySeason, 3 * 4 * 10),
                (Phase::Refresher2, 2 * 3 * 7 * 4),
            ]
        );
        assert_eq!(task.n_trials(), 468 + 120 + 168);
    }

    #[test]
    fn test_refresher3_alone() {
        let cfg = TaskConfig {
            alien_phases: vec![Phase::Refresher3],
            ..TaskConfig::default()
        };
        let task = AlienTask::generate(&cfg, 5);
        assert_eq!(task.phases(), vec![(Phase::Refresher3, 2 * 3 * 7 * 4)]);
        assert_eq!(task.phase_at(0), Phase::Refresher3);
    }

    #[test]
    fn test_phase_order_follows_config() {
        let cfg = TaskConfig::default();
        let task = AlienTask::with_phases(&cfg, &[Phase::Refresher3, Phase::CloudySeason], 1);
        assert_eq!(
            task.phases(),
            vec![(Phase::Refresher3, 168), (Phase::CloudySeason, 120)]
        );
    }

    #[test]
    fn test_cloudy_season_balanced() {
        let mut task = AlienTask::generate(&TaskConfig::default(), 9);
        let mut counts = [[0usize; N_ALIENS]; N_CONTEXTS];
        for trial in 468..588 {
            let s = task.present_stimulus(trial).unwrap();
            counts[s.context][s.alien] += 1;
        }
        assert!(counts.iter().flatten().all(|&c| c == N_CLOUDY_REPETITIONS));
    }

    #[test]
    fn test_blocks_keep_one_context() {
        let mut task = AlienTask::generate(&TaskConfig::default(), 2);
        let first = task.present_stimulus(0).unwrap().context;
        for trial in 0..13 * 4 {
            assert_eq!(task.present_stimulus(trial).unwrap().context, first);
        }
    }

    #[test]
    fn test_deterministic_rewards() {
        let cfg = TaskConfig {
            p_reward_correct: 1.0,
            p_reward_incorrect: 0.0,
            ..TaskConfig::default()
        };
        let mut task = AlienTask::generate(&cfg, 4);
        let s = task.present_stimulus(10).unwrap();
        let good = correct_action(s);
        assert_eq!(task.produce_reward(good).unwrap(), (1.0, true));
        assert_eq!(task.produce_reward((good + 1) % 3).unwrap(), (0.0, false));
    }

    #[test]
    fn test_correct_action_table() {
        assert_eq!(correct_action(Stimulus::new(0, 0)), 0);
        assert_eq!(correct_action(Stimulus::new(1, 3)), 2);
        assert_eq!(correct_action(Stimulus::new(2, 1)), 0);
    }
}
