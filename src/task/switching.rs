//! Probabilistic-switching task.
//!
//! Two boxes; one is correct and pays with probability `p_reward`, the other
//! never pays. Before each trial after the first the correct box switches
//! with probability `p_switch`. The whole schedule (correct box and whether
//! a reward is available) is drawn up front, or read from a CSV.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::constants::N_BOXES;
use crate::error::{Error, Result};
use crate::record::TrialLog;

use super::TaskConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScheduledTrial {
    correct_box: usize,
    reward_available: bool,
}

pub struct SwitchTask {
    schedule: Vec<ScheduledTrial>,
    trial: usize,
}

impl SwitchTask {
    pub fn generate(config: &TaskConfig, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut correct_box = rng.random_range(0..N_BOXES);
        let schedule = (0..config.ps_n_trials)
            .map(|trial| {
                if trial > 0 && rng.random::<f64>() < config.ps_p_switch {
                    correct_box = 1 - correct_box;
                }
                ScheduledTrial {
                    correct_box,
                    reward_available: rng.random::<f64>() < config.ps_p_reward,
                }
            })
            .collect();
        Self { schedule, trial: 0 }
    }

    /// Fixed schedule from `correct_box, reward_available` columns.
    pub fn from_schedule(log: &TrialLog, path: &str) -> Result<Self> {
        let boxes = crate::data::int_column(log, "correct_box", path)?;
        let available = crate::data::int_column(log, "reward_available", path)?;
        let mut schedule = Vec::with_capacity(boxes.len());
        for (&correct_box, &reward_available) in boxes.iter().zip(&available) {
            if correct_box >= N_BOXES {
                return Err(Error::ActionOutOfRange {
                    action: correct_box,
                    n_actions: N_BOXES,
                });
            }
            schedule.push(ScheduledTrial {
                correct_box,
                reward_available: reward_available != 0,
            });
        }
        Ok(Self { schedule, trial: 0 })
    }

    pub fn n_trials(&self) -> usize {
        self.schedule.len()
    }

    pub fn prepare_trial(&mut self, trial: usize) -> Result<()> {
        if trial >= self.schedule.len() {
            return Err(Error::TrialOutOfRange {
                trial,
                len: self.schedule.len(),
            });
        }
        self.trial = trial;
        Ok(())
    }

    pub fn correct_box(&self) -> usize {
        self.schedule.get(self.trial).map_or(0, |t| t.correct_box)
    }

    pub fn produce_reward(&mut self, action: usize) -> Result<(f64, bool)> {
        if action >= N_BOXES {
            return Err(Error::ActionOutOfRange {
                action,
                n_actions: N_BOXES,
            });
        }
        let t = self.schedule[self.trial];
        let correct = action == t.correct_box;
        let reward = if correct && t.reward_available { 1.0 } else { 0.0 };
        Ok((reward, correct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_box_never_pays() {
        let mut task = SwitchTask::generate(&TaskConfig::default(), 13);
        for trial in 0..task.n_trials() {
            task.prepare_trial(trial).unwrap();
            let wrong = 1 - task.correct_box();
            assert_eq!(task.produce_reward(wrong).unwrap(), (0.0, false));
        }
    }

    #[test]
    fn test_no_switch_keeps_box() {
        let cfg = TaskConfig {
            ps_p_switch: 0.0,
            ..TaskConfig::default()
        };
        let mut task = SwitchTask::generate(&cfg, 8);
        task.prepare_trial(0).unwrap();
        let first = task.correct_box();
        for trial in 1..task.n_trials() {
            task.prepare_trial(trial).unwrap();
            assert_eq!(task.correct_box(), first);
        }
    }

    #[test]
    fn test_correct_box_reward_rate() {
        let cfg = TaskConfig {
            ps_n_trials: 20_000,
            ..TaskConfig::default()
        };
        let mut task = SwitchTask::generate(&cfg, 21);
        let mut total = 0.0;
        for trial in 0..task.n_trials() {
            task.prepare_trial(trial).unwrap();
            let good = task.correct_box();
            total += task.produce_reward(good).unwrap().0;
        }
        let rate = total / cfg.ps_n_trials as f64;
        assert!((rate - 0.75).abs() < 0.02, "rate {}", rate);
    }

    #[test]
    fn test_schedule_from_log() {
        let mut log = TrialLog::with_rows(2);
        log.set("correct_box", 0, 1);
        log.set("correct_box", 1, 0);
        log.set("reward_available", 0, 1);
        log.set("reward_available", 1, 0);
        let mut task = SwitchTask::from_schedule(&log, "mem").unwrap();
        task.prepare_trial(0).unwrap();
        assert_eq!(task.produce_reward(1).unwrap(), (1.0, true));
        task.prepare_trial(1).unwrap();
        assert_eq!(task.produce_reward(0).unwrap(), (0.0, true));
    }
}
