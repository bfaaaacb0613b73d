//! Task environments.
//!
//! A task owns a precomputed trial sequence and its own RNG. Per trial it
//! presents a stimulus ([`Task::present_stimulus`]) and scores an action
//! ([`Task::produce_reward`]) against the mapping that is correct at that
//! trial.

pub mod aliens;
pub mod switching;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Result;
use crate::record::TrialLog;
use crate::types::{DataSet, Phase, Stimulus, TaskDims};

pub use aliens::AlienTask;
pub use switching::SwitchTask;

/// Task settings for both experiments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub p_reward_correct: f64,
    pub p_reward_incorrect: f64,
    pub ps_n_trials: usize,
    pub ps_p_reward: f64,
    pub ps_p_switch: f64,
    /// Prerecorded stimulus sequence (Aliens: `context, sad_alien[, phase]`;
    /// PS: `correct_box, reward_available`).
    pub sequence_path: Option<PathBuf>,
    /// Phases a generated Aliens run schedules, in order.
    pub alien_phases: Vec<Phase>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            p_reward_correct: ALIEN_P_REWARD_CORRECT,
            p_reward_incorrect: ALIEN_P_REWARD_INCORRECT,
            ps_n_trials: PS_N_TRIALS,
            ps_p_reward: PS_P_REWARD,
            ps_p_switch: PS_P_SWITCH,
            sequence_path: None,
            alien_phases: Phase::simulated_alien_phases(),
        }
    }
}

impl TaskConfig {
    /// Mean reward of random responding; the agents' initial Q value.
    pub fn initial_q(&self, data_set: DataSet) -> f64 {
        match data_set {
            DataSet::Aliens => {
                let n = N_ALIEN_ACTIONS as f64;
                (self.p_reward_correct + (n - 1.0) * self.p_reward_incorrect) / n
            }
            DataSet::Ps => PS_INITIAL_VALUE,
        }
    }
}

pub enum Task {
    Aliens(AlienTask),
    Switching(SwitchTask),
}

impl Task {
    /// Build a task, from the configured sequence file if there is one.
    pub fn new(config: &TaskConfig, data_set: DataSet, seed: u64) -> Result<Self> {
        let sequence = match &config.sequence_path {
            Some(path) => Some((TrialLog::read_csv(path)?, path.display().to_string())),
            None => None,
        };
        Ok(match (data_set, sequence) {
            (DataSet::Aliens, None) => Task::Aliens(AlienTask::generate(config, seed)),
            (DataSet::Aliens, Some((log, path))) => {
                Task::Aliens(AlienTask::from_sequence(config, &log, &path, seed)?)
            }
            (DataSet::Ps, None) => Task::Switching(SwitchTask::generate(config, seed)),
            (DataSet::Ps, Some((log, path))) => {
                Task::Switching(SwitchTask::from_schedule(&log, &path)?)
            }
        })
    }

    pub fn dims(&self) -> TaskDims {
        match self {
            Task::Aliens(_) => TaskDims::aliens(),
            Task::Switching(_) => TaskDims::switching(),
        }
    }

    pub fn n_trials(&self) -> usize {
        match self {
            Task::Aliens(t) => t.n_trials(),
            Task::Switching(t) => t.n_trials(),
        }
    }

    /// Phases in trial order, each with its trial count.
    pub fn phases(&self) -> Vec<(Phase, usize)> {
        match self {
            Task::Aliens(t) => t.phases(),
            Task::Switching(t) => vec![(Phase::Switching, t.n_trials())],
        }
    }

    pub fn phase_at(&self, trial: usize) -> Phase {
        match self {
            Task::Aliens(t) => t.phase_at(trial),
            Task::Switching(_) => Phase::Switching,
        }
    }

    /// Stimulus of `trial` (`None` for the switching task). Also moves the
    /// task to that trial for the following `produce_reward`.
    pub fn present_stimulus(&mut self, trial: usize) -> Result<Option<Stimulus>> {
        match self {
            Task::Aliens(t) => t.present_stimulus(trial).map(Some),
            Task::Switching(t) => {
                t.prepare_trial(trial)?;
                Ok(None)
            }
        }
    }

    /// `(reward, correct)` for `action` on the current trial.
    pub fn produce_reward(&mut self, action: usize) -> Result<(f64, bool)> {
        match self {
            Task::Aliens(t) => t.produce_reward(action),
            Task::Switching(t) => t.produce_reward(action),
        }
    }

    pub fn correct_box(&self) -> Option<usize> {
        match self {
            Task::Aliens(_) => None,
            Task::Switching(t) => Some(t.correct_box()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_q_is_random_responding_mean() {
        let cfg = TaskConfig::default();
        let q = cfg.initial_q(DataSet::Aliens);
        assert!((q - (0.9 + 2.0 * 0.1) / 3.0).abs() < 1e-12);
        assert_eq!(cfg.initial_q(DataSet::Ps), 0.5);
    }

    #[test]
    fn test_switching_task_has_no_stimulus() {
        let mut task = Task::new(&TaskConfig::default(), DataSet::Ps, 1).unwrap();
        assert_eq!(task.n_trials(), PS_N_TRIALS);
        assert_eq!(task.present_stimulus(0).unwrap(), None);
        assert!(task.correct_box().is_some());
    }

    #[test]
    fn test_trial_out_of_range() {
        let mut task = Task::new(&TaskConfig::default(), DataSet::Aliens, 1).unwrap();
        let n = task.n_trials();
        assert!(task.present_stimulus(n).is_err());
    }
}
