//! Learning agents.
//!
//! - [`alien`]: flat / s-flat / hierarchical Q-learners for the Aliens task
//! - [`switching`]: RL and Bayesian agents for the probabilistic-switching task
//!
//! Both families share one trial contract: [`Agent::select_action`] computes
//! action probabilities (and samples an action), [`Agent::learn`] updates the
//! values from the realized action and reward and accumulates the
//! log-likelihood of that action. The variant is chosen from the
//! [`LearningStyle`] tag at construction.

pub mod alien;
pub mod switching;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::types::{DataSet, LearningStyle, Stimulus, TaskDims};

pub use alien::{AlienAgent, CompStimulus};
pub use switching::SwitchingAgent;

/// Structural agent settings (everything that is not a fitted parameter).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub learning_style: LearningStyle,
    /// Mix task-set values by `p_TS` (true) or use the sampled task-set only.
    /// Applies to both action valuation and learning.
    pub mix_probs: bool,
    /// Task-set capacity of the hierarchical agent.
    pub n_ts: usize,
    /// Constant all value tables start from and decay toward.
    pub initial_q: f64,
    /// Seed of the agent's private RNG (jitter, task-set and action draws).
    pub seed: u64,
}

impl AgentConfig {
    pub fn new(learning_style: LearningStyle, initial_q: f64, seed: u64) -> Self {
        Self {
            learning_style,
            mix_probs: false,
            n_ts: crate::constants::N_TASK_SETS,
            initial_q,
            seed,
        }
    }
}

/// Closed set of agent variants behind one trial contract.
pub enum Agent {
    Alien(AlienAgent),
    Switching(SwitchingAgent),
}

impl Agent {
    /// Build an agent; fails on parameter precondition violations or a
    /// style/task mismatch.
    pub fn new(config: &AgentConfig, params: Parameters, dims: TaskDims) -> Result<Self> {
        params.validate()?;
        match config.learning_style.data_set() {
            DataSet::Aliens => Ok(Agent::Alien(AlienAgent::new(config, params, dims)?)),
            DataSet::Ps => Ok(Agent::Switching(SwitchingAgent::new(config, params, dims)?)),
        }
    }

    pub fn learning_style(&self) -> LearningStyle {
        match self {
            Agent::Alien(a) => a.learning_style(),
            Agent::Switching(a) => a.learning_style(),
        }
    }

    /// Mark a phase boundary: the first trial of the new phase is treated as
    /// a context change.
    pub fn start_phase(&mut self) {
        if let Agent::Alien(a) = self {
            a.reset_context();
        }
    }

    /// Compute action probabilities for this trial and sample an action.
    pub fn select_action(&mut self, stimulus: Option<Stimulus>) -> Result<usize> {
        match (self, stimulus) {
            (Agent::Alien(a), Some(s)) => a.select_action(s),
            (Agent::Switching(a), None) => Ok(a.select_action()),
            (agent, _) => Err(stimulus_mismatch(agent.learning_style())),
        }
    }

    /// Learn from the realized action and reward, then accumulate
    /// `log p(action)` from the probabilities of the last `select_action`.
    pub fn learn(&mut self, stimulus: Option<Stimulus>, action: usize, reward: f64) -> Result<()> {
        match (self, stimulus) {
            (Agent::Alien(a), Some(s)) => a.learn(s, action, reward),
            (Agent::Switching(a), None) => a.learn(action, reward),
            (agent, _) => Err(stimulus_mismatch(agent.learning_style())),
        }
    }

    pub fn log_likelihood(&self) -> f64 {
        match self {
            Agent::Alien(a) => a.log_likelihood(),
            Agent::Switching(a) => a.log_likelihood(),
        }
    }

    pub fn p_actions(&self) -> &[f64] {
        match self {
            Agent::Alien(a) => a.p_actions(),
            Agent::Switching(a) => a.p_actions(),
        }
    }

    /// Action the agent last learned from.
    pub fn prev_action(&self) -> Option<usize> {
        match self {
            Agent::Alien(a) => a.prev_action(),
            Agent::Switching(a) => a.prev_action(),
        }
    }

    pub fn params(&self) -> &Parameters {
        match self {
            Agent::Alien(a) => a.params(),
            Agent::Switching(a) => a.params(),
        }
    }

    pub fn n_actions(&self) -> usize {
        self.p_actions().len()
    }

    /// Number of task-set columns (1 for switching agents).
    pub fn n_ts(&self) -> usize {
        match self {
            Agent::Alien(a) => a.n_ts(),
            Agent::Switching(_) => 1,
        }
    }
}

fn stimulus_mismatch(style: LearningStyle) -> Error {
    let data_set = match style.data_set() {
        DataSet::Aliens => DataSet::Ps,
        DataSet::Ps => DataSet::Aliens,
    };
    Error::StyleMismatch {
        style: style.as_str(),
        data_set: data_set.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_on_style() {
        let cfg = AgentConfig::new(LearningStyle::Flat, 0.5, 1);
        let agent = Agent::new(&cfg, Parameters::default(), TaskDims::aliens()).unwrap();
        assert!(matches!(agent, Agent::Alien(_)));

        let cfg = AgentConfig::new(LearningStyle::Bayes, 0.5, 1);
        let agent = Agent::new(&cfg, Parameters::default(), TaskDims::switching()).unwrap();
        assert!(matches!(agent, Agent::Switching(_)));
    }

    #[test]
    fn test_construction_rejects_bad_parameters() {
        let cfg = AgentConfig::new(LearningStyle::Hierarchical, 0.5, 1);
        let mut pars = Parameters::default();
        pars.beta = 0.9;
        assert!(matches!(
            Agent::new(&cfg, pars, TaskDims::aliens()),
            Err(Error::InvalidParameter { name: "beta", .. })
        ));
    }

    #[test]
    fn test_missing_stimulus_is_an_error() {
        let cfg = AgentConfig::new(LearningStyle::Flat, 0.5, 1);
        let mut agent = Agent::new(&cfg, Parameters::default(), TaskDims::aliens()).unwrap();
        assert!(agent.select_action(None).is_err());
    }
}
