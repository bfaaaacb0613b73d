//! Agents for the probabilistic-switching task (two boxes, no stimulus).
//!
//! - **RL**: `Q = [Q_left, Q_right]`, both starting at 0.5. The chosen box
//!   moves toward the reward, the unchosen box toward `1 − reward`.
//! - **Bayes**: a belief `p_right` that the right box is currently correct,
//!   updated by Bayes' rule and then propagated through the switch process.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::constants::{N_BOXES, PS_INITIAL_VALUE, PS_P_NOISY};
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::softmax::{p_from_q, sample_index};
use crate::types::{LearningStyle, TaskDims};

use super::AgentConfig;

const LEFT: usize = 0;
const RIGHT: usize = 1;

pub struct SwitchingAgent {
    style: LearningStyle,
    params: Parameters,
    q: [f64; N_BOXES],
    p_right: f64,
    p_actions: Vec<f64>,
    prev_action: Option<usize>,
    ll: f64,
    rng: SmallRng,
}

impl SwitchingAgent {
    pub fn new(config: &AgentConfig, params: Parameters, dims: TaskDims) -> Result<Self> {
        params.validate()?;
        let style = config.learning_style;
        if !matches!(style, LearningStyle::Rl | LearningStyle::Bayes) {
            return Err(Error::StyleMismatch {
                style: style.as_str(),
                data_set: "PS",
            });
        }
        if dims.n_actions != N_BOXES {
            return Err(Error::InvalidConfig(format!(
                "switching agents need {} actions, got {}",
                N_BOXES, dims.n_actions
            )));
        }
        Ok(Self {
            style,
            params,
            q: [PS_INITIAL_VALUE; N_BOXES],
            p_right: PS_INITIAL_VALUE,
            p_actions: vec![0.5; N_BOXES],
            prev_action: None,
            ll: 0.0,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    /// Values the choice rule sees: `[Q_left, Q_right]` or `[1 − p_right, p_right]`.
    pub fn values(&self) -> [f64; N_BOXES] {
        match self.style {
            LearningStyle::Bayes => [1.0 - self.p_right, self.p_right],
            _ => self.q,
        }
    }

    pub fn select_action(&mut self) -> usize {
        self.p_actions = p_from_q(&self.values(), self.params.beta, self.params.epsilon);
        sample_index(&self.p_actions, &mut self.rng)
    }

    pub fn learn(&mut self, action: usize, reward: f64) -> Result<()> {
        if action >= N_BOXES {
            return Err(Error::ActionOutOfRange {
                action,
                n_actions: N_BOXES,
            });
        }
        match self.style {
            LearningStyle::Bayes => self.update_belief(action, reward),
            _ => {
                self.update_q(action, reward);
                self.forget_values();
            }
        }
        self.ll += self.p_actions[action].ln();
        self.prev_action = Some(action);
        Ok(())
    }

    fn update_q(&mut self, action: usize, reward: f64) {
        let other = 1 - action;
        let rewarded = reward > 0.0;
        let (alpha, c_alpha) = if rewarded {
            (self.params.alpha, self.params.calpha)
        } else {
            (self.params.nalpha, self.params.cnalpha)
        };
        self.q[action] += alpha * (reward - self.q[action]);
        self.q[other] += c_alpha * ((1.0 - reward) - self.q[other]);
    }

    pub fn forget_values(&mut self) {
        let forget = self.params.forget;
        for q in &mut self.q {
            *q -= forget * (*q - PS_INITIAL_VALUE);
        }
    }

    fn update_belief(&mut self, action: usize, reward: f64) {
        let p_reward = self.params.p_reward;
        // P(observed reward | chosen box is correct / incorrect)
        let lik_correct = reward * p_reward + (1.0 - reward) * (1.0 - p_reward);
        let lik_incorrect = reward * PS_P_NOISY + (1.0 - reward) * (1.0 - PS_P_NOISY);
        let (lik_right, lik_left) = if action == RIGHT {
            (lik_correct, lik_incorrect)
        } else {
            (lik_incorrect, lik_correct)
        };

        let joint_right = self.p_right * lik_right;
        let evidence = joint_right + (1.0 - self.p_right) * lik_left;
        let posterior = if evidence > 0.0 {
            joint_right / evidence
        } else {
            self.p_right
        };

        let p_switch = self.params.p_switch;
        self.p_right = (1.0 - p_switch) * posterior + p_switch * (1.0 - posterior);
    }

    pub fn learning_style(&self) -> LearningStyle {
        self.style
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn q_left(&self) -> f64 {
        self.q[LEFT]
    }

    pub fn q_right(&self) -> f64 {
        self.q[RIGHT]
    }

    pub fn p_right(&self) -> f64 {
        self.p_right
    }

    pub fn p_actions(&self) -> &[f64] {
        &self.p_actions
    }

    pub fn prev_action(&self) -> Option<usize> {
        self.prev_action
    }

    pub fn log_likelihood(&self) -> f64 {
        self.ll
    }
}
