//! Q-learning agents for the Aliens task.
//!
//! Two value tables, stored flat:
//!
//! - `Q_low[ts, alien, action]`: value of feeding `action` to `alien` under task-set `ts`
//! - `Q_high[context, ts]`: value of applying task-set `ts` in `context`
//!
//! | Style | `Q_low` rows | `Q_high` | Task-set choice |
//! |-------|--------------|----------|-----------------|
//! | s-flat | n_contexts | column 0 = 1, rest 0 | always task-set 0 |
//! | flat | n_contexts | identity | task-set = context |
//! | hierarchical | n_ts | learned, one column per discovered context | softmax(β_high) |
//!
//! The hierarchical table is pre-sized to `n_ts` columns; a column becomes
//! active the first time an unseen context appears. Once all columns are
//! active, further new contexts reuse the existing task-sets.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::constants::JITTER_FRACTION;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::softmax::{argmax, dot, p_from_q, sample_index, select_deterministic};
use crate::types::{LearningStyle, Stimulus, TaskDims};

use super::AgentConfig;

/// A stimulus offered in a preference (competition) trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompStimulus {
    /// A context on its own.
    Context(usize),
    /// An alien shown in a specific context.
    ContextAlien(Stimulus),
    /// An item, valued across aliens and task-sets.
    Item(usize),
    /// An alien, valued across task-sets.
    Alien(usize),
}

pub struct AlienAgent {
    style: LearningStyle,
    mix_probs: bool,
    params: Parameters,
    dims: TaskDims,
    n_ts: usize,
    initial_q: f64,
    q_low: Vec<f64>,
    q_high: Vec<f64>,
    n_active_ts: usize,
    seen_contexts: Vec<bool>,
    context: Option<usize>,
    p_ts: Vec<f64>,
    q_actions: Vec<f64>,
    p_actions: Vec<f64>,
    rpes_low: Vec<f64>,
    rpes_high: Vec<f64>,
    ts: usize,
    prev_action: Option<usize>,
    ll: f64,
    q_stimuli: Vec<f64>,
    p_stimuli: Vec<f64>,
    jitter: Normal<f64>,
    rng: SmallRng,
}

impl AlienAgent {
    pub fn new(config: &AgentConfig, params: Parameters, dims: TaskDims) -> Result<Self> {
        params.validate()?;
        let style = config.learning_style;
        if !matches!(
            style,
            LearningStyle::SFlat | LearningStyle::Flat | LearningStyle::Hierarchical
        ) {
            return Err(Error::StyleMismatch {
                style: style.as_str(),
                data_set: "Aliens",
            });
        }
        let n_ts = if style == LearningStyle::Hierarchical {
            config.n_ts
        } else {
            dims.n_contexts
        };
        if n_ts == 0 {
            return Err(Error::InvalidConfig("n_ts must be at least 1".to_string()));
        }

        let jitter = Normal::new(0.0, config.initial_q.abs() * JITTER_FRACTION).map_err(|_| {
            Error::InvalidConfig(format!("initial_q {} is not finite", config.initial_q))
        })?;
        let mut rng = SmallRng::seed_from_u64(config.seed);

        let n_low = n_ts * dims.n_aliens * dims.n_actions;
        let q_low: Vec<f64> = (0..n_low)
            .map(|_| config.initial_q + jitter.sample(&mut rng))
            .collect();

        let mut q_high = vec![0.0; dims.n_contexts * n_ts];
        match style {
            LearningStyle::SFlat => {
                for c in 0..dims.n_contexts {
                    q_high[c * n_ts] = 1.0;
                }
            }
            LearningStyle::Flat => {
                for c in 0..dims.n_contexts {
                    q_high[c * n_ts + c] = 1.0;
                }
            }
            _ => {}
        }

        Ok(Self {
            style,
            mix_probs: config.mix_probs,
            params,
            dims,
            n_ts,
            initial_q: config.initial_q,
            q_low,
            q_high,
            n_active_ts: if style == LearningStyle::Hierarchical { 0 } else { n_ts },
            seen_contexts: vec![false; dims.n_contexts],
            context: None,
            p_ts: vec![1.0 / n_ts as f64; n_ts],
            q_actions: vec![0.0; dims.n_actions],
            p_actions: vec![1.0 / dims.n_actions as f64; dims.n_actions],
            rpes_low: vec![0.0; n_ts],
            rpes_high: vec![0.0; n_ts],
            ts: 0,
            prev_action: None,
            ll: 0.0,
            q_stimuli: Vec::new(),
            p_stimuli: Vec::new(),
            jitter,
            rng,
        })
    }

    #[inline]
    fn low_idx(&self, ts: usize, alien: usize, action: usize) -> usize {
        (ts * self.dims.n_aliens + alien) * self.dims.n_actions + action
    }

    #[inline]
    fn high_idx(&self, context: usize, ts: usize) -> usize {
        context * self.n_ts + ts
    }

    fn high_row(&self, context: usize) -> &[f64] {
        let start = self.high_idx(context, 0);
        &self.q_high[start..start + self.n_active_ts]
    }

    fn low_slice(&self, ts: usize, alien: usize) -> &[f64] {
        let start = self.low_idx(ts, alien, 0);
        &self.q_low[start..start + self.dims.n_actions]
    }

    /// Allocate a task-set column for an unseen context, then suppress the
    /// previously dominant task-set's value in the new context.
    fn handle_context_switch(&mut self, context: usize) {
        if !self.seen_contexts[context] {
            if self.n_active_ts < self.n_ts {
                let col = self.n_active_ts;
                for c in 0..self.dims.n_contexts {
                    let idx = self.high_idx(c, col);
                    self.q_high[idx] = self.initial_q + self.jitter.sample(&mut self.rng);
                }
                self.n_active_ts += 1;
            }
            self.seen_contexts[context] = true;
        }
        let prev_ts = argmax(&self.p_ts);
        let idx = self.high_idx(context, prev_ts);
        self.q_high[idx] *= 1.0 - self.params.suppress_prev_ts;
        self.context = Some(context);
    }

    /// Forget the previous context so the next trial counts as a context
    /// change. Called at every phase boundary.
    pub fn reset_context(&mut self) {
        self.context = None;
    }

    pub fn select_action(&mut self, stimulus: Stimulus) -> Result<usize> {
        self.dims.check_stimulus(stimulus)?;
        let Stimulus { context, alien } = stimulus;

        if self.style == LearningStyle::Hierarchical && self.context != Some(context) {
            self.handle_context_switch(context);
        }
        self.context = Some(context);

        self.p_ts = if self.style.selects_deterministically() {
            select_deterministic(self.high_row(context))
        } else {
            let mut p = p_from_q(self.high_row(context), self.params.beta_high, 0.0);
            p.resize(self.n_ts, 0.0);
            p
        };
        self.ts = sample_index(&self.p_ts, &mut self.rng);

        self.q_actions = if self.mix_probs {
            let mut mixed = vec![0.0; self.dims.n_actions];
            for ts in 0..self.n_ts {
                let w = self.p_ts[ts];
                if w == 0.0 {
                    continue;
                }
                for (m, &q) in mixed.iter_mut().zip(self.low_slice(ts, alien)) {
                    *m += w * q;
                }
            }
            mixed
        } else {
            self.low_slice(self.ts, alien).to_vec()
        };

        self.p_actions = p_from_q(&self.q_actions, self.params.beta, self.params.epsilon);
        let action = sample_index(&self.p_actions, &mut self.rng);
        Ok(action)
    }

    pub fn learn(&mut self, stimulus: Stimulus, action: usize, reward: f64) -> Result<()> {
        self.dims.check_stimulus(stimulus)?;
        self.dims.check_action(action)?;
        self.update_values(stimulus, action, reward);
        self.forget_values();
        self.ll += self.p_actions[action].ln();
        self.prev_action = Some(action);
        Ok(())
    }

    fn update_values(&mut self, stimulus: Stimulus, action: usize, reward: f64) {
        let Stimulus { context, alien } = stimulus;
        let hierarchical = self.style == LearningStyle::Hierarchical;

        for ts in 0..self.n_ts {
            self.rpes_high[ts] = reward - self.q_high[self.high_idx(context, ts)];
            self.rpes_low[ts] = reward - self.q_low[self.low_idx(ts, alien, action)];
        }

        if self.mix_probs {
            for ts in 0..self.n_ts {
                let idx = self.low_idx(ts, alien, action);
                self.q_low[idx] += self.params.alpha * self.p_ts[ts] * self.rpes_low[ts];
            }
            if hierarchical {
                for ts in 0..self.n_active_ts {
                    let idx = self.high_idx(context, ts);
                    self.q_high[idx] += self.params.alpha_high * self.p_ts[ts] * self.rpes_high[ts];
                }
            }
        } else {
            let ts = self.ts;
            let idx = self.low_idx(ts, alien, action);
            self.q_low[idx] += self.params.alpha * self.rpes_low[ts];
            if hierarchical {
                let idx = self.high_idx(context, ts);
                self.q_high[idx] += self.params.alpha_high * self.rpes_high[ts];
            }
        }
    }

    /// Decay every value a fraction `forget` (`forget_high` for the
    /// context→task-set table) toward the initial value.
    pub fn forget_values(&mut self) {
        let init = self.initial_q;
        let forget = self.params.forget;
        for q in &mut self.q_low {
            *q -= forget * (*q - init);
        }
        if self.style == LearningStyle::Hierarchical {
            let forget_high = self.params.forget_high;
            for c in 0..self.dims.n_contexts {
                for ts in 0..self.n_active_ts {
                    let idx = self.high_idx(c, ts);
                    self.q_high[idx] -= forget_high * (self.q_high[idx] - init);
                }
            }
        }
    }

    // ── Stimulus valuation for preference trials ─────────────────────────

    /// Expected value of `q` under its own softmax policy.
    pub fn marginalize(&self, q: &[f64], beta: f64) -> f64 {
        let p = p_from_q(q, beta, self.params.epsilon);
        dot(&p, q)
    }

    /// π(TS | context), padded to `n_ts`; uniform before any task-set exists.
    fn p_ts_given_context(&self, context: usize) -> Vec<f64> {
        if self.n_active_ts == 0 {
            return vec![1.0 / self.n_ts as f64; self.n_ts];
        }
        let mut p = p_from_q(
            self.high_row(context),
            self.params.beta_high,
            self.params.epsilon,
        );
        p.resize(self.n_ts, 0.0);
        p
    }

    /// π(TS) = mean over contexts of π(TS | context).
    pub fn p_ts_marginal(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_ts];
        for c in 0..self.dims.n_contexts {
            for (t, p) in total.iter_mut().zip(self.p_ts_given_context(c)) {
                *t += p;
            }
        }
        let n = self.dims.n_contexts as f64;
        total.iter_mut().for_each(|t| *t /= n);
        total
    }

    /// Value of `alien` under each task-set, marginalized over actions.
    fn alien_value_per_ts(&self, alien: usize) -> Vec<f64> {
        (0..self.n_ts)
            .map(|ts| self.marginalize(self.low_slice(ts, alien), self.params.beta))
            .collect()
    }

    pub fn stimulus_value(&self, stimulus: CompStimulus) -> f64 {
        match stimulus {
            CompStimulus::Context(context) => {
                if self.n_active_ts == 0 {
                    return 0.0;
                }
                self.marginalize(self.high_row(context), self.params.beta_high)
            }
            CompStimulus::ContextAlien(Stimulus { context, alien }) => {
                dot(&self.alien_value_per_ts(alien), &self.p_ts_given_context(context))
            }
            CompStimulus::Item(item) => {
                let per_ts: Vec<f64> = (0..self.n_ts)
                    .map(|ts| {
                        let over_aliens: Vec<f64> = (0..self.dims.n_aliens)
                            .map(|alien| self.q_low[self.low_idx(ts, alien, item)])
                            .collect();
                        self.marginalize(&over_aliens, self.params.beta)
                    })
                    .collect();
                dot(&per_ts, &self.p_ts_marginal())
            }
            CompStimulus::Alien(alien) => {
                dot(&self.alien_value_per_ts(alien), &self.p_ts_marginal())
            }
        }
    }

    /// Pick one of several stimuli by softmax over their values; returns the
    /// index into `stimuli`.
    pub fn competition_selection(&mut self, stimuli: &[CompStimulus]) -> usize {
        self.q_stimuli = stimuli.iter().map(|&s| self.stimulus_value(s)).collect();
        self.p_stimuli = p_from_q(&self.q_stimuli, self.params.beta, self.params.epsilon);
        sample_index(&self.p_stimuli, &mut self.rng)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn learning_style(&self) -> LearningStyle {
        self.style
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn dims(&self) -> TaskDims {
        self.dims
    }

    pub fn n_ts(&self) -> usize {
        self.n_ts
    }

    pub fn n_active_ts(&self) -> usize {
        self.n_active_ts
    }

    pub fn initial_q(&self) -> f64 {
        self.initial_q
    }

    pub fn q_low(&self) -> &[f64] {
        &self.q_low
    }

    pub fn q_high(&self) -> &[f64] {
        &self.q_high
    }

    pub fn q_low_at(&self, ts: usize, alien: usize, action: usize) -> f64 {
        self.q_low[self.low_idx(ts, alien, action)]
    }

    pub fn q_high_at(&self, context: usize, ts: usize) -> f64 {
        self.q_high[self.high_idx(context, ts)]
    }

    pub fn p_ts(&self) -> &[f64] {
        &self.p_ts
    }

    pub fn p_actions(&self) -> &[f64] {
        &self.p_actions
    }

    pub fn q_actions(&self) -> &[f64] {
        &self.q_actions
    }

    pub fn rpes_low(&self) -> &[f64] {
        &self.rpes_low
    }

    pub fn rpes_high(&self) -> &[f64] {
        &self.rpes_high
    }

    /// Task-set sampled on the last trial.
    pub fn current_ts(&self) -> usize {
        self.ts
    }

    /// Action learned from on the last trial.
    pub fn prev_action(&self) -> Option<usize> {
        self.prev_action
    }

    pub fn q_stimuli(&self) -> &[f64] {
        &self.q_stimuli
    }

    pub fn p_stimuli(&self) -> &[f64] {
        &self.p_stimuli
    }

    pub fn log_likelihood(&self) -> f64 {
        self.ll
    }
}
