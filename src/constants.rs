//! Task dimensions, schedules and numeric defaults.

// ── Aliens task ──────────────────────────────────────────────────────────

/// Number of contexts (seasons).
pub const N_CONTEXTS: usize = 3;
/// Number of aliens (stimuli) per context.
pub const N_ALIENS: usize = 4;
/// Number of items the agent can feed an alien.
pub const N_ALIEN_ACTIONS: usize = 3;
/// Number of latent task-sets available to the hierarchical agent.
pub const N_TASK_SETS: usize = 3;

/// Task-set active in each context.
pub const CONTEXT_TASK_SET: [usize; N_CONTEXTS] = [0, 1, 2];

/// Correct item for each (task-set, alien).
pub const CORRECT_ACTION: [[usize; N_ALIENS]; N_TASK_SETS] =
    [[0, 1, 2, 0], [1, 2, 0, 2], [2, 0, 1, 1]];

/// Default reward probability for the correct item.
pub const ALIEN_P_REWARD_CORRECT: f64 = 0.9;
/// Default reward probability for any other item.
pub const ALIEN_P_REWARD_INCORRECT: f64 = 0.1;

/// Alien repetitions per context block: InitialLearning, Refresher2, Refresher3.
pub const N_ALIEN_REPETITIONS: [usize; 3] = [13, 7, 7];
/// Context cycles: InitialLearning, Refresher2, Refresher3.
pub const N_SEASON_REPETITIONS: [usize; 3] = [3, 2, 2];
/// Repetitions of every (context, alien) pair in the cloudy season.
pub const N_CLOUDY_REPETITIONS: usize = 10;

// ── Probabilistic switching task ─────────────────────────────────────────

pub const N_BOXES: usize = 2;
pub const PS_N_TRIALS: usize = 150;
pub const PS_P_REWARD: f64 = 0.75;
pub const PS_P_SWITCH: f64 = 0.05;
/// Initial value of both box Q-values and of the Bayesian belief.
pub const PS_INITIAL_VALUE: f64 = 0.5;
/// Reward likelihood on the incorrect box assumed by the Bayesian agent.
pub const PS_P_NOISY: f64 = 1e-5;

// ── Agent ────────────────────────────────────────────────────────────────

/// Jitter standard deviation as a fraction of the initial Q value.
pub const JITTER_FRACTION: f64 = 0.01;

/// Tolerance of the probability-mass check (sum rounds to 1 at 3 decimals).
pub const PROB_MASS_TOLERANCE: f64 = 5e-4;
