//! # tasksets: agent simulation and likelihood fitting
//!
//! Reinforcement-learning and Bayesian agents for two behavioral tasks, and
//! the machinery to fit their parameters to recorded choices by maximum
//! likelihood.
//!
//! - **Aliens**: three seasons (contexts) × four aliens; the correct item to
//!   feed depends on the season's latent task-set. Flat agents learn one
//!   value table per context, hierarchical agents learn which task-set to
//!   apply in which context.
//! - **Probabilistic switching (PS)**: two boxes, one pays 75% of the time,
//!   and the paying box occasionally switches.
//!
//! ## Pipeline
//!
//! | Step | Module | Description |
//! |------|--------|-------------|
//! | Simulate | [`fit::FitParameters::simulate_agent`] | Fresh agent plays a fresh [`task::Task`]; every trial lands in a [`record::TrialLog`] |
//! | Replay | [`fit::FitParameters::calculate_nll`] | Agent is forced through recorded choices, accumulating `log p(action)` |
//! | Score | [`fit::FitStats`] | `NLL`, `BIC = −2·LL + k·ln n`, `AIC = −2·LL + k` |
//! | Minimize | [`fit::optimize`] | Grid search, then basin hopping with Nelder-Mead local steps on `[0, 1]^k` |
//! | Recover | [`genrec`] | Simulate with random parameters, fit back, compare |
//! | Populate | [`population`] + [`posterior`] | Simulate one subject per posterior mean vector |
//!
//! ## Parameter scales
//!
//! Optimizers work on the unit cube; [`params::ParameterSpace`] maps unit
//! values to each parameter's hard limits and writes them into a copy of the
//! fixed defaults.
//!
//! ## Determinism
//!
//! Every agent and task owns a `SmallRng` seeded explicitly. A replay always
//! rebuilds its agent from the configured seed, so the NLL of a parameter
//! vector is a pure function of that vector.

#![allow(clippy::needless_range_loop)]

pub mod agent;
pub mod config;
pub mod constants;
pub mod data;
pub mod env_config;
pub mod error;
pub mod fit;
pub mod genrec;
pub mod params;
pub mod population;
pub mod posterior;
pub mod record;
pub mod softmax;
pub mod task;
pub mod types;
