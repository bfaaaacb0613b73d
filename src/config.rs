//! Run configuration.
//!
//! One [`RunConfig`] describes a simulate/fit/recover run: which experiment,
//! which agent, which parameters are free, how hard to minimize, and where
//! files go. It is loaded from JSON; every field has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::AgentConfig;
use crate::constants::N_TASK_SETS;
use crate::error::{Error, Result};
use crate::fit::optimize::{HoppingOptions, NelderMeadOptions, StepKernel};
use crate::params::ParameterSpace;
use crate::task::TaskConfig;
use crate::types::{DataSet, LearningStyle, Phase};

/// Grid search and basin-hopping settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizerConfig {
    /// Grid points per free parameter.
    pub brute_ns: usize,
    pub hoppin_stepsize: f64,
    pub hoppin_t: f64,
    /// Number of basin-hopping iterations.
    pub nm_niter: usize,
    pub nm_xatol: f64,
    pub nm_fatol: f64,
    pub nm_maxfev: usize,
    pub gaussian_steps: bool,
    /// Run the grid search and write path/minima CSVs.
    pub save_plot_data: bool,
    pub verbose: bool,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            brute_ns: 10,
            hoppin_stepsize: 0.5,
            hoppin_t: 0.5,
            nm_niter: 30,
            nm_xatol: 0.01,
            nm_fatol: 1e-4,
            nm_maxfev: 1000,
            gaussian_steps: false,
            save_plot_data: false,
            verbose: false,
        }
    }
}

impl MinimizerConfig {
    pub fn hopping_options(&self, seed: u64) -> HoppingOptions {
        HoppingOptions {
            niter: self.nm_niter,
            t: self.hoppin_t,
            stepsize: self.hoppin_stepsize,
            kernel: if self.gaussian_steps {
                StepKernel::Gaussian
            } else {
                StepKernel::Uniform
            },
            seed,
            local: NelderMeadOptions {
                xatol: self.nm_xatol,
                fatol: self.nm_fatol,
                maxfev: self.nm_maxfev,
                maxiter: None,
            },
        }
    }
}

/// Input and output locations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory searched for recorded behavior to fit.
    pub agent_data_path: PathBuf,
    /// Glob-style file name pattern (`*` wildcards).
    pub file_name_pattern: String,
    pub simulation_data_path: PathBuf,
    pub fitted_data_path: PathBuf,
    pub heatmap_data_path: PathBuf,
    /// Posterior archive used to seed population simulations.
    pub posterior_path: Option<PathBuf>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            agent_data_path: PathBuf::from("data/agents"),
            file_name_pattern: "*.csv".to_string(),
            simulation_data_path: PathBuf::from("data/simulations"),
            fitted_data_path: PathBuf::from("data/fitted"),
            heatmap_data_path: PathBuf::from("data/heatmaps"),
            posterior_path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_set: DataSet,
    pub learning_style: LearningStyle,
    pub mix_probs: bool,
    pub n_ts: usize,
    /// Seed of fitted agents; simulated subjects derive theirs from it.
    pub seed: u64,
    pub n_agents: usize,
    pub task: TaskConfig,
    pub parameters: ParameterSpace,
    pub minimizer: MinimizerConfig,
    pub paths: PathConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_set: DataSet::Aliens,
            learning_style: LearningStyle::Hierarchical,
            mix_probs: false,
            n_ts: N_TASK_SETS,
            seed: 42,
            n_agents: 2,
            task: TaskConfig::default(),
            parameters: ParameterSpace::default(),
            minimizer: MinimizerConfig::default(),
            paths: PathConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject combinations that cannot run.
    pub fn validate(&self) -> Result<()> {
        self.learning_style.ensure_data_set(self.data_set)?;
        self.parameters.validate()?;
        self.parameters.defaults.validate()?;
        if self.n_ts == 0 {
            return Err(Error::InvalidConfig("n_ts must be at least 1".to_string()));
        }
        let m = &self.minimizer;
        if m.brute_ns == 0 {
            return Err(Error::InvalidConfig("brute_ns must be at least 1".to_string()));
        }
        if !(m.hoppin_stepsize >= 0.0) || !(m.hoppin_t >= 0.0) {
            return Err(Error::InvalidConfig(
                "hoppin_stepsize and hoppin_t must be non-negative".to_string(),
            ));
        }
        if !(m.nm_xatol >= 0.0) || !(m.nm_fatol >= 0.0) || m.nm_maxfev == 0 {
            return Err(Error::InvalidConfig(
                "Nelder-Mead tolerances must be non-negative and maxfev positive".to_string(),
            ));
        }
        let t = &self.task;
        for (name, p) in [
            ("p_reward_correct", t.p_reward_correct),
            ("p_reward_incorrect", t.p_reward_incorrect),
            ("ps_p_reward", t.ps_p_reward),
            ("ps_p_switch", t.ps_p_switch),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!("{} = {} outside [0, 1]", name, p)));
            }
        }
        if self.data_set == DataSet::Aliens
            && (t.alien_phases.is_empty() || t.alien_phases.contains(&Phase::Switching))
        {
            return Err(Error::InvalidConfig(
                "alien_phases must list at least one Aliens phase and no PS phase".to_string(),
            ));
        }
        Ok(())
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            learning_style: self.learning_style,
            mix_probs: self.mix_probs,
            n_ts: self.n_ts,
            initial_q: self.task.initial_q(self.data_set),
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamName;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "data_set": "PS",
            "learning_style": "Bayes",
            "parameters": { "fit_pars": ["beta", "p_switch"] },
            "minimizer": { "brute_ns": 4 }
        }"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.parameters.fit_pars, vec![ParamName::Beta, ParamName::PSwitch]);
        assert_eq!(cfg.minimizer.brute_ns, 4);
        assert_eq!(cfg.minimizer.nm_maxfev, 1000);
        assert_eq!(cfg.agent_config().initial_q, 0.5);
    }

    #[test]
    fn test_alien_phases_from_json() {
        let json = r#"{ "task": { "alien_phases": ["Refresher3"] } }"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.task.alien_phases, vec![Phase::Refresher3]);

        let mut bad = cfg.clone();
        bad.task.alien_phases = vec![Phase::InitialLearning, Phase::Switching];
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
        bad.task.alien_phases.clear();
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_style_data_set_mismatch_rejected() {
        let cfg = RunConfig {
            data_set: DataSet::Ps,
            ..RunConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::StyleMismatch { .. })));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut cfg = RunConfig::default();
        cfg.minimizer.save_plot_data = true;
        cfg.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), cfg);
    }
}
