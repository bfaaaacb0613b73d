//! Simulation and maximum-likelihood fitting.
//!
//! Both paths share one trial step: the agent computes action probabilities
//! for the stimulus, an action and reward are obtained (from the task when
//! simulating, from recorded data when replaying), and the agent learns and
//! accumulates `log p(action)`.
//!
//! Replays always rebuild the agent from the same seed, so evaluating the
//! same parameters twice gives bit-identical NLLs.

pub mod optimize;

use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::agent::{Agent, AgentConfig};
use crate::config::{MinimizerConfig, RunConfig};
use crate::data::Observation;
use crate::error::{Error, Result};
use crate::params::{ParameterSpace, Parameters};
use crate::record::{RecordData, TrialLog};
use crate::task::{Task, TaskConfig};
use crate::types::{DataSet, Stimulus, TaskDims};

use optimize::{basin_hopping, brute, MinimaCollector, PathCollector};

/// Penalized fit of one parameter vector to one data set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitStats {
    pub nll: f64,
    pub bic: f64,
    pub aic: f64,
}

impl FitStats {
    /// `BIC = −2·LL + k·ln(n)`, `AIC = −2·LL + k`.
    pub fn new(log_likelihood: f64, n_fit_par: usize, n_trials: usize) -> Result<Self> {
        if n_trials == 0 {
            return Err(Error::EmptyData);
        }
        let k = n_fit_par as f64;
        Ok(Self {
            nll: -log_likelihood,
            bic: -2.0 * log_likelihood + k * (n_trials as f64).ln(),
            aic: -2.0 * log_likelihood + k,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FitResult {
    pub params: Parameters,
    /// Free parameters on the unit scale.
    pub unit: Vec<f64>,
    pub nll: f64,
}

/// Where a trial's action and reward come from.
pub enum Feedback<'a> {
    /// The agent acts and the task pays out.
    Task(&'a mut Task),
    /// Recorded behavior the agent is forced to observe.
    Observed { action: usize, reward: f64 },
}

/// One trial: select, obtain outcome, learn. Returns `(action, reward, correct)`;
/// `correct` is unknown (false) for observed trials.
pub fn step(agent: &mut Agent, stimulus: Option<Stimulus>, feedback: Feedback<'_>) -> Result<(usize, f64, bool)> {
    let chosen = agent.select_action(stimulus)?;
    let (action, reward, correct) = match feedback {
        Feedback::Task(task) => {
            let (reward, correct) = task.produce_reward(chosen)?;
            (chosen, reward, correct)
        }
        Feedback::Observed { action, reward } => (action, reward, false),
    };
    agent.learn(stimulus, action, reward)?;
    Ok((action, reward, correct))
}

pub struct FitParameters {
    data_set: DataSet,
    agent_config: AgentConfig,
    space: ParameterSpace,
    task_config: TaskConfig,
    minimizer: MinimizerConfig,
}

impl FitParameters {
    pub fn new(config: &RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data_set: config.data_set,
            agent_config: config.agent_config(),
            space: config.parameters.clone(),
            task_config: config.task.clone(),
            minimizer: config.minimizer.clone(),
        })
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn agent_config(&self) -> &AgentConfig {
        &self.agent_config
    }

    pub fn data_set(&self) -> DataSet {
        self.data_set
    }

    fn build_agent(&self, params: Parameters, seed: u64) -> Result<Agent> {
        let config = AgentConfig {
            seed,
            ..self.agent_config.clone()
        };
        Agent::new(&config, params, crate::types::TaskDims::for_data_set(self.data_set))
    }

    /// Run a fresh agent through a fresh task, phase by phase, and return its
    /// trial log with parameter columns appended.
    pub fn simulate_agent(&self, params: &Parameters, seed: u64, all_q_columns: bool) -> Result<TrialLog> {
        let mut task = Task::new(&self.task_config, self.data_set, seed)?;
        let mut agent = self.build_agent(params.clone(), seed)?;
        let mut record = RecordData::from_scratch(&task);

        let mut phase = None;
        for trial in 0..task.n_trials() {
            let this_phase = task.phase_at(trial);
            if phase != Some(this_phase) {
                agent.start_phase();
                phase = Some(this_phase);
            }
            let stimulus = task.present_stimulus(trial)?;
            let (action, reward, correct) = step(&mut agent, stimulus, Feedback::Task(&mut task))?;
            record.add_behavior(&task, stimulus, action, reward, correct, trial);
            record.add_decisions(&agent, trial, "", all_q_columns);
        }
        record.add_parameters(&agent, None, "");
        Ok(record.into_log())
    }

    /// Replay `obs` through a fresh agent (fixed seed), optionally recording
    /// per-trial decisions with `suffix`.
    fn replay(
        &self,
        params: &Parameters,
        obs: &[Observation],
        mut record: Option<(&mut RecordData, &str)>,
    ) -> Result<Agent> {
        let mut agent = self.build_agent(params.clone(), self.agent_config.seed)?;
        for (trial, o) in obs.iter().enumerate() {
            step(
                &mut agent,
                o.stimulus,
                Feedback::Observed {
                    action: o.action,
                    reward: o.reward,
                },
            )?;
            if let Some((record, suffix)) = record.as_mut() {
                record.add_decisions(&agent, trial, *suffix, false);
            }
        }
        Ok(agent)
    }

    /// NLL of `obs` under a full parameter vector.
    pub fn nll(&self, params: &Parameters, obs: &[Observation]) -> Result<f64> {
        Ok(-self.replay(params, obs, None)?.log_likelihood())
    }

    /// Minimizer objective: NLL at a unit-cube point of the free parameters.
    /// Points outside the cube, and points whose parameters the agent
    /// rejects, evaluate to `+inf`. Any other failure is returned.
    pub fn try_calculate_nll(&self, unit: &[f64], obs: &[Observation]) -> Result<f64> {
        if !optimize::in_unit_cube(unit) {
            return Ok(f64::INFINITY);
        }
        let params = self.space.assemble_unit(unit);
        match self.nll(&params, obs) {
            Ok(nll) => {
                if self.minimizer.verbose {
                    debug!(nll, ?unit, "objective");
                }
                Ok(nll)
            }
            Err(Error::InvalidParameter { .. }) => Ok(f64::INFINITY),
            Err(e) => Err(e),
        }
    }

    /// [`Self::try_calculate_nll`] with failures mapped to `+inf`.
    pub fn calculate_nll(&self, unit: &[f64], obs: &[Observation]) -> f64 {
        self.try_calculate_nll(unit, obs).unwrap_or(f64::INFINITY)
    }

    /// Every observation must index into the task's stimulus and action sets.
    fn check_observations(&self, obs: &[Observation]) -> Result<()> {
        let dims = TaskDims::for_data_set(self.data_set);
        for o in obs {
            if let Some(stimulus) = o.stimulus {
                dims.check_stimulus(stimulus)?;
            }
            dims.check_action(o.action)?;
        }
        Ok(())
    }

    pub fn calculate_fit(&self, params: &Parameters, obs: &[Observation]) -> Result<FitStats> {
        let agent = self.replay(params, obs, None)?;
        FitStats::new(agent.log_likelihood(), self.space.n_fit_par(), obs.len())
    }

    /// Copy of `log` with per-trial `LL_rec`/`p_action_rec` columns,
    /// parameters and fit statistics appended.
    pub fn add_decisions_and_fit(
        &self,
        params: &Parameters,
        log: &TrialLog,
        obs: &[Observation],
    ) -> Result<TrialLog> {
        let suffix = "_rec";
        let mut record = RecordData::add_to_existing(log.clone());
        let agent = self.replay(params, obs, Some((&mut record, suffix)))?;
        let stats = FitStats::new(agent.log_likelihood(), self.space.n_fit_par(), obs.len())?;
        record.add_parameters(&agent, Some(&self.space), suffix);
        record.add_fit(&stats, suffix);
        Ok(record.into_log())
    }

    /// Maximum-likelihood estimate: optional grid search, then basin hopping
    /// from the cube center. With `heatmap_dir` and `save_plot_data`, the
    /// grid, the evaluated path, the minima and the result are written there.
    pub fn get_optimal_pars(&self, obs: &[Observation], heatmap_dir: Option<&Path>) -> Result<FitResult> {
        if obs.is_empty() {
            return Err(Error::EmptyData);
        }
        self.check_observations(obs)?;
        let k = self.space.n_fit_par();
        if k == 0 {
            let params = self.space.defaults.clone();
            let nll = self.nll(&params, obs)?;
            return Ok(FitResult {
                params,
                unit: Vec::new(),
                nll,
            });
        }

        let names = self.space.fit_par_names();
        let plot_dir = heatmap_dir.filter(|_| self.minimizer.save_plot_data);
        let paths = plot_dir.map(|_| PathCollector::new(&names));
        let failure: Mutex<Option<Error>> = Mutex::new(None);
        let objective = |x: &[f64]| {
            let v = match self.try_calculate_nll(x, obs) {
                Ok(v) => v,
                Err(e) => {
                    if let Ok(mut slot) = failure.lock() {
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                    f64::INFINITY
                }
            };
            if let Some(p) = &paths {
                p.add_point(x, v);
            }
            v
        };

        if let (Some(dir), Some(p)) = (plot_dir, &paths) {
            let grid = brute(&objective, k, self.minimizer.brute_ns);
            take_failure(&failure)?;
            info!("Finished brute: best NLL {:.3} at {:?}", grid.fun, grid.x);
            let colnames: Vec<String> = names.iter().map(|s| s.to_string()).collect();
            optimize::points_log(
                &colnames,
                grid.grid.iter().map(|(x, f)| (x.as_slice(), *f, None)),
            )
            .write_csv(&dir.join("brute_results.csv"))?;
            p.clear();
        }

        let mut minima = MinimaCollector::new(&names);
        let opts = self.minimizer.hopping_options(self.agent_config.seed);
        let x0 = vec![0.5; k];
        let result = basin_hopping(&objective, &x0, &opts, &mut |x, f, accepted| {
            minima.add(x, f, accepted)
        });
        take_failure(&failure)?;

        if let (Some(dir), Some(p)) = (plot_dir, &paths) {
            let colnames: Vec<String> = names.iter().map(|s| s.to_string()).collect();
            optimize::points_log(&colnames, std::iter::once((result.x.as_slice(), result.fun, None)))
                .write_csv(&dir.join("hoppin_result.csv"))?;
            p.write_csv(&dir.join("hoppin_paths.csv"))?;
            minima.write_csv(&dir.join("hoppin_minima.csv"))?;
        }

        let params = self.space.assemble_unit(&result.x);
        info!(
            "Finished basin hopping with values {:?}, NLL {:.3} ({} evaluations)",
            names
                .iter()
                .zip(&result.x)
                .map(|(n, x)| format!("{}={:.3}", n, x))
                .collect::<Vec<_>>(),
            result.fun,
            result.nfev
        );
        Ok(FitResult {
            params,
            unit: result.x,
            nll: result.fun,
        })
    }

    /// Fit one recorded data file and write the annotated log to `out_dir`.
    pub fn fit_file(&self, path: &Path, out_dir: &Path, heatmap_root: Option<&Path>) -> Result<FitResult> {
        let (log, obs) = crate::data::load_observations(path, self.data_set)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data")
            .to_string();
        let heatmap_dir = heatmap_root.map(|root| root.join(&stem));
        let fit = self.get_optimal_pars(&obs, heatmap_dir.as_deref())?;
        let annotated = self.add_decisions_and_fit(&fit.params, &log, &obs)?;
        annotated.write_csv(&out_dir.join(format!("{}_fit.csv", stem)))?;
        Ok(fit)
    }
}

/// First error raised inside the objective, if any.
fn take_failure(failure: &Mutex<Option<Error>>) -> Result<()> {
    match failure.lock().ok().and_then(|mut slot| slot.take()) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamName;
    use crate::types::LearningStyle;

    fn fitter(style: LearningStyle, data_set: DataSet) -> FitParameters {
        let mut cfg = RunConfig {
            data_set,
            learning_style: style,
            ..RunConfig::default()
        };
        cfg.minimizer.nm_niter = 2;
        cfg.minimizer.nm_maxfev = 60;
        if data_set == DataSet::Ps {
            cfg.task.ps_n_trials = 40;
        }
        FitParameters::new(&cfg).unwrap()
    }

    fn observations_of(log: &TrialLog, data_set: DataSet) -> Vec<Observation> {
        crate::data::observations(log, data_set, "sim").unwrap()
    }

    #[test]
    fn test_fit_stats_formulas() {
        let s = FitStats::new(-10.0, 2, 100).unwrap();
        assert_eq!(s.nll, 10.0);
        assert!((s.bic - (20.0 + 2.0 * 100f64.ln())).abs() < 1e-12);
        assert_eq!(s.aic, 22.0);
        assert!(matches!(FitStats::new(-1.0, 1, 0), Err(Error::EmptyData)));
    }

    #[test]
    fn test_simulated_switching_log_columns() {
        let f = fitter(LearningStyle::Rl, DataSet::Ps);
        let log = f.simulate_agent(&Parameters::default(), 7, false).unwrap();
        assert_eq!(log.n_rows(), 40);
        for col in ["selected_box", "reward", "correct", "correct_box", "p_right", "LL", "Q_left", "Q_right", "alpha"] {
            assert!(log.has_column(col), "missing {}", col);
        }
    }

    #[test]
    fn test_simulated_aliens_all_q_columns() {
        let f = fitter(LearningStyle::Hierarchical, DataSet::Aliens);
        let log = f.simulate_agent(&Parameters::default(), 3, true).unwrap();
        assert_eq!(log.n_rows(), 468 + 120 + 168);
        assert!(log.has_column("Q_action2_alien3_TS2"));
        assert!(log.has_column("Q_TS0_context1"));
        assert!(log.has_column("p_TS2"));
        assert_eq!(log.cell("phase", 0), Some("1InitialLearning"));
    }

    #[test]
    fn test_nll_deterministic_and_out_of_cube_infinite() {
        let f = fitter(LearningStyle::Flat, DataSet::Aliens);
        let log = f.simulate_agent(&Parameters::default(), 5, false).unwrap();
        let obs = observations_of(&log, DataSet::Aliens);
        let a = f.calculate_nll(&[0.4, 0.3, 0.2], &obs);
        let b = f.calculate_nll(&[0.4, 0.3, 0.2], &obs);
        assert_eq!(a.to_bits(), b.to_bits());
        assert!(a.is_finite() && a > 0.0);
        assert_eq!(f.calculate_nll(&[1.2, 0.3, 0.2], &obs), f64::INFINITY);
    }

    #[test]
    fn test_replayed_ll_matches_simulation() {
        // Same seed: identical initial values and RNG stream, and flat agents
        // ignore phase boundaries.
        let f = fitter(LearningStyle::Flat, DataSet::Aliens);
        let pars = Parameters::default();
        let seed = f.agent_config().seed;
        let log = f.simulate_agent(&pars, seed, false).unwrap();
        let obs = observations_of(&log, DataSet::Aliens);
        let n = log.n_rows();
        let sim_ll: f64 = log.cell("LL", n - 1).unwrap().parse().unwrap();
        let nll = f.nll(&pars, &obs).unwrap();
        assert!((sim_ll + nll).abs() < 1e-6, "sim {} replay {}", sim_ll, nll);
    }

    #[test]
    fn test_add_decisions_and_fit_columns() {
        let f = fitter(LearningStyle::Bayes, DataSet::Ps);
        let log = f.simulate_agent(&Parameters::default(), 1, false).unwrap();
        let obs = observations_of(&log, DataSet::Ps);
        let out = f.add_decisions_and_fit(&Parameters::default(), &log, &obs).unwrap();
        for col in ["LL_rec", "p_action_rec", "alpha_rec", "fit_pars_rec", "NLL_rec", "BIC_rec", "AIC_rec"] {
            assert!(out.has_column(col), "missing {}", col);
        }
        assert_eq!(out.n_rows(), log.n_rows());
    }

    #[test]
    fn test_optimal_pars_within_limits() {
        let f = fitter(LearningStyle::Rl, DataSet::Ps);
        let log = f.simulate_agent(&Parameters::default(), 2, false).unwrap();
        let obs = observations_of(&log, DataSet::Ps);
        let fit = f.get_optimal_pars(&obs, None).unwrap();
        assert_eq!(fit.unit.len(), 3);
        assert!(optimize::in_unit_cube(&fit.unit));
        let (lo, hi) = f.space().limits(ParamName::Beta);
        assert!(fit.params.beta >= lo && fit.params.beta <= hi);
        let at_center = f.calculate_nll(&[0.5, 0.5, 0.5], &obs);
        assert!(fit.nll <= at_center);
    }

    #[test]
    fn test_bad_action_fails_the_fit() {
        let f = fitter(LearningStyle::Rl, DataSet::Ps);
        let log = f.simulate_agent(&Parameters::default(), 2, false).unwrap();
        let mut obs = observations_of(&log, DataSet::Ps);
        obs[3].action = 5;
        assert!(matches!(
            f.try_calculate_nll(&[0.5, 0.5, 0.5], &obs),
            Err(Error::ActionOutOfRange { action: 5, .. })
        ));
        assert!(matches!(
            f.get_optimal_pars(&obs, None),
            Err(Error::ActionOutOfRange { action: 5, .. })
        ));
    }

    #[test]
    fn test_rejected_parameters_are_infinite() {
        let mut cfg = RunConfig {
            data_set: DataSet::Ps,
            learning_style: LearningStyle::Rl,
            ..RunConfig::default()
        };
        cfg.task.ps_n_trials = 20;
        cfg.parameters.limits.insert(ParamName::Alpha, (0.0, 1.0));
        let f = FitParameters::new(&cfg).unwrap();
        let log = f.simulate_agent(&Parameters::default(), 2, false).unwrap();
        let obs = observations_of(&log, DataSet::Ps);
        // alpha = 0 is inside the cube but rejected by the agent
        assert_eq!(f.try_calculate_nll(&[0.0, 0.5, 0.5], &obs).unwrap(), f64::INFINITY);
        assert!(f.try_calculate_nll(&[0.5, 0.5, 0.5], &obs).unwrap().is_finite());
    }
}
