//! Generate-and-recover: simulate agents with known random parameters, fit
//! them back, and tabulate simulated against recovered values.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

use crate::data::observations;
use crate::error::Result;
use crate::fit::{FitParameters, FitStats};
use crate::params::Parameters;
use crate::record::TrialLog;

/// One recovered agent.
#[derive(Clone, Debug, PartialEq)]
pub struct GenRecRow {
    pub agent: usize,
    pub simulated: Parameters,
    pub recovered: Parameters,
    pub stats: FitStats,
}

/// Free parameters drawn uniformly on the unit cube, mapped to their limits.
pub fn random_parameters(fitter: &FitParameters, seed: u64) -> Parameters {
    let mut rng = SmallRng::seed_from_u64(seed);
    let unit: Vec<f64> = (0..fitter.space().n_fit_par())
        .map(|_| rng.random::<f64>())
        .collect();
    fitter.space().assemble_unit(&unit)
}

fn recover_one(fitter: &FitParameters, agent: usize, seed: u64) -> Result<GenRecRow> {
    let simulated = random_parameters(fitter, seed);
    let log = fitter.simulate_agent(&simulated, seed, false)?;
    let obs = observations(&log, fitter.data_set(), &format!("agent {}", agent))?;
    let fit = fitter.get_optimal_pars(&obs, None)?;
    let stats = fitter.calculate_fit(&fit.params, &obs)?;
    Ok(GenRecRow {
        agent,
        simulated,
        recovered: fit.params,
        stats,
    })
}

/// Run `n_agents` generate-and-recover rounds in parallel (agent `i` uses
/// seed `base_seed + i`).
pub fn generate_and_recover(fitter: &FitParameters, n_agents: usize, base_seed: u64) -> Result<Vec<GenRecRow>> {
    let rows = (0..n_agents)
        .into_par_iter()
        .map(|agent| recover_one(fitter, agent, base_seed + agent as u64))
        .collect::<Result<Vec<_>>>()?;
    info!("Recovered {} agents", rows.len());
    Ok(rows)
}

/// `agent, learning_style, NLL, BIC, AIC, sim_<par>…, rec_<par>…` for the
/// free parameters.
pub fn genrec_log(fitter: &FitParameters, rows: &[GenRecRow]) -> TrialLog {
    let mut log = TrialLog::with_rows(rows.len());
    let style = fitter.agent_config().learning_style;
    for (i, row) in rows.iter().enumerate() {
        log.set("agent", i, row.agent);
        log.set("learning_style", i, style);
        log.set("NLL", i, row.stats.nll);
        log.set("BIC", i, row.stats.bic);
        log.set("AIC", i, row.stats.aic);
        for &name in &fitter.space().fit_pars {
            log.set(&format!("sim_{}", name), i, row.simulated.get(name));
        }
        for &name in &fitter.space().fit_pars {
            log.set(&format!("rec_{}", name), i, row.recovered.get(name));
        }
    }
    log
}

pub fn write_genrec(fitter: &FitParameters, rows: &[GenRecRow], path: &Path) -> Result<()> {
    genrec_log(fitter, rows).write_csv(path)
}
