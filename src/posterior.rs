//! Posterior summaries of hierarchical fits, used to seed population
//! simulations.
//!
//! Archive layout (JSON):
//!
//! ```text
//! { "model_name": "...", "n_samples": 5000,
//!   "summary": { "alpha__0": { "mean": 0.31, "sd": 0.05 }, "alpha_mu": {...}, ... } }
//! ```
//!
//! Subject-level entries are keyed `<param>__<subject>`; anything else
//! (population means, variances) is ignored here.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::{ParamName, Parameters};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryStat {
    pub mean: f64,
    pub sd: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PosteriorArchive {
    pub model_name: String,
    pub n_samples: usize,
    pub summary: BTreeMap<String, SummaryStat>,
}

impl PosteriorArchive {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Per-subject posterior means of `param`, in subject order, for at most
    /// `max_n_subj` subjects.
    pub fn subject_means(&self, param: ParamName, max_n_subj: usize) -> Vec<f64> {
        let prefix = format!("{}__", param);
        let mut by_subject: Vec<(usize, f64)> = self
            .summary
            .iter()
            .filter_map(|(key, stat)| {
                let subj = key.strip_prefix(&prefix)?.parse::<usize>().ok()?;
                Some((subj, stat.mean))
            })
            .collect();
        by_subject.sort_by_key(|&(subj, _)| subj);
        by_subject
            .into_iter()
            .take(max_n_subj)
            .map(|(_, mean)| mean)
            .collect()
    }
}

/// One parameter vector per subject: `defaults` overridden by every posterior
/// mean present. `alpha_high`/`beta_high` follow `alpha`/`beta` when the
/// archive has no entries of their own.
pub fn population_parameters(
    archive: &PosteriorArchive,
    defaults: &Parameters,
    max_n_subj: usize,
) -> Result<Vec<Parameters>> {
    let means: Vec<(ParamName, Vec<f64>)> = ParamName::ALL
        .iter()
        .map(|&p| (p, archive.subject_means(p, max_n_subj)))
        .filter(|(_, m)| !m.is_empty())
        .collect();
    let n_subj = means.iter().map(|(_, m)| m.len()).max().unwrap_or(0);
    if n_subj == 0 {
        return Err(Error::MissingPosterior(archive.model_name.clone()));
    }
    if let Some((p, m)) = means.iter().find(|(_, m)| m.len() != n_subj) {
        return Err(Error::InvalidConfig(format!(
            "posterior '{}' has {} subjects for {} but {} elsewhere",
            archive.model_name,
            m.len(),
            p,
            n_subj
        )));
    }
    let has = |name: ParamName| means.iter().any(|(p, _)| *p == name);

    (0..n_subj)
        .map(|subj| {
            let mut pars = defaults.clone();
            for (name, m) in &means {
                pars.set(*name, m[subj]);
            }
            if !has(ParamName::AlphaHigh) {
                pars.alpha_high = pars.alpha;
            }
            if !has(ParamName::BetaHigh) {
                pars.beta_high = pars.beta;
            }
            pars.validate()?;
            Ok(pars)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> PosteriorArchive {
        let mut summary = BTreeMap::new();
        for (key, mean) in [
            ("alpha__0", 0.3),
            ("alpha__1", 0.6),
            ("alpha__10", 0.1),
            ("beta__0", 4.0),
            ("beta__1", 7.0),
            ("beta__10", 2.0),
            ("alpha_mu", 0.4),
        ] {
            summary.insert(key.to_string(), SummaryStat { mean, sd: 0.1 });
        }
        PosteriorArchive {
            model_name: "RL_alpha_beta".to_string(),
            n_samples: 100,
            summary,
        }
    }

    #[test]
    fn test_subject_means_numeric_order() {
        let a = archive();
        assert_eq!(a.subject_means(ParamName::Alpha, 10), vec![0.3, 0.6, 0.1]);
        assert_eq!(a.subject_means(ParamName::Alpha, 2), vec![0.3, 0.6]);
        assert!(a.subject_means(ParamName::Epsilon, 10).is_empty());
    }

    #[test]
    fn test_population_ties_high_level() {
        let pars = population_parameters(&archive(), &Parameters::default(), 10).unwrap();
        assert_eq!(pars.len(), 3);
        assert_eq!(pars[1].alpha, 0.6);
        assert_eq!(pars[1].alpha_high, 0.6);
        assert_eq!(pars[1].beta_high, 7.0);
        assert_eq!(pars[1].forget, Parameters::default().forget);
    }

    #[test]
    fn test_empty_archive_is_error() {
        let a = PosteriorArchive {
            model_name: "empty".to_string(),
            n_samples: 0,
            summary: BTreeMap::new(),
        };
        assert!(matches!(
            population_parameters(&a, &Parameters::default(), 5),
            Err(Error::MissingPosterior(_))
        ));
    }
}
