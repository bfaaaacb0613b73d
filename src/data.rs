//! Loading recorded behavior for fitting.
//!
//! Required columns: Aliens `context, sad_alien, item_chosen, reward`;
//! PS `selected_box, reward`. Any missing column, unparseable cell or index
//! outside the task's dimensions is an error naming the file, line and raw
//! value.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::params::{ParamName, Parameters};
use crate::record::TrialLog;
use crate::types::{DataSet, Stimulus, TaskDims};

/// One observed trial, replayed through an agent during fitting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub stimulus: Option<Stimulus>,
    pub action: usize,
    pub reward: f64,
}

fn required<'a>(log: &'a TrialLog, name: &str, path: &str) -> Result<&'a [String]> {
    log.column(name).ok_or_else(|| Error::MissingColumn {
        path: path.to_string(),
        column: name.to_string(),
    })
}

fn malformed(path: &str, row: usize, column: &str, value: &str) -> Error {
    Error::MalformedCell {
        path: path.to_string(),
        line: row + 2,
        column: column.to_string(),
        value: value.to_string(),
    }
}

pub fn f64_column(log: &TrialLog, name: &str, path: &str) -> Result<Vec<f64>> {
    required(log, name, path)?
        .iter()
        .enumerate()
        .map(|(row, raw)| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(path, row, name, raw))
        })
        .collect()
}

/// Integer column; cells such as `2.0` are accepted and truncated.
pub fn int_column(log: &TrialLog, name: &str, path: &str) -> Result<Vec<usize>> {
    let raw = required(log, name, path)?;
    f64_column(log, name, path)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if v < 0.0 {
                Err(malformed(path, row, name, &raw[row]))
            } else {
                Ok(v as usize)
            }
        })
        .collect()
}

fn in_range(path: &str, column: &str, values: &[usize], limit: usize) -> Result<()> {
    match values.iter().position(|&v| v >= limit) {
        Some(row) => Err(Error::CellOutOfRange {
            path: path.to_string(),
            line: row + 2,
            column: column.to_string(),
            value: values[row],
            limit,
        }),
        None => Ok(()),
    }
}

/// Observations from a loaded trial log.
pub fn observations(log: &TrialLog, data_set: DataSet, path: &str) -> Result<Vec<Observation>> {
    let dims = TaskDims::for_data_set(data_set);
    let rewards = f64_column(log, "reward", path)?;
    let obs = match data_set {
        DataSet::Aliens => {
            let contexts = int_column(log, "context", path)?;
            let aliens = int_column(log, "sad_alien", path)?;
            let actions = int_column(log, "item_chosen", path)?;
            in_range(path, "context", &contexts, dims.n_contexts)?;
            in_range(path, "sad_alien", &aliens, dims.n_aliens)?;
            in_range(path, "item_chosen", &actions, dims.n_actions)?;
            (0..log.n_rows())
                .map(|i| Observation {
                    stimulus: Some(Stimulus::new(contexts[i], aliens[i])),
                    action: actions[i],
                    reward: rewards[i],
                })
                .collect()
        }
        DataSet::Ps => {
            let actions = int_column(log, "selected_box", path)?;
            in_range(path, "selected_box", &actions, dims.n_actions)?;
            (0..log.n_rows())
                .map(|i| Observation {
                    stimulus: None,
                    action: actions[i],
                    reward: rewards[i],
                })
                .collect()
        }
    };
    Ok(obs)
}

/// Read a CSV and extract its observations.
pub fn load_observations(path: &Path, data_set: DataSet) -> Result<(TrialLog, Vec<Observation>)> {
    let log = TrialLog::read_csv(path)?;
    let obs = observations(&log, data_set, &path.display().to_string())?;
    Ok((log, obs))
}

/// Parameter vector stored as constant `<name><suffix>` columns (first row).
/// Names without a column keep their value from `defaults`.
pub fn parameters_from_log(log: &TrialLog, suffix: &str, defaults: &Parameters, path: &str) -> Result<Parameters> {
    let mut pars = defaults.clone();
    for name in ParamName::ALL {
        let column = format!("{}{}", name, suffix);
        if let Some(raw) = log.cell(&column, 0) {
            let v = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(path, 0, &column, raw))?;
            pars.set(name, v);
        }
    }
    pars.validate()?;
    Ok(pars)
}

/// `*` matches any run of characters; everything else is literal.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !name.starts_with(first) || name.len() < first.len() + last.len() || !name.ends_with(last) {
        return false;
    }
    let mut rest = &name[first.len()..name.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

/// Files in `dir` whose names match `pattern`, sorted by name.
pub fn discover_data_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| wildcard_match(pattern, n))
        })
        .collect();
    if files.is_empty() {
        return Err(Error::NoDataFiles {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }
    files.sort();
    Ok(files)
}
