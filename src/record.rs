//! Trial log: one row per trial, named columns, written to CSV.
//!
//! [`TrialLog`] is a plain column table of string cells with insertion-ordered
//! columns. [`RecordData`] fills it from a running simulation or appends
//! replayed decisions and fit statistics to an existing log.
//!
//! | Method | Columns |
//! |--------|---------|
//! | `add_behavior` (Aliens) | `phase, context, sad_alien, item_chosen, reward, correct` |
//! | `add_behavior` (PS) | `selected_box, reward, correct, correct_box` |
//! | `add_decisions` | `LL, p_action, TS` / `p_right, Q_left, Q_right`, plus the full tables with `all_q_columns` |
//! | `add_parameters` | one column per parameter, `fit_pars, n_actions, n_TS` |
//! | `add_fit` | `NLL, BIC, AIC` |

use std::fs;
use std::path::Path;

use crate::agent::{Agent, AlienAgent, CompStimulus};
use crate::error::{Error, Result};
use crate::fit::FitStats;
use crate::params::{ParamName, ParameterSpace};
use crate::task::Task;
use crate::types::{Phase, Stimulus};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrialLog {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    n_rows: usize,
}

impl TrialLog {
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            n_rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    pub fn cell(&self, name: &str, row: usize) -> Option<&str> {
        self.column(name)
            .and_then(|col| col.get(row))
            .map(String::as_str)
    }

    fn column_mut(&mut self, name: &str) -> &mut Vec<String> {
        let i = match self.position(name) {
            Some(i) => i,
            None => {
                self.names.push(name.to_string());
                self.columns.push(vec![String::new(); self.n_rows]);
                self.names.len() - 1
            }
        };
        &mut self.columns[i]
    }

    fn ensure_rows(&mut self, n_rows: usize) {
        if n_rows > self.n_rows {
            for col in &mut self.columns {
                col.resize(n_rows, String::new());
            }
            self.n_rows = n_rows;
        }
    }

    /// Set one cell, creating the column (and growing the table) as needed.
    pub fn set(&mut self, name: &str, row: usize, value: impl ToString) {
        self.ensure_rows(row + 1);
        self.column_mut(name)[row] = value.to_string();
    }

    /// Set a column to the same value in every row.
    pub fn set_all(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        self.column_mut(name).iter_mut().for_each(|c| *c = value.clone());
    }

    /// Load a CSV with a header row. Quoted cells may contain commas; every
    /// record must have as many fields as the header.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| csv_error(&display, e))?;
        let names: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(&display, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Ok(Self::default());
        }
        let mut columns = vec![Vec::new(); names.len()];
        let mut n_rows = 0;
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(&display, e))?;
            for (col, field) in columns.iter_mut().zip(record.iter()) {
                col.push(field.to_string());
            }
            n_rows += 1;
        }
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(path)?;
        if !self.names.is_empty() {
            writer.write_record(&self.names)?;
            for row in 0..self.n_rows {
                writer.write_record(self.columns.iter().map(|c| c[row].as_str()))?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Unequal record lengths become [`Error::RaggedRow`] with the file line.
fn csv_error(path: &str, err: csv::Error) -> Error {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(e) = err.into_kind() {
            return Error::Io(e);
        }
        return Error::InvalidConfig(format!("{path}: unreadable CSV"));
    }
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => Error::RaggedRow {
            path: path.to_string(),
            line: pos.as_ref().map_or(0, |p| p.line() as usize),
            expected: *expected_len as usize,
            found: *len as usize,
        },
        _ => Error::Csv(err),
    }
}

/// Render a `[a, b, c]` list as `a;b;c` so it fits in one CSV cell.
fn join_cell<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

fn comp_label(stimulus: CompStimulus) -> String {
    match stimulus {
        CompStimulus::Context(c) => format!("context{}", c),
        CompStimulus::ContextAlien(Stimulus { context, alien }) => {
            format!("context{}_alien{}", context, alien)
        }
        CompStimulus::Item(i) => format!("item{}", i),
        CompStimulus::Alien(a) => format!("alien{}", a),
    }
}

pub struct RecordData {
    log: TrialLog,
}

impl RecordData {
    /// Empty log sized for every trial of `task`.
    pub fn from_scratch(task: &Task) -> Self {
        let mut log = TrialLog::with_rows(task.n_trials());
        for trial in 0..task.n_trials() {
            log.set("trial_index", trial, trial);
        }
        Self { log }
    }

    /// Wrap a loaded trial log; new columns are appended to it.
    pub fn add_to_existing(log: TrialLog) -> Self {
        Self { log }
    }

    /// Stimulus, action and outcome of one task trial.
    pub fn add_behavior(
        &mut self,
        task: &Task,
        stimulus: Option<Stimulus>,
        action: usize,
        reward: f64,
        correct: bool,
        trial: usize,
    ) {
        let log = &mut self.log;
        match stimulus {
            Some(Stimulus { context, alien }) => {
                log.set("phase", trial, task.phase_at(trial).as_str());
                log.set("context", trial, context);
                log.set("sad_alien", trial, alien);
                log.set("item_chosen", trial, action);
            }
            None => {
                log.set("selected_box", trial, action);
                if let Some(correct_box) = task.correct_box() {
                    log.set("correct_box", trial, correct_box);
                }
            }
        }
        log.set("reward", trial, reward);
        log.set("correct", trial, u8::from(correct));
    }

    /// Agent state after learning from trial `trial`.
    pub fn add_decisions(&mut self, agent: &Agent, trial: usize, suffix: &str, all_q_columns: bool) {
        let log = &mut self.log;
        let col = |name: &str| format!("{}{}", name, suffix);
        log.set(&col("LL"), trial, agent.log_likelihood());
        if let Some(action) = agent.prev_action() {
            log.set(&col("p_action"), trial, agent.p_actions()[action]);
        }
        match agent {
            Agent::Alien(a) => {
                log.set(&col("TS"), trial, a.current_ts());
                if all_q_columns {
                    record_alien_tables(log, a, trial, suffix);
                }
            }
            Agent::Switching(a) => {
                log.set(&col("p_right"), trial, a.p_right());
                if a.learning_style() == crate::types::LearningStyle::Rl {
                    log.set(&col("Q_left"), trial, a.q_left());
                    log.set(&col("Q_right"), trial, a.q_right());
                }
            }
        }
    }

    /// Parameter values as constant trailing columns.
    pub fn add_parameters(&mut self, agent: &Agent, space: Option<&ParameterSpace>, suffix: &str) {
        let log = &mut self.log;
        let params = agent.params();
        for name in ParamName::ALL {
            log.set_all(&format!("{}{}", name, suffix), params.get(name));
        }
        if let Some(space) = space {
            log.set_all(&format!("fit_pars{}", suffix), join_cell(&space.fit_par_names()));
        }
        log.set_all(&format!("n_actions{}", suffix), agent.n_actions());
        log.set_all(&format!("n_TS{}", suffix), agent.n_ts());
    }

    pub fn add_fit(&mut self, stats: &FitStats, suffix: &str) {
        self.log.set_all(&format!("NLL{}", suffix), stats.nll);
        self.log.set_all(&format!("BIC{}", suffix), stats.bic);
        self.log.set_all(&format!("AIC{}", suffix), stats.aic);
    }

    /// One preference trial: offered stimuli, the selected index, and the
    /// values and probabilities the agent assigned.
    pub fn add_behavior_and_decisions_comp(
        &mut self,
        agent: &AlienAgent,
        stimuli: &[CompStimulus],
        selected: usize,
        trial: usize,
        phase: Phase,
        comp_phase: &str,
    ) {
        let log = &mut self.log;
        log.set("phase", trial, phase.as_str());
        log.set("comp_phase", trial, comp_phase);
        let labels: Vec<String> = stimuli.iter().map(|&s| comp_label(s)).collect();
        log.set("stimuli", trial, join_cell(&labels));
        log.set("selected", trial, &labels[selected]);
        log.set("Q_stimuli", trial, join_cell(agent.q_stimuli()));
        log.set("p_stimuli", trial, join_cell(agent.p_stimuli()));
    }

    pub fn get(&self) -> TrialLog {
        self.log.clone()
    }

    pub fn into_log(self) -> TrialLog {
        self.log
    }
}

fn record_alien_tables(log: &mut TrialLog, a: &AlienAgent, trial: usize, suffix: &str) {
    let dims = a.dims();
    for (ts, p) in a.p_ts().iter().enumerate() {
        log.set(&format!("p_TS{}{}", ts, suffix), trial, p);
    }
    for ts in 0..a.n_ts() {
        for c in 0..dims.n_contexts {
            log.set(
                &format!("Q_TS{}_context{}{}", ts, c, suffix),
                trial,
                a.q_high_at(c, ts),
            );
        }
    }
    for (action, p) in a.p_actions().iter().enumerate() {
        log.set(&format!("p_action{}{}", action, suffix), trial, p);
    }
    for action in 0..dims.n_actions {
        for alien in 0..dims.n_aliens {
            for ts in 0..a.n_ts() {
                log.set(
                    &format!("Q_action{}_alien{}_TS{}{}", action, alien, ts, suffix),
                    trial,
                    a.q_low_at(ts, alien, action),
                );
            }
        }
    }
}
