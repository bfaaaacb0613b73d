//! Core value types shared by tasks, agents and the fitting engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// One Aliens stimulus: the current context and the alien shown in it.
/// The switching task has no stimulus (`Option<Stimulus>::None`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stimulus {
    pub context: usize,
    pub alien: usize,
}

impl Stimulus {
    pub fn new(context: usize, alien: usize) -> Self {
        Self { context, alien }
    }
}

/// Which experiment a run models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSet {
    Aliens,
    #[serde(rename = "PS")]
    Ps,
}

impl DataSet {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSet::Aliens => "Aliens",
            DataSet::Ps => "PS",
        }
    }
}

impl FromStr for DataSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Aliens" => Ok(DataSet::Aliens),
            "PS" => Ok(DataSet::Ps),
            other => Err(Error::UnknownDataSet(other.to_string())),
        }
    }
}

/// Agent family. The first three learn the Aliens task, the last two the
/// switching task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningStyle {
    /// Flat learner that uses one shared task-set for every context.
    #[serde(rename = "s-flat")]
    SFlat,
    /// Flat learner with one task-set per context.
    #[serde(rename = "flat")]
    Flat,
    /// Learns context→task-set values on top of task-set→action values.
    #[serde(rename = "hierarchical")]
    Hierarchical,
    #[serde(rename = "RL")]
    Rl,
    #[serde(rename = "Bayes")]
    Bayes,
}

impl LearningStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LearningStyle::SFlat => "s-flat",
            LearningStyle::Flat => "flat",
            LearningStyle::Hierarchical => "hierarchical",
            LearningStyle::Rl => "RL",
            LearningStyle::Bayes => "Bayes",
        }
    }

    pub fn data_set(self) -> DataSet {
        match self {
            LearningStyle::SFlat | LearningStyle::Flat | LearningStyle::Hierarchical => {
                DataSet::Aliens
            }
            LearningStyle::Rl | LearningStyle::Bayes => DataSet::Ps,
        }
    }

    /// Flat agents pick their task-set deterministically from an identity-like
    /// context→task-set table.
    pub fn selects_deterministically(self) -> bool {
        matches!(self, LearningStyle::SFlat | LearningStyle::Flat)
    }

    pub fn ensure_data_set(self, data_set: DataSet) -> Result<()> {
        if self.data_set() == data_set {
            Ok(())
        } else {
            Err(Error::StyleMismatch {
                style: self.as_str(),
                data_set: data_set.as_str(),
            })
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s-flat" => Ok(LearningStyle::SFlat),
            "flat" => Ok(LearningStyle::Flat),
            "hierarchical" => Ok(LearningStyle::Hierarchical),
            "RL" => Ok(LearningStyle::Rl),
            "Bayes" => Ok(LearningStyle::Bayes),
            other => Err(Error::UnknownLearningStyle(other.to_string())),
        }
    }
}

/// Named task phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "1InitialLearning")]
    InitialLearning,
    #[serde(rename = "2CloudySeason")]
    CloudySeason,
    Refresher2,
    Refresher3,
    #[serde(rename = "PS")]
    Switching,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::InitialLearning => "1InitialLearning",
            Phase::CloudySeason => "2CloudySeason",
            Phase::Refresher2 => "Refresher2",
            Phase::Refresher3 => "Refresher3",
            Phase::Switching => "PS",
        }
    }

    /// Default phases of an Aliens simulation run, in order.
    pub fn simulated_alien_phases() -> Vec<Phase> {
        vec![Phase::InitialLearning, Phase::CloudySeason, Phase::Refresher2]
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1InitialLearning" => Ok(Phase::InitialLearning),
            "2CloudySeason" => Ok(Phase::CloudySeason),
            "Refresher2" => Ok(Phase::Refresher2),
            "Refresher3" => Ok(Phase::Refresher3),
            "PS" => Ok(Phase::Switching),
            other => Err(Error::InvalidConfig(format!("unknown phase '{}'", other))),
        }
    }
}

/// Table dimensions an agent is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDims {
    pub n_actions: usize,
    pub n_contexts: usize,
    pub n_aliens: usize,
}

impl TaskDims {
    pub fn aliens() -> Self {
        Self {
            n_actions: N_ALIEN_ACTIONS,
            n_contexts: N_CONTEXTS,
            n_aliens: N_ALIENS,
        }
    }

    pub fn switching() -> Self {
        Self {
            n_actions: N_BOXES,
            n_contexts: 1,
            n_aliens: 1,
        }
    }

    pub fn for_data_set(data_set: DataSet) -> Self {
        match data_set {
            DataSet::Aliens => Self::aliens(),
            DataSet::Ps => Self::switching(),
        }
    }

    pub fn check_stimulus(&self, stimulus: Stimulus) -> Result<()> {
        if stimulus.context >= self.n_contexts || stimulus.alien >= self.n_aliens {
            return Err(Error::StimulusOutOfRange {
                context: stimulus.context,
                alien: stimulus.alien,
            });
        }
        Ok(())
    }

    pub fn check_action(&self, action: usize) -> Result<()> {
        if action >= self.n_actions {
            return Err(Error::ActionOutOfRange {
                action,
                n_actions: self.n_actions,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_style_parse() {
        assert_eq!("flat".parse::<LearningStyle>().unwrap(), LearningStyle::Flat);
        assert_eq!("Bayes".parse::<LearningStyle>().unwrap(), LearningStyle::Bayes);
        assert!(matches!(
            "deep".parse::<LearningStyle>(),
            Err(Error::UnknownLearningStyle(_))
        ));
    }

    #[test]
    fn test_style_data_set_mismatch() {
        assert!(LearningStyle::Hierarchical
            .ensure_data_set(DataSet::Aliens)
            .is_ok());
        assert!(LearningStyle::Rl.ensure_data_set(DataSet::Aliens).is_err());
    }

    #[test]
    fn test_simulated_phases_in_order() {
        assert_eq!(
            Phase::simulated_alien_phases(),
            vec![Phase::InitialLearning, Phase::CloudySeason, Phase::Refresher2]
        );
    }
}
