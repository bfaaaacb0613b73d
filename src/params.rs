//! Parameter vectors, the free/fixed split used for fitting, and the three
//! scales a parameter value can live on.
//!
//! | Scale | Range | Used by |
//! |-------|-------|---------|
//! | unit | `[0, 1]` | optimizers (grid, Nelder-Mead, basin-hopping) |
//! | limited | `[lo, hi]` hard limits | agents |
//! | unbounded | `(-inf, inf)` via logit | gradient-free search without bounds |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Every named model parameter, in the fixed vector order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    Alpha,
    AlphaHigh,
    Beta,
    BetaHigh,
    Epsilon,
    Forget,
    ForgetHigh,
    SuppressPrevTs,
    Nalpha,
    Calpha,
    Cnalpha,
    PSwitch,
    PReward,
}

impl ParamName {
    pub const ALL: [ParamName; 13] = [
        ParamName::Alpha,
        ParamName::AlphaHigh,
        ParamName::Beta,
        ParamName::BetaHigh,
        ParamName::Epsilon,
        ParamName::Forget,
        ParamName::ForgetHigh,
        ParamName::SuppressPrevTs,
        ParamName::Nalpha,
        ParamName::Calpha,
        ParamName::Cnalpha,
        ParamName::PSwitch,
        ParamName::PReward,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamName::Alpha => "alpha",
            ParamName::AlphaHigh => "alpha_high",
            ParamName::Beta => "beta",
            ParamName::BetaHigh => "beta_high",
            ParamName::Epsilon => "epsilon",
            ParamName::Forget => "forget",
            ParamName::ForgetHigh => "forget_high",
            ParamName::SuppressPrevTs => "suppress_prev_ts",
            ParamName::Nalpha => "nalpha",
            ParamName::Calpha => "calpha",
            ParamName::Cnalpha => "cnalpha",
            ParamName::PSwitch => "p_switch",
            ParamName::PReward => "p_reward",
        }
    }

    /// Hard limits used when no limits are configured.
    pub fn default_limits(self) -> (f64, f64) {
        match self {
            ParamName::Alpha | ParamName::AlphaHigh => (0.001, 1.0),
            ParamName::Beta | ParamName::BetaHigh => (1.0, 20.0),
            ParamName::PReward => (0.5, 1.0),
            _ => (0.0, 1.0),
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParamName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::UnknownParameter(s.to_string()))
    }
}

/// Full parameter vector at the limited scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub alpha: f64,
    pub alpha_high: f64,
    pub beta: f64,
    pub beta_high: f64,
    pub epsilon: f64,
    pub forget: f64,
    pub forget_high: f64,
    pub suppress_prev_ts: f64,
    pub nalpha: f64,
    pub calpha: f64,
    pub cnalpha: f64,
    pub p_switch: f64,
    pub p_reward: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            alpha_high: 0.2,
            beta: 5.0,
            beta_high: 5.0,
            epsilon: 0.0,
            forget: 0.05,
            forget_high: 0.0,
            suppress_prev_ts: 0.0,
            nalpha: 0.2,
            calpha: 0.0,
            cnalpha: 0.0,
            p_switch: 0.05,
            p_reward: 0.75,
        }
    }
}

impl Parameters {
    pub fn get(&self, name: ParamName) -> f64 {
        match name {
            ParamName::Alpha => self.alpha,
            ParamName::AlphaHigh => self.alpha_high,
            ParamName::Beta => self.beta,
            ParamName::BetaHigh => self.beta_high,
            ParamName::Epsilon => self.epsilon,
            ParamName::Forget => self.forget,
            ParamName::ForgetHigh => self.forget_high,
            ParamName::SuppressPrevTs => self.suppress_prev_ts,
            ParamName::Nalpha => self.nalpha,
            ParamName::Calpha => self.calpha,
            ParamName::Cnalpha => self.cnalpha,
            ParamName::PSwitch => self.p_switch,
            ParamName::PReward => self.p_reward,
        }
    }

    pub fn set(&mut self, name: ParamName, value: f64) {
        let slot = match name {
            ParamName::Alpha => &mut self.alpha,
            ParamName::AlphaHigh => &mut self.alpha_high,
            ParamName::Beta => &mut self.beta,
            ParamName::BetaHigh => &mut self.beta_high,
            ParamName::Epsilon => &mut self.epsilon,
            ParamName::Forget => &mut self.forget,
            ParamName::ForgetHigh => &mut self.forget_high,
            ParamName::SuppressPrevTs => &mut self.suppress_prev_ts,
            ParamName::Nalpha => &mut self.nalpha,
            ParamName::Calpha => &mut self.calpha,
            ParamName::Cnalpha => &mut self.cnalpha,
            ParamName::PSwitch => &mut self.p_switch,
            ParamName::PReward => &mut self.p_reward,
        };
        *slot = value;
    }

    /// High-level learning rate, temperature and forgetting follow the
    /// low-level ones.
    pub fn with_tied_high_level(mut self) -> Self {
        self.alpha_high = self.alpha;
        self.beta_high = self.beta;
        self.forget_high = self.forget;
        self
    }

    /// Agent preconditions: α > 0, β ≥ 1, 0 ≤ ε ≤ 1, and every rate or
    /// probability inside [0, 1].
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0) {
            return Err(invalid(ParamName::Alpha, self.alpha, "must be > 0"));
        }
        if !(self.beta >= 1.0) {
            return Err(invalid(ParamName::Beta, self.beta, "must be >= 1"));
        }
        if !(self.epsilon >= 0.0) {
            return Err(invalid(ParamName::Epsilon, self.epsilon, "must be >= 0"));
        }
        if self.epsilon > 1.0 {
            return Err(invalid(ParamName::Epsilon, self.epsilon, "must be <= 1"));
        }
        if !(self.beta_high >= 1.0) {
            return Err(invalid(ParamName::BetaHigh, self.beta_high, "must be >= 1"));
        }
        for name in [
            ParamName::AlphaHigh,
            ParamName::Forget,
            ParamName::ForgetHigh,
            ParamName::SuppressPrevTs,
            ParamName::Nalpha,
            ParamName::Calpha,
            ParamName::Cnalpha,
            ParamName::PSwitch,
            ParamName::PReward,
        ] {
            let v = self.get(name);
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(name, v, "must lie in [0, 1]"));
            }
        }
        Ok(())
    }
}

fn invalid(name: ParamName, value: f64, reason: &'static str) -> Error {
    Error::InvalidParameter {
        name: name.as_str(),
        value,
        reason,
    }
}

// ── Scales ────────────────────────────────────────────────────────────────

/// Map a unit-scale value to `[lo, hi]`.
#[inline]
pub fn unit_to_limited(x: f64, (lo, hi): (f64, f64)) -> f64 {
    lo + x * (hi - lo)
}

/// Map a `[lo, hi]` value to the unit scale.
#[inline]
pub fn limited_to_unit(v: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi == lo {
        0.0
    } else {
        (v - lo) / (hi - lo)
    }
}

/// Logit: unit scale to unbounded scale.
#[inline]
pub fn unit_to_unbounded(x: f64) -> f64 {
    -(1.0 / x - 1.0).ln()
}

/// Sigmoid: unbounded scale to unit scale.
#[inline]
pub fn unbounded_to_unit(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ── Parameter space ───────────────────────────────────────────────────────

/// Which parameters are fitted, what the fixed ones default to, and the hard
/// limits of each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSpace {
    pub fit_pars: Vec<ParamName>,
    pub defaults: Parameters,
    pub limits: BTreeMap<ParamName, (f64, f64)>,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self {
            fit_pars: vec![ParamName::Alpha, ParamName::Beta, ParamName::Forget],
            defaults: Parameters::default(),
            limits: BTreeMap::new(),
        }
    }
}

impl ParameterSpace {
    pub fn new(fit_pars: Vec<ParamName>, defaults: Parameters) -> Self {
        Self {
            fit_pars,
            defaults,
            limits: BTreeMap::new(),
        }
    }

    pub fn n_fit_par(&self) -> usize {
        self.fit_pars.len()
    }

    pub fn limits(&self, name: ParamName) -> (f64, f64) {
        self.limits
            .get(&name)
            .copied()
            .unwrap_or_else(|| name.default_limits())
    }

    pub fn fit_par_names(&self) -> Vec<&'static str> {
        self.fit_pars.iter().map(|p| p.as_str()).collect()
    }

    /// Write free values (limited scale) into a copy of the defaults.
    pub fn assemble(&self, free_limited: &[f64]) -> Parameters {
        debug_assert_eq!(free_limited.len(), self.fit_pars.len());
        let mut pars = self.defaults.clone();
        for (&name, &v) in self.fit_pars.iter().zip(free_limited) {
            pars.set(name, v);
        }
        pars
    }

    /// Unit-scale free values to a full limited-scale vector.
    pub fn assemble_unit(&self, free_unit: &[f64]) -> Parameters {
        let limited: Vec<f64> = self
            .fit_pars
            .iter()
            .zip(free_unit)
            .map(|(&name, &x)| unit_to_limited(x, self.limits(name)))
            .collect();
        self.assemble(&limited)
    }

    /// Free values of `pars` on the unit scale.
    pub fn free_unit(&self, pars: &Parameters) -> Vec<f64> {
        self.fit_pars
            .iter()
            .map(|&name| limited_to_unit(pars.get(name), self.limits(name)))
            .collect()
    }

    /// Unbounded-scale free values to a full limited-scale vector.
    pub fn assemble_unbounded(&self, free_unbounded: &[f64]) -> Parameters {
        let unit: Vec<f64> = free_unbounded.iter().map(|&z| unbounded_to_unit(z)).collect();
        self.assemble_unit(&unit)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, p) in self.fit_pars.iter().enumerate() {
            if self.fit_pars[..i].contains(p) {
                return Err(Error::InvalidConfig(format!(
                    "parameter '{}' listed twice in fit_pars",
                    p
                )));
            }
        }
        for (&name, &(lo, hi)) in &self.limits {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(Error::InvalidConfig(format!(
                    "invalid limits [{}, {}] for '{}'",
                    lo, hi, name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_name_round_trip() {
        for p in ParamName::ALL {
            assert_eq!(p.as_str().parse::<ParamName>().unwrap(), p);
        }
        assert!("gamma".parse::<ParamName>().is_err());
    }

    #[test]
    fn test_assemble_overrides_only_free() {
        let space = ParameterSpace::new(vec![ParamName::Beta, ParamName::Alpha], Parameters::default());
        let pars = space.assemble(&[7.0, 0.4]);
        assert_eq!(pars.beta, 7.0);
        assert_eq!(pars.alpha, 0.4);
        assert_eq!(pars.forget, Parameters::default().forget);
    }

    #[test]
    fn test_unit_scale_maps_to_limits() {
        let space = ParameterSpace::new(vec![ParamName::Beta], Parameters::default());
        assert_eq!(space.assemble_unit(&[0.0]).beta, 1.0);
        assert_eq!(space.assemble_unit(&[1.0]).beta, 20.0);
        let back = space.free_unit(&space.assemble_unit(&[0.25]));
        assert!((back[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_logit_sigmoid_inverse() {
        for &x in &[0.01, 0.3, 0.5, 0.77, 0.99] {
            assert!((unbounded_to_unit(unit_to_unbounded(x)) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_validate_preconditions() {
        let mut p = Parameters::default();
        assert!(p.validate().is_ok());
        p.alpha = 0.0;
        assert!(p.validate().is_err());
        p.alpha = 0.1;
        p.beta = 0.5;
        assert!(p.validate().is_err());
        p.beta = 1.0;
        p.epsilon = -0.01;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_unbounded_zero_is_midpoint() {
        let space = ParameterSpace::new(vec![ParamName::Beta], Parameters::default());
        let (lo, hi) = space.limits(ParamName::Beta);
        let pars = space.assemble_unbounded(&[0.0]);
        assert!((pars.beta - (lo + hi) / 2.0).abs() < 1e-12);
        assert_eq!(pars.alpha, Parameters::default().alpha);
    }

    #[test]
    fn test_duplicate_fit_par_rejected() {
        let space = ParameterSpace::new(vec![ParamName::Alpha, ParamName::Alpha], Parameters::default());
        assert!(space.validate().is_err());
    }
}
