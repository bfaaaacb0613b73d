//! Minimizers over the unit cube.
//!
//! - [`brute`]: exhaustive grid with `ns` points per axis, endpoints included,
//!   evaluated in parallel with rayon
//! - [`nelder_mead`]: downhill simplex with the standard coefficients
//!   (reflection 1, expansion 2, contraction 0.5, shrink 0.5)
//! - [`basin_hopping`]: random perturbation + Nelder-Mead + Metropolis
//!   acceptance at temperature `t`, rejecting minima that leave `[0, 1]^k`
//!
//! Objectives take a unit-cube point and return an NLL; `+inf` marks an
//! infeasible point.

use std::path::Path;
use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::error::Result;
use crate::record::TrialLog;

#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub fun: f64,
    pub nfev: usize,
    pub nit: usize,
}

// ── Grid search ──────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct BruteResult {
    pub x: Vec<f64>,
    pub fun: f64,
    /// Every grid point with its objective value, in grid order.
    pub grid: Vec<(Vec<f64>, f64)>,
}

/// Axis values: `ns` evenly spaced points on `[0, 1]` (0.5 when `ns == 1`).
pub fn unit_axis(ns: usize) -> Vec<f64> {
    match ns {
        0 => Vec::new(),
        1 => vec![0.5],
        _ => (0..ns).map(|i| i as f64 / (ns - 1) as f64).collect(),
    }
}

fn grid_point(mut index: usize, axis: &[f64], n_dims: usize) -> Vec<f64> {
    let mut x = vec![0.0; n_dims];
    for d in (0..n_dims).rev() {
        x[d] = axis[index % axis.len()];
        index /= axis.len();
    }
    x
}

/// Evaluate `f` on the full grid and return the best point (first one on ties).
pub fn brute<F>(f: &F, n_dims: usize, ns: usize) -> BruteResult
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let axis = unit_axis(ns.max(1));
    let total = axis.len().pow(n_dims as u32);
    let grid: Vec<(Vec<f64>, f64)> = (0..total)
        .into_par_iter()
        .map(|i| {
            let x = grid_point(i, &axis, n_dims);
            let v = f(&x);
            (x, v)
        })
        .collect();

    let mut best = 0;
    for (i, (_, v)) in grid.iter().enumerate() {
        if v < &grid[best].1 {
            best = i;
        }
    }
    BruteResult {
        x: grid[best].0.clone(),
        fun: grid[best].1,
        grid,
    }
}

// ── Nelder-Mead ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct NelderMeadOptions {
    pub xatol: f64,
    pub fatol: f64,
    pub maxfev: usize,
    /// Defaults to `200 * n` when `None`.
    pub maxiter: Option<usize>,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            xatol: 1e-4,
            fatol: 1e-4,
            maxfev: 1000,
            maxiter: None,
        }
    }
}

const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;
const NONZDELT: f64 = 0.05;
const ZDELT: f64 = 0.00025;

/// `a + t * (b - a)` elementwise.
fn lerp(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(&ai, &bi)| ai + t * (bi - ai)).collect()
}

pub fn nelder_mead<F>(f: &F, x0: &[f64], opts: &NelderMeadOptions) -> OptimizeResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let maxiter = opts.maxiter.unwrap_or(200 * n.max(1));
    let mut nfev = 0usize;
    let eval = |x: &[f64], nfev: &mut usize| {
        *nfev += 1;
        f(x)
    };

    if n == 0 {
        let fun = eval(x0, &mut nfev);
        return OptimizeResult {
            x: Vec::new(),
            fun,
            nfev,
            nit: 0,
        };
    }

    let mut sim: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    sim.push(x0.to_vec());
    for k in 0..n {
        let mut y = x0.to_vec();
        y[k] = if y[k] != 0.0 { (1.0 + NONZDELT) * y[k] } else { ZDELT };
        sim.push(y);
    }
    let mut fsim: Vec<f64> = sim.iter().map(|x| eval(x, &mut nfev)).collect();

    let sort = |sim: &mut Vec<Vec<f64>>, fsim: &mut Vec<f64>| {
        let mut order: Vec<usize> = (0..sim.len()).collect();
        order.sort_by(|&a, &b| fsim[a].total_cmp(&fsim[b]));
        *sim = order.iter().map(|&i| sim[i].clone()).collect();
        *fsim = order.iter().map(|&i| fsim[i]).collect();
    };
    sort(&mut sim, &mut fsim);

    let mut nit = 0;
    while nfev < opts.maxfev && nit < maxiter {
        let x_spread = sim[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&sim[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = fsim[1..]
            .iter()
            .map(|v| (v - fsim[0]).abs())
            .fold(0.0, f64::max);
        if x_spread <= opts.xatol && f_spread <= opts.fatol {
            break;
        }

        let mut xbar = vec![0.0; n];
        for v in &sim[..n] {
            for (b, &vi) in xbar.iter_mut().zip(v) {
                *b += vi / n as f64;
            }
        }
        let worst = sim[n].clone();

        let xr = lerp(&xbar, &worst, -RHO);
        let fxr = eval(&xr, &mut nfev);
        let mut shrink = false;

        if fxr < fsim[0] {
            let xe = lerp(&xbar, &worst, -RHO * CHI);
            let fxe = eval(&xe, &mut nfev);
            if fxe < fxr {
                sim[n] = xe;
                fsim[n] = fxe;
            } else {
                sim[n] = xr;
                fsim[n] = fxr;
            }
        } else if fxr < fsim[n - 1] {
            sim[n] = xr;
            fsim[n] = fxr;
        } else if fxr < fsim[n] {
            let xc = lerp(&xbar, &worst, -PSI * RHO);
            let fxc = eval(&xc, &mut nfev);
            if fxc <= fxr {
                sim[n] = xc;
                fsim[n] = fxc;
            } else {
                shrink = true;
            }
        } else {
            let xcc = lerp(&xbar, &worst, PSI);
            let fxcc = eval(&xcc, &mut nfev);
            if fxcc < fsim[n] {
                sim[n] = xcc;
                fsim[n] = fxcc;
            } else {
                shrink = true;
            }
        }

        if shrink {
            for j in 1..=n {
                sim[j] = lerp(&sim[0], &sim[j], SIGMA);
                fsim[j] = eval(&sim[j], &mut nfev);
            }
        }

        sort(&mut sim, &mut fsim);
        nit += 1;
    }

    OptimizeResult {
        x: sim[0].clone(),
        fun: fsim[0],
        nfev,
        nit,
    }
}

// ── Basin hopping ────────────────────────────────────────────────────────

/// Perturbation applied before each local minimization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepKernel {
    /// Uniform shift in `[-stepsize, stepsize]` per coordinate.
    Uniform,
    /// Normal shift with standard deviation `stepsize`.
    Gaussian,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HoppingOptions {
    pub niter: usize,
    pub t: f64,
    pub stepsize: f64,
    pub kernel: StepKernel,
    pub seed: u64,
    pub local: NelderMeadOptions,
}

impl Default for HoppingOptions {
    fn default() -> Self {
        Self {
            niter: 30,
            t: 1.0,
            stepsize: 0.5,
            kernel: StepKernel::Uniform,
            seed: 0,
            local: NelderMeadOptions::default(),
        }
    }
}

/// Random displacement of `x`, clipped back into the unit cube.
pub fn take_step(x: &[f64], stepsize: f64, kernel: StepKernel, rng: &mut SmallRng) -> Vec<f64> {
    x.iter()
        .map(|&xi| {
            let shift = match kernel {
                StepKernel::Uniform => rng.random_range(-stepsize..=stepsize),
                StepKernel::Gaussian => {
                    let z: f64 = StandardNormal.sample(rng);
                    z * stepsize
                }
            };
            (xi + shift).clamp(0.0, 1.0)
        })
        .collect()
}

/// Accept test: the minimum must stay inside `[0, 1]^k`.
pub fn in_unit_cube(x: &[f64]) -> bool {
    x.iter().all(|&v| (0.0..=1.0).contains(&v))
}

fn metropolis(f_new: f64, f_old: f64, t: f64, rng: &mut SmallRng) -> bool {
    if f_new < f_old {
        return true;
    }
    if t <= 0.0 || !f_new.is_finite() {
        return false;
    }
    rng.random::<f64>() < (-(f_new - f_old) / t).exp()
}

/// Global minimization from `x0`. `callback(x, f, accepted)` sees every local
/// minimum found after the first.
pub fn basin_hopping<F>(
    f: &F,
    x0: &[f64],
    opts: &HoppingOptions,
    callback: &mut dyn FnMut(&[f64], f64, bool),
) -> OptimizeResult
where
    F: Fn(&[f64]) -> f64,
{
    let mut rng = SmallRng::seed_from_u64(opts.seed);
    let first = nelder_mead(f, x0, &opts.local);
    let mut nfev = first.nfev;
    let mut current = first.clone();
    let mut best = first;

    for _ in 0..opts.niter {
        let start = take_step(&current.x, opts.stepsize, opts.kernel, &mut rng);
        let local = nelder_mead(f, &start, &opts.local);
        nfev += local.nfev;

        let accepted =
            in_unit_cube(&local.x) && metropolis(local.fun, current.fun, opts.t, &mut rng);
        callback(&local.x, local.fun, accepted);
        if !accepted {
            tracing::debug!(fun = local.fun, "hop rejected");
            continue;
        }
        if local.fun < best.fun {
            best = local.clone();
        }
        current = local;
    }

    OptimizeResult {
        x: best.x,
        fun: best.fun,
        nfev,
        nit: opts.niter,
    }
}

// ── Path collection ──────────────────────────────────────────────────────

/// Records every evaluated point; shared across rayon workers.
pub struct PathCollector {
    colnames: Vec<String>,
    points: Mutex<Vec<(Vec<f64>, f64)>>,
}

impl PathCollector {
    pub fn new(colnames: &[&str]) -> Self {
        Self {
            colnames: colnames.iter().map(|s| s.to_string()).collect(),
            points: Mutex::new(Vec::new()),
        }
    }

    pub fn add_point(&self, x: &[f64], fun: f64) {
        if let Ok(mut points) = self.points.lock() {
            points.push((x.to_vec(), fun));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut points) = self.points.lock() {
            points.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.points.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_log(&self) -> TrialLog {
        let points = match self.points.lock() {
            Ok(p) => p.clone(),
            Err(_) => Vec::new(),
        };
        points_log(&self.colnames, points.iter().map(|(x, f)| (x.as_slice(), *f, None)))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        self.to_log().write_csv(path)
    }
}

/// Local minima visited by basin hopping, with their acceptance.
pub struct MinimaCollector {
    colnames: Vec<String>,
    minima: Vec<(Vec<f64>, f64, bool)>,
}

impl MinimaCollector {
    pub fn new(colnames: &[&str]) -> Self {
        Self {
            colnames: colnames.iter().map(|s| s.to_string()).collect(),
            minima: Vec::new(),
        }
    }

    pub fn add(&mut self, x: &[f64], fun: f64, accepted: bool) {
        self.minima.push((x.to_vec(), fun, accepted));
    }

    pub fn len(&self) -> usize {
        self.minima.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minima.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        points_log(
            &self.colnames,
            self.minima.iter().map(|(x, f, a)| (x.as_slice(), *f, Some(*a))),
        )
        .write_csv(path)
    }
}

/// Table with one column per parameter, then `NLL` and optionally `accepted`.
pub fn points_log<'a>(
    colnames: &[String],
    rows: impl Iterator<Item = (&'a [f64], f64, Option<bool>)>,
) -> TrialLog {
    let mut log = TrialLog::with_rows(0);
    for (row, (x, fun, accepted)) in rows.enumerate() {
        for (name, v) in colnames.iter().zip(x) {
            log.set(name, row, v);
        }
        log.set("NLL", row, fun);
        if let Some(a) = accepted {
            log.set("accepted", row, a);
        }
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl(x: &[f64]) -> f64 {
        (x[0] - 0.3).powi(2) + 2.0 * (x[1] - 0.7).powi(2)
    }

    #[test]
    fn test_unit_axis_includes_endpoints() {
        assert_eq!(unit_axis(3), vec![0.0, 0.5, 1.0]);
        assert_eq!(unit_axis(1), vec![0.5]);
    }

    #[test]
    fn test_brute_finds_grid_minimum() {
        let res = brute(&bowl, 2, 11);
        assert_eq!(res.grid.len(), 121);
        assert!((res.x[0] - 0.3).abs() < 1e-9);
        assert!((res.x[1] - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_nelder_mead_quadratic() {
        let opts = NelderMeadOptions {
            xatol: 1e-8,
            fatol: 1e-12,
            maxfev: 5000,
            maxiter: None,
        };
        let res = nelder_mead(&bowl, &[0.5, 0.5], &opts);
        assert!((res.x[0] - 0.3).abs() < 1e-4, "x={:?}", res.x);
        assert!((res.x[1] - 0.7).abs() < 1e-4, "x={:?}", res.x);
        assert!(res.nfev <= 5000);
    }

    #[test]
    fn test_nelder_mead_respects_maxfev() {
        let opts = NelderMeadOptions {
            xatol: 0.0,
            fatol: 0.0,
            maxfev: 20,
            maxiter: None,
        };
        let res = nelder_mead(&bowl, &[0.9, 0.1], &opts);
        // One iteration may overshoot by at most a shrink's worth of calls.
        assert!(res.nfev <= 20 + 3);
    }

    #[test]
    fn test_infinite_region_avoided() {
        let f = |x: &[f64]| {
            if in_unit_cube(x) {
                (x[0] - 0.9).powi(2)
            } else {
                f64::INFINITY
            }
        };
        let res = nelder_mead(&f, &[0.5], &NelderMeadOptions::default());
        assert!(res.fun.is_finite());
        assert!((res.x[0] - 0.9).abs() < 1e-2);
    }

    #[test]
    fn test_basin_hopping_escapes_local_minimum() {
        // Two wells; the deeper one is at 0.85.
        let f = |x: &[f64]| {
            if !in_unit_cube(x) {
                return f64::INFINITY;
            }
            let a = (x[0] - 0.15).powi(2);
            let b = (x[0] - 0.85).powi(2) - 0.05;
            a.min(b)
        };
        let opts = HoppingOptions {
            niter: 40,
            t: 0.1,
            stepsize: 0.5,
            seed: 3,
            ..HoppingOptions::default()
        };
        let mut n_minima = 0;
        let res = basin_hopping(&f, &[0.1], &opts, &mut |_, _, _| n_minima += 1);
        assert_eq!(n_minima, 40);
        assert!((res.x[0] - 0.85).abs() < 1e-2, "x={:?}", res.x);
    }

    #[test]
    fn test_take_step_stays_in_cube() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..200 {
            let x = take_step(&[0.0, 1.0], 2.0, StepKernel::Gaussian, &mut rng);
            assert!(in_unit_cube(&x));
        }
    }

    #[test]
    fn test_path_collector_log() {
        let paths = PathCollector::new(&["alpha", "beta"]);
        paths.add_point(&[0.1, 0.2], 3.0);
        paths.add_point(&[0.4, 0.5], 2.0);
        let log = paths.to_log();
        assert_eq!(log.n_rows(), 2);
        assert_eq!(log.cell("beta", 1), Some("0.5"));
        assert_eq!(log.cell("NLL", 0), Some("3"));
    }
}
