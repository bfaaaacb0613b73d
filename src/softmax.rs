//! Softmax-with-epsilon choice rule and categorical sampling.
//!
//! Probabilities use the pairwise form
//!
//! ```text
//! p_i = 1 / (1 + Σ_{j≠i} exp(β·(Q_j − Q_i)))
//! p_i ← ε/k + (1 − ε)·p_i
//! ```
//!
//! which never exponentiates a large positive β·Q on its own. The result must
//! sum to 1 at three decimals; anything else is a numerical defect and panics.

use rand::Rng;

use crate::constants::PROB_MASS_TOLERANCE;

/// Softmax with inverse temperature `beta` and ε-noise over `q`.
pub fn p_from_q(q: &[f64], beta: f64, epsilon: f64) -> Vec<f64> {
    let k = q.len();
    let mut p = Vec::with_capacity(k);
    for i in 0..k {
        let mut denominator = 1.0;
        for j in 0..k {
            if j != i {
                denominator += (beta * (q[j] - q[i])).exp();
            }
        }
        p.push(1.0 / denominator);
    }
    let floor = epsilon / k as f64;
    for pi in &mut p {
        *pi = floor + (1.0 - epsilon) * *pi;
    }
    assert_probability_mass(&p);
    p
}

/// One-hot selection of the unique entry equal to 1.
///
/// Panics unless exactly one value equals 1.
pub fn select_deterministic(q: &[f64]) -> Vec<f64> {
    let n_ones = q.iter().filter(|&&v| v == 1.0).count();
    assert_eq!(
        n_ones, 1,
        "deterministic selection needs exactly one value equal to 1, got {:?}",
        q
    );
    let p: Vec<f64> = q.iter().map(|&v| if v == 1.0 { 1.0 } else { 0.0 }).collect();
    assert_probability_mass(&p);
    p
}

#[inline]
pub fn assert_probability_mass(p: &[f64]) {
    let total: f64 = p.iter().sum();
    assert!(
        (total - 1.0).abs() <= PROB_MASS_TOLERANCE,
        "probabilities sum to {} instead of 1: {:?}",
        total,
        p
    );
}

/// Draw an index from a categorical distribution.
pub fn sample_index(p: &[f64], rng: &mut impl Rng) -> usize {
    debug_assert!(!p.is_empty());
    let total: f64 = p.iter().sum();
    let mut r = rng.random::<f64>() * total;
    for (i, &w) in p.iter().enumerate() {
        r -= w;
        if r < 0.0 {
            return i;
        }
    }
    // Rounding: fall back to the last index with positive mass.
    p.iter().rposition(|&w| w > 0.0).unwrap_or(p.len() - 1)
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
