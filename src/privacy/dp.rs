//! Rényi-DP accountant for DP-SGD (sampled Gaussian mechanism).
//!
//! For a sampling rate `q`, noise multiplier `σ` and integer order `α` the
//! per-step RDP is `ln A_α / (α − 1)` with
//!
//! ```text
//! A_α = Σ_{i=0..α} C(α, i) · qⁱ · (1 − q)^(α−i) · exp((i² − i) / (2σ²))
//! ```
//!
//! RDP composes additively over steps and is converted to (ε, δ) with
//! `ε = rdp + ln((α − 1)/α) − (ln δ + ln α)/(α − 1)`, minimised over orders.

use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};

/// δ used for every estimate.
pub const DELTA: f64 = 1e-5;

/// Largest RDP order evaluated.
const MAX_ORDER: u32 = 256;

/// DP-SGD training hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpParams {
    pub noise_multiplier: f64,
    pub batch_size: u64,
    pub dataset_size: u64,
    pub epochs: u64,
}

impl DpParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.noise_multiplier.is_finite() && self.noise_multiplier > 0.0) {
            return Err(AuditError::config(format!(
                "noise_multiplier must be positive, got {}",
                self.noise_multiplier
            )));
        }
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("dataset_size", self.dataset_size),
            ("epochs", self.epochs),
        ] {
            if value == 0 {
                return Err(AuditError::config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Poisson sampling rate, capped at full-batch.
    pub fn sampling_rate(&self) -> f64 {
        (self.batch_size as f64 / self.dataset_size as f64).min(1.0)
    }

    /// Optimizer steps over all epochs.
    pub fn steps(&self) -> Result<u64> {
        if self.batch_size == 0 {
            return Err(AuditError::config("batch_size must be positive"));
        }
        self.epochs
            .checked_mul(self.dataset_size)
            .map(|samples| samples.div_ceil(self.batch_size))
            .ok_or_else(|| AuditError::config("epochs * dataset_size overflows"))
    }
}

/// Training hyperparameters assumed when the probe estimates ε for an uploaded model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountantConfig {
    pub noise_multiplier: f64,
    pub batch_size: u64,
    pub epochs: u64,
}

impl Default for AccountantConfig {
    fn default() -> Self {
        Self {
            noise_multiplier: 1.1,
            batch_size: 64,
            epochs: 10,
        }
    }
}

impl AccountantConfig {
    pub fn for_dataset(&self, dataset_size: u64) -> DpParams {
        DpParams {
            noise_multiplier: self.noise_multiplier,
            batch_size: self.batch_size,
            dataset_size,
            epochs: self.epochs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpEstimate {
    pub epsilon: f64,
    pub delta: f64,
    /// RDP order that gave the tightest bound.
    pub optimal_order: u32,
}

/// ε for the given training run at `DELTA`.
pub fn compute_epsilon(params: &DpParams) -> Result<f64> {
    Ok(estimate(params)?.epsilon)
}

pub fn estimate(params: &DpParams) -> Result<DpEstimate> {
    params.validate()?;

    let q = params.sampling_rate();
    let sigma = params.noise_multiplier;
    let steps = params.steps()? as f64;
    let ln_fact = ln_factorials(MAX_ORDER as usize);

    let (epsilon, optimal_order) = (2..=MAX_ORDER)
        .map(|alpha| {
            let rdp = steps * rdp_sampled_gaussian(q, sigma, alpha, &ln_fact);
            (rdp_to_epsilon(rdp, alpha as f64, DELTA), alpha)
        })
        .filter(|(eps, _)| eps.is_finite())
        .fold((f64::INFINITY, 2), |best, cur| if cur.0 < best.0 { cur } else { best });

    // σ² underflow or a huge step count leaves no order with a finite bound.
    if !epsilon.is_finite() {
        return Err(AuditError::config(format!(
            "no finite epsilon for noise_multiplier {} over {} steps",
            sigma, steps
        )));
    }

    Ok(DpEstimate {
        epsilon: epsilon.max(0.0),
        delta: DELTA,
        optimal_order,
    })
}

/// Per-step RDP of the sampled Gaussian mechanism at integer order `alpha`.
fn rdp_sampled_gaussian(q: f64, sigma: f64, alpha: u32, ln_fact: &[f64]) -> f64 {
    let a = alpha as f64;
    if q >= 1.0 {
        return a / (2.0 * sigma * sigma);
    }

    let (ln_q, ln_1mq) = (q.ln(), (-q).ln_1p());
    let n = alpha as usize;
    let log_a = (0..=n)
        .map(|i| {
            let fi = i as f64;
            let ln_binom = ln_fact[n] - ln_fact[i] - ln_fact[n - i];
            ln_binom + fi * ln_q + (a - fi) * ln_1mq + (fi * fi - fi) / (2.0 * sigma * sigma)
        })
        .fold(f64::NEG_INFINITY, log_add_exp);

    log_a / (a - 1.0)
}

fn rdp_to_epsilon(rdp: f64, alpha: f64, delta: f64) -> f64 {
    rdp + ((alpha - 1.0) / alpha).ln() - (delta.ln() + alpha.ln()) / (alpha - 1.0)
}

fn log_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// `ln k!` for k in 0..=n.
fn ln_factorials(n: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(n + 1);
    let mut acc = 0.0;
    out.push(acc);
    for k in 1..=n {
        acc += (k as f64).ln();
        out.push(acc);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(noise_multiplier: f64) -> DpParams {
        DpParams {
            noise_multiplier,
            batch_size: 64,
            dataset_size: 10_000,
            epochs: 10,
        }
    }

    #[test]
    fn epsilon_decreases_with_more_noise() {
        let eps: Vec<f64> = [0.7, 1.1, 2.0, 4.0, 8.0]
            .iter()
            .map(|&s| compute_epsilon(&params(s)).unwrap())
            .collect();
        for pair in eps.windows(2) {
            assert!(pair[0] > pair[1], "{:?}", eps);
        }
        assert!(eps.iter().all(|e| *e >= 0.0));
    }

    #[test]
    fn epsilon_grows_with_epochs() {
        let short = compute_epsilon(&params(1.1)).unwrap();
        let long = compute_epsilon(&DpParams {
            epochs: 50,
            ..params(1.1)
        })
        .unwrap();
        assert!(long > short);
    }

    #[test]
    fn mnist_reference_run_is_in_the_expected_range() {
        // 60k examples, batch 256, σ = 1.1, 60 epochs: ε ≈ 3 at δ = 1e-5.
        let eps = compute_epsilon(&DpParams {
            noise_multiplier: 1.1,
            batch_size: 256,
            dataset_size: 60_000,
            epochs: 60,
        })
        .unwrap();
        assert!(eps > 1.5 && eps < 4.5, "epsilon = {}", eps);
    }

    #[test]
    fn full_batch_uses_plain_gaussian_rdp() {
        let small = DpParams {
            noise_multiplier: 1.0,
            batch_size: 64,
            dataset_size: 10,
            epochs: 1,
        };
        assert_eq!(small.sampling_rate(), 1.0);
        assert_eq!(small.steps().unwrap(), 1);
        assert!(compute_epsilon(&small).unwrap().is_finite());
    }

    #[test]
    fn non_positive_inputs_are_configuration_errors() {
        for bad in [
            params(0.0),
            params(-1.0),
            params(f64::NAN),
            DpParams { batch_size: 0, ..params(1.0) },
            DpParams { dataset_size: 0, ..params(1.0) },
            DpParams { epochs: 0, ..params(1.0) },
        ] {
            assert!(matches!(
                compute_epsilon(&bad).unwrap_err(),
                AuditError::Configuration(_)
            ));
        }
    }

    #[test]
    fn step_count_overflow_is_a_configuration_error() {
        let huge = DpParams {
            noise_multiplier: 1.1,
            batch_size: 64,
            dataset_size: u64::MAX / 2,
            epochs: 3,
        };
        assert!(matches!(huge.steps(), Err(AuditError::Configuration(_))));
        assert!(matches!(
            compute_epsilon(&huge).unwrap_err(),
            AuditError::Configuration(_)
        ));
    }

    #[test]
    fn vanishing_noise_is_a_configuration_error() {
        let err = compute_epsilon(&params(1e-200)).unwrap_err();
        assert!(matches!(err, AuditError::Configuration(msg) if msg.contains("no finite epsilon")));
    }

    #[test]
    fn log_add_exp_handles_neg_infinity() {
        assert_eq!(log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert!((log_add_exp(0.0, 0.0) - 2f64.ln()).abs() < 1e-12);
    }
}
