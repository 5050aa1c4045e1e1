//! Confidence-threshold membership inference.
//!
//! Training rows are "members"; copies of them with Gaussian noise added to
//! every feature stand in for non-members. The attack calls a row a member
//! when the model's top-class confidence reaches the mean non-member
//! confidence, and the report gives the balanced accuracy of that guess.

use crate::error::{AuditError, Result};
use crate::model::{max_confidences, require_probabilities, Classifier};
use crate::privacy::dp::{compute_epsilon, AccountantConfig};
use crate::table::{Table, LABEL};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const DEFAULT_NOISE_STD: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Std-dev of the noise added to each feature of the synthetic rows.
    pub noise_std: f64,
    /// Fixed seed for reproducible runs; `None` draws a fresh seed per call.
    pub seed: Option<u64>,
    pub accountant: AccountantConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            noise_std: DEFAULT_NOISE_STD,
            seed: None,
            accountant: AccountantConfig::default(),
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(AuditError::config(format!(
                "noise_std must be a non-negative number, got {}",
                self.noise_std
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyReport {
    /// 0.5 is chance (nothing leaks), 1.0 separates members perfectly.
    pub membership_inference_attack_accuracy: f64,
    pub threshold: f64,
    pub train_member_confidences_mean: f64,
    pub synthetic_confidences_mean: f64,
    pub differential_privacy_epsilon: f64,
}

/// Outcome of thresholding two confidence samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackOutcome {
    pub threshold: f64,
    pub attack_accuracy: f64,
    pub member_mean: f64,
    pub non_member_mean: f64,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Threshold at the mean non-member confidence; `>=` means "member".
pub fn threshold_attack(members: &[f64], non_members: &[f64]) -> AttackOutcome {
    let threshold = mean(non_members);
    let true_members = members.iter().filter(|&&c| c >= threshold).count();
    let true_non_members = non_members.iter().filter(|&&c| c < threshold).count();

    let member_rate = true_members as f64 / members.len() as f64;
    let non_member_rate = true_non_members as f64 / non_members.len() as f64;

    AttackOutcome {
        threshold,
        attack_accuracy: 0.5 * (member_rate + non_member_rate),
        member_mean: mean(members),
        non_member_mean: threshold,
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembershipProbe {
    config: ProbeConfig,
}

impl MembershipProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run one trial with an RNG local to this call.
    #[instrument(level = "info", skip_all, fields(rows = train.num_rows(), seeded = self.config.seed.is_some()))]
    pub fn run(&self, model: &dyn Classifier, train: &Table) -> Result<PrivacyReport> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with_rng(model, train, &mut rng)
    }

    /// Run one trial drawing the synthetic noise from `rng`.
    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        model: &dyn Classifier,
        train: &Table,
        rng: &mut R,
    ) -> Result<PrivacyReport> {
        let scorer = require_probabilities(model)?;
        self.config.validate()?;
        train.require_rows()?;

        // 1) member confidences
        let features = train.feature_matrix(|c| c == LABEL)?;
        let member_conf = max_confidences(scorer, &features)?;

        // 2) synthetic non-members, same shape
        let noise = Normal::new(0.0, self.config.noise_std)
            .map_err(|e| AuditError::config(format!("noise distribution: {}", e)))?;
        let synthetic = features.map_values(|v| v + noise.sample(&mut *rng));
        let synthetic_conf = max_confidences(scorer, &synthetic)?;

        // 3) threshold attack
        let outcome = threshold_attack(&member_conf, &synthetic_conf);

        // 4) privacy budget for the assumed training run
        let epsilon = compute_epsilon(
            &self
                .config
                .accountant
                .for_dataset(features.num_rows() as u64),
        )?;

        debug!(
            attack_accuracy = outcome.attack_accuracy,
            threshold = outcome.threshold,
            epsilon,
            "membership probe"
        );
        Ok(PrivacyReport {
            membership_inference_attack_accuracy: outcome.attack_accuracy,
            threshold: outcome.threshold,
            train_member_confidences_mean: outcome.member_mean,
            synthetic_confidences_mean: outcome.non_member_mean,
            differential_privacy_epsilon: epsilon,
        })
    }
}
