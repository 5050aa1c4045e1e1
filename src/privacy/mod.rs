//! Privacy probes: membership inference and the DP-SGD budget estimate.

pub mod dp;
pub mod membership;

pub use dp::{compute_epsilon, estimate, AccountantConfig, DpEstimate, DpParams, DELTA};
pub use membership::{threshold_attack, MembershipProbe, PrivacyReport, ProbeConfig};
