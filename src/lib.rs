pub mod audit;
pub mod bias;
pub mod config;
pub mod error;
pub mod explain;
pub mod mitigate;
pub mod model;
pub mod privacy;
pub mod report;
pub mod table;

pub use config::AuditConfig;
pub use error::{AuditError, Result};
pub use report::{Report, ReportKind};
