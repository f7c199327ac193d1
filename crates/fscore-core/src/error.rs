use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::SourceKind;

/// Failure of a single source adapter. Absorbed by the cascade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Malformed(e.to_string())
    }
}

/// Reason a candidate record failed the quality gate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityRejection {
    #[error("{missing} of 8 critical fields are zero or missing (limit {limit})")]
    TooManyMissing { missing: usize, limit: usize },

    #[error("net income {net_income} is implausible for revenue {revenue} (unit mismatch)")]
    UnitMismatch { revenue: f64, net_income: f64 },

    #[error("total assets {total_assets} below {min_share} of revenue {revenue} (wrong row)")]
    AssetsBelowRevenueShare {
        total_assets: f64,
        revenue: f64,
        min_share: f64,
    },

    #[error("cash flow from operations missing for large company (revenue {revenue})")]
    MissingCashFlow { revenue: f64 },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("share dilution tolerance must not be negative (got {0})")]
    NegativeTolerance(f64),

    #[error("share dilution tolerance must be finite (got {0})")]
    NonFiniteTolerance(f64),
}

/// What happened when the cascade tried one adapter
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    NoData,
    Failed(SourceError),
    Rejected(QualityRejection),
    Accepted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttempt {
    pub source: SourceKind,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for SourceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::NoData => write!(f, "{}: no data", self.source),
            AttemptOutcome::Failed(e) => write!(f, "{}: {}", self.source, e),
            AttemptOutcome::Rejected(r) => write!(f, "{}: rejected, {}", self.source, r),
            AttemptOutcome::Accepted => write!(f, "{}: accepted", self.source),
        }
    }
}

/// Caller-visible failures of resolution and scoring
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// No source, including the hardcoded table, produced an accepted record.
    /// `attempts` keeps the per-source reasons for diagnostics.
    #[error("No data available for company '{company}'")]
    UnrecognizedCompany {
        company: String,
        attempts: Vec<SourceAttempt>,
    },

    #[error("Company identifier is empty")]
    EmptyIdentifier,

    #[error("Invalid policy: {0}")]
    InvalidPolicy(#[from] PolicyError),
}

impl ResolutionError {
    pub fn attempts(&self) -> &[SourceAttempt] {
        match self {
            ResolutionError::UnrecognizedCompany { attempts, .. } => attempts,
            _ => &[],
        }
    }
}
