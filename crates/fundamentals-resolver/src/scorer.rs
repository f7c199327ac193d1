use fscore_core::{
    Company, FundamentalsRecord, PolicyOptions, ResolutionError, SignalVector, SourceAttempt,
};
use fscore_signals::{ScoreAggregator, SignalDeriver};
use serde::Serialize;

use crate::engine::{Origin, ResolutionEngine};

/// Score with the intermediate record and signals kept for inspection
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub company: Company,
    pub record: FundamentalsRecord,
    pub signals: SignalVector,
    pub score: u8,
    pub origin: Origin,
    #[serde(skip)]
    pub attempts: Vec<SourceAttempt>,
}

pub struct FScorer {
    engine: ResolutionEngine,
    deriver: SignalDeriver,
}

impl FScorer {
    pub fn new(engine: ResolutionEngine) -> Self {
        Self {
            engine,
            deriver: SignalDeriver::new(),
        }
    }

    pub fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    /// Resolve, derive and sum. The policy is validated before any lookup.
    pub async fn score(
        &self,
        company: &str,
        options: &PolicyOptions,
        force: bool,
    ) -> Result<ScoreReport, ResolutionError> {
        options.validate()?;

        let resolution = self.engine.resolve(company, force).await?;
        let signals = self.deriver.derive(&resolution.record, options);
        let score = ScoreAggregator::score(&signals);

        tracing::info!(
            "{}: F-score {} from {:?} (period {})",
            resolution.company.name,
            score,
            resolution.origin,
            resolution.record.provenance.report_period
        );

        Ok(ScoreReport {
            company: resolution.company,
            record: resolution.record,
            signals,
            score,
            origin: resolution.origin,
            attempts: resolution.attempts,
        })
    }
}
