use fscore_core::{FundamentalsRecord, MetricPair, QualityRejection};
use serde::{Deserialize, Serialize};

/// Heuristic limits for accepting scraped records. Tuned empirically, so
/// every value is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Most critical fields that may be zero or missing
    pub max_missing: usize,
    /// Below this revenue a large net income suggests mixed units
    pub small_revenue: f64,
    pub net_income_multiple: f64,
    /// Total assets must be at least this share of revenue
    pub min_asset_share: f64,
    /// Above this revenue, cash flow from operations must be reported
    pub large_revenue: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_missing: 2,
            small_revenue: 10.0,
            net_income_multiple: 2.0,
            min_asset_share: 0.1,
            large_revenue: 1000.0,
        }
    }
}

/// Completeness and plausibility check for records from unverified sources
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

fn is_missing(value: f64) -> bool {
    value == 0.0 || !value.is_finite()
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn check(&self, record: &FundamentalsRecord) -> Result<(), QualityRejection> {
        let t = &self.thresholds;

        let critical: [MetricPair; 4] = [
            record.revenue,
            record.net_income,
            record.cash_flow_from_ops,
            record.total_assets,
        ];
        let missing = critical
            .iter()
            .flat_map(|pair| [pair.current, pair.previous])
            .filter(|v| is_missing(*v))
            .count();
        if missing > t.max_missing {
            return Err(QualityRejection::TooManyMissing {
                missing,
                limit: t.max_missing,
            });
        }

        let revenue = record.revenue.current;
        let net_income = record.net_income.current;
        let total_assets = record.total_assets.current;

        if revenue > 0.0
            && revenue < t.small_revenue
            && net_income.abs() > revenue * t.net_income_multiple
        {
            return Err(QualityRejection::UnitMismatch { revenue, net_income });
        }

        if revenue > 0.0 && total_assets > 0.0 && total_assets < revenue * t.min_asset_share {
            return Err(QualityRejection::AssetsBelowRevenueShare {
                total_assets,
                revenue,
                min_share: t.min_asset_share,
            });
        }

        if revenue > t.large_revenue && is_missing(record.cash_flow_from_ops.current) {
            return Err(QualityRejection::MissingCashFlow { revenue });
        }

        Ok(())
    }
}
