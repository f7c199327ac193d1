use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder share count used when a source cannot report shares outstanding.
pub const DEFAULT_SHARES_OUTSTANDING: f64 = 1_000_000.0;

/// Current and previous fiscal period values of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPair {
    pub current: f64,
    pub previous: f64,
}

impl MetricPair {
    pub const fn new(current: f64, previous: f64) -> Self {
        Self { current, previous }
    }

    pub fn is_finite(&self) -> bool {
        self.current.is_finite() && self.previous.is_finite()
    }
}

/// The nine statement metrics every fundamentals record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    NetIncome,
    CashFlowFromOps,
    TotalAssets,
    LongTermDebt,
    CurrentAssets,
    CurrentLiabilities,
    CostOfGoodsSold,
    SharesOutstanding,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Revenue,
        Metric::NetIncome,
        Metric::CashFlowFromOps,
        Metric::TotalAssets,
        Metric::LongTermDebt,
        Metric::CurrentAssets,
        Metric::CurrentLiabilities,
        Metric::CostOfGoodsSold,
        Metric::SharesOutstanding,
    ];

    /// Short field prefix used in extraction payloads (`<prefix>_cur` / `<prefix>_prev`).
    pub fn field_prefix(&self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::NetIncome => "net_income",
            Metric::CashFlowFromOps => "cfo",
            Metric::TotalAssets => "total_assets",
            Metric::LongTermDebt => "long_term_debt",
            Metric::CurrentAssets => "current_assets",
            Metric::CurrentLiabilities => "current_liabilities",
            Metric::CostOfGoodsSold => "cogs",
            Metric::SharesOutstanding => "shares",
        }
    }

    /// Value substituted when a source cannot supply the metric.
    pub fn default_value(&self) -> f64 {
        match self {
            Metric::SharesOutstanding => DEFAULT_SHARES_OUTSTANDING,
            _ => 0.0,
        }
    }
}

/// Identifies which adapter produced a record. Declaration order is cascade priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    MarketSite,
    AiReport,
    CompanySite,
    ArchiveSearch,
    Hardcoded,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::MarketSite,
        SourceKind::AiReport,
        SourceKind::CompanySite,
        SourceKind::ArchiveSearch,
        SourceKind::Hardcoded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::MarketSite => "market_site",
            SourceKind::AiReport => "ai_report",
            SourceKind::CompanySite => "company_site",
            SourceKind::ArchiveSearch => "archive_search",
            SourceKind::Hardcoded => "hardcoded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and when a record was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: SourceKind,
    #[serde(default)]
    pub source_url: Option<String>,
    pub retrieved_at: DateTime<Utc>,
    /// Fiscal period of the current figures, e.g. "2024"
    pub report_period: String,
}

/// Resolved fundamentals for one company over two fiscal periods.
///
/// Every metric pair is a required field, so a record cannot exist with a
/// gap; sources with missing figures go through [`PartialFundamentals::complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub revenue: MetricPair,
    pub net_income: MetricPair,
    pub cash_flow_from_ops: MetricPair,
    pub total_assets: MetricPair,
    pub long_term_debt: MetricPair,
    pub current_assets: MetricPair,
    pub current_liabilities: MetricPair,
    pub cost_of_goods_sold: MetricPair,
    pub shares_outstanding: MetricPair,
    pub provenance: Provenance,
}

impl FundamentalsRecord {
    pub fn metric(&self, metric: Metric) -> MetricPair {
        match metric {
            Metric::Revenue => self.revenue,
            Metric::NetIncome => self.net_income,
            Metric::CashFlowFromOps => self.cash_flow_from_ops,
            Metric::TotalAssets => self.total_assets,
            Metric::LongTermDebt => self.long_term_debt,
            Metric::CurrentAssets => self.current_assets,
            Metric::CurrentLiabilities => self.current_liabilities,
            Metric::CostOfGoodsSold => self.cost_of_goods_sold,
            Metric::SharesOutstanding => self.shares_outstanding,
        }
    }

    pub fn source(&self) -> SourceKind {
        self.provenance.source
    }

    /// True when every figure is a finite number.
    pub fn is_well_formed(&self) -> bool {
        Metric::ALL.iter().all(|m| self.metric(*m).is_finite())
    }
}

/// One metric as reported by an extractor; `None` means the source did not report it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialPair {
    pub current: Option<f64>,
    pub previous: Option<f64>,
}

/// Best-effort extraction result. Missing figures stay `None` so the caller
/// decides on defaulting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialFundamentals {
    pub revenue: PartialPair,
    pub net_income: PartialPair,
    pub cash_flow_from_ops: PartialPair,
    pub total_assets: PartialPair,
    pub long_term_debt: PartialPair,
    pub current_assets: PartialPair,
    pub current_liabilities: PartialPair,
    pub cost_of_goods_sold: PartialPair,
    pub shares_outstanding: PartialPair,
    pub report_period: Option<String>,
}

impl PartialFundamentals {
    pub fn get(&self, metric: Metric) -> &PartialPair {
        match metric {
            Metric::Revenue => &self.revenue,
            Metric::NetIncome => &self.net_income,
            Metric::CashFlowFromOps => &self.cash_flow_from_ops,
            Metric::TotalAssets => &self.total_assets,
            Metric::LongTermDebt => &self.long_term_debt,
            Metric::CurrentAssets => &self.current_assets,
            Metric::CurrentLiabilities => &self.current_liabilities,
            Metric::CostOfGoodsSold => &self.cost_of_goods_sold,
            Metric::SharesOutstanding => &self.shares_outstanding,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut PartialPair {
        match metric {
            Metric::Revenue => &mut self.revenue,
            Metric::NetIncome => &mut self.net_income,
            Metric::CashFlowFromOps => &mut self.cash_flow_from_ops,
            Metric::TotalAssets => &mut self.total_assets,
            Metric::LongTermDebt => &mut self.long_term_debt,
            Metric::CurrentAssets => &mut self.current_assets,
            Metric::CurrentLiabilities => &mut self.current_liabilities,
            Metric::CostOfGoodsSold => &mut self.cost_of_goods_sold,
            Metric::SharesOutstanding => &mut self.shares_outstanding,
        }
    }

    /// Scraped and AI sources only count as having data once current revenue was found.
    pub fn has_revenue(&self) -> bool {
        self.revenue.current.is_some()
    }

    pub fn reported_count(&self) -> usize {
        Metric::ALL
            .iter()
            .map(|m| {
                let pair = self.get(*m);
                pair.current.is_some() as usize + pair.previous.is_some() as usize
            })
            .sum()
    }

    /// Fill absent figures with their documented defaults and stamp provenance.
    pub fn complete(self, source: SourceKind, source_url: Option<String>) -> FundamentalsRecord {
        let pair = |metric: Metric| {
            let partial = self.get(metric);
            let fallback = metric.default_value();
            MetricPair::new(
                partial.current.unwrap_or(fallback),
                partial.previous.unwrap_or(fallback),
            )
        };

        FundamentalsRecord {
            revenue: pair(Metric::Revenue),
            net_income: pair(Metric::NetIncome),
            cash_flow_from_ops: pair(Metric::CashFlowFromOps),
            total_assets: pair(Metric::TotalAssets),
            long_term_debt: pair(Metric::LongTermDebt),
            current_assets: pair(Metric::CurrentAssets),
            current_liabilities: pair(Metric::CurrentLiabilities),
            cost_of_goods_sold: pair(Metric::CostOfGoodsSold),
            shares_outstanding: pair(Metric::SharesOutstanding),
            provenance: Provenance {
                source,
                source_url,
                retrieved_at: Utc::now(),
                report_period: self
                    .report_period
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            },
        }
    }
}

/// Caller-supplied scoring policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyOptions {
    /// Leverage compares debt/assets ratios when true, raw long-term debt otherwise
    pub leverage_uses_ratio: bool,
    /// Relative share increase still counted as "no dilution"
    pub share_dilution_tolerance: f64,
    /// Forces the asset-turnover signal when historical asset data is unusable
    pub asset_turnover_override: Option<bool>,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            leverage_uses_ratio: true,
            share_dilution_tolerance: 0.0,
            asset_turnover_override: None,
        }
    }
}

impl PolicyOptions {
    pub fn validate(&self) -> Result<(), crate::PolicyError> {
        if !self.share_dilution_tolerance.is_finite() {
            return Err(crate::PolicyError::NonFiniteTolerance(self.share_dilution_tolerance));
        }
        if self.share_dilution_tolerance < 0.0 {
            return Err(crate::PolicyError::NegativeTolerance(self.share_dilution_tolerance));
        }
        Ok(())
    }
}

/// Names of the nine scoring criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalName {
    RoaPositive,
    CfoPositive,
    RoaImproved,
    AccrualPositive,
    LeverageDecreased,
    CurrentRatioImproved,
    NoNewShares,
    GrossMarginImproved,
    AssetTurnoverImproved,
}

impl SignalName {
    pub const ALL: [SignalName; 9] = [
        SignalName::RoaPositive,
        SignalName::CfoPositive,
        SignalName::RoaImproved,
        SignalName::AccrualPositive,
        SignalName::LeverageDecreased,
        SignalName::CurrentRatioImproved,
        SignalName::NoNewShares,
        SignalName::GrossMarginImproved,
        SignalName::AssetTurnoverImproved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::RoaPositive => "roa_positive",
            SignalName::CfoPositive => "cfo_positive",
            SignalName::RoaImproved => "roa_improved",
            SignalName::AccrualPositive => "accrual_positive",
            SignalName::LeverageDecreased => "leverage_decreased",
            SignalName::CurrentRatioImproved => "current_ratio_improved",
            SignalName::NoNewShares => "no_new_shares",
            SignalName::GrossMarginImproved => "gross_margin_improved",
            SignalName::AssetTurnoverImproved => "asset_turnover_improved",
        }
    }
}

/// Outcome of the nine criteria for one record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalVector {
    pub roa_positive: bool,
    pub cfo_positive: bool,
    pub roa_improved: bool,
    pub accrual_positive: bool,
    pub leverage_decreased: bool,
    pub current_ratio_improved: bool,
    pub no_new_shares: bool,
    pub gross_margin_improved: bool,
    pub asset_turnover_improved: bool,
}

impl SignalVector {
    pub fn get(&self, name: SignalName) -> bool {
        match name {
            SignalName::RoaPositive => self.roa_positive,
            SignalName::CfoPositive => self.cfo_positive,
            SignalName::RoaImproved => self.roa_improved,
            SignalName::AccrualPositive => self.accrual_positive,
            SignalName::LeverageDecreased => self.leverage_decreased,
            SignalName::CurrentRatioImproved => self.current_ratio_improved,
            SignalName::NoNewShares => self.no_new_shares,
            SignalName::GrossMarginImproved => self.gross_margin_improved,
            SignalName::AssetTurnoverImproved => self.asset_turnover_improved,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalName, bool)> + '_ {
        SignalName::ALL.into_iter().map(move |name| (name, self.get(name)))
    }
}

/// Last accepted record for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub company_key: String,
    pub record: FundamentalsRecord,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(company_key: impl Into<String>, record: FundamentalsRecord) -> Self {
        Self {
            company_key: company_key.into(),
            record,
            written_at: Utc::now(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.written_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}
