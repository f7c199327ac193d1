use async_trait::async_trait;
use chrono::Utc;
use fscore_core::{
    Company, FundamentalsRecord, MetricPair, Provenance, SourceAdapter, SourceError, SourceKind,
};

/// Figures transcribed from published annual reports, in the unit each report uses.
struct ReportFigures {
    key: &'static str,
    period: &'static str,
    reference: &'static str,
    revenue: MetricPair,
    net_income: MetricPair,
    cash_flow_from_ops: MetricPair,
    total_assets: MetricPair,
    long_term_debt: MetricPair,
    current_assets: MetricPair,
    current_liabilities: MetricPair,
    cost_of_goods_sold: MetricPair,
    shares_outstanding: MetricPair,
}

const REPORTS: &[ReportFigures] = &[
    // TSEK. COGS is raw materials plus change in inventory.
    ReportFigures {
        key: "intellego technologies",
        period: "2024",
        reference: "Intellego Technologies annual report 2024 (TSEK)",
        revenue: MetricPair::new(265_281.0, 186_493.0),
        net_income: MetricPair::new(68_416.0, 59_604.0),
        cash_flow_from_ops: MetricPair::new(34_529.0, -19_187.0),
        total_assets: MetricPair::new(413_606.0, 253_195.0),
        long_term_debt: MetricPair::new(56_180.0, 48_066.0),
        current_assets: MetricPair::new(234_976.0, 131_251.0),
        current_liabilities: MetricPair::new(61_259.0, 53_911.0),
        cost_of_goods_sold: MetricPair::new(42_333.0, 51_455.0),
        shares_outstanding: MetricPair::new(29_317_476.0, 26_352_614.0),
    },
    // MSEK, shares in millions
    ReportFigures {
        key: "saab",
        period: "2024",
        reference: "SAAB annual report 2024 (MSEK)",
        revenue: MetricPair::new(63_751.0, 51_609.0),
        net_income: MetricPair::new(4_210.0, 3_443.0),
        cash_flow_from_ops: MetricPair::new(6_732.0, 6_462.0),
        total_assets: MetricPair::new(99_823.0, 82_759.0),
        long_term_debt: MetricPair::new(7_128.0, 6_915.0),
        current_assets: MetricPair::new(65_402.0, 54_997.0),
        current_liabilities: MetricPair::new(49_715.0, 35_002.0),
        cost_of_goods_sold: MetricPair::new(50_088.0, 40_349.0),
        shares_outstanding: MetricPair::new(535.27, 532.99),
    },
    // kSEK. Shares are share capital, COGS is total operating expenses.
    ReportFigures {
        key: "bioarctic",
        period: "2023",
        reference: "BioArctic annual report 2023 (kSEK)",
        revenue: MetricPair::new(615_995.0, 228_291.0),
        net_income: MetricPair::new(229_249.0, -11_179.0),
        cash_flow_from_ops: MetricPair::new(309_694.0, -31_637.0),
        total_assets: MetricPair::new(1_186_078.0, 858_307.0),
        long_term_debt: MetricPair::new(14_537.0, 1_182.0),
        current_assets: MetricPair::new(1_152_738.0, 820_841.0),
        current_liabilities: MetricPair::new(124_966.0, 70_883.0),
        cost_of_goods_sold: MetricPair::new(367_437.0, 245_961.0),
        shares_outstanding: MetricPair::new(1_766.0, 1_763.0),
    },
];

/// Last-resort table of known companies. Never fails, never gated.
#[derive(Debug, Clone, Default)]
pub struct HardcodedAdapter;

impl HardcodedAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn known_companies() -> impl Iterator<Item = &'static str> {
        REPORTS.iter().map(|r| r.key)
    }

    fn lookup(&self, company_key: &str) -> Option<FundamentalsRecord> {
        let figures = REPORTS.iter().find(|r| r.key == company_key)?;
        Some(FundamentalsRecord {
            revenue: figures.revenue,
            net_income: figures.net_income,
            cash_flow_from_ops: figures.cash_flow_from_ops,
            total_assets: figures.total_assets,
            long_term_debt: figures.long_term_debt,
            current_assets: figures.current_assets,
            current_liabilities: figures.current_liabilities,
            cost_of_goods_sold: figures.cost_of_goods_sold,
            shares_outstanding: figures.shares_outstanding,
            provenance: Provenance {
                source: SourceKind::Hardcoded,
                source_url: Some(figures.reference.to_string()),
                retrieved_at: Utc::now(),
                report_period: figures.period.to_string(),
            },
        })
    }
}

#[async_trait]
impl SourceAdapter for HardcodedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Hardcoded
    }

    async fn resolve(&self, company: &Company) -> Result<Option<FundamentalsRecord>, SourceError> {
        Ok(self.lookup(&company.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fscore_core::CompanyDirectory;

    #[tokio::test]
    async fn test_known_aliases_resolve_to_table() {
        let directory = CompanyDirectory::default();
        let adapter = HardcodedAdapter::new();

        for input in ["SAAB (B)", "bioarctic ab class b", "Intellego", "INT.ST"] {
            let company = directory.normalize(input).unwrap();
            let record = adapter.resolve(&company).await.unwrap();
            assert!(record.is_some(), "{} should be in the table", input);
        }

        let saab = adapter.resolve(&directory.normalize("saab").unwrap()).await.unwrap().unwrap();
        assert_eq!(saab.revenue, MetricPair::new(63_751.0, 51_609.0));
        assert_eq!(saab.provenance.report_period, "2024");
        assert_eq!(saab.source(), SourceKind::Hardcoded);
        assert!(saab.is_well_formed());
    }

    #[tokio::test]
    async fn test_unknown_company_has_no_data() {
        let company = CompanyDirectory::default().normalize("Volvo").unwrap();
        assert!(HardcodedAdapter::new().resolve(&company).await.unwrap().is_none());
    }

    #[test]
    fn test_known_companies_are_directory_keys() {
        let directory = CompanyDirectory::default();
        for key in HardcodedAdapter::known_companies() {
            assert_eq!(directory.normalize(key).unwrap().key, key);
        }
    }
}
