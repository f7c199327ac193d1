pub mod adapters;
pub mod documents;
pub mod hardcoded;
pub mod html;
pub mod http;
pub mod llm;
pub mod table;

pub use adapters::{ArchiveSearchAdapter, DocumentAdapter};
pub use fscore_core::ReportKind;
pub use documents::{ReportTextSource, WebPageSource};
pub use hardcoded::HardcodedAdapter;
pub use http::HttpFetcher;
pub use llm::{LanguageModel, LlmExtractor, OpenAiClient};
pub use table::TableExtractor;

use fscore_core::{SourceAdapter, SourceError, SourceKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn owned_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Everything the standard adapters need to reach their sources
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// The AI report adapter is left out of the cascade without a key
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub reports_dir: PathBuf,
    /// Ask the model for interim figures instead of full-year ones
    pub prefer_quarterly: bool,
    pub rate_limit_per_minute: usize,
    pub http_timeout: Duration,
    /// Company key -> identifier used by the market-data site
    pub market_site_ids: HashMap<String, String>,
    /// Market-data pages per company; `{id}` is replaced by the site identifier
    pub market_site_pages: Vec<String>,
    /// Company key -> investor-relations page
    pub company_sites: HashMap<String, String>,
    pub archive_search_url: String,
    pub validate_company_site: bool,
    pub validate_archive: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            reports_dir: PathBuf::from("annual-reports"),
            prefer_quarterly: false,
            rate_limit_per_minute: 30,
            http_timeout: Duration::from_secs(30),
            market_site_ids: owned_map(&[
                ("saab", "SAAB.B"),
                ("bioarctic", "BIOA.B"),
                ("intellego technologies", "INT"),
            ]),
            market_site_pages: vec![
                "https://stockanalysis.com/quote/sto/{id}/financials/".to_string(),
                "https://stockanalysis.com/quote/sto/{id}/financials/balance-sheet/".to_string(),
                "https://stockanalysis.com/quote/sto/{id}/financials/cash-flow-statement/".to_string(),
            ],
            company_sites: owned_map(&[
                ("saab", "https://www.saab.com/investors/financial-reports/"),
                ("bioarctic", "https://www.bioarctic.com/en/investors/financial-reports/"),
                (
                    "intellego technologies",
                    "https://intellego-technologies.com/sv/intellego-investor-relations/",
                ),
            ]),
            archive_search_url: "https://storage.mfn.se/search".to_string(),
            validate_company_site: false,
            validate_archive: false,
        }
    }
}

/// Build the production adapters in priority order:
/// market site, AI report, company site, archive search, hardcoded table.
pub fn standard_cascade(settings: &SourceSettings) -> Result<Vec<Arc<dyn SourceAdapter>>, SourceError> {
    let http = HttpFetcher::new(settings.rate_limit_per_minute, settings.http_timeout)?;
    let tables: Arc<TableExtractor> = Arc::new(TableExtractor::new());
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    let market = WebPageSource::from_templates(
        http.clone(),
        &settings.market_site_ids,
        &settings.market_site_pages,
    );
    adapters.push(Arc::new(
        DocumentAdapter::new(SourceKind::MarketSite, Arc::new(market), tables.clone()).validated(true),
    ));

    match &settings.openai_api_key {
        Some(key) if !key.trim().is_empty() => {
            let model = OpenAiClient::new(
                http.clone(),
                key.clone(),
                settings.openai_model.clone(),
                settings.openai_base_url.clone(),
            );
            let report_kind = if settings.prefer_quarterly {
                ReportKind::Quarterly
            } else {
                ReportKind::Annual
            };
            adapters.push(Arc::new(
                DocumentAdapter::new(
                    SourceKind::AiReport,
                    Arc::new(ReportTextSource::new(settings.reports_dir.clone())),
                    Arc::new(LlmExtractor::new(Arc::new(model))),
                )
                .with_report_kind(report_kind),
            ));
        }
        _ => tracing::info!("OPENAI_API_KEY not set, AI report extraction disabled"),
    }

    let sites = settings
        .company_sites
        .iter()
        .map(|(key, url)| (key.clone(), vec![url.clone()]))
        .collect();
    adapters.push(Arc::new(
        DocumentAdapter::new(
            SourceKind::CompanySite,
            Arc::new(WebPageSource::new(http.clone(), sites)),
            tables,
        )
        .validated(settings.validate_company_site),
    ));

    adapters.push(Arc::new(
        ArchiveSearchAdapter::new(http, settings.archive_search_url.clone())
            .validated(settings.validate_archive),
    ));
    adapters.push(Arc::new(HardcodedAdapter::new()));

    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_cascade_order_without_ai() {
        let adapters = standard_cascade(&SourceSettings::default()).unwrap();
        let kinds: Vec<_> = adapters.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::MarketSite,
                SourceKind::CompanySite,
                SourceKind::ArchiveSearch,
                SourceKind::Hardcoded,
            ]
        );
        assert!(adapters[0].requires_validation());
        assert!(!adapters[3].requires_validation());
    }

    #[test]
    fn test_standard_cascade_includes_ai_with_key() {
        let settings = SourceSettings {
            openai_api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let kinds: Vec<_> = standard_cascade(&settings)
            .unwrap()
            .iter()
            .map(|a| a.kind())
            .collect();
        assert_eq!(kinds.len(), 5);
        assert_eq!(kinds[1], SourceKind::AiReport);
    }
}
