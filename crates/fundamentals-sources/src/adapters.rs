use async_trait::async_trait;
use fscore_core::{
    Company, FundamentalsRecord, ReportKind, SchemaHint, SourceAdapter, SourceError, SourceKind,
    StructuredExtractor, TextSource,
};
use reqwest::Url;
use std::sync::Arc;

use crate::html;
use crate::http::HttpFetcher;
use crate::table::TableExtractor;

/// A text source paired with an extractor, e.g. a scraped page plus table
/// parsing, or report text plus a language model.
pub struct DocumentAdapter {
    kind: SourceKind,
    source: Arc<dyn TextSource>,
    extractor: Arc<dyn StructuredExtractor>,
    requires_validation: bool,
    report_kind: ReportKind,
}

impl DocumentAdapter {
    pub fn new(
        kind: SourceKind,
        source: Arc<dyn TextSource>,
        extractor: Arc<dyn StructuredExtractor>,
    ) -> Self {
        Self {
            kind,
            source,
            extractor,
            requires_validation: false,
            report_kind: ReportKind::Annual,
        }
    }

    pub fn validated(mut self, requires_validation: bool) -> Self {
        self.requires_validation = requires_validation;
        self
    }

    pub fn with_report_kind(mut self, report_kind: ReportKind) -> Self {
        self.report_kind = report_kind;
        self
    }

    /// The configured kind, unless the document itself is named as an interim report
    fn report_kind_for(&self, locator: &str) -> ReportKind {
        let lower = locator.to_lowercase();
        if INTERIM_MARKERS.iter().any(|m| lower.contains(m)) {
            ReportKind::Quarterly
        } else {
            self.report_kind
        }
    }
}

const INTERIM_MARKERS: &[&str] = &["q1", "q2", "q3", "q4", "quarterly", "interim"];

#[async_trait]
impl SourceAdapter for DocumentAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn requires_validation(&self) -> bool {
        self.requires_validation
    }

    async fn resolve(&self, company: &Company) -> Result<Option<FundamentalsRecord>, SourceError> {
        let Some(document) = self.source.fetch(company).await? else {
            return Ok(None);
        };

        let hint = SchemaHint {
            company,
            locator: &document.locator,
            report_kind: self.report_kind_for(&document.locator),
        };
        let partial = match self.extractor.extract(&document.text, &hint).await? {
            Some(partial) if partial.has_revenue() => partial,
            _ => {
                tracing::debug!("{} had no revenue figure for {}", self.kind, company.name);
                return Ok(None);
            }
        };

        Ok(Some(partial.complete(self.kind, Some(document.locator))))
    }
}

/// Searches a filings archive and parses the first report that yields revenue
pub struct ArchiveSearchAdapter {
    http: HttpFetcher,
    search_url: String,
    extractor: TableExtractor,
    max_documents: usize,
    requires_validation: bool,
}

impl ArchiveSearchAdapter {
    pub fn new(http: HttpFetcher, search_url: impl Into<String>) -> Self {
        Self {
            http,
            search_url: search_url.into(),
            extractor: TableExtractor::new(),
            max_documents: 3,
            requires_validation: false,
        }
    }

    pub fn validated(mut self, requires_validation: bool) -> Self {
        self.requires_validation = requires_validation;
        self
    }

    fn search_url_for(&self, company: &Company) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.search_url)
            .map_err(|e| SourceError::Unavailable(format!("bad search url: {}", e)))?;
        url.query_pairs_mut().append_pair("q", &company.name);
        Ok(url)
    }
}

/// Links whose text mentions an annual report, resolved against the search page
pub fn report_links(page: &str, base: &Url) -> Vec<Url> {
    html::links(page)
        .into_iter()
        .filter(|link| {
            let text = link.text.to_lowercase();
            text.contains("annual") || text.contains("report")
        })
        .filter_map(|link| base.join(&link.href).ok())
        .collect()
}

#[async_trait]
impl SourceAdapter for ArchiveSearchAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::ArchiveSearch
    }

    fn requires_validation(&self) -> bool {
        self.requires_validation
    }

    async fn resolve(&self, company: &Company) -> Result<Option<FundamentalsRecord>, SourceError> {
        let search = self.search_url_for(company)?;
        let Some(page) = self.http.get_text(search.as_str()).await? else {
            return Ok(None);
        };

        let candidates = report_links(&page, &search);
        tracing::debug!("Archive search found {} report links for {}", candidates.len(), company.name);

        for url in candidates.into_iter().take(self.max_documents) {
            let document = match self.http.get_text(url.as_str()).await {
                Ok(Some(document)) => document,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Archive document {} failed for {}: {}", url, company.name, e);
                    continue;
                }
            };

            if let Some(partial) = self.extractor.extract_html(&document) {
                if partial.has_revenue() {
                    return Ok(Some(partial.complete(SourceKind::ArchiveSearch, Some(url.to_string()))));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fscore_core::{PartialFundamentals, SourceDocument};

    struct FixedText(Option<&'static str>);

    #[async_trait]
    impl TextSource for FixedText {
        async fn fetch(&self, _company: &Company) -> Result<Option<SourceDocument>, SourceError> {
            Ok(self.0.map(|text| SourceDocument {
                locator: "https://ir.example.test/reports".to_string(),
                text: text.to_string(),
            }))
        }
    }

    struct FixedPartial(Option<PartialFundamentals>);

    #[async_trait]
    impl StructuredExtractor for FixedPartial {
        async fn extract(
            &self,
            _text: &str,
            _hint: &SchemaHint<'_>,
        ) -> Result<Option<PartialFundamentals>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct KindRecorder(std::sync::Mutex<Vec<ReportKind>>);

    #[async_trait]
    impl StructuredExtractor for KindRecorder {
        async fn extract(
            &self,
            _text: &str,
            hint: &SchemaHint<'_>,
        ) -> Result<Option<PartialFundamentals>, SourceError> {
            self.0.lock().unwrap().push(hint.report_kind);
            Ok(None)
        }
    }

    struct NamedText(&'static str);

    #[async_trait]
    impl TextSource for NamedText {
        async fn fetch(&self, _company: &Company) -> Result<Option<SourceDocument>, SourceError> {
            Ok(Some(SourceDocument {
                locator: self.0.to_string(),
                text: "report".to_string(),
            }))
        }
    }

    fn company() -> Company {
        Company {
            key: "saab".into(),
            name: "SAAB".into(),
            ticker: None,
        }
    }

    fn adapter(text: Option<&'static str>, partial: Option<PartialFundamentals>) -> DocumentAdapter {
        DocumentAdapter::new(
            SourceKind::CompanySite,
            Arc::new(FixedText(text)),
            Arc::new(FixedPartial(partial)),
        )
    }

    #[tokio::test]
    async fn test_document_adapter_stamps_provenance() {
        let mut partial = PartialFundamentals::default();
        partial.revenue.current = Some(100.0);
        partial.report_period = Some("2024".into());

        let record = adapter(Some("page"), Some(partial))
            .resolve(&company())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.source(), SourceKind::CompanySite);
        assert_eq!(record.provenance.source_url.as_deref(), Some("https://ir.example.test/reports"));
        assert_eq!(record.provenance.report_period, "2024");
        assert_eq!(record.revenue.current, 100.0);
        assert_eq!(record.revenue.previous, 0.0);
    }

    #[tokio::test]
    async fn test_document_adapter_requires_revenue() {
        let mut partial = PartialFundamentals::default();
        partial.total_assets.current = Some(100.0);
        assert!(adapter(Some("page"), Some(partial)).resolve(&company()).await.unwrap().is_none());
        assert!(adapter(None, None).resolve(&company()).await.unwrap().is_none());
        assert!(adapter(Some("page"), None).resolve(&company()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_report_kind_reaches_extractor() {
        let cases = [
            ("annual-reports/saab.txt", ReportKind::Annual, ReportKind::Annual),
            ("annual-reports/saab.txt", ReportKind::Quarterly, ReportKind::Quarterly),
            ("https://archive.test/saab-interim-q3-2024.html", ReportKind::Annual, ReportKind::Quarterly),
        ];
        for (locator, configured, expected) in cases {
            let recorder = Arc::new(KindRecorder(std::sync::Mutex::new(Vec::new())));
            let adapter = DocumentAdapter::new(SourceKind::AiReport, Arc::new(NamedText(locator)), recorder.clone())
                .with_report_kind(configured);
            assert!(adapter.resolve(&company()).await.unwrap().is_none());
            assert_eq!(*recorder.0.lock().unwrap(), vec![expected], "{}", locator);
        }
    }

    #[test]
    fn test_validation_flag_defaults_off() {
        let plain = adapter(None, None);
        assert!(!plain.requires_validation());
        assert!(adapter(None, None).validated(true).requires_validation());
    }

    #[test]
    fn test_report_links_filter_and_resolve() {
        let base = Url::parse("https://archive.test/search?q=SAAB").unwrap();
        let page = r#"
            <a href="/files/saab-annual-2024.html">SAAB Annual Report 2024</a>
            <a href="press/123">Press release</a>
            <a href="https://cdn.test/q3.html">Interim report Q3</a>"#;

        let links = report_links(page, &base);
        assert_eq!(
            links.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["https://archive.test/files/saab-annual-2024.html", "https://cdn.test/q3.html"]
        );
    }

    #[test]
    fn test_search_url_encodes_company() {
        let http = HttpFetcher::new(10, std::time::Duration::from_secs(1)).unwrap();
        let adapter = ArchiveSearchAdapter::new(http, "https://archive.test/search");
        let company = Company {
            key: "intellego technologies".into(),
            name: "Intellego Technologies".into(),
            ticker: None,
        };
        assert_eq!(
            adapter.search_url_for(&company).unwrap().as_str(),
            "https://archive.test/search?q=Intellego+Technologies"
        );
    }
}
