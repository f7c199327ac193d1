use async_trait::async_trait;
use fscore_core::{Company, SourceDocument, SourceError, TextSource};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::http::HttpFetcher;

/// Fetches one or more configured pages per company and concatenates them.
///
/// Pages that 404 are skipped; the document is absent only when every page is.
pub struct WebPageSource {
    http: HttpFetcher,
    pages: HashMap<String, Vec<String>>,
}

impl WebPageSource {
    pub fn new(http: HttpFetcher, pages: HashMap<String, Vec<String>>) -> Self {
        Self { http, pages }
    }

    /// Expand `{id}` in each template with the company's site identifier
    pub fn from_templates(
        http: HttpFetcher,
        site_ids: &HashMap<String, String>,
        templates: &[String],
    ) -> Self {
        let pages = site_ids
            .iter()
            .map(|(key, id)| {
                let urls = templates.iter().map(|t| t.replace("{id}", id)).collect();
                (key.clone(), urls)
            })
            .collect();
        Self::new(http, pages)
    }

    pub fn urls_for(&self, company: &Company) -> &[String] {
        self.pages.get(&company.key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait]
impl TextSource for WebPageSource {
    async fn fetch(&self, company: &Company) -> Result<Option<SourceDocument>, SourceError> {
        let urls = self.urls_for(company);
        if urls.is_empty() {
            tracing::debug!("No pages configured for {}", company.name);
            return Ok(None);
        }

        let mut pages = Vec::with_capacity(urls.len());
        for url in urls {
            let result = self.http.get_text(url).await;
            if let Err(e) = &result {
                tracing::warn!("Page {} failed for {}: {}", url, company.name, e);
            }
            pages.push((url.clone(), result));
        }
        assemble(pages)
    }
}

/// Concatenate the pages that were fetched. Failed pages are skipped; the
/// fetch is an error only when every page failed.
fn assemble(
    pages: Vec<(String, Result<Option<String>, SourceError>)>,
) -> Result<Option<SourceDocument>, SourceError> {
    let total = pages.len();
    let mut locator = None;
    let mut text = String::new();
    let mut errors = Vec::new();

    for (url, result) in pages {
        match result {
            Ok(Some(page)) => {
                locator.get_or_insert(url);
                text.push_str(&page);
                text.push('\n');
            }
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    if errors.len() == total {
        if let Some(e) = errors.pop() {
            return Err(e);
        }
    }
    Ok(locator.map(|locator| SourceDocument { locator, text }))
}

/// Reads pre-extracted report text from `<dir>/<company key>.txt`
pub struct ReportTextSource {
    dir: PathBuf,
}

impl ReportTextSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys pass through from free-text input, so anything outside
    /// `[a-z0-9-]` becomes `_` and the path cannot leave `dir`.
    pub fn path_for(&self, company: &Company) -> PathBuf {
        let file: String = company
            .key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.txt", file))
    }
}

#[async_trait]
impl TextSource for ReportTextSource {
    async fn fetch(&self, company: &Company) -> Result<Option<SourceDocument>, SourceError> {
        let path = self.path_for(company);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(SourceDocument {
                locator: path.display().to_string(),
                text,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No report text at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn company(key: &str) -> Company {
        Company {
            key: key.into(),
            name: key.into(),
            ticker: None,
        }
    }

    #[tokio::test]
    async fn test_report_text_source_reads_and_misses() {
        let dir = std::env::temp_dir().join(format!("fscore-reports-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("intellego_technologies.txt"), "Net revenue 265,281").unwrap();

        let source = ReportTextSource::new(&dir);
        let doc = source
            .fetch(&company("intellego technologies"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.text, "Net revenue 265,281");
        assert!(doc.locator.ends_with("intellego_technologies.txt"));

        assert!(source.fetch(&company("saab")).await.unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_report_path_stays_inside_reports_dir() {
        let root = std::env::temp_dir().join(format!("fscore-escape-{}", std::process::id()));
        let reports = root.join("annual-reports");
        std::fs::create_dir_all(&reports).unwrap();
        std::fs::write(root.join("secret.txt"), "TOP SECRET").unwrap();

        let source = ReportTextSource::new(&reports);
        for key in ["../secret", "..\\secret", "/etc/passwd", "a/../../secret"] {
            let path = source.path_for(&company(key));
            assert_eq!(path.parent(), Some(reports.as_path()), "{} escaped", key);
        }
        assert_eq!(
            source.path_for(&company("../secret")).file_name().and_then(|f| f.to_str()),
            Some("___secret.txt")
        );
        assert!(source.fetch(&company("../secret")).await.unwrap().is_none());
        std::fs::remove_dir_all(&root).unwrap();
    }

    fn page(url: &str, result: Result<Option<&str>, SourceError>) -> (String, Result<Option<String>, SourceError>) {
        (url.to_string(), result.map(|p| p.map(str::to_string)))
    }

    #[test]
    fn test_failed_page_keeps_the_others() {
        let doc = assemble(vec![
            page("https://site.test/income", Ok(Some("<table>income</table>"))),
            page("https://site.test/balance", Ok(None)),
            page("https://site.test/cash-flow", Err(SourceError::Http("HTTP 500".into()))),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(doc.locator, "https://site.test/income");
        assert_eq!(doc.text, "<table>income</table>\n");

        let later = assemble(vec![
            page("https://site.test/income", Err(SourceError::Http("HTTP 500".into()))),
            page("https://site.test/balance", Ok(Some("balance"))),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(later.locator, "https://site.test/balance");
    }

    #[test]
    fn test_every_page_failing_is_an_error() {
        let result = assemble(vec![
            page("https://site.test/income", Err(SourceError::Http("HTTP 500".into()))),
            page("https://site.test/balance", Err(SourceError::Unavailable("refused".into()))),
        ]);
        assert!(matches!(result, Err(SourceError::Unavailable(_))));

        let missing = assemble(vec![
            page("https://site.test/income", Ok(None)),
            page("https://site.test/balance", Err(SourceError::Http("HTTP 500".into()))),
        ]);
        assert!(matches!(missing, Ok(None)));
        assert!(matches!(assemble(Vec::new()), Ok(None)));
    }

    #[test]
    fn test_templates_expand_per_company() {
        let http = HttpFetcher::new(10, Duration::from_secs(1)).unwrap();
        let ids = HashMap::from([("saab".to_string(), "SAAB.B".to_string())]);
        let templates = vec![
            "https://site.test/{id}/financials/".to_string(),
            "https://site.test/{id}/financials/balance-sheet/".to_string(),
        ];
        let source = WebPageSource::from_templates(http, &ids, &templates);

        assert_eq!(
            source.urls_for(&company("saab")),
            &[
                "https://site.test/SAAB.B/financials/".to_string(),
                "https://site.test/SAAB.B/financials/balance-sheet/".to_string(),
            ]
        );
        assert!(source.urls_for(&company("volvo")).is_empty());
    }
}
