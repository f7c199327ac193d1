use async_trait::async_trait;

use crate::{
    CacheEntry, CacheError, Company, FundamentalsRecord, PartialFundamentals, SourceError,
    SourceKind,
};

/// One fundamentals source in the resolution cascade.
///
/// `Ok(None)` means the source has nothing for this company; errors are
/// recovered by the cascade and never reach the caller.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Whether candidates from this source must pass the quality gate
    fn requires_validation(&self) -> bool {
        false
    }

    async fn resolve(&self, company: &Company) -> Result<Option<FundamentalsRecord>, SourceError>;
}

/// Raw text fetched for a company: a scraped page or extracted report text
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// URL or path the text came from
    pub locator: String,
    pub text: String,
}

#[async_trait]
pub trait TextSource: Send + Sync {
    async fn fetch(&self, company: &Company) -> Result<Option<SourceDocument>, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Annual,
    Quarterly,
}

/// Context passed to extractors alongside the raw text
#[derive(Debug, Clone)]
pub struct SchemaHint<'a> {
    pub company: &'a Company,
    pub locator: &'a str,
    pub report_kind: ReportKind,
}

/// Turns raw text into a best-effort partial record. Figures that cannot be
/// found are left `None`, never zero.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        hint: &SchemaHint<'_>,
    ) -> Result<Option<PartialFundamentals>, SourceError>;
}

/// Key-value store of the last accepted record per company
#[async_trait]
pub trait PersistentCache: Send + Sync {
    async fn get(&self, company_key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Overwrites any existing entry for the key and stamps the write time
    async fn put(&self, company_key: &str, record: &FundamentalsRecord) -> Result<CacheEntry, CacheError>;
}
