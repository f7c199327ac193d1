use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fscore_core::{
    AttemptOutcome, CacheEntry, Company, CompanyDirectory, FundamentalsRecord, PersistentCache,
    ResolutionError, SourceAdapter, SourceAttempt, SourceError, SourceKind,
};
use futures_util::stream::{FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::quality::QualityGate;

/// How adapters are driven once the cache misses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    /// One adapter at a time; later adapters run only after earlier ones fail
    #[default]
    Sequential,
    /// All adapters start at once, results are still accepted in priority order
    Prefetch,
}

impl FromStr for CascadeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(CascadeMode::Sequential),
            "prefetch" => Ok(CascadeMode::Prefetch),
            other => Err(format!("unknown cascade mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_ttl: Duration,
    /// Freshness per producing source; falls back to `default_ttl`
    pub source_ttls: HashMap<SourceKind, Duration>,
    pub adapter_timeout: std::time::Duration,
    pub source_timeouts: HashMap<SourceKind, std::time::Duration>,
    pub mode: CascadeMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::hours(168),
            source_ttls: HashMap::from([
                (SourceKind::AiReport, Duration::hours(720)),
                (SourceKind::ArchiveSearch, Duration::hours(720)),
                (SourceKind::Hardcoded, Duration::hours(24)),
            ]),
            adapter_timeout: std::time::Duration::from_secs(30),
            source_timeouts: HashMap::from([(
                SourceKind::AiReport,
                std::time::Duration::from_secs(120),
            )]),
            mode: CascadeMode::Sequential,
        }
    }
}

impl EngineConfig {
    pub fn ttl_for(&self, source: SourceKind) -> Duration {
        self.source_ttls.get(&source).copied().unwrap_or(self.default_ttl)
    }

    pub fn timeout_for(&self, source: SourceKind) -> std::time::Duration {
        self.source_timeouts
            .get(&source)
            .copied()
            .unwrap_or(self.adapter_timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Source(SourceKind),
}

/// An accepted record plus how it was obtained
#[derive(Debug, Clone)]
pub struct Resolution {
    pub company: Company,
    pub record: FundamentalsRecord,
    pub origin: Origin,
    /// Per-adapter outcomes of this call's cascade; empty on a cache hit
    pub attempts: Vec<SourceAttempt>,
}

/// Cache-first resolver over a priority-ordered adapter cascade
pub struct ResolutionEngine {
    directory: CompanyDirectory,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    gate: QualityGate,
    cache: Arc<dyn PersistentCache>,
    config: EngineConfig,
    /// Per-company locks so one company is resolved by one caller at a time
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl ResolutionEngine {
    pub fn new(mut adapters: Vec<Arc<dyn SourceAdapter>>, cache: Arc<dyn PersistentCache>) -> Self {
        // Stable sort: adapters of the same kind keep their given order
        adapters.sort_by_key(|a| a.kind());
        Self {
            directory: CompanyDirectory::default(),
            adapters,
            gate: QualityGate::default(),
            cache,
            config: EngineConfig::default(),
            inflight: DashMap::new(),
        }
    }

    pub fn with_directory(mut self, directory: CompanyDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directory(&self) -> &CompanyDirectory {
        &self.directory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn adapter_kinds(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    /// Resolve fundamentals for a free-text name or ticker.
    ///
    /// A fresh cache entry is returned unless `force` is set. Otherwise the
    /// first accepted adapter result is cached and returned.
    pub async fn resolve(&self, input: &str, force: bool) -> Result<Resolution, ResolutionError> {
        let company = self.directory.normalize(input)?;
        let requested_at = Utc::now();

        if !force {
            if let Some(entry) = self.fresh_entry(&company.key, requested_at).await {
                tracing::debug!("Cache hit for {} ({})", company.name, entry.record.source());
                return Ok(Self::from_cache(company, entry));
            }
        }

        let lock = self
            .inflight
            .entry(company.key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        // Another caller may have resolved this company while we waited
        if let Some(entry) = self.read_cache(&company.key).await {
            if entry.written_at >= requested_at {
                tracing::debug!("Reusing concurrent resolution of {}", company.name);
                drop(guard);
                self.release(&company.key, &lock);
                return Ok(Self::from_cache(company, entry));
            }
        }

        let (accepted, attempts) = self.run_cascade(&company).await;
        // Written before unlocking so waiters find the entry
        if let Some(record) = &accepted {
            if let Err(e) = self.cache.put(&company.key, record).await {
                tracing::warn!("Failed to cache {} from {}: {}", company.name, record.source(), e);
            }
        }
        drop(guard);
        self.release(&company.key, &lock);

        match accepted {
            Some(record) => {
                let source = record.source();
                Ok(Resolution {
                    company,
                    record,
                    origin: Origin::Source(source),
                    attempts,
                })
            }
            None => {
                tracing::warn!(
                    "All {} sources exhausted for {}",
                    attempts.len(),
                    company.name
                );
                Err(ResolutionError::UnrecognizedCompany {
                    company: company.name,
                    attempts,
                })
            }
        }
    }

    fn from_cache(company: Company, entry: CacheEntry) -> Resolution {
        Resolution {
            company,
            record: entry.record,
            origin: Origin::Cache,
            attempts: Vec::new(),
        }
    }

    fn release(&self, key: &str, lock: &Arc<Mutex<()>>) {
        // Only the map and our clone remain: nobody is waiting
        self.inflight
            .remove_if(key, |_, held| Arc::ptr_eq(held, lock) && Arc::strong_count(held) <= 2);
    }

    async fn read_cache(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cache read failed for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    async fn fresh_entry(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = self.read_cache(key).await?;
        let ttl = self.config.ttl_for(entry.record.source());
        if entry.is_fresh(now, ttl) {
            Some(entry)
        } else {
            tracing::debug!(
                "Cache entry for {} is stale ({}h old, ttl {}h)",
                key,
                entry.age(now).num_hours(),
                ttl.num_hours()
            );
            None
        }
    }

    async fn run_cascade(&self, company: &Company) -> (Option<FundamentalsRecord>, Vec<SourceAttempt>) {
        tracing::info!("Resolving fundamentals for {} ({:?} cascade)", company.name, self.config.mode);
        match self.config.mode {
            CascadeMode::Sequential => self.run_sequential(company).await,
            CascadeMode::Prefetch => self.run_prefetch(company).await,
        }
    }

    async fn run_sequential(&self, company: &Company) -> (Option<FundamentalsRecord>, Vec<SourceAttempt>) {
        let mut attempts = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let result = self.invoke(adapter.as_ref(), company).await;
            if let Some(record) = self.evaluate(adapter.as_ref(), company, result, &mut attempts) {
                return (Some(record), attempts);
            }
        }
        (None, attempts)
    }

    async fn run_prefetch(&self, company: &Company) -> (Option<FundamentalsRecord>, Vec<SourceAttempt>) {
        let mut attempts = Vec::with_capacity(self.adapters.len());
        let mut pending: FuturesOrdered<_> = self
            .adapters
            .iter()
            .map(|adapter| async move { (adapter, self.invoke(adapter.as_ref(), company).await) })
            .collect();

        // Yields in push order, so a later adapter can never pre-empt an earlier one
        while let Some((adapter, result)) = pending.next().await {
            if let Some(record) = self.evaluate(adapter.as_ref(), company, result, &mut attempts) {
                return (Some(record), attempts);
            }
        }
        (None, attempts)
    }

    async fn invoke(
        &self,
        adapter: &dyn SourceAdapter,
        company: &Company,
    ) -> Result<Option<FundamentalsRecord>, SourceError> {
        let timeout = self.config.timeout_for(adapter.kind());
        match tokio::time::timeout(timeout, adapter.resolve(company)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(timeout)),
        }
    }

    /// Record the outcome of one adapter; returns the record if it is accepted
    fn evaluate(
        &self,
        adapter: &dyn SourceAdapter,
        company: &Company,
        result: Result<Option<FundamentalsRecord>, SourceError>,
        attempts: &mut Vec<SourceAttempt>,
    ) -> Option<FundamentalsRecord> {
        let source = adapter.kind();
        let (outcome, accepted) = match result {
            Err(e) => {
                tracing::warn!("{} failed for {}: {}", source, company.name, e);
                (AttemptOutcome::Failed(e), None)
            }
            Ok(None) => {
                tracing::info!("{} has no data for {}", source, company.name);
                (AttemptOutcome::NoData, None)
            }
            Ok(Some(record)) if !record.is_well_formed() => {
                let e = SourceError::Malformed("record contains non-finite figures".to_string());
                tracing::warn!("{} failed for {}: {}", source, company.name, e);
                (AttemptOutcome::Failed(e), None)
            }
            Ok(Some(record)) => {
                let verdict = if adapter.requires_validation() {
                    self.gate.check(&record)
                } else {
                    Ok(())
                };
                match verdict {
                    Ok(()) => {
                        tracing::info!("Accepted {} data for {}", source, company.name);
                        (AttemptOutcome::Accepted, Some(record))
                    }
                    Err(rejection) => {
                        tracing::warn!("{} data rejected for {}: {}", source, company.name, rejection);
                        (AttemptOutcome::Rejected(rejection), None)
                    }
                }
            }
        };

        attempts.push(SourceAttempt { source, outcome });
        accepted
    }
}
