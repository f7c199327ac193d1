use anyhow::{bail, Context, Result};
use chrono::Duration;
use fscore_core::{PersistentCache, SourceKind};
use fundamentals_sources::{standard_cascade, SourceSettings};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{MemoryCache, SqliteCache};
use crate::engine::{CascadeMode, EngineConfig, ResolutionEngine};
use crate::quality::{QualityGate, QualityThresholds};

/// Cache URL value that selects the in-process cache
pub const MEMORY_CACHE: &str = "memory";

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub engine: EngineConfig,
    pub thresholds: QualityThresholds,
    pub cache_url: String,
    pub sources: SourceSettings,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            thresholds: QualityThresholds::default(),
            cache_url: "sqlite://cache/fscore.db?mode=rwc".to_string(),
            sources: SourceSettings::default(),
        }
    }
}

fn var_or(name: &str, default: impl ToString) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(name, &default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("invalid {}", name))
}

/// Cache lifetimes must be positive and fit a `chrono::Duration`
fn ttl_hours(name: &str, hours: i64) -> Result<Duration> {
    if hours <= 0 {
        bail!("{} must be a positive number of hours (got {})", name, hours);
    }
    Duration::try_hours(hours).with_context(|| format!("{} is too large ({} hours)", name, hours))
}

impl ResolverConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mut engine = EngineConfig {
            default_ttl: ttl_hours("FSCORE_CACHE_TTL_HOURS", parsed("FSCORE_CACHE_TTL_HOURS", 168i64)?)?,
            adapter_timeout: std::time::Duration::from_secs(parsed("FSCORE_ADAPTER_TIMEOUT_SECS", 30u64)?),
            mode: var_or("FSCORE_CASCADE_MODE", "sequential")
                .parse::<CascadeMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid FSCORE_CASCADE_MODE")?,
            ..defaults.engine
        };
        for kind in SourceKind::ALL {
            let name = format!("FSCORE_TTL_{}_HOURS", kind.as_str().to_uppercase());
            if let Ok(value) = env::var(&name) {
                let hours: i64 = value.trim().parse().with_context(|| format!("invalid {}", name))?;
                engine.source_ttls.insert(kind, ttl_hours(&name, hours)?);
            }
        }
        engine.source_timeouts.insert(
            SourceKind::AiReport,
            std::time::Duration::from_secs(parsed("FSCORE_AI_TIMEOUT_SECS", 120u64)?),
        );

        let gate = defaults.thresholds;
        let thresholds = QualityThresholds {
            max_missing: parsed("FSCORE_GATE_MAX_MISSING", gate.max_missing)?,
            small_revenue: parsed("FSCORE_GATE_SMALL_REVENUE", gate.small_revenue)?,
            net_income_multiple: parsed("FSCORE_GATE_NI_MULTIPLE", gate.net_income_multiple)?,
            min_asset_share: parsed("FSCORE_GATE_MIN_ASSET_SHARE", gate.min_asset_share)?,
            large_revenue: parsed("FSCORE_GATE_LARGE_REVENUE", gate.large_revenue)?,
        };

        let src = defaults.sources;
        let sources = SourceSettings {
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_model: var_or("OPENAI_MODEL", &src.openai_model),
            openai_base_url: var_or("OPENAI_BASE_URL", &src.openai_base_url),
            reports_dir: PathBuf::from(var_or("FSCORE_REPORTS_DIR", src.reports_dir.display())),
            prefer_quarterly: parsed("FSCORE_USE_QUARTERLY", src.prefer_quarterly)?,
            rate_limit_per_minute: parsed("FSCORE_RATE_LIMIT", src.rate_limit_per_minute)?,
            http_timeout: std::time::Duration::from_secs(parsed(
                "FSCORE_HTTP_TIMEOUT_SECS",
                src.http_timeout.as_secs(),
            )?),
            validate_company_site: parsed("FSCORE_VALIDATE_COMPANY_SITE", src.validate_company_site)?,
            validate_archive: parsed("FSCORE_VALIDATE_ARCHIVE", src.validate_archive)?,
            ..src
        };

        Ok(Self {
            engine,
            thresholds,
            cache_url: var_or("FSCORE_CACHE_URL", &defaults.cache_url),
            sources,
        })
    }

    pub async fn open_cache(&self) -> Result<Arc<dyn PersistentCache>> {
        if self.cache_url.eq_ignore_ascii_case(MEMORY_CACHE) {
            return Ok(Arc::new(MemoryCache::new()));
        }
        let cache = SqliteCache::connect(&self.cache_url)
            .await
            .with_context(|| format!("opening cache at {}", self.cache_url))?;
        Ok(Arc::new(cache))
    }

    /// Engine over the standard adapters and the configured cache
    pub async fn build_engine(&self) -> Result<ResolutionEngine> {
        let adapters = standard_cascade(&self.sources).context("building source adapters")?;
        let cache = self.open_cache().await?;

        Ok(ResolutionEngine::new(adapters, cache)
            .with_gate(QualityGate::new(self.thresholds))
            .with_config(self.engine.clone()))
    }
}
