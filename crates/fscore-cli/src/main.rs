//! fscore: Piotroski F-score for the named companies.
//!
//! Fundamentals come from the cache when fresh, otherwise from the source
//! cascade (market site, AI report reading, company site, archive, built-in table).
//!
//! Usage:
//!   cargo run -p fscore-cli -- SAAB BioArctic
//!   cargo run -p fscore-cli -- --refresh --dilution-tolerance=0.05 "Intellego Technologies"
//!   cargo run -p fscore-cli -- --absolute-leverage --asset-turnover=false SAAB-B.ST
//!   cargo run -p fscore-cli -- --use-quarterly SAAB

use anyhow::{bail, Context, Result};
use fscore_core::PolicyOptions;
use fundamentals_resolver::{FScorer, Origin, ResolverConfig};

#[derive(Debug, PartialEq)]
struct Args {
    refresh: bool,
    use_quarterly: bool,
    options: PolicyOptions,
    companies: Vec<String>,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut args = Args {
        refresh: false,
        use_quarterly: false,
        options: PolicyOptions::default(),
        companies: Vec::new(),
    };

    for arg in raw {
        match arg.split_once('=') {
            _ if arg == "--refresh" => args.refresh = true,
            _ if arg == "--use-quarterly" => args.use_quarterly = true,
            _ if arg == "--absolute-leverage" => args.options.leverage_uses_ratio = false,
            Some(("--dilution-tolerance", value)) => {
                args.options.share_dilution_tolerance = value
                    .parse()
                    .with_context(|| format!("invalid dilution tolerance '{}'", value))?;
            }
            Some(("--asset-turnover", value)) => {
                args.options.asset_turnover_override = Some(
                    value
                        .parse()
                        .with_context(|| format!("--asset-turnover expects true or false, got '{}'", value))?,
                );
            }
            _ if arg.starts_with("--") => bail!("unknown option {}", arg),
            _ => args.companies.push(arg.clone()),
        }
    }

    if args.companies.is_empty() {
        bail!("usage: fscore [--refresh] [--use-quarterly] [--absolute-leverage] [--dilution-tolerance=X] [--asset-turnover=true|false] <company>...");
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "fscore=info,fundamentals_resolver=info,fundamentals_sources=warn".into())
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let mut config = ResolverConfig::from_env()?;
    config.sources.prefer_quarterly |= args.use_quarterly;
    tracing::info!(
        "Cascade mode {:?}, cache {}, AI reports {}",
        config.engine.mode,
        config.cache_url,
        if config.sources.openai_api_key.is_some() { "enabled" } else { "disabled" }
    );
    let scorer = FScorer::new(config.build_engine().await?);

    let mut failures = 0;
    for company in &args.companies {
        match scorer.score(company, &args.options, args.refresh).await {
            Ok(report) => {
                let origin = match report.origin {
                    Origin::Cache => format!("cache, {}", report.record.source()),
                    Origin::Source(kind) => kind.to_string(),
                };
                println!(
                    "{:<28} F-score {}/9  period {}  ({})",
                    report.company.name, report.score, report.record.provenance.report_period, origin
                );
            }
            Err(e) => {
                failures += 1;
                println!("{:<28} error: {}", company, e);
                for attempt in e.attempts() {
                    println!("    {}", attempt);
                }
            }
        }
    }

    if failures == args.companies.len() {
        bail!("no company could be scored");
    }
    Ok(())
}
