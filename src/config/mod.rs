mod file_config;

pub use file_config::{CrawlConfig, DistributorFileConfig, FileConfig, LlmConfig};

use crate::catalogue::DistributorCode;
use crate::listing::{CategoryUrl, DistributorSelectors};
use crate::server::RequestsLoggingLevel;
use crate::verification::DEFAULT_PROMPT_TEMPLATE;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_AGENT_NAME: &str = "default";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,

    // Feature configs (with defaults)
    pub crawl: CrawlSettings,
    pub distributors: Vec<DistributorConfig>,
    pub llm: Option<LlmSettings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub index_interval_hours: Option<u64>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            min_delay_secs: 1,
            max_delay_secs: 3,
            request_timeout_secs: 30,
            index_interval_hours: None,
        }
    }
}

impl CrawlSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One distributor the indexer can crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributorConfig {
    pub code: DistributorCode,
    pub name: String,
    pub enabled: bool,
    /// Catalogue sections in crawl order.
    pub categories: Vec<CategoryUrl>,
    pub selectors: Option<DistributorSelectors>,
}

/// Agent seeded into the store at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub agent_name: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_concurrent_requests: u32,
    pub api_key: String,
    pub base_url: String,
    pub prompt_template: String,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let crawl = resolve_crawl(file.crawl.unwrap_or_default())?;

        let mut seen = HashSet::new();
        let mut distributors = Vec::with_capacity(file.distributors.len());
        for d in file.distributors {
            if !seen.insert(d.code) {
                bail!("Distributor {} is configured more than once", d.code);
            }
            distributors.push(DistributorConfig {
                code: d.code,
                name: d.name.unwrap_or_else(|| d.code.as_str().to_string()),
                enabled: d.enabled,
                categories: d.categories,
                selectors: d.selectors,
            });
        }

        let llm = file.llm.map(resolve_llm).transpose()?;

        Ok(Self {
            db_path,
            port,
            logging_level,
            crawl,
            distributors,
            llm,
        })
    }

    pub fn distributor(&self, code: DistributorCode) -> Option<&DistributorConfig> {
        self.distributors.iter().find(|d| d.code == code)
    }
}

fn resolve_crawl(file: CrawlConfig) -> Result<CrawlSettings> {
    let defaults = CrawlSettings::default();
    let settings = CrawlSettings {
        min_delay_secs: file.min_delay_secs.unwrap_or(defaults.min_delay_secs),
        max_delay_secs: file.max_delay_secs.unwrap_or(defaults.max_delay_secs),
        request_timeout_secs: file
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs),
        index_interval_hours: file.index_interval_hours.filter(|h| *h > 0),
    };
    if settings.min_delay_secs > settings.max_delay_secs {
        bail!(
            "crawl.min_delay_secs ({}) must not exceed crawl.max_delay_secs ({})",
            settings.min_delay_secs,
            settings.max_delay_secs
        );
    }
    Ok(settings)
}

fn resolve_llm(file: LlmConfig) -> Result<LlmSettings> {
    let api_key = match file.api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => key,
        None => {
            let env_name = file.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
            match std::env::var(env_name) {
                Ok(key) if !key.trim().is_empty() => key,
                _ => bail!(
                    "llm.api_key is not set and environment variable {} is empty",
                    env_name
                ),
            }
        }
    };

    let max_concurrent_requests = file.max_concurrent_requests.unwrap_or(5);
    if max_concurrent_requests == 0 {
        bail!("llm.max_concurrent_requests must be at least 1");
    }

    Ok(LlmSettings {
        agent_name: file.name.unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
        model: file.model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        max_tokens: file.max_tokens.unwrap_or(1024),
        max_concurrent_requests,
        api_key,
        base_url: file
            .base_url
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
        prompt_template: file
            .prompt_template
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        request_timeout_secs: file.request_timeout_secs.unwrap_or(120),
    })
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
