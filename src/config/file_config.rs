use crate::catalogue::DistributorCode;
use crate::listing::{CategoryUrl, DistributorSelectors};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    // Feature configs
    pub crawl: Option<CrawlConfig>,
    pub distributors: Vec<DistributorFileConfig>,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CrawlConfig {
    pub min_delay_secs: Option<u64>,
    pub max_delay_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    /// Periodic indexing of every enabled distributor. Absent means on demand only.
    pub index_interval_hours: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DistributorFileConfig {
    pub code: DistributorCode,
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub categories: Vec<CategoryUrl>,
    pub selectors: Option<DistributorSelectors>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// Name of the agent seeded from this section.
    pub name: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub max_concurrent_requests: Option<u32>,
    pub api_key: Option<String>,
    /// Environment variable holding the API key, used when `api_key` is absent.
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub prompt_template: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
