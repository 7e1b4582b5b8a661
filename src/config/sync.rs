// src/config/sync.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use std::{env, fs};
use std::path::{Path, PathBuf};

use crate::retry::{CallClass, RetryPolicy};

pub const ENV_CONFIG_PATH: &str = "MORTGAGE_SYNC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/sync.toml";

const ENV_FEED_USERNAME: &str = "FEED_USERNAME";
const ENV_FEED_PASSWORD: &str = "FEED_PASSWORD";
const ENV_TARGET_TOKEN: &str = "WEBFLOW_TOKEN";
const ENV_BANKS_TOKEN: &str = "WEBFLOW_BANKS_TOKEN";

fn env_marker() -> String {
    "ENV".to_string()
}
fn default_feed_url() -> String {
    "https://www.finansportalen.no/services/feed/v3/bank/boliglan.atom".to_string()
}
fn default_api_base() -> String {
    "https://api.webflow.com/v2".to_string()
}
fn default_target_collection() -> String {
    "6686b2ab64e4a4d49a95b336".to_string()
}
fn default_banks_collection() -> String {
    "66636a29a268f18ba1798b0a".to_string()
}
fn default_page_size() -> usize {
    100
}
fn default_bank_max_pages() -> usize {
    4
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// "ENV" means: read from FEED_USERNAME
    #[serde(default = "env_marker")]
    pub username: String,
    /// "ENV" means: read from FEED_PASSWORD
    #[serde(default = "env_marker")]
    pub password: String,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            username: env_marker(),
            password: env_marker(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetSection {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_target_collection")]
    pub collection_id: String,
    /// "ENV" means: read from WEBFLOW_TOKEN
    #[serde(default = "env_marker")]
    pub token: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            collection_id: default_target_collection(),
            token: env_marker(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanksSection {
    #[serde(default = "default_banks_collection")]
    pub collection_id: String,
    /// "ENV" means: WEBFLOW_BANKS_TOKEN, falling back to WEBFLOW_TOKEN
    #[serde(default = "env_marker")]
    pub token: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_bank_max_pages")]
    pub max_pages: usize,
}

impl Default for BanksSection {
    fn default() -> Self {
        Self {
            collection_id: default_banks_collection(),
            token: env_marker(),
            page_size: default_page_size(),
            max_pages: default_bank_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingSection {
    #[serde(default = "default_delay_ms")]
    pub write_delay_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            write_delay_ms: default_delay_ms(),
            page_delay_ms: default_delay_ms(),
            http_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry counts per external call class. All zero unless configured:
/// a retried create can produce a duplicate item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySection {
    #[serde(default)]
    pub feed: u8,
    #[serde(default)]
    pub index_page: u8,
    #[serde(default)]
    pub bank_lookup: u8,
    #[serde(default)]
    pub write: u8,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    /// Abort before any write when the remote index could not be listed completely.
    #[serde(default)]
    pub abort_on_partial_index: bool,
    /// Item id to refresh (name, supplier, timestamp) ahead of the full sync.
    #[serde(default)]
    pub refresh_item_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub banks: BanksSection,
    #[serde(default)]
    pub pacing: PacingSection,
    #[serde(default)]
    pub retries: RetrySection,
    #[serde(default)]
    pub sync: RunSection,
}

impl SyncConfig {
    /// Parse TOML text without touching secrets. See [`SyncConfig::resolve_secrets`].
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: SyncConfig = toml::from_str(s).context("parsing sync config toml")?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path and resolve "ENV" secrets.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading sync config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;
        cfg.resolve_secrets()?;
        Ok(cfg)
    }

    /// Load config using env var + fallbacks:
    /// 1) $MORTGAGE_SYNC_CONFIG
    /// 2) config/sync.toml
    /// 3) built-in defaults (secrets from env)
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(&default_path);
        }
        let mut cfg = SyncConfig::default();
        cfg.resolve_secrets()?;
        Ok(cfg)
    }

    /// Replace every "ENV" secret with the matching environment variable.
    pub fn resolve_secrets(&mut self) -> Result<()> {
        resolve_one(&mut self.feed.username, &[ENV_FEED_USERNAME])?;
        resolve_one(&mut self.feed.password, &[ENV_FEED_PASSWORD])?;
        resolve_one(&mut self.target.token, &[ENV_TARGET_TOKEN])?;
        resolve_one(&mut self.banks.token, &[ENV_BANKS_TOKEN, ENV_TARGET_TOKEN])?;
        Ok(())
    }

    fn sanitize(&mut self) {
        self.target.page_size = self.target.page_size.max(1);
        self.banks.page_size = self.banks.page_size.max(1);
        self.target.api_base = self.target.api_base.trim_end_matches('/').to_string();
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.pacing.write_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.pacing.page_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.pacing.http_timeout_secs.max(1))
    }

    pub fn retry_policy(&self, class: CallClass) -> RetryPolicy {
        let max_retries = match class {
            CallClass::Feed => self.retries.feed,
            CallClass::IndexPage => self.retries.index_page,
            CallClass::BankLookup => self.retries.bank_lookup,
            CallClass::Write => self.retries.write,
        };
        RetryPolicy::new(max_retries, Duration::from_millis(self.retries.backoff_ms))
    }
}

fn resolve_one(slot: &mut String, vars: &[&str]) -> Result<()> {
    if !slot.trim().eq_ignore_ascii_case("env") {
        return Ok(());
    }
    for var in vars {
        if let Ok(v) = env::var(var) {
            if !v.trim().is_empty() {
                *slot = v;
                return Ok(());
            }
        }
    }
    Err(anyhow!("Missing {} env var", vars.join(" / ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.target.page_size, 100);
        assert_eq!(cfg.banks.max_pages, 4);
        assert_eq!(cfg.write_delay(), Duration::from_secs(1));
        assert_eq!(cfg.feed.username, "ENV");
        assert!(!cfg.sync.abort_on_partial_index);
        assert!(cfg.sync.refresh_item_id.is_none());
    }

    #[test]
    fn page_sizes_clamp_and_base_is_trimmed() {
        let cfg = SyncConfig::from_toml_str(
            r#"
[target]
api_base = "http://localhost:9000/v2/"
page_size = 0

[banks]
page_size = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.target.page_size, 1);
        assert_eq!(cfg.banks.page_size, 1);
        assert_eq!(cfg.target.api_base, "http://localhost:9000/v2");
    }

    #[test]
    fn retry_policy_is_per_call_class() {
        let cfg = SyncConfig::from_toml_str(
            r#"
[retries]
index_page = 2
backoff_ms = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.retry_policy(CallClass::IndexPage).max_retries, 2);
        assert_eq!(cfg.retry_policy(CallClass::Write).max_retries, 0);
        assert_eq!(cfg.retry_policy(CallClass::Feed).max_retries, 0);
    }

    #[test]
    fn literal_secrets_are_kept() {
        let mut cfg = SyncConfig::from_toml_str(
            r#"
[feed]
username = "u"
password = "p"

[target]
token = "t"

[banks]
token = "b"
"#,
        )
        .unwrap();
        cfg.resolve_secrets().unwrap();
        assert_eq!(cfg.feed.username, "u");
        assert_eq!(cfg.banks.token, "b");
    }
}
