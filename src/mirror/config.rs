use crate::error::MirrorError;
use crate::mirror::urls::{SiteUrls, build_site_urls};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://dev.to/api";
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub username: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub api_base: String,
    pub page_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub page_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            timeout_secs: 30,
            page_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_domain: String,
    pub gh_username: String,
    pub project: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_domain: String::new(),
            gh_username: String::new(),
            project: "devto-mirror".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFlags {
    pub force_full: bool,
    pub dry_run: bool,
    pub fixture_empty: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub source: SourceConfig,
    pub retry: RetryConfig,
    pub site: SiteConfig,
    #[serde(skip)]
    pub run: RunFlags,
}

impl MirrorConfig {
    pub fn site_urls(&self) -> Result<SiteUrls> {
        let fallback = self
            .run
            .dry_run
            .then_some(self.source.username.as_str());
        build_site_urls(
            &self.site.site_domain,
            &self.site.gh_username,
            &self.site.project,
            fallback,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialMirrorConfig {
    source: Option<SourceConfig>,
    retry: Option<RetryConfig>,
    site: Option<SiteConfig>,
}

fn lookup_trimmed(lookup: &dyn Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_string(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: &str) -> String {
    lookup_trimmed(lookup, var).unwrap_or_else(|| fallback.to_string())
}

fn env_or_u64(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: u64) -> u64 {
    lookup_trimmed(lookup, var)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_or_u32(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: u32) -> u32 {
    lookup_trimmed(lookup, var)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn env_or_bool(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: bool) -> bool {
    match lookup_trimmed(lookup, var).as_deref() {
        Some("1" | "true" | "TRUE" | "True" | "yes" | "on") => true,
        Some("0" | "false" | "FALSE" | "False" | "no" | "off") => false,
        _ => fallback,
    }
}

fn validate(cfg: &MirrorConfig) -> Result<()> {
    if cfg.source.username.trim().is_empty() {
        return Err(MirrorError::InvalidConfig(
            "missing DEVTO_USERNAME (your Dev.to username)".to_string(),
        )
        .into());
    }
    if cfg.source.page_size == 0 || cfg.source.page_size > MAX_PAGE_SIZE {
        return Err(MirrorError::InvalidConfig(format!(
            "invalid page size {}: require 1 <= page_size <= {MAX_PAGE_SIZE}",
            cfg.source.page_size
        ))
        .into());
    }
    if cfg.retry.max_attempts == 0 {
        return Err(
            MirrorError::InvalidConfig("invalid max attempts: must be >= 1".to_string()).into(),
        );
    }
    if cfg.retry.timeout_secs == 0 {
        return Err(
            MirrorError::InvalidConfig("invalid request timeout: must be >= 1 second".to_string())
                .into(),
        );
    }
    if !cfg.source.api_base.starts_with("http://") && !cfg.source.api_base.starts_with("https://")
    {
        return Err(MirrorError::InvalidConfig(format!(
            "invalid api base `{}`: must be an http(s) URL",
            cfg.source.api_base
        ))
        .into());
    }
    cfg.site_urls()
        .map_err(|err| MirrorError::InvalidConfig(format!("{err:#}")))?;
    Ok(())
}

fn resolve_config_path(root: &Path, lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    lookup_trimmed(lookup, "DEVTO_MIRROR_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| root.join("devto-mirror.toml"))
}

fn merge_file_config(base: &mut MirrorConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialMirrorConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse mirror config {}: {err}", path.display()))?;
    if let Some(source) = parsed.source {
        base.source = source;
    }
    if let Some(retry) = parsed.retry {
        base.retry = retry;
    }
    if let Some(site) = parsed.site {
        base.site = site;
    }
    Ok(())
}

fn apply_pages_repo(site: &mut SiteConfig, raw: &str) -> Result<()> {
    let Some((user, repo)) = raw.split_once('/') else {
        return Err(MirrorError::InvalidConfig(format!(
            "invalid PAGES_REPO `{raw}` (expected 'user/repo')"
        ))
        .into());
    };
    if user.trim().is_empty() || repo.trim().is_empty() {
        return Err(MirrorError::InvalidConfig(format!(
            "invalid PAGES_REPO `{raw}` (expected 'user/repo')"
        ))
        .into());
    }
    site.gh_username = user.trim().to_string();
    site.project = repo.trim().to_string();
    Ok(())
}

pub fn load_config_with(
    root: &Path,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<MirrorConfig> {
    let mut cfg = MirrorConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(root, lookup))?;

    cfg.source.username = env_or_string(lookup, "DEVTO_USERNAME", &cfg.source.username);
    cfg.source.api_key = lookup_trimmed(lookup, "DEVTO_KEY");
    cfg.source.api_base = env_or_string(lookup, "DEVTO_MIRROR_API_BASE", &cfg.source.api_base)
        .trim_end_matches('/')
        .to_string();
    cfg.source.page_size = env_or_u32(lookup, "DEVTO_MIRROR_PAGE_SIZE", cfg.source.page_size);

    cfg.retry.max_attempts =
        env_or_u32(lookup, "DEVTO_MIRROR_MAX_ATTEMPTS", cfg.retry.max_attempts);
    cfg.retry.base_delay_ms =
        env_or_u64(lookup, "DEVTO_MIRROR_RETRY_BASE_MS", cfg.retry.base_delay_ms);
    cfg.retry.timeout_secs =
        env_or_u64(lookup, "DEVTO_MIRROR_TIMEOUT_SECS", cfg.retry.timeout_secs);
    cfg.retry.page_delay_ms =
        env_or_u64(lookup, "DEVTO_MIRROR_PAGE_DELAY_MS", cfg.retry.page_delay_ms);

    if let Some(pages_repo) = lookup_trimmed(lookup, "PAGES_REPO") {
        apply_pages_repo(&mut cfg.site, &pages_repo)?;
    }
    cfg.site.gh_username = env_or_string(lookup, "GH_USERNAME", &cfg.site.gh_username);
    cfg.site.site_domain = env_or_string(lookup, "SITE_DOMAIN", &cfg.site.site_domain);

    cfg.run.force_full = env_or_bool(lookup, "FORCE_FULL_REGEN", false);
    cfg.run.dry_run = env_or_bool(lookup, "VALIDATION_MODE", false);
    cfg.run.fixture_empty = env_or_bool(lookup, "VALIDATION_NO_POSTS", false);

    Ok(cfg)
}

/// Defaults, then the TOML file, then the environment. CLI flags are
/// applied by the caller before `validate_config`.
pub fn load_config(root: &Path) -> Result<MirrorConfig> {
    load_config_with(root, &|var: &str| env::var(var).ok())
}

pub fn validate_config(cfg: &MirrorConfig) -> Result<()> {
    validate(cfg)
}
