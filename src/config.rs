//! Configuration for larder.
//!
//! `Settings` holds resolved runtime values. `Config` mirrors the optional
//! TOML file; every field in it is optional and is applied over the
//! defaults. CLI flags are applied last, by the command layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crawler::CrawlConfig;
use crate::repository::{EsConfig, RepositoryConfig, DEFAULT_SIMILARITY_THRESHOLD};
use crate::scrapers::{
    AdmissionConfig, FetchConfig, ProfileError, ProfileSet, RetryPolicy, SiteProfile,
};

/// Name of the config file looked up in the working directory and in the
/// user config directory.
pub const CONFIG_FILENAME: &str = "larder.toml";

/// Errors loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value in config file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workers: usize,
    pub max_depth: usize,
    /// Minimum spacing between requests to one host, in milliseconds.
    pub delay_ms: u64,
    /// Concurrent requests allowed per host.
    pub max_requests_per_domain: usize,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Whole-crawl timeout in minutes.
    pub crawl_timeout_minutes: u64,
    pub fetch_attempts: u32,
    pub similarity_threshold: f64,
    pub conflict_retries: u32,
    pub es_url: String,
    pub index: String,
    pub backup_dir: PathBuf,
    pub backups: bool,
    /// Empty means every domain.
    pub allowed_domains: Vec<String>,
    /// `None` or `"impersonate"` rotates browser user agents.
    pub user_agent: Option<String>,
    /// Site profiles added on top of the built-in table.
    pub profiles: Vec<SiteProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 10,
            max_depth: 3,
            delay_ms: 1000,
            max_requests_per_domain: 5,
            request_timeout: 45,
            crawl_timeout_minutes: 30,
            fetch_attempts: 3,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            conflict_retries: 3,
            es_url: "http://localhost:9200".to_string(),
            index: "recipes".to_string(),
            backup_dir: PathBuf::from("recipe_backups"),
            backups: true,
            allowed_domains: Vec::new(),
            user_agent: None,
            profiles: Vec::new(),
        }
    }
}

impl Settings {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.request_timeout),
            user_agent: self.user_agent.clone(),
            retry: RetryPolicy {
                max_attempts: self.fetch_attempts,
                ..Default::default()
            },
        }
    }

    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            max_concurrent: self.max_requests_per_domain,
            delay: Duration::from_millis(self.delay_ms),
        }
    }

    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            workers: self.workers,
            max_depth: self.max_depth,
            timeout: Duration::from_secs(self.crawl_timeout_minutes * 60),
        }
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            similarity_threshold: self.similarity_threshold,
            conflict_retries: self.conflict_retries,
            ..Default::default()
        }
    }

    pub fn es_config(&self) -> EsConfig {
        EsConfig {
            url: self.es_url.clone(),
            index: self.index.clone(),
            ..Default::default()
        }
    }

    /// Built-in profiles followed by the configured ones.
    pub fn profile_set(&self) -> Result<ProfileSet, ProfileError> {
        ProfileSet::builtin()?.with_profiles(self.profiles.clone())
    }
}

/// Contents of the TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests_per_domain: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_timeout_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Relative paths are resolved against the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<SiteProfile>,

    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load the config file: the explicit path if given, else
    /// `./larder.toml`, else `<config dir>/larder/larder.toml`. No file at
    /// all yields the defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path).await;
        }
        for candidate in Self::candidates() {
            if candidate.is_file() {
                return Self::load_from_path(&candidate).await;
            }
        }
        Ok(Self::default())
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILENAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("larder").join(CONFIG_FILENAME));
        }
        paths
    }

    /// Load configuration from a specific TOML file.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        if let Some(threshold) = config.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Invalid {
                    path,
                    message: format!("similarity_threshold {} is not between 0 and 1", threshold),
                });
            }
        }
        config.source_path = Some(path);
        Ok(config)
    }

    /// Directory relative paths are resolved against: the config file's
    /// directory, or the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply every set field over `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut settings.workers, &self.workers);
        set(&mut settings.max_depth, &self.max_depth);
        set(&mut settings.delay_ms, &self.delay_ms);
        set(&mut settings.max_requests_per_domain, &self.max_requests_per_domain);
        set(&mut settings.request_timeout, &self.request_timeout);
        set(&mut settings.crawl_timeout_minutes, &self.crawl_timeout_minutes);
        set(&mut settings.fetch_attempts, &self.fetch_attempts);
        set(&mut settings.similarity_threshold, &self.similarity_threshold);
        set(&mut settings.conflict_retries, &self.conflict_retries);
        set(&mut settings.es_url, &self.es_url);
        set(&mut settings.index, &self.index);
        set(&mut settings.backups, &self.backups);
        set(&mut settings.allowed_domains, &self.allowed_domains);
        if let Some(ref backup_dir) = self.backup_dir {
            settings.backup_dir = self.resolve_path(backup_dir, &self.base_dir());
        }
        if self.user_agent.is_some() {
            settings.user_agent = self.user_agent.clone();
        }
        settings.profiles.extend(self.profiles.iter().cloned());
    }

    /// Defaults with this config applied.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        self.apply_to_settings(&mut settings);
        settings
    }
}
