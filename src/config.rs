use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::ScoringWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub github: GithubSettings,
    #[serde(default)]
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct GithubSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,
    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,
    #[serde(default = "default_max_repo_pages")]
    pub max_repo_pages: u32,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            web_base_url: default_web_base_url(),
            token: String::new(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
            transient_retries: default_transient_retries(),
            transient_backoff_ms: default_transient_backoff_ms(),
            max_repo_pages: default_max_repo_pages(),
        }
    }
}

fn default_api_base_url() -> String { "https://api.github.com".to_string() }
fn default_web_base_url() -> String { "https://github.com".to_string() }
fn default_user_agent() -> String { format!("sphynx/{}", env!("CARGO_PKG_VERSION")) }
fn default_request_timeout_secs() -> u64 { 20 }
fn default_max_rate_limit_retries() -> u32 { 3 }
fn default_rate_limit_backoff_ms() -> u64 { 1000 }
fn default_max_rate_limit_wait_secs() -> u64 { 60 }
fn default_transient_retries() -> u32 { 2 }
fn default_transient_backoff_ms() -> u64 { 500 }
fn default_max_repo_pages() -> u32 { 3 }

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_pinned")]
    pub max_pinned: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
            max_pinned: default_max_pinned(),
        }
    }
}

fn default_scrape_timeout_secs() -> u64 { 15 }
fn default_max_pinned() -> usize { 6 }

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u16,
    #[serde(default = "default_max_limit")]
    pub max_limit: u16,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Whole-run deadline; unset means no deadline
    pub run_timeout_secs: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            concurrency: default_concurrency(),
            run_timeout_secs: None,
        }
    }
}

fn default_limit() -> u16 { 10 }
fn default_max_limit() -> u16 { 50 }
fn default_concurrency() -> usize { 4 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> u64 { 1000 }
fn default_cache_ttl_secs() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_history_path")]
    pub path: String,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { path: default_history_path() }
    }
}

fn default_history_path() -> String { "previous_searches.jsonl".to_string() }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_keyword_points")]
    pub keyword_points: f64,
    #[serde(default = "default_language_points")]
    pub language_points: f64,
    #[serde(default = "default_language_cap")]
    pub language_cap: f64,
    #[serde(default = "default_contribution_divisor")]
    pub contribution_divisor: f64,
    #[serde(default = "default_contribution_cap")]
    pub contribution_cap: f64,
    #[serde(default = "default_repo_points")]
    pub repo_points: f64,
    #[serde(default = "default_repo_cap")]
    pub repo_cap: f64,
    #[serde(default = "default_follower_divisor")]
    pub follower_divisor: f64,
    #[serde(default = "default_follower_cap")]
    pub follower_cap: f64,
    #[serde(default = "default_presence_bonus")]
    pub bio_bonus: f64,
    #[serde(default = "default_presence_bonus")]
    pub location_bonus: f64,
    #[serde(default = "default_expected_pinned")]
    pub expected_pinned: f64,
    #[serde(default = "default_pinned_cap")]
    pub pinned_cap: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            keyword_points: default_keyword_points(),
            language_points: default_language_points(),
            language_cap: default_language_cap(),
            contribution_divisor: default_contribution_divisor(),
            contribution_cap: default_contribution_cap(),
            repo_points: default_repo_points(),
            repo_cap: default_repo_cap(),
            follower_divisor: default_follower_divisor(),
            follower_cap: default_follower_cap(),
            bio_bonus: default_presence_bonus(),
            location_bonus: default_presence_bonus(),
            expected_pinned: default_expected_pinned(),
            pinned_cap: default_pinned_cap(),
        }
    }
}

fn default_keyword_points() -> f64 { 10.0 }
fn default_language_points() -> f64 { 5.0 }
fn default_language_cap() -> f64 { 20.0 }
fn default_contribution_divisor() -> f64 { 40.0 }
fn default_contribution_cap() -> f64 { 25.0 }
fn default_repo_points() -> f64 { 0.5 }
fn default_repo_cap() -> f64 { 20.0 }
fn default_follower_divisor() -> f64 { 100.0 }
fn default_follower_cap() -> f64 { 15.0 }
fn default_presence_bonus() -> f64 { 5.0 }
fn default_expected_pinned() -> f64 { 6.0 }
fn default_pinned_cap() -> f64 { 10.0 }

impl From<&WeightsConfig> for ScoringWeights {
    fn from(w: &WeightsConfig) -> Self {
        Self {
            keyword_points: w.keyword_points,
            language_points: w.language_points,
            language_cap: w.language_cap,
            contribution_divisor: w.contribution_divisor,
            contribution_cap: w.contribution_cap,
            repo_points: w.repo_points,
            repo_cap: w.repo_cap,
            follower_divisor: w.follower_divisor,
            follower_cap: w.follower_cap,
            bio_bonus: w.bio_bonus,
            location_bonus: w.location_bonus,
            expected_pinned: w.expected_pinned,
            pinned_cap: w.pinned_cap,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SPHYNX__)
    /// 5. GITHUB_TOKEN for the API token
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SPHYNX__SEARCH__CONCURRENCY -> search.concurrency
            .add_source(
                Environment::with_prefix("SPHYNX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = apply_token_override(settings)?;
        let parsed: Settings = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SPHYNX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = apply_token_override(settings)?;
        let parsed: Settings = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.github.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "github.token is empty; set GITHUB_TOKEN".to_string(),
            ));
        }
        if self.search.max_limit == 0 {
            return Err(ConfigError::Message("search.max_limit must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// GITHUB_TOKEN wins over any configured token
fn apply_token_override(settings: Config) -> Result<Config, ConfigError> {
    match std::env::var("GITHUB_TOKEN") {
        Ok(token) if !token.trim().is_empty() => Config::builder()
            .add_source(settings)
            .set_override("github.token", token)?
            .build(),
        _ => Ok(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_match_scoring_defaults() {
        let weights = ScoringWeights::from(&WeightsConfig::default());
        assert_eq!(weights, ScoringWeights::default());
    }

    #[test]
    fn test_default_search_settings() {
        let search = SearchSettings::default();
        assert_eq!(search.default_limit, 10);
        assert_eq!(search.max_limit, 50);
        assert_eq!(search.concurrency, 4);
        assert!(search.run_timeout_secs.is_none());
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphynx.toml");
        std::fs::write(
            &path,
            r#"
[github]
token = "file-token"

[search]
concurrency = 8

[scoring.weights]
keyword_points = 12.0
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.search.concurrency, 8);
        assert_eq!(settings.scoring.weights.keyword_points, 12.0);
        assert_eq!(settings.scoring.weights.repo_cap, 20.0);
        assert_eq!(settings.github.api_base_url, "https://api.github.com");
        assert!(!settings.github.token.is_empty());
    }
}
