use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::GithubSettings;
use crate::core::aggregator::ProfileSource;
use crate::models::{LanguageBreakdown, LanguageUsage, StructuredProfile};

/// Number of languages kept per candidate
pub const TOP_LANGUAGES: usize = 5;

const REPOS_PER_PAGE: usize = 100;
const SEARCH_PAGE_MAX: usize = 100;
const API_VERSION: &str = "2022-11-28";

/// Errors that can occur when talking to the GitHub REST API
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unauthorized: invalid or expired token")]
    Unauthorized,

    #[error("Rate limit exceeded (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl GithubError {
    /// Conditions that invalidate the whole search, not just one candidate
    pub fn is_fatal(&self) -> bool {
        matches!(self, GithubError::Unauthorized | GithubError::RateLimited { .. })
    }

    /// Failures worth retrying with linear backoff
    pub fn is_transient(&self) -> bool {
        match self {
            GithubError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GithubError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Retry knobs for one client
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_rate_limit_retries: u32,
    pub rate_limit_backoff: Duration,
    pub max_rate_limit_wait: Duration,
    pub transient_retries: u32,
    pub transient_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff for the n-th rate-limit retry, never shorter than
    /// the server's own hint
    fn rate_limit_delay(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let exp = self
            .rate_limit_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        match retry_after {
            Some(secs) => exp.max(Duration::from_secs(secs)),
            None => exp,
        }
    }

    fn transient_delay(&self, attempt: u32) -> Duration {
        self.transient_backoff.saturating_mul(attempt)
    }
}

impl From<&GithubSettings> for RetryPolicy {
    fn from(s: &GithubSettings) -> Self {
        Self {
            max_rate_limit_retries: s.max_rate_limit_retries,
            rate_limit_backoff: Duration::from_millis(s.rate_limit_backoff_ms),
            max_rate_limit_wait: Duration::from_secs(s.max_rate_limit_wait_secs),
            transient_retries: s.transient_retries,
            transient_backoff: Duration::from_millis(s.transient_backoff_ms),
        }
    }
}

/// Last rate-limit window reported by the API
#[derive(Debug, Default)]
struct RateLimitWindow {
    remaining: Option<u64>,
    reset_at: Option<i64>,
}

impl RateLimitWindow {
    fn record(&mut self, headers: &HeaderMap) {
        if let Some(remaining) = header_u64(headers, "x-ratelimit-remaining") {
            self.remaining = Some(remaining);
        }
        if let Some(reset) = header_u64(headers, "x-ratelimit-reset") {
            self.reset_at = Some(reset as i64);
        }
    }

    /// Seconds to wait before the next request, if the window is spent
    fn wait_secs(&self, now: i64) -> Option<u64> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset)) if reset > now => Some((reset - now) as u64),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    #[serde(default)]
    public_repos: u32,
    #[serde(default)]
    followers: u32,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    owner: ApiRepoOwner,
}

#[derive(Debug, Deserialize)]
struct SearchUsersResponse {
    #[serde(default)]
    items: Vec<SearchUserItem>,
}

#[derive(Debug, Deserialize)]
struct SearchUserItem {
    login: String,
}

/// Authenticated account behind the configured token
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
}

/// GitHub REST API client
///
/// One instance holds the authenticated session for every candidate of a
/// run. The rate-limit window is shared state: concurrent callers consult
/// the same window and wait together when it is spent.
pub struct GithubClient {
    base_url: String,
    web_base_url: String,
    token: String,
    user_agent: String,
    client: Client,
    policy: RetryPolicy,
    max_repo_pages: u32,
    window: Mutex<RateLimitWindow>,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(settings: &GithubSettings) -> Result<Self, GithubError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            web_base_url: settings.web_base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            user_agent: settings.user_agent.clone(),
            client,
            policy: RetryPolicy::from(settings),
            max_repo_pages: settings.max_repo_pages.max(1),
            window: Mutex::new(RateLimitWindow::default()),
        })
    }

    /// Verify the token by fetching the authenticated account
    pub async fn verify_token(&self) -> Result<AuthenticatedUser, GithubError> {
        let url = format!("{}/user", self.base_url);
        self.get_json(&url).await
    }

    /// Search user logins matching a provider query
    pub async fn search_users(&self, query: &str, limit: usize) -> Result<Vec<String>, GithubError> {
        let per_page = limit.clamp(1, SEARCH_PAGE_MAX);
        let url = format!(
            "{}/search/users?q={}&per_page={}",
            self.base_url,
            urlencoding::encode(query),
            per_page
        );

        tracing::debug!("Searching users: {}", query);

        let response: SearchUsersResponse = self.get_json(&url).await?;
        let mut logins: Vec<String> = Vec::with_capacity(response.items.len());
        for item in response.items {
            if !logins.iter().any(|l| l.eq_ignore_ascii_case(&item.login)) {
                logins.push(item.login);
            }
        }
        logins.truncate(limit);
        Ok(logins)
    }

    /// Fetch the authoritative profile fields, without languages
    pub async fn fetch_profile(&self, login: &str) -> Result<StructuredProfile, GithubError> {
        let url = format!("{}/users/{}", self.base_url, urlencoding::encode(login));
        let user: ApiUser = self.get_json(&url).await?;

        let profile_url = user
            .html_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.web_base_url, user.login));

        Ok(StructuredProfile {
            display_name: non_blank(user.name).unwrap_or_else(|| user.login.clone()),
            bio: non_blank(user.bio),
            location: non_blank(user.location),
            public_repo_count: user.public_repos,
            follower_count: user.followers,
            languages: Vec::new(),
            profile_url,
            login: user.login,
        })
    }

    /// Sum language bytes across the user's repositories and keep the top 5
    ///
    /// A repository whose language breakdown cannot be fetched is skipped
    /// and counted in `skipped_repos`; only fatal conditions abort the
    /// aggregation.
    pub async fn fetch_languages(&self, login: &str) -> Result<LanguageBreakdown, GithubError> {
        let repos = self.list_repos(login).await?;
        let mut per_repo = Vec::with_capacity(repos.len());
        let mut skipped_repos = 0;

        for repo in &repos {
            let url = format!(
                "{}/repos/{}/{}/languages",
                self.base_url,
                urlencoding::encode(&repo.owner.login),
                urlencoding::encode(&repo.name)
            );
            // Response order is heaviest first; IndexMap keeps it for tie-breaking
            match self.get_json::<IndexMap<String, u64>>(&url).await {
                Ok(langs) => per_repo.push(langs),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    skipped_repos += 1;
                    tracing::warn!("Skipping languages of {}/{}: {}", repo.owner.login, repo.name, e);
                }
            }
        }

        Ok(LanguageBreakdown {
            languages: top_languages(per_repo, TOP_LANGUAGES),
            skipped_repos,
        })
    }

    async fn list_repos(&self, login: &str) -> Result<Vec<ApiRepo>, GithubError> {
        let mut repos = Vec::new();
        for page in 1..=self.max_repo_pages {
            let url = format!(
                "{}/users/{}/repos?per_page={}&page={}",
                self.base_url,
                urlencoding::encode(login),
                REPOS_PER_PAGE,
                page
            );
            let batch: Vec<ApiRepo> = self.get_json(&url).await?;
            let short_page = batch.len() < REPOS_PER_PAGE;
            repos.extend(batch);
            if short_page {
                break;
            }
        }
        tracing::debug!("Listed {} repositories for {}", repos.len(), login);
        Ok(repos)
    }

    /// GET a JSON document, honouring the rate-limit and retry policy
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GithubError> {
        let mut rate_limit_attempts = 0u32;
        let mut transient_attempts = 0u32;

        loop {
            self.wait_for_window().await?;

            let result = match self.send(url).await {
                Ok(response) => response.json::<T>().await.map_err(|e| {
                    if e.is_decode() {
                        GithubError::InvalidResponse(e.to_string())
                    } else {
                        GithubError::RequestError(e)
                    }
                }),
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(GithubError::RateLimited { retry_after }) => {
                    if rate_limit_attempts >= self.policy.max_rate_limit_retries {
                        tracing::error!("Rate limit retries exhausted for {}", url);
                        return Err(GithubError::RateLimited { retry_after });
                    }
                    let delay = self.policy.rate_limit_delay(rate_limit_attempts, retry_after);
                    if delay > self.policy.max_rate_limit_wait {
                        return Err(GithubError::RateLimited { retry_after });
                    }
                    rate_limit_attempts += 1;
                    tracing::warn!(
                        "Rate limited on {}, retry {}/{} in {:?}",
                        url,
                        rate_limit_attempts,
                        self.policy.max_rate_limit_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() && transient_attempts < self.policy.transient_retries => {
                    transient_attempts += 1;
                    let delay = self.policy.transient_delay(transient_attempts);
                    tracing::warn!(
                        "Transient failure on {} ({}), retry {}/{} in {:?}",
                        url,
                        e,
                        transient_attempts,
                        self.policy.transient_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, url: &str) -> Result<Response, GithubError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        self.window.lock().await.record(response.headers());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(GithubError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(GithubError::RateLimited {
                retry_after: retry_after_secs(response.headers()),
            }),
            StatusCode::FORBIDDEN if is_rate_limit(response.headers()) => Err(GithubError::RateLimited {
                retry_after: retry_after_secs(response.headers()),
            }),
            StatusCode::NOT_FOUND => Err(GithubError::NotFound(url.to_string())),
            s if s.is_server_error() => Err(GithubError::Unavailable(s.to_string())),
            s => {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!("GitHub error body for {}: {}", url, body);
                Err(GithubError::ApiError(s.to_string()))
            }
        }
    }

    async fn wait_for_window(&self) -> Result<(), GithubError> {
        let wait = self.window.lock().await.wait_secs(chrono::Utc::now().timestamp());
        if let Some(secs) = wait {
            let delay = Duration::from_secs(secs);
            if delay > self.policy.max_rate_limit_wait {
                return Err(GithubError::RateLimited { retry_after: Some(secs) });
            }
            tracing::info!("Rate-limit window spent, waiting {}s for reset", secs);
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for GithubClient {
    async fn search_users(&self, query: &str, limit: usize) -> Result<Vec<String>, GithubError> {
        GithubClient::search_users(self, query, limit).await
    }

    async fn fetch_profile(&self, login: &str) -> Result<StructuredProfile, GithubError> {
        GithubClient::fetch_profile(self, login).await
    }

    async fn fetch_languages(&self, login: &str) -> Result<LanguageBreakdown, GithubError> {
        GithubClient::fetch_languages(self, login).await
    }
}

/// Sum per-repository weights and keep the `n` heaviest languages
///
/// Ties keep the order in which languages were first seen.
pub fn top_languages(per_repo: Vec<IndexMap<String, u64>>, n: usize) -> Vec<LanguageUsage> {
    let mut totals: Vec<LanguageUsage> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for repo in per_repo {
        for (name, weight) in repo {
            match index.get(&name) {
                Some(&i) => totals[i].weight += weight,
                None => {
                    index.insert(name.clone(), totals.len());
                    totals.push(LanguageUsage { name, weight });
                }
            }
        }
    }

    totals.sort_by(|a, b| b.weight.cmp(&a.weight));
    totals.truncate(n);
    totals
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_rate_limit(headers: &HeaderMap) -> bool {
    header_u64(headers, "x-ratelimit-remaining") == Some(0) || headers.contains_key(RETRY_AFTER)
}

/// Server hint for when to retry: `retry-after`, else the window reset
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    header_u64(headers, RETRY_AFTER.as_str()).or_else(|| {
        header_u64(headers, "x-ratelimit-reset").map(|reset| {
            let now = chrono::Utc::now().timestamp();
            (reset as i64 - now).max(0) as u64
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(pairs: &[(&str, u64)]) -> IndexMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_top_languages_sums_across_repos() {
        let result = top_languages(
            vec![
                langs(&[("Python", 300), ("Shell", 20)]),
                langs(&[("Python", 200), ("JavaScript", 50)]),
            ],
            TOP_LANGUAGES,
        );

        assert_eq!(result[0], LanguageUsage { name: "Python".to_string(), weight: 500 });
        assert_eq!(result[1], LanguageUsage { name: "JavaScript".to_string(), weight: 50 });
        assert_eq!(result[2], LanguageUsage { name: "Shell".to_string(), weight: 20 });
    }

    #[test]
    fn test_top_languages_keeps_five_with_first_seen_ties() {
        let result = top_languages(
            vec![
                langs(&[("Go", 10), ("Rust", 10)]),
                langs(&[("C", 10), ("Zig", 10)]),
                langs(&[("Haskell", 10), ("Ada", 99)]),
            ],
            TOP_LANGUAGES,
        );

        let names: Vec<_> = result.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Go", "Rust", "C", "Zig"]);
    }

    #[test]
    fn test_ties_within_one_repo_keep_response_order() {
        let per_repo: IndexMap<String, u64> =
            serde_json::from_str(r#"{"Zig": 100, "Ada": 100, "C": 5}"#).unwrap();

        let result = top_languages(vec![per_repo], TOP_LANGUAGES);

        let names: Vec<_> = result.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Zig", "Ada", "C"]);
    }

    #[test]
    fn test_window_wait() {
        let mut window = RateLimitWindow::default();
        assert_eq!(window.wait_secs(1_000), None);

        window.remaining = Some(0);
        window.reset_at = Some(1_030);
        assert_eq!(window.wait_secs(1_000), Some(30));
        assert_eq!(window.wait_secs(1_030), None);

        window.remaining = Some(5);
        assert_eq!(window.wait_secs(1_000), None);
    }

    #[test]
    fn test_rate_limit_delay_is_exponential() {
        let policy = RetryPolicy {
            max_rate_limit_retries: 3,
            rate_limit_backoff: Duration::from_millis(100),
            max_rate_limit_wait: Duration::from_secs(60),
            transient_retries: 2,
            transient_backoff: Duration::from_millis(50),
        };

        assert_eq!(policy.rate_limit_delay(0, None), Duration::from_millis(100));
        assert_eq!(policy.rate_limit_delay(2, None), Duration::from_millis(400));
        assert_eq!(policy.rate_limit_delay(0, Some(3)), Duration::from_secs(3));
        assert_eq!(policy.transient_delay(2), Duration::from_millis(100));
    }

    #[test]
    fn test_error_classification() {
        assert!(GithubError::Unauthorized.is_fatal());
        assert!(GithubError::RateLimited { retry_after: None }.is_fatal());
        assert!(!GithubError::NotFound("x".into()).is_fatal());
        assert!(GithubError::Unavailable("502".into()).is_transient());
        assert!(!GithubError::InvalidResponse("bad".into()).is_transient());
    }
}
