use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::aggregator::ProfileSource;
use crate::models::{LanguageBreakdown, LanguageUsage, StructuredProfile};
use crate::services::github::GithubError;

/// In-process cache of structured profile data
///
/// Successful fetches are kept for the configured TTL so repeated searches
/// spend less of the API rate limit. Failures are never cached, and neither
/// are language totals missing any repository.
pub struct ProfileCache {
    profiles: moka::future::Cache<String, StructuredProfile>,
    languages: moka::future::Cache<String, Vec<LanguageUsage>>,
}

impl ProfileCache {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let ttl = Duration::from_secs(ttl_secs);
        Self {
            profiles: moka::future::CacheBuilder::new(capacity)
                .time_to_live(ttl)
                .build(),
            languages: moka::future::CacheBuilder::new(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn profile(&self, login: &str) -> Option<StructuredProfile> {
        self.profiles.get(&CacheKey::profile(login)).await
    }

    pub async fn store_profile(&self, login: &str, profile: StructuredProfile) {
        self.profiles.insert(CacheKey::profile(login), profile).await;
    }

    pub async fn languages(&self, login: &str) -> Option<Vec<LanguageUsage>> {
        self.languages.get(&CacheKey::languages(login)).await
    }

    pub async fn store_languages(&self, login: &str, languages: Vec<LanguageUsage>) {
        self.languages.insert(CacheKey::languages(login), languages).await;
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Logins are case-insensitive on GitHub
    pub fn profile(login: &str) -> String {
        format!("profile:{}", login.to_lowercase())
    }

    pub fn languages(login: &str) -> String {
        format!("languages:{}", login.to_lowercase())
    }
}

/// Profile source that consults the cache before the wrapped source
pub struct CachedProfileSource {
    inner: Arc<dyn ProfileSource>,
    cache: Arc<ProfileCache>,
}

impl CachedProfileSource {
    pub fn new(inner: Arc<dyn ProfileSource>, cache: Arc<ProfileCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl ProfileSource for CachedProfileSource {
    async fn search_users(&self, query: &str, limit: usize) -> Result<Vec<String>, GithubError> {
        self.inner.search_users(query, limit).await
    }

    async fn fetch_profile(&self, login: &str) -> Result<StructuredProfile, GithubError> {
        if let Some(profile) = self.cache.profile(login).await {
            tracing::trace!("Profile cache hit: {}", login);
            return Ok(profile);
        }
        let profile = self.inner.fetch_profile(login).await?;
        self.cache.store_profile(login, profile.clone()).await;
        Ok(profile)
    }

    async fn fetch_languages(&self, login: &str) -> Result<LanguageBreakdown, GithubError> {
        if let Some(languages) = self.cache.languages(login).await {
            tracing::trace!("Languages cache hit: {}", login);
            return Ok(LanguageBreakdown::complete(languages));
        }
        let breakdown = self.inner.fetch_languages(login).await?;
        if breakdown.is_complete() {
            self.cache.store_languages(login, breakdown.languages.clone()).await;
        } else {
            tracing::debug!(
                "Not caching languages of {}: {} repositories skipped",
                login,
                breakdown.skipped_repos
            );
        }
        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        profile_calls: AtomicUsize,
        language_calls: AtomicUsize,
        fail_languages: bool,
        skipped_repos: usize,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                profile_calls: AtomicUsize::new(0),
                language_calls: AtomicUsize::new(0),
                fail_languages: false,
                skipped_repos: 0,
            }
        }
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn search_users(&self, _query: &str, _limit: usize) -> Result<Vec<String>, GithubError> {
            Ok(vec![])
        }

        async fn fetch_profile(&self, login: &str) -> Result<StructuredProfile, GithubError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            Ok(StructuredProfile {
                login: login.to_string(),
                display_name: login.to_string(),
                bio: None,
                location: None,
                public_repo_count: 1,
                follower_count: 2,
                languages: vec![],
                profile_url: format!("https://github.com/{}", login),
            })
        }

        async fn fetch_languages(&self, _login: &str) -> Result<LanguageBreakdown, GithubError> {
            self.language_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_languages {
                return Err(GithubError::Unavailable("503".to_string()));
            }
            Ok(LanguageBreakdown {
                languages: vec![LanguageUsage { name: "Rust".to_string(), weight: 1 }],
                skipped_repos: self.skipped_repos,
            })
        }
    }

    #[tokio::test]
    async fn test_profile_fetched_once() {
        let inner = Arc::new(CountingSource::new());
        let source = CachedProfileSource::new(inner.clone(), Arc::new(ProfileCache::new(10, 60)));

        source.fetch_profile("Octo").await.unwrap();
        source.fetch_profile("octo").await.unwrap();

        assert_eq!(inner.profile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let cache = Arc::new(ProfileCache::new(10, 60));
        let inner = Arc::new(CountingSource {
            fail_languages: true,
            ..CountingSource::new()
        });
        let source = CachedProfileSource::new(inner, cache.clone());

        assert!(source.fetch_languages("octo").await.is_err());
        assert!(cache.languages("octo").await.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_languages_not_cached() {
        let cache = Arc::new(ProfileCache::new(10, 60));
        let inner = Arc::new(CountingSource {
            skipped_repos: 1,
            ..CountingSource::new()
        });
        let source = CachedProfileSource::new(inner.clone(), cache.clone());

        let first = source.fetch_languages("octo").await.unwrap();
        assert!(!first.is_complete());
        assert!(cache.languages("octo").await.is_none());

        source.fetch_languages("octo").await.unwrap();
        assert_eq!(inner.language_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_complete_languages_served_from_cache() {
        let inner = Arc::new(CountingSource::new());
        let source = CachedProfileSource::new(inner.clone(), Arc::new(ProfileCache::new(10, 60)));

        source.fetch_languages("octo").await.unwrap();
        let cached = source.fetch_languages("OCTO").await.unwrap();

        assert!(cached.is_complete());
        assert_eq!(cached.languages[0].name, "Rust");
        assert_eq!(inner.language_calls.load(Ordering::SeqCst), 1);
    }
}
