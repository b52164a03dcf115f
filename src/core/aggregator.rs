use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::time::Instant;

use crate::core::search::SearchError;
use crate::models::{CandidateRecord, LanguageBreakdown, ScrapedProfile, StructuredProfile};
use crate::services::github::GithubError;

/// Authoritative, rate-limited profile source
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn search_users(&self, query: &str, limit: usize) -> Result<Vec<String>, GithubError>;

    async fn fetch_profile(&self, login: &str) -> Result<StructuredProfile, GithubError>;

    async fn fetch_languages(&self, login: &str) -> Result<LanguageBreakdown, GithubError>;
}

/// Best-effort source for fields only present on the profile page
///
/// Implementations never fail: missing data comes back as field defaults.
/// Work still pending at `deadline` is abandoned and whatever was already
/// extracted is returned.
#[async_trait]
pub trait ContributionSource: Send + Sync {
    async fn fetch_contribution_data(&self, login: &str, deadline: Instant) -> ScrapedProfile;
}

/// A candidate that could not be aggregated and was dropped from the run
#[derive(Debug, Error)]
#[error("failed to process candidate {login}: {source}")]
pub struct CandidateProcessingError {
    pub login: String,
    #[source]
    pub source: GithubError,
}

/// Records collected for one run, in aggregation order
#[derive(Debug, Default)]
pub struct Aggregation {
    pub records: Vec<CandidateRecord>,
    pub dropped: Vec<CandidateProcessingError>,
}

/// Fans each candidate out to both sources with per-candidate fault isolation
///
/// Candidates run on a bounded pool of `concurrency` workers; within one
/// candidate the structured and scraped fetches run concurrently.
#[derive(Clone)]
pub struct Aggregator {
    profiles: Arc<dyn ProfileSource>,
    pages: Arc<dyn ContributionSource>,
    concurrency: usize,
    scrape_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        pages: Arc<dyn ContributionSource>,
        concurrency: usize,
        scrape_timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            pages,
            concurrency: concurrency.max(1),
            scrape_timeout,
        }
    }

    /// Aggregate every login into an unscored record
    ///
    /// Fails only on run-wide conditions (bad credentials, exhausted rate
    /// limit). Any other structured-source failure drops that candidate.
    pub async fn aggregate(&self, logins: Vec<String>) -> Result<Aggregation, SearchError> {
        let mut results = stream::iter(logins.into_iter().enumerate())
            .map(|(position, login)| async move {
                let result = self.aggregate_one(&login).await;
                (position, login, result)
            })
            .buffer_unordered(self.concurrency);

        let mut collected: Vec<(usize, CandidateRecord)> = Vec::new();
        let mut dropped = Vec::new();

        while let Some((position, login, result)) = results.next().await {
            match result {
                Ok(record) => collected.push((position, record)),
                Err(e) if e.is_fatal() => {
                    tracing::error!("Aborting run while processing {}: {}", login, e);
                    return Err(SearchError::from(e));
                }
                Err(e) => {
                    let err = CandidateProcessingError { login, source: e };
                    tracing::warn!("Dropping candidate: {}", err);
                    dropped.push(err);
                }
            }
        }

        collected.sort_by_key(|(position, _)| *position);

        Ok(Aggregation {
            records: collected.into_iter().map(|(_, record)| record).collect(),
            dropped,
        })
    }

    async fn aggregate_one(&self, login: &str) -> Result<CandidateRecord, GithubError> {
        let (structured, scraped) =
            tokio::join!(self.fetch_structured(login), self.fetch_scraped(login));
        Ok(CandidateRecord::merge(structured?, scraped))
    }

    /// Profile plus languages; a non-fatal language failure leaves the
    /// language list empty instead of failing the candidate
    async fn fetch_structured(&self, login: &str) -> Result<StructuredProfile, GithubError> {
        let (profile, languages) = tokio::join!(
            self.profiles.fetch_profile(login),
            self.profiles.fetch_languages(login)
        );

        let mut profile = profile?;
        profile.languages = match languages {
            Ok(breakdown) => breakdown.languages,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Languages unavailable for {}, continuing without: {}", login, e);
                Vec::new()
            }
        };
        Ok(profile)
    }

    /// The source gets the same deadline as the hard timeout so it can hand
    /// back a partial profile before the timeout fires
    async fn fetch_scraped(&self, login: &str) -> ScrapedProfile {
        let deadline = Instant::now() + self.scrape_timeout;
        match tokio::time::timeout_at(deadline, self.pages.fetch_contribution_data(login, deadline)).await {
            Ok(scraped) => scraped,
            Err(_) => {
                tracing::warn!(
                    "Profile page for {} timed out after {:?}, using defaults",
                    login,
                    self.scrape_timeout
                );
                ScrapedProfile::default()
            }
        }
    }
}
