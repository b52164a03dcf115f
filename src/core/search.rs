use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use validator::Validate;

use crate::core::aggregator::{Aggregator, ContributionSource, ProfileSource};
use crate::core::cancel::CancelSignal;
use crate::core::query::build_query;
use crate::core::ranking::rank_candidates;
use crate::core::scoring::score_record;
use crate::models::{CandidateRecord, ScoringWeights, SearchRequest};
use crate::services::github::GithubError;

/// Errors surfaced to the caller of a search run
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded (retry after {retry_after:?}s)")]
    RateLimitExceeded { retry_after: Option<u64> },

    #[error("Search cancelled before completion")]
    Cancelled,

    #[error("Candidate search failed: {0}")]
    Upstream(String),
}

impl From<GithubError> for SearchError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::Unauthorized => SearchError::Authentication(err.to_string()),
            GithubError::RateLimited { retry_after } => SearchError::RateLimitExceeded { retry_after },
            other => SearchError::Upstream(other.to_string()),
        }
    }
}

/// Limits and deadlines for one service
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub default_limit: u16,
    pub max_limit: u16,
    pub concurrency: usize,
    pub scrape_timeout: Duration,
    pub run_timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
            concurrency: 4,
            scrape_timeout: Duration::from_secs(15),
            run_timeout: None,
        }
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct SearchOutcome {
    /// Ranked best first
    pub candidates: Vec<CandidateRecord>,
    /// Logins returned by the query step
    pub total_candidates: usize,
    /// Logins dropped because their structured data could not be fetched
    pub dropped: Vec<String>,
}

/// Orchestrates one search: query → aggregate → score → rank
///
/// # Pipeline Stages
/// 1. Build the provider query (no network)
/// 2. Resolve candidate logins, bounded by the request limit
/// 3. Aggregate both sources per candidate on a bounded worker pool
/// 4. Score each record against the requirement
/// 5. Rank by score, ties in aggregation order
#[derive(Clone)]
pub struct SearchService {
    profiles: Arc<dyn ProfileSource>,
    aggregator: Aggregator,
    weights: ScoringWeights,
    options: SearchOptions,
}

impl SearchService {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        pages: Arc<dyn ContributionSource>,
        weights: ScoringWeights,
        options: SearchOptions,
    ) -> Self {
        let aggregator = Aggregator::new(
            Arc::clone(&profiles),
            pages,
            options.concurrency,
            options.scrape_timeout,
        );
        Self {
            profiles,
            aggregator,
            weights,
            options,
        }
    }

    /// Run a search to completion
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        self.search_with_cancel(request, CancelSignal::never()).await
    }

    /// Run a search that stops when `cancel` fires or the run deadline passes
    ///
    /// A stopped run returns `SearchError::Cancelled`; in-flight fetches are
    /// abandoned and no partial list is returned.
    pub async fn search_with_cancel(
        &self,
        request: &SearchRequest,
        mut cancel: CancelSignal,
    ) -> Result<SearchOutcome, SearchError> {
        request
            .validate()
            .map_err(|e| SearchError::InvalidRequest(e.to_string()))?;

        let query = build_query(
            &request.requirement,
            request.location.as_deref(),
            request.language.as_deref(),
        )?;
        let limit = self.effective_limit(request.limit);

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let run = async {
            match self.options.run_timeout {
                Some(deadline) => tokio::time::timeout(deadline, self.run(&query, &request.requirement, limit))
                    .await
                    .unwrap_or_else(|_| {
                        tracing::warn!("Search deadline of {:?} exceeded", deadline);
                        Err(SearchError::Cancelled)
                    }),
                None => self.run(&query, &request.requirement, limit).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Search cancelled: {}", query);
                Err(SearchError::Cancelled)
            }
            result = run => result,
        }
    }

    /// Requested limit, defaulted and clamped to the configured maximum
    pub fn effective_limit(&self, requested: Option<u16>) -> usize {
        let max = self.options.max_limit.max(1);
        requested
            .unwrap_or(self.options.default_limit)
            .clamp(1, max) as usize
    }

    async fn run(&self, query: &str, requirement: &str, limit: usize) -> Result<SearchOutcome, SearchError> {
        tracing::info!("Searching candidates: {} (limit {})", query, limit);

        let mut logins = self.profiles.search_users(query, limit).await.map_err(|e| {
            tracing::error!("User search failed for {}: {}", query, e);
            SearchError::from(e)
        })?;
        logins.truncate(limit);
        let total_candidates = logins.len();

        tracing::debug!("Query returned {} candidates", total_candidates);

        let aggregation = self.aggregator.aggregate(logins).await?;

        let scored: Vec<CandidateRecord> = aggregation
            .records
            .into_iter()
            .map(|record| score_record(record, requirement, &self.weights))
            .collect();
        let candidates = rank_candidates(scored);

        tracing::info!(
            "Returning {} candidates ({} dropped) for {}",
            candidates.len(),
            aggregation.dropped.len(),
            query
        );

        Ok(SearchOutcome {
            candidates,
            total_candidates,
            dropped: aggregation.dropped.into_iter().map(|d| d.login).collect(),
        })
    }
}
