//! Sphynx - candidate search over GitHub profiles
//!
//! Finds profiles matching a free-text requirement, enriches each one from
//! the GitHub REST API and the public profile page, and ranks them by an
//! explainable 0-100 score.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{build_query, score_candidate, SearchError, SearchOutcome, SearchService};
pub use models::{CandidateRecord, ScoringWeights, SearchRequest, SearchResponse};
