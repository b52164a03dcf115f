use serde::{Deserialize, Serialize};
use crate::models::domain::{CandidateRecord, SearchLogEntry};

/// Response for the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "searchId")]
    pub search_id: uuid::Uuid,
    pub candidates: Vec<CandidateRecord>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    /// Logins whose profile data could not be fetched
    #[serde(rename = "droppedCandidates")]
    pub dropped_candidates: Vec<String>,
}

/// Response for the past-search listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub searches: Vec<SearchLogEntry>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
