// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CandidateRecord, LanguageBreakdown, LanguageUsage, RankedLogin, ScoringWeights, ScrapedProfile, SearchLogEntry,
    StructuredProfile, STREAK_UNAVAILABLE,
};
pub use requests::{HistoryQuery, SearchRequest};
pub use responses::{ErrorResponse, HealthResponse, HistoryResponse, SearchResponse};
