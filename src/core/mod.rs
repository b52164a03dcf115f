// Core pipeline exports
pub mod aggregator;
pub mod cancel;
pub mod query;
pub mod ranking;
pub mod scoring;
pub mod search;

pub use aggregator::{Aggregation, Aggregator, CandidateProcessingError, ContributionSource, ProfileSource};
pub use cancel::{CancelHandle, CancelSignal};
pub use query::build_query;
pub use ranking::rank_candidates;
pub use scoring::{score_candidate, score_record};
pub use search::{SearchError, SearchOptions, SearchOutcome, SearchService};
