use serde::{Deserialize, Serialize};

/// Sentinel streak text used when the profile page could not provide one
pub const STREAK_UNAVAILABLE: &str = "N/A";

/// Summed byte weight of one language across a user's repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageUsage {
    pub name: String,
    pub weight: u64,
}

/// Language totals for one user
///
/// `skipped_repos` counts repositories whose breakdown could not be read; a
/// non-zero count means the totals are incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageBreakdown {
    pub languages: Vec<LanguageUsage>,
    pub skipped_repos: usize,
}

impl LanguageBreakdown {
    pub fn complete(languages: Vec<LanguageUsage>) -> Self {
        Self {
            languages,
            skipped_repos: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.skipped_repos == 0
    }
}

/// Authoritative profile fields served by the GitHub REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredProfile {
    pub login: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "publicRepoCount")]
    pub public_repo_count: u32,
    #[serde(rename = "followerCount")]
    pub follower_count: u32,
    /// Top languages, heaviest first
    pub languages: Vec<LanguageUsage>,
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
}

/// Fields only available on the rendered profile page
///
/// Every field has a default that stands in when the page (or just that
/// part of it) could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedProfile {
    #[serde(rename = "contributionCount")]
    pub contribution_count: u64,
    #[serde(rename = "pinnedItems")]
    pub pinned_items: Vec<String>,
    #[serde(rename = "contributionStreak")]
    pub contribution_streak: String,
}

impl Default for ScrapedProfile {
    fn default() -> Self {
        Self {
            contribution_count: 0,
            pinned_items: Vec::new(),
            contribution_streak: STREAK_UNAVAILABLE.to_string(),
        }
    }
}

/// Merged, scored representation of one searched profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub login: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "publicRepoCount")]
    pub public_repo_count: u32,
    #[serde(rename = "followerCount")]
    pub follower_count: u32,
    pub languages: Vec<LanguageUsage>,
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
    #[serde(rename = "contributionCount")]
    pub contribution_count: u64,
    #[serde(rename = "pinnedItems")]
    pub pinned_items: Vec<String>,
    #[serde(rename = "contributionStreak")]
    pub contribution_streak: String,
    pub score: f64,
    pub explanation: Vec<String>,
}

impl CandidateRecord {
    /// Merge the two source results into an unscored record
    pub fn merge(structured: StructuredProfile, scraped: ScrapedProfile) -> Self {
        Self {
            login: structured.login,
            display_name: structured.display_name,
            bio: structured.bio,
            location: structured.location,
            public_repo_count: structured.public_repo_count,
            follower_count: structured.follower_count,
            languages: structured.languages,
            profile_url: structured.profile_url,
            contribution_count: scraped.contribution_count,
            pinned_items: scraped.pinned_items,
            contribution_streak: scraped.contribution_streak,
            score: 0.0,
            explanation: Vec::new(),
        }
    }

    /// Finalize the record with its score; consumes the unscored record
    pub fn scored(self, score: f64, explanation: Vec<String>) -> Self {
        Self {
            score,
            explanation,
            ..self
        }
    }
}

/// Scoring weights
///
/// Each component is `min(quantity × rate, cap)` except keyword overlap,
/// which is only bounded by the final clamp to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub keyword_points: f64,
    pub language_points: f64,
    pub language_cap: f64,
    pub contribution_divisor: f64,
    pub contribution_cap: f64,
    pub repo_points: f64,
    pub repo_cap: f64,
    pub follower_divisor: f64,
    pub follower_cap: f64,
    pub bio_bonus: f64,
    pub location_bonus: f64,
    pub expected_pinned: f64,
    pub pinned_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword_points: 10.0,
            language_points: 5.0,
            language_cap: 20.0,
            contribution_divisor: 40.0,
            contribution_cap: 25.0,
            repo_points: 0.5,
            repo_cap: 20.0,
            follower_divisor: 100.0,
            follower_cap: 15.0,
            bio_bonus: 5.0,
            location_bonus: 5.0,
            expected_pinned: 6.0,
            pinned_cap: 10.0,
        }
    }
}

/// One line of the append-only past-search log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub requirement: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(rename = "resultCount")]
    pub result_count: usize,
    #[serde(rename = "topCandidates", default)]
    pub top_candidates: Vec<RankedLogin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedLogin {
    pub login: String,
    pub score: f64,
}
