use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to search for candidates
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 256))]
    pub requirement: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[validate(range(min = 1))]
    #[serde(default)]
    pub limit: Option<u16>,
}

impl SearchRequest {
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_limit(mut self, limit: u16) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Query parameters for the past-search listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}
