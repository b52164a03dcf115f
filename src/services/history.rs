use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::{CandidateRecord, RankedLogin, SearchLogEntry, SearchRequest};

/// Candidates kept per log entry
const LOGGED_CANDIDATES: usize = 10;

/// Errors that can occur with the past-search log
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Append-only JSON-lines log of completed searches
///
/// Display-only: nothing in the search pipeline reads it back.
pub struct SearchHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SearchHistory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one entry as a single line
    pub async fn append(&self, entry: &SearchLogEntry) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!("Logged search {} to {}", entry.id, self.path.display());
        Ok(())
    }

    /// Newest `limit` entries, newest first; malformed lines are skipped
    pub async fn recent(&self, limit: usize) -> Result<Vec<SearchLogEntry>, HistoryError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(contents
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<SearchLogEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping malformed search log line: {}", e);
                    None
                }
            })
            .take(limit)
            .collect())
    }
}

/// Log entry for a completed search
pub fn log_entry(
    id: uuid::Uuid,
    request: &SearchRequest,
    candidates: &[CandidateRecord],
) -> SearchLogEntry {
    SearchLogEntry {
        id,
        timestamp: chrono::Utc::now(),
        requirement: request.requirement.clone(),
        location: request.location.clone(),
        language: request.language.clone(),
        result_count: candidates.len(),
        top_candidates: candidates
            .iter()
            .take(LOGGED_CANDIDATES)
            .map(|c| RankedLogin {
                login: c.login.clone(),
                score: c.score,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(requirement: &str) -> SearchLogEntry {
        log_entry(uuid::Uuid::new_v4(), &SearchRequest::new(requirement), &[])
    }

    #[tokio::test]
    async fn test_append_and_read_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = SearchHistory::new(dir.path().join("searches.jsonl"));

        history.append(&entry("rust")).await.unwrap();
        history.append(&entry("go")).await.unwrap();
        history.append(&entry("zig")).await.unwrap();

        let recent = history.recent(2).await.unwrap();
        let requirements: Vec<_> = recent.iter().map(|e| e.requirement.as_str()).collect();
        assert_eq!(requirements, vec!["zig", "go"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = SearchHistory::new(dir.path().join("absent.jsonl"));
        assert!(history.recent(10).await.unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("searches.jsonl");
        let good = serde_json::to_string(&entry("python")).unwrap();
        std::fs::write(&path, format!("{}\nnot json\n\n", good)).unwrap();

        let history = SearchHistory::new(&path);
        let recent = tokio_test::block_on(history.recent(10)).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].requirement, "python");
    }
}
