use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::{GithubSettings, ScraperSettings};
use crate::core::aggregator::ContributionSource;
use crate::models::{ScrapedProfile, STREAK_UNAVAILABLE};
use crate::services::html::{element_text, find_tag_with_classes, matching_close, text_until_close};
use crate::services::pool::SessionPool;

const CONTRIBUTIONS_BLOCK: &[&str] = &["js-yearly-contributions"];
const CONTRIBUTIONS_HEADING: &[&str] = &["f4", "text-normal", "mb-2"];
const PINNED_ITEM: &[&str] = &["pinned-item-list-item-content"];
const PINNED_LABEL: &[&str] = &["repo"];

/// Profile page could not be loaded at all
#[derive(Debug, Error)]
pub enum PageError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Page returned status {0}")]
    Status(u16),
}

/// One field could not be extracted; recovered with that field's default
#[derive(Debug, Error)]
#[error("{field}: {reason}")]
pub struct PartialFetchError {
    pub field: &'static str,
    pub reason: String,
}

impl PartialFetchError {
    fn missing(field: &'static str, what: &str) -> Self {
        Self {
            field,
            reason: format!("{} not found", what),
        }
    }
}

/// One page-loading session, exclusively owned by one worker at a time
pub struct ScrapeSession {
    id: usize,
    client: Client,
    user_agent: String,
    pages_loaded: u64,
}

impl ScrapeSession {
    pub fn new(id: usize, timeout: Duration, user_agent: &str) -> Result<Self, PageError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            client,
            user_agent: user_agent.to_string(),
            pages_loaded: 0,
        })
    }

    /// Load a page and return its body
    pub async fn load(&mut self, url: &str) -> Result<String, PageError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/html")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Status(status.as_u16()));
        }

        self.pages_loaded += 1;
        tracing::trace!("Session {} loaded {} ({} pages)", self.id, url, self.pages_loaded);
        Ok(response.text().await?)
    }
}

/// Scraped source client for public profile pages
///
/// Every extraction step is independent: a missing element only defaults
/// its own field. Page-level failures default the whole profile. Nothing
/// here returns an error to the caller.
pub struct ProfileScraper {
    web_base_url: String,
    timeout: Duration,
    max_pinned: usize,
    sessions: SessionPool<ScrapeSession>,
}

impl ProfileScraper {
    /// Create a scraper with `pool_size` sessions
    pub fn new(
        github: &GithubSettings,
        settings: &ScraperSettings,
        pool_size: usize,
    ) -> Result<Self, PageError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let sessions = (0..pool_size.max(1))
            .map(|id| ScrapeSession::new(id, timeout, &github.user_agent))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            web_base_url: github.web_base_url.trim_end_matches('/').to_string(),
            timeout,
            max_pinned: settings.max_pinned,
            sessions: SessionPool::new(sessions),
        })
    }

    fn profile_url(&self, login: &str) -> String {
        format!("{}/{}", self.web_base_url, urlencoding::encode(login))
    }

    fn repositories_url(&self, login: &str) -> String {
        format!("{}?tab=repositories", self.profile_url(login))
    }

    /// Load the profile page and extract contribution data
    pub async fn scrape(&self, login: &str) -> ScrapedProfile {
        self.scrape_until(login, Instant::now() + self.timeout).await
    }

    /// Scrape with a hard deadline
    ///
    /// Fields read from the profile page are kept even when the deadline
    /// passes during the repositories-tab fallback.
    pub async fn scrape_until(&self, login: &str, deadline: Instant) -> ScrapedProfile {
        let mut session = match tokio::time::timeout_at(deadline, self.sessions.checkout()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!("No scrape session for {}: {}", login, e);
                return ScrapedProfile::default();
            }
            Err(_) => {
                tracing::warn!("No scrape session for {} before the deadline", login);
                return ScrapedProfile::default();
            }
        };

        let html = match tokio::time::timeout_at(deadline, session.load(&self.profile_url(login))).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                tracing::warn!("Profile page for {} unavailable, using defaults: {}", login, e);
                return ScrapedProfile::default();
            }
            Err(_) => {
                tracing::warn!("Profile page for {} timed out, using defaults", login);
                return ScrapedProfile::default();
            }
        };

        let mut profile = ScrapedProfile::default();

        match extract_pinned_items(&html, self.max_pinned) {
            Ok(items) => profile.pinned_items = items,
            Err(e) => log_partial(login, &e),
        }

        match extract_contribution_streak(&html) {
            Ok(streak) => profile.contribution_streak = streak,
            Err(e) => log_partial(login, &e),
        }

        let contributions = match extract_contribution_count(&html) {
            Ok(count) => Ok(count),
            Err(first) => {
                tracing::debug!("{} on profile page of {}, trying repositories tab", first, login);
                self.count_from_repositories_tab(&mut session, login, deadline).await
            }
        };
        match contributions {
            Ok(count) => profile.contribution_count = count,
            Err(e) => log_partial(login, &e),
        }

        profile
    }

    async fn count_from_repositories_tab(
        &self,
        session: &mut ScrapeSession,
        login: &str,
        deadline: Instant,
    ) -> Result<u64, PartialFetchError> {
        const FIELD: &str = "contribution_count";

        match tokio::time::timeout_at(deadline, session.load(&self.repositories_url(login))).await {
            Ok(Ok(tab)) => extract_contribution_count(&tab),
            Ok(Err(e)) => Err(PartialFetchError {
                field: FIELD,
                reason: e.to_string(),
            }),
            Err(_) => Err(PartialFetchError {
                field: FIELD,
                reason: "repositories tab timed out".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ContributionSource for ProfileScraper {
    async fn fetch_contribution_data(&self, login: &str, deadline: Instant) -> ScrapedProfile {
        self.scrape_until(login, deadline).await
    }
}

fn log_partial(login: &str, err: &PartialFetchError) {
    tracing::warn!(
        field = err.field,
        "Profile field unavailable for {}, using default: {}",
        login,
        err.reason
    );
}

/// Contribution count from the yearly contributions heading
pub fn extract_contribution_count(html: &str) -> Result<u64, PartialFetchError> {
    const FIELD: &str = "contribution_count";

    let from = find_tag_with_classes(html, "div", CONTRIBUTIONS_BLOCK, 0)
        .map(|(start, _)| start)
        .unwrap_or(0);
    let text = element_text(html, "h2", CONTRIBUTIONS_HEADING, from)
        .ok_or_else(|| PartialFetchError::missing(FIELD, "contributions heading"))?;

    parse_count(&text).ok_or_else(|| PartialFetchError {
        field: FIELD,
        reason: format!("no number in {:?}", text),
    })
}

/// Pinned item labels in page order, at most `max`
pub fn extract_pinned_items(html: &str, max: usize) -> Result<Vec<String>, PartialFetchError> {
    const FIELD: &str = "pinned_items";

    let mut containers = Vec::new();
    let mut pos = 0;
    while let Some((start, open_end)) = find_tag_with_classes(html, "div", PINNED_ITEM, pos) {
        containers.push((start, open_end));
        pos = open_end;
    }
    if containers.is_empty() {
        return Err(PartialFetchError::missing(FIELD, "pinned items section"));
    }

    let mut items = Vec::new();
    for (i, &(_, open_end)) in containers.iter().enumerate() {
        if items.len() >= max {
            break;
        }
        let bound = containers.get(i + 1).map(|&(next, _)| next).unwrap_or(html.len());
        let scope = &html[..bound];
        if let Some((_, label_end)) = find_tag_with_classes(scope, "span", PINNED_LABEL, open_end) {
            if let Some(label) = text_until_close(scope, "span", label_end).filter(|l| !l.is_empty()) {
                items.push(label);
            }
        }
    }

    Ok(items)
}

/// Summary text of the yearly contributions block
pub fn extract_contribution_streak(html: &str) -> Result<String, PartialFetchError> {
    const FIELD: &str = "contribution_streak";

    let (_, open_end) = find_tag_with_classes(html, "div", CONTRIBUTIONS_BLOCK, 0)
        .ok_or_else(|| PartialFetchError::missing(FIELD, "yearly contributions block"))?;
    let block_end = matching_close(html, "div", open_end).unwrap_or(html.len());
    let text = element_text(&html[..block_end], "h2", &[], open_end)
        .filter(|t| !t.is_empty() && t.as_str() != STREAK_UNAVAILABLE)
        .ok_or_else(|| PartialFetchError::missing(FIELD, "contributions summary"))?;
    Ok(text)
}

/// First run of digits after removing thousands separators
pub fn parse_count(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let digits: String = cleaned
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_PAGE: &str = r#"
<html><body>
<div class="js-pinned-items-reorder-container">
  <div class="pinned-item-list-item-content">
    <a href="/octo/alpha"><span class="repo" title="alpha">alpha</span></a>
    <p class="pinned-item-desc">First</p>
  </div>
  <div class="pinned-item-list-item-content">
    <div class="d-flex"><span class="owner">octo</span></div>
    <a href="/octo/beta"><span class="text-bold repo">beta</span></a>
  </div>
  <div class="pinned-item-list-item-content">
    <a href="/octo/gamma"><span class="repo">gamma</span></a>
  </div>
</div>
<div class="js-yearly-contributions">
  <div class="position-relative">
    <h2 class="f4 text-normal mb-2">
      1,234 contributions
        in the last year
    </h2>
  </div>
</div>
</body></html>
"#;

    #[test]
    fn test_extract_contribution_count() {
        assert_eq!(extract_contribution_count(PROFILE_PAGE).unwrap(), 1234);
    }

    #[test]
    fn test_extract_pinned_items_in_order() {
        let items = extract_pinned_items(PROFILE_PAGE, 6).unwrap();
        assert_eq!(items, vec!["alpha", "beta", "gamma"]);

        let bounded = extract_pinned_items(PROFILE_PAGE, 2).unwrap();
        assert_eq!(bounded, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_extract_streak() {
        assert_eq!(
            extract_contribution_streak(PROFILE_PAGE).unwrap(),
            "1,234 contributions in the last year"
        );
    }

    #[test]
    fn test_missing_elements_are_field_errors() {
        let page = "<html><body><h1>Not much here</h1></body></html>";

        let count = extract_contribution_count(page).unwrap_err();
        assert_eq!(count.field, "contribution_count");
        assert_eq!(extract_pinned_items(page, 6).unwrap_err().field, "pinned_items");
        assert_eq!(extract_contribution_streak(page).unwrap_err().field, "contribution_streak");
    }

    #[test]
    fn test_fields_are_independent() {
        let page = r#"<div class="pinned-item-list-item-content"><span class="repo">solo</span></div>"#;
        assert_eq!(extract_pinned_items(page, 6).unwrap(), vec!["solo"]);
        assert!(extract_contribution_count(page).is_err());
        assert!(extract_contribution_streak(page).is_err());
    }

    #[test]
    fn test_streak_stays_inside_contributions_block() {
        let page = r#"<div class="js-yearly-contributions"><div class="graph"></div></div>
<div class="footer"><h2>Sponsors</h2></div>"#;
        assert_eq!(extract_contribution_streak(page).unwrap_err().field, "contribution_streak");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,234 contributions in the last year"), Some(1234));
        assert_eq!(parse_count("No contributions 2024"), Some(2024));
        assert_eq!(parse_count("12,345,678"), Some(12_345_678));
        assert_eq!(parse_count("none"), None);
    }
}
