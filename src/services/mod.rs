// Service exports
pub mod cache;
pub mod github;
pub mod history;
pub mod html;
pub mod pool;
pub mod scraper;

pub use cache::{CacheKey, CachedProfileSource, ProfileCache};
pub use github::{AuthenticatedUser, GithubClient, GithubError, RetryPolicy};
pub use history::{HistoryError, SearchHistory};
pub use pool::{PoolError, PooledSession, SessionPool};
pub use scraper::{PageError, PartialFetchError, ProfileScraper, ScrapeSession};
