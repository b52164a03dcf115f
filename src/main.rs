use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use sphynx::config::Settings;
use sphynx::core::{ProfileSource, SearchOptions, SearchService};
use sphynx::models::ScoringWeights;
use sphynx::routes::{self, search::AppState};
use sphynx::services::{CachedProfileSource, GithubClient, ProfileCache, ProfileScraper, SearchHistory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(level: &str, format: &str) {
    // LOG_LEVEL / LOG_FORMAT win over the config file
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| level.to_string());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| format.to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging("info", "json");
            return Err(startup_error("Configuration error", e));
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);
    info!("Starting Sphynx candidate search service...");

    let github = GithubClient::new(&settings.github)
        .map_err(|e| startup_error("Failed to create GitHub client", e))?;

    match github.verify_token().await {
        Ok(user) => info!("Authenticated with GitHub as {}", user.login),
        Err(e) => return Err(startup_error("GitHub token verification failed", e)),
    }

    let github: Arc<dyn ProfileSource> = Arc::new(github);
    let profiles: Arc<dyn ProfileSource> = if settings.cache.capacity > 0 {
        let cache = Arc::new(ProfileCache::new(settings.cache.capacity, settings.cache.ttl_secs));
        info!(
            "Profile cache enabled ({} entries, TTL: {}s)",
            settings.cache.capacity, settings.cache.ttl_secs
        );
        Arc::new(CachedProfileSource::new(github, cache))
    } else {
        info!("Profile cache disabled");
        github
    };

    let concurrency = settings.search.concurrency.max(1);
    let scraper = ProfileScraper::new(&settings.github, &settings.scraper, concurrency)
        .map_err(|e| startup_error("Failed to create profile scraper", e))?;

    info!("Profile scraper initialized with {} sessions", concurrency);

    let weights = ScoringWeights::from(&settings.scoring.weights);
    info!("Scoring weights: {:?}", weights);

    let options = SearchOptions {
        default_limit: settings.search.default_limit,
        max_limit: settings.search.max_limit,
        concurrency,
        scrape_timeout: Duration::from_secs(settings.scraper.timeout_secs),
        run_timeout: settings.search.run_timeout_secs.map(Duration::from_secs),
    };

    let app_state = AppState {
        search: Arc::new(SearchService::new(profiles, Arc::new(scraper), weights, options)),
        history: Arc::new(SearchHistory::new(&settings.history.path)),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
