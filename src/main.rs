mod api;
mod auth;
mod autotrader;
mod config;
mod engine;
mod error;
mod marketplace;
mod pacer;
mod pipeline;
mod session;

use std::sync::Arc;

use axum::{routing::get, Router};
use dotenv::dotenv;
use tokio::sync::Mutex;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::AppState;
use crate::config::Config;
use crate::session::SessionManager;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::service_info,
        api::health_check,
        api::scrape_autotrader,
        api::scrape_marketplace
    ),
    components(
        schemas(
            api::ServiceInfo,
            api::HealthResponse,
            api::ErrorBody,
            crate::autotrader::AutotraderScrape,
            crate::autotrader::ListingRecord,
            crate::marketplace::MarketplaceScrape,
            crate::marketplace::MarketplaceLink
        )
    ),
    tags(
        (name = "service", description = "Service metadata and health"),
        (name = "scraper", description = "Browser-driven listing extraction")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    println!(
        "🚗 Scraping API starting: {} scrapes/browser, {}-{}s delay, {}s cooldown, {} cities",
        config.max_scrapes_per_browser,
        config.min_delay.as_secs(),
        config.max_delay.as_secs(),
        config.cooldown_on_block.as_secs(),
        config.cities.len()
    );

    let port = config.port;
    let state = Arc::new(AppState {
        session: Mutex::new(SessionManager::new(&config)),
        config,
    });

    // Pre-warm the browser so the first request doesn't pay the launch
    // cost; a failure here is retried lazily on the first scrape.
    if let Err(e) = state.session.lock().await.start() {
        eprintln!("⚠️ Browser pre-warm failed ({e}), will retry on first scrape");
    }

    let app = Router::new()
        .merge(SwaggerUi::new("/scraper-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::service_info))
        .route("/health", get(api::health_check))
        .route("/scrape_new_autotrader_listings", get(api::scrape_autotrader))
        .route("/scrape-marketplace", get(api::scrape_marketplace))
        .with_state(state.clone());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown hook: close the browser best-effort before exiting.
    state.session.lock().await.shutdown();
    println!("🛑 Browser closed, bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("🔥 Failed to install shutdown handler: {e}");
    }
}
