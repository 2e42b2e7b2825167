use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::autotrader::AutotraderScrape;
use crate::config::Config;
use crate::marketplace::MarketplaceScrape;
use crate::pipeline;
use crate::session::SessionManager;

pub struct AppState {
    pub config: Config,
    pub session: Mutex<SessionManager>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

/// Extraction failures surface as a single 503 with a detail string;
/// the defensive browser recycle has already happened downstream.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn service_unavailable(detail: String) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses((status = 200, description = "Service metadata", body = ServiceInfo))
)]
pub async fn service_info() -> Json<ServiceInfo> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert("/health".to_string(), "GET - Service health".to_string());
    endpoints.insert(
        "/scrape_new_autotrader_listings".to_string(),
        "GET - Scrape new AutoTrader listings".to_string(),
    );
    endpoints.insert(
        "/scrape-marketplace".to_string(),
        "GET - Collect marketplace item links per city".to_string(),
    );
    Json(ServiceInfo {
        message: "Scraping API".to_string(),
        endpoints,
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses((status = 200, description = "Liveness probe", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "autotrader_scraper".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/scrape_new_autotrader_listings",
    tag = "scraper",
    responses(
        (status = 200, description = "One AutoTrader extraction cycle", body = AutotraderScrape),
        (status = 503, description = "Scrape failed; browser was recycled", body = ErrorBody)
    )
)]
pub async fn scrape_autotrader(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AutotraderScrape>, ApiError> {
    let mut session = state.session.lock().await;
    pipeline::scrape_autotrader(&mut session, &state.config)
        .await
        .map(Json)
        .map_err(|e| ApiError::service_unavailable(format!("Autotrader scrape failed: {e}")))
}

#[utoipa::path(
    get,
    path = "/scrape-marketplace",
    tag = "scraper",
    responses(
        (status = 200, description = "Marketplace links for the configured city list", body = MarketplaceScrape),
        (status = 503, description = "Scrape failed; browser was recycled", body = ErrorBody)
    )
)]
pub async fn scrape_marketplace(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MarketplaceScrape>, ApiError> {
    let mut session = state.session.lock().await;
    pipeline::scrape_marketplace(&mut session, &state.config)
        .await
        .map(Json)
        .map_err(|e| ApiError::service_unavailable(format!("Marketplace scrape failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_is_pure_and_repeatable() {
        let first = health_check().await.0;
        let second = health_check().await.0;
        assert_eq!(first.status, "healthy");
        assert_eq!(first.service, "autotrader_scraper");
        assert_eq!(second.status, first.status);
        assert_eq!(second.service, first.service);
    }

    #[tokio::test]
    async fn service_info_lists_every_scrape_endpoint() {
        let info = service_info().await.0;
        assert_eq!(info.message, "Scraping API");
        assert!(info.endpoints.contains_key("/health"));
        assert!(info.endpoints.contains_key("/scrape_new_autotrader_listings"));
        assert!(info.endpoints.contains_key("/scrape-marketplace"));
    }
}
