use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::{
    events::RequestPausedEvent, FailRequest, RequestPattern, RequestStage,
};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, Tab};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::ScrapeError;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(120);
const SOURCE_LABEL: &str = "AutoTrader";

/// The page's framework injects its full render state as JSON into a
/// well-known element; reading it beats scraping the rendered DOM. A
/// missing element means we got a throttle or interstitial page instead.
const STATE_BLOB_JS: &str = r#"
(() => {
    const el = document.getElementById('__NEXT_DATA__');
    return el ? el.textContent : null;
})()
"#;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/122.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    ]
});

/// Asset extensions worth aborting even when the resource type is vague.
const BLOCKED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".webp", ".svg", ".gif", ".woff", ".woff2", ".ttf",
];

// ============================================================================
// Normalized output
// ============================================================================

/// One vehicle listing, projected defensively: a field missing upstream
/// becomes None/empty here, it never fails the batch.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct ListingRecord {
    pub title: String,
    pub price: Option<String>,
    pub city: Option<String>,
    pub mileage_km: Option<i64>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub description: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct AutotraderScrape {
    pub success: bool,
    pub total_results: u64,
    pub scraped_count: usize,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub cars: Vec<ListingRecord>,
}

// ============================================================================
// Extraction
// ============================================================================

/// One AutoTrader extraction cycle inside a fresh isolated context. The
/// tab is closed on every path; pacing bookkeeping is the caller's job.
pub fn extract(browser: &Browser, config: &Config) -> Result<AutotraderScrape, ScrapeError> {
    let context = browser.new_context()?;
    let tab = context.new_tab()?;
    let outcome = drive(&tab, config);
    if let Err(e) = tab.close(true) {
        debug!("autotrader tab close failed: {e}");
    }
    outcome
}

fn drive(tab: &Arc<Tab>, config: &Config) -> Result<AutotraderScrape, ScrapeError> {
    tab.set_user_agent(pick_user_agent(), Some("en-CA,en;q=0.9"), None)?;
    block_heavy_assets(tab)?;
    tab.set_default_timeout(NAVIGATION_TIMEOUT);

    tab.navigate_to(&config.autotrader_url)?;
    tab.wait_until_navigated()
        .map_err(|e| ScrapeError::NavigationTimeout {
            url: config.autotrader_url.clone(),
            reason: e.to_string(),
        })?;

    let evaluated = tab.evaluate(STATE_BLOB_JS, false)?;
    let data = decode_state_blob(evaluated.value)?;
    let (total_results, cars) = listings_from_blob(&data);
    info!(
        "scraped {} of {} AutoTrader listings",
        cars.len(),
        total_results
    );

    Ok(AutotraderScrape {
        success: true,
        total_results,
        scraped_count: cars.len(),
        source: SOURCE_LABEL.to_string(),
        scraped_at: Utc::now(),
        cars,
    })
}

fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Abort requests for heavy binary assets while letting scripts, styles
/// and documents through; client-side rendering keeps working and the
/// page loads much lighter.
fn block_heavy_assets(tab: &Arc<Tab>) -> Result<(), ScrapeError> {
    let patterns = vec![RequestPattern {
        url_pattern: Some("*".to_string()),
        resource_Type: None,
        request_stage: Some(RequestStage::Request),
    }];
    tab.enable_fetch(Some(&patterns), None)?;

    let interceptor: Arc<dyn RequestInterceptor + Send + Sync> = Arc::new(
        |_transport: Arc<Transport>, _session_id: SessionId, event: RequestPausedEvent| {
            let params = event.params;
            if is_heavy_asset(&params.resource_Type, &params.request.url) {
                RequestPausedDecision::Fail(FailRequest {
                    request_id: params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            } else {
                RequestPausedDecision::Continue(None)
            }
        },
    );
    tab.enable_request_interception(interceptor)?;
    Ok(())
}

pub(crate) fn is_heavy_asset(resource_type: &ResourceType, url: &str) -> bool {
    if matches!(
        resource_type,
        ResourceType::Image | ResourceType::Font | ResourceType::Media
    ) {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    BLOCKED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

// ============================================================================
// State blob projection
// ============================================================================

pub(crate) fn decode_state_blob(value: Option<Value>) -> Result<Value, ScrapeError> {
    let raw = match value {
        Some(Value::String(raw)) => raw,
        _ => return Err(ScrapeError::MissingStateBlob),
    };
    serde_json::from_str(&raw).map_err(|_| ScrapeError::MissingStateBlob)
}

pub(crate) fn listings_from_blob(data: &Value) -> (u64, Vec<ListingRecord>) {
    let page_props = data.pointer("/props/pageProps");
    let total_results = page_props
        .and_then(|p| p.get("numberOfResults"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let cars = page_props
        .and_then(|p| p.get("listings"))
        .and_then(Value::as_array)
        .map(|listings| listings.iter().map(project_listing).collect())
        .unwrap_or_default();
    (total_results, cars)
}

fn project_listing(car: &Value) -> ListingRecord {
    let year = scalar_string(car.pointer("/vehicle/modelYear"));
    let make = scalar_string(car.pointer("/vehicle/make"));
    let model = scalar_string(car.pointer("/vehicle/model"));
    let title = [year.as_deref(), make.as_deref(), model.as_deref()]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    ListingRecord {
        title,
        price: scalar_string(car.pointer("/price/priceFormatted")),
        city: scalar_string(car.pointer("/location/city")),
        mileage_km: car.pointer("/vehicle/mileageInKm").and_then(Value::as_i64),
        image: scalar_string(car.pointer("/images/0")),
        url: scalar_string(car.get("url")),
        description: truncate_description(
            car.get("description").and_then(Value::as_str).unwrap_or(""),
        ),
        make,
        model,
        year,
    }
}

/// Strings or numbers become strings; anything else is absent.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Listing descriptions embed HTML fragments after the first line-break
/// marker; keep only the leading plain-text run.
pub(crate) fn truncate_description(raw: &str) -> String {
    raw.split("<br").next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob(listings: Value, total: u64) -> Value {
        json!({
            "props": {
                "pageProps": {
                    "listings": listings,
                    "numberOfResults": total
                }
            }
        })
    }

    #[test]
    fn truncates_description_at_line_break_marker() {
        assert_eq!(truncate_description("Great car<br/>more text"), "Great car");
        assert_eq!(truncate_description("Great car<br>more"), "Great car");
        assert_eq!(truncate_description("no markup at all"), "no markup at all");
        assert_eq!(truncate_description(""), "");
    }

    #[test]
    fn well_formed_blob_yields_one_record_per_listing() {
        let data = blob(
            json!([
                {
                    "vehicle": {"modelYear": 2019, "make": "Honda", "model": "Civic", "mileageInKm": 93000},
                    "price": {"priceFormatted": "$18,995"},
                    "location": {"city": "Sudbury"},
                    "images": ["https://img.example/1.jpg", "https://img.example/2.jpg"],
                    "url": "/a/honda/civic/123",
                    "description": "Clean title<br/>Extra markup"
                },
                {
                    "vehicle": {"modelYear": "2021", "make": "Ford", "model": "F-150"},
                    "price": {"priceFormatted": "$41,500"},
                    "location": {"city": "Barrie"},
                    "images": [],
                    "url": "/a/ford/f150/456",
                    "description": "One owner"
                },
                {
                    "vehicle": {"make": "Toyota"},
                    "description": null
                }
            ]),
            412,
        );

        let (total, cars) = listings_from_blob(&data);
        assert_eq!(total, 412);
        assert_eq!(cars.len(), 3);

        let civic = &cars[0];
        assert_eq!(civic.title, "2019 Honda Civic");
        assert_eq!(civic.price.as_deref(), Some("$18,995"));
        assert_eq!(civic.city.as_deref(), Some("Sudbury"));
        assert_eq!(civic.mileage_km, Some(93000));
        assert_eq!(civic.image.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(civic.description, "Clean title");
        assert_eq!(civic.year.as_deref(), Some("2019"));

        // string model years work too
        assert_eq!(cars[1].year.as_deref(), Some("2021"));
        assert_eq!(cars[1].image, None);
    }

    #[test]
    fn missing_nested_fields_become_defaults() {
        let data = blob(json!([{}]), 1);
        let (_, cars) = listings_from_blob(&data);
        assert_eq!(cars.len(), 1);
        let car = &cars[0];
        assert_eq!(car.title, "");
        assert_eq!(car.price, None);
        assert_eq!(car.city, None);
        assert_eq!(car.mileage_km, None);
        assert_eq!(car.image, None);
        assert_eq!(car.url, None);
        assert_eq!(car.description, "");
        assert_eq!(car.make, None);
    }

    #[test]
    fn blob_without_listings_array_yields_empty_set() {
        let data = json!({"props": {"pageProps": {"numberOfResults": 7}}});
        let (total, cars) = listings_from_blob(&data);
        assert_eq!(total, 7);
        assert!(cars.is_empty());
    }

    #[test]
    fn absent_state_blob_is_a_hard_failure() {
        assert!(matches!(
            decode_state_blob(None),
            Err(ScrapeError::MissingStateBlob)
        ));
        assert!(matches!(
            decode_state_blob(Some(Value::Null)),
            Err(ScrapeError::MissingStateBlob)
        ));
        assert!(matches!(
            decode_state_blob(Some(Value::String("not json".to_string()))),
            Err(ScrapeError::MissingStateBlob)
        ));
    }

    #[test]
    fn valid_blob_text_decodes() {
        let decoded =
            decode_state_blob(Some(Value::String(r#"{"props":{}}"#.to_string()))).unwrap();
        assert!(decoded.get("props").is_some());
    }

    #[test]
    fn heavy_assets_are_filtered_scripts_pass() {
        assert!(is_heavy_asset(
            &ResourceType::Image,
            "https://cdn.example/photo"
        ));
        assert!(is_heavy_asset(&ResourceType::Font, "https://cdn.example/f"));
        assert!(is_heavy_asset(
            &ResourceType::Other,
            "https://cdn.example/sprite.PNG?v=3"
        ));
        assert!(is_heavy_asset(
            &ResourceType::Other,
            "https://cdn.example/face.woff2#frag"
        ));
        assert!(!is_heavy_asset(
            &ResourceType::Script,
            "https://cdn.example/app.js"
        ));
        assert!(!is_heavy_asset(
            &ResourceType::Document,
            "https://www.autotrader.ca/lst"
        ));
        assert!(!is_heavy_asset(
            &ResourceType::Stylesheet,
            "https://cdn.example/site.css"
        ));
    }
}
