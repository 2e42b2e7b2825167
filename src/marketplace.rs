use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use headless_chrome::browser::context::Context;
use headless_chrome::{Browser, Tab};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::ScrapeError;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Client-side rendering needs a moment after load before the listing
/// anchors exist in the DOM.
const RENDER_SETTLE: Duration = Duration::from_secs(4);
pub(crate) const MAX_LINKS_PER_CITY: usize = 25;

const ITEM_LINKS_JS: &str = r#"
(() => {
    const anchors = Array.from(document.querySelectorAll("a[href*='/marketplace/item']"));
    return JSON.stringify(anchors.map(a => a.getAttribute('href')).filter(h => h));
})()
"#;

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct MarketplaceLink {
    pub city: String,
    pub link: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct MarketplaceScrape {
    pub status: String,
    pub cities: usize,
    pub total_items: usize,
    pub time_seconds: f64,
    pub data: Vec<MarketplaceLink>,
}

/// Collect item links for every configured city inside one isolated,
/// pre-authenticated context on the shared engine. A synchronous,
/// self-contained unit of work: cities are visited sequentially, all
/// pages are closed on every path, pacing bookkeeping is the caller's
/// job.
pub fn extract(browser: &Browser, config: &Config) -> Result<MarketplaceScrape, ScrapeError> {
    let started = Instant::now();
    let context = browser.new_context()?;
    let mut pages: Vec<(String, Arc<Tab>)> = Vec::new();

    let outcome = visit_cities(&context, config, &mut pages);
    for (_, tab) in &pages {
        if let Err(e) = tab.close(true) {
            debug!("marketplace tab close failed: {e}");
        }
    }
    let data = outcome?;

    info!(
        "collected {} marketplace links across {} cities",
        data.len(),
        config.cities.len()
    );
    Ok(MarketplaceScrape {
        status: "ok".to_string(),
        cities: config.cities.len(),
        total_items: data.len(),
        time_seconds: round2(started.elapsed().as_secs_f64()),
        data,
    })
}

fn visit_cities(
    context: &Context<'_>,
    config: &Config,
    pages: &mut Vec<(String, Arc<Tab>)>,
) -> Result<Vec<MarketplaceLink>, ScrapeError> {
    if config.auth_state.is_empty() {
        warn!("auth snapshot is empty, marketplace pages will load unauthenticated");
    }

    // Open one page per city up front so they render in parallel while
    // we walk them sequentially afterwards.
    let mut authed = false;
    for city in &config.cities {
        let tab = context.new_tab()?;
        pages.push((city.clone(), tab.clone()));

        // Cookies are context-wide; restoring them once is enough.
        if !authed && !config.auth_state.is_empty() {
            tab.set_cookies(config.auth_state.cookies.clone())?;
            authed = true;
        }

        tab.set_default_timeout(NAVIGATION_TIMEOUT);
        let url = city_url(city);
        let navigated = tab
            .navigate_to(&url)
            .and_then(|t| t.wait_until_navigated())
            .map(|_| ());
        if let Err(e) = navigated {
            let err = ScrapeError::NavigationTimeout {
                url,
                reason: e.to_string(),
            };
            if config.marketplace_abort_on_city_failure {
                return Err(err);
            }
            warn!("skipping {city}: {err}");
        }
    }

    let mut links = Vec::new();
    for (city, tab) in pages.iter() {
        thread::sleep(RENDER_SETTLE);
        match harvest_links(tab) {
            Ok(hrefs) => links.extend(capped_city_links(city, hrefs)),
            Err(e) if !config.marketplace_abort_on_city_failure => {
                warn!("link harvest failed for {city}: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(links)
}

fn harvest_links(tab: &Arc<Tab>) -> Result<Vec<String>, ScrapeError> {
    let evaluated = tab.evaluate(ITEM_LINKS_JS, false)?;
    let raw = match evaluated.value {
        Some(serde_json::Value::String(raw)) => raw,
        _ => {
            return Err(ScrapeError::ElementLookup(
                "marketplace item anchors not readable".to_string(),
            ))
        }
    };
    serde_json::from_str(&raw).map_err(|e| {
        ScrapeError::ElementLookup(format!("marketplace anchor payload malformed: {e}"))
    })
}

pub(crate) fn capped_city_links(city: &str, hrefs: Vec<String>) -> Vec<MarketplaceLink> {
    hrefs
        .into_iter()
        .take(MAX_LINKS_PER_CITY)
        .map(|link| MarketplaceLink {
            city: city.to_string(),
            link,
        })
        .collect()
}

pub(crate) fn city_url(city: &str) -> String {
    format!("https://www.facebook.com/marketplace/{city}")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
