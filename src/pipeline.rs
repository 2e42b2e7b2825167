use crate::autotrader::{self, AutotraderScrape};
use crate::config::Config;
use crate::error::ScrapeError;
use crate::marketplace::{self, MarketplaceScrape};
use crate::session::SessionManager;

/// One listing-site cycle: engine up, adapter run in its own context,
/// then pacing bookkeeping on success and failure alike. A failed
/// launch short-circuits; no operation ran, so the pacer stays put.
pub async fn scrape_autotrader(
    session: &mut SessionManager,
    config: &Config,
) -> Result<AutotraderScrape, ScrapeError> {
    let outcome = {
        let browser = session.engine.ensure_started()?;
        autotrader::extract(browser, config)
    };
    session.complete_operation(outcome.is_ok()).await;
    outcome
}

/// One marketplace cycle against the same pooled engine, isolated in its
/// own pre-authenticated context.
pub async fn scrape_marketplace(
    session: &mut SessionManager,
    config: &Config,
) -> Result<MarketplaceScrape, ScrapeError> {
    let outcome = {
        let browser = session.engine.ensure_started()?;
        marketplace::extract(browser, config)
    };
    session.complete_operation(outcome.is_ok()).await;
    outcome
}
