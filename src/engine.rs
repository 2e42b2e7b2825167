use std::ffi::OsStr;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use tracing::{info, warn};

use crate::error::ScrapeError;

/// Transport idle limit; must outlive the cooldown and the gaps between
/// paced requests or the driver declares the browser dead in between.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(86_400);

/// Owns the single long-lived headless browser process. Lazily launched,
/// recycled by the session manager, closed best-effort on shutdown.
pub struct EngineHandle {
    browser: Option<Browser>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self { browser: None }
    }

    /// Launch the browser if no live handle exists; no-op otherwise.
    pub fn ensure_started(&mut self) -> Result<&Browser, ScrapeError> {
        if self.browser.is_none() {
            let browser = Browser::new(launch_options())
                .map_err(|e| ScrapeError::EngineLaunch(e.to_string()))?;
            self.browser = Some(browser);
            println!("✅ Browser started");
        }
        match self.browser.as_ref() {
            Some(browser) => Ok(browser),
            None => Err(ScrapeError::EngineLaunch(
                "browser handle unset after launch".to_string(),
            )),
        }
    }

    pub fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    /// Close the live handle if present. Dropping the handle kills the
    /// underlying driver process; close failures cannot stop forward
    /// progress, the next ensure_started launches fresh.
    pub fn shut_down(&mut self) {
        if let Some(browser) = self.browser.take() {
            drop(browser);
            info!("browser engine closed");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("engine handle dropped while browser still live, closing");
            self.shut_down();
        }
    }
}

fn launch_options() -> LaunchOptions<'static> {
    LaunchOptions {
        headless: true,
        sandbox: false,
        window_size: Some((1400, 900)),
        args: stealth_args(),
        idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
        ..Default::default()
    }
}

/// Launch arguments that trim the obvious automation fingerprints.
pub(crate) fn stealth_args() -> Vec<&'static OsStr> {
    vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--disable-infobars"),
        OsStr::new("--window-position=0,0"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stealth_args_disable_automation_fingerprint() {
        let args = stealth_args();
        assert!(args.contains(&OsStr::new("--disable-blink-features=AutomationControlled")));
        assert!(args.contains(&OsStr::new("--disable-dev-shm-usage")));
    }

    #[test]
    fn fresh_handle_is_not_running() {
        let mut engine = EngineHandle::new();
        assert!(!engine.is_running());
        // shut_down on an unset handle is a no-op
        engine.shut_down();
        assert!(!engine.is_running());
    }
}
