use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::engine::EngineHandle;
use crate::error::ScrapeError;
use crate::pacer::SessionPacer;

/// Single owner of the browser handle and the pacing state. Lives in the
/// shared app state behind a mutex, so extractions are serviced one at a
/// time and never race on a restart.
pub struct SessionManager {
    pub engine: EngineHandle,
    pacer: SessionPacer,
}

impl SessionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            engine: EngineHandle::new(),
            pacer: SessionPacer::new(config),
        }
    }

    /// Eagerly launch the browser (normally it starts lazily on the
    /// first scrape).
    pub fn start(&mut self) -> Result<(), ScrapeError> {
        self.engine.ensure_started()?;
        Ok(())
    }

    /// Recycle the browser process and zero the operation counter. A
    /// relaunch failure is only logged; the next operation will try
    /// again from scratch.
    pub fn restart(&mut self) {
        self.engine.shut_down();
        self.pacer.reset();
        if let Err(e) = self.engine.ensure_started() {
            warn!("browser relaunch during restart failed: {e}");
        }
        println!("🔄 Browser restarted");
    }

    /// Pacing bookkeeping after every extraction, on success and failure
    /// alike: jittered rest, and a recycle + cooldown when the scrape
    /// limit is reached or the operation looked blocked.
    pub async fn complete_operation(&mut self, success: bool) {
        let directive = self.pacer.record(success);
        debug!(
            "pacer: count={} delay={:?} restart={}",
            self.pacer.scrape_count(),
            directive.delay,
            directive.restart
        );
        sleep(directive.delay).await;

        if directive.restart {
            println!("⚠️ Scrape limit reached or block suspected, cooling down…");
            self.restart();
            if let Some(cooldown) = directive.cooldown {
                sleep(cooldown).await;
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.engine.shut_down();
    }
}
