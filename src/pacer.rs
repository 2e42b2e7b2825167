use std::time::Duration;

use rand::Rng;

use crate::config::Config;

/// What the pacer wants done after an extraction operation: how long to
/// rest, and whether the browser has to be recycled first.
#[derive(Debug, Clone, PartialEq)]
pub struct PacerDirective {
    pub delay: Duration,
    pub restart: bool,
    pub cooldown: Option<Duration>,
}

/// Tracks operations performed against the current browser process and
/// decides when to recycle it. Counting and thresholds live here; the
/// session manager executes the sleeps and the actual restart, so the
/// decision step stays deterministic enough to test.
pub struct SessionPacer {
    scrape_count: u32,
    max_scrapes: u32,
    min_delay: Duration,
    max_delay: Duration,
    cooldown: Duration,
}

impl SessionPacer {
    pub fn new(config: &Config) -> Self {
        Self {
            scrape_count: 0,
            max_scrapes: config.max_scrapes_per_browser,
            min_delay: config.min_delay,
            max_delay: config.max_delay,
            cooldown: config.cooldown_on_block,
        }
    }

    /// Record one finished operation. Every operation earns a jittered
    /// delay; hitting the per-browser limit earns a recycle + cooldown.
    /// A failure is treated as a possible block and forces the recycle
    /// immediately, whatever the counter says.
    pub fn record(&mut self, success: bool) -> PacerDirective {
        if success {
            self.scrape_count += 1;
        }
        let at_limit = self.scrape_count >= self.max_scrapes;
        let restart = at_limit || !success;
        PacerDirective {
            delay: self.jitter_delay(),
            restart,
            cooldown: restart.then_some(self.cooldown),
        }
    }

    /// Uniform sample from [min_delay, max_delay], the human-ish pause
    /// between consecutive scrapes.
    pub(crate) fn jitter_delay(&self) -> Duration {
        let secs = rand::thread_rng()
            .gen_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    pub fn reset(&mut self) {
        self.scrape_count = 0;
    }

    pub fn scrape_count(&self) -> u32 {
        self.scrape_count
    }
}
