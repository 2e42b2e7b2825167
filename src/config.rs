use std::env;
use std::time::Duration;

use crate::auth::AuthSnapshot;

/// Search page for recent private-seller listings around Spanish, ON.
const DEFAULT_AUTOTRADER_URL: &str = "https://www.autotrader.ca/lst\
?atype=C&custtype=P&cy=CA&damaged_listing=exclude\
&desc=1&lat=46.20007&lon=-82.34984\
&offer=U&size=40&sort=age&ustate=N,U\
&zip=Spanish,%20ON&zipr=1000";

const DEFAULT_CITIES: &[&str] = &[
    "London",
    "Toronto",
    "Barrie",
    "Sudbury",
    "Sault Ste. Marie",
    "Timmins",
    "Windsor",
];

/// Static runtime configuration, read once at startup from the
/// environment (with `.env` support) and passed around by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lower bound of the human-like delay imposed after every scrape.
    pub min_delay: Duration,
    /// Upper bound of the human-like delay.
    pub max_delay: Duration,
    /// Operations allowed against one browser process before recycling it.
    pub max_scrapes_per_browser: u32,
    /// Rest period after a recycle or a suspected block.
    pub cooldown_on_block: Duration,
    pub autotrader_url: String,
    pub cities: Vec<String>,
    pub auth_state: AuthSnapshot,
    /// true = any city page failure aborts the whole marketplace batch;
    /// false = log, skip the city, keep partial results.
    pub marketplace_abort_on_city_failure: bool,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let min_secs = env_u64("MIN_DELAY", 5);
        let mut max_secs = env_u64("MAX_DELAY", 10);
        if max_secs < min_secs {
            eprintln!(
                "⚠️ MAX_DELAY ({max_secs}s) below MIN_DELAY ({min_secs}s), clamping"
            );
            max_secs = min_secs;
        }

        let auth_state = match env::var("AUTH_STATE_PATH") {
            Ok(path) => match AuthSnapshot::load(&path) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    eprintln!("⚠️ Failed to load auth state from {path}: {e}");
                    AuthSnapshot::default()
                }
            },
            Err(_) => AuthSnapshot::default(),
        };

        Self {
            min_delay: Duration::from_secs(min_secs),
            max_delay: Duration::from_secs(max_secs),
            max_scrapes_per_browser: env_u64("MAX_SCRAPES_PER_BROWSER", 6) as u32,
            cooldown_on_block: Duration::from_secs(env_u64("COOLDOWN_ON_BLOCK", 45)),
            autotrader_url: env::var("AUTOTRADER_URL")
                .unwrap_or_else(|_| DEFAULT_AUTOTRADER_URL.to_string()),
            cities: env::var("MARKETPLACE_CITIES")
                .map(|raw| parse_city_list(&raw))
                .unwrap_or_else(|_| default_cities()),
            auth_state,
            marketplace_abort_on_city_failure: env::var("MARKETPLACE_ABORT_ON_CITY_FAILURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_cities() -> Vec<String> {
    DEFAULT_CITIES.iter().map(|c| c.to_string()).collect()
}

fn parse_city_list(raw: &str) -> Vec<String> {
    let cities: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if cities.is_empty() {
        default_cities()
    } else {
        cities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_list_is_trimmed_and_filtered() {
        let cities = parse_city_list("London, Toronto ,, Barrie ");
        assert_eq!(cities, vec!["London", "Toronto", "Barrie"]);
    }

    #[test]
    fn empty_city_list_falls_back_to_defaults() {
        assert_eq!(parse_city_list(" , ,"), default_cities());
        assert_eq!(default_cities().len(), 7);
    }

    #[test]
    fn default_target_is_a_listing_search_url() {
        assert!(DEFAULT_AUTOTRADER_URL.starts_with("https://www.autotrader.ca/lst"));
        assert!(DEFAULT_AUTOTRADER_URL.contains("size=40"));
    }
}
