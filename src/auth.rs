use std::fs;

use anyhow::{Context, Result};
use headless_chrome::protocol::cdp::Network::CookieParam;
use serde::{Deserialize, Serialize};

/// Pre-captured authentication state for the marketplace site, in the
/// `storage_state` JSON layout (cookies + origins). Supplied externally,
/// restored verbatim into a browsing context, never mutated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSnapshot {
    #[serde(default)]
    pub cookies: Vec<CookieParam>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

impl AuthSnapshot {
    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading auth state file {path}"))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing auth state file {path}"))
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headless_chrome::protocol::cdp::Network::CookieSameSite;

    const SAMPLE: &str = r#"{
        "cookies": [
            {"name": "datr", "value": "xxx", "domain": ".facebook.com", "path": "/",
             "expires": 1805640586, "httpOnly": true, "secure": true, "sameSite": "None"},
            {"name": "c_user", "value": "xxx", "domain": ".facebook.com", "path": "/",
             "expires": 1802616603, "httpOnly": false, "secure": true, "sameSite": "None"}
        ],
        "origins": []
    }"#;

    #[test]
    fn storage_state_json_maps_onto_driver_cookies() {
        let snapshot: AuthSnapshot = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(snapshot.cookies.len(), 2);
        assert!(!snapshot.is_empty());

        let datr = &snapshot.cookies[0];
        assert_eq!(datr.name, "datr");
        assert_eq!(datr.domain.as_deref(), Some(".facebook.com"));
        assert_eq!(datr.http_only, Some(true));
        assert_eq!(datr.same_site, Some(CookieSameSite::None));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let snapshot: AuthSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.origins.is_empty());
    }
}
