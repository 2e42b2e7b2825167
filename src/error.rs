use thiserror::Error;

/// Extraction-time failures, tagged so callers can tell "retry is safe"
/// apart from "escalate to a browser restart".
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Browser launch failed: {0}")]
    EngineLaunch(String),

    #[error("Navigation to {url} timed out or failed: {reason}")]
    NavigationTimeout { url: String, reason: String },

    #[error("Page state payload missing (throttled or interstitial page)")]
    MissingStateBlob,

    #[error("Element lookup failed: {0}")]
    ElementLookup(String),

    #[error("Browser driver error: {0}")]
    Driver(String),
}

impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        ScrapeError::Driver(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_carry_the_underlying_message() {
        let err: ScrapeError = anyhow::anyhow!("websocket gone").into();
        assert!(matches!(err, ScrapeError::Driver(ref msg) if msg.contains("websocket gone")));
    }

    #[test]
    fn missing_blob_reads_as_a_block_signal() {
        let msg = ScrapeError::MissingStateBlob.to_string();
        assert!(msg.contains("throttled or interstitial"));
    }
}
