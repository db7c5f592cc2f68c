use thiserror::Error;

// Fatal before the loop starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("invalid setting {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },

    #[error("invalid content pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// Errors from the Bluesky source/destination connectors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("authentication failed for {handle}: {reason}")]
    Authentication { handle: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
}

// Errors from the generation service
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("model returned an empty response")]
    EmptyResponse,
}

// Collaborator failures that end a cycle as failed
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] ConnectorError),

    #[error("publish failed: {0}")]
    Dispatch(#[source] ConnectorError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
