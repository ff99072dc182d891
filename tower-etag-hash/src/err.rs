// Error types must implement std::Error else axum will throw
// `the trait bound HandleError<...> is not satisfied`

use http::header::InvalidHeaderValue;

/// Invalid [`HashOptions`](crate::HashOptions). Raised once at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported digest encoding {0:?}, expected one of \"hex\", \"base64\"")]
    Encoding(String),

    #[error("unsupported digest algorithm {0:?}")]
    Algorithm(String),

    #[error("unknown response variety {0:?}, expected one of \"plain\", \"buffer\", \"view\", \"stream\"")]
    Variety(String),

    #[error("malformed hash options: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The inner service handed over a response body that breaks the variety contract
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    #[error("plain variety responses must be objects or strings, got a {0}")]
    PlainSource(&'static str),

    #[error("failed to serialize plain variety response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("digest is not a valid header value: {0}")]
    HeaderValue(#[from] InvalidHeaderValue),
}

#[derive(Debug, thiserror::Error)]
pub enum EtagHashServiceError<InnerError, RenderError> {
    #[error("{0}")]
    Inner(InnerError),

    #[error("view render failed: {0}")]
    Render(RenderError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),
}
