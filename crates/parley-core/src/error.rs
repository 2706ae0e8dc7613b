use thiserror::Error;

/// Everything that can go wrong talking to the assistant endpoint.
///
/// None of these reach the user directly: the transport collapses them into
/// a fixed fallback reply.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to assistant endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("assistant endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("assistant reply was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}
