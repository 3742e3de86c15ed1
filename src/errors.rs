use hyper::StatusCode;

/// The one message a caller ever sees when a generation fails.
pub const GENERATION_FAILED: &str = "Failed to generate hiring post image. Please try again.";

pub fn internal_error(err: &GenerationError) -> (StatusCode, String) {
        match err {
            GenerationError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED.into()),
            GenerationError::Transport(_) => (StatusCode::BAD_GATEWAY, GENERATION_FAILED.into()),
            GenerationError::Protocol(_) => (StatusCode::BAD_GATEWAY, GENERATION_FAILED.into()),
            GenerationError::Input(_) => (StatusCode::BAD_REQUEST, GENERATION_FAILED.into()),
        }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Internal Server Error, code 500
    /// Raised before any network call is made.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad Gateway, code 502
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Bad Gateway, code 502
    /// Non-2xx status, malformed JSON or an implausibly small image body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Bad Request, code 400
    #[error("invalid image input: {0}")]
    Input(String),
}
