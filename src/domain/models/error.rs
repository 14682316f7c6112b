use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    /// A required credential or setting is missing. Raised before any network
    /// call is attempted.
    #[error("{0}")]
    Configuration(String),

    /// The backend answered, but with a failing status or a payload we could
    /// not understand.
    #[error("{backend} API error: {message}")]
    Protocol { backend: String, message: String },

    /// Connection refused, timeouts and interrupted streams.
    #[error("{backend} network error: {message}")]
    Network { backend: String, message: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// A single streamed chunk failed to parse. Streaming readers log and skip
    /// these, they never end a stream.
    #[error("Failed to parse stream chunk: {0}")]
    Parse(String),

    /// The consumer of a fragment stream went away before the producer was
    /// done.
    #[error("Generation was cancelled")]
    Cancelled,
}

impl AiError {
    pub fn protocol(backend: &str, message: &str) -> AiError {
        return AiError::Protocol {
            backend: backend.to_string(),
            message: message.to_string(),
        };
    }

    pub fn network(backend: &str, err: impl std::fmt::Display) -> AiError {
        return AiError::Network {
            backend: backend.to_string(),
            message: err.to_string(),
        };
    }

    /// Maps a transport error from reqwest, keeping decode failures apart from
    /// connection failures.
    pub fn from_reqwest(backend: &str, err: reqwest::Error) -> AiError {
        if err.is_decode() {
            return AiError::protocol(backend, &err.to_string());
        }

        return AiError::network(backend, err);
    }
}
