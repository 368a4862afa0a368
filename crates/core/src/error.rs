use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenaristError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Gemini API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid API response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("No image in model response")]
    NoImage,

    #[error("Unknown thumbnail concept {id}")]
    UnknownConcept { id: String },

    #[error("Thumbnail {id} has not been visualized yet")]
    NotVisualized { id: String },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

pub type Result<T> = std::result::Result<T, ScenaristError>;

/// Failures of a single generation attempt, as reported to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("Describe your idea or attach at least one file")]
    EmptyInput,

    #[error("Daily limit reached. Upgrade to PRO to keep generating.")]
    LimitExceeded,

    #[error("{message}")]
    Service { message: String },
}
