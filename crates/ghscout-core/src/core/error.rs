use thiserror::Error;

pub type ScoutResult<T> = Result<T, ScoutError>;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection, TLS or timeout failure while talking to the remote API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status other than 404.
    #[error("GitHub API error: HTTP {status} for {url}")]
    Remote { status: u16, url: String },

    /// The remote resource does not exist. Listing and probe APIs translate
    /// this into an empty or absent answer; it only escapes lower layers.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote answered, but with something we could not use.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// An installation token could not be issued or refreshed.
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Credential store error: {0}")]
    Credentials(String),

    #[error("GitHub API rate limit exceeded, resets in {reset_in_secs} seconds")]
    RateLimited { reset_in_secs: u64 },

    /// The scan was cancelled between two steps.
    #[error("Operation cancelled")]
    Cancelled,

    /// A discovery request or probe was used after it was closed.
    #[error("{0} used after close")]
    RequestClosed(&'static str),
}

impl ScoutError {
    /// Whether this error means "the thing is absent" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            ScoutError::NotFound(_) => true,
            ScoutError::Remote { status, .. } => *status == 404,
            ScoutError::Http(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
            _ => false,
        }
    }
}
