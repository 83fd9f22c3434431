/// Errors raised while scraping. None of them abort a scrape cycle; the
/// orchestrator reports them and moves on.
///
/// # Examples
///
/// ```rust
/// use cwexporter_scrape::error::ScrapeError;
///
/// let err = ScrapeError::UnknownService("mq".to_string());
/// assert!(err.to_string().contains("mq"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The tagging collaborator failed to list resources for a job.
    #[error("resource discovery failed for {service} in {region}: {message}")]
    Discovery {
        service: String,
        region: String,
        message: String,
    },

    /// A list or fetch call against the monitoring API failed.
    #[error("monitoring API {operation} failed: {message}")]
    Monitoring {
        operation: &'static str,
        message: String,
    },

    /// An AWS API call failed after the SDK's own retries.
    #[error("{service} API error: code={code}, message={message}")]
    Api {
        service: &'static str,
        code: String,
        message: String,
    },

    /// The request was throttled and the SDK's retries were exhausted.
    #[error("{service} API rate limited: {message}")]
    RateLimited {
        service: &'static str,
        message: String,
    },

    /// No dimension-detection rule is registered for the service type.
    #[error("Unsupported service type: {0}")]
    UnknownService(String),

    /// The resource identifier is not an ARN the detector understands.
    #[error("Invalid resource ARN: {0}")]
    InvalidArn(String),

    /// A search tag value is not a valid regular expression.
    #[error("Invalid search tag filter for key {key}: {source}")]
    InvalidFilter {
        key: String,
        #[source]
        source: regex::Error,
    },

    /// Credentials or clients for a job could not be set up.
    #[error("Client setup failed for region {region}: {message}")]
    ClientSetup { region: String, message: String },

    /// A concurrency gate was closed while a task waited on it.
    #[error("Concurrency gate closed")]
    GateClosed(#[from] tokio::sync::AcquireError),
}

impl ScrapeError {
    pub(crate) fn monitoring(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Monitoring {
            operation,
            message: err.to_string(),
        }
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ScrapeError>;
