use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the Carefinder library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A coordinate was NaN or outside the valid latitude/longitude range.
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A service record failed validation while building a catalog snapshot.
    #[error("invalid service record {id}: {message}")]
    InvalidServiceRecord { id: String, message: String },

    /// A category name did not match any known service category.
    #[error("unknown category '{value}'; expected one of hospital, clinic, pharmacy, ambulance")]
    UnknownCategory { value: String },

    /// Two records in one catalog snapshot share an id.
    #[error("duplicate service id in catalog: {id}")]
    DuplicateServiceId { id: String },

    /// Raised when a service id or name could not be found in the catalog.
    #[error("unknown service: {query}{}", format_suggestions(.suggestions))]
    UnknownService {
        query: String,
        suggestions: Vec<String>,
    },

    /// The catalog could not be retrieved. Retryable, and distinct from an
    /// empty result.
    #[error("could not load the service catalog: {reason}")]
    CatalogFetchFailed { reason: String },

    /// No route could be computed for the selected destination.
    #[error("route unavailable: {reason}")]
    RouteUnavailable { reason: String },

    /// The notification channel gave up reconnecting for this session.
    #[error("notification channel gave up after {attempts} reconnect attempts")]
    ChannelExhausted { attempts: u32 },

    /// Raised by a notification transport when connecting or reading fails.
    #[error("notification transport error: {message}")]
    Transport { message: String },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// No suitable project directories could be resolved for this platform.
    #[error("failed to resolve project directories for configuration")]
    ProjectDirsUnavailable,

    /// Raised when a configuration file could not be parsed.
    #[error("failed to parse configuration at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Wrapper for JSON decoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::CatalogFetchFailed { .. }
                | Error::Transport { .. }
                | Error::Http(_)
                | Error::Io(_)
        )
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else if suggestions.len() == 1 {
        format!(". Did you mean '{}'?", suggestions[0])
    } else {
        format!(
            ". Did you mean one of: {}?",
            suggestions
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
