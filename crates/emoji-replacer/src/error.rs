//! Replacer errors

use emoji_dom::DomError;
use emoji_net::NetError;

/// Result type for replacer operations
pub type ReplaceResult<T> = Result<T, ReplaceError>;

/// Errors raised while loading or resolving emoji data.
///
/// `Clone` so that one single-flight outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplaceError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] NetError),

    #[error("malformed source data: {0}")]
    Parse(String),

    #[error("emoji [{object}@{set}] not found")]
    NotFound { set: String, object: String },

    #[error("set {0} is not listed in the index")]
    UnknownSet(String),

    #[error("no index URL configured")]
    NoIndex,

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("HTML error: {0}")]
    Html(String),
}

impl From<serde_json::Error> for ReplaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<emoji_html::ParseError> for ReplaceError {
    fn from(err: emoji_html::ParseError) -> Self {
        Self::Html(err.to_string())
    }
}
