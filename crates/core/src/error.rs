use std::io;

use lol_html::errors::RewritingError;
use thiserror::Error;

/// Errors surfaced by the caption filter.
///
/// Rewriting and DOM mutation never fail on their own; only settings parsing and the
/// streaming sink can produce one of these.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// `without_script` mode needs at least one class to look for.
    #[error("`classes` must name at least one class when mode is `without_script`")]
    MissingClasses,

    /// Settings JSON did not match the expected shape.
    #[error("invalid filter settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// lol_html rejected the input or a handler failed.
    #[error("streaming rewrite failed: {0}")]
    Rewriting(String),

    /// The destination writer failed.
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for CaptionError {
    /// lol_html errors reach callers through `io::Write`; they are unwrapped back into
    /// [`CaptionError::Rewriting`].
    fn from(err: io::Error) -> Self {
        let rewriting = err
            .get_ref()
            .is_some_and(|inner| inner.is::<RewritingError>());
        if rewriting {
            CaptionError::Rewriting(err.to_string())
        } else {
            CaptionError::Io(err)
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = CaptionError> = std::result::Result<T, E>;
