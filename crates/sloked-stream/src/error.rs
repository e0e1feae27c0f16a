use sloked_editing::EditingError;
use thiserror::Error;

/// Failures surfaced from a [`crate::TransactionStream`].
///
/// `CoreCorruption` is unrecoverable: once an internal invariant is
/// violated (an edit that should always apply cleanly failed), the
/// multiplexer refuses every further operation rather than risk silently
/// diverging from what's on screen.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream is part of a multiplexer whose core state is corrupted")]
    CoreCorruption,
    #[error(transparent)]
    Editing(#[from] EditingError),
}
