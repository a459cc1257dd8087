//! Shared error vocabulary.

/// Grepable error code and retryable flag attached to every runtime error.
///
/// Operation failures surface `error_code()` in their [`OperationResult`]
/// so callers can branch on a stable identifier instead of message text.
///
/// [`OperationResult`]: crate::operations::OperationResult
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
