//! Dissection errors
//!
//! Dissection degrades gracefully on almost everything: a malformed or
//! unrecognized fragment contributes zero entities and consumes zero
//! positions. The one hard failure is an internally inconsistent time
//! pattern, which no later stage could repair.

use thiserror::Error;

/// Result type for dissection operations
pub type DissectResult<T> = Result<T, DissectError>;

/// Errors surfaced to the caller during dissection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DissectError {
    #[error("invalid time pattern {field} '{value}': must be an in-range integer, '*' or '/N'")]
    InvalidTimePattern { field: &'static str, value: String },
}
