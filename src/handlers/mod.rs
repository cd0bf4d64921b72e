pub mod api;
pub mod pages;

use crate::error::ApiError;

/// Path ids are matched as numeric captures; anything non-numeric means the
/// route simply does not match, so the caller sees not-found rather than a
/// malformed-request error.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::not_found("Not found"))
}
