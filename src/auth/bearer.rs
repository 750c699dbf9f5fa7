//! `Authorization: Bearer <token>` parsing.

use super::AuthError;

/// Authentication scheme accepted by the gateway (compared case-insensitively)
const BEARER_SCHEME: &str = "Bearer";

/// Extract the token from a raw `Authorization` header value.
///
/// The value is split on whitespace rather than sliced at a fixed offset, so
/// leading/trailing whitespace and runs of spaces between scheme and token
/// are tolerated.
///
/// # Errors
///
/// - [`AuthError::MissingHeader`] if the value is empty or only whitespace.
/// - [`AuthError::MalformedScheme`] unless the value is exactly two fields and
///   the first one is `Bearer` (any case).
pub fn extract_bearer(header_value: &str) -> Result<&str, AuthError> {
    if header_value.trim().is_empty() {
        return Err(AuthError::MissingHeader);
    }

    let mut fields = header_value.split_whitespace();
    let (Some(scheme), Some(token), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(AuthError::MalformedScheme);
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::MalformedScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedScheme);
    }

    Ok(token)
}
