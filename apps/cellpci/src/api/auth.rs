//! # Authentication
//!
//! Optional bearer-key check for the operator API.
//!
//! When `CELLPCI_API_KEY` is set and non-empty, every request except
//! `GET /health` must carry:
//! ```text
//! Authorization: Bearer <key>
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "CELLPCI_API_KEY";

/// Read the API key; `None` (auth disabled) when unset or empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty())
}

/// Expected key, shared by every request.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    /// Constant-time comparison.
    ///
    /// Both sides are zero-padded to a common length so the comparison
    /// time does not depend on where the first difference is, nor on the
    /// length of the expected key.
    pub fn matches(&self, provided: &str) -> bool {
        let provided = provided.as_bytes();
        let expected = self.0.as_bytes();
        let len = provided.len().max(expected.len());

        let mut lhs = vec![0u8; len];
        let mut rhs = vec![0u8; len];
        lhs[..provided.len()].copy_from_slice(provided);
        rhs[..expected.len()].copy_from_slice(expected);

        let same_bytes: bool = lhs.ct_eq(&rhs).into();
        same_bytes && provided.len() == expected.len()
    }
}

/// Reject requests without the configured key.
pub async fn api_key_auth_middleware(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    let provided = value.strip_prefix("Bearer ").unwrap_or(value);
    if key.matches(provided) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            "Authentication failed: invalid API key"
        );
        Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_key_matches() {
        let key = ApiKey::new("s3cret");
        assert!(key.matches("s3cret"));
    }

    #[test]
    fn prefix_and_extension_do_not_match() {
        let key = ApiKey::new("s3cret");
        assert!(!key.matches("s3cre"));
        assert!(!key.matches("s3cret!"));
        assert!(!key.matches(""));
    }
}
