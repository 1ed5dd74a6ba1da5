//! Connector configuration validation.
//!
//! Validation errors are caught before any network call is made and surfaced
//! inline; they never reach the reconciler.

use crate::connector::ConnectorSpec;
use crate::error::AppError;

/// Substrings which mark an auth field value as a placeholder rather than a
/// real credential. Matched case-insensitively.
const PLACEHOLDER_MARKERS: &[&str] = &["your-", "your_", "example", "enter ", "changeme", "change-me", "api-key-here", "<token>", "sample-token", "xxxxxx"];

/// Validate a connector spec before it is sent to the backend.
///
/// Rejects an empty URL and any auth field that is empty or placeholder-like.
pub fn validate_connector(spec: &ConnectorSpec) -> Result<(), AppError> {
    if spec.url.trim().is_empty() {
        return Err(AppError::InvalidInput("connector URL may not be an empty string".into()));
    }
    if spec.auth.kind.is_empty() || spec.auth.kind.eq_ignore_ascii_case("none") {
        return Ok(());
    }
    if spec.auth.fields.is_empty() {
        return Err(AppError::InvalidInput(format!("auth type {} requires auth fields to be set", spec.auth.kind)));
    }
    for (name, value) in &spec.auth.fields {
        if value.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("auth field {} may not be empty", name)));
        }
        if is_placeholder(value) {
            return Err(AppError::InvalidInput(format!("auth field {} still contains a placeholder value, enter your real credentials", name)));
        }
    }
    Ok(())
}

/// Whether the given value looks like an unedited sample rather than a real
/// credential.
pub fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::AuthSpec;

    fn spec(url: &str, auth_kind: &str, fields: &[(&str, &str)]) -> ConnectorSpec {
        ConnectorSpec {
            url: url.into(),
            method: "GET".into(),
            headers: Default::default(),
            query_params: Default::default(),
            auth: AuthSpec {
                kind: auth_kind.into(),
                fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            },
            polling_interval_secs: 60,
        }
    }

    #[test]
    fn rejects_empty_url() {
        let err = validate_connector(&spec("  ", "none", &[])).expect_err("expected validation failure for empty URL");
        assert!(matches!(err, AppError::InvalidInput(_)), "expected InvalidInput, got {:?}", err);
    }

    #[test]
    fn rejects_placeholder_bearer_token() {
        let err = validate_connector(&spec("https://api.example.io/v1", "bearer-token", &[("token", "your-token-here")]))
            .expect_err("expected validation failure for placeholder token");
        assert!(matches!(err, AppError::InvalidInput(_)), "expected InvalidInput, got {:?}", err);
    }

    #[test]
    fn rejects_known_sample_tokens() {
        for sample in ["changeme", "API-KEY-HERE", "please enter key", "xXxXxX"] {
            let res = validate_connector(&spec("https://api.host/v1", "api-key", &[("api_key", sample)]));
            assert!(res.is_err(), "expected {:?} to be rejected as a placeholder", sample);
        }
    }

    #[test]
    fn accepts_real_looking_credentials() {
        let res = validate_connector(&spec("https://api.host/v1", "bearer-token", &[("token", "sk-live-9f8e7d6c")]));
        assert!(res.is_ok(), "expected real credentials to pass, got {:?}", res);
    }

    #[test]
    fn auth_none_requires_no_fields() {
        let res = validate_connector(&spec("https://api.host/v1", "none", &[]));
        assert!(res.is_ok(), "expected auth type none to pass without fields, got {:?}", res);
    }
}
