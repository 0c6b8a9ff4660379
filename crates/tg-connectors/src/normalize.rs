//! Turns connector errors into short messages for the standards log.
//!
//! Graph and the Entra ID token endpoint wrap the useful text in JSON:
//! `{"error":{"code":..,"message":..}}` for Graph and
//! `{"error":"invalid_client","error_description":"AADSTS7000215: .."}` for
//! token requests. Some AADSTS codes are rewritten into an actionable hint.

use crate::traits::ConnectorError;
use serde_json::{json, Value};

/// Known failure signatures and the message shown instead.
const FRIENDLY_MESSAGES: &[(&str, &str)] = &[
    (
        "AADSTS65001",
        "The application does not have consent in this tenant. Grant admin consent and try again.",
    ),
    (
        "AADSTS700016",
        "The application was not found in this tenant. The tenant may not have consented to it.",
    ),
    (
        "AADSTS90002",
        "The tenant could not be found. Check the tenant identifier.",
    ),
    (
        "AADSTS7000215",
        "Invalid client secret provided. Check the configured credentials.",
    ),
    (
        "AADSTS50020",
        "The account is not a member of this tenant.",
    ),
    (
        "Authorization_RequestDenied",
        "Insufficient privileges to complete the operation.",
    ),
    (
        "Insufficient privileges",
        "Insufficient privileges to complete the operation.",
    ),
];

/// Returns a one-line description of `error` fit for an operator.
pub fn normalize_error(error: &ConnectorError) -> String {
    let raw = error.to_string();
    let message = extract_json_message(&raw).unwrap_or_else(|| raw.clone());

    FRIENDLY_MESSAGES
        .iter()
        .find(|(needle, _)| message.contains(needle) || raw.contains(needle))
        .map(|(_, friendly)| friendly.to_string())
        .unwrap_or(message)
}

/// Structured form of `error` for log data.
pub fn error_details(error: &ConnectorError) -> Value {
    json!({
        "kind": error.kind(),
        "message": error.to_string(),
        "normalizedError": normalize_error(error),
    })
}

/// Finds an embedded JSON error body and pulls out its message.
fn extract_json_message(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let body: Value = serde_json::from_str(text[start..].trim()).ok()?;

    match body.get("error") {
        Some(Value::Object(inner)) => inner
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(String::from),
        Some(Value::String(code)) => Some(
            body.get("error_description")
                .and_then(Value::as_str)
                .unwrap_or(code)
                .to_string(),
        ),
        _ => body.get("message").and_then(Value::as_str).map(String::from),
    }
}
