//! Response classification shared by every gateway operation.
//!
//! Order matters: a markup document is protocol confusion whatever its status,
//! then non-success statuses become `Error::Transport`, then 204 or an empty
//! body is a valid "no content" result, and only then is the body parsed.

use crate::errors::{Error, Result};
use crate::transport::HttpResponse;
use serde_json::Value;
use tracing::{debug, warn};

const MARKUP_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// A successful response, before domain validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// 204, or a success with an empty body
    NoContent,
    Json(Value),
}

/// Classifies a raw response from `path`.
///
/// # Errors
/// - `ProtocolConfusion` when markup came back instead of JSON
/// - `Transport` for non-success statuses; details parsed only below 500
/// - `MalformedPayload` when a success body is not JSON
pub fn classify(path: &str, response: HttpResponse) -> Result<Classified> {
    if is_markup(response.content_type.as_deref(), &response.body) {
        return Err(Error::ProtocolConfusion {
            path: path.to_string(),
            content_type: response
                .content_type
                .unwrap_or_else(|| "undeclared".to_string()),
        });
    }

    if !response.is_success() {
        let details = if response.status >= 500 {
            None
        } else {
            parse_error_details(path, &response.body)
        };
        return Err(Error::Transport {
            status: response.status,
            details,
        });
    }

    if response.status == 204 || response.body.trim().is_empty() {
        debug!("{} returned no content", path);
        return Ok(Classified::NoContent);
    }

    serde_json::from_str(&response.body)
        .map(Classified::Json)
        .map_err(|e| Error::malformed(format!("{path} returned invalid JSON: {e}")))
}

fn parse_error_details(path: &str, body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(details) => Some(details),
        Err(e) => {
            warn!("Failed to parse error details from {}: {}", path, e);
            None
        }
    }
}

/// Markup by declared type, or by sniffing when no type was declared.
fn is_markup(content_type: Option<&str>, body: &str) -> bool {
    match content_type {
        Some(declared) => {
            let essence = declared
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            MARKUP_CONTENT_TYPES.contains(&essence.as_str())
        }
        None => {
            let head: String = body.trim_start().chars().take(15).collect();
            let head = head.to_ascii_lowercase();
            head.starts_with("<!doctype html") || head.starts_with("<html")
        }
    }
}
