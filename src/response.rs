use crate::error::{ApiErrorDetail, Result, TumblrError};
use crate::request::HttpMethod;
use crate::transport::TransportResponse;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Longest body excerpt carried in an envelope error
pub const MAX_BODY_EXCERPT: usize = 512;

/// Envelope metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: u16,
    #[serde(default, deserialize_with = "lenient_string")]
    pub msg: String,
}

/// The `{meta, response}` wrapper every API response uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "lenient_meta")]
    pub meta: Option<Meta>,

    /// `Some(Value::Null)` when the field is present but null
    #[serde(default, deserialize_with = "present")]
    pub response: Option<Value>,

    /// Error list attached to failed calls
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_errors")]
    pub errors: Vec<ApiErrorDetail>,

    /// Top-level error message used by some endpoints instead of `meta`
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_error")]
    pub error: Option<String>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

// Entries that do not look like error details are skipped.
fn lenient_errors<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<ApiErrorDetail>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// Off-type envelope fields read as absent so their siblings survive.
fn lenient_meta<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Meta>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        meta @ Value::Object(_) => serde_json::from_value(meta).ok(),
        _ => None,
    })
}

// Numeric strings such as "404" are accepted.
fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient_error<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

impl Envelope {
    /// Human-readable message for a failed call
    fn error_message(&self) -> String {
        self.meta
            .as_ref()
            .map(|meta| meta.msg.clone())
            .filter(|msg| !msg.is_empty())
            .or_else(|| self.error.clone())
            .or_else(|| self.errors.iter().find_map(|e| e.title.clone().or_else(|| e.detail.clone())))
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    HttpError,
    EnvelopeError,
    TransportError,
    /// Failed while building or signing; nothing was sent
    NotSent,
}

impl Outcome {
    /// Classify a finished call
    pub fn of(result: &Result<Value>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(TumblrError::Http { .. }) => Outcome::HttpError,
            Err(TumblrError::Envelope { .. }) => Outcome::EnvelopeError,
            Err(TumblrError::Transport(_)) => Outcome::TransportError,
            Err(_) => Outcome::NotSent,
        }
    }
}

/// Truncate `text` to at most [`MAX_BODY_EXCERPT`] bytes on a char boundary
pub fn body_excerpt(text: &str) -> String {
    if text.len() <= MAX_BODY_EXCERPT {
        return text.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn envelope_error(status: u16, reason: impl Into<String>, raw: &TransportResponse, source: Option<serde_json::Error>) -> TumblrError {
    TumblrError::Envelope {
        status,
        reason: reason.into(),
        body: body_excerpt(&raw.text()),
        source,
    }
}

/// Validate and unwrap an API response.
///
/// 2xx responses must carry both `meta` and `response`, and a `meta.status`
/// of 400 or more still counts as a failure. A 301 to a GET passes
/// `response` through (avatar redirects). Everything else is an HTTP error.
pub fn normalize(method: HttpMethod, raw: &TransportResponse) -> Result<Value> {
    let status = raw.status;

    let parsed: Value = serde_json::from_slice(&raw.body).map_err(|e| {
        envelope_error(status, format!("body is not JSON: {e}"), raw, Some(e))
    })?;

    let envelope: Option<Envelope> = match &parsed {
        Value::Object(_) => serde_json::from_value(parsed.clone()).ok(),
        _ => None,
    };

    if status == 301 && method == HttpMethod::Get {
        return Ok(match envelope.and_then(|e| e.response) {
            Some(response) => response,
            None => parsed,
        });
    }

    if !(200..300).contains(&status) {
        let (message, details) = match envelope {
            Some(envelope) => (envelope.error_message(), envelope.errors),
            None => ("unknown error".to_string(), Vec::new()),
        };
        return Err(TumblrError::http(status, message, details));
    }

    let Some(envelope) = envelope else {
        return Err(envelope_error(status, "body is not an envelope object", raw, None));
    };

    if let Some(meta) = &envelope.meta {
        if meta.status >= 400 {
            return Err(TumblrError::http(meta.status, envelope.error_message(), envelope.errors));
        }
    } else {
        return Err(envelope_error(status, "envelope is missing meta", raw, None));
    }

    envelope
        .response
        .ok_or_else(|| envelope_error(status, "envelope is missing response", raw, None))
}
