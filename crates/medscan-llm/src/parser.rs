//! Model response parsing.
//!
//! Vision models wrap their JSON in markdown fences more often than not,
//! with or without a language tag. The parser strips the fence and then
//! requires strict JSON.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while turning model text into a validated structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("field {0} is not an array")]
    NotAnArray(&'static str),

    #[error("entry is not an object (entry {0})")]
    EntryNotObject(usize),

    #[error("missing required field: {field} (entry {index})")]
    MissingField { index: usize, field: &'static str },

    #[error("invalid field: {field} (entry {index}): {reason}")]
    InvalidField {
        index: usize,
        field: &'static str,
        reason: String,
    },
}

pub type ResponseResult<T> = Result<T, ResponseError>;

const FENCE: &str = "```";

/// Return the content of the first fenced block, or the trimmed text when
/// there is no fence.
///
/// The opening fence may carry a language tag (`json`, `javascript`, ...).
/// An unterminated fence runs to the end of the text.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let after_open = &trimmed[open + FENCE.len()..];
    let tag_len = after_open
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
        .unwrap_or(after_open.len());
    let body = &after_open[tag_len..];

    let body = match body.find(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// Parse raw model text into a JSON value.
pub fn parse_model_response(text: &str) -> ResponseResult<Value> {
    let payload = strip_code_fence(text);
    tracing::debug!(
        response_len = text.len(),
        payload_len = payload.len(),
        "parsing model response"
    );
    serde_json::from_str(payload).map_err(|e| ResponseError::InvalidJson(e.to_string()))
}
