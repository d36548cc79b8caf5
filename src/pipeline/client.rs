//! Extraction client: build the vision request, call the endpoint, and
//! decode the structured payload.
//!
//! This module converts one encoded photo into one [`FileResult`]. It is
//! intentionally thin on prompt content; the instruction text lives in
//! [`crate::prompts`] so it can be changed without touching retry or
//! error-handling logic here.
//!
//! ## Retry Strategy
//!
//! Connection errors, timeouts, HTTP 429 and 5xx are transient.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids hammering
//! a recovering endpoint: with 500 ms base and 3 retries the wait
//! sequence is 500 ms, 1 s, 2 s, under 4 s of back-off per photo.
//! Non-retryable statuses (401, 400) and decode failures skip the retry
//! loop entirely; retrying them would return the same answer.
//!
//! ## Two-stage decode
//!
//! The structured fields arrive as `choices[0].message.function_call.
//! arguments`, a JSON-encoded string inside an already-decoded JSON
//! body. The inner decode is its own fallible step with its own error
//! variant; a response that passes the first decode can still fail the
//! second.

use crate::config::ExtractionConfig;
use crate::error::FileError;
use crate::output::{
    ExtractedFields, FileResult, NOT_AVAILABLE, NO_CODE_FOUND, NO_TEXT_FOUND,
};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, USER_PROMPT};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Name of the forced function in the output contract.
pub const FUNCTION_NAME: &str = "extract_barcode_and_text";

// ── Request construction ─────────────────────────────────────────────────

/// Schema of the structured payload the model must return: four required
/// string fields, two enum-constrained to low/medium/high.
fn function_schema() -> Value {
    json!({
        "name": FUNCTION_NAME,
        "description": "Extract the barcode number, text within the oval, and provide confidence levels.",
        "parameters": {
            "type": "object",
            "properties": {
                "barcode_number": {
                    "type": "string",
                    "description": "The barcode number extracted from the image."
                },
                "barcode_confidence": {
                    "type": "string",
                    "enum": ["low", "medium", "high"],
                    "description": "Confidence level for the barcode extraction."
                },
                "oval_text": {
                    "type": "string",
                    "description": "The text extracted from the oval within the image."
                },
                "oval_text_confidence": {
                    "type": "string",
                    "enum": ["low", "medium", "high"],
                    "description": "Confidence level for the oval text extraction."
                }
            },
            "required": [
                "barcode_number",
                "barcode_confidence",
                "oval_text",
                "oval_text_confidence"
            ]
        }
    })
}

/// Build the chat-completion request body for one photo.
///
/// ## Message Layout
///
/// 1. **System message** — the reading heuristics (or a user-supplied
///    override)
/// 2. **User message** — two parts: the instruction text and the photo
///    as a base64 data URI
///
/// `function_call` names [`FUNCTION_NAME`] explicitly, forcing the model
/// to answer through the schema instead of free text.
pub(crate) fn build_payload(image: &EncodedImage, config: &ExtractionConfig) -> Value {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    json!({
        "model": config.model,
        "temperature": config.temperature,
        "messages": [
            {
                "role": "system",
                "content": system_prompt
            },
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": USER_PROMPT
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": image.data_uri() }
                    }
                ]
            }
        ],
        "functions": [ function_schema() ],
        "function_call": { "name": FUNCTION_NAME },
        "max_tokens": config.max_tokens
    })
}

// ── Response decoding ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    #[serde(default)]
    arguments: String,
}

/// Fields as the model returned them; any may be absent.
#[derive(Deserialize)]
struct RawFields {
    barcode_number: Option<String>,
    barcode_confidence: Option<String>,
    oval_text: Option<String>,
    oval_text_confidence: Option<String>,
}

/// Decode the structured payload out of a 2xx response body.
///
/// A field missing from an otherwise well-formed payload gets its
/// per-field default; a structurally broken response (no choices, no
/// function call, bad JSON at either decode stage) is an error the
/// caller turns into a sentinel row.
pub(crate) fn parse_response(file_name: &str, body: &str) -> Result<ExtractedFields, FileError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| FileError::MalformedResponse {
            file: file_name.to_string(),
            detail: e.to_string(),
        })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| FileError::NoChoices {
            file: file_name.to_string(),
        })?;

    let call = choice
        .message
        .and_then(|m| m.function_call)
        .ok_or_else(|| FileError::MissingFunctionCall {
            file: file_name.to_string(),
        })?;

    // Second decode pass: the arguments value is JSON-encoded text.
    let raw: RawFields =
        serde_json::from_str(&call.arguments).map_err(|e| FileError::MalformedArguments {
            file: file_name.to_string(),
            detail: e.to_string(),
        })?;

    Ok(ExtractedFields {
        barcode_number: raw
            .barcode_number
            .unwrap_or_else(|| NO_CODE_FOUND.to_string()),
        barcode_confidence: raw
            .barcode_confidence
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        oval_text: raw.oval_text.unwrap_or_else(|| NO_TEXT_FOUND.to_string()),
        oval_text_confidence: raw
            .oval_text_confidence
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    })
}

// ── Driving one photo ────────────────────────────────────────────────────

/// Whether a status code is worth retrying.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// Submit one encoded photo and return its row.
///
/// Always returns a `FileResult`, never an error: any failure degrades
/// to the sentinel row with the cause recorded in `result.error`, so one
/// bad photo cannot abort the batch.
pub async fn process_file(
    client: &reqwest::Client,
    api_key: &str,
    file_name: &str,
    image: &EncodedImage,
    config: &ExtractionConfig,
) -> FileResult {
    let start = Instant::now();
    let payload = build_payload(image, config);

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                file_name, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let sent = client
            .post(&config.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await;

        match sent {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(e) => {
                            warn!(
                                "{}: attempt {} failed reading body — {}",
                                file_name,
                                attempt + 1,
                                e
                            );
                            last_err = Some(format!("failed reading response body: {e}"));
                            continue;
                        }
                    };

                    let duration_ms = start.elapsed().as_millis() as u64;
                    return match parse_response(file_name, &body) {
                        Ok(fields) => {
                            debug!(
                                "{}: extracted barcode '{}' ({}) in {}ms",
                                file_name, fields.barcode_number, fields.barcode_confidence,
                                duration_ms
                            );
                            FileResult {
                                file_name: file_name.to_string(),
                                fields,
                                duration_ms,
                                retries: attempt as u8,
                                error: None,
                            }
                        }
                        Err(e) => {
                            warn!("{}: {}", file_name, e);
                            FileResult::fallback(
                                file_name.to_string(),
                                duration_ms,
                                attempt as u8,
                                e,
                            )
                        }
                    };
                }

                if is_retryable_status(status) {
                    warn!(
                        "{}: attempt {} failed — HTTP {}",
                        file_name,
                        attempt + 1,
                        status
                    );
                    last_err = Some(format!("HTTP {status}"));
                } else {
                    let error = FileError::BadStatus {
                        file: file_name.to_string(),
                        status: status.as_u16(),
                    };
                    warn!("{}: {}", file_name, error);
                    return FileResult::fallback(
                        file_name.to_string(),
                        start.elapsed().as_millis() as u64,
                        attempt as u8,
                        error,
                    );
                }
            }
            Err(e) => {
                let msg = if e.is_timeout() {
                    format!("timed out after {}s", config.api_timeout_secs)
                } else {
                    e.to_string()
                };
                warn!("{}: attempt {} failed — {}", file_name, attempt + 1, msg);
                last_err = Some(msg);
            }
        }
    }

    // All retries exhausted.
    let detail = last_err.unwrap_or_else(|| "unknown error".to_string());
    FileResult::fallback(
        file_name.to_string(),
        start.elapsed().as_millis() as u64,
        config.max_retries as u8,
        FileError::RequestFailed {
            file: file_name.to_string(),
            retries: config.max_retries as u8,
            detail,
        },
    )
}
