//! Error types for the barcode2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the batch cannot proceed at all
//!   (input directory missing, no API credential, output workbook
//!   unwritable). Returned as `Err(ExtractError)` from the top-level
//!   `extract*` functions.
//!
//! * [`FileError`] — **Non-fatal**: a single photo failed (unreadable
//!   file, network error, malformed response) but the rest of the batch
//!   is fine. Stored inside [`crate::output::FileResult`] next to the
//!   sentinel row it produced, so callers can inspect partial success
//!   rather than losing the whole run to one bad photo.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the barcode2xlsx library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::FileResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory was not found at the given path.
    #[error("Input directory not found: '{path}'\nCheck the path exists and is readable.")]
    InputDirNotFound { path: PathBuf },

    /// Process does not have read permission on the input directory.
    #[error("Permission denied reading directory '{path}'\nTry: chmod +r {path:?}")]
    InputDirNotReadable { path: PathBuf },

    /// The input path exists but is not a directory.
    #[error("Input path '{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    // ── Credential errors ─────────────────────────────────────────────────
    /// No API credential available.
    #[error(
        "No API credential configured.\n\
         Set the OPENAI_API_KEY environment variable, or supply \
         ExtractionConfig::api_key via the builder."
    )]
    CredentialMissing,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output workbook.
    #[error("Failed to write output workbook '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single photo.
///
/// Stored alongside the sentinel row in [`crate::output::FileResult`].
/// The batch continues regardless of how many files fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The image file could not be read from disk.
    #[error("{file}: could not be read: {detail}")]
    Unreadable { file: String, detail: String },

    /// Transport-level failure (connection error, timeout, retryable
    /// status) persisted through every retry.
    #[error("{file}: API call failed after {retries} retries: {detail}")]
    RequestFailed {
        file: String,
        retries: u8,
        detail: String,
    },

    /// The API returned a non-retryable, non-2xx status (e.g. 401).
    #[error("{file}: API returned HTTP {status}")]
    BadStatus { file: String, status: u16 },

    /// The response body decoded, but carried no choices.
    #[error("{file}: response contained no choices")]
    NoChoices { file: String },

    /// The first choice carried no structured function-call payload.
    #[error("{file}: response choice carried no function-call payload")]
    MissingFunctionCall { file: String },

    /// The response body was not valid JSON.
    #[error("{file}: response body was not valid JSON: {detail}")]
    MalformedResponse { file: String, detail: String },

    /// The nested function-call arguments string was not valid JSON.
    #[error("{file}: function-call arguments were not valid JSON: {detail}")]
    MalformedArguments { file: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_dir_not_found_display() {
        let e = ExtractError::InputDirNotFound {
            path: PathBuf::from("/no/such/dir"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/no/such/dir"), "got: {msg}");
        assert!(msg.contains("not found"));
    }

    #[test]
    fn credential_missing_names_env_var() {
        let msg = ExtractError::CredentialMissing.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn request_failed_display() {
        let e = FileError::RequestFailed {
            file: "a.jpg".into(),
            retries: 3,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.jpg"));
        assert!(msg.contains("3 retries"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn bad_status_display() {
        let e = FileError::BadStatus {
            file: "c.png".into(),
            status: 401,
        };
        assert!(e.to_string().contains("HTTP 401"));
    }

    #[test]
    fn file_error_round_trips_through_json() {
        let e = FileError::MalformedArguments {
            file: "b.jpeg".into(),
            detail: "EOF while parsing".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        let back: FileError = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back.to_string(), e.to_string());
    }
}
