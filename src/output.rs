//! Result types for a batch extraction run.
//!
//! Every scanned photo produces exactly one [`FileResult`], whether the
//! extraction succeeded or fell back to the sentinel values. The 1:1
//! file-to-row correspondence is the core invariant of the pipeline: no
//! file is skipped silently, no file produces two rows.

use crate::error::FileError;
use serde::{Deserialize, Serialize};

/// Sentinel written to both text columns when the remote call failed
/// structurally (network error, bad status, malformed payload, timeout).
pub const NO_RESPONSE: &str = "No Response";

/// Sentinel written to a confidence column with no usable value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default for a barcode field missing from an otherwise well-formed
/// structured payload.
pub const NO_CODE_FOUND: &str = "No Code Found";

/// Default for an oval-text field missing from an otherwise well-formed
/// structured payload.
pub const NO_TEXT_FOUND: &str = "No Text Found";

/// The four fields extracted from one photo.
///
/// Confidence fields are `low` / `medium` / `high` when the model
/// supplied them, or a sentinel (`"N/A"`) when it did not. Fields stay
/// plain strings so sentinel and extracted values flow through the same
/// row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// Digits printed beneath the barcode symbol.
    pub barcode_number: String,
    /// Confidence for the barcode reading: low, medium, or high.
    pub barcode_confidence: String,
    /// Text inside the EC/EEC oval mark.
    pub oval_text: String,
    /// Confidence for the oval text reading: low, medium, or high.
    pub oval_text_confidence: String,
}

impl ExtractedFields {
    /// The fixed placeholder tuple used when extraction could not be
    /// completed at all.
    pub fn sentinel() -> Self {
        Self {
            barcode_number: NO_RESPONSE.to_string(),
            barcode_confidence: NOT_AVAILABLE.to_string(),
            oval_text: NO_RESPONSE.to_string(),
            oval_text_confidence: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Outcome for a single photo.
///
/// `error` is `None` when the model returned a well-formed structured
/// payload, `Some` when any stage failed and `fields` holds the sentinel
/// tuple instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// Input file name (no directory component).
    pub file_name: String,
    /// Extracted fields, or the sentinel tuple on failure.
    pub fields: ExtractedFields,
    /// Wall-clock time spent on this file, in milliseconds.
    pub duration_ms: u64,
    /// Number of retries consumed before success or giving up.
    pub retries: u8,
    /// The failure that produced a sentinel row, if any.
    pub error: Option<FileError>,
}

impl FileResult {
    /// Build a sentinel-row result for a failed file.
    pub fn fallback(file_name: String, duration_ms: u64, retries: u8, error: FileError) -> Self {
        Self {
            file_name,
            fields: ExtractedFields::sentinel(),
            duration_ms,
            retries,
            error: Some(error),
        }
    }
}

/// Aggregate counters for one batch run.
///
/// `fallback_files` is the sentinel-row count: the number the summary
/// line reports so a run with silently degraded rows is visible at a
/// glance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Qualifying image files found by the scanner.
    pub total_files: usize,
    /// Files whose structured payload decoded cleanly.
    pub extracted_files: usize,
    /// Files that degraded to a sentinel row.
    pub fallback_files: usize,
    /// End-to-end wall-clock time for the run, in milliseconds.
    pub total_duration_ms: u64,
    /// Time spent inside API calls (including retries), in milliseconds.
    pub api_duration_ms: u64,
}

/// Complete output of a batch run: per-file results plus counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One entry per scanned file, in row order.
    pub results: Vec<FileResult>,
    /// Aggregate counters.
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_tuple_matches_fixed_values() {
        let s = ExtractedFields::sentinel();
        assert_eq!(s.barcode_number, "No Response");
        assert_eq!(s.barcode_confidence, "N/A");
        assert_eq!(s.oval_text, "No Response");
        assert_eq!(s.oval_text_confidence, "N/A");
    }

    #[test]
    fn fallback_carries_sentinel_and_error() {
        let r = FileResult::fallback(
            "c.png".into(),
            120,
            3,
            FileError::NoChoices { file: "c.png".into() },
        );
        assert_eq!(r.fields, ExtractedFields::sentinel());
        assert_eq!(r.retries, 3);
        assert!(r.error.is_some());
    }

    #[test]
    fn batch_output_round_trips_through_json() {
        let out = BatchOutput {
            results: vec![FileResult {
                file_name: "a.jpg".into(),
                fields: ExtractedFields {
                    barcode_number: "012345678905".into(),
                    barcode_confidence: "high".into(),
                    oval_text: "UK DE123 EC".into(),
                    oval_text_confidence: "medium".into(),
                },
                duration_ms: 900,
                retries: 0,
                error: None,
            }],
            stats: BatchStats {
                total_files: 1,
                extracted_files: 1,
                fallback_files: 0,
                total_duration_ms: 950,
                api_duration_ms: 900,
            },
        };

        let json = serde_json::to_string_pretty(&out).expect("serialise");
        let back: BatchOutput = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back.results.len(), 1);
        assert_eq!(back.results[0].fields.barcode_number, "012345678905");
        assert_eq!(back.stats.extracted_files, 1);
    }
}
