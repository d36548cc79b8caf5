//! Batch entry points: drive the pipeline over a folder of photos.
//!
//! ## Why sequential?
//!
//! One photo is encoded, submitted, and recorded before the next begins.
//! The batch is a personal-utility workload measured in dozens of files,
//! and sequential order keeps the output table aligned with the folder
//! listing with no coordination at all. Each request still carries an
//! explicit timeout, so one unresponsive call cannot hang the run.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{BatchOutput, BatchStats, FileResult};
use crate::pipeline::{client, encode, record, scan};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Extract barcodes and oval marks from every qualifying image in
/// `input_dir`.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_dir` — directory containing `.jpeg`/`.jpg`/`.png` files
/// * `config`    — extraction configuration
///
/// # Returns
/// `Ok(BatchOutput)` with exactly one [`FileResult`] per qualifying
/// file, even if some (or all) of them fell back to sentinel rows
/// (check `output.stats.fallback_files`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors:
/// - Input directory missing, unreadable, or not a directory
/// - No API credential configured (and at least one file to process)
pub async fn extract(
    input_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    let total_start = Instant::now();
    let input_dir = input_dir.as_ref();
    info!("Starting extraction: {}", input_dir.display());

    // ── Step 1: Scan the input directory ─────────────────────────────────
    let files = scan::scan_images(input_dir)?;
    let total = files.len();
    info!("Found {} image files", total);

    // An empty folder produces a header-only workbook and needs neither
    // a credential nor an HTTP client.
    if files.is_empty() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_start(0);
            cb.on_batch_complete(0, 0);
        }
        return Ok(BatchOutput {
            results: Vec::new(),
            stats: BatchStats {
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                ..BatchStats::default()
            },
        });
    }

    // ── Step 2: Resolve credential and build the HTTP client ─────────────
    let api_key = resolve_api_key(config)?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.api_timeout_secs))
        .build()
        .map_err(|e| ExtractError::Internal(format!("Failed to build HTTP client: {e}")))?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Step 3: Process files one at a time ──────────────────────────────
    let mut results: Vec<FileResult> = Vec::with_capacity(total);
    let mut api_duration_ms: u64 = 0;

    for (i, path) in files.iter().enumerate() {
        let index = i + 1;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!("Processing {} ({}/{})", file_name, index, total);
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(&file_name, index, total);
        }

        let result = match encode::encode_image(path) {
            Ok(image) => {
                let call_start = Instant::now();
                let result =
                    client::process_file(&client, &api_key, &file_name, &image, config).await;
                api_duration_ms += call_start.elapsed().as_millis() as u64;
                result
            }
            // An unreadable photo aborts only that file.
            Err(e) => FileResult::fallback(file_name.clone(), 0, 0, e),
        };

        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_file_complete(&file_name, index, total, &result.fields),
                Some(e) => cb.on_file_fallback(&file_name, index, total, e.to_string()),
            }
        }

        results.push(result);
    }

    // ── Step 4: Compute stats ────────────────────────────────────────────
    let extracted = results.iter().filter(|r| r.error.is_none()).count();
    let fallback = results.len() - extracted;
    debug_assert_eq!(results.len(), total, "one row per scanned file");

    let stats = BatchStats {
        total_files: total,
        extracted_files: extracted,
        fallback_files: fallback,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        api_duration_ms,
    };

    info!(
        "Extraction complete: {}/{} files clean, {} sentinel rows, {}ms total",
        extracted, total, fallback, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, extracted);
    }

    Ok(BatchOutput { results, stats })
}

/// Extract a folder and write the results workbook to `output_path`.
///
/// The workbook overwrites any existing file at that path (write is
/// temp-file + rename, so a crash never leaves a truncated workbook).
/// Returns the full [`BatchOutput`] so callers can print a summary or
/// serialise the run.
pub async fn extract_to_file(
    input_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    let output = extract(input_dir, config).await?;
    record::save_workbook(&output.results, output_path.as_ref())?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(input_dir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the bearer credential, from most-specific to least-specific:
///
/// 1. `config.api_key` — the caller supplied it programmatically.
/// 2. `OPENAI_API_KEY` — the conventional environment variable.
///
/// The credential is required only once at least one file qualifies;
/// [`extract`] short-circuits empty folders before calling this.
fn resolve_api_key(config: &ExtractionConfig) -> Result<String, ExtractError> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            debug!("Using credential from OPENAI_API_KEY");
            Ok(key)
        }
        _ => Err(ExtractError::CredentialMissing),
    }
}
