//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to
//! receive real-time events as the pipeline works through the folder.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a log file, or a GUI
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so callbacks survive being
//! moved across task boundaries even though the batch itself is
//! sequential.
//!
//! # Example
//!
//! ```rust
//! use barcode2xlsx::{BatchProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fallbacks: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_fallback(&self, file_name: &str, _index: usize, _total: usize, error: String) {
//!         self.fallbacks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file_name}: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     fallbacks: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ExtractedFields;
use std::sync::Arc;

/// Called by the pipeline as it processes each photo.
///
/// All methods have default no-op implementations so callers only
/// override what they care about. Files are processed one at a time, so
/// events for a given run arrive in order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any file is processed.
    ///
    /// # Arguments
    /// * `total_files` — number of qualifying image files found
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is encoded and submitted.
    ///
    /// # Arguments
    /// * `file_name` — input file name
    /// * `index`     — 1-indexed position in the batch
    /// * `total`     — total files in the batch
    fn on_file_start(&self, file_name: &str, index: usize, total: usize) {
        let _ = (file_name, index, total);
    }

    /// Called when a file's structured payload decoded cleanly.
    ///
    /// # Arguments
    /// * `fields` — the four extracted values for the row
    fn on_file_complete(
        &self,
        file_name: &str,
        index: usize,
        total: usize,
        fields: &ExtractedFields,
    ) {
        let _ = (file_name, index, total, fields);
    }

    /// Called when a file degraded to a sentinel row.
    ///
    /// # Arguments
    /// * `error` — human-readable description of the failure
    fn on_file_fallback(&self, file_name: &str, index: usize, total: usize, error: String) {
        let _ = (file_name, index, total, error);
    }

    /// Called once after every file has been attempted.
    ///
    /// # Arguments
    /// * `total_files` — files in the batch
    /// * `extracted`   — files that produced a clean row
    fn on_batch_complete(&self, total_files: usize, extracted: usize) {
        let _ = (total_files, extracted);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
