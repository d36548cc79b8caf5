//! # barcode2xlsx
//!
//! Extract barcode numbers and EEC oval-mark text from packaging photos
//! using Vision Language Models (VLMs), and record the results in an
//! Excel workbook.
//!
//! ## Why this crate?
//!
//! Classic barcode decoders need a clean, frontal scan of the symbol.
//! Photos of real meat packaging are crumpled, glossy, and askew, and the
//! regulatory EC/EEC oval stamp next to the barcode is plain printed text
//! that no symbol decoder reads at all. A vision model reads both the way
//! a human would: the digits printed under the bars plus the text inside
//! the oval, each with a stated confidence level.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo folder
//!  │
//!  ├─ 1. Scan    list *.jpeg / *.jpg / *.png (case-insensitive, no recursion)
//!  ├─ 2. Encode  image bytes → base64 data URI
//!  ├─ 3. Client  chat-completion call with a forced function schema,
//!  │             bounded timeout, retry with exponential backoff
//!  └─ 4. Record  one row per photo → "Extraction Results" sheet (.xlsx)
//! ```
//!
//! Files are processed strictly one at a time. A photo that cannot be read
//! or extracted never aborts the batch: it produces a sentinel row
//! (`"No Response"` / `"N/A"`) and the run continues. Exactly one row is
//! written per qualifying input file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use barcode2xlsx::{extract_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from OPENAI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract_to_file("./photos", "results.xlsx", &config).await?;
//!     eprintln!(
//!         "{} extracted, {} fell back to sentinel rows",
//!         output.stats.extracted_files, output.stats.fallback_files
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `barcode2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! barcode2xlsx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::{ExtractError, FileError};
pub use extract::{extract, extract_sync, extract_to_file};
pub use output::{BatchOutput, BatchStats, ExtractedFields, FileResult};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
