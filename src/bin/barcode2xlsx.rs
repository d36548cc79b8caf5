//! CLI binary for barcode2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, renders per-file progress, and prints a summary
//! naming the output workbook.

use anyhow::{Context, Result};
use barcode2xlsx::{
    extract_to_file, BatchProgressCallback, ExtractedFields, ExtractionConfig, ProgressCallback,
    DEFAULT_ENDPOINT, DEFAULT_MODEL,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-file
/// log lines using [indicatif].
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-file wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning folder…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, file_name: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(file_name)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} photos…"))
        ));
    }

    fn on_file_start(&self, file_name: &str, _index: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(file_name.to_string(), Instant::now());
        self.bar.set_message(file_name.to_string());
    }

    fn on_file_complete(
        &self,
        file_name: &str,
        index: usize,
        total: usize,
        fields: &ExtractedFields,
    ) {
        let secs = self.elapsed_secs(file_name);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<24}  {}  {}",
            green("✓"),
            index,
            total,
            file_name,
            dim(&format!(
                "{} ({})",
                fields.barcode_number, fields.barcode_confidence
            )),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_fallback(&self, file_name: &str, index: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(file_name);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<24}  {}  {}",
            red("✗"),
            index,
            total,
            file_name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, extracted: usize) {
        let fallback = total_files.saturating_sub(extracted);
        self.bar.finish_and_clear();

        if fallback == 0 {
            eprintln!(
                "{} {} photos extracted cleanly",
                green("✔"),
                bold(&extracted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} photos extracted  ({} sentinel rows)",
                if extracted == 0 { red("✘") } else { cyan("⚠") },
                bold(&extracted.to_string()),
                total_files,
                red(&fallback.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic run (workbook lands next to the current directory)
  barcode2xlsx ./photos

  # Explicit output path
  barcode2xlsx ./photos -o results/batch_2024.xlsx

  # Use a different vision model
  barcode2xlsx --model gpt-4o ./photos

  # OpenAI-compatible gateway
  barcode2xlsx --endpoint http://localhost:4000/v1/chat/completions ./photos

  # Structured JSON of the whole run on stdout
  barcode2xlsx --json ./photos > run.json

OUTPUT:
  One sheet named "Extraction Results" with the header
    File Name | Barcode Number | Barcode Confidence | Oval Text | Oval Text Confidence
  and exactly one row per .jpeg/.jpg/.png file in the input folder.
  A photo that cannot be read or extracted gets the sentinel row
    "No Response" / "N/A" / "No Response" / "N/A"
  and the batch carries on.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY             Bearer credential for the endpoint (required)
  BARCODE2XLSX_OUTPUT        Default output workbook path
  BARCODE2XLSX_MODEL         Override model ID
  BARCODE2XLSX_ENDPOINT      Override endpoint URL

SETUP:
  1. Set API key:  export OPENAI_API_KEY=sk-...
  2. Extract:      barcode2xlsx ./photos -o results.xlsx
"#;

/// Extract barcode numbers and EEC oval marks from packaging photos.
#[derive(Parser, Debug)]
#[command(
    name = "barcode2xlsx",
    version,
    about = "Extract barcode numbers and EEC oval marks from packaging photos using Vision LLMs",
    long_about = "Batch-process a folder of packaging photos: each image is sent to a \
vision-capable chat-completion endpoint which reads the barcode digits and the text inside \
the regulatory EC/EEC oval mark, with a confidence level for each. Results land in an Excel \
workbook, one row per photo.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing packaging photos (.jpeg/.jpg/.png).
    input_dir: PathBuf,

    /// Write the results workbook to this path (overwrites).
    #[arg(
        short,
        long,
        env = "BARCODE2XLSX_OUTPUT",
        default_value = "barcode_extraction_results.xlsx"
    )]
    output: PathBuf,

    /// Vision model ID.
    #[arg(long, env = "BARCODE2XLSX_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Chat-completion endpoint URL (any OpenAI-compatible gateway).
    #[arg(long, env = "BARCODE2XLSX_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "BARCODE2XLSX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max model output tokens per photo.
    #[arg(long, env = "BARCODE2XLSX_MAX_TOKENS", default_value_t = 500)]
    max_tokens: usize,

    /// Retries per photo on transient API failure.
    #[arg(long, env = "BARCODE2XLSX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "BARCODE2XLSX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "BARCODE2XLSX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print the full run as JSON on stdout instead of the summary.
    #[arg(long, env = "BARCODE2XLSX_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "BARCODE2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BARCODE2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BARCODE2XLSX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli, show_progress).await?;

    // ── Run the batch ────────────────────────────────────────────────────
    let output = extract_to_file(&cli.input_dir, &cli.output, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    // Summary line (the callback already printed the per-file log).
    if !cli.quiet {
        eprintln!(
            "{}  {}/{} rows  {} sentinel  {}ms  →  {}",
            if output.stats.fallback_files == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.extracted_files,
            output.stats.total_files,
            output.stats.fallback_files,
            output.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, show_progress: bool) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {path:?}"))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    if show_progress {
        let cb = CliProgressCallback::new();
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    builder.build().context("Invalid configuration")
}
