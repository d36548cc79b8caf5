//! End-to-end integration tests for barcode2xlsx.
//!
//! Live tests use real photos in `./test_cases/` and make real API
//! calls. They are gated behind the `E2E_ENABLED` environment variable
//! (plus `OPENAI_API_KEY`) so they do not run in CI unless explicitly
//! requested.
//!
//! Run with:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e -- --nocapture
//!
//! The remaining tests are structural: they exercise the scanner, the
//! sentinel fallback path (against an unroutable local endpoint), and
//! the workbook writer without any credentials or network.

use barcode2xlsx::{
    extract, extract_to_file, BatchProgressCallback, ExtractionConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED and OPENAI_API_KEY are set *and*
/// the photo directory exists.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if std::env::var("OPENAI_API_KEY").is_err() {
            println!("SKIP — OPENAI_API_KEY not set");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test photos not found: {}", p.display());
            println!("       Drop a few packaging photos into test_cases/photos/");
            return;
        }
        p
    }};
}

fn write_fixture_photo(dir: &std::path::Path, name: &str) {
    // A real decode never happens in the fallback tests; any bytes do.
    std::fs::write(dir.join(name), [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).expect("write fixture");
}

// ── Structural tests (no network success required, always run) ───────────────

/// Every scanned photo must yield exactly one row even when the endpoint
/// is unreachable: the fallback path produces the sentinel tuple and the
/// batch keeps going.
#[tokio::test]
async fn unreachable_endpoint_degrades_to_sentinel_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "a.jpg");
    write_fixture_photo(dir.path(), "b.png");
    std::fs::write(dir.path().join("notes.txt"), b"not a photo").expect("write");

    // Nothing listens on port 9; the connection fails immediately.
    let config = ExtractionConfig::builder()
        .endpoint("http://127.0.0.1:9/v1/chat/completions")
        .api_key("sk-test")
        .max_retries(0)
        .api_timeout_secs(5)
        .build()
        .expect("valid config");

    let output = extract(dir.path(), &config).await.expect("batch must not abort");

    assert_eq!(output.results.len(), 2, "one row per image file");
    assert_eq!(output.stats.fallback_files, 2);
    assert_eq!(output.stats.extracted_files, 0);

    for result in &output.results {
        assert_eq!(result.fields.barcode_number, "No Response");
        assert_eq!(result.fields.barcode_confidence, "N/A");
        assert_eq!(result.fields.oval_text, "No Response");
        assert_eq!(result.fields.oval_text_confidence, "N/A");
        assert!(result.error.is_some(), "fallback must record its cause");
    }

    // Row order follows sorted file names.
    assert_eq!(output.results[0].file_name, "a.jpg");
    assert_eq!(output.results[1].file_name, "b.png");
}

/// The full to-file path with an unreachable endpoint: workbook written,
/// ZIP container magic present, sentinel rows recorded.
#[tokio::test]
async fn unreachable_endpoint_still_writes_workbook() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "c.png");
    let out_path = dir.path().join("results.xlsx");

    let config = ExtractionConfig::builder()
        .endpoint("http://127.0.0.1:9/v1/chat/completions")
        .api_key("sk-test")
        .max_retries(0)
        .api_timeout_secs(5)
        .build()
        .expect("valid config");

    let output = extract_to_file(dir.path(), &out_path, &config)
        .await
        .expect("run must succeed");

    assert_eq!(output.results.len(), 1);
    let bytes = std::fs::read(&out_path).expect("workbook exists");
    assert!(bytes.starts_with(b"PK"), ".xlsx must be a ZIP container");
}

/// Empty folder: header-only workbook, no credential consulted.
#[tokio::test]
async fn empty_folder_produces_header_only_workbook() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_path = dir.path().join("empty.xlsx");

    // Deliberately no api_key: the empty-folder path must not need one.
    let config = ExtractionConfig::default();

    let output = extract_to_file(dir.path(), &out_path, &config)
        .await
        .expect("empty run must succeed");

    assert!(output.results.is_empty());
    assert_eq!(output.stats.total_files, 0);
    assert!(out_path.exists());
}

/// Two runs over the same unchanged folder produce identical tables.
#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "zz.jpg");
    write_fixture_photo(dir.path(), "aa.jpg");

    let config = ExtractionConfig::builder()
        .endpoint("http://127.0.0.1:9/v1/chat/completions")
        .api_key("sk-test")
        .max_retries(0)
        .build()
        .expect("valid config");

    let first = extract(dir.path(), &config).await.expect("first run");
    let second = extract(dir.path(), &config).await.expect("second run");

    let names =
        |o: &barcode2xlsx::BatchOutput| -> Vec<String> {
            o.results.iter().map(|r| r.file_name.clone()).collect()
        };
    assert_eq!(names(&first), vec!["aa.jpg", "zz.jpg"]);
    assert_eq!(names(&first), names(&second));
}

/// A callback must survive being moved into a spawned task: the trait
/// object the library stores is `Send + Sync` and error strings are
/// owned.
#[tokio::test]
async fn callback_is_send_through_tokio_spawn() {
    use std::sync::Mutex;

    struct ErrorLogger {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl BatchProgressCallback for ErrorLogger {
        fn on_file_fallback(&self, _file: &str, _index: usize, _total: usize, error: String) {
            self.log.lock().unwrap().push(error);
        }
    }

    let logger = Arc::new(ErrorLogger {
        log: Arc::new(Mutex::new(vec![])),
    });
    let log_ref = Arc::clone(&logger.log);

    let cb: Arc<dyn BatchProgressCallback> = logger as Arc<dyn BatchProgressCallback>;

    tokio::spawn(async move {
        cb.on_file_fallback("a.jpg", 1, 5, "timed out after 60s".to_string());
    })
    .await
    .expect("spawn must succeed");

    let captured = log_ref.lock().unwrap().clone();
    assert_eq!(captured, vec!["timed out after 60s"]);
}

/// The fallback path fires the callback with the row position intact.
#[tokio::test]
async fn fallback_events_carry_batch_positions() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracking {
        started: AtomicUsize,
        fallbacks: AtomicUsize,
        batch_total: AtomicUsize,
    }

    impl BatchProgressCallback for Tracking {
        fn on_batch_start(&self, total_files: usize) {
            self.batch_total.store(total_files, Ordering::SeqCst);
        }
        fn on_file_start(&self, _f: &str, _i: usize, _t: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_file_fallback(&self, _f: &str, _i: usize, _t: usize, _e: String) {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "a.jpg");
    write_fixture_photo(dir.path(), "b.jpg");

    let tracker = Arc::new(Tracking {
        started: AtomicUsize::new(0),
        fallbacks: AtomicUsize::new(0),
        batch_total: AtomicUsize::new(0),
    });

    let config = ExtractionConfig::builder()
        .endpoint("http://127.0.0.1:9/v1/chat/completions")
        .api_key("sk-test")
        .max_retries(0)
        .progress_callback(Arc::clone(&tracker) as Arc<dyn BatchProgressCallback>)
        .build()
        .expect("valid config");

    extract(dir.path(), &config).await.expect("run");

    assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.started.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 2);
}

// ── Stub-endpoint tests (local TCP, deterministic, always run) ───────────────

/// Spawn a one-shot HTTP stub on a random local port that answers every
/// request with the given status line and body. Returns the endpoint URL.
///
/// Plain tokio is enough here: the client sends one small JSON POST per
/// photo and a fixed canned response exercises the decode paths exactly.
async fn spawn_stub_endpoint(status_line: &'static str, body: String) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                // Read headers, then the declared body length, so the
                // client never sees a reset before its upload finishes.
                let mut buf = vec![0u8; 1 << 20];
                let mut read_total = 0usize;
                let (header_end, content_length) = loop {
                    if read_total == buf.len() {
                        return;
                    }
                    match socket.read(&mut buf[read_total..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read_total += n,
                    }
                    if let Some(pos) = find_subsequence(&buf[..read_total], b"\r\n\r\n") {
                        let headers = String::from_utf8_lossy(&buf[..pos]);
                        let len = headers
                            .lines()
                            .find_map(|line| {
                                let (name, value) = line.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        break (pos + 4, len);
                    }
                };
                while read_total < header_end + content_length {
                    match socket.read(&mut buf[read_total..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => read_total += n,
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/v1/chat/completions")
}

/// A well-formed structured response: the row's four fields must equal
/// exactly the decoded fields.
#[tokio::test]
async fn well_formed_response_fields_land_in_the_row() {
    let arguments = serde_json::json!({
        "barcode_number": "012345678905",
        "barcode_confidence": "high",
        "oval_text": "UK DE123 EC",
        "oval_text_confidence": "medium"
    })
    .to_string();
    let body = serde_json::json!({
        "choices": [{
            "message": {
                "function_call": {
                    "name": "extract_barcode_and_text",
                    "arguments": arguments
                }
            }
        }]
    })
    .to_string();
    let endpoint = spawn_stub_endpoint("200 OK", body).await;

    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "a.jpg");

    let config = ExtractionConfig::builder()
        .endpoint(endpoint)
        .api_key("sk-test")
        .max_retries(0)
        .build()
        .expect("valid config");

    let output = extract(dir.path(), &config).await.expect("run");

    assert_eq!(output.stats.extracted_files, 1);
    assert_eq!(output.stats.fallback_files, 0);
    let result = &output.results[0];
    assert!(result.error.is_none());
    assert_eq!(result.fields.barcode_number, "012345678905");
    assert_eq!(result.fields.barcode_confidence, "high");
    assert_eq!(result.fields.oval_text, "UK DE123 EC");
    assert_eq!(result.fields.oval_text_confidence, "medium");
}

/// HTTP 500 from the endpoint: the row is the sentinel tuple and the
/// run succeeds.
#[tokio::test]
async fn http_500_produces_sentinel_row() {
    let endpoint = spawn_stub_endpoint("500 Internal Server Error", String::new()).await;

    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "c.png");

    let config = ExtractionConfig::builder()
        .endpoint(endpoint)
        .api_key("sk-test")
        .max_retries(0)
        .build()
        .expect("valid config");

    let output = extract(dir.path(), &config).await.expect("run must not abort");

    assert_eq!(output.results.len(), 1);
    let result = &output.results[0];
    assert_eq!(result.file_name, "c.png");
    assert_eq!(result.fields.barcode_number, "No Response");
    assert_eq!(result.fields.barcode_confidence, "N/A");
    assert_eq!(result.fields.oval_text, "No Response");
    assert_eq!(result.fields.oval_text_confidence, "N/A");
    assert!(result.error.is_some());
}

/// A non-retryable status (401) must fail the file fast, still as a
/// sentinel row.
#[tokio::test]
async fn http_401_fails_fast_to_sentinel_row() {
    let endpoint = spawn_stub_endpoint(
        "401 Unauthorized",
        r#"{"error":{"message":"bad key"}}"#.to_string(),
    )
    .await;

    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "a.jpg");

    // High retry budget: a 401 must not consume it.
    let config = ExtractionConfig::builder()
        .endpoint(endpoint)
        .api_key("sk-wrong")
        .max_retries(5)
        .build()
        .expect("valid config");

    let output = extract(dir.path(), &config).await.expect("run");
    let result = &output.results[0];
    assert!(result.error.is_some());
    assert_eq!(result.retries, 0, "401 must not be retried");
    assert_eq!(result.fields.barcode_number, "No Response");
}

/// A 200 whose choice carries no function call degrades to the sentinel
/// row as well.
#[tokio::test]
async fn plain_text_answer_degrades_to_sentinel_row() {
    let body = serde_json::json!({
        "choices": [{ "message": { "content": "I cannot see a barcode." } }]
    })
    .to_string();
    let endpoint = spawn_stub_endpoint("200 OK", body).await;

    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_photo(dir.path(), "b.jpeg");

    let config = ExtractionConfig::builder()
        .endpoint(endpoint)
        .api_key("sk-test")
        .max_retries(0)
        .build()
        .expect("valid config");

    let output = extract(dir.path(), &config).await.expect("run");
    let result = &output.results[0];
    assert_eq!(result.fields.barcode_number, "No Response");
    assert!(result.error.is_some());
}

// ── Live e2e tests (need photos + API key) ───────────────────────────────────

/// Full live run over test_cases/photos/: one row per photo, confidence
/// values within the contract, workbook written.
#[tokio::test]
async fn test_live_extraction_batch() {
    let photos = e2e_skip_unless_ready!(test_cases_dir().join("photos"));
    let out_path = output_dir().join("live_results.xlsx");

    let config = ExtractionConfig::builder()
        .max_retries(2)
        .build()
        .expect("valid config");

    let output = extract_to_file(&photos, &out_path, &config)
        .await
        .expect("live extraction should succeed");

    assert!(
        !output.results.is_empty(),
        "photos directory should contain at least one image"
    );
    assert_eq!(
        output.stats.total_files,
        output.results.len(),
        "one row per scanned file"
    );

    for result in &output.results {
        let f = &result.fields;
        if result.error.is_none() {
            assert!(
                ["low", "medium", "high", "N/A"].contains(&f.barcode_confidence.as_str()),
                "{}: unexpected confidence '{}'",
                result.file_name,
                f.barcode_confidence
            );
            assert!(!f.barcode_number.is_empty());
        }
        println!(
            "{}: {} ({}) / {} ({})",
            result.file_name,
            f.barcode_number,
            f.barcode_confidence,
            f.oval_text,
            f.oval_text_confidence
        );
    }

    let bytes = std::fs::read(&out_path).expect("workbook written");
    assert!(bytes.starts_with(b"PK"));
    println!(
        "[live] {} photos, {} clean, {} sentinel → {}",
        output.stats.total_files,
        output.stats.extracted_files,
        output.stats.fallback_files,
        out_path.display()
    );
}

/// Live run must be serialisable to JSON and round-trip back.
#[tokio::test]
async fn test_live_output_json_round_trip() {
    let photos = e2e_skip_unless_ready!(test_cases_dir().join("photos"));

    let config = ExtractionConfig::builder()
        .max_retries(2)
        .build()
        .expect("valid config");

    let output = extract(&photos, &config).await.expect("live extraction");

    let json = serde_json::to_string_pretty(&output).expect("BatchOutput must serialise");
    let back: barcode2xlsx::BatchOutput =
        serde_json::from_str(&json).expect("JSON must deserialise back");
    assert_eq!(back.results.len(), output.results.len());
    assert_eq!(back.stats.total_files, output.stats.total_files);
}
