//! Integration tests for ruian-sync
//!
//! These tests run whole imports against archives served by an in-process
//! HTTP server.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};
use encoding_rs::WINDOWS_1250;
use parking_lot::Mutex;
use ruian_sync::{
    config::ImportConfig,
    import::{ImportController, ImportControllerBuilder, ImportError, TargetPeriod},
    recovery::INTERRUPTED_MESSAGE,
    store::{full_address, AddressStore, ImportRunLog, RunState, SledStore},
    suggest::{suggest_numbers_for_street, suggest_streets},
};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const HEADER: &str = "Kód ADM;Kód obce;Název obce;Kód části obce;Název části obce;Název ulice;\
                      Číslo domovní;Číslo orientační;Číslo orientační písmeno;PSČ;Souřadnice Y;Souřadnice X";

/// One source row in column order of [`HEADER`]
struct Row<'a> {
    number_code: &'a str,
    town_code: &'a str,
    town_name: &'a str,
    street: &'a str,
    house_number: &'a str,
    x: &'a str,
    y: &'a str,
}

impl Row<'_> {
    fn line(&self) -> String {
        format!(
            "{};554782;{};{};{};{};{};;;11000;{};{}",
            self.number_code,
            self.town_name,
            self.town_code,
            self.town_name,
            self.street,
            self.house_number,
            self.y,
            self.x
        )
    }
}

fn row<'a>(number_code: &'a str, town_code: &'a str, town_name: &'a str, street: &'a str) -> Row<'a> {
    Row {
        number_code,
        town_code,
        town_name,
        street,
        house_number: "12",
        x: "1043129.70",
        y: "743104.50",
    }
}

fn csv_file(rows: &[Row<'_>]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    text.push_str("\r\n");
    for row in rows {
        text.push_str(&row.line());
        text.push_str("\r\n");
    }
    let (bytes, _, had_errors) = WINDOWS_1250.encode(&text);
    assert!(!had_errors);
    bytes.into_owned()
}

fn zip_archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

// ============================================================================
// Test upstream
// ============================================================================

#[derive(Clone, Default)]
struct Upstream {
    /// Served body; `None` answers with HTTP 500
    archive: Arc<Mutex<Option<Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Upstream {
    fn serve(&self, body: Vec<u8>) {
        *self.archive.lock() = Some(body);
    }
}

async fn serve_archive(State(upstream): State<Upstream>, Path(file): Path<String>) -> Response {
    upstream.requests.lock().push(file);
    match upstream.archive.lock().clone() {
        Some(bytes) => (StatusCode::OK, bytes).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Start the upstream on an ephemeral port and return its base URL
async fn start_upstream(upstream: Upstream) -> String {
    let app = Router::new()
        .route("/csv/:file", get(serve_archive))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/csv", addr)
}

struct Harness {
    _dir: TempDir,
    store: Arc<dyn AddressStore>,
    upstream: Upstream,
    base_url: String,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn AddressStore> = Arc::new(SledStore::open(dir.path()).unwrap());
        let upstream = Upstream::default();
        let base_url = start_upstream(upstream.clone()).await;
        Self {
            _dir: dir,
            store,
            upstream,
            base_url,
        }
    }

    fn controller(&self) -> ImportController {
        let config = ImportConfig {
            base_url: self.base_url.clone(),
            quiet: true,
            ..ImportConfig::default()
        };
        ImportControllerBuilder::new(self.store.clone())
            .with_config(config)
            .build()
            .unwrap()
    }

    async fn run(&self) -> Result<ImportRunLog, ImportError> {
        self.controller().run_for_period(period()).await
    }
}

fn period() -> TargetPeriod {
    TargetPeriod::for_date(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(), 2)
}

// ============================================================================
// Import runs
// ============================================================================

#[tokio::test]
async fn test_single_row_import() {
    let harness = Harness::new().await;
    let single = Row {
        number_code: "9001",
        town_code: "500123",
        town_name: "Springfield",
        street: "Main St",
        house_number: "12",
        x: "500000",
        y: "1100000",
    };
    harness
        .upstream
        .serve(zip_archive(&[("20260831_OB_500123_ADR.csv", csv_file(&[single]))]));

    let log = harness.run().await.unwrap();

    assert_eq!(log.state, RunState::Done);
    assert_eq!(log.name, "20260831");
    assert_eq!(log.towns.created, 1);
    assert_eq!(log.streets.created, 1);
    assert_eq!(log.numbers.created, 1);
    assert_eq!(log.warnings, 0);
    assert_eq!(log.progress(), "1 / 1 (100%)");
    assert_eq!(
        harness.upstream.requests.lock().as_slice(),
        ["20260831_OB_ADR_csv.zip".to_string()]
    );

    let number = harness.store.find_number(9001).unwrap().unwrap();
    let address = full_address(harness.store.as_ref(), &number).unwrap();
    assert!(address.contains("Main St"));
    assert!(address.contains("12"));
    assert!(address.contains("Springfield"));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let harness = Harness::new().await;
    harness.upstream.serve(zip_archive(&[
        ("a.csv", csv_file(&[row("1", "10", "Alpha", "Main St"), row("2", "10", "Alpha", "Oak Ave")])),
        ("b.csv", csv_file(&[row("3", "20", "Beta", "Main St")])),
    ]));

    let first = harness.run().await.unwrap();
    let stats_after_first = harness.store.stats().unwrap();
    let second = harness.run().await.unwrap();
    let stats_after_second = harness.store.stats().unwrap();

    assert_eq!(first.numbers.created, 3);
    assert_eq!(second.state, RunState::Done);
    assert_eq!(second.towns.created, 0);
    assert_eq!(second.streets.created, 0);
    assert_eq!(second.numbers.created, 0);
    assert_eq!(second.towns.updated, 2);
    assert_eq!(second.streets.updated, 2);
    assert_eq!(second.numbers.updated, 3);
    assert_eq!(stats_after_first.numbers, stats_after_second.numbers);
    assert_eq!(stats_after_first.streets, stats_after_second.streets);
    assert_eq!(stats_after_first.towns, stats_after_second.towns);
    assert_eq!(stats_after_second.runs, 2);
}

#[tokio::test]
async fn test_street_collects_every_town_and_numbers_reference_their_town() {
    let harness = Harness::new().await;
    let rows = [
        row("1", "10", "Alpha", "Main St"),
        row("2", "20", "Beta", "Main St"),
        row("3", "10", "Alpha", "Main St"),
        row("4", "30", "Gamma", "Main St"),
    ];
    harness.upstream.serve(zip_archive(&[
        ("a.csv", csv_file(&rows[..2])),
        ("b.csv", csv_file(&rows[2..])),
    ]));

    harness.run().await.unwrap();

    let street = harness.store.find_street("Main St").unwrap().unwrap();
    let mut codes: Vec<i64> = street
        .town_ids
        .iter()
        .map(|id| harness.store.town(*id).unwrap().unwrap().code)
        .collect();
    codes.sort();
    assert_eq!(codes, vec![10, 20, 30]);

    for row in &rows {
        let number = harness
            .store
            .find_number(row.number_code.parse().unwrap())
            .unwrap()
            .unwrap();
        let town = harness.store.town(number.town_id.unwrap()).unwrap().unwrap();
        assert_eq!(town.code, row.town_code.parse::<i64>().unwrap());
        assert_eq!(number.street_id, Some(street.id));
        assert!((number.lat - 50.086).abs() < 0.01);
        assert!((number.lon - 14.417).abs() < 0.01);
    }
}

#[tokio::test]
async fn test_row_without_number_code_keeps_town_and_street() {
    let harness = Harness::new().await;
    harness
        .upstream
        .serve(zip_archive(&[("a.csv", csv_file(&[row("", "10", "Alpha", "Main St")]))]));

    let log = harness.run().await.unwrap();

    assert_eq!(log.warnings, 0);
    assert_eq!(log.rows, 1);
    let stats = harness.store.stats().unwrap();
    assert_eq!((stats.towns, stats.streets, stats.numbers), (1, 1, 0));
}

#[tokio::test]
async fn test_malformed_number_code_is_a_warning() {
    let harness = Harness::new().await;
    harness.upstream.serve(zip_archive(&[(
        "a.csv",
        csv_file(&[row("90O1", "10", "Alpha", "Main St"), row("9002", "10", "Alpha", "Oak Ave")]),
    )]));

    let log = harness.run().await.unwrap();

    assert_eq!(log.state, RunState::Done);
    assert_eq!(log.warnings, 1);
    assert_eq!(log.numbers.created, 1);
    assert!(harness.store.find_town(10).unwrap().is_some());
    assert!(harness.store.find_street("Main St").unwrap().is_some());
    assert!(harness.store.find_number(9002).unwrap().is_some());
}

#[tokio::test]
async fn test_http_500_fails_the_run() {
    let harness = Harness::new().await;

    let err = harness.run().await.unwrap_err();
    assert!(matches!(err, ImportError::Download(_)), "got {err}");

    let logs = harness.store.logs().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].state, RunState::Failed);
    assert!(logs[0].end_date.is_some());
    let message = logs[0].error_message.as_deref().unwrap();
    assert!(message.contains("500"), "message: {message}");
    assert!(message.len() <= ImportConfig::default().max_error_length);

    let stats = harness.store.stats().unwrap();
    assert_eq!((stats.towns, stats.streets, stats.numbers), (0, 0, 0));
}

#[tokio::test]
async fn test_corrupt_archive_fails_the_run() {
    let harness = Harness::new().await;
    harness.upstream.serve(b"PK\x03\x04 definitely not a zip".to_vec());

    let err = harness.run().await.unwrap_err();
    assert!(matches!(err, ImportError::InvalidArchive(_)), "got {err}");
    assert_eq!(harness.store.logs().unwrap()[0].state, RunState::Failed);
}

#[tokio::test]
async fn test_suggestions_after_import() {
    let harness = Harness::new().await;
    harness.upstream.serve(zip_archive(&[(
        "a.csv",
        csv_file(&[
            row("1", "10", "Alpha", "Žitná"),
            row("2", "10", "Alpha", "Žitomírská"),
            row("3", "10", "Alpha", "Oak Ave"),
        ]),
    )]));
    harness.run().await.unwrap();

    let streets = suggest_streets(harness.store.as_ref(), "žit").unwrap();
    assert_eq!(streets.len(), 2);

    let zitna = streets.iter().find(|s| s.name == "Žitná").unwrap();
    let numbers = suggest_numbers_for_street(harness.store.as_ref(), "1", zitna.id).unwrap();
    assert_eq!(numbers.len(), 1);
    assert_eq!(numbers[0].number, "12");
    assert_eq!(numbers[0].town_name, "Alpha");
    assert_eq!(numbers[0].postal_code, "11000");
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_restart_fails_running_log() {
    let dir = TempDir::new().unwrap();
    let stale_id = {
        let store = SledStore::open(dir.path()).unwrap();
        let mut log = ImportRunLog::started(store.next_log_id().unwrap(), "20260831", Utc::now());
        log.set_file_count(14);
        log.file_done();
        log.rows = 10_000;
        store.save_log(&log).unwrap();
        store.commit().unwrap();
        log.id
    };

    let store: Arc<dyn AddressStore> = Arc::new(SledStore::open(dir.path()).unwrap());
    let _controller = ImportControllerBuilder::new(store.clone())
        .with_quiet(true)
        .build()
        .unwrap();

    let log = store.load_log(stale_id).unwrap().unwrap();
    assert_eq!(log.state, RunState::Failed);
    assert_eq!(log.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
    assert_eq!(log.rows, 10_000);
    assert_eq!(log.files, 1);
    assert_eq!(log.eta(Utc::now()), "");
}
