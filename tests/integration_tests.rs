//! Integration tests for sgfdb
//!
//! Each test builds a small index tree on disk and runs the full pipeline.

use sgfdb::actions::{ActionSet, ErrorPolicy};
use sgfdb::config::RunConfig;
use sgfdb::error::{StorageError, StorageResult};
use sgfdb::pipeline::{JobBuilder, RunStatus, RunSummary};
use sgfdb::record::{parse_file, ParseMode};
use sgfdb::storage::{Entry, LocalStorage, Storage};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Sub-directory A: two records with 3 and 5 separators; B: one with none
fn scenario_tree() -> TempDir {
    let root = tempdir().unwrap();
    let a = root.path().join("A");
    let b = root.path().join("B");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    fs::write(a.join("1.sgf"), "(;GM[1];B[aa];W[bb])").unwrap();
    fs::write(a.join("2.sgf"), "(;GM[1];B[aa];W[bb];B[cc];W[dd])").unwrap();
    fs::write(b.join("1.sgf"), "(B[aa])").unwrap();
    root
}

fn wide_tree(dirs: usize, files: usize) -> TempDir {
    let root = tempdir().unwrap();
    for d in 0..dirs {
        let dir = root.path().join(format!("{:02}", d));
        fs::create_dir(&dir).unwrap();
        for f in 0..files {
            fs::write(dir.join(format!("{}.sgf", f)), "(;SZ[19];B[aa];W[bb])").unwrap();
        }
    }
    root
}

async fn run(config: RunConfig) -> RunSummary {
    JobBuilder::new(config, Arc::new(LocalStorage::new()))
        .run()
        .await
        .unwrap()
}

/// Local storage whose listing of one sub-directory always fails
struct BrokenListing(&'static str);

impl Storage for BrokenListing {
    fn list_entries(&self, path: &Path) -> StorageResult<Vec<Entry>> {
        if path.ends_with(self.0) {
            return Err(StorageError::EnumerationFailed {
                path: path.to_path_buf(),
                reason: "I/O error".into(),
            });
        }
        LocalStorage.list_entries(path)
    }

    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        LocalStorage.read_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        LocalStorage.create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        LocalStorage.write_file(path, contents)
    }
}

/// Local storage with slow file reads
struct SlowReads(Duration);

impl Storage for SlowReads {
    fn list_entries(&self, path: &Path) -> StorageResult<Vec<Entry>> {
        LocalStorage.list_entries(path)
    }

    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        std::thread::sleep(self.0);
        LocalStorage.read_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        LocalStorage.create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        LocalStorage.write_file(path, contents)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_totals() {
    let root = scenario_tree();
    let summary = run(RunConfig::new(root.path(), ActionSet::Count)).await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.totals.directories, 2);
    assert_eq!(summary.totals.stats.files, 3);
    assert_eq!(summary.totals.stats.moves, 8);
    assert_eq!(summary.declared, 2);
    assert_eq!(summary.dispatched, 2);
    assert!(!summary.accounting_mismatch);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_totals_equal_sum_of_directories() {
    let root = wide_tree(12, 3);
    let summary = run(RunConfig::new(root.path(), ActionSet::Count)).await;

    let files: u64 = summary.reports.iter().map(|r| r.stats.files).sum();
    let moves: u64 = summary.reports.iter().map(|r| r.stats.moves).sum();
    assert_eq!(files, summary.totals.stats.files);
    assert_eq!(moves, summary.totals.stats.moves);
    assert_eq!(summary.totals.stats.files, 36);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_serialized_run_reports_in_ordinal_order() {
    let root = wide_tree(8, 2);

    let mut config = RunConfig::new(root.path(), ActionSet::Count);
    config.enable_parallel = false;
    config.max_concurrent = sgfdb::config::effective_concurrency(false, 0, 16);
    assert_eq!(config.max_concurrent, 1);

    let serial = run(config).await;
    let ordinals: Vec<_> = serial.reports.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, (0..8).collect::<Vec<_>>());
    assert_eq!(serial.peak_in_flight, 1);

    // Same reports and totals as a parallel run, once sorted
    let parallel = run(RunConfig::new(root.path(), ActionSet::Count)).await;
    let mut reports = parallel.reports.clone();
    reports.sort_by_key(|r| r.ordinal);
    assert_eq!(reports, serial.reports);
    assert_eq!(parallel.totals, serial.totals);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_in_flight_never_exceeds_limit() {
    let root = wide_tree(30, 4);
    for max in [1, 2, 3, 7] {
        let mut config = RunConfig::new(root.path(), ActionSet::Report);
        config.max_concurrent = max;
        let summary = run(config).await;

        assert!(summary.peak_in_flight >= 1);
        assert!(
            summary.peak_in_flight <= max,
            "peak {} over limit {}",
            summary.peak_in_flight,
            max
        );
        assert_eq!(summary.totals.directories, 30);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listing_failure_does_not_stop_siblings() {
    let root = scenario_tree();
    let builder = JobBuilder::new(
        RunConfig::new(root.path(), ActionSet::Count),
        Arc::new(BrokenListing("B")),
    );
    let summary = builder.run().await.unwrap();

    assert_eq!(summary.status, RunStatus::CompletedWithErrors);
    assert_eq!(summary.totals.directories, 2);
    assert_eq!(summary.totals.failed_directories, 1);
    assert_eq!(summary.totals.stats.files, 2);
    assert_eq!(summary.totals.stats.moves, 8);

    let failed = summary.reports.iter().find(|r| r.name == "B").unwrap();
    assert!(failed
        .failure
        .as_deref()
        .unwrap()
        .starts_with("reading directory: "));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rerun_is_idempotent() {
    let root = wide_tree(6, 5);
    let first = run(RunConfig::new(root.path(), ActionSet::Report)).await;
    let second = run(RunConfig::new(root.path(), ActionSet::Report)).await;
    assert_eq!(first.totals, second.totals);
    assert_eq!(first.totals.stats.board_sizes[&(19, 19)], 30);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_file_limit_skips_rest_without_error() {
    let root = wide_tree(1, 3);
    let mut config = RunConfig::new(root.path(), ActionSet::Count);
    config.file_limit = 1;
    let summary = run(config).await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.reports[0].stats.files, 1);
    assert_eq!(summary.totals.stats.errors, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreadable_root() {
    let root = tempdir().unwrap();
    let summary = run(RunConfig::new(root.path().join("nope"), ActionSet::Count)).await;

    assert_eq!(summary.status, RunStatus::RootUnreadable);
    assert_eq!(summary.status.code(), 2);
    assert!(summary.reports.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hidden_and_excluded_directories_skipped() {
    let root = wide_tree(3, 1);
    fs::create_dir(root.path().join(".cache")).unwrap();
    fs::write(root.path().join(".cache").join("x.sgf"), "(;)").unwrap();
    fs::write(root.path().join("readme.sgf"), "(;)").unwrap();

    let mut config = RunConfig::new(root.path(), ActionSet::Count);
    config.exclude_patterns = vec![regex::Regex::new("^01$").unwrap()];
    let summary = run(config).await;

    let mut names: Vec<_> = summary.reports.iter().map(|r| r.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["00", "02"]);
    assert_eq!(summary.declared, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rewrite_mirrors_tree() {
    let root = scenario_tree();
    let out = tempdir().unwrap();

    let mut config = RunConfig::new(root.path(), ActionSet::Rewrite);
    config.output_root = Some(out.path().to_path_buf());
    let summary = run(config).await;

    // B/1.sgf has no nodes and is not written
    assert_eq!(summary.totals.stats.written, 2);
    assert!(summary.totals.stats.errors >= 1);
    assert_eq!(summary.status, RunStatus::CompletedWithErrors);

    let written = fs::read(out.path().join("A").join("1.sgf")).unwrap();
    assert_eq!(written, b"(;GM[1]\n;B[aa];W[bb])\n");
    let rewritten = fs::read(out.path().join("A").join("2.sgf")).unwrap();
    let (doc, errors) = parse_file("2.sgf", &rewritten, ParseMode::standard(), 0);
    assert!(errors.is_empty());
    assert_eq!(doc.move_count(), 4);
    assert!(!out.path().join("B").join("1.sgf").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_before_run_withholds_everything() {
    let root = wide_tree(4, 1);
    let builder = JobBuilder::new(
        RunConfig::new(root.path(), ActionSet::Count),
        Arc::new(LocalStorage::new()),
    );
    builder.shutdown_flag().store(true, Ordering::SeqCst);
    let summary = builder.run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.status.code(), 3);
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.withheld, 4);
    assert_eq!(summary.totals.directories, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_withdraws_queued_jobs_and_drains_workers() {
    let root = wide_tree(40, 1);
    let mut config = RunConfig::new(root.path(), ActionSet::Count);
    config.max_concurrent = 1;
    config.timeout = Some(Duration::from_millis(100));

    let builder = JobBuilder::new(config, Arc::new(SlowReads(Duration::from_millis(25))));
    let summary = builder.run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.declared, 40);
    assert!(summary.dispatched >= 1);
    assert!(summary.cancelled > 0);
    assert_eq!(summary.dispatched + summary.cancelled, 40);
    assert!(!summary.accounting_mismatch);

    // Every dispatched worker finished and was counted
    assert_eq!(summary.totals.directories, summary.dispatched as u64);
    assert_eq!(summary.totals.stats.files, summary.dispatched as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_continue_policy_still_rewrites_file_with_errors() {
    let root = tempdir().unwrap();
    let a = root.path().join("A");
    fs::create_dir(&a).unwrap();
    fs::write(a.join("off.sgf"), "(;SZ[9];B[jj])").unwrap();
    let out = tempdir().unwrap();

    let mut config = RunConfig::new(root.path(), ActionSet::Rewrite);
    config.output_root = Some(out.path().to_path_buf());
    config.error_policy = ErrorPolicy::Continue;
    let summary = run(config).await;

    assert_eq!(summary.status, RunStatus::CompletedWithErrors);
    assert_eq!(summary.totals.failed_directories, 0);
    assert_eq!(summary.totals.stats.files, 1);
    assert_eq!(summary.totals.stats.errors, 1);
    assert_eq!(summary.totals.stats.written, 1);

    let written = fs::read(out.path().join("A").join("off.sgf")).unwrap();
    assert_eq!(written, b"(;SZ[9]\n;B[jj])\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rewrite_keeps_non_utf8_bytes() {
    let root = tempdir().unwrap();
    let a = root.path().join("A");
    fs::create_dir(&a).unwrap();
    fs::write(a.join("latin1.sgf"), b"(;CA[ISO-8859-1]PW[G\xf6tz];B[aa])").unwrap();
    let out = tempdir().unwrap();

    let mut config = RunConfig::new(root.path(), ActionSet::Rewrite);
    config.output_root = Some(out.path().to_path_buf());
    let summary = run(config).await;

    assert_eq!(summary.status, RunStatus::Success);
    let written = fs::read(out.path().join("A").join("latin1.sgf")).unwrap();
    assert_eq!(written, b"(;CA[ISO-8859-1]PW[G\xf6tz]\n;B[aa])\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deeply_nested_record_fails_only_that_file() {
    let root = scenario_tree();
    fs::write(root.path().join("A").join("3.sgf"), vec![b'('; 2_000_000]).unwrap();

    let summary = run(RunConfig::new(root.path(), ActionSet::Report)).await;

    assert_eq!(summary.status, RunStatus::CompletedWithErrors);
    assert_eq!(summary.totals.directories, 2);
    assert_eq!(summary.totals.failed_directories, 0);
    let a = summary.reports.iter().find(|r| r.name == "A").unwrap();
    assert_eq!(a.stats.files, 3);
    assert_eq!(a.stats.moves, 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_concurrency_run() {
    let root = wide_tree(10, 1);
    let mut config = RunConfig::new(root.path(), ActionSet::Count);
    config.max_concurrent = 2;
    config.report_concurrency = true;

    let builder = JobBuilder::new(config, Arc::new(LocalStorage::new()));
    let counters = builder.counters();
    let summary = builder.run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    assert!(summary.peak_in_flight <= 2);
    assert_eq!(counters.completed.load(Ordering::Relaxed), 10);
}
