//! End-to-end tests for the server profiler.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use kmp_profiler::{
    new_shared_profiler, Category, NamedCategories, ProfilerConfig, ServerProfiler,
};

const FAST_FLUSH: Duration = Duration::from_millis(10);

struct TestContext {
    profiler: Arc<ServerProfiler>,
    run_dir: PathBuf,
    _root: tempfile::TempDir,
}

impl TestContext {
    fn new(config: impl FnOnce(ProfilerConfig) -> ProfilerConfig) -> Self {
        let root = tempfile::tempdir().unwrap();
        let names = NamedCategories::new()
            .with_name(1, "HANDSHAKE")
            .with_name(2, "CHAT_SEND");
        let profiler = new_shared_profiler(config(ProfilerConfig::new(root.path())), names);
        let run_dir = profiler.init().unwrap();

        Self {
            profiler,
            run_dir,
            _root: root,
        }
    }

    fn fast() -> Self {
        Self::new(|config| config.with_flush_interval(FAST_FLUSH))
    }

    fn file(&self, name: &str) -> PathBuf {
        self.run_dir.join(format!("{name}.txt"))
    }

    /// Wait until `name` contains exactly `expected`.
    fn wait_for(&self, name: &str, expected: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if std::fs::read_to_string(self.file(name)).ok().as_deref() == Some(expected) {
                return true;
            }
            thread::sleep(FAST_FLUSH);
        }
        false
    }
}

fn parse(contents: &str) -> Vec<(i64, u64)> {
    contents
        .lines()
        .map(|line| {
            let (bucket, count) = line.split_once(' ').unwrap();
            (bucket.parse().unwrap(), count.parse().unwrap())
        })
        .collect()
}

fn mtimes(dir: &Path) -> BTreeMap<PathBuf, SystemTime> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (entry.path(), entry.metadata().unwrap().modified().unwrap())
        })
        .collect()
}

#[test]
fn test_run_directory_layout() {
    let ctx = TestContext::fast();

    let histogram_root = ctx.run_dir.parent().unwrap();
    assert_eq!(histogram_root.file_name().unwrap(), "histogram");

    // YYYY-MM-DD HH:MM:SS
    let stamp = ctx.run_dir.file_name().unwrap().to_str().unwrap();
    assert_eq!(stamp.len(), 19);
    assert_eq!(&stamp[4..5], "-");
    assert_eq!(&stamp[10..11], " ");
    assert_eq!(&stamp[13..14], ":");
}

#[test]
fn test_rounded_latencies_are_bucketed() {
    let ctx = TestContext::fast();

    ctx.profiler.record(1, 100.000, 100.0003);
    ctx.profiler.record(1, 100.000, 105.000);

    assert!(ctx.wait_for("HANDSHAKE", "0 1\n5 1\n"));
}

#[test]
fn test_categories_get_separate_files() {
    let ctx = TestContext::fast();

    ctx.profiler.record(1, 0.0, 3.0);
    ctx.profiler.record(2, 0.0, 8.0);
    ctx.profiler.record(9, 0.0, 8.0);

    assert!(ctx.wait_for("HANDSHAKE", "3 1\n"));
    assert!(ctx.wait_for("CHAT_SEND", "8 1\n"));
    // Unnamed categories fall back to their id.
    assert!(ctx.wait_for("9", "8 1\n"));
}

#[test]
fn test_counts_match_recorded_pairs() {
    let ctx = TestContext::fast();

    let deltas = [4.0, 4.2, 3.6, 10.0, -2.0, 4.0, 10.4];
    for delta in deltas {
        ctx.profiler.record(2, 50.0, 50.0 + delta);
    }
    ctx.profiler.shutdown();

    let contents = std::fs::read_to_string(ctx.file("CHAT_SEND")).unwrap();
    assert_eq!(parse(&contents), vec![(-2, 1), (4, 4), (10, 2)]);
    assert!(!ctx.file("HANDSHAKE").exists());
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    const PRODUCERS: usize = 8;
    const CALLS: usize = 5_000;

    let ctx = TestContext::new(|config| config.with_flush_interval(Duration::from_millis(2)));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let profiler = ctx.profiler.clone();
            thread::spawn(move || {
                for _ in 0..CALLS {
                    profiler.record(1, 10.0, 17.0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = format!("7 {}\n", PRODUCERS * CALLS);
    assert!(ctx.wait_for("HANDSHAKE", &expected));
    assert_eq!(ctx.profiler.dropped_samples(), 0);
}

#[test]
fn test_files_are_strictly_ascending() {
    let ctx = TestContext::fast();

    let mut latency: i64 = 7;
    for _ in 0..500 {
        // Pseudo-random walk over [-20, 200).
        latency = (latency * 31 + 17).rem_euclid(220) - 20;
        ctx.profiler.record(1, 0.0, latency as f64);
    }
    ctx.profiler.shutdown();

    let contents = std::fs::read_to_string(ctx.file("HANDSHAKE")).unwrap();
    assert!(contents.ends_with('\n'));
    let rows = parse(&contents);
    assert!(rows.windows(2).all(|pair| pair[0].0 < pair[1].0));
    assert_eq!(rows.iter().map(|&(_, count)| count).sum::<u64>(), 500);
}

#[test]
fn test_idle_cycles_are_byte_identical() {
    let ctx = TestContext::fast();
    ctx.profiler.record(2, 0.0, 1.0);
    assert!(ctx.wait_for("CHAT_SEND", "1 1\n"));

    let first = std::fs::read(ctx.file("CHAT_SEND")).unwrap();
    thread::sleep(FAST_FLUSH * 5);
    let second = std::fs::read(ctx.file("CHAT_SEND")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_record_outside_running_window_changes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let profiler =
        ServerProfiler::new(ProfilerConfig::new(root.path()).with_flush_interval(FAST_FLUSH));

    profiler.record(1, 0.0, 5.0);
    let run_dir = profiler.init().unwrap();
    profiler.record(1, 0.0, 6.0);
    profiler.shutdown();
    profiler.record(1, 0.0, 7.0);
    thread::sleep(FAST_FLUSH * 3);

    assert_eq!(std::fs::read_to_string(run_dir.join("1.txt")).unwrap(), "6 1\n");
}

#[test]
fn test_no_writes_after_shutdown() {
    let ctx = TestContext::fast();
    for category in [1, 2, 3] {
        ctx.profiler.record(category as Category, 0.0, 2.0);
    }
    assert!(ctx.wait_for("3", "2 1\n"));

    ctx.profiler.shutdown();
    let before = mtimes(&ctx.run_dir);
    assert_eq!(before.len(), 3);

    ctx.profiler.record(1, 0.0, 2.0);
    thread::sleep(FAST_FLUSH * 10);
    assert_eq!(mtimes(&ctx.run_dir), before);
}

#[test]
fn test_shutdown_returns_promptly_with_long_interval() {
    let ctx = TestContext::new(|config| config.with_flush_interval(Duration::from_secs(3600)));
    ctx.profiler.record(1, 0.0, 1.0);

    let start = Instant::now();
    ctx.profiler.shutdown();
    assert!(start.elapsed() < Duration::from_secs(10));

    // The final cycle still wrote the sample.
    assert_eq!(std::fs::read_to_string(ctx.file("HANDSHAKE")).unwrap(), "1 1\n");
}

#[test]
fn test_bounded_queue_rejects_overflow() {
    let ctx = TestContext::new(|config| {
        config
            .with_flush_interval(Duration::from_secs(3600))
            .with_max_pending_samples(3)
    });

    for _ in 0..5 {
        ctx.profiler.record(1, 0.0, 1.0);
    }
    assert_eq!(ctx.profiler.pending_samples(), 3);
    assert_eq!(ctx.profiler.dropped_samples(), 2);

    ctx.profiler.shutdown();
    assert_eq!(std::fs::read_to_string(ctx.file("HANDSHAKE")).unwrap(), "1 3\n");
}

#[test]
fn test_init_creates_missing_ancestors() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("a").join("b").join("c");
    let profiler = ServerProfiler::new(ProfilerConfig::new(&nested));

    let run_dir = profiler.init().unwrap();
    assert!(run_dir.starts_with(nested.join("histogram")));
    assert!(run_dir.is_dir());
}
