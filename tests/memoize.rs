use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

use cachefun::{CacheContext, CacheError, CacheErrorKind, DiskMemo, Json, Timestamp};
use filetime::{FileTime, set_file_mtime};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// 2020-01-01T00:00:00Z
const OLD_MTIME: i64 = 1_577_836_800;

fn isolated() -> (TempDir, CacheContext) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp_dir = TempDir::new().unwrap();
    let ctx = CacheContext::with_root(tmp_dir.path());
    (tmp_dir, ctx)
}

fn age(path: &Path) {
    set_file_mtime(path, FileTime::from_unix_time(OLD_MTIME, 0)).unwrap();
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("the job failed")]
    Failed,
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    name: String,
    rows: Vec<(u32, f64)>,
    tags: HashMap<String, String>,
}

#[test]
fn computes_once_then_reads_from_disk() {
    let (tmp_dir, ctx) = isolated();
    let calls = Cell::new(0);
    let double = DiskMemo::builder("out.mp")
        .context(ctx)
        .build()
        .unwrap()
        .wrap(|x: i64| {
            calls.set(calls.get() + 1);
            x * 2
        });

    assert_eq!(double.call(5).unwrap(), 10);
    assert!(tmp_dir.path().join("out.mp").is_file());
    assert_eq!(double.call(5).unwrap(), 10);
    assert_eq!(calls.get(), 1);
}

#[test]
fn arguments_are_not_part_of_the_key() {
    let (tmp_dir, ctx) = isolated();
    let calls = Cell::new(0);
    let double = DiskMemo::builder("out.pkl")
        .context(ctx)
        .build()
        .unwrap()
        .wrap(|x: i64| {
            calls.set(calls.get() + 1);
            x * 2
        });

    assert_eq!(double.call(5).unwrap(), 10);
    assert!(tmp_dir.path().join("out.pkl").exists());
    assert_eq!(double.call(999).unwrap(), 10);
    assert_eq!(calls.get(), 1);
}

#[test]
fn entry_survives_the_wrapper() {
    let (_tmp_dir, ctx) = isolated();
    let report = Report {
        name: "weekly".to_string(),
        rows: vec![(1, 0.25), (2, 1e10), (3, -4.5)],
        tags: HashMap::from([("team".to_string(), "data".to_string())]),
    };

    let first = DiskMemo::builder("reports/weekly.mp")
        .context(ctx.clone())
        .build()
        .unwrap()
        .wrap(|_: ()| report.clone());
    assert_eq!(first.call(()).unwrap(), report);

    // A fresh wrapper, as after a restart, that must not run
    let second = DiskMemo::builder("reports/weekly.mp")
        .context(ctx)
        .build()
        .unwrap()
        .wrap(|_: ()| -> Report { panic!("should have been read from disk") });
    assert_eq!(second.call(()).unwrap(), report);
}

#[test]
fn creates_missing_parent_folders() {
    let (tmp_dir, ctx) = isolated();
    let memo = DiskMemo::builder("a/b/c/out.mp")
        .context(ctx)
        .build()
        .unwrap();
    assert_eq!(memo.get_or_compute(|| "x".to_string()).unwrap(), "x");
    assert!(tmp_dir.path().join("a/b/c/out.mp").is_file());
}

#[test]
fn older_entries_than_min_time_are_recomputed() {
    let (tmp_dir, ctx) = isolated();
    let path = tmp_dir.path().join("out.mp");
    let calls = Cell::new(0);
    let compute = |_: ()| {
        calls.set(calls.get() + 1);
        calls.get()
    };

    let plain = DiskMemo::builder("out.mp")
        .context(ctx.clone())
        .build()
        .unwrap()
        .wrap(compute);
    assert_eq!(plain.call(()).unwrap(), 1);
    age(&path);
    // Any age works without a threshold
    assert_eq!(plain.call(()).unwrap(), 1);

    let before = DiskMemo::builder("out.mp")
        .context(ctx.clone())
        .min_time("2019-01-01T00:00:00")
        .build()
        .unwrap()
        .wrap(compute);
    assert_eq!(before.call(()).unwrap(), 1);
    assert_eq!(calls.get(), 1);

    let after = DiskMemo::builder("out.mp")
        .context(ctx.clone())
        .min_time("2021-01-01T00:00:00")
        .build()
        .unwrap()
        .wrap(compute);
    assert!(after.memo().status().unwrap().exists());
    assert!(!after.memo().status().unwrap().is_valid());
    assert_eq!(after.call(()).unwrap(), 2);
    // The new entry is now recent enough
    assert_eq!(after.call(()).unwrap(), 2);
    assert_eq!(calls.get(), 2);
}

#[test]
fn min_time_equal_to_mtime_is_valid() {
    let (tmp_dir, ctx) = isolated();
    let path = tmp_dir.path().join("out.mp");
    let memo = DiskMemo::builder("out.mp")
        .context(ctx)
        .min_time_at(Timestamp::from_second(OLD_MTIME).unwrap())
        .build()
        .unwrap();
    memo.store(&path, &7u8).unwrap();
    age(&path);

    let value: u8 = memo.get_or_compute(|| 0).unwrap();
    assert_eq!(value, 7);
}

#[test]
fn failed_computations_write_nothing() {
    let (tmp_dir, ctx) = isolated();
    let job = DiskMemo::builder("job.mp")
        .context(ctx)
        .build()
        .unwrap()
        .wrap(|fail: bool| if fail { Err(JobError::Failed) } else { Ok(1u32) });

    let err = job.try_call(true).unwrap_err();
    assert!(matches!(err, JobError::Failed));
    assert!(!tmp_dir.path().join("job.mp").exists());

    assert_eq!(job.try_call(false).unwrap(), 1);
    // Cached now, the argument doesn't matter anymore
    assert_eq!(job.try_call(true).unwrap(), 1);
}

#[test]
fn corrupt_entries_are_errors() {
    let (tmp_dir, ctx) = isolated();
    // 0xc1 is never used by MessagePack
    fs::write(tmp_dir.path().join("bad.mp"), [0xc1u8]).unwrap();
    let calls = Cell::new(0);
    let memo = DiskMemo::builder("bad.mp")
        .context(ctx)
        .build()
        .unwrap()
        .wrap(|_: ()| {
            calls.set(calls.get() + 1);
            1u64
        });

    let err = memo.call(()).unwrap_err();
    assert!(err.is_codec());
    assert!(matches!(err.kind(), CacheErrorKind::Codec { .. }));
    assert_eq!(calls.get(), 0);

    // Through a fallible function, the cache error is converted into its error type
    let memo = DiskMemo::builder(tmp_dir.path().join("bad.mp"))
        .build()
        .unwrap()
        .wrap(|_: ()| Ok::<u64, JobError>(1));
    assert!(matches!(memo.try_call(()), Err(JobError::Cache(_))));
}

#[test]
fn values_that_cannot_be_encoded_leave_no_file() {
    let (tmp_dir, ctx) = isolated();
    let memo = DiskMemo::builder("map.json")
        .context(ctx)
        .codec(Json::default())
        .build()
        .unwrap();

    let err = memo
        .get_or_compute(|| HashMap::from([((1, 2), 3)]))
        .unwrap_err();
    assert!(err.is_codec());
    let leftovers: Vec<_> = fs::read_dir(tmp_dir.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[test]
fn forced_caches_always_recompute() {
    let (tmp_dir, ctx) = isolated();
    let calls = Cell::new(0);
    let counter = DiskMemo::builder("count.json")
        .context(ctx)
        .codec(Json::default())
        .forced(true)
        .build()
        .unwrap()
        .wrap(|_: ()| {
            calls.set(calls.get() + 1);
            calls.get()
        });

    assert_eq!(counter.call(()).unwrap(), 1);
    assert_eq!(counter.call(()).unwrap(), 2);
    assert_eq!(fs::read_to_string(tmp_dir.path().join("count.json")).unwrap(), "2");
}

#[test]
fn forced_calls_overwrite_the_entry() {
    let (tmp_dir, ctx) = isolated();
    let calls = Cell::new(0);
    let counter = DiskMemo::builder("count.json")
        .context(ctx)
        .codec(Json::default())
        .build()
        .unwrap()
        .wrap(|step: usize| {
            calls.set(calls.get() + step);
            calls.get()
        });

    assert_eq!(counter.call(1).unwrap(), 1);
    assert_eq!(counter.call_forced(10).unwrap(), 11);
    assert_eq!(counter.call(100).unwrap(), 11);
    assert_eq!(fs::read_to_string(tmp_dir.path().join("count.json")).unwrap(), "11");

    let res: Result<usize, JobError> = DiskMemo::builder(tmp_dir.path().join("count.json"))
        .codec(Json::default())
        .build()
        .unwrap()
        .wrap(|_: ()| -> Result<usize, JobError> { Err(JobError::Failed) })
        .try_call_forced(());
    assert!(matches!(res, Err(JobError::Failed)));
    // The previous value is still there
    assert_eq!(fs::read_to_string(tmp_dir.path().join("count.json")).unwrap(), "11");
}

#[test]
fn absolute_paths_ignore_every_root() {
    let (_ctx_dir, ctx) = isolated();
    let own_root = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let path = target.path().join("abs.mp");

    let memo = DiskMemo::builder(&path)
        .context(ctx)
        .cache_root(own_root.path())
        .build()
        .unwrap();
    assert_eq!(memo.resolve_path(), path);
    memo.get_or_compute(|| 1u8).unwrap();
    assert!(path.is_file());
}

#[test]
fn own_root_is_used_before_the_context_one() {
    let (ctx_dir, ctx) = isolated();
    let own_root = TempDir::new().unwrap();

    let memo = DiskMemo::builder("out.mp")
        .context(ctx)
        .cache_root(own_root.path())
        .build()
        .unwrap();
    memo.get_or_compute(|| 1u8).unwrap();
    assert!(own_root.path().join("out.mp").is_file());
    assert!(!ctx_dir.path().join("out.mp").exists());
}

#[test]
fn unreadable_entries_are_storage_errors() {
    let (tmp_dir, ctx) = isolated();
    // Exists, so it is not a miss, but cannot be read as a file
    fs::create_dir(tmp_dir.path().join("out.mp")).unwrap();
    let calls = Cell::new(0);
    let memo = DiskMemo::builder("out.mp")
        .context(ctx)
        .build()
        .unwrap()
        .wrap(|_: ()| {
            calls.set(calls.get() + 1);
            1u64
        });

    assert!(memo.memo().status().unwrap().is_valid());
    let err = memo.call(()).unwrap_err();
    assert!(err.is_storage());
    assert!(matches!(err.kind(), CacheErrorKind::Io(_)));
    assert_eq!(calls.get(), 0);
    assert!(tmp_dir.path().join("out.mp").is_dir());
}

#[cfg(unix)]
#[test]
fn entries_are_as_readable_as_plain_files() {
    use std::os::unix::fs::PermissionsExt;

    let (tmp_dir, ctx) = isolated();
    let memo = DiskMemo::builder("shared.mp")
        .context(ctx)
        .build()
        .unwrap();
    memo.get_or_compute(|| vec![1u8, 2, 3]).unwrap();
    fs::write(tmp_dir.path().join("plain"), b"x").unwrap();

    let mode = |name: &str| {
        fs::metadata(tmp_dir.path().join(name))
            .unwrap()
            .permissions()
            .mode()
            & 0o777
    };
    assert_eq!(mode("shared.mp"), mode("plain"));
}
