use mediadedupe::actions::{DeleteConfig, DeleteMethod, DeletionExecutor};
use mediadedupe::catalog::{Catalog, Location, MediaRecord, RecordFilter, SqliteCatalog};
use mediadedupe::duplicates::{DedupeEngine, DuplicateDecision, DuplicateEntry, Profile, RunOptions};
use mediadedupe::error::ExitCode;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn catalog_with(records: &[MediaRecord]) -> SqliteCatalog {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    for record in records {
        catalog.upsert_record(record).unwrap();
    }
    catalog
}

fn write_file(dir: &TempDir, rel: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn is_marked(catalog: &SqliteCatalog, path: &str) -> bool {
    catalog.get(path).unwrap().unwrap().deleted()
}

#[test]
fn test_permanent_removal_keeps_keep() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "a/b/clip.mp4", b"video");
    let dup = write_file(&dir, "clip.mp4", b"video");
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&dup), 5).with_duration(12.0),
        MediaRecord::new(lossy(&keep), 5).with_duration(12.0),
    ]);

    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.decisions[0].keep_path, lossy(&keep));
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].method, DeleteMethod::Permanent);
    assert!(keep.exists());
    assert!(!dup.exists());
    assert!(is_marked(&catalog, &lossy(&dup)));
    assert!(!is_marked(&catalog, &lossy(&keep)));
}

#[test]
fn test_remote_duplicate_is_only_marked() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "library/tv/series/show.mkv", b"episode");
    let remote = "https://cdn.example/v/show.mkv";
    let catalog = catalog_with(&[
        MediaRecord::new(remote, 7).with_title("Show").with_duration(1200.0),
        MediaRecord::new(lossy(&keep), 7)
            .with_title("Show")
            .with_duration(1201.0),
    ]);
    assert_eq!(catalog.get(remote).unwrap().unwrap().location, Location::Remote);

    let report = DedupeEngine::new(RunOptions::new(Profile::Title).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.deleted_files, 1);
    assert_eq!(report.removed[0].method, DeleteMethod::Remote);
    assert!(is_marked(&catalog, remote));
    assert!(keep.exists());
}

#[test]
fn test_local_file_survives_deeper_remote_url() {
    let dir = tempdir().unwrap();
    let local = write_file(&dir, "v.mp4", b"clip");
    let remote = "https://dead.invalid/a/b/c/d/e/f/g/h/i/j/k/v.mp4";
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&local), 4).with_duration(42.0),
        MediaRecord::new(remote, 4).with_duration(42.0),
    ]);

    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert!(report.decisions.is_empty());
    assert!(report.removed.is_empty());
    assert!(local.exists());
    assert!(!is_marked(&catalog, &lossy(&local)));
}

#[test]
fn test_file_url_duplicate_is_removed_from_disk() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "a/b/c/d/k.mp4", b"same");
    let dup = write_file(&dir, "d.mp4", b"same");
    let dup_url = format!("file://{}", lossy(&dup));
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&keep), 4).with_duration(7.0),
        MediaRecord::new(dup_url.as_str(), 4).with_duration(7.0),
    ]);

    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.decisions[0].keep_path, lossy(&keep));
    assert_eq!(report.removed[0].method, DeleteMethod::Permanent);
    assert_eq!(report.removed[0].path, PathBuf::from(&dup_url));
    assert!(!dup.exists());
    assert!(keep.exists());
    assert!(is_marked(&catalog, &dup_url));
}

#[test]
fn test_already_missing_duplicate_is_marked() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "deep/er/song.ogg", b"ogg");
    let gone = dir.path().join("song.ogg");
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&gone), 3).with_duration(200.0),
        MediaRecord::new(lossy(&keep), 3).with_duration(200.0),
    ]);

    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.removed[0].method, DeleteMethod::AlreadyMissing);
    assert!(report.failed_deletions.is_empty());
    assert!(is_marked(&catalog, &lossy(&gone)));
    assert_eq!(catalog.query(&RecordFilter::default()).unwrap().len(), 1);
}

#[test]
fn test_dry_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "x/y/a.mp3", b"mp3");
    let dup = write_file(&dir, "a.mp3", b"mp3");
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&dup), 3).with_duration(9.0),
        MediaRecord::new(lossy(&keep), 3).with_duration(9.0),
    ]);

    let report = DedupeEngine::new(
        RunOptions::new(Profile::Duration)
            .with_trash(false)
            .with_dry_run(true),
    )
    .run(&catalog)
    .unwrap();

    assert_eq!(report.duplicate_count(), 1);
    assert_eq!(report.deleted_files, 0);
    assert!(report.removed.is_empty());
    assert!(dup.exists());
    assert!(!is_marked(&catalog, &lossy(&dup)));
}

#[cfg(unix)]
#[test]
fn test_dedupe_command_success_marks_record() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "k/e/ep.mkv", b"ep");
    let dup = write_file(&dir, "ep.mkv", b"ep");
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&dup), 2).with_duration(30.0),
        MediaRecord::new(lossy(&keep), 2).with_duration(30.0),
    ]);

    // `touch` exits 0 and leaves the duplicate in place.
    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_dedupe_command("touch"))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.exit_code(), ExitCode::Success);
    assert_eq!(report.removed[0].method, DeleteMethod::Command);
    assert!(dup.exists());
    assert!(is_marked(&catalog, &lossy(&dup)));
}

#[cfg(unix)]
#[test]
fn test_failing_command_is_partial_success() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "k/e/ep.mkv", b"ep");
    let dup = write_file(&dir, "ep.mkv", b"ep");
    let catalog = catalog_with(&[
        MediaRecord::new(lossy(&dup), 2).with_duration(30.0),
        MediaRecord::new(lossy(&keep), 2).with_duration(30.0),
    ]);

    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_dedupe_command("false"))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.failed_deletions.len(), 1);
    assert_eq!(report.failed_deletions[0].path, lossy(&dup));
    assert_eq!(report.exit_code(), ExitCode::PartialSuccess);
    assert!(!is_marked(&catalog, &lossy(&dup)));
}

#[test]
fn test_executor_refuses_to_delete_keep() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "only.bin", b"data");
    let catalog = catalog_with(&[MediaRecord::new(lossy(&keep), 4)]);

    let bogus = DuplicateDecision {
        keep_path: lossy(&keep),
        duplicates: vec![DuplicateEntry {
            path: lossy(&keep),
            size: 4,
            location: Location::Local,
        }],
    };
    let summary = DeletionExecutor::new(&catalog, DeleteConfig::permanent())
        .execute(&[bogus])
        .unwrap();

    assert_eq!(summary.success_count(), 0);
    assert!(keep.exists());
    assert!(!is_marked(&catalog, &lossy(&keep)));
}
