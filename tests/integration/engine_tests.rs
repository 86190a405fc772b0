use mediadedupe::catalog::{Catalog, MediaRecord, RecordFilter, SqliteCatalog};
use mediadedupe::duplicates::{DedupeEngine, Profile, RunOptions, SimilarityConfig};
use mediadedupe::error::ExitCode;
use std::collections::{HashMap, HashSet};
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
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn record_for(path: &Path) -> MediaRecord {
    let size = fs::metadata(path).unwrap().len();
    MediaRecord::new(path.to_string_lossy(), size as i64)
}

fn dry(profile: Profile) -> RunOptions {
    RunOptions::new(profile).with_dry_run(true)
}

#[test]
fn test_cached_and_sampled_pair_with_odd_size() {
    let dir = tempdir().unwrap();
    let a = write_file(&dir, "a.bin", &[7u8; 100]);
    let b = write_file(&dir, "b.bin", &[7u8; 100]);
    let c = write_file(&dir, "c.bin", &[7u8; 200]);

    let catalog = catalog_with(&[
        record_for(&a).with_sample_hash("h1"),
        record_for(&b).with_sample_hash("h1"),
        record_for(&c),
    ]);

    let report = DedupeEngine::new(dry(Profile::FilesystemContent))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.candidate_groups, 1);
    assert_eq!(report.verified_groups, 1);
    assert_eq!(report.decisions.len(), 1);

    let decision = &report.decisions[0];
    // Same depth, dots, length, size and times: the larger path wins.
    assert_eq!(decision.keep_path, b.to_string_lossy());
    assert_eq!(decision.duplicate_paths(), vec![a.to_string_lossy()]);
    assert_eq!(report.reclaimable_bytes, 100);

    // C never reached the sample stage.
    let stored_c = catalog.get(&c.to_string_lossy()).unwrap().unwrap();
    assert!(stored_c.sample_hash.is_none());
    assert!(a.exists() && b.exists() && c.exists());
}

#[test]
fn test_same_size_different_content_is_kept() {
    let dir = tempdir().unwrap();
    let a = write_file(&dir, "a.bin", b"aaaaaaaa");
    let b = write_file(&dir, "b.bin", b"bbbbbbbb");

    let catalog = catalog_with(&[record_for(&a), record_for(&b)]);
    let report = DedupeEngine::new(RunOptions::new(Profile::FilesystemContent).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert_eq!(report.candidate_groups, 1);
    assert_eq!(report.verified_groups, 0);
    assert!(report.decisions.is_empty());
    assert_eq!(report.exit_code(), ExitCode::NoDuplicates);
    assert!(a.exists() && b.exists());
}

#[test]
fn test_sample_hashes_persist_after_dry_run() {
    let dir = tempdir().unwrap();
    let a = write_file(&dir, "x/a.mkv", b"same bytes");
    let b = write_file(&dir, "y/b.mkv", b"same bytes");
    let catalog = catalog_with(&[record_for(&a), record_for(&b)]);

    DedupeEngine::new(dry(Profile::FilesystemContent))
        .run(&catalog)
        .unwrap();

    let stored_a = catalog.get(&a.to_string_lossy()).unwrap().unwrap();
    let stored_b = catalog.get(&b.to_string_lossy()).unwrap().unwrap();
    assert!(stored_a.sample_hash.is_some());
    assert_eq!(stored_a.sample_hash, stored_b.sample_hash);
    assert_eq!(stored_a.time_deleted, 0);
}

#[test]
fn test_dry_run_is_idempotent() {
    let dir = tempdir().unwrap();
    let files: Vec<PathBuf> = ["m/one.mp4", "m/deep/one.mp4", "n/two.mp4", "n/copy/two.mp4"]
        .iter()
        .enumerate()
        .map(|(i, rel)| write_file(&dir, rel, format!("content-{}", i / 2).as_bytes()))
        .collect();
    let records: Vec<MediaRecord> = files.iter().map(|p| record_for(p)).collect();
    let catalog = catalog_with(&records);

    let engine = DedupeEngine::new(dry(Profile::FilesystemContent));
    let first = engine.run(&catalog).unwrap();
    let second = engine.run(&catalog).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.decisions.len(), 2);
    assert!(files.iter().all(|p| p.exists()));
}

#[test]
fn test_removal_marks_catalog_and_second_run_is_clean() {
    let dir = tempdir().unwrap();
    let keep = write_file(&dir, "library/album/song.flac", b"audio");
    let dup = write_file(&dir, "inbox/song.flac", b"audio");
    let catalog = catalog_with(&[record_for(&dup), record_for(&keep)]);

    let options = RunOptions::new(Profile::FilesystemContent).with_trash(false);
    let report = DedupeEngine::new(options.clone()).run(&catalog).unwrap();

    assert_eq!(report.deleted_files, 1);
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert!(keep.exists());
    assert!(!dup.exists());

    let stored = catalog.get(&dup.to_string_lossy()).unwrap().unwrap();
    assert!(stored.time_deleted > 0);
    assert_eq!(catalog.query(&RecordFilter::default()).unwrap().len(), 1);

    let again = DedupeEngine::new(options).run(&catalog).unwrap();
    assert!(again.decisions.is_empty());
}

#[test]
fn test_overlapping_windows_never_double_claim() {
    let titled = |path: &str, duration: f64| {
        MediaRecord::new(path, 1000)
            .with_title("Episode 1")
            .with_duration(duration)
    };
    let records = vec![
        titled("/tv/a.mkv", 100.0),
        titled("/tv/b.mkv", 106.0),
        titled("/tv/c.mkv", 112.0),
        titled("/tv/d.mkv", 118.0),
        titled("/tv/e.mkv", 200.0),
    ];
    let durations: HashMap<String, f64> = records
        .iter()
        .map(|r| (r.path.clone(), r.duration.unwrap()))
        .collect();
    let catalog = catalog_with(&records);

    let report = DedupeEngine::new(dry(Profile::Title))
        .with_existence_check(|_| true)
        .run(&catalog)
        .unwrap();

    assert!(!report.decisions.is_empty());
    let mut deleted = HashSet::new();
    let keeps: HashSet<&str> = report.decisions.iter().map(|d| d.keep_path.as_str()).collect();

    for decision in &report.decisions {
        let keep_duration = durations[&decision.keep_path];
        for dup in &decision.duplicates {
            assert_ne!(dup.path, decision.keep_path);
            assert!(deleted.insert(dup.path.clone()), "{} claimed twice", dup.path);
            assert!(!keeps.contains(dup.path.as_str()));
            assert!((durations[&dup.path] - keep_duration).abs() <= 8.0);
        }
    }
    assert!(!deleted.contains("/tv/e.mkv"));
}

#[test]
fn test_music_tolerance_boundary() {
    let song = |path: &str, duration: f64| {
        MediaRecord::new(path, 4000)
            .with_music("Blue", "Band", "Record")
            .with_duration(duration)
            .with_streams(1, 0, 0)
    };

    let near = catalog_with(&[song("/m/a.mp3", 100.0), song("/m/b.mp3", 104.0)]);
    let report = DedupeEngine::new(dry(Profile::MusicIdentity))
        .with_existence_check(|_| true)
        .run(&near)
        .unwrap();
    assert_eq!(report.decisions.len(), 1);

    let far = catalog_with(&[song("/m/a.mp3", 100.0), song("/m/b.mp3", 109.0)]);
    let report = DedupeEngine::new(dry(Profile::MusicIdentity))
        .with_existence_check(|_| true)
        .run(&far)
        .unwrap();
    assert!(report.decisions.is_empty());
    assert_eq!(report.candidate_groups, 0);
}

#[test]
fn test_audio_stream_outranks_depth() {
    let catalog = catalog_with(&[
        MediaRecord::new("/a/b/c/video-only.mp4", 10)
            .with_extractor_id("yt:abc")
            .with_duration(60.0)
            .with_streams(0, 1, 0),
        MediaRecord::new("/full.mp4", 10)
            .with_extractor_id("yt:abc")
            .with_duration(61.0)
            .with_streams(1, 1, 0),
    ]);
    let report = DedupeEngine::new(dry(Profile::ExtractorId))
        .with_existence_check(|_| true)
        .run(&catalog)
        .unwrap();

    assert_eq!(report.decisions[0].keep_path, "/full.mp4");
}

#[test]
fn test_sort_keys_override_default_ranking() {
    let catalog = catalog_with(&[
        MediaRecord::new("/deep/dir/small.mp4", 10).with_duration(5.0),
        MediaRecord::new("/big.mp4", 99).with_duration(5.0),
    ]);
    let keys = mediadedupe::duplicates::parse_sort_keys(&["-size"]).unwrap();
    let report = DedupeEngine::new(dry(Profile::Duration).with_sort_keys(keys))
        .with_existence_check(|_| true)
        .run(&catalog)
        .unwrap();

    assert_eq!(report.decisions[0].keep_path, "/big.mp4");
    assert_eq!(report.reclaimable_bytes, 10);
}

#[test]
fn test_similarity_guard_splits_unrelated_titles() {
    let titled = |path: &str| {
        MediaRecord::new(path, 500)
            .with_title("Intro")
            .with_duration(30.0)
    };
    let catalog = catalog_with(&[
        titled("/music/artist-one/intro.mp3"),
        titled("/music/artist-two/Intro.mp3"),
        titled("/podcasts/show/episode-0001-welcome.mp3"),
    ]);
    let similarity = SimilarityConfig::default()
        .with_basename(true)
        .with_min_ratio(0.8);
    let report = DedupeEngine::new(dry(Profile::Title).with_similarity(similarity))
        .with_existence_check(|_| true)
        .run(&catalog)
        .unwrap();

    assert_eq!(report.decisions.len(), 1);
    let all: Vec<&str> = report.decisions[0]
        .duplicate_paths()
        .into_iter()
        .chain(std::iter::once(report.decisions[0].keep_path.as_str()))
        .collect();
    assert!(!all.contains(&"/podcasts/show/episode-0001-welcome.mp3"));
}

#[test]
fn test_filter_limits_records() {
    let catalog = catalog_with(&[
        MediaRecord::new("/keep/a", 10).with_duration(9.0),
        MediaRecord::new("/keep/b", 10).with_duration(9.0),
        MediaRecord::new("/skip/c", 10).with_duration(9.0),
    ]);
    let filter = RecordFilter::default().with_include("/keep/");
    let report = DedupeEngine::new(dry(Profile::Duration).with_filter(filter))
        .with_existence_check(|_| true)
        .run(&catalog)
        .unwrap();

    assert_eq!(report.duplicate_count(), 1);
    let paths = report.decisions[0].duplicate_paths();
    assert!(!paths.contains(&"/skip/c"));
    assert_ne!(report.decisions[0].keep_path, "/skip/c");
}

#[test]
fn test_missing_keep_skips_group() {
    let catalog = catalog_with(&[
        MediaRecord::new("/nowhere/deep/a.mp4", 10).with_duration(3.0),
        MediaRecord::new("/nowhere/b.mp4", 10).with_duration(3.0),
    ]);
    let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_trash(false))
        .run(&catalog)
        .unwrap();

    assert!(report.decisions.is_empty());
    assert_eq!(catalog.query(&RecordFilter::default()).unwrap().len(), 2);
}
