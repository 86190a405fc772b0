use clap::Parser;
use mediadedupe::catalog::{MediaRecord, SqliteCatalog};
use mediadedupe::cli::Cli;
use mediadedupe::error::ExitCode;
use mediadedupe::run_app;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Fixture {
    dir: TempDir,
    db: PathBuf,
    config: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let db = dir.path().join("library.db");
        let config = dir.path().join("absent-config.toml");
        Self { dir, db, config }
    }

    fn file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn catalog(&self, records: &[MediaRecord]) {
        let catalog = SqliteCatalog::open(&self.db).unwrap();
        for record in records {
            catalog.upsert_record(record).unwrap();
        }
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let mut argv = vec![
            "mediadedupe".to_string(),
            "-q".to_string(),
            "--config".to_string(),
            self.config.to_string_lossy().into_owned(),
        ];
        argv.extend(args.iter().map(|s| s.to_string()));
        run_app(Cli::try_parse_from(argv).unwrap())
    }

    fn db(&self) -> String {
        self.db.to_string_lossy().into_owned()
    }
}

fn record(path: &Path) -> MediaRecord {
    MediaRecord::new(path.to_string_lossy(), fs::metadata(path).unwrap().len() as i64)
}

#[test]
fn test_dry_run_reports_duplicates() {
    let fx = Fixture::new();
    let a = fx.file("one/a.bin", b"identical");
    let b = fx.file("two/b.bin", b"identical");
    fx.catalog(&[record(&a), record(&b)]);

    let db = fx.db();
    let code = fx
        .run(&["dedupe", &db, "--fs", "--dry-run", "--no-progress", "--output", "json"])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(a.exists() && b.exists());
}

#[test]
fn test_no_duplicates_exit_code() {
    let fx = Fixture::new();
    let a = fx.file("a.bin", b"one");
    let b = fx.file("b.bin", b"three");
    fx.catalog(&[record(&a), record(&b)]);

    let db = fx.db();
    let code = fx.run(&["dedupe", &db, "--fs", "--no-progress"]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_permanent_run_removes_duplicate() {
    let fx = Fixture::new();
    let keep = fx.file("lib/x/a.bin", b"identical");
    let dup = fx.file("a.bin", b"identical");
    fx.catalog(&[record(&dup), record(&keep)]);

    let db = fx.db();
    let code = fx
        .run(&["dedupe", &db, "--fs", "--no-trash", "--no-progress", "--output", "csv"])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(keep.exists());
    assert!(!dup.exists());
}

#[test]
fn test_missing_profile_is_error() {
    let fx = Fixture::new();
    fx.catalog(&[]);
    let db = fx.db();
    let err = fx.run(&["dedupe", &db]).unwrap_err();
    assert!(err.to_string().contains("no dedupe profile"));
}

#[test]
fn test_missing_database_is_error() {
    let fx = Fixture::new();
    let db = fx.db();
    let err = fx.run(&["dedupe", &db, "--title"]).unwrap_err();
    assert!(err.to_string().contains("not found"));
    assert!(!fx.db.exists());
}

#[test]
fn test_database_from_config_file() {
    let fx = Fixture::new();
    let a = fx.file("a/b/c.mp4", b"x");
    fx.catalog(&[record(&a)]);
    let config = fx.dir.path().join("config.toml");
    fs::write(&config, format!("database = {:?}\n", fx.db())).unwrap();

    let argv = vec![
        "mediadedupe".to_string(),
        "-q".to_string(),
        "--config".to_string(),
        config.to_string_lossy().into_owned(),
        "dedupe".to_string(),
        "--fs".to_string(),
        "--no-progress".to_string(),
    ];
    let code = run_app(Cli::try_parse_from(argv).unwrap()).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_hash_subcommand() {
    let fx = Fixture::new();
    let a = fx.file("a.bin", b"abc");
    let missing = fx.dir.path().join("missing.bin");

    let a_str = a.to_string_lossy().into_owned();
    assert_eq!(fx.run(&["hash", &a_str]).unwrap(), ExitCode::Success);

    let missing_str = missing.to_string_lossy().into_owned();
    assert_eq!(
        fx.run(&["hash", &a_str, &missing_str]).unwrap(),
        ExitCode::GeneralError
    );
}

#[test]
fn test_init_config_writes_once_without_force() {
    let fx = Fixture::new();

    assert_eq!(fx.run(&["init-config"]).unwrap(), ExitCode::Success);
    let text = fs::read_to_string(&fx.config).unwrap();
    assert!(text.contains("use_trash"));
    assert!(text.contains("io_threads"));

    let err = fx.run(&["init-config"]).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(fx.run(&["init-config", "--force"]).unwrap(), ExitCode::Success);
}
