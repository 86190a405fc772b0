use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use mediadedupe::config::Config;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_load_defaults() {
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.io_threads, 4);
    assert!(config.use_trash);
    assert!(config.database.is_none());
}

#[test]
fn test_config_load_from_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
database = "/srv/media/library.db"
io_threads = 8
min_similarity_ratio = 0.65
use_trash = false
dedupe_command = "echo removed"
sort = ["-size", "time_modified desc"]
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.database.as_deref(), Some(std::path::Path::new("/srv/media/library.db")));
    assert_eq!(config.io_threads, 8);
    assert!((config.min_similarity_ratio - 0.65).abs() < f64::EPSILON);
    assert!(!config.use_trash);
    assert_eq!(config.dedupe_command.as_deref(), Some("echo removed"));
    assert_eq!(config.sort, vec!["-size", "time_modified desc"]);
}

#[test]
fn test_env_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "use_trash = true\nio_threads = 2\n").unwrap();

    std::env::set_var("MEDIADEDUPE_USE_TRASH", "false");
    let loaded = Config::load(Some(&path));
    std::env::remove_var("MEDIADEDUPE_USE_TRASH");

    let config = loaded.unwrap();
    assert!(!config.use_trash);
    assert_eq!(config.io_threads, 2);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = 1\n").unwrap();

    let figment = Config::figment(Some(&path));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.io_threads, 1);
    assert!(config.use_trash);
    assert!(config.sort.is_empty());
}

#[test]
fn test_config_invalid_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = [").unwrap();

    let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&path));
    let result: Result<Config, _> = figment.extract();
    assert!(result.is_err());
}

#[test]
fn test_save_writes_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf").join("config.toml");
    let config = Config {
        io_threads: 6,
        sort: vec!["path".to_string()],
        ..Config::default()
    };
    config.save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("io_threads = 6"));
    assert!(text.contains("use_trash = true"));
    assert!(text.contains("\"path\""));
}
