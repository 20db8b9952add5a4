// tests/start.rs

use tempfile::TempDir;

use arisa::start_watcher;

#[tokio::test]
async fn start_watcher_uses_the_config_next_to_it() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("content")).unwrap();
    let config = dir.path().join("Arisa.toml");
    std::fs::write(
        &config,
        "[watch]\npaths = [\"content\"]\nexclude = [\"**/*.swp\"]\n",
    )
    .unwrap();

    let (cfg, mut watcher) = start_watcher(&config).unwrap();

    assert_eq!(cfg.watch.root, dir.path().join("."));
    assert_eq!(cfg.watch.resolved_paths(), [dir.path().join(".").join("content")]);
    assert!(!watcher.is_closed());
    watcher.close();
    assert!(watcher.is_closed());
}

#[tokio::test]
async fn start_watcher_fails_for_missing_watch_path() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("Arisa.toml");
    std::fs::write(&config, "[watch]\npaths = [\"does-not-exist\"]\n").unwrap();

    assert!(start_watcher(&config).is_err());
}
