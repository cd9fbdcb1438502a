use live_sass::Settings;
use std::env;
use tempfile::TempDir;

#[test]
fn test_env_override_with_custom_format() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join(".livesass/settings.toml");
    std::fs::create_dir_all(settings_path.parent().unwrap()).unwrap();
    std::fs::write(&settings_path, "status_revert_ms = 10\n").unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("LIVESASS_STATUS_REVERT_MS", "42");
        env::set_var("LIVESASS_WATCH__DEBOUNCE_MS", "900");
        env::set_var("LIVESASS_WATCH_ON_LAUNCH", "true");
    }

    let settings = Settings::load_from(&settings_path).unwrap();

    unsafe {
        // Clean up
        env::remove_var("LIVESASS_STATUS_REVERT_MS");
        env::remove_var("LIVESASS_WATCH__DEBOUNCE_MS");
        env::remove_var("LIVESASS_WATCH_ON_LAUNCH");
    }

    assert_eq!(settings.status_revert_ms, 42, "env beats the file");
    assert_eq!(settings.watch.debounce_ms, 900);
    assert!(settings.watch_on_launch);
    assert_eq!(settings.workspace_root.as_deref(), Some(temp_dir.path()));
}
