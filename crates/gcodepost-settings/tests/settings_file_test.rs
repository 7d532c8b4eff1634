use gcodepost_settings::{SettingsError, ToolSettings};
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = ToolSettings::load_from_file(&dir.path().join("settings.toml")).unwrap();
    assert_eq!(settings, ToolSettings::default());
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let mut settings = ToolSettings::new();
    settings.gap_closer.back_up_distance = 1.5;
    settings.blip_remover.wipe_threshold = Some(3.0);
    settings.save_to_file(&path).unwrap();

    let loaded = ToolSettings::load_from_file(&path).unwrap();
    assert_eq!(loaded, settings);
    assert_eq!(loaded.wipe_hop.wipe_threshold, None);
}

#[test]
fn test_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");

    std::fs::write(&path, "[gap_closer]\nback_up_distance = \"far\"\n").unwrap();
    let err = ToolSettings::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::TomlDe(_)));

    std::fs::write(&path, "[gap_closer]\nback_up_distance = -1.0\n").unwrap();
    let err = ToolSettings::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));
}

#[test]
fn test_invalid_settings_are_not_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");

    let mut settings = ToolSettings::new();
    settings.wipe_hop.lift_z = -0.2;
    assert!(settings.save_to_file(&path).is_err());
    assert!(!path.exists());
}
