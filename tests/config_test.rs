use clap::Parser;
use packbench::config::{AppConfig, ConfigManager, OutputFormat, DEFAULT_MANIFEST_URL};
use packbench::workbench::WorkbenchSettings;
use packbench::{Args, Mode};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

fn write_config(manager: &ConfigManager, content: &str) {
    manager.ensure_config_dir().unwrap();
    fs::write(manager.config_path("config.toml"), content).unwrap();
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert_eq!(config.version, "0.1");
    assert_eq!(config.workbench.mode, None);
    assert_eq!(config.workbench.base_url, "http://localhost:8080");
    assert_eq!(config.workbench.manifest_url, DEFAULT_MANIFEST_URL);
    assert!(!config.workbench.run_on_click);
    assert_eq!(config.timeouts.engine_boot_secs, 15);
    assert_eq!(config.timeouts.dataset_load_secs, 20);
    assert_eq!(config.display.max_rows, 100);
    assert_eq!(config.display.output_format, OutputFormat::Table);
    assert!(config.engine.streaming);
    assert_eq!(config.performance.event_poll_interval_ms, 25);
    assert_eq!(config.theme.colors.keybind_hints, "cyan");
    assert!(!config.debug.enabled);
}

#[test]
fn test_missing_file_gives_defaults() {
    let (_temp_dir, manager) = setup_test_config_dir();
    let config = AppConfig::load_from(&manager).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_user_config_overrides_defaults() {
    let (_temp_dir, manager) = setup_test_config_dir();
    write_config(
        &manager,
        r##"
[workbench]
mode = "showcase"
base_url = "https://packs.example.org"

[timeouts]
dataset_load_secs = 45

[display]
max_rows = 25
output_format = "json"

[theme.colors]
card_selected = "#00ff00"
"##,
    );

    let config = AppConfig::load_from(&manager).unwrap();
    assert_eq!(config.workbench.configured_mode(), Some(Mode::Showcase));
    assert_eq!(config.workbench.base_url, "https://packs.example.org");
    // untouched values keep their defaults
    assert_eq!(config.workbench.manifest_url, DEFAULT_MANIFEST_URL);
    assert_eq!(config.timeouts.engine_boot_secs, 15);
    assert_eq!(config.timeouts.dataset_load_secs, 45);
    assert_eq!(config.display.max_rows, 25);
    assert_eq!(config.display.output_format, OutputFormat::Json);
    assert_eq!(config.theme.colors.card_selected, "#00ff00");
    assert_eq!(config.theme.colors.card_border, "indexed(240)");

    let settings = WorkbenchSettings::from_config(&config);
    assert_eq!(settings.dataset_load_timeout, Duration::from_secs(45));
    assert_eq!(settings.max_rows, 25);
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[workbench]\nmode = \"presentation\"\n",
        "[display]\nmax_rows = 0\n",
        "[timeouts]\nengine_boot_secs = 0\n",
        "[theme.colors]\nerror = \"not-a-color\"\n",
        "version = \"2.0\"\n",
    ];
    for content in cases {
        let (_temp_dir, manager) = setup_test_config_dir();
        write_config(&manager, content);
        let err = AppConfig::load_from(&manager).unwrap_err();
        assert!(
            err.to_string().contains("Invalid configuration"),
            "{}: {}",
            content,
            err
        );
    }
}

#[test]
fn test_malformed_toml_is_reported() {
    let (_temp_dir, manager) = setup_test_config_dir();
    write_config(&manager, "[display\nmax_rows = ");
    let err = AppConfig::load_from(&manager).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_write_default_config() {
    let (_temp_dir, manager) = setup_test_config_dir();
    let path = manager.write_default_config(false).unwrap();
    assert!(path.exists());
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("# [workbench]"));
    assert!(content.contains("# [timeouts]"));
    assert!(content.contains("# [theme.colors]"));
    assert!(content.contains("version = \"0.1\""));

    // the generated file loads back to the defaults
    assert_eq!(AppConfig::load_from(&manager).unwrap(), AppConfig::default());
}

#[test]
fn test_write_default_config_respects_force() {
    let (_temp_dir, manager) = setup_test_config_dir();
    manager.write_default_config(false).unwrap();
    let err = manager.write_default_config(false).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert!(manager.write_default_config(true).is_ok());
}

#[test]
fn test_command_line_wins_over_config() {
    let (_temp_dir, manager) = setup_test_config_dir();
    write_config(
        &manager,
        "[workbench]\nmode = \"showcase\"\n\n[display]\nmax_rows = 25\n",
    );
    let mut config = AppConfig::load_from(&manager).unwrap();

    let args = Args::parse_from([
        "packbench",
        "--mode",
        "explore",
        "--max-rows",
        "10",
        "--base-url",
        "/srv/packs",
        "--engine-boot-timeout",
        "3",
        "--no-streaming",
        "--run-on-click",
    ]);
    config.apply_args(&args);
    config.validate().unwrap();

    assert_eq!(config.workbench.configured_mode(), Some(Mode::Explore));
    assert_eq!(config.display.max_rows, 10);
    assert_eq!(config.workbench.base_url, "/srv/packs");
    assert_eq!(config.timeouts.engine_boot_secs, 3);
    assert!(!config.engine.streaming);
    assert!(config.workbench.run_on_click);
}

#[test]
fn test_args_without_overrides_keep_config() {
    let mut config = AppConfig::default();
    config.display.max_rows = 42;
    config.apply_args(&Args::parse_from(["packbench"]));
    assert_eq!(config.display.max_rows, 42);
    assert_eq!(config.workbench.mode, None);
}
