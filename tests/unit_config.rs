use std::fs;

use forgecore::config::{Config, CONFIG_FILENAME};

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_root(dir.path());

    assert_eq!(config.actor.default, "unknown");
    assert_eq!(config.tags.default_color, "DeepSkyBlue");
    assert!(config.issues.close_statuses.iter().any(|s| s == "Fixed"));
    assert!(config.notifications.enabled);
    assert_eq!(config.lock.timeout_ms, 5000);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[actor]
default = "pingou"

[tags]
default_color = "red"

[issues]
close_statuses = ["Fixed", "Upstream"]

[jobs]
enabled = false
"#;
    fs::write(dir.path().join(CONFIG_FILENAME), toml)?;

    let config = Config::load_from_root(dir.path());
    assert_eq!(config.actor.default, "pingou");
    assert_eq!(config.tags.default_color, "red");
    assert_eq!(config.issues.close_statuses, vec!["Fixed", "Upstream"]);
    assert!(!config.jobs.enabled);
    assert_eq!(config.lock.timeout_ms, 5000);

    Ok(())
}

#[test]
fn invalid_config_is_rejected_by_load() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(CONFIG_FILENAME);
    fs::write(&path, "[groups]\ntypes = [\"user\", \"user\"]\n")?;

    let err = Config::load(&path).expect_err("duplicate group type");
    assert!(err.to_string().contains("duplicate"));

    // the root loader falls back to defaults instead
    let config = Config::load_from_root(dir.path());
    assert_eq!(config.groups.types, Config::default().groups.types);

    Ok(())
}
