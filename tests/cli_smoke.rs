mod support;

use assert_cmd::Command;
use predicates::str::contains;

use support::TestForge;

#[test]
fn forgecore_help_works() {
    Command::cargo_bin("forgecore")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("collaboration core"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "actor", "user", "group", "project", "access", "watch", "issue", "tag", "dep",
        "field", "job",
    ];

    for cmd in subcommands {
        Command::cargo_bin("forgecore")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn init_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::empty()?;

    forge
        .cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(contains("initialized"));
    assert!(forge.forge_dir().join("state.json").exists());
    assert!(forge.path().join(".forge.toml").exists());

    forge
        .cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(contains("already initialized"));

    Ok(())
}

#[test]
fn uninitialized_root_reports_not_initialized() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::empty()?;

    forge
        .as_actor("pingou")
        .args(["project", "show", "test"])
        .assert()
        .code(2)
        .stderr(contains("forgecore init"));

    let output = forge
        .as_actor("pingou")
        .args(["--json", "tag", "add", "test", "infra"])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(envelope["schema_version"], "forge.v1");
    assert_eq!(envelope["command"], "tag add");
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["error"]["kind"], "validation");

    Ok(())
}

#[test]
fn json_envelope_wraps_success() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;

    let envelope = forge.json("pingou", &["project", "show", "test"])?;
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["command"], "project show");
    assert_eq!(envelope["data"]["fullname"], "test");
    assert_eq!(envelope["data"]["access"], "admin");
    assert!(envelope["warnings"].as_array().is_some());

    Ok(())
}

#[test]
fn quiet_suppresses_human_output() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;

    let output = forge
        .as_actor("pingou")
        .args(["-q", "tag", "add", "test", "infra"])
        .output()?;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    Ok(())
}
