#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A forge root in a temp dir, initialized with users `pingou` and `foo`.
pub struct TestForge {
    dir: TempDir,
}

impl TestForge {
    /// Empty temp root; nothing initialized.
    pub fn empty() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let forge = Self::empty()?;
        forge.cmd().arg("init").assert().success();
        forge
            .cmd()
            .args(["user", "add", "pingou", "--email", "bar@pingou.com"])
            .assert()
            .success();
        forge
            .cmd()
            .args(["user", "add", "foo", "--email", "foo@bar.com"])
            .assert()
            .success();
        Ok(forge)
    }

    /// `init()` plus project `test` owned by `pingou`.
    pub fn with_project() -> Result<Self, Box<dyn std::error::Error>> {
        let forge = Self::init()?;
        forge
            .as_actor("pingou")
            .args(["project", "new", "test", "--description", "test project"])
            .assert()
            .success();
        Ok(forge)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn forge_dir(&self) -> PathBuf {
        self.dir.path().join(".forge")
    }

    /// Command rooted at this forge, isolated from the caller's environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("forgecore").expect("binary");
        cmd.env_remove("FORGE_ACTOR")
            .env_remove("RUST_LOG")
            .env("FORGE_ROOT", self.dir.path());
        cmd
    }

    pub fn as_actor(&self, actor: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.env("FORGE_ACTOR", actor);
        cmd
    }

    /// Run as `actor` with `--json` and return the parsed envelope.
    pub fn json(&self, actor: &str, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self.as_actor(actor).arg("--json").args(args).output()?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(".forge.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_state(&self) -> Result<Value, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(self.forge_dir().join("state.json"))?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn read_jsonl(&self, name: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
        let path = self.forge_dir().join(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(trimmed)?);
        }
        Ok(records)
    }

    pub fn events(&self) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
        self.read_jsonl("events.jsonl")
    }

    pub fn jobs(&self) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
        self.read_jsonl("jobs.jsonl")
    }
}
