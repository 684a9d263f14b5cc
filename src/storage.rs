//! Storage layer for forgecore
//!
//! All persistent state lives under `<root>/.forge/`.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   .forge.toml                 # Optional configuration
//!   .forge/
//!     state.json                # ForgeState snapshot (atomic writes)
//!     state.lock                # Exclusive lock held by an open session
//!     events.jsonl              # Notification event log
//!     jobs.jsonl                # Background job queue
//!     actor                     # Persisted actor identity
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::CONFIG_FILENAME;
use crate::error::Result;
use crate::lock;

/// Name of the state directory under the forge root
pub const FORGE_DIR: &str = ".forge";

/// Storage manager for forge state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a storage manager rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Forge root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.forge/` directory
    pub fn forge_dir(&self) -> PathBuf {
        self.root.join(FORGE_DIR)
    }

    /// Path to the configuration file
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    /// Path to the state snapshot
    pub fn state_file(&self) -> PathBuf {
        self.forge_dir().join("state.json")
    }

    /// Path to the state lock
    pub fn lock_file(&self) -> PathBuf {
        self.forge_dir().join("state.lock")
    }

    /// Path to the event log, given its configured file name
    pub fn events_file(&self, name: &str) -> PathBuf {
        self.forge_dir().join(name)
    }

    /// Path to the background job queue (JSONL format)
    pub fn jobs_file(&self) -> PathBuf {
        self.forge_dir().join("jobs.jsonl")
    }

    /// Path to the persisted actor identity
    pub fn actor_file(&self) -> PathBuf {
        self.forge_dir().join("actor")
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create `.forge/` and touch the append-only logs
    pub fn init_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.forge_dir())?;

        let jobs_file = self.jobs_file();
        if !jobs_file.exists() {
            File::create(&jobs_file)?;
        }

        Ok(())
    }

    /// Check if a state snapshot exists
    pub fn is_initialized(&self) -> bool {
        self.state_file().exists()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Append a record to a JSONL file
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all records from a JSONL file
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }

    // =========================================================================
    // Actor persistence
    // =========================================================================

    /// Read the persisted actor identity, if any
    pub fn read_actor(&self) -> Result<Option<String>> {
        let path = self.actor_file();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let actor = raw.trim();
        if actor.is_empty() {
            return Ok(None);
        }
        Ok(Some(actor.to_string()))
    }

    /// Persist the actor identity
    pub fn write_actor(&self, actor: &str) -> Result<()> {
        lock::write_atomic(self.actor_file(), format!("{actor}\n").as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u32,
        name: String,
    }

    #[test]
    fn paths_live_under_forge_dir() {
        let storage = Storage::new(PathBuf::from("/srv/forge"));
        assert_eq!(storage.state_file(), PathBuf::from("/srv/forge/.forge/state.json"));
        assert_eq!(storage.lock_file(), PathBuf::from("/srv/forge/.forge/state.lock"));
        assert_eq!(storage.jobs_file(), PathBuf::from("/srv/forge/.forge/jobs.jsonl"));
        assert_eq!(
            storage.events_file("events.jsonl"),
            PathBuf::from("/srv/forge/.forge/events.jsonl")
        );
        assert_eq!(storage.config_file(), PathBuf::from("/srv/forge/.forge.toml"));
    }

    #[test]
    fn json_round_trips_through_disk() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        storage.init_dirs().unwrap();

        let record = Record {
            id: 1,
            name: "test".to_string(),
        };
        let path = storage.state_file();
        storage.write_json(&path, &record).unwrap();
        let loaded: Record = storage.read_json(&path).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn jsonl_appends_and_skips_blank_lines() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        let path = storage.jobs_file();

        assert!(storage.read_jsonl::<Record>(&path).unwrap().is_empty());

        storage
            .append_jsonl(&path, &Record { id: 1, name: "a".into() })
            .unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"\n")
            .unwrap();
        storage
            .append_jsonl(&path, &Record { id: 2, name: "b".into() })
            .unwrap();

        let records: Vec<Record> = storage.read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "b");
    }

    #[test]
    fn actor_round_trip_trims_whitespace() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());

        assert_eq!(storage.read_actor().unwrap(), None);
        storage.write_actor("pingou").unwrap();
        assert_eq!(storage.read_actor().unwrap(), Some("pingou".to_string()));
    }
}
