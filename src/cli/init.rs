//! forgecore init command implementation
//!
//! Creates `.forge/` with an empty state and a default `.forge.toml`.

use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILENAME};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::session::Session;
use crate::storage::FORGE_DIR;

use super::Global;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    state: bool,
}

pub fn run(global: &Global) -> Result<()> {
    let storage = global.storage()?;

    std::fs::create_dir_all(storage.root())?;
    let config_path = storage.config_file();
    let created_config = if config_path.exists() {
        false
    } else {
        Config::default().save(&config_path)?;
        true
    };
    let config = Config::load_from_root(storage.root());
    let created_state = Session::initialize(&storage, config.lock.timeout_ms)?;
    tracing::info!(root = %storage.root().display(), created_config, created_state, "forge initialized");

    let report = InitReport {
        root: storage.root().to_path_buf(),
        created: InitCreated {
            config: created_config,
            state: created_state,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILENAME.to_string());
    }
    if created_state {
        created_items.push(format!("{FORGE_DIR}/"));
    }

    let header = if created_items.is_empty() {
        "forgecore init: already initialized".to_string()
    } else {
        "forgecore init: initialized".to_string()
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("root", storage.root().display().to_string());
    if !created_items.is_empty() {
        human.push_summary("created", created_items.join(", "));
    }
    if created_state {
        human.push_next_step("forgecore user add <name>");
        human.push_next_step("forgecore actor set <name>");
    }

    emit_success(global.output(), "init", &report, Some(&human))
}
