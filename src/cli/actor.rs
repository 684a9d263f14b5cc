//! forgecore actor command implementation
//!
//! Provides acting-user helpers (set/show).

use std::path::PathBuf;

use crate::actor;
use crate::error::{Error, Result};
use crate::model::ForgeState;
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;

use super::Global;

#[derive(serde::Serialize)]
struct ActorSetReport {
    actor: String,
    path: PathBuf,
    known: bool,
}

#[derive(serde::Serialize)]
struct ActorShowReport {
    actor: String,
    known: bool,
}

/// Whether `actor` is a registered user; unreadable state counts as unknown.
fn is_known(storage: &Storage, actor: &str) -> bool {
    storage
        .read_json::<ForgeState>(&storage.state_file())
        .map(|state| state.find_user(actor).is_some())
        .unwrap_or(false)
}

pub fn run_set(global: &Global, name: &str) -> Result<()> {
    let storage = global.storage()?;
    if !storage.is_initialized() {
        return Err(Error::NotInitialized(storage.root().to_path_buf()));
    }

    let actor_name = actor::persist_actor(&storage, name)?;
    let known = is_known(&storage, &actor_name);

    let report = ActorSetReport {
        actor: actor_name.clone(),
        path: storage.actor_file(),
        known,
    };

    let mut human = HumanOutput::new(format!("forgecore actor set: {actor_name}"));
    human.push_summary("actor", actor_name.clone());
    human.push_summary("path", storage.actor_file().display().to_string());
    if !known {
        human.push_warning(format!("no user named `{actor_name}` yet"));
        human.push_next_step(format!("forgecore user add {actor_name}"));
    }

    emit_success(global.output(), "actor set", &report, Some(&human))
}

pub fn run_show(global: &Global) -> Result<()> {
    let storage = global.storage()?;
    let actor_name = actor::resolve_actor(Some(&storage), global.actor.as_deref())?;
    let known = is_known(&storage, &actor_name);

    let report = ActorShowReport {
        actor: actor_name.clone(),
        known,
    };

    let header = if actor_name == "unknown" {
        "forgecore actor: not set".to_string()
    } else {
        format!("forgecore actor: {actor_name}")
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("actor", actor_name.clone());
    if actor_name == "unknown" {
        human.push_warning("actor not set; using default".to_string());
        human.push_next_step("forgecore actor set <name>");
    }

    emit_success(global.output(), "actor show", &report, Some(&human))
}
