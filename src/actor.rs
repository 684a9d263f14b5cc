//! Acting user resolution.
//!
//! Resolution order:
//! 1) CLI --actor (explicit)
//! 2) FORGE_ACTOR environment variable
//! 3) Persisted value in .forge/actor
//! 4) Config default (actor.default) or "unknown"

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Environment variable consulted after `--actor`
pub const ACTOR_ENV: &str = "FORGE_ACTOR";

/// Resolve the current actor using CLI, environment, persisted value, and config.
pub fn resolve_actor(storage: Option<&Storage>, cli_actor: Option<&str>) -> Result<String> {
    if let Some(actor) = non_empty(cli_actor) {
        return Ok(actor.to_string());
    }

    if let Ok(env_actor) = std::env::var(ACTOR_ENV) {
        if let Some(actor) = non_empty(Some(env_actor.as_str())) {
            return Ok(actor.to_string());
        }
    }

    if let Some(storage) = storage {
        if let Some(actor) = storage.read_actor()? {
            return Ok(actor);
        }

        let config = Config::load_from_root(storage.root());
        return Ok(config.actor.default);
    }

    Ok("unknown".to_string())
}

/// Persist the actor in `.forge/actor`.
pub fn persist_actor(storage: &Storage, actor: &str) -> Result<String> {
    let actor = non_empty(Some(actor))
        .ok_or_else(|| Error::InvalidArgument("actor name cannot be empty".to_string()))?;
    storage.write_actor(actor)?;
    Ok(actor.to_string())
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|value| !value.is_empty())
}
