//! forgecore - collaboration core of a git forge
//!
//! This library holds the rules a forge applies around repositories:
//! who may do what on a project, who hears about a change, how issues
//! and projects are labelled, and how issues depend on one another.
//!
//! # Core Concepts
//!
//! - **Access**: tiered grants (ticket < commit < admin) to users and groups
//! - **Watch**: per-project notification levels with access-derived defaults
//! - **Tags**: per-project vocabulary attached to projects and issues
//! - **Dependencies**: blocking edges between issues of one fork family
//! - **Notifications**: change messages queued per mutation and dispatched
//!   to sinks once the state is persisted
//!
//! # Module Organization
//!
//! - `model`: entities and the `ForgeState` aggregate
//! - `session`: unit of work (lock, load, mutate, commit or roll back)
//! - `identity`: users and groups
//! - `project`: projects, forks and project settings
//! - `access`, `watch`, `tags`, `graph`: the resolvers and managers
//! - `issues`, `fields`, `query`: issue lifecycle, custom fields, search
//! - `notify`, `jobs`, `events`: change messages and their channels
//! - `config`, `storage`, `lock`, `actor`, `output`, `cli`: the CLI shell

pub mod access;
pub mod actor;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod fields;
pub mod graph;
pub mod identity;
pub mod issues;
pub mod jobs;
pub mod lock;
pub mod model;
pub mod notify;
pub mod output;
pub mod project;
pub mod query;
pub mod session;
pub mod storage;
pub mod tags;
pub mod watch;

#[cfg(test)]
mod fixtures;

pub use error::{Error, Result};
