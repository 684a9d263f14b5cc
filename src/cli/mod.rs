//! Command-line interface for forgecore
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use clap::{Parser, Subcommand};

use crate::error::Result;

mod access;
mod actor;
mod context;
mod dep;
mod field;
mod identity;
mod init;
mod issue;
mod job;
mod project;
mod tag;
mod watch;

pub use context::Global;

/// forgecore - collaboration core of a git forge
///
/// Manages access grants, watch levels, tags and issue dependencies for the
/// projects stored under a forge root.
#[derive(Parser, Debug)]
#[command(name = "forgecore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Forge root holding `.forge/` (defaults to current directory)
    #[arg(long, global = true, env = "FORGE_ROOT")]
    pub root: Option<std::path::PathBuf>,

    /// Acting user for mutations and private reads
    #[arg(long, global = true, env = "FORGE_ACTOR")]
    pub actor: Option<String>,

    /// Write change events as JSONL to a file, or `-` for stdout
    #[arg(long, global = true, value_name = "PATH|-")]
    pub events: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `.forge/` and a default `.forge.toml`
    Init,

    /// Persisted acting user
    #[command(subcommand)]
    Actor(ActorCommands),

    /// User accounts
    #[command(subcommand)]
    User(UserCommands),

    /// Groups and their members
    #[command(subcommand)]
    Group(GroupCommands),

    /// Projects, forks and project settings
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Access grants on a project
    #[command(subcommand)]
    Access(AccessCommands),

    /// Watch levels on projects and issues
    #[command(subcommand)]
    Watch(WatchCommands),

    /// Issues
    #[command(subcommand)]
    Issue(IssueCommands),

    /// Tags on projects and issues
    #[command(subcommand)]
    Tag(TagCommands),

    /// Dependencies between issues
    #[command(subcommand)]
    Dep(DepCommands),

    /// Custom issue fields
    #[command(subcommand)]
    Field(FieldCommands),

    /// Background jobs queued by notifications
    #[command(subcommand)]
    Job(JobCommands),
}

#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the acting user in `.forge/actor`
    Set {
        /// Username
        name: String,
    },
    /// Show the resolved acting user
    Show,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user
    Add {
        /// Username
        name: String,

        /// Full name (defaults to the username)
        #[arg(long)]
        fullname: Option<String>,

        /// Email address (repeatable)
        #[arg(long = "email")]
        emails: Vec<String>,
    },
    /// Show a user by name or email, with groups and watched projects
    Show {
        /// Username or email
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// Create a group owned by the acting user
    Add {
        /// Group name
        name: String,

        /// Display name (defaults to the group name)
        #[arg(long)]
        display_name: Option<String>,

        #[arg(long, default_value = "")]
        description: String,

        /// Group type, one of `groups.types`
        #[arg(long = "type", default_value = "user")]
        group_type: String,
    },
    /// Add a user to a group
    AddUser {
        group: String,
        user: String,

        /// Also make the user a group admin
        #[arg(long)]
        admin: bool,
    },
    /// Remove a user from a group
    RemoveUser { group: String, user: String },
    /// Change a group's display name or description
    Edit {
        group: String,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
    /// Show a group and its members
    Show { group: String },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project owned by the acting user
    New {
        /// Project name
        name: String,

        #[arg(long)]
        namespace: Option<String>,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        private: bool,
    },
    /// Fork a project as the acting user
    Fork { project: String },
    /// Show a project with its settings and tags
    Show { project: String },
    /// Replace the priority map, as `weight=label` pairs
    Priorities {
        project: String,
        #[arg(value_name = "WEIGHT=LABEL")]
        entries: Vec<String>,
    },
    /// Replace the list of close statuses
    CloseStatuses { project: String, statuses: Vec<String> },
    /// Replace the list of milestones
    Milestones { project: String, milestones: Vec<String> },
    /// Set a feature setting; an empty value removes it
    Set {
        project: String,
        key: String,
        #[arg(default_value = "")]
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccessCommands {
    /// Grant a user or group a tier on a project
    Grant {
        project: String,
        /// Username, or group name with --group
        principal: String,
        /// ticket, commit or admin
        level: String,

        #[arg(long)]
        group: bool,
    },
    /// Remove a user's or group's grant
    Revoke {
        project: String,
        principal: String,

        #[arg(long)]
        group: bool,
    },
    /// Show stored grants, or one user's effective tier
    Show {
        project: String,

        #[arg(long)]
        user: Option<String>,
    },
    /// List principals holding at least (or exactly) a tier
    Members {
        project: String,

        #[arg(long, default_value = "ticket")]
        level: String,

        /// Match the stored tier exactly instead of the effective one
        #[arg(long)]
        exact: bool,
    },
    /// List access tiers, highest first
    Levels,
}

#[derive(Subcommand, Debug)]
pub enum WatchCommands {
    /// Set the acting user's watch level: -1 reset, 0 off, 1 issues, 2 commits, 3 all
    Set {
        project: String,
        #[arg(allow_hyphen_values = true)]
        level: String,
    },
    /// Show what a user receives for a project
    Show {
        project: String,

        #[arg(long)]
        user: Option<String>,
    },
    /// Projects a user receives anything for
    List {
        #[arg(long)]
        user: Option<String>,
    },
    /// Watch or unwatch one issue
    Issue {
        /// Issue as `project#id`
        issue: String,

        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum IssueCommands {
    /// Open an issue
    New {
        project: String,
        title: String,

        #[arg(long, default_value = "")]
        content: String,

        #[arg(long)]
        private: bool,

        #[arg(long)]
        priority: Option<i32>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        milestone: Option<String>,
    },
    /// Edit an issue's fields
    Edit {
        /// Issue as `project#id`
        issue: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Open or Closed
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        close_status: Option<String>,

        #[arg(long)]
        private: Option<bool>,

        /// Priority weight, or `none` to clear
        #[arg(long)]
        priority: Option<String>,

        /// Milestone, or `none` to clear
        #[arg(long)]
        milestone: Option<String>,
    },
    /// Assign an issue; omit the assignee to reset
    Assign { issue: String, assignee: Option<String> },
    /// Comment on an issue
    Comment { issue: String, text: String },
    /// Show an issue with tags and dependencies
    Show { issue: String },
    /// Search a project's issues
    Search {
        project: String,

        /// Open, Closed or all
        #[arg(long, default_value = "Open")]
        status: String,

        /// Tag to match; `!tag` excludes (repeatable)
        #[arg(long = "tag", allow_hyphen_values = true)]
        tags: Vec<String>,

        #[arg(long)]
        author: Option<String>,

        /// name, !name, * (any) or !* (none)
        #[arg(long)]
        assignee: Option<String>,

        /// Milestone (repeatable)
        #[arg(long = "milestone")]
        milestones: Vec<String>,

        /// Also match issues without a milestone
        #[arg(long)]
        no_milestone: bool,

        /// Text or glob matched against title and content
        #[arg(long)]
        pattern: Option<String>,

        /// Custom field as `key=value` (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Add tags to a project or `project#id`
    Add {
        target: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from a project or `project#id`
    Remove {
        target: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Make the tag set equal the given list
    Sync { target: String, tags: Vec<String> },
    /// Rename a tag or change its description and color
    Rename {
        project: String,
        old: String,
        new: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        color: Option<String>,
    },
    /// Delete tags from a project's vocabulary
    Delete {
        project: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// List a project's tags, or the tags on `project#id`
    List {
        target: String,

        /// Glob filter on tag text
        #[arg(long)]
        pattern: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Mark an issue as depending on another
    Add {
        /// Issue as `project#id`
        issue: String,
        /// Issue it depends on, `#id` within the same family
        depends_on: String,
    },
    /// Stop an issue depending on another
    Remove { issue: String, depends_on: String },
    /// Make the issue's depends-on set equal the given ids
    Depends { issue: String, ids: Vec<String> },
    /// Make the issue's blocks set equal the given ids
    Blocks { issue: String, ids: Vec<String> },
    /// Show what an issue depends on and blocks
    Show { issue: String },
}

#[derive(Subcommand, Debug)]
pub enum FieldCommands {
    /// Replace a project's custom fields, as `name:type[:opt,opt][:notify]`
    Define {
        project: String,
        #[arg(value_name = "NAME:TYPE")]
        fields: Vec<String>,
    },
    /// Set a custom field on an issue; omit the value to reset
    Set {
        issue: String,
        key: String,
        value: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Show one job, or every queued job
    Status { job_id: Option<String> },
}

impl Cli {
    fn global(&self) -> Global {
        Global {
            root: self.root.clone(),
            actor: self.actor.clone(),
            events: self.events.clone(),
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = self.global();
        match self.command {
            Commands::Init => init::run(&global),
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { name } => actor::run_set(&global, &name),
                ActorCommands::Show => actor::run_show(&global),
            },
            Commands::User(cmd) => match cmd {
                UserCommands::Add {
                    name,
                    fullname,
                    emails,
                } => identity::run_user_add(&global, &name, fullname.as_deref(), &emails),
                UserCommands::Show { name } => identity::run_user_show(&global, &name),
            },
            Commands::Group(cmd) => match cmd {
                GroupCommands::Add {
                    name,
                    display_name,
                    description,
                    group_type,
                } => identity::run_group_add(
                    &global,
                    identity::GroupAddOptions {
                        name,
                        display_name,
                        description,
                        group_type,
                    },
                ),
                GroupCommands::AddUser { group, user, admin } => {
                    identity::run_group_add_user(&global, &group, &user, admin)
                }
                GroupCommands::RemoveUser { group, user } => {
                    identity::run_group_remove_user(&global, &group, &user)
                }
                GroupCommands::Edit {
                    group,
                    display_name,
                    description,
                } => identity::run_group_edit(
                    &global,
                    &group,
                    display_name.as_deref(),
                    description.as_deref(),
                ),
                GroupCommands::Show { group } => identity::run_group_show(&global, &group),
            },
            Commands::Project(cmd) => match cmd {
                ProjectCommands::New {
                    name,
                    namespace,
                    description,
                    private,
                } => project::run_new(
                    &global,
                    project::NewOptions {
                        name,
                        namespace,
                        description,
                        private,
                    },
                ),
                ProjectCommands::Fork { project } => project::run_fork(&global, &project),
                ProjectCommands::Show { project } => project::run_show(&global, &project),
                ProjectCommands::Priorities { project, entries } => {
                    project::run_priorities(&global, &project, &entries)
                }
                ProjectCommands::CloseStatuses { project, statuses } => {
                    project::run_close_statuses(&global, &project, statuses)
                }
                ProjectCommands::Milestones {
                    project,
                    milestones,
                } => project::run_milestones(&global, &project, milestones),
                ProjectCommands::Set {
                    project,
                    key,
                    value,
                } => project::run_set(&global, &project, &key, &value),
            },
            Commands::Access(cmd) => match cmd {
                AccessCommands::Grant {
                    project,
                    principal,
                    level,
                    group,
                } => access::run_grant(&global, &project, &principal, &level, group),
                AccessCommands::Revoke {
                    project,
                    principal,
                    group,
                } => access::run_revoke(&global, &project, &principal, group),
                AccessCommands::Show { project, user } => {
                    access::run_show(&global, &project, user.as_deref())
                }
                AccessCommands::Members {
                    project,
                    level,
                    exact,
                } => access::run_members(&global, &project, &level, exact),
                AccessCommands::Levels => access::run_levels(&global),
            },
            Commands::Watch(cmd) => match cmd {
                WatchCommands::Set { project, level } => watch::run_set(&global, &project, &level),
                WatchCommands::Show { project, user } => {
                    watch::run_show(&global, &project, user.as_deref())
                }
                WatchCommands::List { user } => watch::run_list(&global, user.as_deref()),
                WatchCommands::Issue { issue, off } => watch::run_issue(&global, &issue, !off),
            },
            Commands::Issue(cmd) => match cmd {
                IssueCommands::New {
                    project,
                    title,
                    content,
                    private,
                    priority,
                    assignee,
                    milestone,
                } => issue::run_new(
                    &global,
                    issue::NewOptions {
                        project,
                        title,
                        content,
                        private,
                        priority,
                        assignee,
                        milestone,
                    },
                ),
                IssueCommands::Edit {
                    issue,
                    title,
                    content,
                    status,
                    close_status,
                    private,
                    priority,
                    milestone,
                } => issue::run_edit(
                    &global,
                    issue::EditOptions {
                        issue,
                        title,
                        content,
                        status,
                        close_status,
                        private,
                        priority,
                        milestone,
                    },
                ),
                IssueCommands::Assign { issue, assignee } => {
                    issue::run_assign(&global, &issue, assignee.as_deref())
                }
                IssueCommands::Comment { issue, text } => issue::run_comment(&global, &issue, &text),
                IssueCommands::Show { issue } => issue::run_show(&global, &issue),
                IssueCommands::Search {
                    project,
                    status,
                    tags,
                    author,
                    assignee,
                    milestones,
                    no_milestone,
                    pattern,
                    fields,
                    offset,
                    limit,
                } => issue::run_search(
                    &global,
                    issue::SearchOptions {
                        project,
                        status,
                        tags,
                        author,
                        assignee,
                        milestones,
                        no_milestone,
                        pattern,
                        fields,
                        offset,
                        limit,
                    },
                ),
            },
            Commands::Tag(cmd) => match cmd {
                TagCommands::Add { target, tags } => tag::run_add(&global, &target, &tags),
                TagCommands::Remove { target, tags } => tag::run_remove(&global, &target, &tags),
                TagCommands::Sync { target, tags } => tag::run_sync(&global, &target, &tags),
                TagCommands::Rename {
                    project,
                    old,
                    new,
                    description,
                    color,
                } => tag::run_rename(
                    &global,
                    tag::RenameOptions {
                        project,
                        old,
                        new,
                        description,
                        color,
                    },
                ),
                TagCommands::Delete { project, tags } => tag::run_delete(&global, &project, &tags),
                TagCommands::List { target, pattern } => {
                    tag::run_list(&global, &target, pattern.as_deref())
                }
            },
            Commands::Dep(cmd) => match cmd {
                DepCommands::Add { issue, depends_on } => dep::run_add(&global, &issue, &depends_on),
                DepCommands::Remove { issue, depends_on } => {
                    dep::run_remove(&global, &issue, &depends_on)
                }
                DepCommands::Depends { issue, ids } => dep::run_depends(&global, &issue, &ids),
                DepCommands::Blocks { issue, ids } => dep::run_blocks(&global, &issue, &ids),
                DepCommands::Show { issue } => dep::run_show(&global, &issue),
            },
            Commands::Field(cmd) => match cmd {
                FieldCommands::Define { project, fields } => field::run_define(&global, &project, &fields),
                FieldCommands::Set { issue, key, value } => {
                    field::run_set(&global, &issue, &key, value.as_deref())
                }
            },
            Commands::Job(cmd) => match cmd {
                JobCommands::Status { job_id } => job::run_status(&global, job_id.as_deref()),
            },
        }
    }
}
