//! forgecore user and group commands

use crate::error::Result;
use crate::identity::{self, NewGroup};
use crate::model::{Group, User};
use crate::output::{emit_success, HumanOutput};
use crate::watch;

use super::context::{apply, Context};
use super::Global;

pub fn run_user_add(global: &Global, name: &str, fullname: Option<&str>, emails: &[String]) -> Result<()> {
    apply(global, "user add", name, |ctx| {
        let message = identity::create_user(&mut ctx.session, name, fullname.unwrap_or(name), emails)?;
        Ok(vec![message])
    })
}

#[derive(serde::Serialize)]
struct UserShowReport<'a> {
    user: &'a User,
    groups: Vec<&'a str>,
    watching: Vec<String>,
}

pub fn run_user_show(global: &Global, name: &str) -> Result<()> {
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    let user = state.require_user(name)?;

    let report = UserShowReport {
        user,
        groups: state.groups_of(&user.name).map(|group| group.name.as_str()).collect(),
        watching: watch::user_watch_list(state, &user.name)
            .into_iter()
            .map(|project| project.fullname())
            .collect(),
    };

    let mut human = HumanOutput::new(format!("User {}", user.name));
    human.push_summary("fullname", user.fullname.clone());
    human.push_summary("emails", user.emails.join(", "));
    human.push_summary("groups", report.groups.join(", "));
    for project in &report.watching {
        human.push_detail(format!("watching {project}"));
    }

    emit_success(global.output(), "user show", &report, Some(&human))
}

/// Options for `forgecore group add`
pub struct GroupAddOptions {
    pub name: String,
    pub display_name: Option<String>,
    pub description: String,
    pub group_type: String,
}

pub fn run_group_add(global: &Global, options: GroupAddOptions) -> Result<()> {
    apply(global, "group add", &options.name, |ctx| {
        let rules = &ctx.config.groups;
        let new = NewGroup {
            name: &options.name,
            display_name: options.display_name.as_deref().unwrap_or(&options.name),
            description: &options.description,
            group_type: &options.group_type,
            creator: &ctx.actor,
        };
        let message = identity::add_group(&mut ctx.session, &new, rules)?;
        Ok(vec![message])
    })
}

pub fn run_group_add_user(global: &Global, group: &str, user: &str, admin: bool) -> Result<()> {
    apply(global, "group add-user", group, |ctx| {
        let message = identity::add_user_to_group(&mut ctx.session, user, group, &ctx.actor, admin)?;
        Ok(vec![message])
    })
}

pub fn run_group_remove_user(global: &Global, group: &str, user: &str) -> Result<()> {
    apply(global, "group remove-user", group, |ctx| {
        let message = identity::delete_user_of_group(&mut ctx.session, user, group, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_group_edit(
    global: &Global,
    group: &str,
    display_name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    apply(global, "group edit", group, |ctx| {
        let message = identity::edit_group_info(&mut ctx.session, group, display_name, description, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_group_show(global: &Global, name: &str) -> Result<()> {
    let ctx = Context::open(global)?;
    let group: &Group = ctx.session.state().group(name)?;

    let mut human = HumanOutput::new(format!("Group {} ({})", group.display_name, group.name));
    human.push_summary("type", group.group_type.clone());
    human.push_summary("creator", group.creator.clone());
    if !group.description.is_empty() {
        human.push_summary("description", group.description.clone());
    }
    for member in &group.members {
        if group.is_admin(member) {
            human.push_detail(format!("{member} (admin)"));
        } else {
            human.push_detail(member.clone());
        }
    }

    emit_success(global.output(), "group show", group, Some(&human))
}
