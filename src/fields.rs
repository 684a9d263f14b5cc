//! Per-project custom fields on issues.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::access::{self, AccessLevel};
use crate::error::{Error, Result};
use crate::model::IssueKey;
use crate::notify::{Notification, Topic};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldType {
    Text,
    Boolean,
    Url,
    List,
    Date,
}

impl CustomFieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomFieldType::Text => "text",
            CustomFieldType::Boolean => "boolean",
            CustomFieldType::Url => "url",
            CustomFieldType::List => "list",
            CustomFieldType::Date => "date",
        }
    }
}

impl fmt::Display for CustomFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomFieldType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(CustomFieldType::Text),
            "boolean" => Ok(CustomFieldType::Boolean),
            "url" => Ok(CustomFieldType::Url),
            "list" => Ok(CustomFieldType::List),
            "date" => Ok(CustomFieldType::Date),
            other => Err(Error::InvalidArgument(format!(
                "unknown custom field type '{other}' (expected text|boolean|url|list|date)"
            ))),
        }
    }
}

/// Definition of one custom field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub name: String,
    pub key_type: CustomFieldType,
    /// Allowed values for `list` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
    #[serde(default)]
    pub notify: bool,
}

impl CustomFieldDef {
    pub fn new(name: impl Into<String>, key_type: CustomFieldType) -> Self {
        Self {
            name: name.into(),
            key_type,
            data: None,
            notify: false,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn notifying(mut self) -> Self {
        self.notify = true;
        self
    }

    /// Normalize a raw value; `None` means the field is reset.
    fn normalize(&self, raw: &str) -> Result<Option<String>> {
        let value = raw.trim();
        let invalid = |reason: &str| Error::InvalidCustomValue {
            field: self.name.clone(),
            reason: reason.to_string(),
        };

        match self.key_type {
            CustomFieldType::Boolean => match value.to_ascii_lowercase().as_str() {
                "" | "false" | "0" | "no" | "off" => Ok(None),
                "true" | "1" | "yes" | "on" | "y" => Ok(Some("true".to_string())),
                _ => Err(invalid("expected a boolean")),
            },
            _ if value.is_empty() => Ok(None),
            CustomFieldType::Text => Ok(Some(value.to_string())),
            CustomFieldType::Url => {
                if value.starts_with("http://") || value.starts_with("https://") {
                    Ok(Some(value.to_string()))
                } else {
                    Err(invalid("expected an http or https URL"))
                }
            }
            CustomFieldType::List => {
                let options = self.data.as_deref().unwrap_or_default();
                if options.iter().any(|option| option == value) {
                    Ok(Some(value.to_string()))
                } else {
                    Err(invalid(&format!("expected one of: {}", options.join(", "))))
                }
            }
            CustomFieldType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|date| Some(date.format("%Y-%m-%d").to_string()))
                .map_err(|_| invalid("expected a date as YYYY-MM-DD")),
        }
    }
}

/// Replace the project's custom field definitions.
pub fn set_custom_key_fields(
    session: &mut Session,
    project: &str,
    defs: Vec<CustomFieldDef>,
    actor: &str,
) -> Result<String> {
    access::require_level(session.state(), project, actor, AccessLevel::Admin, "edit custom fields")?;

    let mut seen = BTreeSet::new();
    let mut cleaned = Vec::with_capacity(defs.len());
    for mut def in defs {
        def.name = def.name.trim().to_string();
        if def.name.is_empty() {
            return Err(Error::InvalidArgument("custom field name cannot be empty".to_string()));
        }
        if !seen.insert(def.name.clone()) {
            return Err(Error::InvalidArgument(format!(
                "custom field '{}' defined twice",
                def.name
            )));
        }
        match def.key_type {
            CustomFieldType::List => {
                let options: Vec<String> = def
                    .data
                    .take()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|option| option.trim().to_string())
                    .filter(|option| !option.is_empty())
                    .collect();
                if options.is_empty() {
                    return Err(Error::InvalidCustomValue {
                        field: def.name,
                        reason: "list fields need at least one option".to_string(),
                    });
                }
                def.data = Some(options);
            }
            _ => def.data = None,
        }
        cleaned.push(def);
    }

    let record = session.state_mut().project_mut(project)?;
    if record.custom_fields == cleaned {
        return Err(Error::NoChange("Custom fields unchanged".to_string()));
    }
    record.custom_fields = cleaned;

    let state = session.state_mut();
    let kept: BTreeSet<String> = state
        .project(project)?
        .custom_fields
        .iter()
        .map(|def| def.name.clone())
        .collect();
    for issue in state.issues.iter_mut().filter(|issue| issue.project == project) {
        issue.custom_values.retain(|name, _| kept.contains(name));
    }

    let message = "List of custom fields updated";
    let notification = Notification::for_project(session.state(), project, Topic::ProjectEdit, actor)
        .with_messages([message])
        .with_payload(serde_json::json!({ "custom_fields": kept }));
    session.record(notification);
    Ok(message.to_string())
}

/// Set or reset one custom field on an issue.
///
/// Returns `None` when the stored value is already the requested one.
pub fn set_custom_key_value(
    session: &mut Session,
    issue: &IssueKey,
    key: &str,
    value: Option<&str>,
    actor: &str,
) -> Result<Option<String>> {
    let state = session.state();
    access::require_level(state, &issue.project, actor, AccessLevel::Ticket, "edit custom fields")?;
    let def = state
        .project(&issue.project)?
        .custom_field(key)
        .ok_or_else(|| Error::CustomFieldNotFound(key.to_string()))?
        .clone();
    let new_value = match value {
        Some(raw) => def.normalize(raw)?,
        None => None,
    };

    let record = session.state_mut().issue_mut(issue)?;
    let old_value = record.custom_values.get(key).cloned();
    if old_value == new_value {
        return Ok(None);
    }

    let message = match (&new_value, &old_value) {
        (Some(new), Some(old)) => format!("Custom field {key} adjusted to {new} (was: {old})"),
        (Some(new), None) => format!("Custom field {key} adjusted to {}", display_value(&def, new)),
        (None, Some(old)) => format!("Custom field {key} reset (from {old})"),
        (None, None) => return Ok(None),
    };
    match &new_value {
        Some(new) => {
            record.custom_values.insert(key.to_string(), new.clone());
        }
        None => {
            record.custom_values.remove(key);
        }
    }
    record.updated_at = chrono::Utc::now();
    tracing::debug!(issue = %issue, field = key, "custom field updated");

    let mut notification = Notification::for_issue(session.state(), issue, Topic::IssueCustomFieldsEdit, actor)
        .with_messages([message.clone()])
        .with_payload(serde_json::json!({
            "issue": issue,
            "field": key,
            "value": new_value,
            "notify": def.notify,
        }));
    if !def.notify {
        notification.audience.clear();
    }
    session.record(notification);
    Ok(Some(message))
}

fn display_value(def: &CustomFieldDef, value: &str) -> String {
    match def.key_type {
        CustomFieldType::Boolean => "True".to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn setup() -> (Session, IssueKey) {
        let mut session = fixtures::session();
        let key = fixtures::issue(&mut session, "test", "Test issue", "pingou");
        set_custom_key_fields(
            &mut session,
            "test",
            vec![
                CustomFieldDef::new("tested", CustomFieldType::Boolean),
                CustomFieldDef::new("state", CustomFieldType::List)
                    .with_options(["In progress", "Done"])
                    .notifying(),
                CustomFieldDef::new("bugzilla", CustomFieldType::Url),
                CustomFieldDef::new("due", CustomFieldType::Date),
            ],
            "pingou",
        )
        .unwrap();
        (session, key)
    }

    #[test]
    fn boolean_field_messages() {
        let (mut session, key) = setup();
        assert_eq!(
            set_custom_key_value(&mut session, &key, "tested", Some("true"), "pingou").unwrap(),
            Some("Custom field tested adjusted to True".to_string())
        );
        assert_eq!(
            set_custom_key_value(&mut session, &key, "tested", Some("yes"), "pingou").unwrap(),
            None
        );
        assert_eq!(
            set_custom_key_value(&mut session, &key, "tested", Some("false"), "pingou").unwrap(),
            Some("Custom field tested reset (from true)".to_string())
        );
    }

    #[test]
    fn list_field_messages_and_validation() {
        let (mut session, key) = setup();
        assert_eq!(
            set_custom_key_value(&mut session, &key, "state", Some("In progress"), "pingou").unwrap(),
            Some("Custom field state adjusted to In progress".to_string())
        );
        assert_eq!(
            set_custom_key_value(&mut session, &key, "state", Some("Done"), "pingou").unwrap(),
            Some("Custom field state adjusted to Done (was: In progress)".to_string())
        );
        let err = set_custom_key_value(&mut session, &key, "state", Some("Later"), "pingou")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCustomValue { .. }));
    }

    #[test]
    fn url_and_date_are_validated() {
        let (mut session, key) = setup();
        assert!(set_custom_key_value(&mut session, &key, "bugzilla", Some("ftp://x"), "pingou").is_err());
        assert!(set_custom_key_value(&mut session, &key, "bugzilla", Some("https://bugz.example.com/1"), "pingou")
            .unwrap()
            .is_some());
        assert!(set_custom_key_value(&mut session, &key, "due", Some("2026-13-01"), "pingou").is_err());
        assert!(set_custom_key_value(&mut session, &key, "due", Some("2026-10-18"), "pingou")
            .unwrap()
            .is_some());
    }

    #[test]
    fn unknown_field_and_unauthorized_actor() {
        let (mut session, key) = setup();
        let err = set_custom_key_value(&mut session, &key, "nope", Some("x"), "pingou").unwrap_err();
        assert!(matches!(err, Error::CustomFieldNotFound(_)));
        let err = set_custom_key_value(&mut session, &key, "tested", Some("true"), "foo").unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }

    #[test]
    fn definitions_are_validated_and_pruned() {
        let (mut session, key) = setup();
        set_custom_key_value(&mut session, &key, "tested", Some("true"), "pingou").unwrap();

        let err = set_custom_key_fields(
            &mut session,
            "test",
            vec![CustomFieldDef::new("state", CustomFieldType::List)],
            "pingou",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCustomValue { .. }));

        let err = set_custom_key_fields(
            &mut session,
            "test",
            vec![
                CustomFieldDef::new("a", CustomFieldType::Text),
                CustomFieldDef::new("a", CustomFieldType::Url),
            ],
            "pingou",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        assert_eq!(
            set_custom_key_fields(
                &mut session,
                "test",
                vec![CustomFieldDef::new("bugzilla", CustomFieldType::Url)],
                "pingou",
            )
            .unwrap(),
            "List of custom fields updated"
        );
        assert!(session.state().issue(&key).unwrap().custom_values.is_empty());
    }
}
