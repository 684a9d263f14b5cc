//! forgecore field command implementations.

use crate::error::{Error, Result};
use crate::fields::{self, CustomFieldDef, CustomFieldType};

use super::context::{apply, parse_issue};
use super::Global;

/// Parse `name:type[:opt,opt][:notify]`.
fn parse_def(raw: &str) -> Result<CustomFieldDef> {
    let mut parts = raw.split(':').map(str::trim);
    let name = parts.next().filter(|name| !name.is_empty());
    let key_type = parts.next();
    let (Some(name), Some(key_type)) = (name, key_type) else {
        return Err(Error::InvalidArgument(format!(
            "expected NAME:TYPE[:OPTIONS][:notify], got '{raw}'"
        )));
    };

    let mut def = CustomFieldDef::new(name, key_type.parse::<CustomFieldType>()?);
    for part in parts {
        if part.eq_ignore_ascii_case("notify") {
            def = def.notifying();
        } else if !part.is_empty() {
            def = def.with_options(part.split(',').map(str::trim).filter(|opt| !opt.is_empty()));
        }
    }
    Ok(def)
}

pub fn run_define(global: &Global, project: &str, raw: &[String]) -> Result<()> {
    let defs = raw.iter().map(|entry| parse_def(entry)).collect::<Result<Vec<_>>>()?;
    apply(global, "field define", project, |ctx| {
        let message = fields::set_custom_key_fields(&mut ctx.session, project, defs, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_set(global: &Global, issue: &str, key: &str, value: Option<&str>) -> Result<()> {
    let target = parse_issue(issue)?;
    apply(global, "field set", issue, |ctx| {
        let message = fields::set_custom_key_value(&mut ctx.session, &target, key, value, &ctx.actor)?;
        Ok(message.into_iter().collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_parse_options_and_notify() {
        let def = parse_def("severity:list:low, high:notify").unwrap();
        assert_eq!(def.name, "severity");
        assert_eq!(def.key_type, CustomFieldType::List);
        assert_eq!(def.data, Some(vec!["low".to_string(), "high".to_string()]));
        assert!(def.notify);

        let def = parse_def("bugzilla:url").unwrap();
        assert_eq!(def.key_type, CustomFieldType::Url);
        assert!(!def.notify);
        assert!(def.data.is_none());

        assert!(parse_def("severity").is_err());
        assert!(parse_def("severity:colour").is_err());
    }
}
