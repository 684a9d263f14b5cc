//! Report rendering for forgecore commands.
//!
//! Every command prints either the `forge.v1` JSON envelope or a short human
//! report: a header line (usually the first change message), then the
//! summary, the remaining change messages, details, warnings and next steps.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "forge.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Changes,
    Details,
    Warnings,
    NextSteps,
}

impl Section {
    const ORDER: [Section; 4] = [
        Section::Changes,
        Section::Details,
        Section::Warnings,
        Section::NextSteps,
    ];

    fn title(self) -> &'static str {
        match self {
            Section::Changes => "Changes",
            Section::Details => "Details",
            Section::Warnings => "Warnings",
            Section::NextSteps => "Next steps",
        }
    }
}

/// Human-readable report for one command.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    entries: Vec<(Section, String)>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    /// A change message beyond the one used as header.
    pub fn push_change(&mut self, message: impl Into<String>) {
        self.entries.push((Section::Changes, message.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.entries.push((Section::Details, value.into()));
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.entries.push((Section::Warnings, value.into()));
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.entries.push((Section::NextSteps, value.into()));
    }

    fn section(&self, section: Section) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(move |(kind, _)| *kind == section)
            .map(|(_, line)| line.as_str())
    }

    fn collect(&self, section: Section) -> Vec<String> {
        self.section(section).map(str::to_string).collect()
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;

        if !self.summary.is_empty() {
            f.write_str("\n\nSummary:")?;
            for (key, value) in &self.summary {
                if value.is_empty() {
                    write!(f, "\n- {key}")?;
                } else {
                    write!(f, "\n- {key}: {value}")?;
                }
            }
        }

        for section in Section::ORDER {
            let mut lines = self.section(section).peekable();
            if lines.peek().is_none() {
                continue;
            }
            write!(f, "\n\n{}:", section.title())?;
            for line in lines {
                write!(f, "\n- {line}")?;
            }
        }
        Ok(())
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.collect(Section::Warnings)).unwrap_or_default();
        let next_steps = human.map(|h| h.collect(Section::NextSteps)).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{human}");
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    let hint = next_steps.first().map(|step| step.as_str());
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: err.kind().as_str(),
                details: err.details(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error[{}]: {err}", err.kind().as_str());
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    output.to_string()
}

/// Commands that take a subcommand, for error envelopes
const GROUPED_COMMANDS: &[&str] = &[
    "actor", "user", "group", "project", "access", "watch", "issue", "tag", "dep", "field", "job",
];

/// Flags whose value is a separate argument
const VALUE_FLAGS: &[&str] = &["--root", "--actor", "--events"];

pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut words = Vec::new();
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_value = VALUE_FLAGS.contains(&arg.as_str());
            continue;
        }
        words.push(arg);
        let grouped = GROUPED_COMMANDS.contains(&words[0].as_str());
        if words.len() == 2 || !grouped {
            break;
        }
    }

    if words.is_empty() {
        "forgecore".to_string()
    } else {
        words.join(" ")
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NotInitialized(_) => vec!["forgecore init".to_string()],
        Error::InvalidConfig(_) => vec!["fix .forge.toml then retry".to_string()],
        Error::UserNotFound(_) => vec!["forgecore user add <name>".to_string()],
        Error::ProjectNotFound(_) => vec!["forgecore project new <name>".to_string()],
        Error::NotAuthorized { .. } => vec!["forgecore access show <project>".to_string()],
        Error::LockFailed(_) => vec!["retry once the other forgecore command finishes".to_string()],
        Error::TagNotFound(_) => vec!["forgecore tag list <project>".to_string()],
        _ => Vec::new(),
    }
}
