//! stat command - Show attributes of a file or directory

use std::collections::BTreeMap;

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use super::{Session, fail};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Show attributes
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Path URI (s3://[host]/bucket/key)
    pub uri: String,

    /// Include owner, group and permissions derived from the ACL
    #[arg(long)]
    pub posix: bool,

    /// Attribute selector, e.g. "size,lastModifiedTime" or "posix:owner"
    #[arg(short, long, conflicts_with = "posix")]
    pub attributes: Option<String>,
}

impl StatArgs {
    fn selector(&self) -> &str {
        match (&self.attributes, self.posix) {
            (Some(selector), _) => selector,
            (None, true) => "posix:*",
            (None, false) => "basic:*",
        }
    }
}

#[derive(Debug, Serialize)]
struct StatOutput {
    path: String,
    attributes: BTreeMap<String, Value>,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, session: &Session, formatter: &Formatter) -> ExitCode {
    let (fs, path) = match session.open(&args.uri).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open filesystem", &e),
    };

    let attributes = match fs.read_attribute_map(&path, args.selector()).await {
        Ok(attributes) => attributes,
        Err(e) => return fail(formatter, &format!("Failed to stat '{path}'"), &e),
    };

    if formatter.is_json() {
        formatter.json(&StatOutput {
            path: path.to_string(),
            attributes,
        });
    } else {
        formatter.println(&format!("{} {path}", formatter.style_key("Path:")));
        for line in render_lines(&attributes, formatter) {
            formatter.println(&line);
        }
    }

    ExitCode::Success
}

fn render_lines(attributes: &BTreeMap<String, Value>, formatter: &Formatter) -> Vec<String> {
    let width = attributes.keys().map(String::len).max().unwrap_or(0) + 1;
    attributes
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => "-".to_string(),
                other => other.to_string(),
            };
            let label = format!("{:<width$}", format!("{name}:"));
            format!("{} {value}", formatter.style_key(&label))
        })
        .collect()
}
