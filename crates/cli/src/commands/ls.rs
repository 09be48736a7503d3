//! ls command - List the children of a directory
//!
//! Names come from the lazy directory listing. Attributes are read after
//! listing, so files are served from the attribute cache the listing seeded.

use clap::Args;
use comfy_table::{Table, presets};
use objfs_core::{FileAttributes, ObjectPath};
use serde::Serialize;

use super::{Session, fail};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, human_size};

/// List directory contents
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory URI (s3://[host]/bucket/dir)
    pub uri: String,

    /// Show sizes and modification times
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct LsEntry {
    name: String,
    path: String,
    is_dir: bool,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
}

impl LsEntry {
    fn new(path: &ObjectPath, attributes: &FileAttributes) -> Self {
        Self {
            name: path.file_name().unwrap_or_default().to_string(),
            path: path.to_string(),
            is_dir: attributes.is_directory,
            size_bytes: attributes.size,
            last_modified: attributes
                .last_modified_time
                .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct LsOutput {
    path: String,
    entries: Vec<LsEntry>,
    count: usize,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, session: &Session, formatter: &Formatter) -> ExitCode {
    let (fs, dir) = match session.open(&args.uri).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open filesystem", &e),
    };

    let children = match fs.list_children(&dir) {
        Ok(listing) => listing.collect().await,
        Err(e) => Err(e),
    };
    let children = match children {
        Ok(children) => children,
        Err(e) => return fail(formatter, &format!("Failed to list '{dir}'"), &e),
    };

    let mut entries = Vec::with_capacity(children.len());
    for child in &children {
        match fs.read_attributes(child).await {
            Ok(attributes) => entries.push(LsEntry::new(child, &attributes)),
            Err(e) => return fail(formatter, &format!("Failed to read '{child}'"), &e),
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if formatter.is_json() {
        formatter.json(&LsOutput {
            path: dir.to_string(),
            count: entries.len(),
            entries,
        });
    } else if args.long {
        formatter.println(&long_table(&entries, formatter).to_string());
    } else {
        for entry in &entries {
            formatter.println(&display_name(entry, formatter));
        }
    }

    ExitCode::Success
}

fn display_name(entry: &LsEntry, formatter: &Formatter) -> String {
    if entry.is_dir {
        formatter.style_dir(&format!("{}/", entry.name))
    } else {
        formatter.style_file(&entry.name)
    }
}

fn long_table(entries: &[LsEntry], formatter: &Formatter) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    for entry in entries {
        let size = if entry.is_dir {
            String::from("-")
        } else {
            human_size(entry.size_bytes)
        };
        table.add_row(vec![
            formatter.style_date(entry.last_modified.as_deref().unwrap_or("")),
            formatter.style_size(&size),
            display_name(entry, formatter),
        ]);
    }
    table
}
