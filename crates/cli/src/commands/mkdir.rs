//! mkdir command - Create a directory
//!
//! Writes an empty `name/` marker object. Creating a directory directly
//! under the bucket root creates the bucket first when it is missing.

use clap::Args;
use serde::Serialize;

use super::{Session, fail};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Create a directory
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Directory URI (s3://[host]/bucket/dir)
    pub uri: String,
}

#[derive(Debug, Serialize)]
struct MkdirOutput {
    path: String,
    status: &'static str,
}

/// Execute the mkdir command
pub async fn execute(args: MkdirArgs, session: &Session, formatter: &Formatter) -> ExitCode {
    let (fs, path) = match session.open(&args.uri).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open filesystem", &e),
    };

    if let Err(e) = fs.create_directory(&path).await {
        return fail(formatter, &format!("Failed to create '{path}'"), &e);
    }

    if formatter.is_json() {
        formatter.json(&MkdirOutput {
            path: path.to_string(),
            status: "created",
        });
    } else {
        formatter.success(&format!("Created {}", formatter.style_dir(&path.to_string())));
    }
    ExitCode::Success
}
