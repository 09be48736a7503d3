//! rm command - Remove a file or an empty directory
//!
//! Removing a path that does not exist succeeds.

use clap::Args;
use serde::Serialize;

use super::{Session, fail};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Remove a file or empty directory
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Path URI (s3://[host]/bucket/key)
    pub uri: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    path: String,
    status: &'static str,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, session: &Session, formatter: &Formatter) -> ExitCode {
    let (fs, path) = match session.open(&args.uri).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open filesystem", &e),
    };

    if let Err(e) = fs.delete(&path).await {
        return fail(formatter, &format!("Failed to remove '{path}'"), &e);
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            path: path.to_string(),
            status: "removed",
        });
    } else {
        formatter.success(&format!("Removed {path}"));
    }
    ExitCode::Success
}
