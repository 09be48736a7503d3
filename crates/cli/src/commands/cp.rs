//! cp and mv commands - Copy or move an object within one filesystem
//!
//! Source and target must resolve to the same filesystem instance. Copying
//! a path onto itself is a no-op. Large sources are copied in parts by the
//! core, so a spinner is shown while the copy runs.

use std::sync::Arc;

use clap::Args;
use objfs_core::CopyOption;
use serde::Serialize;

use super::{Session, fail};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Copy or move an object
#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source URI (s3://[host]/bucket/key)
    pub source: String,

    /// Target URI (s3://[host]/bucket/key)
    pub target: String,

    /// Replace the target if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

impl CopyArgs {
    fn options(&self) -> Vec<CopyOption> {
        if self.overwrite {
            vec![CopyOption::ReplaceExisting]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Copy,
    Move,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Mode::Copy => "Copying",
            Mode::Move => "Moving",
        }
    }

    fn status(self) -> &'static str {
        match self {
            Mode::Copy => "copied",
            Mode::Move => "moved",
        }
    }
}

#[derive(Debug, Serialize)]
struct CopyOutput {
    source: String,
    target: String,
    status: &'static str,
}

/// Execute the cp or mv command
pub async fn execute(args: CopyArgs, mode: Mode, session: &Session, formatter: &Formatter) -> ExitCode {
    let (fs, source) = match session.open(&args.source).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open source filesystem", &e),
    };
    let (target_fs, target) = match session.open(&args.target).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open target filesystem", &e),
    };

    if !Arc::ptr_eq(&fs, &target_fs) {
        formatter.error("Source and target must be on the same filesystem");
        return ExitCode::UsageError;
    }

    let options = args.options();
    let spinner = formatter.spinner(&format!("{} {source} to {target}", mode.verb()));
    let result = match mode {
        Mode::Copy => fs.copy(&source, &target, &options).await,
        Mode::Move => fs.move_path(&source, &target, &options).await,
    };
    spinner.finish_and_clear();

    if let Err(e) = result {
        return fail(formatter, &format!("{} '{source}' failed", mode.verb()), &e);
    }

    if formatter.is_json() {
        formatter.json(&CopyOutput {
            source: source.to_string(),
            target: target.to_string(),
            status: mode.status(),
        });
    } else {
        formatter.success(&format!("{source} -> {target}"));
    }
    ExitCode::Success
}
