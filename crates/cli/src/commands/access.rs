//! access command - Check access to a path
//!
//! With no mode flags only existence is checked.

use clap::Args;
use objfs_core::AccessMode;
use serde::Serialize;

use super::{Session, fail};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Check access to a path
#[derive(Args, Debug)]
pub struct AccessArgs {
    /// Path URI (s3://[host]/bucket/key)
    pub uri: String,

    /// Require read access
    #[arg(short, long)]
    pub read: bool,

    /// Require write access
    #[arg(short, long)]
    pub write: bool,

    /// Require execute access
    #[arg(short = 'x', long)]
    pub execute: bool,
}

impl AccessArgs {
    fn modes(&self) -> Vec<AccessMode> {
        [
            (self.read, AccessMode::Read),
            (self.write, AccessMode::Write),
            (self.execute, AccessMode::Execute),
        ]
        .into_iter()
        .filter_map(|(wanted, mode)| wanted.then_some(mode))
        .collect()
    }
}

#[derive(Debug, Serialize)]
struct AccessOutput {
    path: String,
    modes: Vec<AccessMode>,
    access: &'static str,
}

/// Execute the access command
pub async fn execute(args: AccessArgs, session: &Session, formatter: &Formatter) -> ExitCode {
    let (fs, path) = match session.open(&args.uri).await {
        Ok(opened) => opened,
        Err(e) => return fail(formatter, "Failed to open filesystem", &e),
    };

    let modes = args.modes();
    if let Err(e) = fs.check_access(&path, &modes).await {
        return fail(formatter, &format!("Access check on '{path}' failed"), &e);
    }

    if formatter.is_json() {
        formatter.json(&AccessOutput {
            path: path.to_string(),
            modes,
            access: "granted",
        });
    } else {
        let modes = if modes.is_empty() {
            "exists".to_string()
        } else {
            modes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };
        formatter.success(&format!("{path}: {modes}"));
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_from_flags() {
        let args = AccessArgs {
            uri: "s3:///bucket/key".to_string(),
            read: true,
            write: false,
            execute: true,
        };
        assert_eq!(args.modes(), vec![AccessMode::Read, AccessMode::Execute]);

        let none = AccessArgs {
            read: false,
            execute: false,
            ..args
        };
        assert!(none.modes().is_empty());
    }
}
