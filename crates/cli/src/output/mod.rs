//! Output formatting

mod formatter;

pub use formatter::{Formatter, Theme};

/// Output settings shared by all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Strict JSON on stdout, errors as JSON on stderr
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}

/// Human-readable byte count
pub fn human_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
