//! Process exit codes
//!
//! Codes are stable so scripts can branch on them.

/// Exit code returned by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments, unusable path, or unsupported option
    UsageError = 2,
    /// Transient store or network failure
    NetworkError = 3,
    AccessDenied = 4,
    NotFound = 5,
    /// Target exists, or directory not empty
    Conflict = 6,
}

impl ExitCode {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            3 => Some(Self::NetworkError),
            4 => Some(Self::AccessDenied),
            5 => Some(Self::NotFound),
            6 => Some(Self::Conflict),
            _ => None,
        }
    }

    /// Exit code for a filesystem error
    pub fn from_error(error: &objfs_core::Error) -> Self {
        Self::from_i32(error.exit_code()).unwrap_or(Self::GeneralError)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objfs_core::Error;

    #[test]
    fn test_error_mapping() {
        assert_eq!(ExitCode::from_error(&Error::NotFound("x".into())), ExitCode::NotFound);
        assert_eq!(ExitCode::from_error(&Error::AccessDenied("x".into())), ExitCode::AccessDenied);
        assert_eq!(ExitCode::from_error(&Error::Transient("x".into())), ExitCode::NetworkError);
        assert_eq!(ExitCode::from_error(&Error::DirectoryNotEmpty("x".into())), ExitCode::Conflict);
        assert_eq!(ExitCode::from_error(&Error::AlreadyExists("x".into())), ExitCode::Conflict);
        assert_eq!(ExitCode::from_error(&Error::InvalidPath("x".into())), ExitCode::UsageError);
        assert_eq!(ExitCode::from_error(&Error::Config("x".into())), ExitCode::GeneralError);
        assert_eq!(ExitCode::from_error(&Error::io("b/k", "boom")), ExitCode::GeneralError);
    }

    #[test]
    fn test_round_trip_codes() {
        for code in 0..=6 {
            assert_eq!(ExitCode::from_i32(code).map(ExitCode::as_i32), Some(code));
        }
        assert_eq!(ExitCode::from_i32(42), None);
    }
}
