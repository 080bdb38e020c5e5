// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{fmt, io, process::ExitCode};

/// Failure of a CLI command, each kind exits with its own code.
#[derive(Debug)]
pub enum CliError {
    /// Bad flag or value, exit code 2
    InvalidArgs(String),
    /// No holder for the requested device id, exit code 3
    DeviceNotFound(String),
    /// Driver library missing or registry busy, exit code 4
    Unavailable(String),
    /// No frames or device within the allotted time, exit code 6
    Timeout(String),
    /// Anything else, exit code 1
    General(String),
}

impl CliError {
    fn code(&self) -> u8 {
        match self {
            CliError::General(_) => 1,
            CliError::InvalidArgs(_) => 2,
            CliError::DeviceNotFound(_) => 3,
            CliError::Unavailable(_) => 4,
            CliError::Timeout(_) => 6,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, msg) = match self {
            CliError::InvalidArgs(msg) => ("Invalid arguments", msg),
            CliError::DeviceNotFound(msg) => ("Device not found", msg),
            CliError::Unavailable(msg) => ("Unavailable", msg),
            CliError::Timeout(msg) => ("Timeout", msg),
            CliError::General(msg) => ("Error", msg),
        };
        write!(f, "{}: {}", kind, msg)
    }
}

impl std::error::Error for CliError {}

impl From<uvcholder::Error> for CliError {
    fn from(err: uvcholder::Error) -> Self {
        use uvcholder::Error;

        match err {
            Error::DeviceNotFound(id) => CliError::DeviceNotFound(format!("device {}", id)),
            Error::Unavailable(id) => CliError::Unavailable(format!("device {} is busy", id)),
            Error::LibraryNotLoaded(err) => {
                CliError::Unavailable(format!("Failed to load driver library: {}", err))
            }
            Error::IndexOutOfRange { .. } | Error::InvalidArgument(_) => {
                CliError::InvalidArgs(err.to_string())
            }
            Error::Driver(code) => CliError::General(format!("Driver rejected request: {}", code)),
            other => CliError::General(other.to_string()),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::General(format!("I/O error: {}", err))
    }
}

/// Print the error, if any, and turn it into the process exit code.
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    result.map_or_else(
        |err| {
            eprintln!("{}", err);
            err.exit_code()
        },
        |_| ExitCode::SUCCESS,
    )
}
