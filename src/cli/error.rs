//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::Application(e.into())
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Application(e) => application_exit_code(e),
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Application(e) => application_exit_code(e),
            },
        }
    }
}

fn application_exit_code(e: &ApplicationError) -> i32 {
    match e {
        ApplicationError::Domain(domain) => match domain {
            DomainError::NotFound(_) => crate::exitcode::NOINPUT,
            DomainError::Parse { .. }
            | DomainError::InvalidOperation(_)
            | DomainError::Arithmetic(_) => crate::exitcode::DATAERR,
        },
        ApplicationError::Persistence { .. } | ApplicationError::UnsupportedVersion { .. } => {
            crate::exitcode::DATAERR
        }
        ApplicationError::Config { .. } => crate::exitcode::CONFIG,
        ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exitcode;
    use rstest::rstest;

    #[rstest]
    #[case(DomainError::parse("x", "not a fraction"), exitcode::DATAERR)]
    #[case(DomainError::invalid("no remainder"), exitcode::DATAERR)]
    #[case(DomainError::NotFound("7".into()), exitcode::NOINPUT)]
    fn domain_errors_map_to_sysexits(#[case] err: DomainError, #[case] code: i32) {
        assert_eq!(CliError::from(err).exit_code(), code);
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        let config = CliError::Infra(InfraError::Application(ApplicationError::Config {
            message: "bad".into(),
        }));
        assert_eq!(config.exit_code(), exitcode::CONFIG);

        let io = CliError::Infra(InfraError::io(
            "write",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        ));
        assert_eq!(io.exit_code(), exitcode::IOERR);
        assert_eq!(CliError::Usage("x".into()).exit_code(), exitcode::USAGE);
    }
}
