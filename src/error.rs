use crate::{catalog, cloudformation, config, params, poller, status::StackStatus};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Settings(#[from] config::Error),

    #[error(transparent)]
    Catalog(#[from] catalog::Error),

    #[error(transparent)]
    Parameters(#[from] params::Error),

    #[error(transparent)]
    Provider(#[from] cloudformation::Error),

    #[error("Stack {stack} entered status {status}{}", reason_suffix(.reasons))]
    StackFailed {
        stack: String,
        status: StackStatus,
        reasons: Vec<String>,
    },

    #[error(transparent)]
    Timeout(poller::Error),

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<poller::Error> for Error {
    fn from(error: poller::Error) -> Self {
        match error {
            poller::Error::Api(error) => Error::Provider(error),
            timeout @ poller::Error::Timeout { .. } => Error::Timeout(timeout),
        }
    }
}

fn reason_suffix(reasons: &[String]) -> String {
    if reasons.is_empty() {
        return String::new();
    }

    return format!(": {}", reasons.join("; "));
}

/// Exit status for input and usage errors. clap exits with 2 on its own.
pub const EXIT_INVALID: i32 = 1;
pub const EXIT_TIMEOUT: i32 = 3;
pub const EXIT_PROVIDER: i32 = 4;

impl Error {
    /// Failures detected by this tool, as opposed to ones relayed from the
    /// provider.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Error::Provider(_) | Error::StackFailed { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Provider(_) | Error::StackFailed { .. } => EXIT_PROVIDER,
            Error::Timeout(_) => EXIT_TIMEOUT,
            _ => EXIT_INVALID,
        }
    }
}
