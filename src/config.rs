use std::{borrow::Cow, path::PathBuf, time::Duration};

use tracing::{debug, info};
use validator::{Validate, ValidationError};

use crate::{
    catalog::{Catalog, DEFAULT_TEMPLATE},
    network::CreateArgs,
    orchestrator::Mode,
    poller::PollConfig,
    writer::OutputFormat,
};

/// Overrides the built-in template catalog; `--template-dir` wins over it.
pub const TEMPLATE_DIR_ENV: &str = "OCM_TEMPLATE_DIR";

const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Validation errors: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct Schedule {
    #[validate(custom = "validate_poll_interval")]
    pub poll_interval: Duration,

    #[validate(custom = "validate_timeout")]
    pub timeout: Duration,
}

impl Schedule {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Result<Self, Error> {
        let schedule = Self {
            poll_interval,
            timeout,
        };

        match schedule.validate() {
            Ok(_) => Ok(schedule),
            Err(error) => Err(Error::ValidationError(error.to_string())),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll_interval,
            timeout: self.timeout,
        }
    }
}

/// Validated inputs of `create network`, after applying flag and environment
/// precedence.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct Settings {
    #[validate(custom = "validate_template_name")]
    pub template: String,

    pub catalog: Catalog,

    pub mode: Mode,

    pub region: Option<String>,

    #[validate]
    pub schedule: Schedule,

    pub output: OutputFormat,
}

impl Settings {
    pub fn resolve<F>(args: &CreateArgs, env: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let template = match &args.template {
            Some(template) => template.clone(),
            None => {
                info!(
                    "No template name provided in the command. Defaulting to {}",
                    DEFAULT_TEMPLATE
                );
                DEFAULT_TEMPLATE.to_string()
            }
        };

        let env_dir = env(TEMPLATE_DIR_ENV).filter(|dir| !dir.trim().is_empty());
        let catalog = match (&args.template_dir, env_dir) {
            (Some(dir), _) => Catalog::Directory(dir.clone()),
            (None, Some(dir)) => {
                debug!(dir = %dir, "using template directory from {}", TEMPLATE_DIR_ENV);
                Catalog::Directory(PathBuf::from(dir))
            }
            (None, None) => Catalog::BuiltIn,
        };

        let settings = Self {
            template,
            catalog,
            mode: args.mode,
            region: args.region.clone(),
            schedule: Schedule {
                poll_interval: args.poll_interval,
                timeout: args.timeout,
            },
            output: args.output,
        };

        match settings.validate() {
            Ok(_) => Ok(settings),
            Err(error) => Err(Error::ValidationError(error.to_string())),
        }
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_template_name(template: &str) -> Result<(), ValidationError> {
    if template.trim().is_empty() {
        return Err(invalid("template_name", "template name must not be empty"));
    }

    if template.contains('/') || template.contains('\\') || template.contains("..") {
        return Err(invalid(
            "template_name",
            "template name must not contain path separators",
        ));
    }

    return Ok(());
}

fn validate_poll_interval(interval: &Duration) -> Result<(), ValidationError> {
    if *interval < Duration::from_secs(1) || *interval > MAX_POLL_INTERVAL {
        return Err(invalid(
            "poll_interval",
            "poll interval must be between 1s and 5m",
        ));
    }

    return Ok(());
}

fn validate_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if *timeout > MAX_TIMEOUT {
        return Err(invalid("timeout", "timeout must not exceed 24h"));
    }

    return Ok(());
}

fn validate_schedule(schedule: &Schedule) -> Result<(), ValidationError> {
    if schedule.timeout < schedule.poll_interval {
        return Err(invalid(
            "schedule",
            "timeout must not be shorter than the poll interval",
        ));
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{Error, Schedule, Settings, TEMPLATE_DIR_ENV};
    use crate::catalog::Catalog;
    use crate::testing::create_args;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_to_built_in_quickstart_template() {
        let settings = Settings::resolve(&create_args(), no_env).unwrap();

        assert_eq!(settings.template, "rosa-quickstart-default-vpc");
        assert_eq!(settings.catalog, Catalog::BuiltIn);
        assert_eq!(settings.schedule.poll_config().interval, Duration::from_secs(5));
    }

    #[test]
    fn template_dir_comes_from_environment() {
        let env = |key: &str| (key == TEMPLATE_DIR_ENV).then(|| String::from("/env/templates"));

        let settings = Settings::resolve(&create_args(), env).unwrap();

        assert_eq!(
            settings.catalog,
            Catalog::Directory(PathBuf::from("/env/templates"))
        );
    }

    #[test]
    fn template_dir_flag_overrides_environment() {
        let mut args = create_args();
        args.template_dir = Some(PathBuf::from("/flag/templates"));
        let env = |key: &str| (key == TEMPLATE_DIR_ENV).then(|| String::from("/env/templates"));

        let settings = Settings::resolve(&args, env).unwrap();

        assert_eq!(
            settings.catalog,
            Catalog::Directory(PathBuf::from("/flag/templates"))
        );
    }

    #[test]
    fn blank_environment_value_is_ignored() {
        let env = |_: &str| Some(String::from("  "));

        let settings = Settings::resolve(&create_args(), env).unwrap();

        assert_eq!(settings.catalog, Catalog::BuiltIn);
    }

    #[test]
    fn template_name_with_path_separator_is_rejected() {
        let mut args = create_args();
        args.template = Some(String::from("../etc"));

        let result = Settings::resolve(&args, no_env);

        match result.err().unwrap() {
            Error::ValidationError(message) => {
                assert!(message.contains("template name must not contain path separators"))
            }
        }
    }

    #[test]
    fn poll_interval_out_of_range_is_rejected() {
        assert!(Schedule::new(Duration::from_millis(10), Duration::from_secs(60)).is_err());
        assert!(Schedule::new(Duration::from_secs(600), Duration::from_secs(3600)).is_err());
    }

    #[test]
    fn timeout_shorter_than_interval_is_rejected() {
        let result = Schedule::new(Duration::from_secs(30), Duration::from_secs(10));

        match result.err().unwrap() {
            Error::ValidationError(message) => {
                assert!(message.contains("timeout must not be shorter than the poll interval"))
            }
        }
    }

    #[test]
    fn valid_schedule_builds_poll_config() {
        let schedule = Schedule::new(Duration::from_secs(2), Duration::from_secs(120)).unwrap();

        let config = schedule.poll_config();

        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(120));
    }
}
