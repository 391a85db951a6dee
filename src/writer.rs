use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{Template, TEMPLATE_FILE_NAME};
use crate::orchestrator::Submission;
use crate::status::StackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct CreateReport<'a> {
    submission: &'a Submission,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a StackState>,
}

#[derive(Serialize)]
struct DeleteReport<'a> {
    stack_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a StackState>,
}

/// Writes a built-in template next to the caller so a printed command can
/// reference it with `file://`.
pub fn materialize(template: &Template, dir: &Path) -> Result<PathBuf, std::io::Error> {
    let path = dir.join(format!("{}.{}", template.name, TEMPLATE_FILE_NAME));
    fs::write(&path, &template.body)?;

    return Ok(path);
}

pub fn render_create(
    submission: &Submission,
    stack: Option<&StackState>,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(&CreateReport { submission, stack });
    }

    let text = match (submission, stack) {
        (Submission::Manual { command }, _) => command.clone(),
        (Submission::Created { stack_name, .. }, Some(stack)) => {
            format!("Stack {} is {}", stack_name, stack.status)
        }
        (
            Submission::Created {
                stack_name,
                stack_id,
                ..
            },
            None,
        ) => format!("Stack {} created ({})", stack_name, stack_id),
    };

    return Ok(text);
}

pub fn render_delete(
    stack_name: &str,
    stack: Option<&StackState>,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(&DeleteReport { stack_name, stack });
    }

    let text = match stack {
        Some(stack) => format!("Stack {} is {}", stack_name, stack.status),
        None => format!("Stack {} deletion requested", stack_name),
    };

    return Ok(text);
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{materialize, render_create, render_delete, OutputFormat};
    use crate::catalog::Catalog;
    use crate::orchestrator::Submission;
    use crate::status::{StackState, StackStatus};

    fn created() -> Submission {
        Submission::Created {
            stack_name: String::from("net"),
            stack_id: String::from("arn:stack/net/1"),
            region: String::from("us-west-2"),
        }
    }

    fn complete() -> StackState {
        StackState {
            name: String::from("net"),
            stack_id: Some(String::from("arn:stack/net/1")),
            status: StackStatus::CreateComplete,
            reason: None,
        }
    }

    #[test]
    fn materializes_built_in_template() {
        let dir = tempdir().unwrap();
        let template = Catalog::BuiltIn
            .resolve("rosa-quickstart-default-vpc")
            .unwrap();

        let path = materialize(&template, dir.path()).unwrap();

        assert_eq!(
            path,
            dir.path()
                .join("rosa-quickstart-default-vpc.cloudformation.yaml")
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), template.body);
    }

    #[test]
    fn text_output_for_created_stack() {
        let text = render_create(&created(), Some(&complete()), OutputFormat::Text).unwrap();

        assert_eq!(text, "Stack net is CREATE_COMPLETE");
    }

    #[test]
    fn text_output_for_manual_mode_is_the_command() {
        let submission = Submission::Manual {
            command: String::from("aws cloudformation create-stack --stack-name net"),
        };

        let text = render_create(&submission, None, OutputFormat::Text).unwrap();

        assert_eq!(text, "aws cloudformation create-stack --stack-name net");
    }

    #[test]
    fn json_output_includes_stack_state() {
        let json = render_create(&created(), Some(&complete()), OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["submission"]["mode"], "auto");
        assert_eq!(value["submission"]["stack_name"], "net");
        assert_eq!(value["stack"]["status"], "CREATE_COMPLETE");
    }

    #[test]
    fn delete_output_without_wait() {
        let text = render_delete("net", None, OutputFormat::Text).unwrap();

        assert_eq!(text, "Stack net deletion requested");
    }
}
