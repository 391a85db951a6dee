//! The canonical description of a create-stack call.
//!
//! Both submission paths consume a [`StackRequest`]: auto mode hands it to the
//! CloudFormation API, manual mode formats it as an `aws` CLI invocation. Neither
//! path adds or drops anything, so the two stay equivalent for the same input.

use std::{borrow::Cow, path::PathBuf};

use serde::Serialize;

use crate::{
    catalog::Template,
    params::{ResolvedParameters, TagSet},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackParameter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackRequest {
    pub stack_name: String,
    pub region: String,
    pub template_name: String,
    pub template_path: PathBuf,
    #[serde(skip)]
    pub template_body: String,
    /// Sorted by key.
    pub parameters: Vec<StackParameter>,
    pub tags: TagSet,
}

impl StackRequest {
    pub fn render(template: &Template, resolved: &ResolvedParameters) -> Self {
        let parameters = resolved
            .explicit()
            .map(|(key, value)| StackParameter {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect();

        Self {
            stack_name: resolved.stack_name().to_string(),
            region: resolved.region().to_string(),
            template_name: template.name.clone(),
            template_path: template.path.clone(),
            template_body: template.body.clone(),
            parameters,
            tags: resolved.tags.clone(),
        }
    }

    pub fn with_template_path(self, template_path: PathBuf) -> Self {
        Self {
            template_path,
            ..self
        }
    }
}

/// Formats the `aws cloudformation create-stack` command equivalent to
/// submitting `request` through the API.
pub fn manual_command(request: &StackRequest) -> String {
    let mut tokens: Vec<String> = vec![
        String::from("aws"),
        String::from("cloudformation"),
        String::from("create-stack"),
        String::from("--stack-name"),
        request.stack_name.clone(),
        String::from("--template-body"),
        format!("file://{}", request.template_path.display()),
    ];

    if !request.parameters.is_empty() {
        tokens.push(String::from("--parameters"));
        tokens.extend(request.parameters.iter().map(|parameter| {
            format!(
                "ParameterKey={},ParameterValue={}",
                parameter.key,
                parameter.value.replace(',', "\\,")
            )
        }));
    }

    if !request.tags.is_empty() {
        tokens.push(String::from("--tags"));
        tokens.extend(
            request
                .tags
                .iter()
                .map(|tag| format!("Key={},Value={}", tag.key, tag.value)),
        );
    }

    tokens.push(String::from("--region"));
    tokens.push(request.region.clone());

    tokens
        .iter()
        .map(|token| shell_quote(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(token: &str) -> Cow<'_, str> {
    let safe = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:=,@%+-".contains(c));

    if safe {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(format!("'{}'", token.replace('\'', "'\\''")))
    }
}
