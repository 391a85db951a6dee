use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_cloudformation::{
    model::{Parameter, Tag},
    types::SdkError,
};
use aws_types::{region::Region, SdkConfig};
use tracing::debug;

use crate::{
    request::StackRequest,
    status::{StackState, StackStatus},
};

pub const FALLBACK_REGION: &str = "us-east-1";

/// Provider failures. Messages are the provider's own text, unmodified.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0}")]
    ServiceError(String),

    #[error("{0}")]
    UnknownError(String),

    #[error("Stack with id {0} does not exist")]
    NotFoundError(String),
}

/// The calls the network commands make against the cloud provider.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Account the current credentials belong to.
    async fn account_id(&self) -> Result<String, Error>;

    /// Returns the new stack's id.
    async fn create_stack(&self, request: &StackRequest) -> Result<String, Error>;

    async fn describe_stack(&self, stack_name: &str) -> Result<StackState, Error>;

    /// Reasons attached to failed resource events, oldest first.
    async fn failure_reasons(&self, stack_name: &str) -> Result<Vec<String>, Error>;

    async fn delete_stack(&self, stack_name: &str) -> Result<(), Error>;
}

/// Region from the usual AWS configuration sources.
pub async fn default_region() -> String {
    let region = RegionProviderChain::default_provider()
        .or_else(FALLBACK_REGION)
        .region()
        .await;

    match region {
        Some(region) => region.to_string(),
        None => FALLBACK_REGION.to_string(),
    }
}

pub struct AwsCloud {
    cloudformation: aws_sdk_cloudformation::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsCloud {
    pub async fn new(region: &str) -> Self {
        let sdk_config = aws_config::from_env()
            .region(Region::new(region.to_string()))
            .load()
            .await;

        return Self::from_config(&sdk_config);
    }

    pub fn from_config(sdk_config: &SdkConfig) -> Self {
        Self {
            cloudformation: aws_sdk_cloudformation::Client::new(sdk_config),
            sts: aws_sdk_sts::Client::new(sdk_config),
        }
    }
}

fn service_error(message: Option<&str>, error: &dyn std::fmt::Display) -> Error {
    match message {
        Some(message) => Error::ServiceError(message.to_string()),
        None => Error::ServiceError(error.to_string()),
    }
}

#[async_trait]
impl CloudApi for AwsCloud {
    async fn account_id(&self) -> Result<String, Error> {
        let result = self.sts.get_caller_identity().send().await;

        let output = match result {
            Ok(output) => output,
            Err(aws_sdk_sts::types::SdkError::ServiceError { err, .. }) => {
                return Err(service_error(err.message(), &err));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        match output.account() {
            Some(account) => Ok(account.to_string()),
            None => Err(Error::UnknownError(String::from(
                "caller identity did not include an account id",
            ))),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, Error> {
        let parameters: Vec<Parameter> = request
            .parameters
            .iter()
            .map(|parameter| {
                Parameter::builder()
                    .parameter_key(&parameter.key)
                    .parameter_value(&parameter.value)
                    .build()
            })
            .collect();
        let tags: Vec<Tag> = request
            .tags
            .iter()
            .map(|tag| Tag::builder().key(&tag.key).value(&tag.value).build())
            .collect();

        debug!(
            stack = %request.stack_name,
            parameters = parameters.len(),
            tags = tags.len(),
            "sending CreateStack"
        );

        let result = self
            .cloudformation
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(parameters))
            .set_tags((!tags.is_empty()).then_some(tags))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError { err, .. }) => {
                return Err(service_error(err.message(), &err));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        return Ok(output.stack_id().unwrap_or_default().to_string());
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<StackState, Error> {
        let result = self
            .cloudformation
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        let result = match result {
            Ok(data) => data,
            Err(SdkError::ServiceError { err, .. }) => {
                let message = err.message().unwrap_or_default();
                if message.contains("does not exist") {
                    return Err(Error::NotFoundError(stack_name.to_string()));
                }
                return Err(service_error(err.message(), &err));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        let stack = match result.stacks().unwrap_or_default().first() {
            Some(stack) => stack,
            None => return Err(Error::NotFoundError(stack_name.to_string())),
        };

        let status = match stack.stack_status() {
            Some(status) => StackStatus::from(status.as_str()),
            None => StackStatus::Other(String::from("UNKNOWN")),
        };

        return Ok(StackState {
            name: stack
                .stack_name()
                .unwrap_or(stack_name)
                .to_string(),
            stack_id: stack.stack_id().map(String::from),
            status,
            reason: stack.stack_status_reason().map(String::from),
        });
    }

    async fn failure_reasons(&self, stack_name: &str) -> Result<Vec<String>, Error> {
        let result = self
            .cloudformation
            .describe_stack_events()
            .stack_name(stack_name)
            .send()
            .await;

        let result = match result {
            Ok(data) => data,
            Err(SdkError::ServiceError { err, .. }) => {
                return Err(service_error(err.message(), &err));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        // Events arrive newest first.
        let reasons = result
            .stack_events()
            .unwrap_or_default()
            .iter()
            .rev()
            .filter(|event| {
                event
                    .resource_status()
                    .map(|status| status.as_str().ends_with("_FAILED"))
                    .unwrap_or(false)
            })
            .filter_map(|event| {
                let reason = event.resource_status_reason()?;
                match event.logical_resource_id() {
                    Some(resource) => Some(format!("{}: {}", resource, reason)),
                    None => Some(reason.to_string()),
                }
            })
            .collect();

        return Ok(reasons);
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), Error> {
        let result = self
            .cloudformation
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError { err, .. }) => Err(service_error(err.message(), &err)),
            Err(err) => Err(Error::UnknownError(err.to_string())),
        }
    }
}
