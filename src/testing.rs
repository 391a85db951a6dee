//! Fixtures shared by the unit tests. Each helper builds a fresh value; nothing
//! here is shared between tests.

use std::{
    collections::VecDeque,
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};

use crate::{
    catalog::{Template, TemplateSource, TEMPLATE_FILE_NAME},
    cloudformation::{self, CloudApi},
    network::CreateArgs,
    orchestrator::Mode,
    params::{resolve, ResolveContext, UserParameters},
    request::StackRequest,
    status::{StackState, StackStatus},
    writer::OutputFormat,
};

pub const ACCOUNT_ID: &str = "123456789012";

pub const SINGLE_VPC_TEMPLATE: &str = r#"AWSTemplateFormatVersion: '2010-09-09'
Description: Single VPC
Parameters:
  AvailabilityZoneCount:
    Type: Number
    Default: 1
    MinValue: 1
    MaxValue: 3
  Region:
    Type: String
  Name:
    Type: String
  VpcCidr:
    Type: String
    Default: 10.0.0.0/16
    AllowedPattern: '^(\d{1,3}\.){3}\d{1,3}/\d{1,2}$'
Resources:
  VPC:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: !Ref VpcCidr
      Tags:
        - Key: Name
          Value: !Ref Name
"#;

pub const TEMPLATE_WITHOUT_REGION: &str = r#"Parameters:
  AvailabilityZoneCount:
    Type: Number
    Default: 1
  Name:
    Type: String
Resources:
  VPC:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
"#;

pub const TEMPLATE_WITHOUT_NAME: &str = r#"Parameters:
  Region:
    Type: String
Resources:
  VPC:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
"#;

impl Template {
    pub fn with_path(self, path: PathBuf) -> Self {
        Self { path, ..self }
    }
}

pub fn parse_template(name: &str, body: &str) -> Template {
    let path = PathBuf::from(name).join(TEMPLATE_FILE_NAME);
    Template::parse(name, TemplateSource::File, path, body.to_string()).unwrap()
}

/// A catalog root laid out as `<dir>/<name>/cloudformation.yaml`, removed on drop.
pub fn catalog_dir(templates: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (name, body) in templates {
        let template_dir = dir.path().join(name);
        fs::create_dir_all(&template_dir).unwrap();
        fs::write(template_dir.join(TEMPLATE_FILE_NAME), body).unwrap();
    }
    dir
}

pub fn single_vpc_request(entries: &[&str]) -> StackRequest {
    let template = parse_template("single-vpc", SINGLE_VPC_TEMPLATE)
        .with_path(PathBuf::from("/work/single-vpc/cloudformation.yaml"));
    let user = UserParameters::parse(entries).unwrap();
    let context = ResolveContext {
        account_id: Some(ACCOUNT_ID.to_string()),
        default_region: String::from("us-west-2"),
    };
    let resolved = resolve(&template, &user, &context).unwrap();

    StackRequest::render(&template, &resolved)
}

pub fn create_args() -> CreateArgs {
    CreateArgs {
        template: None,
        template_dir: None,
        params: Vec::new(),
        mode: Mode::Auto,
        region: None,
        poll_interval: Duration::from_secs(5),
        timeout: Duration::from_secs(30 * 60),
        output: OutputFormat::Text,
    }
}

/// In-memory stand-in for CloudFormation and STS.
///
/// `describe_stack` walks the configured results in order and keeps
/// returning the last one.
pub struct MockCloud {
    describe_results: Mutex<VecDeque<Result<StackStatus, cloudformation::Error>>>,
    stack_reason: Option<String>,
    failure_reasons: Vec<String>,
    create_error: Option<cloudformation::Error>,
    account_error: Option<cloudformation::Error>,
    created: Mutex<Vec<StackRequest>>,
    deleted: Mutex<Vec<String>>,
    describe_calls: AtomicUsize,
    account_calls: AtomicUsize,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            describe_results: Mutex::new(VecDeque::from(vec![Ok(StackStatus::CreateComplete)])),
            stack_reason: None,
            failure_reasons: Vec::new(),
            create_error: None,
            account_error: None,
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            describe_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(self, statuses: Vec<StackStatus>) -> Self {
        self.with_describe_results(statuses.into_iter().map(Ok).collect())
    }

    pub fn with_describe_results(
        self,
        results: Vec<Result<StackStatus, cloudformation::Error>>,
    ) -> Self {
        *self.describe_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_describe_error(self, error: cloudformation::Error) -> Self {
        self.with_describe_results(vec![Err(error)])
    }

    pub fn with_stack_reason(mut self, reason: &str) -> Self {
        self.stack_reason = Some(reason.to_string());
        self
    }

    pub fn with_failure_reasons(mut self, reasons: Vec<String>) -> Self {
        self.failure_reasons = reasons;
        self
    }

    pub fn with_create_error(mut self, error: cloudformation::Error) -> Self {
        self.create_error = Some(error);
        self
    }

    pub fn with_account_error(mut self, error: cloudformation::Error) -> Self {
        self.account_error = Some(error);
        self
    }

    pub fn created(&self) -> Vec<StackRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    async fn account_id(&self) -> Result<String, cloudformation::Error> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        match &self.account_error {
            Some(error) => Err(error.clone()),
            None => Ok(ACCOUNT_ID.to_string()),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, cloudformation::Error> {
        if let Some(error) = &self.create_error {
            return Err(error.clone());
        }

        self.created.lock().unwrap().push(request.clone());
        Ok(format!(
            "arn:aws:cloudformation:{}:{}:stack/{}/1",
            request.region, ACCOUNT_ID, request.stack_name
        ))
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<StackState, cloudformation::Error> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);

        let result = {
            let mut results = self.describe_results.lock().unwrap();
            if results.len() > 1 {
                results.pop_front()
            } else {
                results.front().cloned()
            }
        };

        match result {
            Some(Ok(status)) => Ok(StackState {
                name: stack_name.to_string(),
                stack_id: Some(format!("arn:stack/{}/1", stack_name)),
                status,
                reason: self.stack_reason.clone(),
            }),
            Some(Err(error)) => Err(error),
            None => Err(cloudformation::Error::NotFoundError(stack_name.to_string())),
        }
    }

    async fn failure_reasons(&self, _stack_name: &str) -> Result<Vec<String>, cloudformation::Error> {
        Ok(self.failure_reasons.clone())
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), cloudformation::Error> {
        self.deleted.lock().unwrap().push(stack_name.to_string());
        Ok(())
    }
}
