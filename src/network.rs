//! `create network` and `delete network`.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{info, warn};

use crate::{
    catalog::TemplateSource,
    cloudformation::{self, AwsCloud, CloudApi},
    config::{Schedule, Settings},
    error::Error,
    orchestrator::{self, Mode, Submission},
    params::{self, ResolveContext, UserParameters, REGION_KEY},
    poller::{self, PollConfig},
    request::StackRequest,
    status::{StackState, StackStatus, CREATE_TERMINAL, DELETE_TERMINAL},
    writer::{self, OutputFormat},
};

#[derive(Debug, Clone, clap::Args)]
pub struct CreateArgs {
    /// Template to render. Defaults to rosa-quickstart-default-vpc.
    pub template: Option<String>,

    /// Directory containing `<template>/cloudformation.yaml`. Overrides OCM_TEMPLATE_DIR.
    #[arg(long)]
    pub template_dir: Option<PathBuf>,

    /// Template parameter as KEY=VALUE. `Tags=K1=V1,K2=V2` sets stack tags.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Region used when no `Region` parameter is given.
    #[arg(long)]
    pub region: Option<String>,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub poll_interval: Duration,

    /// Upper bound on waiting for the stack to settle.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30m")]
    pub timeout: Duration,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub struct DeleteArgs {
    /// Name of the stack to delete.
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub region: Option<String>,

    /// Wait until the stack is gone.
    #[arg(long)]
    pub wait: bool,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub poll_interval: Duration,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "30m")]
    pub timeout: Duration,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

pub async fn create(args: CreateArgs) -> Result<String, Error> {
    let settings = Settings::resolve(&args, |key| env::var(key).ok())?;
    let user = UserParameters::parse(&args.params)?;

    let region = region_or_default(user.get(REGION_KEY).or(settings.region.as_deref())).await;
    let api = AwsCloud::new(&region).await;

    let workdir = env::current_dir().map_err(|error| Error::Write {
        path: String::from("."),
        message: error.to_string(),
    })?;

    run_create(&api, &settings, &user, &region, &workdir).await
}

pub async fn delete(args: DeleteArgs) -> Result<String, Error> {
    let schedule = Schedule::new(args.poll_interval, args.timeout)?;
    let region = region_or_default(args.region.as_deref()).await;
    let api = AwsCloud::new(&region).await;

    run_delete(
        &api,
        &args.name,
        args.wait,
        &schedule.poll_config(),
        args.output,
    )
    .await
}

async fn region_or_default(region: Option<&str>) -> String {
    match region {
        Some(region) => region.to_string(),
        None => cloudformation::default_region().await,
    }
}

pub async fn run_create<A: CloudApi + ?Sized>(
    api: &A,
    settings: &Settings,
    user: &UserParameters,
    default_region: &str,
    workdir: &Path,
) -> Result<String, Error> {
    let template = settings.catalog.resolve(&settings.template)?;

    let context = ResolveContext {
        account_id: None,
        default_region: default_region.to_string(),
    };
    let mut resolved = params::resolve(&template, user, &context)?;

    // The account lookup is a provider call; input errors are reported first.
    if !resolved.has_stack_name() {
        let account_id = api.account_id().await?;
        resolved = resolved.with_default_name(&template, &account_id)?;
    }

    let mut request = StackRequest::render(&template, &resolved);
    if settings.mode == Mode::Manual && template.source == TemplateSource::BuiltIn {
        let path = writer::materialize(&template, workdir).map_err(|error| Error::Write {
            path: workdir.display().to_string(),
            message: error.to_string(),
        })?;
        info!("Template written to {}", path.display());
        request = request.with_template_path(path);
    }

    let submission = orchestrator::submit(api, &request, settings.mode).await?;

    let stack = match &submission {
        Submission::Manual { .. } => None,
        Submission::Created { stack_name, .. } => {
            Some(watch_creation(api, stack_name, &settings.schedule.poll_config()).await?)
        }
    };

    return Ok(writer::render_create(
        &submission,
        stack.as_ref(),
        settings.output,
    )?);
}

async fn watch_creation<A: CloudApi + ?Sized>(
    api: &A,
    stack_name: &str,
    poll: &PollConfig,
) -> Result<StackState, Error> {
    let state = poller::await_stack(api, stack_name, CREATE_TERMINAL, poll).await?;
    if state.status == StackStatus::CreateComplete {
        return Ok(state);
    }

    warn!(stack = stack_name, status = %state.status, "stack creation failed");
    Err(stack_failure(api, state).await)
}

async fn stack_failure<A: CloudApi + ?Sized>(api: &A, state: StackState) -> Error {
    let mut reasons: Vec<String> = state.reason.iter().cloned().collect();
    match api.failure_reasons(&state.name).await {
        Ok(events) => reasons.extend(events),
        Err(error) => return Error::Provider(error),
    }

    Error::StackFailed {
        stack: state.name,
        status: state.status,
        reasons,
    }
}

pub async fn run_delete<A: CloudApi + ?Sized>(
    api: &A,
    stack_name: &str,
    wait: bool,
    poll: &PollConfig,
    output: OutputFormat,
) -> Result<String, Error> {
    api.delete_stack(stack_name).await?;
    info!("Stack {} deletion requested", stack_name);

    if !wait {
        return Ok(writer::render_delete(stack_name, None, output)?);
    }

    let state = match poller::await_stack(api, stack_name, DELETE_TERMINAL, poll).await {
        Ok(state) => state,
        Err(poller::Error::Api(cloudformation::Error::NotFoundError(_))) => StackState {
            name: stack_name.to_string(),
            stack_id: None,
            status: StackStatus::DeleteComplete,
            reason: None,
        },
        Err(error) => return Err(error.into()),
    };

    if state.status != StackStatus::DeleteComplete {
        warn!(stack = stack_name, status = %state.status, "stack deletion failed");
        return Err(stack_failure(api, state).await);
    }

    return Ok(writer::render_delete(stack_name, Some(&state), output)?);
}
