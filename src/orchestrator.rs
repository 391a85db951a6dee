use serde::Serialize;
use tracing::{debug, info};

use crate::{
    cloudformation::{self, CloudApi},
    request::{manual_command, StackRequest},
};

/// How a rendered stack request is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Call CloudFormation directly.
    Auto,
    /// Print the equivalent `aws` command instead.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Submission {
    #[serde(rename = "auto")]
    Created {
        stack_name: String,
        stack_id: String,
        region: String,
    },
    Manual { command: String },
}

pub async fn submit<A: CloudApi + ?Sized>(
    api: &A,
    request: &StackRequest,
    mode: Mode,
) -> Result<Submission, cloudformation::Error> {
    match mode {
        Mode::Manual => {
            debug!(stack = %request.stack_name, "rendering manual command");
            Ok(Submission::Manual {
                command: manual_command(request),
            })
        }
        Mode::Auto => {
            info!(
                stack = %request.stack_name,
                region = %request.region,
                template = %request.template_name,
                "creating stack"
            );
            let stack_id = api.create_stack(request).await?;
            info!("Stack {} created", request.stack_name);

            Ok(Submission::Created {
                stack_name: request.stack_name.clone(),
                stack_id,
                region: request.region.clone(),
            })
        }
    }
}
