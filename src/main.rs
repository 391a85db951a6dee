use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod catalog;
pub mod cloudformation;
pub mod config;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod params;
pub mod poller;
pub mod request;
pub mod status;
pub mod writer;

#[cfg(test)]
mod testing;

/// Provision the network resources a cluster needs from CloudFormation templates.
///
/// AWS credentials and region are read from the usual places; see the AWS CLI
/// documentation for details.
#[derive(Parser, Debug)]
#[command(
    name = "rosa-network",
    version,
    after_help = "Exit status: 1 invalid input, 2 usage error, 3 timeout, 4 provider or stack failure."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a resource.
    #[command(subcommand)]
    Create(CreateCommand),

    /// Delete a resource.
    #[command(subcommand)]
    Delete(DeleteCommand),
}

#[derive(Subcommand, Debug)]
enum CreateCommand {
    /// Create a network stack (VPC, subnets, gateways) from a template.
    Network(network::CreateArgs),
}

#[derive(Subcommand, Debug)]
enum DeleteCommand {
    /// Delete a network stack.
    Network(network::DeleteArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Create(CreateCommand::Network(args)) => network::create(args).await,
        Command::Delete(DeleteCommand::Network(args)) => network::delete(args).await,
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(error) => {
            if error.is_user_error() {
                eprintln!("ERR: {}", error);
            } else {
                eprintln!("{}", error);
            }
            process::exit(error.exit_code());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::{error::ErrorKind, CommandFactory, Parser};

    use super::{Cli, Command, CreateCommand, DeleteCommand};
    use crate::orchestrator::Mode;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_network_flags() {
        let cli = Cli::try_parse_from([
            "rosa-network",
            "create",
            "network",
            "single-vpc",
            "--template-dir",
            "/work",
            "--param=Name=net",
            "--param",
            "AvailabilityZoneCount=3",
            "--mode",
            "manual",
            "--timeout",
            "10m",
        ])
        .unwrap();

        match cli.command {
            Command::Create(CreateCommand::Network(args)) => {
                assert_eq!(args.template.as_deref(), Some("single-vpc"));
                assert_eq!(args.template_dir, Some(PathBuf::from("/work")));
                assert_eq!(args.params, vec!["Name=net", "AvailabilityZoneCount=3"]);
                assert_eq!(args.mode, Mode::Manual);
                assert_eq!(args.timeout, Duration::from_secs(600));
                assert_eq!(args.poll_interval, Duration::from_secs(5));
            }
            other => panic!("Expected `create network`, got {:?}", other),
        }
    }

    #[test]
    fn param_flag_requires_a_value() {
        let error = Cli::try_parse_from(["rosa-network", "create", "network", "--param"])
            .err()
            .unwrap();

        assert_eq!(error.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let error = Cli::try_parse_from(["rosa-network", "create", "network", "--invalid"])
            .err()
            .unwrap();

        assert_eq!(error.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn parses_delete_network() {
        let cli =
            Cli::try_parse_from(["rosa-network", "delete", "network", "--name", "net", "--wait"])
                .unwrap();

        match cli.command {
            Command::Delete(DeleteCommand::Network(args)) => {
                assert_eq!(args.name, "net");
                assert!(args.wait);
            }
            other => panic!("Expected `delete network`, got {:?}", other),
        }
    }
}
