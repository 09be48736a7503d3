//! objfs - browse and manage S3 buckets as a filesystem
//!
//! URIs take the form `s3://[access_key:secret_key@][host]/bucket/path`.
//! Filesystems are opened once per endpoint and credential identity and
//! shared between the paths of a command.

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use commands::{Commands, ConnectionArgs, Session};
use output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "objfs", version, about = "Browse and manage S3 buckets as a filesystem")]
struct Cli {
    /// Output strict JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<std::process::ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    let session = Session::new(&cli.connection)?;
    let code = commands::execute(cli.command, &session, output_config).await;
    Ok(code.into())
}
