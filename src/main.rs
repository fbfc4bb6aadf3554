//! rag-setup - register RAG models on OpenSearch ML Commons
//!
//! Registers an embedding or language model on a managed domain or a
//! self-hosted cluster and saves the resulting model id.

use clap::Parser;
use rag_setup::cli::commands::ConnectionOverrides;
use rag_setup::cli::Command;
use rag_setup::messaging;
use rag_setup::runner::{run, AppConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Set up embedding and language models for retrieval augmented generation
#[derive(Parser, Debug)]
#[command(name = "rag-setup")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Configuration file (defaults to the XDG config directory)
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Enable verbose (trace-level) logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// OpenSearch endpoint, overrides the config file
    #[arg(long, global = true, env = "OPENSEARCH_ENDPOINT")]
    endpoint: Option<String>,

    /// OpenSearch username, overrides the config file
    #[arg(long, global = true, env = "OPENSEARCH_USERNAME")]
    username: Option<String>,

    /// OpenSearch password, overrides the config file
    #[arg(long, global = true, env = "OPENSEARCH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl From<&Args> for AppConfig {
    fn from(args: &Args) -> Self {
        AppConfig {
            debug: args.debug,
            verbose: args.verbose,
            config_path: args.config.clone(),
            connection: ConnectionOverrides {
                endpoint: args.endpoint.clone(),
                username: args.username.clone(),
                password: args.password.clone(),
            },
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = AppConfig::from(&args);

    match run(config, args.command) {
        Ok(code) => code,
        Err(err) => {
            messaging::failure(format!("Error: {:#}", err));
            ExitCode::FAILURE
        }
    }
}
