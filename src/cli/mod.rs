//! Command-line surface.
//!
//! Subcommand definitions live here; the handlers are in [`commands`].

pub mod commands;

use clap::{Args, Subcommand};

use crate::ml::PollConfig;
use crate::registration::{ModelRole, Provider};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Register a model interactively and save its id
    Register(RegisterArgs),

    /// Save an existing model id without contacting the cluster
    UseModel {
        /// Model id to save
        model_id: String,

        /// Which model the id belongs to
        #[arg(long, value_enum, default_value_t = ModelRole::Embedding)]
        role: ModelRole,
    },

    /// Inspect or edit the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Which model to register
    #[arg(long, value_enum, default_value_t = ModelRole::Embedding)]
    pub role: ModelRole,

    /// Skip the provider menu
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Seconds to wait for the registration task
    #[arg(long, value_name = "SECS", default_value_t = PollConfig::DEFAULT_TIMEOUT.as_secs())]
    pub task_timeout: u64,

    /// Seconds between task status requests
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = PollConfig::DEFAULT_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the configuration with secrets masked
    Show,

    /// Set a configuration value
    Set { key: String, value: String },

    /// Remove a configuration value
    Unset { key: String },

    /// Print the configuration file path
    Path,
}
