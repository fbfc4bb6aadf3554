//! Application runner.
//!
//! Shared entry point called by the binary after argument parsing.

use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::commands::{self, ConnectionOverrides};
use crate::cli::Command;
use crate::config::ConfigStore;
use crate::prompt::TerminalInput;
use crate::registration::RegistrationOutcome;

/// Runtime options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Enable debug logging
    pub debug: bool,
    /// Enable verbose (trace-level) logging
    pub verbose: bool,
    /// Config file to use instead of the XDG default
    pub config_path: Option<PathBuf>,
    pub connection: ConnectionOverrides,
}

impl AppConfig {
    pub fn store(&self) -> ConfigStore {
        match &self.config_path {
            Some(path) => ConfigStore::new(path),
            None => ConfigStore::default_location(),
        }
    }

    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "trace"
        } else if self.debug {
            "debug"
        } else {
            "warn"
        }
    }
}

/// Install the stderr tracing subscriber. `RUST_LOG` takes precedence.
pub fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    // A global subscriber may already be installed.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init();

    if config.debug || config.verbose {
        tracing::info!("Debug logging enabled");
    }
}

/// Run one subcommand and map its result to an exit status.
///
/// # Errors
///
/// Returns an error when configuration, input or cluster calls fail.
pub fn run(config: AppConfig, command: Command) -> anyhow::Result<ExitCode> {
    init_tracing(&config);
    let store = config.store();
    tracing::debug!(path = %store.path().display(), "Using config file");

    match command {
        Command::Register(args) => {
            let outcome = commands::cmd_register(&store, &config.connection, &args)?;
            Ok(exit_code(&outcome))
        }
        Command::UseModel { model_id, role } => {
            let mut input = TerminalInput::new();
            let outcome = commands::cmd_use_model(&store, &mut input, &model_id, role)?;
            Ok(exit_code(&outcome))
        }
        Command::Config(command) => {
            commands::cmd_config(&store, &command)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// The flows report their own aborts to the user.
fn exit_code(outcome: &RegistrationOutcome) -> ExitCode {
    if succeeded(outcome) {
        return ExitCode::SUCCESS;
    }
    if let RegistrationOutcome::Aborted(reason) = outcome {
        tracing::debug!(%reason, "Model registration aborted");
    }
    ExitCode::FAILURE
}

fn succeeded(outcome: &RegistrationOutcome) -> bool {
    !matches!(outcome, RegistrationOutcome::Aborted(_))
}
