//! Subcommand handlers.

use anyhow::{bail, Context};
use std::time::Duration;
use tracing::{debug, info};

use super::{ConfigCommand, RegisterArgs};
use crate::config::{keys, ConfigError, ConfigStore, PersistedConfig, ServiceType};
use crate::messaging;
use crate::ml::{ClusterHelper, HttpTransport, HttpTransportConfig, PollConfig, SystemClock};
use crate::prompt::{InputProvider, TerminalInput};
use crate::registration::self_hosted::{self, SelfHostedCluster};
use crate::registration::{managed, ModelRole, RegistrationContext, RegistrationOutcome};

/// Connection settings given on the command line or in the environment.
/// They take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Build the HTTP transport from the configuration and any overrides.
pub fn transport_config(
    config: &PersistedConfig,
    overrides: &ConnectionOverrides,
) -> anyhow::Result<HttpTransportConfig> {
    let endpoint = overrides
        .endpoint
        .as_deref()
        .or_else(|| config.get_non_empty(keys::OPENSEARCH_ENDPOINT));
    let Some(endpoint) = endpoint else {
        bail!(
            "No OpenSearch endpoint configured. Pass --endpoint or run `rag-setup config set {} <URL>`.",
            keys::OPENSEARCH_ENDPOINT
        );
    };

    let mut transport = HttpTransportConfig::new(endpoint).with_verify_certs(config.verify_certs()?);

    let username = overrides
        .username
        .as_deref()
        .or_else(|| config.get_non_empty(keys::OPENSEARCH_USERNAME));
    let password = overrides
        .password
        .as_deref()
        .or_else(|| config.get_non_empty(keys::OPENSEARCH_PASSWORD));
    if let (Some(username), Some(password)) = (username, password) {
        transport = transport.with_basic_auth(username, password);
    }

    Ok(transport)
}

/// Run the registration entry menu for the configured service type.
pub fn cmd_register(
    store: &ConfigStore,
    overrides: &ConnectionOverrides,
    args: &RegisterArgs,
) -> anyhow::Result<RegistrationOutcome> {
    let mut config = store.load()?;
    let service_type = config.service_type()?;
    let transport = HttpTransport::new(transport_config(&config, overrides)?)
        .context("Failed to create OpenSearch client")?;
    let poll = PollConfig::new(
        Duration::from_secs(args.task_timeout),
        Duration::from_secs(args.poll_interval),
    );
    info!(%service_type, role = ?args.role, endpoint = %transport.base_url(), "Starting model registration");

    let mut input = TerminalInput::new();
    let mut ctx = RegistrationContext::new(&mut input, &mut config, |c: &PersistedConfig| store.save(c))
        .with_role(args.role);

    let outcome = if service_type.uses_helper() {
        let mut helper = ClusterHelper::new(transport, SystemClock::new(), poll);
        managed::prompt_model_registration(&mut ctx, &mut helper, args.provider)?
    } else {
        let mut cluster = SelfHostedCluster::new(transport, SystemClock::new(), poll);
        self_hosted::prompt_opensource_model_registration(&mut ctx, &mut cluster, args.provider)?
    };

    debug!(?outcome, "Registration finished");
    Ok(outcome)
}

/// Save an existing model id.
pub fn cmd_use_model<I>(
    store: &ConfigStore,
    input: &mut I,
    model_id: &str,
    role: ModelRole,
) -> anyhow::Result<RegistrationOutcome>
where
    I: InputProvider + ?Sized,
{
    let mut config = store.load()?;
    let outcome = RegistrationContext::new(input, &mut config, |c: &PersistedConfig| store.save(c))
        .with_role(role)
        .use_existing_model(model_id)?;
    Ok(outcome)
}

/// Handle `config show|set|unset|path`.
pub fn cmd_config(store: &ConfigStore, command: &ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = store.load()?;
            if config.is_empty() {
                messaging::info(format!("No configuration values set in {}", store.path().display()));
                return Ok(());
            }
            for (key, value) in config.masked() {
                println!("{} = {}", key, value);
            }
        }
        ConfigCommand::Set { key, value } => {
            validate_entry(key, value)?;
            let mut config = store.load()?;
            config.set(key.as_str(), value.as_str());
            store.save(&config)?;
            messaging::success(format!("Set {}", key));
        }
        ConfigCommand::Unset { key } => {
            let mut config = store.load()?;
            if config.remove(key).is_none() {
                messaging::warning(format!("{} was not set", key));
                return Ok(());
            }
            store.save(&config)?;
            messaging::success(format!("Removed {}", key));
        }
        ConfigCommand::Path => {
            println!("{}", store.path().display());
        }
    }
    Ok(())
}

/// Reject values the registration flows could not use.
pub fn validate_entry(key: &str, value: &str) -> Result<(), ConfigError> {
    let probe: PersistedConfig = [(key.to_string(), value.to_string())].into_iter().collect();
    match key {
        keys::SERVICE_TYPE => value.parse::<ServiceType>().map(|_| ()),
        keys::VERIFY_CERTS => probe.verify_certs().map(|_| ()),
        keys::EMBEDDING_DIMENSION => match probe.embedding_dimension()? {
            0 => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}
