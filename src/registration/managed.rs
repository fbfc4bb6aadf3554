//! Registration on managed domains through a [`ConnectorHelper`].

use serde_json::Value;
use tracing::{debug, info};

use super::templates::{self, Provider};
use super::{AbortReason, RegistrationContext, RegistrationError, RegistrationOutcome};
use crate::config::{keys, ConfigError, PersistedConfig};
use crate::messaging;
use crate::ml::{ConnectorHelper, ConnectorRole, ProviderSecret};
use crate::prompt::{choose, get_custom_model_details, InputProvider, MenuChoice};

/// Region offered when the configuration has none.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Ask whether to register a new model or reuse an existing id.
pub fn prompt_model_registration<I, S, H>(
    ctx: &mut RegistrationContext<'_, I, S>,
    helper: &mut H,
    provider: Option<Provider>,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    H: ConnectorHelper + ?Sized,
{
    let role = ctx.role;
    let register_new = format!("Register a new {}", role);
    let use_existing = format!("Use an existing {} ID", role);
    let choice = choose(
        &mut *ctx.input,
        &format!("Choose how you want to set up the {}:", role),
        &[register_new.as_str(), use_existing.as_str()],
    )?;

    match choice {
        MenuChoice::Selected(0) => register_model_interactive(ctx, helper, provider),
        MenuChoice::Selected(_) => {
            let model_id = ctx.input.read_line(&format!("Enter your {} ID", role))?;
            ctx.use_existing_model(&model_id)
        }
        MenuChoice::Invalid(raw) => {
            messaging::failure("Invalid choice. Exiting model registration.");
            Ok(AbortReason::InvalidChoice(raw).into())
        }
    }
}

/// Pick a provider (unless one is given) and register with it.
pub fn register_model_interactive<I, S, H>(
    ctx: &mut RegistrationContext<'_, I, S>,
    helper: &mut H,
    provider: Option<Provider>,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    H: ConnectorHelper + ?Sized,
{
    let provider = match provider {
        Some(provider) => provider,
        None => {
            let providers = Provider::managed(ctx.role);
            let labels: Vec<String> = providers.iter().map(|p| p.menu_label(ctx.role)).collect();
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            match choose(&mut *ctx.input, "Choose the model provider:", &labels)? {
                MenuChoice::Selected(i) => providers[i],
                MenuChoice::Invalid(raw) => {
                    messaging::failure("Invalid choice. Exiting model registration.");
                    return Ok(AbortReason::InvalidChoice(raw).into());
                }
            }
        }
    };

    register_model(ctx, helper, provider)
}

/// Register a model with `provider` and save its id.
pub fn register_model<I, S, H>(
    ctx: &mut RegistrationContext<'_, I, S>,
    helper: &mut H,
    provider: Provider,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    H: ConnectorHelper + ?Sized,
{
    info!(provider = %provider, role = ?ctx.role, "Managed model registration");

    if !Provider::managed(ctx.role).contains(&provider) {
        messaging::failure(format!(
            "{} is not available for {} registration on managed domains.",
            provider, ctx.role
        ));
        return Ok(AbortReason::Unsupported {
            provider,
            role: ctx.role,
        }
        .into());
    }

    match provider {
        Provider::Bedrock => register_bedrock_model(ctx, helper),
        Provider::SageMaker => register_sagemaker_model(ctx, helper),
        _ => register_secret_model(ctx, helper, provider),
    }
}

fn register_secret_model<I, S, H>(
    ctx: &mut RegistrationContext<'_, I, S>,
    helper: &mut H,
    provider: Provider,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    H: ConnectorHelper + ?Sized,
{
    let (Some(key), Some(default)) = (
        provider.credential_key(),
        templates::secret_connector(provider, ctx.role),
    ) else {
        messaging::failure(format!("{} has no API key connector template.", provider));
        return Ok(AbortReason::Unsupported {
            provider,
            role: ctx.role,
        }
        .into());
    };

    messaging::info(format!(
        "Your {} API key is sent inline with the connector request. The label below only appears in logs.",
        provider
    ));
    let key_label = ctx
        .input
        .read_line(&format!("Enter a label for your {} API key", provider))?;
    let key_label = key_label.trim().to_string();
    if key_label.is_empty() {
        messaging::failure("API key label is required. Aborting.");
        return Ok(AbortReason::MissingInput("API key label").into());
    }

    let api_key = ctx.input.read_secret(&format!("Enter your {} API key", provider))?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        messaging::failure("API key is required. Aborting.");
        return Ok(AbortReason::MissingInput("API key").into());
    }

    let Some(payload) = connector_details(&mut *ctx.input, default)? else {
        return Ok(AbortReason::InvalidModelDetails.into());
    };
    let (name, description) = templates::model_name_and_description(&payload, provider, ctx.role);

    let secret = ProviderSecret::new(key_label, key, api_key);
    messaging::info("Creating connector...");
    let connector_id = helper.create_connector_with_secret(&secret, payload)?;
    debug!(%connector_id, "Connector ready");

    messaging::info("Registering model...");
    let model_id = helper.create_model(&name, &description, &connector_id)?;
    finish(ctx, model_id)
}

fn register_bedrock_model<I, S, H>(
    ctx: &mut RegistrationContext<'_, I, S>,
    helper: &mut H,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    H: ConnectorHelper + ?Sized,
{
    let default_region = configured_region(ctx.config);
    let region = ctx.input.read_line_or("Enter your Bedrock region", &default_region)?;

    let Some(role) = read_role_arn(&mut *ctx.input, "Bedrock")? else {
        return Ok(AbortReason::MissingInput("connector role ARN").into());
    };

    let default = templates::bedrock_embedding_connector(&region);
    let Some(payload) = connector_details(&mut *ctx.input, default)? else {
        return Ok(AbortReason::InvalidModelDetails.into());
    };
    let (name, description) = templates::model_name_and_description(&payload, Provider::Bedrock, ctx.role);

    messaging::info("Creating connector...");
    let connector_id = helper.create_connector_with_role(&role, payload)?;

    messaging::info("Registering model...");
    let model_id = helper.create_model(&name, &description, &connector_id)?;
    finish(ctx, model_id)
}

fn register_sagemaker_model<I, S, H>(
    ctx: &mut RegistrationContext<'_, I, S>,
    helper: &mut H,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    H: ConnectorHelper + ?Sized,
{
    let endpoint_url = ctx.input.read_line("Enter your SageMaker inference endpoint URL")?;
    let endpoint_url = endpoint_url.trim().to_string();
    if endpoint_url.is_empty() {
        messaging::failure("Endpoint URL is required. Aborting.");
        return Ok(AbortReason::MissingInput("endpoint URL").into());
    }

    let default_region = configured_region(ctx.config);
    let region = ctx.input.read_line_or("Enter your SageMaker region", &default_region)?;

    let Some(role) = read_role_arn(&mut *ctx.input, "SageMaker")? else {
        return Ok(AbortReason::MissingInput("connector role ARN").into());
    };

    let payload = templates::sagemaker_embedding_connector(&region, &endpoint_url);
    let (name, description) = templates::model_name_and_description(&payload, Provider::SageMaker, ctx.role);

    messaging::info("Creating connector...");
    let connector_id = helper.create_connector_with_role(&role, payload)?;

    messaging::info("Registering model...");
    let model_id = helper.create_model(&name, &description, &connector_id)?;
    finish(ctx, model_id)
}

/// Default or custom connector details. Custom JSON must be an object.
fn connector_details<I>(input: &mut I, default: Value) -> Result<Option<Value>, RegistrationError>
where
    I: InputProvider + ?Sized,
{
    match get_custom_model_details(input, default)? {
        Some(payload) if !payload.is_object() => {
            messaging::failure("Connector details must be a JSON object.");
            Ok(None)
        }
        details => Ok(details),
    }
}

fn configured_region(config: &PersistedConfig) -> String {
    config
        .get_non_empty(keys::REGION)
        .unwrap_or(DEFAULT_REGION)
        .to_string()
}

fn read_role_arn<I>(input: &mut I, service: &str) -> Result<Option<ConnectorRole>, RegistrationError>
where
    I: InputProvider + ?Sized,
{
    let arn = input.read_line(&format!(
        "Enter the ARN of the IAM role the connector assumes to call {}",
        service
    ))?;
    let arn = arn.trim();
    if arn.is_empty() {
        messaging::failure("Role ARN is required. Aborting.");
        return Ok(None);
    }
    Ok(Some(ConnectorRole::new(arn)))
}

fn finish<I, S>(
    ctx: &mut RegistrationContext<'_, I, S>,
    model_id: String,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
{
    ctx.save_model_id(&model_id)?;
    messaging::success(format!(
        "Model registered successfully. Model ID '{}' saved in configuration.",
        model_id
    ));
    Ok(RegistrationOutcome::Registered { model_id })
}
