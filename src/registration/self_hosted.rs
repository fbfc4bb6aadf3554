//! Registration on self-hosted clusters with raw ML Commons calls.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::templates::{self, Provider};
use super::{task_abort_reason, AbortReason, RegistrationContext, RegistrationError, RegistrationOutcome};
use crate::config::{ConfigError, PersistedConfig};
use crate::messaging;
use crate::ml::{api, wait_for_model_registration, Clock, PollConfig, RegisterResponse, Transport};
use crate::prompt::{choose, get_custom_json_input, InputProvider, MenuChoice};

/// Transport, clock and polling settings for a self-hosted cluster.
pub struct SelfHostedCluster<T, C> {
    pub transport: T,
    pub clock: C,
    pub poll: PollConfig,
}

impl<T: Transport, C: Clock> SelfHostedCluster<T, C> {
    pub fn new(transport: T, clock: C, poll: PollConfig) -> Self {
        Self {
            transport,
            clock,
            poll,
        }
    }

    /// Resolve a register response to a model id, polling when needed.
    fn await_model_id(&mut self, response: RegisterResponse) -> Result<Result<String, AbortReason>, RegistrationError> {
        let task_id = match response {
            RegisterResponse::Model(model_id) => return Ok(Ok(model_id)),
            RegisterResponse::Task(task_id) => task_id,
        };
        messaging::info(format!("Model registration initiated. Task ID: {}", task_id));

        let outcome = wait_for_model_registration(&mut self.transport, &task_id, self.poll, &mut self.clock)?;
        Ok(task_abort_reason(outcome))
    }

    fn deploy(&mut self, model_id: &str) -> Result<(), RegistrationError> {
        let response = api::deploy_model(&mut self.transport, model_id)?;
        debug!(%model_id, ?response, "Deploy requested");
        messaging::success(format!("Model deployed successfully. Model ID: {}", model_id));
        Ok(())
    }
}

/// Ask whether to register a model now.
///
/// Choosing to register later, or answering with anything else, skips
/// registration.
pub fn prompt_opensource_model_registration<I, S, T, C>(
    ctx: &mut RegistrationContext<'_, I, S>,
    cluster: &mut SelfHostedCluster<T, C>,
    provider: Option<Provider>,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    T: Transport,
    C: Clock,
{
    let title = format!("Would you like to register an {} now?", ctx.role);
    let choice = choose(
        &mut *ctx.input,
        &title,
        &["Yes, register a new model", "No, I will register the model later"],
    )?;

    match choice {
        MenuChoice::Selected(0) => register_model_opensource_interactive(ctx, cluster, provider),
        MenuChoice::Selected(_) => {
            messaging::info("Skipping model registration. You can register models later with `rag-setup register`.");
            Ok(RegistrationOutcome::Skipped)
        }
        MenuChoice::Invalid(raw) => {
            debug!(choice = %raw, "Unrecognized registration choice");
            messaging::warning("Invalid choice. Skipping model registration.");
            Ok(RegistrationOutcome::Skipped)
        }
    }
}

/// Pick a provider (unless one is given) and register with it.
pub fn register_model_opensource_interactive<I, S, T, C>(
    ctx: &mut RegistrationContext<'_, I, S>,
    cluster: &mut SelfHostedCluster<T, C>,
    provider: Option<Provider>,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    T: Transport,
    C: Clock,
{
    let provider = match provider {
        Some(provider) => provider,
        None => {
            let providers = Provider::self_hosted(ctx.role);
            let labels: Vec<String> = providers.iter().map(|p| p.menu_label(ctx.role)).collect();
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            let title = format!("Please select an {} to register:", ctx.role);
            match choose(&mut *ctx.input, &title, &labels)? {
                MenuChoice::Selected(i) => providers[i],
                MenuChoice::Invalid(raw) => {
                    messaging::failure("Invalid choice. Exiting model registration.");
                    return Ok(AbortReason::InvalidChoice(raw).into());
                }
            }
        }
    };

    register_model(ctx, cluster, provider)
}

/// Register a model with `provider` on the cluster and save its id.
pub fn register_model<I, S, T, C>(
    ctx: &mut RegistrationContext<'_, I, S>,
    cluster: &mut SelfHostedCluster<T, C>,
    provider: Provider,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    T: Transport,
    C: Clock,
{
    info!(provider = %provider, role = ?ctx.role, "Self-hosted model registration");

    if !Provider::self_hosted(ctx.role).contains(&provider) {
        messaging::failure(format!(
            "{} is not available for {} registration on self-hosted clusters.",
            provider, ctx.role
        ));
        return Ok(AbortReason::Unsupported {
            provider,
            role: ctx.role,
        }
        .into());
    }

    match provider {
        Provider::HuggingFace => register_huggingface_model(ctx, cluster),
        _ => register_connector_model(ctx, cluster, provider),
    }
}

fn register_connector_model<I, S, T, C>(
    ctx: &mut RegistrationContext<'_, I, S>,
    cluster: &mut SelfHostedCluster<T, C>,
    provider: Provider,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    T: Transport,
    C: Clock,
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

    let api_key = ctx.input.read_secret(&format!("Enter your {} API key", provider))?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        messaging::failure("API key is required. Aborting.");
        return Ok(AbortReason::MissingInput("API key").into());
    }

    let choice = choose(
        &mut *ctx.input,
        "Do you want to use the default configuration or provide custom settings?",
        &["Use default configuration", "Provide custom settings"],
    )?;

    let (mut connector, model_group) = match choice {
        MenuChoice::Selected(0) => (default, templates::model_group(provider, Utc::now().timestamp())),
        MenuChoice::Selected(_) => {
            messaging::info("Please enter your connector details as a JSON object.");
            let Some(connector) = get_custom_json_input(&mut *ctx.input)? else {
                return Ok(AbortReason::InvalidModelDetails.into());
            };
            messaging::info("Please enter your model group details as a JSON object.");
            let Some(group) = get_custom_json_input(&mut *ctx.input)? else {
                return Ok(AbortReason::InvalidModelDetails.into());
            };
            (connector, group)
        }
        MenuChoice::Invalid(raw) => {
            messaging::failure("Invalid choice. Aborting model registration.");
            return Ok(AbortReason::InvalidChoice(raw).into());
        }
    };

    // Custom payloads may bring their own credential block.
    let Some(object) = connector.as_object_mut() else {
        messaging::failure("Connector details must be a JSON object.");
        return Ok(AbortReason::InvalidModelDetails.into());
    };
    if !object.contains_key("credential") {
        let mut credential = Map::new();
        credential.insert(key.to_string(), Value::String(api_key));
        object.insert("credential".to_string(), Value::Object(credential));
    }

    let connector_id = api::create_connector(&mut cluster.transport, &connector)?;
    messaging::success(format!("Connector registered successfully. Connector ID: {}", connector_id));

    let model_group_id = api::register_model_group(&mut cluster.transport, &model_group)?;
    messaging::success(format!("Model group ready. Model Group ID: {}", model_group_id));

    let (name, description) = templates::model_name_and_description(&connector, provider, ctx.role);
    let payload = templates::remote_model(&name, &description, &model_group_id, &connector_id);
    let response = api::register_model(&mut cluster.transport, &payload, false)?;

    finish(ctx, cluster, response)
}

fn register_huggingface_model<I, S, T, C>(
    ctx: &mut RegistrationContext<'_, I, S>,
    cluster: &mut SelfHostedCluster<T, C>,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    T: Transport,
    C: Clock,
{
    let choice = choose(
        &mut *ctx.input,
        "Do you want to use the default configuration or provide custom settings?",
        &["Use default configuration", "Provide custom settings"],
    )?;

    let payload = match choice {
        MenuChoice::Selected(0) => templates::huggingface_pretrained(),
        MenuChoice::Selected(_) => {
            let model_name = ctx.input.read_line(
                "Enter the Hugging Face model ID (e.g., 'sentence-transformers/all-MiniLM-L6-v2')",
            )?;
            let model_name = model_name.trim().to_string();
            if model_name.is_empty() {
                messaging::failure("Model ID is required. Aborting.");
                return Ok(AbortReason::MissingInput("Hugging Face model ID").into());
            }

            let dimension = ctx.config.embedding_dimension()?;
            let example = templates::huggingface_custom_example(&model_name, dimension);
            messaging::info("Please enter your model details as a JSON object.");
            messaging::info("Example:");
            messaging::info(serde_json::to_string_pretty(&example).unwrap_or_default());

            match get_custom_json_input(&mut *ctx.input)? {
                Some(payload) => payload,
                None => return Ok(AbortReason::InvalidModelDetails.into()),
            }
        }
        MenuChoice::Invalid(raw) => {
            messaging::failure("Invalid choice. Aborting model registration.");
            return Ok(AbortReason::InvalidChoice(raw).into());
        }
    };

    let response = api::register_model(&mut cluster.transport, &payload, false)?;
    finish(ctx, cluster, response)
}

/// Wait for the model id, deploy, then save.
fn finish<I, S, T, C>(
    ctx: &mut RegistrationContext<'_, I, S>,
    cluster: &mut SelfHostedCluster<T, C>,
    response: RegisterResponse,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
    T: Transport,
    C: Clock,
{
    let model_id = match cluster.await_model_id(response)? {
        Ok(model_id) => model_id,
        Err(reason) => {
            warn!(%reason, "Model registration did not complete");
            messaging::failure(format!("Model registration failed: {}.", reason));
            return Ok(reason.into());
        }
    };

    cluster.deploy(&model_id)?;
    ctx.save_model_id(&model_id)?;
    messaging::success(format!("Model ID '{}' saved in configuration.", model_id));
    Ok(RegistrationOutcome::Registered { model_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::api::paths;
    use crate::ml::api::test_support::RecordingTransport;
    use crate::ml::task::test_support::ManualClock;
    use crate::ml::{Method, TaskState, TransportError};
    use crate::prompt::ScriptedInput;
    use crate::registration::test_support::{config_with, recording_save};
    use crate::registration::ModelRole;
    use serde_json::json;
    use std::time::Duration;

    fn cluster(responses: Vec<Value>) -> SelfHostedCluster<RecordingTransport, ManualClock> {
        SelfHostedCluster::new(
            RecordingTransport::new(responses),
            ManualClock::new(),
            PollConfig::default(),
        )
    }

    #[test]
    fn test_cohere_end_to_end_issues_five_calls() {
        let mut input = ScriptedInput::new(["test-api-key", "1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = cluster(vec![
            json!({"connector_id": "test-connector-id"}),
            json!({"model_group_id": "test-group-id"}),
            json!({"task_id": "test-task-id"}),
            json!({"state": "COMPLETED", "model_id": "test-model-id"}),
            json!({}),
        ]);

        let outcome = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::Cohere).unwrap()
        };

        assert_eq!(outcome.model_id(), Some("test-model-id"));
        assert_eq!(
            cluster.transport.paths(),
            vec![
                paths::CREATE_CONNECTOR,
                paths::REGISTER_MODEL_GROUP,
                paths::REGISTER_MODEL,
                "/_plugins/_ml/tasks/test-task-id",
                "/_plugins/_ml/models/test-model-id/_deploy",
            ]
        );
        assert_eq!(cluster.transport.calls[3].method, Method::Get);
        assert_eq!(
            cluster.transport.calls[0].body.as_ref().unwrap()["credential"],
            json!({"cohere_key": "test-api-key"})
        );
        assert_eq!(
            cluster.transport.calls[2].body,
            Some(json!({
                "name": "Cohere Embedding Model Connector",
                "function_name": "remote",
                "model_group_id": "test-group-id",
                "description": "Connector for Cohere embedding model",
                "connector_id": "test-connector-id"
            }))
        );
        assert!(cluster.clock.sleeps.is_empty());
        assert_eq!(
            *saved.borrow(),
            vec![config_with(&[("embedding_model_id", "test-model-id")])]
        );
    }

    #[test]
    fn test_model_group_name_is_timestamped() {
        let mut input = ScriptedInput::new(["k", "1"]);
        let mut config = PersistedConfig::new();
        let (_saved, save) = recording_save();
        let mut cluster = cluster(vec![
            json!({"connector_id": "c"}),
            json!({"model_group_id": "g"}),
            json!({"model_id": "m"}),
            json!({}),
        ]);

        {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::OpenAi).unwrap();
        }

        let group = cluster.transport.calls[1].body.as_ref().unwrap();
        let name = group["name"].as_str().unwrap();
        assert!(name.starts_with("openai_model_group_"));
        assert!(name["openai_model_group_".len()..].parse::<i64>().is_ok());
        // Synchronous model id: no task polling.
        assert_eq!(cluster.transport.calls.len(), 4);
    }

    #[test]
    fn test_existing_model_group_is_reused() {
        let mut input = ScriptedInput::new(["k", "1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = cluster(vec![json!({"connector_id": "c"})]);
        cluster.transport.push_error(TransportError::Status {
            method: Method::Post,
            path: paths::REGISTER_MODEL_GROUP.into(),
            status: 400,
            body: "illegal_argument_exception: The name you provided is already being used by a model group with ID: grp-1.".into(),
        });
        cluster.transport.push(json!({"task_id": "t"}));
        cluster.transport.push(json!({"state": "COMPLETED", "model_id": "m"}));
        cluster.transport.push(json!({}));

        {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::Cohere).unwrap();
        }

        assert_eq!(
            cluster.transport.calls[2].body.as_ref().unwrap()["model_group_id"],
            json!("grp-1")
        );
        assert_eq!(saved.borrow().len(), 1);
    }

    #[test]
    fn test_custom_connector_and_group() {
        let mut input = ScriptedInput::new([
            "k",
            "2",
            r#"{"name": "custom-connector", "credential": {"cohere_key": "inline"}}"#,
            r#"{"name": "custom-group"}"#,
        ]);
        let mut config = PersistedConfig::new();
        let (_saved, save) = recording_save();
        let mut cluster = cluster(vec![
            json!({"connector_id": "c"}),
            json!({"model_group_id": "g"}),
            json!({"model_id": "m"}),
            json!({}),
        ]);

        {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::Cohere).unwrap();
        }

        assert_eq!(
            cluster.transport.calls[0].body,
            Some(json!({"name": "custom-connector", "credential": {"cohere_key": "inline"}}))
        );
        assert_eq!(cluster.transport.calls[1].body, Some(json!({"name": "custom-group"})));
    }

    #[test]
    fn test_task_failure_aborts_without_deploy_or_save() {
        let mut input = ScriptedInput::new(["k", "1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = cluster(vec![
            json!({"connector_id": "c"}),
            json!({"model_group_id": "g"}),
            json!({"task_id": "t"}),
            json!({"state": "FAILED", "error": "connector rejected"}),
        ]);

        let outcome = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::Cohere).unwrap()
        };

        assert_eq!(
            outcome,
            RegistrationOutcome::Aborted(AbortReason::TaskFailed {
                state: TaskState::Failed,
                error: Some("connector rejected".into())
            })
        );
        assert_eq!(cluster.transport.calls.len(), 4);
        assert!(saved.borrow().is_empty());
    }

    #[test]
    fn test_timeout_aborts_without_save() {
        let mut input = ScriptedInput::new(["k", "1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = SelfHostedCluster::new(
            RecordingTransport::new(vec![
                json!({"connector_id": "c"}),
                json!({"model_group_id": "g"}),
                json!({"task_id": "t"}),
                json!({"state": "RUNNING"}),
                json!({"state": "RUNNING"}),
                json!({"state": "RUNNING"}),
            ]),
            ManualClock::new(),
            PollConfig::new(Duration::from_secs(20), Duration::from_secs(10)),
        );

        let outcome = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::Cohere).unwrap()
        };

        assert!(matches!(outcome, RegistrationOutcome::Aborted(AbortReason::TimedOut { .. })));
        assert_eq!(cluster.transport.calls.len(), 6);
        assert_eq!(cluster.clock.sleeps.len(), 2);
        assert!(saved.borrow().is_empty());
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut input = ScriptedInput::new(["k", "1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = cluster(vec![]);
        cluster.transport.push_error(TransportError::Status {
            method: Method::Post,
            path: paths::CREATE_CONNECTOR.into(),
            status: 500,
            body: "boom".into(),
        });

        let result = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::Cohere)
        };

        assert!(matches!(result, Err(RegistrationError::Transport(TransportError::Status { status: 500, .. }))));
        assert_eq!(cluster.transport.calls.len(), 1);
        assert!(saved.borrow().is_empty());
    }

    #[test]
    fn test_empty_api_key_makes_no_requests() {
        let mut input = ScriptedInput::new([""]);
        let mut config = PersistedConfig::new();
        let (_saved, save) = recording_save();
        let mut cluster = cluster(vec![]);

        let outcome = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::OpenAi).unwrap()
        };

        assert_eq!(outcome, RegistrationOutcome::Aborted(AbortReason::MissingInput("API key")));
        assert!(cluster.transport.calls.is_empty());
    }

    #[test]
    fn test_huggingface_default_registers_and_deploys() {
        let mut input = ScriptedInput::new(["1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = cluster(vec![
            json!({"task_id": "t-hf"}),
            json!({"state": "RUNNING"}),
            json!({"state": "COMPLETED", "model_id": "hf-model"}),
            json!({"task_id": "deploy-task", "status": "CREATED"}),
        ]);

        let outcome = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::HuggingFace).unwrap()
        };

        assert_eq!(outcome.model_id(), Some("hf-model"));
        assert_eq!(cluster.transport.calls[0].body, Some(templates::huggingface_pretrained()));
        assert_eq!(
            cluster.transport.paths().last().copied(),
            Some("/_plugins/_ml/models/hf-model/_deploy")
        );
        assert_eq!(cluster.clock.sleeps, vec![Duration::from_secs(10)]);
        assert_eq!(saved.borrow()[0].get("embedding_model_id"), Some("hf-model"));
    }

    #[test]
    fn test_huggingface_custom_uses_configured_dimension() {
        let mut input = ScriptedInput::new(["2", "sentence-transformers/all-mpnet-base-v2", "not json"]);
        let mut config = config_with(&[("embedding_dimension", "384")]);
        let (_saved, save) = recording_save();
        let mut cluster = cluster(vec![]);

        let outcome = {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            register_model(&mut ctx, &mut cluster, Provider::HuggingFace).unwrap()
        };

        assert_eq!(outcome, RegistrationOutcome::Aborted(AbortReason::InvalidModelDetails));
        assert!(cluster.transport.calls.is_empty());
    }

    #[test]
    fn test_huggingface_is_embedding_only() {
        let mut input = ScriptedInput::default();
        let mut config = PersistedConfig::new();
        let (_saved, save) = recording_save();
        let mut cluster = cluster(vec![]);

        let mut ctx = RegistrationContext::new(&mut input, &mut config, save).with_role(ModelRole::Llm);
        let outcome = register_model(&mut ctx, &mut cluster, Provider::HuggingFace).unwrap();

        assert!(matches!(outcome, RegistrationOutcome::Aborted(AbortReason::Unsupported { .. })));
    }

    #[test]
    fn test_register_later_skips() {
        for answer in ["2", "x"] {
            let mut input = ScriptedInput::new([answer]);
            let mut config = PersistedConfig::new();
            let (saved, save) = recording_save();
            let mut cluster = cluster(vec![]);

            let outcome = {
                let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
                prompt_opensource_model_registration(&mut ctx, &mut cluster, None).unwrap()
            };

            assert_eq!(outcome, RegistrationOutcome::Skipped);
            assert!(saved.borrow().is_empty());
        }
    }

    #[test]
    fn test_provider_menu_selection() {
        // Register now, pick OpenAI (2), then key and defaults.
        let mut input = ScriptedInput::new(["1", "2", "sk", "1"]);
        let mut config = PersistedConfig::new();
        let (saved, save) = recording_save();
        let mut cluster = cluster(vec![
            json!({"connector_id": "c"}),
            json!({"model_group_id": "g"}),
            json!({"task_id": "t"}),
            json!({"state": "COMPLETED", "model_id": "m"}),
            json!({}),
        ]);

        {
            let mut ctx = RegistrationContext::new(&mut input, &mut config, save);
            prompt_opensource_model_registration(&mut ctx, &mut cluster, None).unwrap();
        }

        assert_eq!(
            cluster.transport.calls[0].body.as_ref().unwrap()["credential"],
            json!({"openAI_key": "sk"})
        );
        assert_eq!(saved.borrow().len(), 1);
    }
}
