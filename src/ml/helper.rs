//! Connector and model creation for managed deployments.
//!
//! The managed registration flow only depends on the [`ConnectorCreator`] and
//! [`ModelCreator`] capabilities. [`ClusterHelper`] implements both over a
//! [`Transport`]; provisioning of secret stores and IAM roles happens outside
//! this crate, so the helper only attaches references to them.

use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::api::{self, RegisterResponse};
use super::task::{wait_for_model_registration, Clock, PollConfig, TaskOutcome, TaskState};
use super::transport::{Transport, TransportError};

/// Error type for helper operations.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Connector payload must be a JSON object")]
    InvalidPayload,

    #[error("Registration task {task_id} ended in state {state}{}", .error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default())]
    TaskFailed {
        task_id: String,
        state: TaskState,
        error: Option<String>,
    },

    #[error("Registration task {task_id} did not finish within {elapsed:?}")]
    TaskTimedOut { task_id: String, elapsed: Duration },
}

/// A provider API key and the name it is stored under.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSecret {
    /// Name of the secret, for display and lookup.
    pub name: String,
    /// Credential key the connector template references.
    pub key: String,
    pub value: String,
}

impl ProviderSecret {
    pub fn new(name: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// `{ <key>: <value> }` credential block.
    pub fn credential(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.key.clone(), Value::String(self.value.clone()));
        Value::Object(map)
    }
}

impl std::fmt::Debug for ProviderSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSecret")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// IAM role the connector assumes when calling the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorRole {
    pub arn: String,
}

impl ConnectorRole {
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into() }
    }
}

/// Creates connectors backed by a secret or an IAM role.
pub trait ConnectorCreator {
    /// Create a connector whose credential comes from `secret`. Returns the connector id.
    fn create_connector_with_secret(
        &mut self,
        secret: &ProviderSecret,
        payload: Value,
    ) -> Result<String, HelperError>;

    /// Create a connector that signs provider calls with `role`. Returns the connector id.
    fn create_connector_with_role(
        &mut self,
        role: &ConnectorRole,
        payload: Value,
    ) -> Result<String, HelperError>;
}

/// Creates a model referencing a connector.
pub trait ModelCreator {
    /// Register (and deploy) a remote model. Returns the model id.
    fn create_model(
        &mut self,
        name: &str,
        description: &str,
        connector_id: &str,
    ) -> Result<String, HelperError>;
}

/// Both helper capabilities.
pub trait ConnectorHelper: ConnectorCreator + ModelCreator {}

impl<T: ConnectorCreator + ModelCreator + ?Sized> ConnectorHelper for T {}

/// Helper that talks to the cluster directly.
pub struct ClusterHelper<T, C> {
    transport: T,
    clock: C,
    poll: PollConfig,
}

impl<T: Transport, C: Clock> ClusterHelper<T, C> {
    pub fn new(transport: T, clock: C, poll: PollConfig) -> Self {
        Self {
            transport,
            clock,
            poll,
        }
    }

    fn create_connector_with_credential(
        &mut self,
        mut payload: Value,
        credential: Value,
    ) -> Result<String, HelperError> {
        let object = payload.as_object_mut().ok_or(HelperError::InvalidPayload)?;
        object.insert("credential".to_string(), credential);
        Ok(api::create_connector(&mut self.transport, &payload)?)
    }

    /// Reuse a model group with this name or register a new one.
    fn resolve_model_group(&mut self, name: &str, description: &str) -> Result<String, HelperError> {
        if let Some(existing) = api::search_model_group(&mut self.transport, name)? {
            debug!(model_group_id = %existing, "Reusing model group");
            return Ok(existing);
        }
        let payload = json!({ "name": name, "description": description });
        Ok(api::register_model_group(&mut self.transport, &payload)?)
    }
}

impl<T: Transport, C: Clock> ConnectorCreator for ClusterHelper<T, C> {
    fn create_connector_with_secret(
        &mut self,
        secret: &ProviderSecret,
        payload: Value,
    ) -> Result<String, HelperError> {
        info!(secret = %secret.name, "Creating secret-backed connector");
        self.create_connector_with_credential(payload, secret.credential())
    }

    fn create_connector_with_role(
        &mut self,
        role: &ConnectorRole,
        payload: Value,
    ) -> Result<String, HelperError> {
        info!(role = %role.arn, "Creating role-backed connector");
        self.create_connector_with_credential(payload, json!({ "roleArn": role.arn }))
    }
}

impl<T: Transport, C: Clock> ModelCreator for ClusterHelper<T, C> {
    fn create_model(
        &mut self,
        name: &str,
        description: &str,
        connector_id: &str,
    ) -> Result<String, HelperError> {
        let model_group_id = self.resolve_model_group(name, description)?;
        let payload = json!({
            "name": name,
            "function_name": "remote",
            "description": description,
            "model_group_id": model_group_id,
            "connector_id": connector_id,
        });

        let task_id = match api::register_model(&mut self.transport, &payload, true)? {
            RegisterResponse::Model(model_id) => return Ok(model_id),
            RegisterResponse::Task(task_id) => task_id,
        };

        match wait_for_model_registration(&mut self.transport, &task_id, self.poll, &mut self.clock)? {
            TaskOutcome::Completed { model_id } => Ok(model_id),
            TaskOutcome::Failed { state, error } => Err(HelperError::TaskFailed {
                task_id,
                state,
                error,
            }),
            TaskOutcome::TimedOut { elapsed, .. } => Err(HelperError::TaskTimedOut { task_id, elapsed }),
        }
    }
}
