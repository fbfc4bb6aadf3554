//! Model registration flows.
//!
//! Two variants share the same shape: collect a connector payload, create the
//! connector and the model, wait for the model id, then hand the updated
//! configuration to the caller's save callback exactly once.
//!
//! - [`managed`] goes through a [`ConnectorHelper`](crate::ml::ConnectorHelper)
//! - [`self_hosted`] issues raw ML Commons calls over a
//!   [`Transport`](crate::ml::Transport)
//!
//! Bad input, failed tasks and timeouts are reported as
//! [`RegistrationOutcome::Aborted`]. Transport and helper failures are errors.

pub mod managed;
pub mod self_hosted;
pub mod templates;

pub use templates::Provider;

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::{keys, ConfigError, PersistedConfig};
use crate::messaging;
use crate::ml::{HelperError, TaskOutcome, TaskState, TransportError};
use crate::prompt::{InputError, InputProvider};

/// Error type for registration flows.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Helper(#[from] HelperError),

    #[error("Failed to save configuration: {0}")]
    Config(#[from] ConfigError),
}

/// What the registered model is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModelRole {
    /// Produces vectors for retrieval.
    #[default]
    Embedding,
    /// Generates answers from retrieved context.
    Llm,
}

impl ModelRole {
    /// Configuration key the model id is saved under.
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Embedding => keys::EMBEDDING_MODEL_ID,
            Self::Llm => keys::LLM_MODEL_ID,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding model",
            Self::Llm => "language model",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a registration stopped without a model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A menu answer was not one of the listed options.
    InvalidChoice(String),
    /// Custom model details were rejected: unknown choice or malformed JSON.
    InvalidModelDetails,
    /// A required answer was left blank.
    MissingInput(&'static str),
    /// The provider has no template for this deployment or role.
    Unsupported { provider: Provider, role: ModelRole },
    /// The registration task reached a failure state.
    TaskFailed { state: TaskState, error: Option<String> },
    /// The registration task was still pending at the deadline.
    TimedOut { elapsed: Duration },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChoice(raw) => write!(f, "invalid choice '{}'", raw),
            Self::InvalidModelDetails => f.write_str("invalid model details"),
            Self::MissingInput(what) => write!(f, "{} is required", what),
            Self::Unsupported { provider, role } => {
                write!(f, "{} has no {} template for this deployment", provider, role)
            }
            Self::TaskFailed { state, error: Some(e) } => {
                write!(f, "registration task ended in state {}: {}", state, e)
            }
            Self::TaskFailed { state, error: None } => {
                write!(f, "registration task ended in state {}", state)
            }
            Self::TimedOut { elapsed } => {
                write!(f, "registration task did not finish within {}s", elapsed.as_secs())
            }
        }
    }
}

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The model id was saved under the role's key.
    Registered { model_id: String },
    /// The user chose to register later.
    Skipped,
    Aborted(AbortReason),
}

impl RegistrationOutcome {
    pub fn model_id(&self) -> Option<&str> {
        match self {
            Self::Registered { model_id } => Some(model_id),
            _ => None,
        }
    }
}

impl From<AbortReason> for RegistrationOutcome {
    fn from(reason: AbortReason) -> Self {
        Self::Aborted(reason)
    }
}

/// Map a non-successful task outcome to an abort reason.
pub(crate) fn task_abort_reason(outcome: TaskOutcome) -> Result<String, AbortReason> {
    match outcome {
        TaskOutcome::Completed { model_id } => Ok(model_id),
        TaskOutcome::Failed { state, error } => Err(AbortReason::TaskFailed { state, error }),
        TaskOutcome::TimedOut { elapsed, .. } => Err(AbortReason::TimedOut { elapsed }),
    }
}

/// Input, configuration and save callback for one registration.
pub struct RegistrationContext<'a, I: ?Sized, S> {
    pub input: &'a mut I,
    pub config: &'a mut PersistedConfig,
    save: S,
    pub role: ModelRole,
}

impl<'a, I, S> RegistrationContext<'a, I, S>
where
    I: InputProvider + ?Sized,
    S: FnMut(&PersistedConfig) -> Result<(), ConfigError>,
{
    pub fn new(input: &'a mut I, config: &'a mut PersistedConfig, save: S) -> Self {
        Self {
            input,
            config,
            save,
            role: ModelRole::default(),
        }
    }

    pub fn with_role(mut self, role: ModelRole) -> Self {
        self.role = role;
        self
    }

    /// Write the model id under the role's key and call the save callback.
    pub fn save_model_id(&mut self, model_id: &str) -> Result<(), RegistrationError> {
        self.config.set(self.role.config_key(), model_id);
        (self.save)(self.config)?;
        info!(key = self.role.config_key(), %model_id, "Model id saved");
        Ok(())
    }

    /// Persist an id the user already has, without touching the cluster.
    pub fn use_existing_model(&mut self, model_id: &str) -> Result<RegistrationOutcome, RegistrationError> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            messaging::failure(format!(
                "No model ID provided. Cannot proceed without an {}.",
                self.role
            ));
            return Ok(AbortReason::MissingInput("model ID").into());
        }

        self.save_model_id(model_id)?;
        messaging::success(format!(
            "Model ID '{}' saved successfully in configuration.",
            model_id
        ));
        Ok(RegistrationOutcome::Registered {
            model_id: model_id.to_string(),
        })
    }
}
