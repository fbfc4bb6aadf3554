//! OpenSearch ML Commons client pieces.
//!
//! - [`transport`]: JSON request/response over HTTP
//! - [`api`]: typed connector, model group and model calls
//! - [`task`]: task status and the registration polling loop
//! - [`helper`]: connector/model creation capabilities for managed domains

pub mod api;
pub mod helper;
pub mod task;
pub mod transport;

pub use api::RegisterResponse;
pub use helper::{
    ClusterHelper, ConnectorCreator, ConnectorHelper, ConnectorRole, HelperError, ModelCreator,
    ProviderSecret,
};
pub use task::{
    wait_for_model_registration, Clock, PollConfig, SystemClock, TaskOutcome, TaskState,
    TaskStatus, TaskStatusReader,
};
pub use transport::{HttpTransport, HttpTransportConfig, Method, Transport, TransportError};
