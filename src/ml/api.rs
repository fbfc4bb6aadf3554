//! ML Commons REST calls.
//!
//! Thin typed wrappers over [`Transport`] that pull the identifiers out of
//! each response. Every wrapper issues exactly one request.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::transport::{Method, Transport, TransportError};

/// Endpoint paths.
pub mod paths {
    pub const CREATE_CONNECTOR: &str = "/_plugins/_ml/connectors/_create";
    pub const SEARCH_MODEL_GROUPS: &str = "/_plugins/_ml/model_groups/_search";
    pub const REGISTER_MODEL_GROUP: &str = "/_plugins/_ml/model_groups/_register";
    pub const REGISTER_MODEL: &str = "/_plugins/_ml/models/_register";

    pub fn register_model(deploy: bool) -> String {
        if deploy {
            format!("{}?deploy=true", REGISTER_MODEL)
        } else {
            REGISTER_MODEL.to_string()
        }
    }

    pub fn task(task_id: &str) -> String {
        format!("/_plugins/_ml/tasks/{}", task_id)
    }

    pub fn deploy_model(model_id: &str) -> String {
        format!("/_plugins/_ml/models/{}/_deploy", model_id)
    }
}

/// Identifiers returned by the register-model endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterResponse {
    /// Registration runs asynchronously under this task.
    Task(String),
    /// The model id was returned synchronously.
    Model(String),
}

fn required_str(response: &Value, path: &str, field: &'static str) -> Result<String, TransportError> {
    response
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TransportError::MissingField {
            path: path.to_string(),
            field,
            response: response.clone(),
        })
}

/// Create a connector and return its `connector_id`.
pub fn create_connector<T>(transport: &mut T, payload: &Value) -> Result<String, TransportError>
where
    T: Transport + ?Sized,
{
    let response = transport.perform_request(Method::Post, paths::CREATE_CONNECTOR, Some(payload))?;
    let connector_id = required_str(&response, paths::CREATE_CONNECTOR, "connector_id")?;
    debug!(%connector_id, "Connector created");
    Ok(connector_id)
}

/// Find a model group by exact name. Returns the first hit's id.
pub fn search_model_group<T>(transport: &mut T, name: &str) -> Result<Option<String>, TransportError>
where
    T: Transport + ?Sized,
{
    let query = json!({
        "query": { "term": { "name.keyword": { "value": name } } }
    });
    let response = transport.perform_request(Method::Post, paths::SEARCH_MODEL_GROUPS, Some(&query))?;

    let id = response
        .pointer("/hits/hits/0/_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    debug!(model_group = name, found = ?id, "Model group search");
    Ok(id)
}

/// Register a model group and return its `model_group_id`.
///
/// When the cluster rejects the name because a group already uses it, the
/// existing group's id is taken from the error text instead.
pub fn register_model_group<T>(transport: &mut T, payload: &Value) -> Result<String, TransportError>
where
    T: Transport + ?Sized,
{
    match transport.perform_request(Method::Post, paths::REGISTER_MODEL_GROUP, Some(payload)) {
        Ok(response) => required_str(&response, paths::REGISTER_MODEL_GROUP, "model_group_id"),
        Err(err) => match err.status_body().and_then(existing_group_id) {
            Some(existing) => {
                warn!(model_group_id = %existing, "Model group name already in use, reusing existing group");
                Ok(existing)
            }
            None => Err(err),
        },
    }
}

/// Pull the model group id out of an "already being used" rejection.
pub fn existing_group_id(error_body: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if !error_body.contains("already being used") {
        return None;
    }
    let pattern = PATTERN.get_or_init(|| Regex::new(r"ID:\s*'?([A-Za-z0-9_\-]+)").unwrap());
    pattern
        .captures(error_body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Register a model. Prefers `model_id` when the response carries both.
pub fn register_model<T>(
    transport: &mut T,
    payload: &Value,
    deploy: bool,
) -> Result<RegisterResponse, TransportError>
where
    T: Transport + ?Sized,
{
    let path = paths::register_model(deploy);
    let response = transport.perform_request(Method::Post, &path, Some(payload))?;

    if let Ok(model_id) = required_str(&response, &path, "model_id") {
        return Ok(RegisterResponse::Model(model_id));
    }
    let task_id = required_str(&response, &path, "task_id")?;
    debug!(%task_id, "Model registration task started");
    Ok(RegisterResponse::Task(task_id))
}

/// Deploy a registered model.
pub fn deploy_model<T>(transport: &mut T, model_id: &str) -> Result<Value, TransportError>
where
    T: Transport + ?Sized,
{
    transport.perform_request(Method::Post, &paths::deploy_model(model_id), None)
}
