//! Built-in providers and their default ML Commons payloads.

use serde_json::{json, Value};
use std::fmt;

use super::ModelRole;

/// Hugging Face pretrained model registered by default on self-hosted clusters.
pub const HUGGINGFACE_DEFAULT_MODEL: &str = "huggingface/sentence-transformers/all-MiniLM-L6-v2";
pub const HUGGINGFACE_DEFAULT_VERSION: &str = "1.0.1";

/// Model providers with a built-in template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    /// Amazon Bedrock Titan embeddings (managed, IAM role)
    Bedrock,
    /// Amazon SageMaker endpoint (managed, IAM role)
    #[value(name = "sagemaker")]
    SageMaker,
    /// Cohere API (API key)
    Cohere,
    /// OpenAI API (API key)
    #[value(name = "openai")]
    OpenAi,
    /// Hugging Face pretrained model (self-hosted only)
    #[value(name = "huggingface")]
    HuggingFace,
}

const MANAGED_EMBEDDING: &[Provider] = &[
    Provider::Bedrock,
    Provider::SageMaker,
    Provider::Cohere,
    Provider::OpenAi,
];
const SELF_HOSTED_EMBEDDING: &[Provider] = &[Provider::Cohere, Provider::OpenAi, Provider::HuggingFace];
const CHAT: &[Provider] = &[Provider::Cohere, Provider::OpenAi];

impl Provider {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Bedrock => "Amazon Bedrock",
            Self::SageMaker => "Amazon SageMaker",
            Self::Cohere => "Cohere",
            Self::OpenAi => "OpenAI",
            Self::HuggingFace => "Hugging Face Transformers",
        }
    }

    /// Lowercase prefix used in generated model group names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Bedrock => "bedrock",
            Self::SageMaker => "sagemaker",
            Self::Cohere => "cohere",
            Self::OpenAi => "openai",
            Self::HuggingFace => "huggingface",
        }
    }

    /// Credential key referenced by the connector's auth header.
    pub fn credential_key(&self) -> Option<&'static str> {
        match self {
            Self::Cohere => Some("cohere_key"),
            Self::OpenAi => Some("openAI_key"),
            _ => None,
        }
    }

    /// Providers offered on managed domains for `role`.
    pub fn managed(role: ModelRole) -> &'static [Provider] {
        match role {
            ModelRole::Embedding => MANAGED_EMBEDDING,
            ModelRole::Llm => CHAT,
        }
    }

    /// Providers offered on self-hosted clusters for `role`.
    pub fn self_hosted(role: ModelRole) -> &'static [Provider] {
        match role {
            ModelRole::Embedding => SELF_HOSTED_EMBEDDING,
            ModelRole::Llm => CHAT,
        }
    }

    /// Menu label, e.g. "Cohere embedding model".
    pub fn menu_label(&self, role: ModelRole) -> String {
        match self {
            Self::HuggingFace => format!("{} ({})", self.display_name(), HUGGINGFACE_DEFAULT_MODEL),
            _ => format!("{} {}", self.display_name(), role),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Default connector for an API-key provider, or `None` when the provider
/// is not key-based.
pub fn secret_connector(provider: Provider, role: ModelRole) -> Option<Value> {
    match (provider, role) {
        (Provider::Cohere, ModelRole::Embedding) => Some(cohere_embedding_connector()),
        (Provider::Cohere, ModelRole::Llm) => Some(cohere_chat_connector()),
        (Provider::OpenAi, ModelRole::Embedding) => Some(openai_embedding_connector()),
        (Provider::OpenAi, ModelRole::Llm) => Some(openai_chat_connector()),
        _ => None,
    }
}

pub fn cohere_embedding_connector() -> Value {
    json!({
        "name": "Cohere Embedding Model Connector",
        "description": "Connector for Cohere embedding model",
        "version": "1.0",
        "protocol": "http",
        "parameters": {
            "model": "embed-english-v3.0",
            "input_type": "search_document",
            "truncate": "END"
        },
        "actions": [{
            "action_type": "predict",
            "method": "POST",
            "url": "https://api.cohere.ai/v1/embed",
            "headers": {
                "Authorization": "Bearer ${credential.cohere_key}",
                "Request-Source": "unspecified:opensearch"
            },
            "request_body": "{ \"texts\": ${parameters.texts}, \"truncate\": \"${parameters.truncate}\", \"model\": \"${parameters.model}\", \"input_type\": \"${parameters.input_type}\" }",
            "pre_process_function": "connector.pre_process.cohere.embedding",
            "post_process_function": "connector.post_process.cohere.embedding"
        }]
    })
}

pub fn openai_embedding_connector() -> Value {
    json!({
        "name": "OpenAI Embedding Model Connector",
        "description": "Connector for OpenAI embedding model",
        "version": "1.0",
        "protocol": "http",
        "parameters": {
            "model": "text-embedding-ada-002"
        },
        "actions": [{
            "action_type": "predict",
            "method": "POST",
            "url": "https://api.openai.com/v1/embeddings",
            "headers": {
                "Authorization": "Bearer ${credential.openAI_key}"
            },
            "request_body": "{ \"input\": ${parameters.input}, \"model\": \"${parameters.model}\" }",
            "pre_process_function": "connector.pre_process.openai.embedding",
            "post_process_function": "connector.post_process.openai.embedding"
        }]
    })
}

pub fn cohere_chat_connector() -> Value {
    json!({
        "name": "Cohere Chat Model Connector",
        "description": "Connector for Cohere chat model",
        "version": "1.0",
        "protocol": "http",
        "parameters": {
            "model": "command-r-plus"
        },
        "actions": [{
            "action_type": "predict",
            "method": "POST",
            "url": "https://api.cohere.ai/v1/chat",
            "headers": {
                "Authorization": "Bearer ${credential.cohere_key}",
                "Request-Source": "unspecified:opensearch"
            },
            "request_body": "{ \"message\": \"${parameters.message}\", \"model\": \"${parameters.model}\" }"
        }]
    })
}

pub fn openai_chat_connector() -> Value {
    json!({
        "name": "OpenAI Chat Model Connector",
        "description": "Connector for OpenAI chat completions",
        "version": "1.0",
        "protocol": "http",
        "parameters": {
            "model": "gpt-4o-mini"
        },
        "actions": [{
            "action_type": "predict",
            "method": "POST",
            "url": "https://api.openai.com/v1/chat/completions",
            "headers": {
                "Authorization": "Bearer ${credential.openAI_key}"
            },
            "request_body": "{ \"model\": \"${parameters.model}\", \"messages\": ${parameters.messages} }"
        }]
    })
}

/// Titan text embeddings through Bedrock, signed with SigV4.
pub fn bedrock_embedding_connector(region: &str) -> Value {
    json!({
        "name": "Amazon Bedrock Connector: titan embedding v1",
        "description": "The connector to Bedrock Titan embedding model",
        "version": 1,
        "protocol": "aws_sigv4",
        "parameters": {
            "region": region,
            "service_name": "bedrock"
        },
        "actions": [{
            "action_type": "predict",
            "method": "POST",
            "url": format!("https://bedrock-runtime.{}.amazonaws.com/model/amazon.titan-embed-text-v1/invoke", region),
            "headers": {
                "content-type": "application/json",
                "x-amz-content-sha256": "required"
            },
            "request_body": "{ \"inputText\": \"${parameters.inputText}\" }",
            "pre_process_function": "connector.pre_process.bedrock.embedding",
            "post_process_function": "connector.post_process.bedrock.embedding"
        }]
    })
}

pub fn sagemaker_embedding_connector(region: &str, endpoint_url: &str) -> Value {
    json!({
        "name": "SageMaker embedding model connector",
        "description": "Connector for my SageMaker embedding model",
        "version": "1.0",
        "protocol": "aws_sigv4",
        "parameters": {
            "region": region,
            "service_name": "sagemaker"
        },
        "actions": [{
            "action_type": "predict",
            "method": "POST",
            "headers": {
                "content-type": "application/json"
            },
            "url": endpoint_url,
            "request_body": "${parameters.input}",
            "pre_process_function": "connector.pre_process.default.embedding",
            "post_process_function": "connector.post_process.default.embedding"
        }]
    })
}

/// Model group named `<provider>_model_group_<timestamp>`.
pub fn model_group(provider: Provider, timestamp: i64) -> Value {
    json!({
        "name": format!("{}_model_group_{}", provider.slug(), timestamp),
        "description": format!("Model group for {} models", provider.display_name())
    })
}

/// Remote model registration body for a self-hosted cluster.
pub fn remote_model(name: &str, description: &str, model_group_id: &str, connector_id: &str) -> Value {
    json!({
        "name": name,
        "function_name": "remote",
        "model_group_id": model_group_id,
        "description": description,
        "connector_id": connector_id
    })
}

/// Pretrained model body for [`HUGGINGFACE_DEFAULT_MODEL`].
pub fn huggingface_pretrained() -> Value {
    json!({
        "name": HUGGINGFACE_DEFAULT_MODEL,
        "version": HUGGINGFACE_DEFAULT_VERSION,
        "model_format": "TORCH_SCRIPT"
    })
}

/// Example body shown before asking for a custom sentence-transformers model.
pub fn huggingface_custom_example(model_name: &str, embedding_dimension: u32) -> Value {
    let short_name = model_name.rsplit('/').next().unwrap_or(model_name);
    json!({
        "name": format!("huggingface_{}", short_name),
        "model_format": "TORCH_SCRIPT",
        "model_config": {
            "embedding_dimension": embedding_dimension,
            "framework_type": "SENTENCE_TRANSFORMERS",
            "model_type": "bert",
            "embedding_model": model_name
        },
        "description": format!("Hugging Face Transformers model: {}", model_name)
    })
}

/// `name` and `description` of a connector payload, with fallbacks.
pub fn model_name_and_description(payload: &Value, provider: Provider, role: ModelRole) -> (String, String) {
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", provider.display_name(), role));
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {} for retrieval augmented generation", provider.display_name(), role));
    (name, description)
}
