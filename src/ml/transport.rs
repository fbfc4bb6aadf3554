//! JSON request/response transport to the cluster.

use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Error type for cluster requests.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} failed with status {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid cluster endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Response from {path} is not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response from {path} has no '{field}' field: {response}")]
    MissingField {
        path: String,
        field: &'static str,
        response: Value,
    },
}

impl TransportError {
    /// Response body of a non-success status, if any.
    pub fn status_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// HTTP method of a cluster request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues one JSON request and returns the decoded JSON response.
///
/// Non-success statuses are errors. An empty body decodes to `Value::Null`.
pub trait Transport {
    fn perform_request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn perform_request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        (**self).perform_request(method, path, body)
    }
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_certs: bool,
    pub request_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            verify_certs: true,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Set basic-auth credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_verify_certs(mut self, verify: bool) -> Self {
        self.verify_certs = verify;
        self
    }
}

/// Blocking HTTP transport with optional basic auth.
pub struct HttpTransport {
    client: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let base = parse_endpoint(&config.endpoint)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()?;

        debug!(endpoint = %base, verify_certs = config.verify_certs, "HTTP transport ready");

        Ok(Self {
            client,
            base,
            username: config.username,
            password: config.password,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|_| TransportError::InvalidEndpoint(format!("{}{}", self.base, path)))
    }
}

impl Transport for HttpTransport {
    fn perform_request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url_for(path)?;
        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, path, "Sending cluster request");
        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        trace!(%method, path, status = status.as_u16(), body = %text, "Cluster response");

        if !status.is_success() {
            return Err(TransportError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        decode_body(path, &text)
    }
}

fn decode_body(path: &str, text: &str) -> Result<Value, TransportError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|source| TransportError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Parse a cluster endpoint, defaulting to https and ensuring a trailing slash
/// so relative joins keep any path prefix.
fn parse_endpoint(raw: &str) -> Result<Url, TransportError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TransportError::InvalidEndpoint(raw.to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let normalized = format!("{}/", with_scheme.trim_end_matches('/'));

    Url::parse(&normalized).map_err(|_| TransportError::InvalidEndpoint(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve one canned HTTP response on a local port and hand back the raw request.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).unwrap();
            request.push_str(&String::from_utf8(payload).unwrap());

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });

        (endpoint, handle)
    }

    #[test]
    fn test_parse_endpoint_adds_scheme() {
        let url = parse_endpoint("search.example.com:9200").unwrap();
        assert_eq!(url.as_str(), "https://search.example.com:9200/");
    }

    #[test]
    fn test_parse_endpoint_keeps_path_prefix() {
        let url = parse_endpoint("http://localhost:9200/proxy/").unwrap();
        let joined = url.join("_plugins/_ml/tasks/abc").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9200/proxy/_plugins/_ml/tasks/abc");
    }

    #[test]
    fn test_parse_endpoint_rejects_blank() {
        assert!(matches!(
            parse_endpoint("  "),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_url_for_strips_leading_slash() {
        let transport = HttpTransport::new(HttpTransportConfig::new("http://localhost:9200")).unwrap();
        let url = transport.url_for("/_plugins/_ml/connectors/_create").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/_plugins/_ml/connectors/_create");
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("/x", "").unwrap(), Value::Null);
        assert_eq!(decode_body("/x", r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(matches!(decode_body("/x", "<html>"), Err(TransportError::Decode { .. })));
    }

    #[test]
    fn test_status_error_message() {
        let err = TransportError::Status {
            method: Method::Post,
            path: "/_plugins/_ml/models/_register".into(),
            status: 400,
            body: "bad".into(),
        };
        assert_eq!(
            err.to_string(),
            "POST /_plugins/_ml/models/_register failed with status 400: bad"
        );
        assert_eq!(err.status_body(), Some("bad"));
    }

    #[test]
    fn test_non_success_status_is_an_error() {
        let (endpoint, server) = serve_once("HTTP/1.1 400 Bad Request", r#"{"error":"bad connector"}"#);
        let mut transport = HttpTransport::new(HttpTransportConfig::new(endpoint)).unwrap();

        let err = transport
            .perform_request(Method::Post, "/_plugins/_ml/connectors/_create", Some(&json!({"name": "c"})))
            .unwrap_err();

        match err {
            TransportError::Status {
                method, status, body, ..
            } => {
                assert_eq!(method, Method::Post);
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"error":"bad connector"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /_plugins/_ml/connectors/_create "));
        assert!(request.ends_with(r#"{"name":"c"}"#));
    }

    #[test]
    fn test_empty_success_body_is_null() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", "");
        let mut transport = HttpTransport::new(HttpTransportConfig::new(endpoint)).unwrap();

        let response = transport
            .perform_request(Method::Post, "/_plugins/_ml/models/m-1/_deploy", None)
            .unwrap();

        assert_eq!(response, Value::Null);
        server.join().unwrap();
    }

    #[test]
    fn test_basic_auth_header_sent() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", r#"{"state":"RUNNING"}"#);
        let config = HttpTransportConfig::new(endpoint).with_basic_auth("admin", "admin");
        let mut transport = HttpTransport::new(config).unwrap();

        let response = transport
            .perform_request(Method::Get, "/_plugins/_ml/tasks/t-1", None)
            .unwrap();

        assert_eq!(response, json!({"state": "RUNNING"}));
        let request = server.join().unwrap().to_ascii_lowercase();
        // base64("admin:admin")
        assert!(request.contains("authorization: basic ywrtaw46ywrtaw4="));
    }

    #[test]
    fn test_no_auth_header_without_credentials() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", "{}");
        let mut transport = HttpTransport::new(HttpTransportConfig::new(endpoint)).unwrap();

        transport
            .perform_request(Method::Get, "/_plugins/_ml/tasks/t-1", None)
            .unwrap();

        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(!request.contains("authorization:"));
    }
}
