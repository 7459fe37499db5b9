//! Control-plane trait and common types.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during pod lifecycle operations.
#[derive(Error, Debug)]
pub enum PodError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request exceeded the per-request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local state is inconsistent with the requested operation.
    #[error("Invalid state: {0}")]
    State(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PodError {
    /// Whether the remote side was never reached (network, DNS, timeout).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout(_))
    }

    /// Whether the remote side answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Lifecycle state of a worker backing an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Pulling the image or loading weights.
    Initializing,
    /// Warm and waiting for requests.
    Idle,
    /// Serving a request.
    Running,
    /// Any state this crate does not act on.
    Other(String),
}

impl WorkerState {
    /// Parse a provider state string, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "INITIALIZING" => Self::Initializing,
            "IDLE" => Self::Idle,
            "RUNNING" => Self::Running,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// A ready worker has the inference stack loaded and can serve.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Idle | Self::Running)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Other(raw) => write!(f, "{}", raw.to_lowercase()),
        }
    }
}

/// A worker observed while polling an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Worker ID.
    pub id: String,
    /// Current state.
    pub state: WorkerState,
}

/// Endpoint as returned by the listing query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    /// Endpoint ID.
    pub id: String,
    /// Endpoint name.
    pub name: String,
    /// Template the endpoint was created from.
    pub template_id: String,
}

/// A serverless endpoint with its worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint ID.
    pub id: String,
    /// Endpoint name.
    pub name: String,
    /// Template ID.
    pub template_id: String,
    /// GPU pool IDs, in preference order.
    pub gpu_type_ids: Vec<String>,
    /// Minimum number of workers.
    pub workers_min: u32,
    /// Maximum number of workers.
    pub workers_max: u32,
    /// Seconds an idle worker is kept warm.
    pub idle_timeout_secs: u32,
    /// Environment overrides.
    pub env: HashMap<String, String>,
    /// Workers currently backing the endpoint.
    pub workers: Vec<Worker>,
}

impl Endpoint {
    /// First worker that is ready to serve, if any.
    #[must_use]
    pub fn ready_worker(&self) -> Option<&Worker> {
        self.workers.iter().find(|w| w.state.is_ready())
    }

    /// Whether any worker is still starting up.
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.state == WorkerState::Initializing)
    }
}

/// A provisioning template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template ID.
    pub id: String,
    /// Template name.
    pub name: String,
    /// Container image.
    pub image_name: String,
    /// Whether the template can back a serverless endpoint.
    pub is_serverless: bool,
    /// Container environment.
    pub env: HashMap<String, String>,
}

/// Request to create a new endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEndpointRequest {
    /// Endpoint name.
    pub name: String,
    /// Template ID.
    pub template_id: String,
    /// GPU pool IDs.
    pub gpu_type_ids: Vec<String>,
    /// Minimum number of workers.
    pub workers_min: u32,
    /// Maximum number of workers.
    pub workers_max: u32,
    /// Idle timeout in seconds.
    pub idle_timeout_secs: u32,
}

/// Request to create a new template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    /// Template name.
    pub name: String,
    /// Container image.
    pub image_name: String,
    /// Container disk in GB.
    pub container_disk_gb: u32,
    /// Container environment.
    pub env: HashMap<String, String>,
}

/// Management API of a serverless GPU provider.
///
/// Implementations make exactly one remote call per method and never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List all endpoints visible to the credentials.
    async fn list_endpoints(&self) -> Result<Vec<EndpointSummary>, PodError>;

    /// Create an endpoint and return its ID.
    async fn create_endpoint(&self, req: CreateEndpointRequest) -> Result<String, PodError>;

    /// Get an endpoint together with its workers.
    async fn get_endpoint(&self, id: &str) -> Result<Endpoint, PodError>;

    /// Delete an endpoint. Deleting an unknown ID succeeds.
    async fn delete_endpoint(&self, id: &str) -> Result<(), PodError>;

    /// List all templates.
    async fn list_templates(&self) -> Result<Vec<Template>, PodError>;

    /// Create a serverless template and return its ID.
    async fn create_template(&self, req: CreateTemplateRequest) -> Result<String, PodError>;
}
