//! RunPod management API models.
//!
//! Endpoint listing goes through the GraphQL API; everything else uses the
//! REST API, which speaks camelCase JSON.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// GraphQL types
// ============================================================================

/// Query listing every endpoint owned by the caller.
pub const LIST_ENDPOINTS_QUERY: &str =
    "query Endpoints { myself { endpoints { id name templateId } } }";

/// GraphQL request body.
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    /// Query document.
    pub query: &'a str,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    /// Response data, absent when the query failed.
    pub data: Option<T>,
    /// Query errors.
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// A single GraphQL error.
#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    /// Error message.
    pub message: String,
}

/// `data` of the endpoints query.
#[derive(Debug, Deserialize)]
pub struct MyselfData {
    /// The authenticated user, absent for an unknown key.
    pub myself: Option<Myself>,
}

/// Authenticated user.
#[derive(Debug, Deserialize)]
pub struct Myself {
    /// Endpoints owned by the user.
    #[serde(default)]
    pub endpoints: Vec<GraphQlEndpoint>,
}

/// Endpoint as returned by GraphQL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlEndpoint {
    /// Endpoint ID.
    pub id: String,
    /// Endpoint name.
    pub name: String,
    /// Template ID.
    #[serde(default)]
    pub template_id: Option<String>,
}

// ============================================================================
// Endpoint types
// ============================================================================

/// Endpoint resource from the REST API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResource {
    /// Endpoint ID.
    pub id: String,
    /// Endpoint name.
    #[serde(default)]
    pub name: String,
    /// Template ID.
    #[serde(default)]
    pub template_id: Option<String>,
    /// GPU pool IDs.
    #[serde(default)]
    pub gpu_type_ids: Vec<String>,
    /// Minimum workers.
    #[serde(default)]
    pub workers_min: u32,
    /// Maximum workers.
    #[serde(default)]
    pub workers_max: u32,
    /// Idle timeout in seconds.
    #[serde(default)]
    pub idle_timeout: u32,
    /// Environment overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Workers (requires `includeWorkers=true`).
    #[serde(default)]
    pub workers: Vec<WorkerResource>,
}

/// Worker resource.
#[derive(Debug, Deserialize)]
pub struct WorkerResource {
    /// Worker ID.
    pub id: String,
    /// Worker state (`INITIALIZING`, `IDLE`, `RUNNING`, ...).
    #[serde(alias = "status", default)]
    pub state: String,
}

/// Request body for creating an endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEndpointBody {
    /// Endpoint name.
    pub name: String,
    /// Template ID.
    pub template_id: String,
    /// GPU pool IDs.
    pub gpu_type_ids: Vec<String>,
    /// Minimum workers.
    pub workers_min: u32,
    /// Maximum workers.
    pub workers_max: u32,
    /// Idle timeout in seconds.
    pub idle_timeout: u32,
}

// ============================================================================
// Template types
// ============================================================================

/// Template resource from the REST API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResource {
    /// Template ID.
    pub id: String,
    /// Template name.
    pub name: String,
    /// Container image.
    #[serde(default)]
    pub image_name: String,
    /// Serverless capable.
    #[serde(default)]
    pub is_serverless: bool,
    /// Container environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Request body for creating a template.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateBody {
    /// Template name.
    pub name: String,
    /// Container image.
    pub image_name: String,
    /// Always `true`; endpoints can only use serverless templates.
    pub is_serverless: bool,
    /// Container disk in GB.
    pub container_disk_in_gb: u32,
    /// Container environment.
    pub env: HashMap<String, String>,
}

/// Minimal body returned by create calls.
#[derive(Debug, Deserialize)]
pub struct CreatedResource {
    /// ID of the new resource.
    pub id: String,
}
