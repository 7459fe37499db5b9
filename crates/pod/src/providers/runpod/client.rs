//! RunPod management API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::models::{
    CreateEndpointBody, CreateTemplateBody, CreatedResource, EndpointResource, GraphQlRequest,
    GraphQlResponse, MyselfData, TemplateResource, WorkerResource, LIST_ENDPOINTS_QUERY,
};
use crate::providers::traits::{
    ControlPlane, CreateEndpointRequest, CreateTemplateRequest, Endpoint, EndpointSummary,
    PodError, Template, Worker, WorkerState,
};

/// Base URL for the RunPod REST API.
pub const REST_BASE_URL: &str = "https://rest.runpod.io/v1";

/// URL of the RunPod GraphQL API.
pub const GRAPHQL_URL: &str = "https://api.runpod.io/graphql";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// RunPod serverless control plane.
#[derive(Clone)]
pub struct RunPod {
    /// HTTP client.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// REST API base URL.
    rest_base: String,
    /// GraphQL API URL.
    graphql_url: String,
    /// Per-request timeout, kept for error reporting.
    timeout: Duration,
}

impl RunPod {
    /// Create a new RunPod client against the public API.
    ///
    /// # Errors
    /// Returns error if the API key is empty or the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self, PodError> {
        Self::with_urls(
            api_key,
            REST_BASE_URL,
            GRAPHQL_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a client against custom API locations.
    ///
    /// # Arguments
    /// * `api_key` - RunPod API key
    /// * `rest_base` - REST API base URL, without trailing slash
    /// * `graphql_url` - GraphQL API URL
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    /// Returns error if the API key is empty or the HTTP client cannot be created.
    pub fn with_urls(
        api_key: impl Into<String>,
        rest_base: impl Into<String>,
        graphql_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PodError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PodError::Config("RunPod API key is required".to_string()));
        }

        let rest_base: String = rest_base.into();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            rest_base: rest_base.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.into(),
            timeout,
        })
    }

    /// Map a send failure to a transport error.
    fn transport(&self, err: reqwest::Error) -> PodError {
        if err.is_timeout() {
            PodError::Timeout(self.timeout.as_secs())
        } else {
            PodError::Http(err)
        }
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PodError> {
        let url = format!("{}{path}", self.rest_base);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        self.handle_response(response).await
    }

    /// Make an authenticated POST request.
    async fn post<T, B>(&self, url: &str, body: &B) -> Result<T, PodError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        self.handle_response(response).await
    }

    /// Make an authenticated DELETE request. A missing resource counts as deleted.
    async fn delete(&self, path: &str) -> Result<(), PodError> {
        let url = format!("{}{path}", self.rest_base);
        debug!(url = %url, "DELETE request");

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            warn!(url = %url, "Resource already gone");
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(PodError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PodError> {
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport(e))?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                PodError::Serialization(e)
            })
        } else {
            Err(PodError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    fn to_worker(resource: &WorkerResource) -> Worker {
        Worker {
            id: resource.id.clone(),
            state: WorkerState::parse(&resource.state),
        }
    }

    fn to_endpoint(resource: EndpointResource) -> Endpoint {
        Endpoint {
            workers: resource.workers.iter().map(Self::to_worker).collect(),
            id: resource.id,
            name: resource.name,
            template_id: resource.template_id.unwrap_or_default(),
            gpu_type_ids: resource.gpu_type_ids,
            workers_min: resource.workers_min,
            workers_max: resource.workers_max,
            idle_timeout_secs: resource.idle_timeout,
            env: resource.env,
        }
    }

    fn to_template(resource: TemplateResource) -> Template {
        Template {
            id: resource.id,
            name: resource.name,
            image_name: resource.image_name,
            is_serverless: resource.is_serverless,
            env: resource.env,
        }
    }
}

#[async_trait]
impl ControlPlane for RunPod {
    async fn list_endpoints(&self) -> Result<Vec<EndpointSummary>, PodError> {
        let body = GraphQlRequest {
            query: LIST_ENDPOINTS_QUERY,
        };
        let response: GraphQlResponse<MyselfData> = self.post(&self.graphql_url, &body).await?;

        if !response.errors.is_empty() {
            let message = response
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PodError::Api {
                status: StatusCode::OK.as_u16(),
                message,
            });
        }

        // A null payload is an error, not an account with no endpoints.
        let Some(myself) = response.data.and_then(|d| d.myself) else {
            return Err(PodError::Api {
                status: StatusCode::OK.as_u16(),
                message: "endpoint listing returned no data".to_string(),
            });
        };

        Ok(myself
            .endpoints
            .into_iter()
            .map(|e| EndpointSummary {
                id: e.id,
                name: e.name,
                template_id: e.template_id.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_endpoint(&self, req: CreateEndpointRequest) -> Result<String, PodError> {
        info!(
            name = %req.name,
            template_id = %req.template_id,
            gpus = ?req.gpu_type_ids,
            "Creating endpoint"
        );

        let body = CreateEndpointBody {
            name: req.name,
            template_id: req.template_id,
            gpu_type_ids: req.gpu_type_ids,
            workers_min: req.workers_min,
            workers_max: req.workers_max,
            idle_timeout: req.idle_timeout_secs,
        };

        let url = format!("{}/endpoints", self.rest_base);
        let created: CreatedResource = self.post(&url, &body).await?;

        info!(endpoint_id = %created.id, "Endpoint created");
        Ok(created.id)
    }

    async fn get_endpoint(&self, id: &str) -> Result<Endpoint, PodError> {
        let resource: EndpointResource = self
            .get(&format!("/endpoints/{id}?includeWorkers=true"))
            .await?;
        Ok(Self::to_endpoint(resource))
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), PodError> {
        info!(endpoint_id = %id, "Deleting endpoint");
        self.delete(&format!("/endpoints/{id}")).await?;
        info!(endpoint_id = %id, "Endpoint deleted");
        Ok(())
    }

    async fn list_templates(&self) -> Result<Vec<Template>, PodError> {
        let resources: Vec<TemplateResource> = self.get("/templates").await?;
        Ok(resources.into_iter().map(Self::to_template).collect())
    }

    async fn create_template(&self, req: CreateTemplateRequest) -> Result<String, PodError> {
        info!(name = %req.name, image = %req.image_name, "Creating template");

        let body = CreateTemplateBody {
            name: req.name,
            image_name: req.image_name,
            is_serverless: true,
            container_disk_in_gb: req.container_disk_gb,
            env: req.env,
        };

        let url = format!("{}/templates", self.rest_base);
        let created: CreatedResource = self.post(&url, &body).await?;

        info!(template_id = %created.id, "Template created");
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let err = RunPod::new("  ").err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Invalid configuration: RunPod API key is required")
        );
    }

    #[test]
    fn test_to_endpoint_maps_workers() {
        let resource: EndpointResource = serde_json::from_str(
            r#"{
                "id": "ep-1",
                "name": "Claude-Code-Qwen3",
                "templateId": "tpl-1",
                "gpuTypeIds": ["AMPERE_80"],
                "workersMin": 0,
                "workersMax": 1,
                "idleTimeout": 120,
                "workers": [
                    {"id": "w-1", "state": "INITIALIZING"},
                    {"id": "w-2", "status": "IDLE"}
                ]
            }"#,
        )
        .unwrap();

        let endpoint = RunPod::to_endpoint(resource);
        assert_eq!(endpoint.template_id, "tpl-1");
        assert_eq!(endpoint.idle_timeout_secs, 120);
        assert!(endpoint.env.is_empty());
        assert_eq!(endpoint.workers[0].state, WorkerState::Initializing);
        assert_eq!(endpoint.ready_worker().map(|w| w.id.as_str()), Some("w-2"));
    }
}
