//! Lifecycle configuration.
//!
//! Everything the lifecycle manager needs is passed in through [`PodConfig`];
//! nothing here reads the process environment.

use std::time::Duration;

use crate::providers::PodError;

/// Endpoint name reserved for endpoints managed by this tool.
pub const DEFAULT_ENDPOINT_NAME: &str = "Claude-Code-Qwen3";

/// Serving defaults baked into newly created templates.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSettings {
    /// vLLM worker image.
    pub image_name: String,
    /// Container disk in GB.
    pub container_disk_gb: u32,
    /// Maximum context length.
    pub max_model_len: u32,
    /// Fraction of GPU memory vLLM may claim.
    pub gpu_memory_utilization: f64,
    /// Weight precision.
    pub dtype: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            image_name: "runpod/worker-v1-vllm:v2.7.0stable-cuda12.1.0".to_string(),
            container_disk_gb: 50,
            max_model_len: 32_768,
            gpu_memory_utilization: 0.95,
            dtype: "bfloat16".to_string(),
        }
    }
}

/// Configuration for one lifecycle manager.
#[derive(Debug, Clone, PartialEq)]
pub struct PodConfig {
    /// Hugging Face model ID to serve.
    pub model_id: String,
    /// Hugging Face token for gated models.
    pub hf_token: Option<String>,
    /// Reserved endpoint name.
    pub endpoint_name: String,
    /// Use this template instead of reconciling one.
    pub template_id: Option<String>,
    /// Minimum workers; zero lets the endpoint scale to nothing when idle.
    pub workers_min: u32,
    /// Maximum workers.
    pub workers_max: u32,
    /// Seconds a warm worker is kept without traffic.
    pub idle_timeout_secs: u32,
    /// Delay between readiness polls.
    pub poll_interval: Duration,
    /// Delay before retrying a failed readiness poll.
    pub retry_interval: Duration,
    /// Timeout of a single API request.
    pub request_timeout: Duration,
    /// Template defaults.
    pub template: TemplateSettings,
}

impl PodConfig {
    /// Create a configuration for `model_id` with default settings.
    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            hf_token: None,
            endpoint_name: DEFAULT_ENDPOINT_NAME.to_string(),
            template_id: None,
            workers_min: 0,
            workers_max: 1,
            idle_timeout_secs: 120,
            poll_interval: Duration::from_secs(20),
            retry_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            template: TemplateSettings::default(),
        }
    }

    /// Check the values a provisioning call depends on.
    ///
    /// # Errors
    /// Returns [`PodError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), PodError> {
        if self.model_id.trim().is_empty() {
            return Err(PodError::Config("model ID is required".to_string()));
        }
        if self.endpoint_name.trim().is_empty() {
            return Err(PodError::Config("endpoint name is required".to_string()));
        }
        if self.workers_max == 0 {
            return Err(PodError::Config("workers_max must be at least 1".to_string()));
        }
        if self.workers_min > self.workers_max {
            return Err(PodError::Config(format!(
                "workers_min ({}) exceeds workers_max ({})",
                self.workers_min, self.workers_max
            )));
        }
        if self.idle_timeout_secs == 0 {
            return Err(PodError::Config(
                "idle timeout must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(PodError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
