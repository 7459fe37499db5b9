//! Template reconciliation.
//!
//! Templates are keyed by a name derived from the model ID, so repeated runs
//! for the same model reuse one template.

use std::collections::HashMap;

use tracing::info;

use crate::config::TemplateSettings;
use crate::providers::{ControlPlane, CreateTemplateRequest, PodError};

/// Last `/`-separated segment of a model ID, ignoring trailing slashes.
#[must_use]
pub fn last_path_segment(model_id: &str) -> &str {
    let trimmed = model_id.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Canonical template name for a model.
#[must_use]
pub fn template_name(model_id: &str) -> String {
    format!("vLLM-{}", last_path_segment(model_id))
}

/// Container environment for a vLLM worker serving `model_id`.
#[must_use]
pub fn template_env(
    settings: &TemplateSettings,
    model_id: &str,
    hf_token: Option<&str>,
) -> HashMap<String, String> {
    let mut env = HashMap::from([
        ("MODEL_NAME".to_string(), model_id.to_string()),
        (
            "MAX_MODEL_LEN".to_string(),
            settings.max_model_len.to_string(),
        ),
        (
            "GPU_MEMORY_UTILIZATION".to_string(),
            settings.gpu_memory_utilization.to_string(),
        ),
        ("DTYPE".to_string(), settings.dtype.clone()),
    ]);
    if let Some(token) = hf_token.filter(|t| !t.is_empty()) {
        env.insert("HF_TOKEN".to_string(), token.to_string());
    }
    env
}

/// Return the ID of the serverless template for `model_id`, creating it if absent.
///
/// # Errors
/// Returns the control-plane error if listing or creating fails. There is no
/// fallback template.
pub async fn ensure_template(
    client: &dyn ControlPlane,
    settings: &TemplateSettings,
    model_id: &str,
    hf_token: Option<&str>,
) -> Result<String, PodError> {
    let name = template_name(model_id);

    let templates = client.list_templates().await?;
    if let Some(existing) = templates
        .iter()
        .find(|t| t.name == name && t.is_serverless)
    {
        info!(template_id = %existing.id, name = %name, "Reusing template");
        return Ok(existing.id.clone());
    }

    let id = client
        .create_template(CreateTemplateRequest {
            name: name.clone(),
            image_name: settings.image_name.clone(),
            container_disk_gb: settings.container_disk_gb,
            env: template_env(settings, model_id, hf_token),
        })
        .await?;

    info!(template_id = %id, name = %name, "Template ready");
    Ok(id)
}
