//! Serverless GPU endpoint lifecycle for model serving.
//!
//! This crate manages one billable inference endpoint on behalf of a client
//! tool: find or provision it, wait until a worker is warm, estimate what it
//! has cost so far, and tear it down.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     LifecycleManager                         │
//! │          up ─── wait ─── cost ─── down                       │
//! ├──────────────┬───────────────┬──────────────┬────────────────┤
//! │  tier        │  template     │  session     │  ReuseDecider  │
//! │  model → GPU │  ensure vLLM  │  JSON ledger │  prompt/flags  │
//! └──────┬───────┴───────┬───────┴──────────────┴────────────────┘
//!        │               │
//!        ▼               ▼
//! ┌──────────────────────────────────┐
//! │  ControlPlane (RunPod REST/GQL)  │
//! └──────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pod::{LifecycleManager, PodConfig, SessionLedger};
//! use pod::providers::runpod::RunPod;
//!
//! let config = PodConfig::new("Qwen/Qwen3-Coder-Next");
//! let client = Arc::new(RunPod::new(api_key)?);
//! let manager = LifecycleManager::new(client, decider, SessionLedger::new(".pod-session.json"), config);
//!
//! let outcome = manager.up().await?;
//! if let Some(id) = outcome.endpoint_id() {
//!     manager.wait(id, &cancel).await;
//!     println!("{}", manager.cost()?);
//!     manager.down(id).await?;
//! }
//! ```

pub mod config;
pub mod lifecycle;
pub mod providers;
pub mod session;
pub mod template;
pub mod tier;

pub use config::{PodConfig, TemplateSettings, DEFAULT_ENDPOINT_NAME};
pub use lifecycle::{
    DownReport, LifecycleManager, LifecycleState, ReuseChoice, ReuseDecider, UpOutcome,
    WaitOutcome,
};
pub use providers::runpod;
pub use providers::traits::{
    ControlPlane, CreateEndpointRequest, CreateTemplateRequest, Endpoint, EndpointSummary,
    PodError, Template, Worker, WorkerState,
};
pub use session::{CostReport, SessionLedger, SessionRecord};
pub use tier::{select_tier, GpuTier};
