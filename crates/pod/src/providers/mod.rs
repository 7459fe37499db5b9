//! Control-plane implementations.
//!
//! This module contains the [`ControlPlane`] trait and implementations
//! for serverless GPU providers.

pub mod runpod;
pub mod traits;

pub use traits::{
    ControlPlane, CreateEndpointRequest, CreateTemplateRequest, Endpoint, EndpointSummary,
    PodError, Template, Worker, WorkerState,
};
