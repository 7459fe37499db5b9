//! RunPod serverless provider.
//!
//! Implements the [`ControlPlane`](crate::providers::traits::ControlPlane)
//! trait for RunPod serverless endpoints.
//!
//! ## Example
//!
//! ```ignore
//! use pod::providers::runpod::RunPod;
//! use pod::providers::traits::ControlPlane;
//!
//! let runpod = RunPod::new(api_key)?;
//!
//! for endpoint in runpod.list_endpoints().await? {
//!     println!("{} {}", endpoint.id, endpoint.name);
//! }
//! ```

mod client;
mod models;

pub use client::{RunPod, GRAPHQL_URL, REST_BASE_URL};
pub use models::*;
