//! HTTP surface of the service.
//!
//! Exposes the onboarding webhook, the control endpoints driving the pipeline engine and a health
//! probe. Engine calls are blocking, they run on the actix blocking pool.
pub mod config;
mod handlers;
pub mod server;

pub use server::{HttpServices, run_server};

pub(crate) const SERVICE_NAME: &str = "otel-pipeline-automation";
