//! Onboards services into a shared OpenTelemetry Collector log pipeline.
//!
//! Every service gets its own fragment (a `filelog` receiver plus labeling processors) merged into
//! the collector configuration stored in the cluster, wired into the target pipeline and removed
//! again on offboarding, leaving everything else in the document untouched.
pub mod config;
pub mod document;
pub mod fragment;
pub mod http_server;
pub mod k8s;
pub mod logging;
pub mod mutator;
pub mod pipeline;
pub mod utils;
pub mod webhook;
