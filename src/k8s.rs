//! Kubernetes access: the [client::SyncK8sClient] used by the engine, its async implementation
//! and the type metadata of the objects it deals with.
pub mod client;
pub mod error;
pub mod resources;
