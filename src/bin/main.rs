//! Entry point of the pipeline automation service.
//!
//! Loads the configuration, builds the cluster client and the pipeline engine for the configured
//! store and serves the HTTP surface until the process is stopped.
use clap::Parser;
use otel_pipeline_automation::config::{AutomationConfig, StoreConfig};
use otel_pipeline_automation::fragment::generator::FragmentGenerator;
use otel_pipeline_automation::http_server::{HttpServices, run_server};
use otel_pipeline_automation::k8s::client::SyncK8sClient;
use otel_pipeline_automation::pipeline::backend::{CollectorResourceBackend, ConfigMapBackend};
use otel_pipeline_automation::pipeline::reload::ReloadTrigger;
use otel_pipeline_automation::pipeline::{PipelineManager, ServicePipelines};
use otel_pipeline_automation::webhook::HttpForwarder;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Command line arguments, as parsed by [`clap`].
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
struct Command {
    /// YAML configuration file. Environment variables prefixed with `OTEL_AUTOMATION_` take
    /// precedence over it.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let flags = Command::parse();

    let Ok(config) = AutomationConfig::load(flags.config.as_deref()).inspect_err(|err| {
        // Using print because the tracer is not initialized yet
        println!("Error on initialization: {err}");
    }) else {
        return ExitCode::FAILURE;
    };

    if let Err(err) = config.log.try_init() {
        println!("Error on initialization: {err}");
        return ExitCode::FAILURE;
    }

    match _main(config) {
        Ok(()) => {
            info!("exiting gracefully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("the service exited with an error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Separated from [main] so errors are propagated and logged once, in string format.
fn _main(config: AutomationConfig) -> Result<(), Box<dyn Error>> {
    install_rustls_default_crypto_provider();

    debug!("starting the tokio runtime for the k8s client");
    // Also held here until the server stops, so it is never dropped from an async context.
    let runtime = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?,
    );
    let k8s_client = Arc::new(SyncK8sClient::try_new(runtime.clone(), &config.k8s)?);

    let generator = FragmentGenerator::new(config.fragment);
    let reload = ReloadTrigger::new(k8s_client.clone());
    let pipelines: Arc<dyn ServicePipelines> = match config.store {
        StoreConfig::ConfigMap {
            name,
            namespace,
            key,
        } => Arc::new(PipelineManager::new(
            ConfigMapBackend::new(k8s_client, name, namespace, key),
            generator,
            config.target_pipelines,
            reload,
            config.workload,
        )),
        StoreConfig::CollectorResource { name, namespace } => Arc::new(PipelineManager::new(
            CollectorResourceBackend::new(k8s_client, name, namespace),
            generator,
            config.target_pipelines,
            reload,
            config.workload,
        )),
    };

    let services = HttpServices {
        pipelines,
        forwarder: Arc::new(HttpForwarder::try_new(&config.webhook)?),
        retry: config.retry,
        webhook: config.webhook,
    };

    actix_web::rt::System::new().block_on(run_server(config.server, services))?;

    drop(runtime);
    Ok(())
}

fn install_rustls_default_crypto_provider() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| {
            warn!("rustls default crypto provider was already installed for this process, this has no effect")
        })
}
