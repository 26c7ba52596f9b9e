use super::config::ServerConfig;
use super::handlers::{
    add_pipeline_handler, health_handler, port_webhook_handler, remove_pipeline_handler,
};
use crate::pipeline::ServicePipelines;
use crate::utils::retry::RetryConfig;
use crate::webhook::{NotificationForwarder, WebhookConfig};
use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing::info;

/// Collaborators the handlers are served with.
#[derive(Clone)]
pub struct HttpServices {
    pub pipelines: Arc<dyn ServicePipelines>,
    pub forwarder: Arc<dyn NotificationForwarder>,
    pub retry: RetryConfig,
    pub webhook: WebhookConfig,
}

/// Registers every route along with the data its handlers extract.
pub(super) fn configure(services: HttpServices) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::from(services.pipelines))
            .app_data(web::Data::from(services.forwarder))
            .app_data(web::Data::new(services.retry))
            .app_data(web::Data::new(services.webhook))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health_handler))
                    .route("/webhook/port", web::post().to(port_webhook_handler))
                    .route("/otel/pipeline/add", web::post().to(add_pipeline_handler))
                    .route(
                        "/otel/pipeline/{service}",
                        web::delete().to(remove_pipeline_handler),
                    ),
            );
    }
}

/// Serves until the process is asked to stop. Must run inside an actix system.
pub async fn run_server(server_config: ServerConfig, services: HttpServices) -> std::io::Result<()> {
    info!(
        "starting HTTP server at http://{}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || App::new().configure(configure(services.clone())))
        .bind((server_config.host.to_string(), server_config.port.into()))?
        .workers(server_config.workers.into())
        .run()
        .await
}
