use super::SERVICE_NAME;
use crate::document::DocumentError;
use crate::fragment::{FragmentNames, OnboardingRequest};
use crate::mutator::MutationError;
use crate::pipeline::{PipelineError, ServicePipelines};
use crate::utils::retry::{RetryConfig, retry};
use crate::webhook::{NotificationForwarder, WebhookConfig, WebhookEnvelope};
use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes, Data, Json, Path};
use actix_web::{HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
struct AddResponse {
    status: &'static str,
    message: String,
    service: String,
    namespace: String,
    receiver: String,
    inserted: Vec<String>,
    wired: Option<String>,
}

#[derive(Debug, Serialize)]
struct RemoveResponse {
    status: &'static str,
    message: String,
    service: String,
    removed: Vec<String>,
    unwired: Vec<String>,
}

pub(super) async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub(super) async fn port_webhook_handler(
    body: Bytes,
    forwarder: Data<dyn NotificationForwarder>,
    config: Data<WebhookConfig>,
) -> HttpResponse {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("rejecting webhook: {err}");
            return error_body(StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let notification = match envelope.into_notification(&config.blueprint, Utc::now()) {
        Ok(notification) => notification,
        Err(err) => {
            warn!("rejecting webhook: {err}");
            return error_body(StatusCode::BAD_REQUEST, "Invalid blueprint");
        }
    };

    match forwarder.forward(&notification).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "success",
            "requestId": notification.request_id,
            "message": "Request forwarded for processing",
        })),
        Err(err) => {
            error!(request_id = %notification.request_id, "forwarding notification: {err}");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to forward notification",
                "details": err.to_string(),
            }))
        }
    }
}

pub(super) async fn add_pipeline_handler(
    request: Json<OnboardingRequest>,
    pipelines: Data<dyn ServicePipelines>,
    retry_config: Data<RetryConfig>,
) -> HttpResponse {
    let request = request.into_inner();
    let engine_request = request.clone();
    let result = web::block(move || {
        retry(&retry_config, PipelineError::is_retryable, || {
            pipelines.add_service_pipeline(&engine_request)
        })
    })
    .await;

    match result {
        Ok(Ok(outcome)) => HttpResponse::Ok().json(AddResponse {
            status: "success",
            message: format!("Pipeline added for service {}", request.service_name),
            receiver: FragmentNames::for_service(&request.service_name).receiver,
            service: request.service_name,
            namespace: request.namespace,
            inserted: outcome.inserted,
            wired: outcome.wired,
        }),
        Ok(Err(err)) => pipeline_error_response(&err),
        Err(err) => {
            error!("running add pipeline: {err}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

pub(super) async fn remove_pipeline_handler(
    service: Path<String>,
    pipelines: Data<dyn ServicePipelines>,
    retry_config: Data<RetryConfig>,
) -> HttpResponse {
    let service = service.into_inner();
    let engine_service = service.clone();
    let result = web::block(move || {
        retry(&retry_config, PipelineError::is_retryable, || {
            pipelines.remove_service_pipeline(&engine_service)
        })
    })
    .await;

    match result {
        Ok(Ok(outcome)) => HttpResponse::Ok().json(RemoveResponse {
            status: "success",
            message: format!("Pipeline removed for service {service}"),
            service,
            removed: outcome.removed,
            unwired: outcome.unwired,
        }),
        Ok(Err(err)) => pipeline_error_response(&err),
        Err(err) => {
            error!("running remove pipeline: {err}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn status_of(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PipelineError::Mutation(MutationError::DuplicateFragment(_))
        | PipelineError::ConflictRetryable(_) => StatusCode::CONFLICT,
        PipelineError::Mutation(MutationError::Document(DocumentError::Render { .. }))
        | PipelineError::Document(DocumentError::Render { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        PipelineError::Mutation(_) | PipelineError::Document(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::StoreUnavailable(_) | PipelineError::Reload(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn pipeline_error_response(err: &PipelineError) -> HttpResponse {
    let status = status_of(err);
    if status.is_server_error() {
        error!("pipeline operation failed: {err}");
    } else {
        debug!("pipeline operation rejected: {err}");
    }
    error_body(status, &err.to_string())
}

fn error_body(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "error": message }))
}
