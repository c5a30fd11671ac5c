//! HTTP transport: `POST /classify` and `GET /health` on axum

use crate::classify::{ClassificationResult, Classifier};
use crate::config::ServerConfig;
use crate::error::Error;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection}, DefaultBodyLimit, Multipart,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the uploaded document
const FILE_FIELD: &str = "file";

#[derive(Clone)]
struct AppState {
    classifier: Classifier,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Handler error rendered as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    Classification(Error),
    Multipart(MultipartError),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Classification(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Classification(e) if e.is_client_error() => {
                tracing::warn!(error = %e, "Rejected upload");
                (StatusCode::BAD_REQUEST, e.client_message())
            }
            ApiError::Classification(e) => {
                tracing::error!(error = %e, "Classification failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.client_message())
            }
            ApiError::Multipart(e) => {
                tracing::warn!(error = %e, "Failed to read multipart body");
                (e.status(), e.body_text())
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn classify_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let mut multipart = multipart.map_err(|e| Error::InvalidUpload {
        reason: e.body_text(),
    })?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        tracing::debug!(
            filename = ?field.file_name(),
            content_type = ?content_type,
            "Received upload"
        );
        let data = field.bytes().await?;
        upload = Some((content_type, data));
        break;
    }

    let Some((content_type, data)) = upload else {
        return Err(Error::InvalidUpload {
            reason: "no file field".to_string(),
        }
        .into());
    };

    let classifier = state.classifier.clone();
    let result = tokio::task::spawn_blocking(move || {
        classifier.classify_upload(content_type.as_deref(), &data)
    })
    .await
    .map_err(Error::from)??;

    Ok(Json(result))
}

/// Build the HTTP router around a shared classifier
pub fn router(classifier: Classifier, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/classify",
            post(classify_document).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { classifier })
}

/// Serve HTTP until Ctrl+C or SIGTERM
pub async fn run_http(config: &ServerConfig, classifier: Classifier) -> anyhow::Result<()> {
    let app = router(classifier, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "Classifier listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
