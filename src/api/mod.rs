// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ApiError, state::AppState};

pub mod context;
pub mod health;
pub mod pages;
pub mod pin;
pub mod uploads;

#[cfg(test)]
mod tests;

/// Run filesystem or KDF work off the async executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!(error = %e, "Blocking task failed");
        ApiError::internal("Internal error")
    })
}

pub fn router(state: AppState) -> Router {
    let site_routes = Router::new()
        .route("/", get(uploads::home).post(uploads::upload))
        .route("/api/uploader-folder", get(uploads::uploader_folder))
        .route("/api/uploader-has-folder", get(uploads::uploader_has_folder))
        .route("/uploads", get(uploads::list_folders))
        .route("/uploads/{folder}", get(uploads::list_files))
        .route("/uploads/{folder}/delete-folder", post(uploads::delete_folder))
        .route("/uploads/{folder}/set-pin", post(pin::set_pin))
        .route("/uploads/{folder}/pin-status", get(pin::pin_status))
        .route("/uploads/{folder}/pin", get(pin::pin_entry).post(pin::submit_pin))
        .route("/uploads/{folder}/{file}", get(uploads::download))
        .route("/uploads/{folder}/{file}/delete", post(uploads::delete_file))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            context::session_layer,
        ))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness));

    Router::new()
        .merge(site_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        uploads::uploader_folder,
        uploads::uploader_has_folder,
        pin::set_pin,
        pin::pin_status,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            uploads::UploaderFolderResponse,
            uploads::UploaderHasFolderResponse,
            pin::SetPinRequest,
            pin::SetPinResponse,
            pin::PinStatusResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Uploads", description = "Caller folder information"),
        (name = "PIN", description = "Folder PIN management"),
        (name = "Health", description = "Service probes")
    )
)]
struct ApiDoc;
