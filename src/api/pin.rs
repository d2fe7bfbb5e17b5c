// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Folder PIN endpoints: the owner's JSON set/remove API and the browser
//! PIN entry page that applies the lockout policy.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::context::{BrowserSession, ClientIp};
use super::pages::{
    error_page, folder_deleted_page, folder_not_found_page, folder_url, pin_entry_page, safe_next,
    PinPrompt,
};
use super::blocking;
use crate::error::ApiError;
use crate::pins::{PinAttempt, PinError};
use crate::state::AppState;
use crate::storage::{Folder, OwnershipEnforcer};

/// Body of `POST /uploads/{folder}/set-pin`.
///
/// Parsed leniently: a malformed body counts as `{}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SetPinRequest {
    /// New PIN. Empty removes protection.
    #[serde(default)]
    pub pin: String,
    /// Required to change or remove an existing PIN.
    #[serde(default)]
    pub current_pin: Option<String>,
    /// Remove protection. `current_pin` falls back to `pin`.
    #[serde(default)]
    pub remove: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetPinResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_pin: Option<bool>,
    /// Files that could not be converted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SetPinResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            has_pin: None,
            failed_files: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PinStatusResponse {
    pub has_pin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Fields posted by the PIN entry form.
#[derive(Debug, Default, Deserialize)]
pub struct PinForm {
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub confirm_final_attempt: Option<String>,
}

impl PinForm {
    fn confirmed(&self) -> bool {
        matches!(
            self.confirm_final_attempt
                .as_deref()
                .map(|v| v.trim().to_ascii_lowercase())
                .as_deref(),
            Some("1" | "true" | "on" | "yes")
        )
    }
}

/// Read a JSON field as a string; non-string scalars are stringified.
fn field_as_string(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

impl SetPinRequest {
    /// Accept whatever the browser sent; anything unparseable is `{}`.
    pub fn from_body(body: &[u8]) -> Self {
        let data = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let remove = data.get("remove").and_then(Value::as_bool).unwrap_or(false);
        let pin = match data.get("pin") {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        };
        let mut current_pin = field_as_string(&data, "current_pin")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if remove && current_pin.is_none() && !pin.is_empty() {
            current_pin = Some(pin.clone());
        }

        Self {
            pin: if remove { String::new() } else { pin },
            current_pin,
            remove,
        }
    }
}

/// Set, change or remove the caller's folder PIN.
#[utoipa::path(
    post,
    path = "/uploads/{folder}/set-pin",
    tag = "PIN",
    params(("folder" = String, Path, description = "Folder name (owner's IP)")),
    request_body = SetPinRequest,
    responses(
        (status = 200, description = "PIN updated", body = SetPinResponse),
        (status = 400, description = "Rejected (wrong or missing current PIN, PIN too short)", body = SetPinResponse),
        (status = 403, description = "Not the folder owner", body = SetPinResponse),
        (status = 404, description = "Folder not found", body = SetPinResponse),
        (status = 500, description = "PIN details could not be saved", body = SetPinResponse)
    )
)]
pub async fn set_pin(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(folder): Path<String>,
    Extension(session): Extension<BrowserSession>,
    body: Bytes,
) -> (StatusCode, Json<SetPinResponse>) {
    if Folder(&folder).verify_ownership(ip).is_err() {
        warn!(%ip, folder, "Rejected PIN change from non-owner");
        return (
            StatusCode::FORBIDDEN,
            Json(SetPinResponse::failure(
                "You can only set a PIN for your own folder.",
            )),
        );
    }
    if state.storage.ensure_folder(&folder).is_err() {
        return (
            StatusCode::NOT_FOUND,
            Json(SetPinResponse::failure(PinError::NotFound.to_string())),
        );
    }

    let request = SetPinRequest::from_body(&body);
    let pins = state.pins.clone();
    let target = folder.clone();
    let result = blocking(move || {
        pins.set_pin(
            &target,
            &request.pin,
            request.current_pin.as_deref(),
            session.requester(),
        )
    })
    .await;

    match result {
        Ok(Ok(change)) => {
            info!(folder, has_pin = change.has_pin, "Folder PIN updated");
            let failed_files = (!change.files.is_clean()).then_some(change.files.failed);
            (
                StatusCode::OK,
                Json(SetPinResponse {
                    ok: true,
                    has_pin: Some(change.has_pin),
                    failed_files,
                    error: None,
                }),
            )
        }
        Ok(Err(e)) => {
            let e = ApiError::from(e);
            (e.status, Json(SetPinResponse::failure(e.message)))
        }
        Err(e) => (e.status, Json(SetPinResponse::failure(e.message))),
    }
}

/// Whether the folder is PIN-protected. Owner only.
#[utoipa::path(
    get,
    path = "/uploads/{folder}/pin-status",
    tag = "PIN",
    params(("folder" = String, Path, description = "Folder name (owner's IP)")),
    responses(
        (status = 200, description = "Protection state", body = PinStatusResponse),
        (status = 403, description = "Not the folder owner", body = PinStatusResponse)
    )
)]
pub async fn pin_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(folder): Path<String>,
) -> Result<(StatusCode, Json<PinStatusResponse>), ApiError> {
    if !Folder(&folder).is_owned_by(ip) {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(PinStatusResponse { has_pin: false }),
        ));
    }
    let pins = state.pins.clone();
    let has_pin = blocking(move || pins.folder_has_pin(&folder)).await?;
    Ok((StatusCode::OK, Json(PinStatusResponse { has_pin })))
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(folder_not_found_page())).into_response()
}

fn failure_page(status: StatusCode, folder: &str, message: &str) -> Response {
    (status, Html(error_page(folder, message))).into_response()
}

fn prompt_page(status: StatusCode, folder: &str, next: &str, prompt: PinPrompt) -> Response {
    (status, Html(pin_entry_page(folder, next, &prompt))).into_response()
}

const FINAL_WARNING: &str =
    "Wrong PIN. 1 attempt left. Another wrong PIN deletes this folder and all its files.";
const CONFIRM_FINAL: &str =
    "Confirm the final attempt to continue. A wrong PIN deletes this folder and all its files.";

/// `GET /uploads/{folder}/pin`: the PIN form.
pub async fn pin_entry(
    State(state): State<AppState>,
    Path(folder): Path<String>,
    Query(query): Query<NextQuery>,
) -> Result<Response, ApiError> {
    let pins = state.pins.clone();
    let target = folder.clone();
    let (exists, has_pin, awaiting) = blocking(move || {
        (
            pins.storage().folder_exists(&target),
            pins.folder_has_pin(&target),
            pins.awaiting_confirmation(&target),
        )
    })
    .await?;

    if !exists {
        return Ok(not_found());
    }
    let fallback = folder_url(&folder);
    if !has_pin {
        return Ok(Redirect::to(&fallback).into_response());
    }

    let next = safe_next(query.next.as_deref(), &fallback);
    let prompt = if awaiting {
        PinPrompt::ConfirmFinal(CONFIRM_FINAL.to_string())
    } else {
        PinPrompt::Enter
    };
    Ok(prompt_page(StatusCode::OK, &folder, &next, prompt))
}

/// `POST /uploads/{folder}/pin`: check a PIN and unlock the folder.
pub async fn submit_pin(
    State(state): State<AppState>,
    Path(folder): Path<String>,
    Extension(session): Extension<BrowserSession>,
    Form(form): Form<PinForm>,
) -> Result<Response, ApiError> {
    let pins = state.pins.clone();
    let target = folder.clone();
    let (exists, has_pin) = blocking(move || {
        (
            pins.storage().folder_exists(&target),
            pins.folder_has_pin(&target),
        )
    })
    .await?;

    if !exists {
        return Ok(not_found());
    }
    let fallback = folder_url(&folder);
    if !has_pin {
        return Ok(Redirect::to(&fallback).into_response());
    }
    let next = safe_next(form.next.as_deref(), &fallback);

    let confirmed = form.confirmed();
    let pins = state.pins.clone();
    let target = folder.clone();
    let attempt = blocking(move || {
        pins.submit_pin(&target, &form.pin, confirmed, session.requester())
    })
    .await?;

    let response = match attempt {
        Ok(PinAttempt::Unlocked { set_cookie }) => {
            let headers: Vec<_> = set_cookie.into_iter().map(|c| (SET_COOKIE, c)).collect();
            (AppendHeaders(headers), Redirect::to(&next)).into_response()
        }
        Ok(PinAttempt::Missing) => prompt_page(
            StatusCode::UNAUTHORIZED,
            &folder,
            &next,
            PinPrompt::Error("Please enter the PIN.".to_string()),
        ),
        Ok(PinAttempt::Rejected { remaining }) => {
            let plural = if remaining == 1 { "" } else { "s" };
            prompt_page(
                StatusCode::UNAUTHORIZED,
                &folder,
                &next,
                PinPrompt::Error(format!("Wrong PIN. {remaining} attempt{plural} left.")),
            )
        }
        Ok(PinAttempt::FinalWarning) => prompt_page(
            StatusCode::UNAUTHORIZED,
            &folder,
            &next,
            PinPrompt::ConfirmFinal(FINAL_WARNING.to_string()),
        ),
        Ok(PinAttempt::ConfirmationRequired) => prompt_page(
            StatusCode::UNAUTHORIZED,
            &folder,
            &next,
            PinPrompt::ConfirmFinal(CONFIRM_FINAL.to_string()),
        ),
        Ok(PinAttempt::FolderDeleted) => {
            (StatusCode::GONE, Html(folder_deleted_page(&folder))).into_response()
        }
        Err(PinError::NotFound) => not_found(),
        Err(PinError::Persistence(e)) => {
            error!(folder, error = %e, "Folder deleted, but its PIN details were not removed");
            failure_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                &folder,
                "Folder deleted, but failed to remove PIN details.",
            )
        }
        Err(e) => {
            let e = ApiError::from(e);
            failure_page(e.status, &folder, &e.message)
        }
    };
    Ok(response)
}
