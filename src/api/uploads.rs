// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upload, listing, download and deletion handlers.
//!
//! Reads of a protected folder go through the unlock gate; files in an
//! encrypted folder are encrypted on the way in and decrypted on the way
//! out. Ciphertext is never served.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::blocking;
use super::context::{BrowserSession, ClientIp};
use super::pages::{
    file_url, folder_not_found_page, folder_url, home_page, listing_page, pin_entry_url, ListItem,
};
use crate::crypto::FolderKey;
use crate::error::ApiError;
use crate::pins::PinError;
use crate::state::AppState;
use crate::storage::{sanitize_filename, Folder, OwnershipEnforcer};

#[derive(Debug, Serialize, ToSchema)]
pub struct UploaderFolderResponse {
    /// The caller's folder name.
    pub folder: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploaderHasFolderResponse {
    pub has_folder: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub preview: Option<String>,
}

impl DownloadQuery {
    fn inline(&self) -> bool {
        matches!(self.preview.as_deref(), Some("1" | "true"))
    }
}

fn home_with_notice(notice: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("notice", notice)
        .finish();
    format!("/?{query}")
}

// ========== Home & Upload ==========

pub async fn home(ClientIp(ip): ClientIp, Query(query): Query<HomeQuery>) -> Html<String> {
    Html(home_page(&ip.to_string(), query.notice.as_deref()))
}

/// Unlock state of a folder for this request.
enum Gate {
    Open,
    /// Protected and unlocked; carries the key when the folder is encrypted.
    Unlocked(Option<FolderKey>),
    Locked,
}

async fn gate(state: &AppState, folder: &str, session: &BrowserSession) -> Result<Gate, ApiError> {
    let pins = state.pins.clone();
    let folder = folder.to_string();
    let session = session.clone();
    blocking(move || {
        if !pins.folder_has_pin(&folder) {
            return Gate::Open;
        }
        let req = session.requester();
        if !pins.is_unlocked(&folder, req) {
            return Gate::Locked;
        }
        if pins.folder_has_encryption(&folder) {
            match pins.fek_for_folder(&folder, req) {
                Some(key) => Gate::Unlocked(Some(key)),
                None => Gate::Locked,
            }
        } else {
            Gate::Unlocked(None)
        }
    })
    .await
}

/// Store the uploaded files in the caller's folder.
pub async fn upload(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(session): Extension<BrowserSession>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let folder = ip.to_string();
    let storage = state.storage.clone();
    let target = folder.clone();
    blocking(move || storage.ensure_folder(&target)).await??;

    let key = match gate(&state, &folder, &session).await? {
        Gate::Open => None,
        Gate::Unlocked(key) => key,
        Gate::Locked => return Ok(Redirect::to(&pin_entry_url(&folder, "/")).into_response()),
    };

    let encrypted = key.is_some();
    let mut stored = 0usize;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(name) = field.file_name().and_then(sanitize_filename) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?;

        let storage = state.storage.clone();
        let key = key.clone();
        let target = folder.clone();
        let file = name.clone();
        blocking(move || -> Result<(), ApiError> {
            let path = storage.file(&target, &file)?;
            match key {
                Some(key) => {
                    let sealed = key.encrypt(&data).map_err(|e| {
                        error!(folder = target, file, error = %e, "Upload encryption failed");
                        ApiError::internal("Encryption failed")
                    })?;
                    storage.write_raw(&path, &sealed)?;
                }
                None => storage.write_raw(&path, &data)?,
            }
            Ok(())
        })
        .await??;
        info!(folder, file = name, encrypted, "File uploaded");
        stored += 1;
    }

    if stored == 0 {
        return Ok(Redirect::to(&home_with_notice("No file selected.")).into_response());
    }
    Ok(Redirect::to("/").into_response())
}

// ========== Uploader Info ==========

/// Name of the caller's folder.
#[utoipa::path(
    get,
    path = "/api/uploader-folder",
    tag = "Uploads",
    responses((status = 200, description = "Caller's folder", body = UploaderFolderResponse))
)]
pub async fn uploader_folder(ClientIp(ip): ClientIp) -> Json<UploaderFolderResponse> {
    Json(UploaderFolderResponse {
        folder: ip.to_string(),
    })
}

/// Whether the caller's folder exists yet.
#[utoipa::path(
    get,
    path = "/api/uploader-has-folder",
    tag = "Uploads",
    responses((status = 200, description = "Folder presence", body = UploaderHasFolderResponse))
)]
pub async fn uploader_has_folder(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<Json<UploaderHasFolderResponse>, ApiError> {
    let storage = state.storage.clone();
    let has_folder = blocking(move || storage.folder_exists(&ip.to_string())).await?;
    Ok(Json(UploaderHasFolderResponse { has_folder }))
}

// ========== Listings ==========

/// All folders, newest name first. The caller's own row carries controls.
pub async fn list_folders(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<Html<String>, ApiError> {
    let pins = state.pins.clone();
    let items = blocking(move || -> Result<Vec<ListItem>, ApiError> {
        let storage = pins.storage();
        let mut folders = storage.list_dirs(storage.paths().root())?;
        folders.reverse();
        Ok(folders
            .into_iter()
            .map(|folder| {
                let owned = Folder(&folder).is_owned_by(ip);
                ListItem {
                    url: folder_url(&folder),
                    has_pin: pins.folder_has_pin(&folder),
                    delete_url: owned.then(|| format!("{}/delete-folder", folder_url(&folder))),
                    delete_message: "Delete this folder and all its files?",
                    pin_folder: owned.then(|| folder.clone()),
                    label: folder,
                }
            })
            .collect())
    })
    .await??;

    Ok(Html(listing_page("Uploads", &[("Uploads", None)], &items)))
}

/// Files of one folder. Locked folders redirect to the PIN page.
pub async fn list_files(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(folder): Path<String>,
    Extension(session): Extension<BrowserSession>,
) -> Result<Response, ApiError> {
    let storage = state.storage.clone();
    let target = folder.clone();
    let dir = blocking(move || storage.folder(&target).ok().filter(|d| d.is_dir())).await?;
    let Some(dir) = dir else {
        return Ok((StatusCode::NOT_FOUND, Html(folder_not_found_page())).into_response());
    };

    if let Gate::Locked = gate(&state, &folder, &session).await? {
        return Ok(Redirect::to(&pin_entry_url(&folder, &folder_url(&folder))).into_response());
    }

    let storage = state.storage.clone();
    let files = blocking(move || storage.list_files(&dir)).await??;
    let owned = Folder(&folder).is_owned_by(ip);
    let items: Vec<ListItem> = files
        .into_iter()
        .map(|file| ListItem {
            url: file_url(&folder, &file),
            delete_url: owned.then(|| format!("{}/delete", file_url(&folder, &file))),
            delete_message: "Delete this file?",
            label: file,
            ..ListItem::default()
        })
        .collect();

    Ok(Html(listing_page(
        &folder,
        &[("Uploads", Some("/uploads".to_string())), (folder.as_str(), None)],
        &items,
    ))
    .into_response())
}

// ========== Download ==========

fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" | "md" | "csv" => "text/plain; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn content_disposition(name: &str, inline: bool) -> String {
    let kind = if inline { "inline" } else { "attachment" };
    let safe: String = name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("{kind}; filename=\"{safe}\"")
}

/// Serve a file, decrypting it for unlocked browsers.
pub async fn download(
    State(state): State<AppState>,
    Path((folder, file)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
    Extension(session): Extension<BrowserSession>,
) -> Result<Response, ApiError> {
    let storage = state.storage.clone();
    let (target, name) = (folder.clone(), file.clone());
    let path = blocking(move || storage.file(&target, &name)).await??;

    let key = match gate(&state, &folder, &session).await? {
        Gate::Open => None,
        Gate::Unlocked(key) => key,
        Gate::Locked => {
            let mut next = file_url(&folder, &file);
            if query.inline() {
                next.push_str("?preview=1");
            }
            return Ok(Redirect::to(&pin_entry_url(&folder, &next)).into_response());
        }
    };

    let storage = state.storage.clone();
    let (target, name) = (folder.clone(), file.clone());
    let body = blocking(move || -> Result<Vec<u8>, ApiError> {
        if !path.is_file() {
            return Err(ApiError::not_found("File not found"));
        }
        let data = storage.read_raw(&path)?;
        match key {
            Some(key) => key.decrypt(&data).map_err(|e| {
                error!(folder = target, file = name, error = %e, "Download decryption failed");
                ApiError::internal(PinError::Decrypt.to_string())
            }),
            None => Ok(data),
        }
    })
    .await??;

    Ok((
        [
            (CONTENT_TYPE, content_type_for(&file).to_string()),
            (CONTENT_DISPOSITION, content_disposition(&file, query.inline())),
        ],
        body,
    )
        .into_response())
}

// ========== Deletion ==========

/// Owner-only file removal.
pub async fn delete_file(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path((folder, file)): Path<(String, String)>,
) -> Result<Redirect, ApiError> {
    Folder(&folder).verify_ownership(ip).map_err(|e| {
        warn!(%ip, folder, file, "Rejected file deletion from non-owner");
        ApiError::from(e)
    })?;

    let storage = state.storage.clone();
    let (target, name) = (folder.clone(), file.clone());
    blocking(move || -> Result<(), ApiError> {
        let path = storage.file(&target, &name)?;
        if !path.is_file() {
            return Err(ApiError::not_found("File not found"));
        }
        storage.delete(&path)?;
        Ok(())
    })
    .await??;

    info!(folder, file, "File deleted");
    Ok(Redirect::to(&folder_url(&folder)))
}

/// Owner-only folder removal: the tree first, then its PIN state.
pub async fn delete_folder(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(folder): Path<String>,
) -> Result<Redirect, ApiError> {
    Folder(&folder).verify_ownership(ip).map_err(|e| {
        warn!(%ip, folder, "Rejected folder deletion from non-owner");
        ApiError::from(e)
    })?;

    let pins = state.pins.clone();
    let target = folder.clone();
    blocking(move || -> Result<(), ApiError> {
        if !pins.storage().folder_exists(&target) {
            return Err(ApiError::not_found(PinError::NotFound.to_string()));
        }
        pins.delete_folder(&target).map_err(|e| match e {
            PinError::Persistence(_) => {
                error!(folder = target, error = %e, "Folder removed but PIN details remain");
                ApiError::internal("Folder deleted, but failed to remove PIN details.")
            }
            other => ApiError::from(other),
        })
    })
    .await??;

    Ok(Redirect::to("/uploads"))
}
