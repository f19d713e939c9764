//! Multipart uploads: release/project files with optional per-file
//! description sidecars, and home page replacement.
//!
//! The whole form is buffered before any authorization check so that a
//! `comment` field trailing its `file` field can be paired up, and so a
//! rejected request never leaves partial files behind.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};

use super::{basename, safe_project, storage_error};
use crate::api::response::ApiError;
use crate::storage::models::Capability;
use crate::AppState;

struct UploadForm {
    project: Option<String>,
    username: Option<String>,
    password: Option<String>,
    files: Vec<UploadedFile>,
}

struct UploadedFile {
    name: String,
    data: Bytes,
    /// One-line description written to the files-about sidecar.
    comment: Option<String>,
}

pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = read_form(&state, multipart).await?;
    store_files(&state, &headers, &form)
}

pub async fn change_homepage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = read_form(&state, multipart).await?;
    store_homepage(&state, &headers, &form)
}

/// Authorize and write the buffered files. Nothing touches the filesystem
/// until the caller has passed the capability check.
fn store_files(
    state: &AppState,
    headers: &HeaderMap,
    form: &UploadForm,
) -> Result<Json<Value>, ApiError> {
    let project = form
        .project
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("The project field is required."))?;
    let project = safe_project(project)?;
    authorize(state, headers, form, project, Capability::Upload)?;

    if form.files.is_empty() {
        return Err(ApiError::bad_request("No files were attached."));
    }

    let www = state.config.project_www_dir(project);
    let files_dir = www.join("files");
    let about_dir = www.join("files-about");
    std::fs::create_dir_all(&files_dir)
        .and_then(|_| std::fs::create_dir_all(&about_dir))
        .map_err(|e| ApiError::internal_verbose("Creating upload directories failed.", e.to_string()))?;

    for file in &form.files {
        std::fs::write(files_dir.join(&file.name), &file.data)
            .map_err(|_| ApiError::internal(format!("Error uploading file '{}'.", file.name)))?;
        std::fs::write(about_dir.join(&file.name), file.comment.as_deref().unwrap_or(""))
            .map_err(|_| ApiError::internal(format!("Error uploading file '{}'.", file.name)))?;
        tracing::info!(project, file = %file.name, size = file.data.len(), "Uploaded file");
    }

    Ok(Json(json!({ "ok": "Files uploaded." })))
}

/// Authorize and install the buffered home page.
fn store_homepage(
    state: &AppState,
    headers: &HeaderMap,
    form: &UploadForm,
) -> Result<Json<Value>, ApiError> {
    let project = form
        .project
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("The project field is required."))?;
    let project = safe_project(project)?;
    authorize(state, headers, form, project, Capability::Homepage)?;

    let page = form
        .files
        .first()
        .ok_or_else(|| ApiError::bad_request("No home page file was attached."))?;

    let www = state.config.project_www_dir(project);
    std::fs::create_dir_all(&www)
        .and_then(|_| std::fs::write(www.join("index.html"), &page.data))
        .map_err(|e| ApiError::internal_verbose("Replacing the home page failed.", e.to_string()))?;

    Ok(Json(json!({ "ok": "Home page replaced." })))
}

/// Buffer every multipart field. A `comment` field attaches to the file
/// field that preceded it.
async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        project: None,
        username: None,
        password: None,
        files: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "project" => form.project = Some(read_text(field).await?),
            "username" => form.username = Some(read_text(field).await?),
            "password" => form.password = Some(read_text(field).await?),
            "file" | "homepage" => {
                let file_name = field.file_name().map(basename).unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File '{file_name}' exceeds the upload limit."
                    )));
                }
                if file_name.is_empty() && name == "file" {
                    continue;
                }
                form.files.push(UploadedFile {
                    name: file_name,
                    data,
                    comment: None,
                });
            }
            "comment" => {
                let text = read_text(field).await?;
                if let Some(last) = form.files.last_mut() {
                    last.comment = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart field: {e}")))
}

/// Authenticate from form credentials or the session cookie, then check
/// the capability on the project.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    form: &UploadForm,
    project: &str,
    capability: Capability,
) -> Result<String, ApiError> {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok());
    let credentials = match (&form.username, &form.password) {
        (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
        _ => None,
    };
    let user = state
        .auth
        .authenticate(&state.db, credentials, cookie)
        .map_err(storage_error)?
        .ok_or_else(ApiError::unauthorized)?;

    match state
        .db
        .user_permissions(project, &user)
        .map_err(storage_error)?
    {
        Some(permissions) if permissions.has(capability) => Ok(user),
        _ => Err(ApiError::forbidden()),
    }
}
