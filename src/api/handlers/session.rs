//! Login, logout, registration and password changes. Successful calls set
//! or clear the session cookie alongside a small JSON body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::storage_error;
use crate::api::response::{ApiError, AppJson};
use crate::auth::Authenticator;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub new_password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let hash = Authenticator::hash_password(&req.password);
    match state
        .db
        .user_password_hash(&req.username)
        .map_err(storage_error)?
    {
        Some(stored) if stored == hash => {
            let cookie = state.auth.issue_cookie(&req.username, &hash);
            Ok((
                [(header::SET_COOKIE, cookie)],
                Json(json!({ "ok": "Logged in." })),
            ))
        }
        _ => Err(ApiError::unauthorized()),
    }
}

pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, Authenticator::clear_cookie())],
        Json(json!({ "ok": "Logged out." })),
    )
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "Your username and password cannot be blank.",
        ));
    }

    let hash = Authenticator::hash_password(&req.password);
    let created = state
        .db
        .create_user(&req.username, &hash)
        .map_err(storage_error)?;
    if !created {
        return Err(ApiError::conflict("That username is already taken."));
    }

    tracing::info!(username = %req.username, "Registered user");
    let cookie = state.auth.issue_cookie(&req.username, &hash);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": format!("Added user {}.", req.username) })),
    ))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<PasswordChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.new_password.is_empty() {
        return Err(ApiError::bad_request("Your new password cannot be blank."));
    }

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok());
    let credentials = match (&req.username, &req.password) {
        (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
        _ => None,
    };
    let user = state
        .auth
        .authenticate(&state.db, credentials, cookie)
        .map_err(storage_error)?
        .ok_or_else(ApiError::unauthorized)?;

    let hash = Authenticator::hash_password(&req.new_password);
    state
        .db
        .set_user_password(&user, &hash)
        .map_err(storage_error)?;

    // Re-issue the cookie so the session survives the hash change.
    let cookie = state.auth.issue_cookie(&user, &hash);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": "Password changed." })),
    ))
}
