//! The JSON admin protocol: one POST endpoint, dispatched on the `action`
//! field. Every response is either the action's data object or the
//! `{"error": ...}` envelope.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{safe_project, storage_error};
use crate::api::response::{ApiError, AppJson};
use crate::storage::models::{Capability, PermissionRecord, ProjectRecord, ResourceRecord};
use crate::AppState;

/// Sworn before a database reset is carried out.
const RESET_OATH: &str = "I solemnly swear that I have a backup.";

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    pub project: String,
    /// Explicit credentials; a session cookie works too.
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(flatten)]
    pub action: AdminAction,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    Getmaint,
    Chmaint { newmaint: Vec<PermissionRecord> },
    Getresources,
    Chresources { resources: Vec<ResourceRecord> },
    Getsrv,
    RefreshState,
    Enable,
    Disable,
    Resetdb { oath: String },
    NewProject,
}

pub async fn admin_api(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<AdminRequest>,
) -> Result<Json<Value>, ApiError> {
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
        .map_err(storage_error)?;

    let data = dispatch(&state, user.as_deref(), &req.project, req.action).await?;
    Ok(Json(data))
}

/// Run one admin action for `user` against `project`. Public so the
/// protocol can be exercised without going through HTTP.
pub async fn dispatch(
    state: &AppState,
    user: Option<&str>,
    project: &str,
    action: AdminAction,
) -> Result<Value, ApiError> {
    match action {
        AdminAction::Getmaint => {
            let maintainers = state.db.project_permissions(project).map_err(storage_error)?;
            Ok(json!({ "maintainers": maintainers }))
        }

        AdminAction::Chmaint { newmaint } => {
            let user = require_capability(state, user, project, Capability::Give)?;
            // A maintainer must not lock themselves out of this screen.
            if newmaint.iter().any(|m| m.username == user && !m.give) {
                return Err(ApiError::forbidden_with(
                    "You're not allowed to revoke your own permissions to edit maintainers.",
                ));
            }
            state
                .db
                .replace_permissions(project, &newmaint)
                .map_err(storage_error)?;
            let maintainers = state.db.project_permissions(project).map_err(storage_error)?;
            Ok(json!({ "maintainers": maintainers }))
        }

        AdminAction::Getresources => {
            let resources = state.db.project_resources(project).map_err(storage_error)?;
            Ok(json!({ "resources": resources }))
        }

        AdminAction::Chresources { resources } => {
            require_capability(state, user, project, Capability::Description)?;
            state
                .db
                .replace_resources(project, &resources)
                .map_err(storage_error)?;
            let resources = state.db.project_resources(project).map_err(storage_error)?;
            Ok(json!({ "resources": resources }))
        }

        AdminAction::Getsrv => {
            require_capability(state, user, project, Capability::Server)?;
            let project = safe_project(project)?;
            let status = state.daemon.status(project).await;
            let wperm = std::fs::read_to_string(
                state.config.project_dir(project).join("write-permissions"),
            )
            .unwrap_or_default();
            Ok(json!({ "status": status, "wperm": wperm }))
        }

        AdminAction::RefreshState => {
            require_capability(state, user, project, Capability::Server)?;
            let project = safe_project(project)?;
            let status = state.daemon.status(project).await;
            Ok(json!({ "status": status }))
        }

        AdminAction::Enable => {
            require_capability(state, user, project, Capability::Server)?;
            let project = safe_project(project)?;
            let status = state.daemon.start(project).await;
            Ok(json!({ "status": status }))
        }

        AdminAction::Disable => {
            require_capability(state, user, project, Capability::Server)?;
            let project = safe_project(project)?;
            let status = state.daemon.stop(project).await;
            Ok(json!({ "status": status }))
        }

        AdminAction::Resetdb { oath } => {
            require_capability(state, user, project, Capability::Server)?;
            let project = safe_project(project)?;
            if oath != RESET_OATH {
                return Err(ApiError::forbidden_with(
                    "I'm sorry Dave, I can't let you do that.",
                ));
            }
            let db_path = state.config.project_dir(project).join("database");
            match std::fs::remove_file(&db_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ApiError::internal_verbose(
                        "Removing the old database failed.",
                        e.to_string(),
                    ))
                }
            }
            Ok(json!({
                "ok": "Database reset. It will be recreated empty the next time \
                       the server starts. You *did* disable the server first, right?"
            }))
        }

        AdminAction::NewProject => {
            let user = user.ok_or_else(ApiError::unauthorized)?;
            let name = safe_project(project)?;

            let record = ProjectRecord {
                name: name.to_string(),
                created_at: Utc::now(),
            };
            let created = state
                .db
                .create_project(&record, &PermissionRecord::full(user))
                .map_err(storage_error)?;
            if !created {
                return Err(ApiError::conflict("That project name is already taken."));
            }

            let www = state.config.project_www_dir(name);
            std::fs::create_dir_all(www.join("files"))
                .and_then(|_| std::fs::create_dir_all(www.join("files-about")))
                .and_then(|_| std::fs::create_dir_all(state.config.project_dir(name)))
                .map_err(|e| {
                    ApiError::internal_verbose("Creating project directories failed.", e.to_string())
                })?;

            let status = state.daemon.add(name).await;
            tracing::info!(project = name, %status, "Registered project with the daemon");

            Ok(json!({ "name": name }))
        }
    }
}

/// Resolve the acting user and check one capability flag on the project.
fn require_capability(
    state: &AppState,
    user: Option<&str>,
    project: &str,
    capability: Capability,
) -> Result<String, ApiError> {
    let user = user.ok_or_else(ApiError::unauthorized)?;
    match state
        .db
        .user_permissions(project, user)
        .map_err(storage_error)?
    {
        Some(permissions) if permissions.has(capability) => Ok(user.to_string()),
        _ => Err(ApiError::forbidden()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;

    fn seed_project(state: &AppState, project: &str, owner: &str) {
        let record = ProjectRecord {
            name: project.to_string(),
            created_at: Utc::now(),
        };
        assert!(state
            .db
            .create_project(&record, &PermissionRecord::full(owner))
            .unwrap());
    }

    #[tokio::test]
    async fn getmaint_lists_maintainers_without_auth() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let data = dispatch(&state, None, "mtn", AdminAction::Getmaint)
            .await
            .unwrap();
        let maintainers = data["maintainers"].as_array().unwrap();
        assert_eq!(maintainers.len(), 1);
        assert_eq!(maintainers[0]["username"], "alice");
        assert_eq!(maintainers[0]["give"], true);
    }

    #[tokio::test]
    async fn chmaint_requires_authentication_and_leaves_rows_untouched() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let before = state.db.project_permissions("mtn").unwrap();
        let result = dispatch(
            &state,
            None,
            "mtn",
            AdminAction::Chmaint { newmaint: vec![] },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.message(), "username or password is incorrect.");
        assert_eq!(state.db.project_permissions("mtn").unwrap(), before);
    }

    #[tokio::test]
    async fn chmaint_requires_give_capability() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let mut rows = state.db.project_permissions("mtn").unwrap();
        rows.push(PermissionRecord {
            username: "bob".to_string(),
            give: false,
            upload: true,
            homepage: false,
            access: false,
            server: false,
            description: false,
        });
        state.db.replace_permissions("mtn", &rows).unwrap();

        let result = dispatch(
            &state,
            Some("bob"),
            "mtn",
            AdminAction::Chmaint { newmaint: vec![] },
        )
        .await;
        assert_eq!(result.unwrap_err().message(), "You're not allowed to do that.");
    }

    #[tokio::test]
    async fn chmaint_refuses_self_revocation() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let mut mine = PermissionRecord::full("alice");
        mine.give = false;
        let result = dispatch(
            &state,
            Some("alice"),
            "mtn",
            AdminAction::Chmaint {
                newmaint: vec![mine],
            },
        )
        .await;

        assert_eq!(
            result.unwrap_err().message(),
            "You're not allowed to revoke your own permissions to edit maintainers."
        );
        // Nothing was written.
        assert_eq!(state.db.project_permissions("mtn").unwrap().len(), 1);
        assert!(state.db.project_permissions("mtn").unwrap()[0].give);
    }

    #[tokio::test]
    async fn chmaint_replaces_the_roster_wholesale() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let newmaint = vec![
            PermissionRecord::full("alice"),
            PermissionRecord {
                username: "bob".to_string(),
                give: false,
                upload: true,
                homepage: true,
                access: false,
                server: false,
                description: false,
            },
        ];
        let data = dispatch(
            &state,
            Some("alice"),
            "mtn",
            AdminAction::Chmaint { newmaint },
        )
        .await
        .unwrap();

        assert_eq!(data["maintainers"].as_array().unwrap().len(), 2);
        let stored = state.db.project_permissions("mtn").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].username, "bob");
        assert!(!stored[1].give);
    }

    #[tokio::test]
    async fn chresources_requires_description_capability() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let resources = vec![ResourceRecord {
            name: "Wiki".to_string(),
            url: "https://wiki.example.org/".to_string(),
        }];

        let denied = dispatch(
            &state,
            Some("mallory"),
            "mtn",
            AdminAction::Chresources {
                resources: resources.clone(),
            },
        )
        .await;
        assert!(denied.is_err());
        assert!(state.db.project_resources("mtn").unwrap().is_empty());

        let data = dispatch(
            &state,
            Some("alice"),
            "mtn",
            AdminAction::Chresources { resources },
        )
        .await
        .unwrap();
        assert_eq!(data["resources"][0]["name"], "Wiki");
    }

    #[tokio::test]
    async fn server_state_queries_are_gated_on_the_server_capability() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let mut rows = state.db.project_permissions("mtn").unwrap();
        let mut bob = PermissionRecord::full("bob");
        bob.server = false;
        rows.push(bob);
        state.db.replace_permissions("mtn", &rows).unwrap();

        let denied = dispatch(&state, Some("bob"), "mtn", AdminAction::Getsrv).await;
        assert_eq!(denied.unwrap_err().message(), "You're not allowed to do that.");

        let denied = dispatch(&state, Some("bob"), "mtn", AdminAction::RefreshState).await;
        assert_eq!(denied.unwrap_err().message(), "You're not allowed to do that.");

        let anonymous = dispatch(&state, None, "mtn", AdminAction::Getsrv).await;
        assert_eq!(
            anonymous.unwrap_err().message(),
            "username or password is incorrect."
        );
    }

    #[tokio::test]
    async fn resetdb_demands_the_exact_oath() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        seed_project(&state, "mtn", "alice");

        let project_dir = state.config.project_dir("mtn");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("database"), b"data").unwrap();

        let result = dispatch(
            &state,
            Some("alice"),
            "mtn",
            AdminAction::Resetdb {
                oath: "i promise".to_string(),
            },
        )
        .await;
        assert_eq!(
            result.unwrap_err().message(),
            "I'm sorry Dave, I can't let you do that."
        );
        assert!(project_dir.join("database").exists());

        dispatch(
            &state,
            Some("alice"),
            "mtn",
            AdminAction::Resetdb {
                oath: RESET_OATH.to_string(),
            },
        )
        .await
        .unwrap();
        assert!(!project_dir.join("database").exists());
    }

    #[tokio::test]
    async fn new_project_validates_the_name() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);

        let result = dispatch(&state, Some("alice"), "bad/name", AdminAction::NewProject).await;
        assert_eq!(
            result.unwrap_err().message(),
            "Only letters, numbers, and dash are allowed in a project name."
        );
        assert!(state.db.get_project("bad/name").unwrap().is_none());
    }

    #[tokio::test]
    async fn new_project_creates_rows_and_directories() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);

        let data = dispatch(&state, Some("alice"), "mtn-viz", AdminAction::NewProject)
            .await
            .unwrap();
        assert_eq!(data["name"], "mtn-viz");

        assert!(state.db.get_project("mtn-viz").unwrap().is_some());
        let permissions = state.db.project_permissions("mtn-viz").unwrap();
        assert_eq!(permissions, vec![PermissionRecord::full("alice")]);

        let www = state.config.project_www_dir("mtn-viz");
        assert!(www.join("files").is_dir());
        assert!(www.join("files-about").is_dir());

        let taken = dispatch(&state, Some("alice"), "mtn-viz", AdminAction::NewProject).await;
        assert_eq!(
            taken.unwrap_err().message(),
            "That project name is already taken."
        );
    }
}
