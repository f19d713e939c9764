use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hosted project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user, per-project boolean capability flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub username: String,
    /// Grant/revoke permissions for other users
    pub give: bool,
    /// Upload files
    pub upload: bool,
    /// Replace the project home page
    pub homepage: bool,
    /// Upload keys, edit write permissions
    pub access: bool,
    /// Start/stop the server, reset the database
    pub server: bool,
    /// Edit the project description and resources
    pub description: bool,
}

impl PermissionRecord {
    /// All capabilities granted; used for a project's creator.
    pub fn full(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            give: true,
            upload: true,
            homepage: true,
            access: true,
            server: true,
            description: true,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Give => self.give,
            Capability::Upload => self.upload,
            Capability::Homepage => self.homepage,
            Capability::Access => self.access,
            Capability::Server => self.server,
            Capability::Description => self.description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Give,
    Upload,
    Homepage,
    Access,
    Server,
    Description,
}

/// A named URL resource shown on a project page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub url: String,
}
