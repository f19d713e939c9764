use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{PermissionRecord, ProjectRecord, ResourceRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Create a user. Returns false without writing when the name is taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(USERS)?;
            if table.get(username)?.is_some() {
                false
            } else {
                table.insert(username, password_hash)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(created)
    }

    pub fn user_password_hash(&self, username: &str) -> Result<Option<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.get(username)?.map(|v| v.value().to_string()))
    }

    /// Change an existing user's password hash. Returns false for an
    /// unknown user.
    pub fn set_user_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(USERS)?;
            if table.get(username)?.is_some() {
                table.insert(username, password_hash)?;
                true
            } else {
                false
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }

    // ========================================================================
    // Project operations
    // ========================================================================

    /// Create a project and its creator's all-capability permission row in
    /// one transaction. Returns false without writing when the name is taken.
    pub fn create_project(
        &self,
        project: &ProjectRecord,
        creator: &PermissionRecord,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let created = {
            let mut projects = write_txn.open_table(PROJECTS)?;
            if projects.get(project.name.as_str())?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(project)?;
                projects.insert(project.name.as_str(), data.as_slice())?;

                let mut permissions = write_txn.open_table(PERMISSIONS)?;
                let rows = vec![creator.clone()];
                let data = rmp_serde::to_vec_named(&rows)?;
                permissions.insert(project.name.as_str(), data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(created)
    }

    pub fn get_project(&self, name: &str) -> Result<Option<ProjectRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PROJECTS)?;
        match table.get(name)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Permission operations
    // ========================================================================

    /// All maintainers of a project with their capability flags.
    pub fn project_permissions(
        &self,
        project: &str,
    ) -> Result<Vec<PermissionRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PERMISSIONS)?;
        match table.get(project)? {
            Some(data) => Ok(rmp_serde::from_slice(data.value())?),
            None => Ok(Vec::new()),
        }
    }

    /// One user's capability flags for a project, if they are a maintainer.
    pub fn user_permissions(
        &self,
        project: &str,
        username: &str,
    ) -> Result<Option<PermissionRecord>, DatabaseError> {
        Ok(self
            .project_permissions(project)?
            .into_iter()
            .find(|p| p.username == username))
    }

    /// Replace a project's permission rows wholesale. The original admin
    /// panel did delete-all-then-reinsert under a table lock; one redb
    /// write transaction gives the same all-or-nothing, serialized update.
    pub fn replace_permissions(
        &self,
        project: &str,
        rows: &[PermissionRecord],
    ) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(PERMISSIONS)?;
            let data = rmp_serde::to_vec_named(&rows)?;
            table.insert(project, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========================================================================
    // Resource operations
    // ========================================================================

    pub fn project_resources(&self, project: &str) -> Result<Vec<ResourceRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(RESOURCES)?;
        match table.get(project)? {
            Some(data) => Ok(rmp_serde::from_slice(data.value())?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace a project's named URL resources wholesale.
    pub fn replace_resources(
        &self,
        project: &str,
        rows: &[ResourceRecord],
    ) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(RESOURCES)?;
            let data = rmp_serde::to_vec_named(&rows)?;
            table.insert(project, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
