use redb::TableDefinition;

/// User store: username -> password hash (hex)
pub const USERS: TableDefinition<&str, &str> = TableDefinition::new("users");

/// Project records: project name -> ProjectRecord (msgpack)
pub const PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Capability flags: project name -> msgpack Vec of PermissionRecord.
/// Keeping a project's whole permission set under one key makes the
/// delete-all-then-reinsert update a single serialized write.
pub const PERMISSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("permissions");

/// Named URL resources: project name -> msgpack Vec of ResourceRecord
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");
