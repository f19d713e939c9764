use chrono::Utc;
use mtn_web::storage::models::{PermissionRecord, ProjectRecord, ResourceRecord};
use mtn_web::storage::Database;

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_project(name: &str) -> ProjectRecord {
    ProjectRecord {
        name: name.to_string(),
        created_at: Utc::now(),
    }
}

#[test]
fn test_create_user_and_check_password() {
    let (_dir, db) = test_db();

    assert!(db.create_user("alice", "hash-a").unwrap());
    assert_eq!(
        db.user_password_hash("alice").unwrap(),
        Some("hash-a".to_string())
    );
    assert_eq!(db.user_password_hash("nobody").unwrap(), None);
}

#[test]
fn test_duplicate_username_is_rejected() {
    let (_dir, db) = test_db();

    assert!(db.create_user("alice", "hash-a").unwrap());
    assert!(!db.create_user("alice", "hash-b").unwrap());

    // The original password hash survives the rejected attempt.
    assert_eq!(
        db.user_password_hash("alice").unwrap(),
        Some("hash-a".to_string())
    );
}

#[test]
fn test_set_user_password() {
    let (_dir, db) = test_db();

    db.create_user("alice", "hash-a").unwrap();
    assert!(db.set_user_password("alice", "hash-b").unwrap());
    assert_eq!(
        db.user_password_hash("alice").unwrap(),
        Some("hash-b".to_string())
    );

    assert!(!db.set_user_password("nobody", "hash-c").unwrap());
    assert_eq!(db.user_password_hash("nobody").unwrap(), None);
}

#[test]
fn test_create_project_grants_creator_all_capabilities() {
    let (_dir, db) = test_db();

    let created = db
        .create_project(&sample_project("mtn"), &PermissionRecord::full("alice"))
        .unwrap();
    assert!(created);

    let project = db.get_project("mtn").unwrap().expect("project should exist");
    assert_eq!(project.name, "mtn");

    let permissions = db.project_permissions("mtn").unwrap();
    assert_eq!(permissions, vec![PermissionRecord::full("alice")]);
}

#[test]
fn test_duplicate_project_name_is_rejected() {
    let (_dir, db) = test_db();

    assert!(db
        .create_project(&sample_project("mtn"), &PermissionRecord::full("alice"))
        .unwrap());
    assert!(!db
        .create_project(&sample_project("mtn"), &PermissionRecord::full("bob"))
        .unwrap());

    // The first creator's roster is untouched.
    let permissions = db.project_permissions("mtn").unwrap();
    assert_eq!(permissions, vec![PermissionRecord::full("alice")]);
}

#[test]
fn test_replace_permissions_is_wholesale() {
    let (_dir, db) = test_db();
    db.create_project(&sample_project("mtn"), &PermissionRecord::full("alice"))
        .unwrap();

    let new_rows = vec![
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
    db.replace_permissions("mtn", &new_rows).unwrap();
    assert_eq!(db.project_permissions("mtn").unwrap(), new_rows);

    // Replacing with a shorter roster drops the absent rows.
    db.replace_permissions("mtn", &new_rows[1..]).unwrap();
    let permissions = db.project_permissions("mtn").unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].username, "bob");
}

#[test]
fn test_user_permissions_finds_one_row() {
    let (_dir, db) = test_db();
    db.create_project(&sample_project("mtn"), &PermissionRecord::full("alice"))
        .unwrap();

    let row = db.user_permissions("mtn", "alice").unwrap();
    assert_eq!(row, Some(PermissionRecord::full("alice")));
    assert_eq!(db.user_permissions("mtn", "bob").unwrap(), None);
    assert_eq!(db.user_permissions("ghost", "alice").unwrap(), None);
}

#[test]
fn test_resources_default_empty_and_replace() {
    let (_dir, db) = test_db();
    db.create_project(&sample_project("mtn"), &PermissionRecord::full("alice"))
        .unwrap();

    assert!(db.project_resources("mtn").unwrap().is_empty());

    let resources = vec![
        ResourceRecord {
            name: "Wiki".to_string(),
            url: "https://wiki.example.org/".to_string(),
        },
        ResourceRecord {
            name: "Bugs".to_string(),
            url: "https://bugs.example.org/".to_string(),
        },
    ];
    db.replace_resources("mtn", &resources).unwrap();
    assert_eq!(db.project_resources("mtn").unwrap(), resources);

    db.replace_resources("mtn", &[]).unwrap();
    assert!(db.project_resources("mtn").unwrap().is_empty());
}
