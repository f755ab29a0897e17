//! Integration tests for project CRUD and board persistence.
//!
//! Tests cover:
//! - Creating, listing and fetching projects
//! - Partial updates
//! - Deleting projects
//! - Persistence through save/reopen cycles

mod common;

use common::*;

#[tokio::test]
async fn test_create_and_retrieve_project() -> anyhow::Result<()> {
    // 1. Create test board
    let (db, _temp_dir) = create_test_board().await;

    // 2. Create a project
    let created = db
        .create_project(&NewProject::new("Website", "Company website relaunch"))
        .await?;
    assert!(created.id > 0, "Project should have a positive ID");
    assert_eq!(created.name, "Website");

    // 3. Fetch it back by id and in the list
    let fetched = db.get_project(created.id).await?;
    assert_eq!(fetched.as_ref(), Some(&created));

    let projects: Vec<Project> = db.get_projects().await?;
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].description, "Company website relaunch");

    // 4. Unknown ids are absent, not errors
    assert!(db.get_project(created.id + 1).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_ids_are_unique() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_board().await;

    let a = db.create_project(&NewProject::new("A", "")).await?;
    let b = db.create_project(&NewProject::new("B", "")).await?;
    assert!(b.id > a.id, "Ids should grow even within one millisecond");

    Ok(())
}

#[tokio::test]
async fn test_update_project_merges_fields() -> anyhow::Result<()> {
    // 1. Create project
    let (db, _temp_dir) = create_test_board().await;
    let project = db.create_project(&NewProject::new("Old name", "Kept")).await?;

    // 2. Update only the name
    let update = ProjectUpdate {
        name: Some("New name".to_string()),
        description: None,
    };
    let updated = db
        .update_project(project.id, &update)
        .await?
        .expect("project exists");

    // 3. Verify merge
    assert_eq!(updated.name, "New name");
    assert_eq!(updated.description, "Kept");
    assert_eq!(updated.id, project.id);

    // 4. Updating a missing project reports absence
    assert!(db.update_project(project.id + 1, &update).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_delete_project() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_board().await;
    let project = db.create_project(&NewProject::new("Doomed", "")).await?;

    assert!(db.delete_project(project.id).await?);
    assert!(db.get_projects().await?.is_empty());

    // Deleting again finds nothing
    assert!(!db.delete_project(project.id).await?);

    Ok(())
}

#[tokio::test]
async fn test_board_survives_save_and_reopen() -> anyhow::Result<()> {
    // 1. Create board and data
    let (db, temp_dir) = create_test_board().await;
    let project = db.create_project(&NewProject::new("Persistent", "")).await?;
    db.set_current_id(SelectionKind::Project, project.id).await?;

    // 2. Save to disk
    db.save().await?;

    // 3. Reopen the same board file
    let path = temp_dir.path().join("test.board");
    let reopened = BoardDb::open(&path, test_keys()).await?;

    // 4. Verify data survived
    let projects = reopened.get_projects().await?;
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "Persistent");
    assert_eq!(reopened.get_current_project_id().await?, project.id);

    Ok(())
}

#[tokio::test]
async fn test_open_rejects_missing_parent_directory() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("missing").join("test.board");

    let result = BoardDb::open(&path, test_keys()).await;
    assert!(result.is_err());

    Ok(())
}
