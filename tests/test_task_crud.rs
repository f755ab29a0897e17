//! Integration tests for scenarios, tasks and cascading deletes.
//!
//! Tests cover:
//! - Scenario and task CRUD on the local board
//! - Clearing optional task fields through updates
//! - Creation requiring a selected parent
//! - Project and scenario deletes cascading to their children

mod common;

use common::*;
use taskboard::BoardError;

#[tokio::test]
async fn test_scenario_and_task_crud() -> anyhow::Result<()> {
    // 1. Create project and scenario
    let (db, _temp_dir) = create_test_board().await;
    let project = db.create_project(&NewProject::new("P", "")).await?;
    let scenario = db
        .create_scenario(&NewScenario::new(project.id, "S", "", Priority::High))
        .await?;
    assert_eq!(scenario.status, Status::Todo);
    assert_eq!(scenario.owner_id, None);

    // 2. Create a task
    let task = db
        .create_task(&NewTask::new(scenario.id, "T", "desc", Priority::Low, 3.5))
        .await?;
    assert_eq!(task.status, Status::Todo);
    assert_eq!(task.owner_id, None);
    assert_eq!(task.start_date, None);
    assert_eq!(task.end_date, None);
    assert_eq!(task.estimated_time, 3.5);

    // 3. Look them up through their parents
    let scenarios = db.get_scenarios_by_project_id(project.id).await?;
    assert_eq!(scenarios.len(), 1);
    let tasks = db.get_tasks_by_scenario_id(scenario.id).await?;
    assert_eq!(tasks, vec![task.clone()]);

    // 4. Update the scenario
    let update = ScenarioUpdate {
        status: Some(Status::InProgress),
        owner_id: Some(Some(2)),
        ..ScenarioUpdate::default()
    };
    let updated = db
        .update_scenario(scenario.id, &update)
        .await?
        .expect("scenario exists");
    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.owner_id, Some(2));
    assert_eq!(updated.name, "S");

    Ok(())
}

#[tokio::test]
async fn test_task_update_can_clear_owner() -> anyhow::Result<()> {
    // 1. Create an owned task
    let (db, _temp_dir) = create_test_board().await;
    let project = db.create_project(&NewProject::new("P", "")).await?;
    let scenario = db
        .create_scenario(&NewScenario::new(project.id, "S", "", Priority::Low))
        .await?;
    let task = db
        .create_task(&NewTask::new(scenario.id, "T", "", Priority::Low, 1.0).with_owner(2))
        .await?;
    assert_eq!(task.owner_id, Some(2));

    // 2. Leaving owner_id out keeps the owner
    let rename = TaskUpdate {
        name: Some("Renamed".to_string()),
        ..TaskUpdate::default()
    };
    let renamed = db.update_task(task.id, &rename).await?.expect("task exists");
    assert_eq!(renamed.owner_id, Some(2));
    assert_eq!(renamed.name, "Renamed");

    // 3. An explicit None clears it
    let unassign = TaskUpdate {
        owner_id: Some(None),
        ..TaskUpdate::default()
    };
    let cleared = db.update_task(task.id, &unassign).await?.expect("task exists");
    assert_eq!(cleared.owner_id, None);
    assert_eq!(cleared.name, "Renamed");

    Ok(())
}

#[tokio::test]
async fn test_task_update_json_distinguishes_null_from_missing() -> anyhow::Result<()> {
    let missing: TaskUpdate = serde_json::from_str(r#"{"name": "x"}"#)?;
    assert_eq!(missing.owner_id, None);
    assert_eq!(missing.start_date, None);

    let null: TaskUpdate = serde_json::from_str(r#"{"ownerId": null, "endDate": null}"#)?;
    assert_eq!(null.owner_id, Some(None));
    assert_eq!(null.end_date, Some(None));

    let set: TaskUpdate =
        serde_json::from_str(r#"{"ownerId": 3, "startDate": "2025-03-01T10:00:00Z"}"#)?;
    assert_eq!(set.owner_id, Some(Some(3)));
    assert!(matches!(set.start_date, Some(Some(_))));

    Ok(())
}

#[tokio::test]
async fn test_creation_requires_selection() -> anyhow::Result<()> {
    // 1. Fresh board, nothing selected
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;

    // 2. Scenario creation needs a project
    let err = board
        .create_scenario(&session, "S", "", Priority::Low)
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::NothingSelected(SelectionKind::Project)));
    assert_eq!(
        err.to_string(),
        "No project selected. Please select a project first."
    );

    // 3. Task creation needs a scenario
    let project = board.create_project(&NewProject::new("P", "")).await?;
    board.select_project(&mut session, project.id).await?;
    let err = board
        .create_task(&session, "T", "", Priority::Low, 1.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No scenario selected.");

    Ok(())
}

#[tokio::test]
async fn test_selecting_project_clears_scenario_and_task() -> anyhow::Result<()> {
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;
    let (_project, scenario) = select_new_scenario(&board, &mut session).await?;
    let task = board
        .create_task(&session, "T", "", Priority::Low, 1.0, None)
        .await?;
    board.select_task(&mut session, task.id).await?;
    assert_eq!(session.scenario_id, scenario.id);
    assert_eq!(session.task_id, task.id);

    let other = board.create_project(&NewProject::new("P2", "")).await?;
    board.select_project(&mut session, other.id).await?;
    assert_eq!(session.project_id, other.id);
    assert_eq!(session.scenario_id, 0);
    assert_eq!(session.task_id, 0);

    // The persisted pointers agree with the session
    assert_eq!(board.session().await?, session);

    // Selecting something that does not exist changes nothing
    let err = board.select_scenario(&mut session, 42).await.unwrap_err();
    assert!(matches!(err, BoardError::NotFound { kind: "scenario", id: 42 }));
    assert_eq!(session.scenario_id, 0);

    Ok(())
}

#[tokio::test]
async fn test_project_delete_cascades() -> anyhow::Result<()> {
    // 1. Build P -> {S1 -> {T1, T2}, S2 -> {T3}} plus an unrelated project
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;
    let (project, s1) = select_new_scenario(&board, &mut session).await?;
    board.create_task(&session, "T1", "", Priority::Low, 1.0, None).await?;
    board.create_task(&session, "T2", "", Priority::Low, 1.0, None).await?;
    let s2 = board
        .create_scenario(&session, "S2", "", Priority::Low)
        .await?;
    board.select_scenario(&mut session, s2.id).await?;
    board.create_task(&session, "T3", "", Priority::Low, 1.0, None).await?;

    let keep = board.create_project(&NewProject::new("Keep", "")).await?;
    board.select_project(&mut session, keep.id).await?;
    let kept_scenario = board
        .create_scenario(&session, "Kept", "", Priority::Low)
        .await?;

    // 2. Delete the first project
    let removed = board.delete_project(project.id).await?;
    assert_eq!(removed.projects, 1);
    assert_eq!(removed.scenarios, 2);
    assert_eq!(removed.tasks, 3);

    // 3. Nothing referencing it is left
    let db = board.store();
    assert!(db.get_project(project.id).await?.is_none());
    assert!(db.get_scenarios_by_project_id(project.id).await?.is_empty());
    assert!(db.get_tasks_by_scenario_id(s1.id).await?.is_empty());
    assert!(db.get_tasks_by_scenario_id(s2.id).await?.is_empty());

    // 4. The other project is untouched
    assert_eq!(db.get_scenarios().await?, vec![kept_scenario]);

    // 5. Deleting it again is a not-found error
    assert!(matches!(
        board.delete_project(project.id).await,
        Err(BoardError::NotFound { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_scenario_delete_cascades() -> anyhow::Result<()> {
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;
    let (project, scenario) = select_new_scenario(&board, &mut session).await?;
    board.create_task(&session, "T1", "", Priority::Low, 1.0, None).await?;
    board.create_task(&session, "T2", "", Priority::Low, 1.0, None).await?;

    let removed = board.delete_scenario(scenario.id).await?;
    assert_eq!(removed.scenarios, 1);
    assert_eq!(removed.tasks, 2);
    assert!(board.tasks(scenario.id).await?.is_empty());
    assert!(board.project(project.id).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_board_update_task_ignores_workflow_fields() -> anyhow::Result<()> {
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;
    select_new_scenario(&board, &mut session).await?;
    let task = board
        .create_task(&session, "T", "", Priority::Low, 1.0, None)
        .await?;

    let sneaky = TaskUpdate {
        description: Some("Edited".to_string()),
        status: Some(Status::Done),
        owner_id: Some(Some(DEVELOPER_ID)),
        ..TaskUpdate::default()
    };
    let updated = board.update_task(task.id, &sneaky).await?;
    assert_eq!(updated.description, "Edited");
    assert_eq!(updated.status, Status::Todo);
    assert_eq!(updated.owner_id, None);

    Ok(())
}
