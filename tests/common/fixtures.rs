use taskboard::{
    Session, TaskBoard, TrackerStore,
    auth::TokenKeys,
    core::db::{BoardDb, NewProject, Priority, Project, Scenario},
};

pub fn test_keys() -> TokenKeys {
    TokenKeys::new("test-token-secret", "test-refresh-secret")
}

/// Creates a BoardDb backed by a board file in a temporary directory.
/// Returns both the board and the temp directory (which must be kept alive).
pub async fn create_test_board() -> (BoardDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("test.board");
    let db = BoardDb::open(&path, test_keys())
        .await
        .expect("Failed to create test board");
    (db, dir)
}

/// Same as [`create_test_board`], wrapped in a TaskBoard with the default
/// users seeded.
pub async fn create_task_board() -> (TaskBoard<BoardDb>, tempfile::TempDir) {
    let (db, dir) = create_test_board().await;
    let board = TaskBoard::new(db);
    board
        .seed_default_users()
        .await
        .expect("Failed to seed users");
    (board, dir)
}

/// Creates a project with one scenario and selects both.
pub async fn select_new_scenario<S: TrackerStore>(
    board: &TaskBoard<S>,
    session: &mut Session,
) -> anyhow::Result<(Project, Scenario)> {
    let project = board
        .create_project(&NewProject::new("P1", "First project"))
        .await?;
    board.select_project(session, project.id).await?;
    let scenario = board
        .create_scenario(session, "S1", "First scenario", Priority::Medium)
        .await?;
    board.select_scenario(session, scenario.id).await?;
    Ok((project, scenario))
}

/// Confirmation that accepts everything.
pub fn always(_prompt: &str) -> bool {
    true
}

/// Confirmation that declines everything.
pub fn never(_prompt: &str) -> bool {
    false
}

/// Default user ids created by `seed_default_users`.
pub const ADMIN_ID: i64 = 1;
pub const DEVELOPER_ID: i64 = 2;
pub const DEVOPS_ID: i64 = 3;
