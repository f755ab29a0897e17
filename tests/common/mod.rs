mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from taskboard for tests
pub use taskboard::core::db::{
    AuthRepository, BoardDb, NewProject, NewScenario, NewTask, NewUser, Priority, Project,
    ProjectRepository, ProjectUpdate, Role, Scenario, ScenarioRepository, ScenarioUpdate,
    SelectionKind, SelectionRepository, Status, Task, TaskRepository, TaskUpdate, User,
    UserRepository, UserUpdate,
};
pub use taskboard::{Session, StatusChange, TaskBoard};
