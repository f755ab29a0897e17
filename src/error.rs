use thiserror::Error;

use crate::core::db::{Role, SelectionKind};

/// Failures of board operations. Workflow rejections are not errors; they come
/// back as [`crate::core::workflow::StatusChange::Rejected`].
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("{}", nothing_selected(*.0))]
    NothingSelected(SelectionKind),

    #[error("Not logged in. Run `taskboard login` first.")]
    NotLoggedIn,

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("{username} is {role} and cannot own tasks")]
    CannotOwnTasks { username: String, role: Role },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl BoardError {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        BoardError::NotFound { kind, id }
    }
}

fn nothing_selected(kind: SelectionKind) -> &'static str {
    match kind {
        SelectionKind::Project => "No project selected. Please select a project first.",
        SelectionKind::Scenario => "No scenario selected.",
        SelectionKind::Task => "No task selected.",
        SelectionKind::User => "No user selected.",
    }
}

pub type BoardResult<T> = Result<T, BoardError>;
