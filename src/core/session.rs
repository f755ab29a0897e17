use crate::{
    core::db::{SelectionKind, SelectionRepository},
    error::{BoardError, BoardResult},
};

/// Who is working and on what. 0 means nothing is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub project_id: i64,
    pub scenario_id: i64,
    pub task_id: i64,
}

impl Session {
    /// Restore the pointers persisted by the store.
    pub async fn load<S: SelectionRepository>(store: &S) -> anyhow::Result<Self> {
        Ok(Self {
            user_id: store.get_current_id(SelectionKind::User).await?,
            project_id: store.get_current_id(SelectionKind::Project).await?,
            scenario_id: store.get_current_id(SelectionKind::Scenario).await?,
            task_id: store.get_current_id(SelectionKind::Task).await?,
        })
    }

    pub fn get(&self, kind: SelectionKind) -> i64 {
        match kind {
            SelectionKind::Project => self.project_id,
            SelectionKind::Scenario => self.scenario_id,
            SelectionKind::Task => self.task_id,
            SelectionKind::User => self.user_id,
        }
    }

    pub(crate) fn set(&mut self, kind: SelectionKind, id: i64) {
        match kind {
            SelectionKind::Project => self.project_id = id,
            SelectionKind::Scenario => self.scenario_id = id,
            SelectionKind::Task => self.task_id = id,
            SelectionKind::User => self.user_id = id,
        }
    }

    /// The selected id of `kind`, or [`BoardError::NothingSelected`].
    pub fn require(&self, kind: SelectionKind) -> BoardResult<i64> {
        match self.get(kind) {
            0 => Err(BoardError::NothingSelected(kind)),
            id => Ok(id),
        }
    }

    pub fn require_user(&self) -> BoardResult<i64> {
        match self.user_id {
            0 => Err(BoardError::NotLoggedIn),
            id => Ok(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_reports_missing_selection() {
        let session = Session {
            project_id: 7,
            ..Session::default()
        };
        assert_eq!(session.require(SelectionKind::Project).unwrap(), 7);

        let err = session.require(SelectionKind::Scenario).unwrap_err();
        assert_eq!(err.to_string(), "No scenario selected.");
        assert!(matches!(session.require_user(), Err(BoardError::NotLoggedIn)));
    }
}
