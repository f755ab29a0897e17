//! Task status workflow.
//!
//! Status only moves forward (`todo` → `in progress` → `done`, or straight to
//! `done`), never without an owner. Leaving `todo` stamps the start date and
//! entering `done` stamps the end date, each only if it is still unset.
//! Everything here is pure: callers pass the current time and persist the
//! returned task themselves.

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::db::{Status, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The task has no owner yet.
    #[error("An owner must be assigned before changing the status.")]
    Unassigned,
    /// The requested status lies behind the current one.
    #[error("You cannot regress the status of this task (from {from} to {to}).")]
    Regression { from: Status, to: Status },
    /// The user declined the confirmation prompt.
    #[error("The status change was not confirmed.")]
    NotConfirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The change is legal; the task carries the new status and dates.
    Accepted(Task),
    /// The task already has the requested status.
    Unchanged(Task),
    /// The change is illegal; the task is returned as it was.
    Rejected { task: Task, reason: Rejection },
}

impl StatusChange {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StatusChange::Accepted(_))
    }

    pub fn task(&self) -> &Task {
        match self {
            StatusChange::Accepted(task)
            | StatusChange::Unchanged(task)
            | StatusChange::Rejected { task, .. } => task,
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            StatusChange::Accepted(task)
            | StatusChange::Unchanged(task)
            | StatusChange::Rejected { task, .. } => task,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            StatusChange::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Decide whether `task` may move to `requested`.
pub fn attempt_status_change(task: &Task, requested: Status, now: OffsetDateTime) -> StatusChange {
    if task.status == requested {
        return StatusChange::Unchanged(task.clone());
    }
    if !task.is_assigned() {
        return StatusChange::Rejected {
            task: task.clone(),
            reason: Rejection::Unassigned,
        };
    }
    if requested.rank() < task.status.rank() {
        return StatusChange::Rejected {
            task: task.clone(),
            reason: Rejection::Regression {
                from: task.status,
                to: requested,
            },
        };
    }

    let mut next = task.clone();
    next.status = requested;
    stamp_dates(&mut next, now);
    StatusChange::Accepted(next)
}

/// Give `task` a new owner. A `todo` task starts as if it had been moved to
/// `in progress`; tasks further along keep their status and dates.
pub fn assign_owner(task: &Task, owner_id: i64, now: OffsetDateTime) -> Task {
    let mut next = task.clone();
    next.owner_id = Some(owner_id);
    if next.status == Status::Todo {
        next.status = Status::InProgress;
        stamp_dates(&mut next, now);
    }
    next
}

fn stamp_dates(task: &mut Task, now: OffsetDateTime) {
    if task.status != Status::Todo && task.start_date.is_none() {
        task.start_date = Some(now);
    }
    if task.status == Status::Done && task.end_date.is_none() {
        task.end_date = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::core::db::Priority;

    fn task(status: Status, owner_id: Option<i64>) -> Task {
        Task {
            id: 10,
            scenario_id: 20,
            owner_id,
            name: "Write release notes".to_string(),
            description: String::new(),
            priority: Priority::Medium,
            status,
            estimated_time: 2.5,
            creation_date: datetime!(2025-03-01 09:00 UTC),
            start_date: None,
            end_date: None,
            _guard: (),
        }
    }

    const NOW: OffsetDateTime = datetime!(2025-03-02 12:30 UTC);

    #[test]
    fn test_unassigned_task_cannot_move() {
        let original = task(Status::Todo, None);
        for requested in [Status::InProgress, Status::Done] {
            let change = attempt_status_change(&original, requested, NOW);
            assert_eq!(change.rejection(), Some(Rejection::Unassigned));
            assert_eq!(change.task(), &original);
        }
    }

    #[test]
    fn test_regressions_are_rejected() {
        let cases = [
            (Status::InProgress, Status::Todo),
            (Status::Done, Status::Todo),
            (Status::Done, Status::InProgress),
        ];
        for (from, to) in cases {
            let original = task(from, Some(2));
            let change = attempt_status_change(&original, to, NOW);
            assert_eq!(change.rejection(), Some(Rejection::Regression { from, to }));
            assert_eq!(change.into_task().status, from);
        }
    }

    #[test]
    fn test_start_sets_start_date_once() {
        let mut original = task(Status::Todo, Some(2));
        let change = attempt_status_change(&original, Status::InProgress, NOW);
        assert!(change.is_accepted());
        assert_eq!(change.task().start_date, Some(NOW));
        assert_eq!(change.task().end_date, None);

        let earlier = datetime!(2025-03-01 10:00 UTC);
        original.start_date = Some(earlier);
        let change = attempt_status_change(&original, Status::InProgress, NOW);
        assert_eq!(change.task().start_date, Some(earlier));
    }

    #[test]
    fn test_todo_straight_to_done_stamps_both_dates() {
        let original = task(Status::Todo, Some(3));
        let done = attempt_status_change(&original, Status::Done, NOW).into_task();
        assert_eq!(done.status, Status::Done);
        assert_eq!(done.start_date, Some(NOW));
        assert_eq!(done.end_date, Some(NOW));
    }

    #[test]
    fn test_done_twice_keeps_end_date() {
        let original = task(Status::InProgress, Some(2));
        let done = attempt_status_change(&original, Status::Done, NOW).into_task();
        assert_eq!(done.end_date, Some(NOW));

        let later = datetime!(2025-03-05 08:00 UTC);
        let again = attempt_status_change(&done, Status::Done, later);
        assert!(matches!(again, StatusChange::Unchanged(_)));
        assert_eq!(again.task().end_date, Some(NOW));
    }

    #[test]
    fn test_assigning_todo_task_starts_it() {
        let original = task(Status::Todo, None);
        let assigned = assign_owner(&original, 2, NOW);
        assert_eq!(assigned.owner_id, Some(2));
        assert_eq!(assigned.status, Status::InProgress);
        assert_eq!(assigned.start_date, Some(NOW));
        assert_eq!(original.owner_id, None);
    }

    #[test]
    fn test_reassigning_done_task_keeps_status() {
        let mut original = task(Status::Done, Some(2));
        original.start_date = Some(datetime!(2025-03-01 10:00 UTC));
        original.end_date = Some(datetime!(2025-03-01 11:00 UTC));
        let reassigned = assign_owner(&original, 3, NOW);
        assert_eq!(reassigned.owner_id, Some(3));
        assert_eq!(reassigned.status, Status::Done);
        assert_eq!(reassigned.start_date, original.start_date);
        assert_eq!(reassigned.end_date, original.end_date);
    }
}
