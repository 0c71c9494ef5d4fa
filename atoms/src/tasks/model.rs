use serde::{Deserialize, Serialize};

/// Task domain model. `completion_date` is present only while the task
/// is completed; `assigned_to` is absent for unassigned tasks.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    pub task_id: String,
    pub board_id: String,
    pub title: String,
    pub due_date: String,
    pub created_by: String,
    pub created_at: String,
    pub completed: bool,
    pub completion_date: Option<String>,
    pub assigned_to: Option<String>,
}

impl Task {
    /// Unassigned is derived at read time against the current member
    /// set: no assignee, or an assignee who has since left the board.
    pub fn is_unassigned(&self, member_ids: &[String]) -> bool {
        match &self.assigned_to {
            Some(assignee) => !member_ids.iter().any(|id| id == assignee),
            None => true,
        }
    }

    /// State after a completion toggle: flipping to completed stamps
    /// the date, flipping back clears it.
    pub fn toggled(mut self, now: &str) -> Task {
        self.completed = !self.completed;
        self.completion_date = self.completed.then(|| now.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreateTaskPayload {
    pub title: String,
    pub due_date: String,
    pub assigned_to: Option<String>,
}

/// Full overwrite of the mutable task fields.
#[derive(Debug, Clone)]
pub struct UpdateTaskPayload {
    pub title: String,
    pub due_date: String,
    pub assigned_to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(assigned_to: Option<&str>) -> Task {
        Task {
            task_id: "t1".to_string(),
            board_id: "b1".to_string(),
            title: "Fix bug".to_string(),
            due_date: "2024-01-01".to_string(),
            created_by: "u1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            completed: false,
            completion_date: None,
            assigned_to: assigned_to.map(|s| s.to_string()),
        }
    }

    #[test]
    fn no_assignee_is_unassigned() {
        let members = vec!["u1".to_string(), "u2".to_string()];
        assert!(task(None).is_unassigned(&members));
    }

    #[test]
    fn current_member_assignee_is_assigned() {
        let members = vec!["u1".to_string(), "u2".to_string()];
        assert!(!task(Some("u2")).is_unassigned(&members));
    }

    #[test]
    fn departed_assignee_is_unassigned() {
        let members = vec!["u1".to_string()];
        assert!(task(Some("u2")).is_unassigned(&members));
    }

    #[test]
    fn toggle_stamps_completion_date() {
        let done = task(None).toggled("2024-02-01T00:00:00Z");
        assert!(done.completed);
        assert_eq!(done.completion_date.as_deref(), Some("2024-02-01T00:00:00Z"));
    }

    #[test]
    fn double_toggle_restores_active_state() {
        let original = task(None);
        let round_trip = original
            .clone()
            .toggled("2024-02-01T00:00:00Z")
            .toggled("2024-02-02T00:00:00Z");
        assert!(!round_trip.completed);
        assert!(round_trip.completion_date.is_none());
        assert_eq!(round_trip.title, original.title);
    }
}
