use serde::{Deserialize, Serialize};

pub const ROLE_CREATOR: &str = "creator";
pub const ROLE_MEMBER: &str = "member";

/// Board metadata document.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Board {
    pub board_id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: String,
}

impl Board {
    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }
}

/// Membership join item: one per (board, user) pair. Adding and removing
/// a member are single-item writes, so concurrent membership changes
/// cannot clobber each other.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Membership {
    pub board_id: String,
    pub user_id: String,
    pub role: String,
    pub added_at: String,
}

impl Membership {
    pub fn is_creator(&self) -> bool {
        self.role == ROLE_CREATOR
    }
}

/// A board may be deleted only while its creator is the sole member and
/// no task references it.
pub fn deletable(member_count: usize, has_tasks: bool) -> bool {
    member_count == 1 && !has_tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_check() {
        let board = Board {
            board_id: "b1".to_string(),
            name: "Sprint 1".to_string(),
            creator_id: "u1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        assert!(board.is_creator("u1"));
        assert!(!board.is_creator("u2"));
    }

    #[test]
    fn deletable_requires_sole_creator_and_no_tasks() {
        assert!(deletable(1, false));
        assert!(!deletable(1, true));
        assert!(!deletable(2, false));
        assert!(!deletable(2, true));
    }

    #[test]
    fn membership_role() {
        let m = Membership {
            board_id: "b1".to_string(),
            user_id: "u1".to_string(),
            role: ROLE_CREATOR.to_string(),
            added_at: String::new(),
        };
        assert!(m.is_creator());

        let m = Membership {
            role: ROLE_MEMBER.to_string(),
            ..m
        };
        assert!(!m.is_creator());
    }
}
