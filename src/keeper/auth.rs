//! Who may do what.

use std::collections::HashSet;

/// Privileged operations. Completing checklist items is open to everyone and
/// therefore not listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenMenu,
    ListChats,
    ChatStats,
    ListUsers,
    Send,
    Pin,
    Summary,
    CreateChecklist,
}

/// Flat allow-list of administrator user IDs.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList {
    admins: HashSet<i64>,
}

impl AdminAllowList {
    pub fn new(admins: impl IntoIterator<Item = i64>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Every action is currently granted to every admin and to no one else.
    pub fn is_authorized(&self, user_id: i64, _action: Action) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_listed_users_are_authorized() {
        let admins = AdminAllowList::new([1, 2]);
        assert!(admins.is_authorized(1, Action::Send));
        assert!(admins.is_authorized(2, Action::Summary));
        assert!(!admins.is_authorized(3, Action::OpenMenu));
    }

    #[test]
    fn test_empty_list_denies_everyone() {
        let admins = AdminAllowList::default();
        assert!(admins.is_empty());
        assert!(!admins.is_authorized(0, Action::ListUsers));
    }
}
