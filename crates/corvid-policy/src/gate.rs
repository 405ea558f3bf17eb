use corvid_core::types::UserId;

/// The closed set of tool names the gate will ever allow. Transport-side
/// actions (`send_voice_note`, `send_urls_as_image`) are handled directly by
/// the orchestrator and bypass this gate entirely — they are not members of
/// this set.
pub const TOOL_NAMES: [&str; 6] = [
    "store_person_memory",
    "store_self_memory",
    "store_community_memory",
    "remember_about_person",
    "remember_about_self",
    "remember_about_community",
];

/// Pure function over static inputs: an admin-id set and an allowed-id set
/// (empty = unrestricted). Holds no state of its own beyond those two lists,
/// so it never needs a lock or a database round-trip.
pub struct PolicyGate {
    admin_ids: Vec<i64>,
    allowed_ids: Vec<i64>,
}

impl PolicyGate {
    pub fn new(admin_ids: Vec<i64>, allowed_ids: Vec<i64>) -> Self {
        Self {
            admin_ids,
            allowed_ids,
        }
    }

    fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id.0)
    }

    fn is_in_public_allowlist(&self, tool_name: &str) -> bool {
        TOOL_NAMES.contains(&tool_name)
    }

    /// `true` iff the user is admin, or the user is on the allowed-ids list
    /// (or that list is empty, meaning "allow all"), and the tool name
    /// belongs to the public allow-list.
    pub fn is_tool_allowed(&self, user_id: UserId, tool_name: &str) -> bool {
        if self.is_admin(user_id) {
            return true;
        }
        if !self.allowed_ids.is_empty() && !self.allowed_ids.contains(&user_id.0) {
            return false;
        }
        self.is_in_public_allowlist(tool_name)
    }

    /// The list of tool names this user may invoke right now.
    pub fn allowed_tools(&self, user_id: UserId) -> Vec<&'static str> {
        TOOL_NAMES
            .iter()
            .copied()
            .filter(|name| self.is_tool_allowed(user_id, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_admin_gets_exactly_the_six_public_tools() {
        let gate = PolicyGate::new(vec![], vec![]);
        let allowed = gate.allowed_tools(UserId(1));
        assert_eq!(allowed.len(), 6);
        for name in TOOL_NAMES {
            assert!(allowed.contains(&name));
        }
    }

    #[test]
    fn admin_is_allowed_any_tool_name() {
        let gate = PolicyGate::new(vec![7], vec![]);
        assert!(gate.is_tool_allowed(UserId(7), "anything_goes"));
    }

    #[test]
    fn non_admin_denied_unlisted_tool() {
        let gate = PolicyGate::new(vec![], vec![]);
        assert!(!gate.is_tool_allowed(UserId(1), "send_voice_note"));
        assert!(!gate.is_tool_allowed(UserId(1), "delete_everything"));
    }

    #[test]
    fn non_empty_allowlist_restricts_unlisted_users() {
        let gate = PolicyGate::new(vec![], vec![42]);
        assert!(gate.is_tool_allowed(UserId(42), "store_self_memory"));
        assert!(!gate.is_tool_allowed(UserId(99), "store_self_memory"));
    }

    #[test]
    fn empty_allowlist_means_allow_all() {
        let gate = PolicyGate::new(vec![], vec![]);
        assert!(gate.is_tool_allowed(UserId(999), "remember_about_self"));
    }
}
