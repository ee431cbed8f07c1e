//! The configured reviewer rotation panel.

/// Ordered list of reviewer IDs the rotation walks through.
///
/// Index 0 is always the daemon's own identity ("self"), the account the
/// rotation acts as. The order of the remaining entries is the rotation
/// order, not a display choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewerPanel {
    ids: Vec<i64>,
}

impl ReviewerPanel {
    /// Build a panel from the self ID and the remaining rotation candidates.
    ///
    /// The resulting panel is never empty: `self_id` always lands at index 0.
    pub fn new(self_id: i64, others: &[i64]) -> Self {
        let mut ids = Vec::with_capacity(1 + others.len());
        ids.push(self_id);
        ids.extend_from_slice(others);

        Self { ids }
    }

    /// The daemon's own identity, or 0 for an empty (default) panel.
    pub fn self_id(&self) -> i64 {
        self.ids.first().copied().unwrap_or(0)
    }

    /// Panel IDs in rotation order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Number of panel members.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the panel has no members.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` belongs to the panel.
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_is_always_first() {
        let panel = ReviewerPanel::new(2, &[3, 1]);
        assert_eq!(panel.self_id(), 2);
        assert_eq!(panel.ids(), &[2, 3, 1]);
        assert_eq!(panel.len(), 3);
    }

    #[test]
    fn test_self_only_panel() {
        let panel = ReviewerPanel::new(5, &[]);
        assert_eq!(panel.self_id(), 5);
        assert_eq!(panel.len(), 1);
        assert!(!panel.is_empty());
    }

    #[test]
    fn test_default_panel_is_empty() {
        let panel = ReviewerPanel::default();
        assert!(panel.is_empty());
        assert_eq!(panel.self_id(), 0);
        assert!(!panel.contains(0));
    }
}
