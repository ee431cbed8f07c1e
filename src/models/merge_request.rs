//! Merge request model and the rotation decision functions.

use std::collections::HashSet;
use std::fmt;

use crate::models::comment::Comment;
use crate::models::reviewer_panel::ReviewerPanel;
use crate::models::user::User;

/// Approval state of a merge request relative to the reviewer panel.
///
/// Recomputed from the current approvals on every cycle, never persisted.
/// The `Display` form is the wire/log spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    /// No approvals at all (or no panel to compare against).
    None,
    /// Approvals exist but none of them came from a panel member.
    Unknown,
    /// The last panel-member approval came from self.
    SelfApproved,
    /// The last panel-member approval came from another panel member.
    Others,
    /// Every panel member has approved, detected through the `Others` path.
    All,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NO"),
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::SelfApproved => write!(f, "SELF"),
            Self::Others => write!(f, "OTHERS"),
            Self::All => write!(f, "ALL"),
        }
    }
}

/// What the rotation selector wants done with the reviewer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAction {
    /// Hand the reviewer slot to this panel member.
    Assign(i64),
    /// Every panel member has approved; clear the reviewer slot.
    Unassign,
    /// Nothing to rotate.
    NoAction,
}

/// A GitLab merge request with the data the rotation needs.
///
/// Constructed by the GitLab collaborator; immutable afterwards.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Project-scoped MR number (GitLab `iid`).
    pub id: i64,

    /// GitLab project ID.
    pub project_id: i64,

    /// Draft flag. List queries already exclude drafts server-side.
    pub draft: bool,

    /// MR author.
    pub author: User,

    /// Currently assigned assignee, if any.
    pub assignee: Option<User>,

    /// Currently assigned reviewer, if any.
    pub reviewer: Option<User>,

    /// Approvals in the order GitLab reports them. The arrival order is
    /// semantically significant: it decides the terminal classifier branch.
    pub approvals: Vec<User>,

    /// Branch summary, e.g. "feature to main".
    pub branches: String,

    /// URL to the MR in the GitLab web UI.
    pub link: String,

    /// Discussion comments, for downstream display only.
    pub comments: Vec<Comment>,
}

impl MergeRequest {
    /// Uniqueness key, `"<project_id>-<id>"`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.project_id, self.id)
    }

    /// Classify this MR's approvals against the panel.
    ///
    /// The approvals list is scanned in arrival order. Each approver that
    /// belongs to the panel counts toward coverage and sets the working
    /// status to `SelfApproved` or `Others`; the last panel-member approval
    /// wins. Full coverage upgrades `Others` to `All`; a terminal
    /// `SelfApproved` is never upgraded, even when coverage is complete.
    pub fn approval_status(&self, panel: &ReviewerPanel) -> ApprovalStatus {
        if self.approvals.is_empty() || panel.is_empty() {
            return ApprovalStatus::None;
        }

        let mut status = ApprovalStatus::Unknown;
        let mut remaining = panel.len() as i64;

        for approver in &self.approvals {
            if panel.contains(approver.id) {
                remaining -= 1;

                status = if approver.id == panel.self_id() {
                    ApprovalStatus::SelfApproved
                } else {
                    ApprovalStatus::Others
                };
            }
        }

        if status == ApprovalStatus::Others && remaining == 0 {
            status = ApprovalStatus::All;
        }

        status
    }

    /// Pick the next reviewer in panel order.
    ///
    /// The first panel member without an approval on record gets the slot.
    /// With no approvals at all the rotation starts at the panel's first
    /// slot (self). A fully covered panel means the slot should be cleared.
    pub fn next_reviewer(&self, panel: &ReviewerPanel) -> RotationAction {
        if panel.is_empty() {
            return RotationAction::NoAction;
        }

        if self.approvals.is_empty() {
            return RotationAction::Assign(panel.self_id());
        }

        let mut remaining = panel.len() as i64;

        for &reviewer in panel.ids() {
            if !self.approvals.iter().any(|a| a.id == reviewer) {
                return RotationAction::Assign(reviewer);
            }

            remaining -= 1;
        }

        if remaining == 0 {
            return RotationAction::Unassign;
        }

        RotationAction::NoAction
    }
}

/// Merge N merge-request lists into one, dropping duplicate keys.
///
/// The first occurrence of a `(project_id, id)` pair wins; later duplicates
/// are discarded without reconciliation. The result is sorted by project ID
/// descending, then MR ID descending, for deterministic processing order.
pub fn merge_unique(lists: Vec<Vec<MergeRequest>>) -> Vec<MergeRequest> {
    let cap = lists.iter().map(Vec::len).sum();

    let mut merged: Vec<MergeRequest> = Vec::with_capacity(cap);
    let mut seen: HashSet<(i64, i64)> = HashSet::with_capacity(cap);

    for list in lists {
        for mr in list {
            if seen.insert((mr.project_id, mr.id)) {
                merged.push(mr);
            }
        }
    }

    merged.sort_by(|a, b| {
        b.project_id
            .cmp(&a.project_id)
            .then_with(|| b.id.cmp(&a.id))
    });

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> User {
        User {
            id,
            name: format!("user-{}", id),
            username: format!("user{}", id),
        }
    }

    fn mr_with_approvals(approver_ids: &[i64]) -> MergeRequest {
        MergeRequest {
            id: 1,
            project_id: 1,
            draft: false,
            author: user(100),
            assignee: None,
            reviewer: None,
            approvals: approver_ids.iter().copied().map(user).collect(),
            branches: "feature to main".into(),
            link: "https://gitlab.example.com/group/project/-/merge_requests/1".into(),
            comments: Vec::new(),
        }
    }

    fn mr_at(project_id: i64, id: i64) -> MergeRequest {
        let mut mr = mr_with_approvals(&[]);
        mr.project_id = project_id;
        mr.id = id;
        mr
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ApprovalStatus::None.to_string(), "NO");
        assert_eq!(ApprovalStatus::Unknown.to_string(), "UNKNOWN");
        assert_eq!(ApprovalStatus::SelfApproved.to_string(), "SELF");
        assert_eq!(ApprovalStatus::Others.to_string(), "OTHERS");
        assert_eq!(ApprovalStatus::All.to_string(), "ALL");
    }

    #[test]
    fn test_key_format() {
        assert_eq!(mr_at(2, 17).key(), "2-17");
    }

    #[test]
    fn test_classify_is_total() {
        let panel = ReviewerPanel::new(1, &[]);
        assert_eq!(
            mr_with_approvals(&[]).approval_status(&panel),
            ApprovalStatus::None
        );
        assert_eq!(
            mr_with_approvals(&[1]).approval_status(&ReviewerPanel::default()),
            ApprovalStatus::None
        );
    }

    #[test]
    fn test_classify_unknown_when_no_approver_on_panel() {
        assert_eq!(
            mr_with_approvals(&[4]).approval_status(&ReviewerPanel::new(1, &[])),
            ApprovalStatus::Unknown
        );
        assert_eq!(
            mr_with_approvals(&[4]).approval_status(&ReviewerPanel::new(1, &[2, 3])),
            ApprovalStatus::Unknown
        );
    }

    #[test]
    fn test_classify_self_and_others() {
        assert_eq!(
            mr_with_approvals(&[1]).approval_status(&ReviewerPanel::new(1, &[])),
            ApprovalStatus::SelfApproved
        );
        assert_eq!(
            mr_with_approvals(&[1, 2]).approval_status(&ReviewerPanel::new(2, &[4])),
            ApprovalStatus::SelfApproved
        );
        assert_eq!(
            mr_with_approvals(&[1, 3]).approval_status(&ReviewerPanel::new(4, &[3])),
            ApprovalStatus::Others
        );
        assert_eq!(
            mr_with_approvals(&[1, 2, 3]).approval_status(&ReviewerPanel::new(4, &[3])),
            ApprovalStatus::Others
        );
    }

    #[test]
    fn test_classify_last_matching_approver_wins() {
        // The approvals arrival order, not the panel order, decides the
        // terminal branch: a later self-approval overrides an earlier match
        // by another panel member, and vice versa.
        let panel = ReviewerPanel::new(2, &[3]);
        assert_eq!(
            mr_with_approvals(&[3, 2]).approval_status(&panel),
            ApprovalStatus::SelfApproved
        );
        assert_eq!(
            mr_with_approvals(&[2, 3]).approval_status(&panel),
            ApprovalStatus::All
        );
    }

    #[test]
    fn test_classify_full_coverage() {
        let panel = ReviewerPanel::new(2, &[3, 1]);
        assert_eq!(
            mr_with_approvals(&[1, 2, 3]).approval_status(&panel),
            ApprovalStatus::All
        );
        assert_eq!(
            mr_with_approvals(&[1, 2, 3, 4]).approval_status(&panel),
            ApprovalStatus::All
        );
    }

    #[test]
    fn test_classify_full_coverage_not_reached_through_self() {
        // Identical approver sets, different arrival order: when self's
        // approval arrives last, the result stays SELF instead of ALL. The
        // asymmetry is load-bearing downstream: the change-detection cache
        // only resets on ALL.
        let panel = ReviewerPanel::new(2, &[3, 1]);
        assert_eq!(
            mr_with_approvals(&[1, 2, 3]).approval_status(&panel),
            ApprovalStatus::All
        );
        assert_eq!(
            mr_with_approvals(&[1, 3, 2]).approval_status(&panel),
            ApprovalStatus::SelfApproved
        );
    }

    #[test]
    fn test_next_reviewer_starts_at_self() {
        assert_eq!(
            mr_with_approvals(&[]).next_reviewer(&ReviewerPanel::new(1, &[2, 3])),
            RotationAction::Assign(1)
        );
    }

    #[test]
    fn test_next_reviewer_walks_panel_order() {
        let panel = ReviewerPanel::new(1, &[2, 3]);
        assert_eq!(
            mr_with_approvals(&[1]).next_reviewer(&panel),
            RotationAction::Assign(2)
        );
        assert_eq!(
            mr_with_approvals(&[1, 3]).next_reviewer(&panel),
            RotationAction::Assign(2)
        );
        assert_eq!(
            mr_with_approvals(&[1, 2]).next_reviewer(&panel),
            RotationAction::Assign(3)
        );
    }

    #[test]
    fn test_next_reviewer_unassigns_when_covered() {
        assert_eq!(
            mr_with_approvals(&[1, 2, 3]).next_reviewer(&ReviewerPanel::new(1, &[2, 3])),
            RotationAction::Unassign
        );
        assert_eq!(
            mr_with_approvals(&[1]).next_reviewer(&ReviewerPanel::new(1, &[])),
            RotationAction::Unassign
        );
        // Approvals from outside the panel don't block the unassign.
        assert_eq!(
            mr_with_approvals(&[1, 2, 3]).next_reviewer(&ReviewerPanel::new(1, &[3])),
            RotationAction::Unassign
        );
    }

    #[test]
    fn test_next_reviewer_empty_panel() {
        assert_eq!(
            mr_with_approvals(&[1]).next_reviewer(&ReviewerPanel::default()),
            RotationAction::NoAction
        );
    }

    #[test]
    fn test_merge_collapses_duplicates() {
        let a = mr_at(1, 3);
        let merged = merge_unique(vec![
            vec![a.clone(), a.clone()],
            vec![a.clone(), a.clone()],
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key(), "1-3");
    }

    #[test]
    fn test_merge_orders_by_project_then_id_descending() {
        let merged = merge_unique(vec![
            vec![mr_at(2, 1), mr_at(2, 2)],
            vec![mr_at(1, 3), mr_at(2, 1)],
        ]);

        let keys: Vec<String> = merged.iter().map(MergeRequest::key).collect();
        assert_eq!(keys, vec!["2-2", "2-1", "1-3"]);
    }

    #[test]
    fn test_merge_first_occurrence_wins() {
        let mut first = mr_at(5, 9);
        first.branches = "first to main".into();
        let mut later = mr_at(5, 9);
        later.branches = "later to main".into();

        let merged = merge_unique(vec![vec![first], vec![later]]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].branches, "first to main");
    }
}
