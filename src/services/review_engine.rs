//! Reviewer rotation engine.
//!
//! Runs the decision pipeline on a fixed interval: fetch open MRs from the
//! three query angles, merge them, classify each against the panel, pick
//! the next reviewer where rotation applies, and push the update, gated by
//! the change-detection store so each observed transition acts exactly once.

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::models::{merge_unique, ApprovalStatus, MergeRequest, ReviewerPanel, RotationAction};
use crate::services::gitlab_client::GitLabClient;
use crate::services::status_store::{StatusItem, StatusStore};

/// Default seconds between polling cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// What the pipeline intends to do with one merge request this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CyclePlan {
    /// Nothing to do and nothing worth recording.
    Skip,
    /// Record the status for change visibility; no reviewer update.
    Record,
    /// Record the status and, when it is new information, set the reviewer
    /// slot to this user (`None` clears the slot).
    Rotate(Option<i64>),
}

/// Decide what to do with a merge request, given the panel.
///
/// Rotation only applies when the terminal status is `SELF` or `ALL`. A
/// fully covered MR whose reviewer slot is already empty is skipped
/// outright: there is nothing to undo, so nothing is recorded either.
/// Every other status is recorded so a transition shows up in the log even
/// without a reassignment.
fn plan(mr: &MergeRequest, panel: &ReviewerPanel) -> (ApprovalStatus, CyclePlan) {
    let status = mr.approval_status(panel);

    let plan = match status {
        ApprovalStatus::SelfApproved | ApprovalStatus::All => match mr.next_reviewer(panel) {
            RotationAction::Assign(id) => CyclePlan::Rotate(Some(id)),
            RotationAction::Unassign => {
                if mr.reviewer.is_none() {
                    CyclePlan::Skip
                } else {
                    CyclePlan::Rotate(None)
                }
            }
            RotationAction::NoAction => CyclePlan::Skip,
        },
        ApprovalStatus::None | ApprovalStatus::Unknown | ApprovalStatus::Others => {
            CyclePlan::Record
        }
    };

    (status, plan)
}

/// The rotation engine: one GitLab client, one panel, one status store.
pub struct ReviewEngine {
    client: GitLabClient,
    panel: ReviewerPanel,
    store: StatusStore,
}

impl ReviewEngine {
    /// Create an engine with a fresh status store.
    pub fn new(client: GitLabClient, panel: ReviewerPanel) -> Self {
        Self {
            client,
            panel,
            store: StatusStore::new(),
        }
    }

    /// Run the rotation loop until cancelled.
    ///
    /// Cycles never overlap: the next tick is only consumed after the
    /// previous cycle fully returns.
    pub async fn run(&self, poll_interval: Duration, cancel: CancellationToken) {
        log::info!(
            "[review] starting rotation loop, interval={}s",
            poll_interval.as_secs()
        );

        self.run_cycle(&cancel).await;

        let mut interval = time::interval(poll_interval);
        // Consume the first (immediate) tick since we just ran a cycle
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.run_cycle(&cancel).await,
                _ = cancel.cancelled() => {
                    log::info!("[review] rotation loop stopped");
                    return;
                }
            }
        }
    }

    /// Run a single polling cycle.
    ///
    /// A failure fetching any of the three lists aborts the whole cycle;
    /// a failed reviewer update is logged and the cycle moves on. The
    /// cancellation token is checked before each collaborator call, never
    /// mid-call.
    pub async fn run_cycle(&self, cancel: &CancellationToken) {
        let self_id = self.panel.self_id();

        if cancel.is_cancelled() {
            return;
        }
        let by_author = match self.client.list_by_author(self_id).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("[review] merge requests list (by author) error: {}", e);
                return;
            }
        };

        if cancel.is_cancelled() {
            return;
        }
        let by_reviewer = match self.client.list_by_reviewer(self_id).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("[review] merge requests list (by reviewer) error: {}", e);
                return;
            }
        };

        if cancel.is_cancelled() {
            return;
        }
        let by_assignee = match self.client.list_by_assignee(self_id).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("[review] merge requests list (by assignee) error: {}", e);
                return;
            }
        };

        for mr in merge_unique(vec![by_author, by_reviewer, by_assignee]) {
            let key = mr.key();
            let (status, cycle_plan) = plan(&mr, &self.panel);

            let approval_ids: Vec<i64> = mr.approvals.iter().map(|user| user.id).collect();
            log::debug!(
                "[review] {}: status={} approvals={:?} reviewer={:?} assignee={:?} url={}",
                key,
                status,
                approval_ids,
                mr.reviewer.as_ref().map(|user| user.id),
                mr.assignee.as_ref().map(|user| user.id),
                mr.link
            );

            match cycle_plan {
                CyclePlan::Skip => {}
                CyclePlan::Record => {
                    let item = StatusItem {
                        key: key.clone(),
                        status,
                    };
                    if self.store.offer(&item) {
                        log::info!("[review] {} now {} ({})", key, status, mr.link);
                    }
                }
                CyclePlan::Rotate(reviewer) => {
                    if cancel.is_cancelled() {
                        return;
                    }

                    let item = StatusItem {
                        key: key.clone(),
                        status,
                    };
                    if self.store.offer(&item) {
                        match reviewer {
                            Some(id) => log::info!(
                                "[review] assign new reviewer {} on {} (status {}, {})",
                                id,
                                key,
                                status,
                                mr.link
                            ),
                            None => log::info!(
                                "[review] unassign reviewer on {} (status {}, {})",
                                key,
                                status,
                                mr.link
                            ),
                        }

                        if let Err(e) = self
                            .client
                            .update_reviewer(mr.project_id, mr.id, reviewer)
                            .await
                        {
                            log::error!("[review] update merge request {} error: {}", key, e);
                        }
                    }
                }
            }
        }
    }
}
