//! Change-detection store for per-MR approval statuses.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::ApprovalStatus;

/// One observation: a merge request key and its freshly computed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    /// Merge request key, `"<project_id>-<id>"`.
    pub key: String,

    /// Status computed for this cycle.
    pub status: ApprovalStatus,
}

/// Last-notified status per merge request.
///
/// [`offer`](StatusStore::offer) gatekeeps actions across polling cycles: it
/// answers "is this new information?" and records the status so the same
/// observation is acted on exactly once. Entries live for the process
/// lifetime only.
///
/// The map is mutex-guarded so the store stays correct even if cycles ever
/// run concurrently; the current scheduler drives it from one task at a time.
#[derive(Debug, Default)]
pub struct StatusStore {
    statuses: Mutex<HashMap<String, ApprovalStatus>>,
}

impl StatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an observation; returns whether it is new information.
    ///
    /// A key seen for the first time, or seen with a different status than
    /// last time, returns `true`. Re-offering the stored status returns
    /// `false`. An `All` status deletes the entry instead of storing it, so
    /// any later regression on that MR is reported fresh; the store never
    /// holds an `All` entry.
    pub fn offer(&self, item: &StatusItem) -> bool {
        let mut statuses = self
            .statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let save = match statuses.get(&item.key) {
            Some(previous) => *previous != item.status,
            None => true,
        };

        if save {
            if item.status == ApprovalStatus::All {
                statuses.remove(&item.key);
            } else {
                statuses.insert(item.key.clone(), item.status);
            }
        }

        save
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, status: ApprovalStatus) -> StatusItem {
        StatusItem {
            key: key.into(),
            status,
        }
    }

    #[test]
    fn test_offer_is_idempotent_per_status() {
        let store = StatusStore::new();

        assert!(store.offer(&item("1-1", ApprovalStatus::SelfApproved)));
        assert!(!store.offer(&item("1-1", ApprovalStatus::SelfApproved)));
        assert!(!store.offer(&item("1-1", ApprovalStatus::SelfApproved)));
    }

    #[test]
    fn test_offer_reports_status_changes() {
        let store = StatusStore::new();

        assert!(store.offer(&item("1-1", ApprovalStatus::None)));
        assert!(store.offer(&item("1-1", ApprovalStatus::Others)));
        assert!(!store.offer(&item("1-1", ApprovalStatus::Others)));
        assert!(store.offer(&item("1-1", ApprovalStatus::SelfApproved)));
    }

    #[test]
    fn test_keys_are_independent() {
        let store = StatusStore::new();

        assert!(store.offer(&item("1-1", ApprovalStatus::Others)));
        assert!(store.offer(&item("2-1", ApprovalStatus::Others)));
        assert!(!store.offer(&item("1-1", ApprovalStatus::Others)));
    }

    #[test]
    fn test_full_coverage_resets_the_key() {
        let store = StatusStore::new();

        assert!(store.offer(&item("1-1", ApprovalStatus::Others)));
        assert!(store.offer(&item("1-1", ApprovalStatus::All)));

        // The key was forgotten on ALL: the same status, or any other,
        // counts as never seen.
        assert!(store.offer(&item("1-1", ApprovalStatus::All)));
        assert!(store.offer(&item("1-1", ApprovalStatus::Others)));
    }

    #[test]
    fn test_first_offer_of_all_records_nothing() {
        let store = StatusStore::new();

        assert!(store.offer(&item("1-1", ApprovalStatus::All)));
        assert!(store.offer(&item("1-1", ApprovalStatus::All)));
    }

    #[test]
    fn test_offer_is_safe_across_threads() {
        use std::sync::Arc;

        let store = Arc::new(StatusStore::new());
        let mut handles = Vec::new();

        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("{}-{}", t % 2, i);
                    store.offer(&item(&key, ApprovalStatus::Others));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("worker panicked");
        }

        // Every key was recorded; a repeat offer is a no-op.
        assert!(!store.offer(&item("0-0", ApprovalStatus::Others)));
        assert!(!store.offer(&item("1-99", ApprovalStatus::Others)));
    }
}
