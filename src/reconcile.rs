use crate::models::{ContentData, ContentKind, PlatformId};
use std::collections::HashSet;

/// State transitions applied to a snapshot by one reconciliation pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Ids newly marked saved (were not in the stored set).
    pub added: Vec<String>,
    /// Ids unsaved because the platform no longer returned them.
    pub removed: Vec<String>,
}

/// Diff the stored id set for `(kind, platform)` against a freshly
/// fetched id set and apply the save/unsave transitions:
///
/// - every stored id absent from `fetched` is unsaved (removed remotely
///   since the last synchronization);
/// - every fetched id is saved (idempotent for ids already present).
///
/// The end state is exactly the fetched set, independent of the stored
/// set's prior contents and of evaluation order.
pub fn reconcile(
    content: &mut ContentData,
    platform: PlatformId,
    kind: ContentKind,
    fetched: &[String],
) -> ReconcileOutcome {
    let fetched_set: HashSet<&str> = fetched.iter().map(String::as_str).collect();

    let mut outcome = ReconcileOutcome::default();
    for stored_id in content.ids(kind, platform) {
        if !fetched_set.contains(stored_id.as_str()) {
            content.unsave(kind, &stored_id, platform);
            outcome.removed.push(stored_id);
        }
    }
    for id in fetched_set {
        if content.save(kind, id, platform) {
            outcome.added.push(id.to_string());
        }
    }
    outcome.added.sort();
    outcome.removed.sort();
    outcome
}
