//! Synonym tables mapping raw service states onto classifications.
//!
//! Each protocol version keeps its own table. They overlap but are not
//! unified: changing what one version accepts could silently change how an
//! older service deployment is interpreted.

use crate::decision::types::Classification;

/// A case-insensitive synonym table for one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub name: &'static str,
    approved: &'static [&'static str],
    declined: &'static [&'static str],
    change_requested: &'static [&'static str],
    pending: &'static [&'static str],
}

impl Vocabulary {
    /// `/api/v1/watches`
    pub const WATCHES: Vocabulary = Vocabulary {
        name: "watches",
        approved: &["approved"],
        declined: &["declined", "denied"],
        change_requested: &[],
        pending: &["pending"],
    };

    /// `/api/v1/review-tasks`
    pub const REVIEW_TASKS: Vocabulary = Vocabulary {
        name: "review-tasks",
        approved: &["approved"],
        declined: &["declined", "rejected"],
        change_requested: &["changerequested", "change_requested"],
        pending: &["pending", "processing", "requiresintervention"],
    };

    /// `/api/v1/trace`
    pub const TRACE: Vocabulary = Vocabulary {
        name: "trace",
        approved: &["completed", "approved"],
        declined: &["rejected", "declined"],
        change_requested: &["changerequested", "change_requested"],
        pending: &["assessed", "pending", "processing", "requiresintervention"],
    };

    /// Union of every version's synonyms.
    pub const UNIFIED: Vocabulary = Vocabulary {
        name: "unified",
        approved: &["approved", "completed"],
        declined: &["declined", "rejected", "denied"],
        change_requested: &["changerequested", "change_requested"],
        pending: &["pending", "processing", "requiresintervention", "assessed"],
    };

    /// Classify a raw state.
    ///
    /// `processedAsync=true` is an approval whatever the state says, on every
    /// version. Missing or blank states are `Pending`. Anything else that matches no
    /// synonym comes back as `Error` carrying the raw value.
    pub fn classify(&self, raw: Option<&str>, processed_async: bool) -> Classification {
        if processed_async {
            return Classification::Approved;
        }

        let raw = match raw.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Classification::Pending,
        };
        let state = raw.to_lowercase();
        let state = state.as_str();

        if self.approved.contains(&state) {
            Classification::Approved
        } else if self.declined.contains(&state) {
            Classification::Declined
        } else if self.change_requested.contains(&state) {
            Classification::ChangeRequested
        } else if self.pending.contains(&state) {
            Classification::Pending
        } else {
            Classification::Error(raw.to_string())
        }
    }
}

/// Classify against the union of all synonym tables.
pub fn classify(raw: Option<&str>, processed_async: bool) -> Classification {
    Vocabulary::UNIFIED.classify(raw, processed_async)
}
