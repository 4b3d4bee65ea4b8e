//! Demand auditing.
//!
//! This module records the outcome of every demand made through a security
//! context, grouped by permission kind.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Serialize, Deserialize};
use cas_core::kind::PermissionKind;

/// How a demand ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The demanded permission grants nothing, so no walk was needed.
    Trivial,

    /// Every frame up to the origin authorized the demand.
    Granted,

    /// A frame's assertion ended the walk early.
    Truncated {
        /// The label of the asserting frame.
        frame_label: String,
    },

    /// The walk failed.
    Denied {
        /// The label of the frame where the walk stopped, if any.
        frame_label: Option<String>,

        /// The rendered failure.
        reason: String,
    },
}

impl AuditOutcome {
    /// Whether the demand succeeded.
    pub fn permitted(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the demand was made.
    pub timestamp: DateTime<Utc>,

    /// The kind of the demanded permission.
    pub kind: PermissionKind,

    /// The demanded permission, rendered.
    pub permission: String,

    /// The number of frames on the stack when the demand was made.
    pub depth: usize,

    /// How the demand ended.
    pub outcome: AuditOutcome,
}

/// An audit log.
#[derive(Clone)]
pub struct AuditLog {
    /// The audit entries.
    entries: Arc<DashMap<PermissionKind, Vec<AuditEntry>>>,

    /// The maximum number of entries to keep per kind.
    max_entries_per_kind: usize,
}

impl AuditLog {
    /// Create a new audit log.
    ///
    /// # Arguments
    ///
    /// * `max_entries_per_kind` - The maximum number of entries to keep per kind.
    ///
    /// # Returns
    ///
    /// A new audit log.
    pub fn new(max_entries_per_kind: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries_per_kind,
        }
    }

    /// Record the outcome of a demand.
    pub fn record(
        &self,
        kind: PermissionKind,
        permission: String,
        depth: usize,
        outcome: AuditOutcome,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            kind: kind.clone(),
            permission,
            depth,
            outcome,
        };

        let mut kind_entries = self.entries.entry(kind).or_default();
        kind_entries.push(entry);

        // Trim the log if necessary
        if kind_entries.len() > self.max_entries_per_kind {
            let to_remove = kind_entries.len() - self.max_entries_per_kind;
            kind_entries.drain(0..to_remove);
        }
    }

    /// Get the entries for `kind`, oldest first.
    pub fn entries(&self, kind: &PermissionKind) -> Vec<AuditEntry> {
        self.entries
            .get(kind)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Get every entry, oldest first.
    pub fn all_entries(&self) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .entries
            .iter()
            .flat_map(|kind_entries| kind_entries.value().clone())
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }

    /// The number of denied demands recorded for `kind`.
    pub fn denial_count(&self, kind: &PermissionKind) -> usize {
        self.entries
            .get(kind)
            .map(|entries| entries.iter().filter(|entry| !entry.outcome.permitted()).count())
            .unwrap_or(0)
    }

    /// Clear the entries for `kind`.
    pub fn clear(&self, kind: &PermissionKind) {
        self.entries.remove(kind);
    }

    /// Render every entry as a JSON array.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.all_entries())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("kinds", &self.entries.len())
            .field("max_entries_per_kind", &self.max_entries_per_kind)
            .finish()
    }
}
