use serde::Serialize;

/// One resource considered by a delete run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Resource id (group id, image id, volume id or log group name).
    pub id: String,
    /// Human-readable name; may repeat the id.
    pub name: String,
    /// Why the resource was skipped or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome of a delete run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    /// `true` when deletes were requested as dry runs.
    pub dry_run: bool,
    /// Resources whose delete call succeeded.
    pub deleted: Vec<ReportEntry>,
    /// Resources left alone by the selection rules.
    pub skipped: Vec<ReportEntry>,
    /// Resources whose delete call failed.
    pub failed: Vec<ReportEntry>,
}

impl DeletionReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn push_deleted(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.deleted.push(ReportEntry {
            id: id.into(),
            name: name.into(),
            reason: None,
        });
    }

    pub fn push_skipped(&mut self, id: impl Into<String>, name: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(ReportEntry {
            id: id.into(),
            name: name.into(),
            reason: Some(reason.into()),
        });
    }

    pub fn push_failed(&mut self, id: impl Into<String>, name: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(ReportEntry {
            id: id.into(),
            name: name.into(),
            reason: Some(reason.into()),
        });
    }

    /// `deleted N, skipped N, failed N`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}deleted {}, skipped {}, failed {}",
            if self.dry_run { "[dry-run] " } else { "" },
            self.deleted.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}
