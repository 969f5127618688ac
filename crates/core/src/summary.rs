//! Outcome summaries for batch operations

use serde::{Deserialize, Serialize};

/// An item that could not be processed, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub item: String,
    pub reason: String,
}

/// Partition of a batch into succeeded and failed items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<Failure>,
}

/// Summary of `delete_files`, items are object keys
pub type DeleteSummary = BatchSummary;

/// Summary of `upload_files`, items are destination keys
pub type UploadSummary = BatchSummary;

/// Summary of `download_files`, items are object keys
pub type DownloadSummary = BatchSummary;

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, item: impl Into<String>) {
        self.succeeded.push(item.into());
    }

    pub fn record_failure(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(Failure {
            item: item.into(),
            reason: reason.into(),
        });
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// True when nothing failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Reason recorded for `item`, if it failed
    pub fn failure_reason(&self, item: &str) -> Option<&str> {
        self.failed
            .iter()
            .find(|f| f.item == item)
            .map(|f| f.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut summary = BatchSummary::new();
        assert!(summary.is_complete());

        summary.record_success("k1");
        summary.record_failure("k2", "NoSuchKey: gone");

        assert_eq!(summary.succeeded_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert!(!summary.is_complete());
        assert_eq!(summary.failure_reason("k2"), Some("NoSuchKey: gone"));
        assert_eq!(summary.failure_reason("k1"), None);
    }

    #[test]
    fn test_json_shape() {
        let mut summary = DeleteSummary::new();
        summary.record_success("k1");
        summary.record_failure("k2", "AccessDenied");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "succeeded": ["k1"],
                "failed": [{ "item": "k2", "reason": "AccessDenied" }]
            })
        );
    }
}
