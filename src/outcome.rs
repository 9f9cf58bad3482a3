//! Result types for batch runs: per-page outcomes and the job summary.
//!
//! These structs define the persisted `summary.json` shape, which is the sole
//! externally queryable record of a job's outcome. The serde layout is part
//! of the external contract and must stay stable:
//!
//! ```json
//! {
//!   "total": 3,
//!   "success": 2,
//!   "failed": ["page_2.png"],
//!   "results": [
//!     {"filename": "page_1.png", "status": "success", "content": "…", "tokens": 812},
//!     {"filename": "page_2.png", "status": "error", "error": "…"}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Tagged outcome of one page's inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PageOutcome {
    /// The endpoint returned structured text for the page.
    Success {
        /// Restructured Markdown content.
        content: String,
        /// Total tokens billed for the call (`usage.total_tokens`).
        tokens: u64,
    },
    /// The call failed; `error` is a human-readable description.
    Error { error: String },
}

impl PageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Success { .. })
    }
}

/// One page's result, keyed by its originating filename.
///
/// The filename is the association key between input pages and outcomes; it
/// is independent of which page's network call finished first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Originating page image filename (basename, not path).
    pub filename: String,
    #[serde(flatten)]
    pub outcome: PageOutcome,
}

/// Aggregate over all page records of a job.
///
/// Invariant: `success + failed.len() == total == results.len()`. Written
/// exactly once, after all dispatch work completes, and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Number of input pages.
    pub total: usize,
    /// Number of pages that produced content.
    pub success: usize,
    /// Filenames of failed pages, in input order.
    pub failed: Vec<String>,
    /// Full per-page result list, in input order.
    pub results: Vec<PageRecord>,
}

impl JobSummary {
    /// Build a summary from records already in input order.
    pub fn from_records(records: Vec<PageRecord>) -> Self {
        let total = records.len();
        let success = records.iter().filter(|r| r.outcome.is_success()).count();
        let failed = records
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.filename.clone())
            .collect();
        Self {
            total,
            success,
            failed,
            results: records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(name: &str) -> PageRecord {
        PageRecord {
            filename: name.to_string(),
            outcome: PageOutcome::Success {
                content: "## Notes".into(),
                tokens: 100,
            },
        }
    }

    fn failure(name: &str, err: &str) -> PageRecord {
        PageRecord {
            filename: name.to_string(),
            outcome: PageOutcome::Error { error: err.into() },
        }
    }

    #[test]
    fn success_record_serialises_with_status_tag() {
        let json = serde_json::to_value(success("page_1.png")).unwrap();
        assert_eq!(json["filename"], "page_1.png");
        assert_eq!(json["status"], "success");
        assert_eq!(json["content"], "## Notes");
        assert_eq!(json["tokens"], 100);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_record_serialises_with_status_tag() {
        let json = serde_json::to_value(failure("page_2.png", "timed out")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "timed out");
        assert!(json.get("content").is_none());
        assert!(json.get("tokens").is_none());
    }

    #[test]
    fn summary_counts_satisfy_invariant() {
        let summary = JobSummary::from_records(vec![
            success("a.png"),
            failure("b.png", "boom"),
            success("c.png"),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, vec!["b.png".to_string()]);
        assert_eq!(summary.success + summary.failed.len(), summary.total);
    }

    #[test]
    fn summary_json_round_trip() {
        let summary = JobSummary::from_records(vec![success("a.png"), failure("b.png", "x")]);
        let json = serde_json::to_string(&summary).unwrap();
        let back: JobSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn failed_list_preserves_input_order() {
        let summary = JobSummary::from_records(vec![
            failure("z.png", "1"),
            success("a.png"),
            failure("m.png", "2"),
        ]);
        assert_eq!(summary.failed, vec!["z.png".to_string(), "m.png".to_string()]);
    }
}
