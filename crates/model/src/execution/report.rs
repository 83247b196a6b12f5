use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure categories with their own counter and threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Parse,
    Duplicate,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Parse => f.write_str("parse"),
            ErrorCategory::Duplicate => f.write_str("duplicate"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThresholdBreach {
    pub category: ErrorCategory,
    pub observed: u64,
}

/// Outcome of a load that ran to completion or stopped on a threshold.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadResult {
    pub records_loaded: u64,
    pub records_skipped: u64,
    pub parse_errors: u64,
    pub duplicate_errors: u64,
    pub records_replaced: u64,
    pub breach: Option<ThresholdBreach>,
}

impl LoadResult {
    pub fn is_breached(&self) -> bool {
        self.breach.is_some()
    }

    /// Summary lines as written to the load log.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("{} Rows skipped.", self.records_skipped),
            format!("{} Rows successfully loaded.", self.records_loaded),
            format!("{} Rows not loaded due to parse errors.", self.parse_errors),
            format!(
                "{} Rows not loaded due to duplicate errors.",
                self.duplicate_errors
            ),
            format!("{} Rows replaced with new rows.", self.records_replaced),
        ]
    }
}

impl fmt::Display for ThresholdBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Maximum {} error count exceeded - {} error(s) found",
            self.category, self.observed
        )
    }
}
