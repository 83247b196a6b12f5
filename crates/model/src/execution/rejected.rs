use crate::{core::utils::display_raw, execution::report::ErrorCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record that was not loaded, with everything needed to report it in the
/// load log and to append it to the matching bad-record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub id: String,
    pub category: ErrorCategory,
    /// Running count of rejections in this category, starting at 1.
    pub error_number: u64,
    /// Ordinal of the record in the input, starting at 1.
    pub input_record: u64,
    /// 1-based column the failure is attributed to, if any.
    pub column: Option<usize>,
    pub message: String,
    pub details: Option<String>,
    /// Raw bytes of the rejected input, or the rendered row for duplicates.
    #[serde(skip)]
    pub raw: Vec<u8>,
    pub rejected_at: DateTime<Utc>,
}

impl RejectedRecord {
    pub fn new(
        category: ErrorCategory,
        error_number: u64,
        input_record: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            error_number,
            input_record,
            column: None,
            message: message.into(),
            details: None,
            raw: Vec::new(),
            rejected_at: Utc::now(),
        }
    }

    /// Attribute the failure to a column. Column 0 means the whole record
    /// and is not reported.
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = (column > 0).then_some(column);
        self
    }

    pub fn with_raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Line written to the load log for this rejection.
    pub fn log_line(&self) -> String {
        let label = match self.category {
            ErrorCategory::Parse => "Parse error",
            ErrorCategory::Duplicate => "Duplicate error",
        };
        let mut line = format!(
            "{label} Record {}: Input Record {}: Rejected",
            self.error_number, self.input_record
        );
        if let Some(column) = self.column {
            line.push_str(&format!(" - column {column}"));
        }
        line.push_str(&format!(". {}", self.message));
        line
    }

    /// Cause line appended after the raw record in a bad-record file.
    pub fn cause_line(&self) -> String {
        match &self.details {
            Some(details) => format!("# {} ({details})", self.log_line()),
            None => format!("# {}", self.log_line()),
        }
    }

    pub fn raw_display(&self) -> String {
        display_raw(&self.raw)
    }
}
