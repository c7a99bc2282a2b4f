//! Response status and paging metadata.

use serde::{Deserialize, Serialize};

/// Status block carried by every platform response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Platform status code. `"200"` means success.
    pub code: String,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Server-side reference for support and tracing.
    #[serde(
        rename = "referenceid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_id: Option<String>,
    /// Additional validation messages.
    #[serde(
        rename = "additionalmessages",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub additional_messages: Vec<String>,
}

impl Status {
    /// The status code for a successful call.
    pub const SUCCESS: &'static str = "200";
    /// The status code for a missing record.
    pub const NOT_FOUND: &'static str = "404";
    /// The status code for a revision mismatch.
    pub const CONFLICT: &'static str = "409";

    /// Creates a successful status.
    pub fn success() -> Self {
        Self {
            code: Self::SUCCESS.to_string(),
            message: Some("Successful".to_string()),
            reference_id: None,
            additional_messages: Vec::new(),
        }
    }

    /// Creates a failed status.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            reference_id: None,
            additional_messages: Vec::new(),
        }
    }

    /// Sets the reference id.
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Returns true if the call succeeded.
    pub fn is_successful(&self) -> bool {
        self.code == Self::SUCCESS
    }
}

/// Paging metadata returned by list and find calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    /// 1-based page number.
    #[serde(rename = "pagenumber")]
    pub page_number: u32,
    /// Requested page size.
    #[serde(rename = "pagesize")]
    pub page_size: u32,
    /// Total number of records matching the query.
    #[serde(rename = "totalrecords")]
    pub total_records: u64,
}

impl PagingInfo {
    /// Creates paging metadata.
    pub fn new(page_number: u32, page_size: u32, total_records: u64) -> Self {
        Self {
            page_number,
            page_size,
            total_records,
        }
    }

    /// Returns true if no records exist beyond this page.
    pub fn is_last_page(&self) -> bool {
        u64::from(self.page_number) * u64::from(self.page_size) >= self.total_records
    }
}
