//! Remote pull-history API
//!
//! This module provides:
//! - The [`RemoteApi`] seam consumed by the sync engine
//! - An HTTP client for the game's gacha record service
//! - A scripted in-memory implementation for tests

mod client;
mod error;
mod scripted;

pub use client::{GachaClient, retry_transient};
pub use error::FetchError;
pub use scripted::ScriptedApi;

use crate::models::{PoolCategory, PullRecord};

/// One page of remote history
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    /// Records on this page, newest first
    pub records: Vec<PullRecord>,
    /// Continuation cursor; `None` or empty on the last page
    pub next: Option<String>,
}

impl RecordPage {
    /// Cursor for the following page, if there is one
    pub fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref().filter(|c| !c.is_empty())
    }
}

/// Remote source of pull history
///
/// Implementations are bound to one endpoint and access token.
pub trait RemoteApi {
    /// Fetch one page of records for a category
    ///
    /// `cursor` is `None` for the first page.
    fn fetch_page(
        &self,
        category: PoolCategory,
        cursor: Option<&str>,
    ) -> Result<RecordPage, FetchError>;

    /// Resolve the account uid the access token belongs to
    fn fetch_uid(&self) -> Result<String, FetchError>;
}

/// Gacha service response types
pub mod api {
    use serde::Deserialize;
    use serde_json::Value;

    use crate::models::{PoolCategory, PullRecord};

    /// Common response wrapper
    ///
    /// The account service capitalises its field names, the record service
    /// does not.
    #[derive(Debug, Deserialize)]
    pub struct Envelope<T> {
        #[serde(alias = "Code")]
        pub code: i64,
        #[serde(default, alias = "Message")]
        pub message: String,
        pub data: Option<T>,
    }

    /// Payload of a record list response
    #[derive(Debug, Deserialize)]
    pub struct RecordList {
        #[serde(default)]
        pub list: Vec<RemoteRecord>,
        pub next: Option<String>,
    }

    /// A pull record as it appears on the wire
    #[derive(Debug, Deserialize)]
    pub struct RemoteRecord {
        pub pool_id: i64,
        #[serde(rename = "item")]
        pub item_id: i64,
        #[serde(rename = "time")]
        pub timestamp: i64,
    }

    impl RemoteRecord {
        pub fn into_pull(self, category: PoolCategory) -> PullRecord {
            PullRecord::new(category, self.pool_id, self.item_id, self.timestamp)
        }
    }

    /// Payload of the account info response
    #[derive(Debug, Deserialize)]
    pub struct AccountInfo {
        #[serde(default)]
        pub uid: Value,
    }

    impl AccountInfo {
        /// The uid as a decimal string
        ///
        /// The service has been seen to send it both as a string and as a
        /// JSON number.
        pub fn uid(&self) -> Option<String> {
            match &self.uid {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => n
                    .as_u64()
                    .map(|v| v.to_string())
                    .or_else(|| n.as_i64().map(|v| v.to_string()))
                    .or_else(|| n.as_f64().map(|v| format!("{:.0}", v))),
                _ => None,
            }
        }
    }
}
