//! Sync error taxonomy

use crate::models::PoolCategory;
use crate::remote::FetchError;

/// Error that aborts a sync run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No access token was provided
    #[error("access token is missing")]
    MissingCredential,

    /// The service rejected the access token
    #[error(
        "access token was rejected{}; log in again to refresh it",
        rejected_at(.category, .page)
    )]
    CredentialRejected {
        /// Category and page being fetched, absent for the uid lookup
        category: Option<PoolCategory>,
        page: Option<usize>,
        #[source]
        source: FetchError,
    },

    /// Fetching a page of history failed
    #[error("fetching {category} history failed on page {page}")]
    Fetch {
        category: PoolCategory,
        page: usize,
        #[source]
        source: FetchError,
    },

    /// The account uid could not be resolved from the access token
    #[error("resolving account uid failed")]
    Identity(#[source] FetchError),

    /// Reading or writing the local store failed
    #[error("{step} failed for {category}")]
    Storage {
        category: PoolCategory,
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The backup before a full sync failed; nothing was modified
    #[error("backup before full sync of {category} failed")]
    Backup {
        category: PoolCategory,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    /// Wrap a page fetch failure, routing rejected tokens to `CredentialRejected`
    pub fn fetch(category: PoolCategory, page: usize, source: FetchError) -> Self {
        if source.is_credential_invalid() {
            Self::CredentialRejected {
                category: Some(category),
                page: Some(page),
                source,
            }
        } else {
            Self::Fetch {
                category,
                page,
                source,
            }
        }
    }

    /// Wrap a uid lookup failure, routing rejected tokens to `CredentialRejected`
    pub fn identity(source: FetchError) -> Self {
        if source.is_credential_invalid() {
            Self::CredentialRejected {
                category: None,
                page: None,
                source,
            }
        } else {
            Self::Identity(source)
        }
    }

    pub fn storage(category: PoolCategory, step: &'static str, source: anyhow::Error) -> Self {
        Self::Storage {
            category,
            step,
            source,
        }
    }

    /// Whether the user has to supply a new access token
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::CredentialRejected { .. })
    }
}

fn rejected_at(category: &Option<PoolCategory>, page: &Option<usize>) -> String {
    match (category, page) {
        (Some(category), Some(page)) => format!(" while fetching {category} page {page}"),
        _ => String::new(),
    }
}
