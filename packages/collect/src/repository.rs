//! Storage boundary for collected address lists.
//!
//! The pipeline only produces [`AddressRecord`] values; where they end up is
//! up to the [`ListRepository`] the caller hands them to.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use area_addresses_address_models::AddressRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from list storage.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A list id was empty or otherwise unusable.
    #[error("Invalid list id: {id:?}")]
    InvalidListId {
        /// The rejected id.
        id: String,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

/// A named list of addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressList {
    /// List identifier.
    pub id: String,
    /// Records in insertion order.
    pub records: Vec<AddressRecord>,
}

/// Persists address lists.
#[async_trait]
pub trait ListRepository: Send + Sync {
    /// Appends `records` to the list `list_id`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the records cannot be stored.
    async fn append(&self, list_id: &str, records: &[AddressRecord]) -> Result<(), RepositoryError>;

    /// Returns every stored list.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store cannot be read.
    async fn load_all(&self) -> Result<Vec<AddressList>, RepositoryError>;
}

/// In-process [`ListRepository`]. Lists are returned ordered by id.
#[derive(Debug, Default)]
pub struct MemoryListRepository {
    lists: Mutex<BTreeMap<String, Vec<AddressRecord>>>,
}

impl MemoryListRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListRepository for MemoryListRepository {
    async fn append(&self, list_id: &str, records: &[AddressRecord]) -> Result<(), RepositoryError> {
        let list_id = list_id.trim();
        if list_id.is_empty() {
            return Err(RepositoryError::InvalidListId {
                id: list_id.to_string(),
            });
        }

        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        let list = lists.entry(list_id.to_string()).or_default();

        // Re-appending the same run must not duplicate records.
        let known: BTreeSet<String> = list.iter().map(|r| r.id.clone()).collect();
        let before = list.len();
        list.extend(
            records
                .iter()
                .filter(|record| !known.contains(&record.id))
                .cloned(),
        );

        log::debug!(
            "Appended {} record(s) to list \"{list_id}\" ({} total)",
            list.len() - before,
            list.len()
        );

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<AddressList>, RepositoryError> {
        let lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(lists
            .iter()
            .map(|(id, records)| AddressList {
                id: id.clone(),
                records: records.clone(),
            })
            .collect())
    }
}
