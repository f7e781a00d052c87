//! Inventory store trait used by the redemption engine.
//!
//! The store owns every mutation of status, timestamp, counter and binding
//! fields. Each operation below is one atomic commit; the engine never does a
//! read-modify-write across two calls.

use crate::error::StoreError;
use crate::types::{CodeId, InventoryItem, ItemId, PoolId, RedemptionCode};
use chrono::{DateTime, Utc};
use std::future::Future;

/// A code together with what the engine needs to answer a redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeRecord {
    /// The code itself
    pub code: RedemptionCode,
    /// Name of the owning pool
    pub pool_name: String,
    /// Item bound to the code, if any
    pub item: Option<InventoryItem>,
}

/// Result of a conditional reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Item and code were bound in one commit.
    Reserved {
        /// The item as committed
        item: InventoryItem,
        /// The code as committed
        code: RedemptionCode,
    },
    /// No available item of the code's pool could be claimed. Nothing was
    /// written.
    ItemTaken,
    /// The code was already bound. Nothing was written.
    CodeAlreadyBound,
}

/// Transactional repository for inventory items and redemption codes.
pub trait InventoryStore: Send + Sync {
    /// Load a code by its normalized string, with its pool name and bound item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<CodeRecord>, StoreError>> + Send;

    /// Return an item of `pool` that is currently available.
    ///
    /// Implementations return the oldest available item (by creation time,
    /// then id) that no in-flight reservation holds. The pick is only a
    /// candidate: availability is re-checked atomically by
    /// [`InventoryStore::reserve_and_bind`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn find_unused_redeemable(
        &self,
        pool: PoolId,
    ) -> impl Future<Output = Result<Option<InventoryItem>, StoreError>> + Send;

    /// Bind an item to `code` in one commit.
    ///
    /// `item` is the preferred candidate. If it was claimed concurrently, the
    /// store claims another available item of the code's pool in the same
    /// commit instead.
    ///
    /// Sets the item to assigned (with `assigned_at = now` and the code
    /// reference) and the code to active (with `first_used_at = last_used_at
    /// = now`, `view_count = 1`), but only while the code is still unused and
    /// some item of its pool is still available. Otherwise nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails to commit.
    fn reserve_and_bind(
        &self,
        item: ItemId,
        code: CodeId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<ReserveOutcome, StoreError>> + Send;

    /// Count one more view of an active code: `last_used_at = now`,
    /// `view_count += 1`, in one commit.
    ///
    /// Returns the updated code, or `None` if the code is not active.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    fn record_replay_view(
        &self,
        code: CodeId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<RedemptionCode>, StoreError>> + Send;

    /// Cheap connectivity check for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
