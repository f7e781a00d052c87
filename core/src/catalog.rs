//! Catalog administration: pools, inventory and code issuance.

use crate::error::CatalogError;
use crate::types::{AccountPayload, CodeId, ItemId, Pool, PoolId, RedemptionCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Pool with inventory counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    /// The pool
    pub pool: Pool,
    /// Items still available
    pub available_count: u64,
    /// All items, assigned included
    pub total_count: u64,
}

/// Dashboard counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    /// Number of pools
    pub total_pools: u64,
    /// Number of inventory items
    pub total_items: u64,
    /// Items not yet handed out
    pub available_items: u64,
    /// Items bound to a code
    pub assigned_items: u64,
    /// Number of codes
    pub total_codes: u64,
    /// Codes never redeemed
    pub unused_codes: u64,
    /// Codes bound to an item
    pub active_codes: u64,
}

/// One handed-out item, for the "recent redemptions" view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Item that was handed out
    pub item_id: ItemId,
    /// Pool name
    pub pool_name: String,
    /// Account field of the payload
    pub account: String,
    /// Code it was bound to
    pub code: String,
    /// When it was bound
    pub assigned_at: DateTime<Utc>,
}

/// Persistence for catalog administration.
pub trait CatalogStore: Send + Sync {
    /// Persist a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    fn insert_pool(&self, pool: &Pool) -> impl Future<Output = Result<(), CatalogError>> + Send;

    /// Delete a pool that owns no items and no codes, checked in the same
    /// transaction as the delete.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PoolNotFound`] or [`CatalogError::PoolNotEmpty`].
    fn delete_pool(&self, pool: PoolId) -> impl Future<Output = Result<(), CatalogError>> + Send;

    /// List all pools with their counts, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    fn list_pools(&self) -> impl Future<Output = Result<Vec<PoolSummary>, CatalogError>> + Send;

    /// Insert available items into a pool. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PoolNotFound`] if the pool does not exist.
    fn insert_items(
        &self,
        pool: PoolId,
        payloads: Vec<AccountPayload>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, CatalogError>> + Send;

    /// Delete an item that is still available.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ItemNotFound`] or [`CatalogError::ItemAssigned`].
    fn delete_item(&self, item: ItemId) -> impl Future<Output = Result<(), CatalogError>> + Send;

    /// Insert codes, skipping any whose string already exists.
    ///
    /// Returns the codes that were actually stored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PoolNotFound`] if the pool does not exist.
    fn insert_codes(
        &self,
        codes: Vec<RedemptionCode>,
    ) -> impl Future<Output = Result<Vec<RedemptionCode>, CatalogError>> + Send;

    /// Delete a code that was never redeemed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CodeNotFound`] or [`CatalogError::CodeActive`].
    fn delete_code(&self, code: CodeId) -> impl Future<Output = Result<(), CatalogError>> + Send;

    /// Dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    fn stats(&self) -> impl Future<Output = Result<InventoryStats, CatalogError>> + Send;

    /// Most recently assigned items, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    fn recent_assignments(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<AssignmentRecord>, CatalogError>> + Send;
}
