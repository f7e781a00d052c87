//! Catalog administration service: pools, inventory and code issuance.

use chrono::Duration as ChronoDuration;
use nexus_core::catalog::{AssignmentRecord, CatalogStore, InventoryStats, PoolSummary};
use nexus_core::environment::Clock;
use nexus_core::{AccountPayload, CatalogError, CodeId, ItemId, Pool, PoolId, RedemptionCode, code};
use std::collections::HashSet;
use std::sync::Arc;

/// Largest batch accepted by [`CatalogService::generate_codes`].
pub const MAX_CODES_PER_BATCH: usize = 1000;

/// Generation rounds before giving up on collisions.
const GENERATION_ROUNDS: usize = 5;

/// Validating front for a [`CatalogStore`].
pub struct CatalogService<C> {
    store: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<C> Clone for CatalogService<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: CatalogStore> CatalogService<C> {
    /// Create a service over `store`.
    #[must_use]
    pub fn new(store: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a pool.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidInput`] if the name is blank.
    #[tracing::instrument(skip(self, description))]
    pub async fn create_pool(&self, name: &str, description: Option<&str>) -> Result<Pool, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidInput("pool name must not be empty".into()));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from);

        let pool = Pool::new(name, description, self.clock.now());
        self.store.insert_pool(&pool).await?;
        tracing::info!(pool_id = %pool.id, name = %pool.name, "Pool created");
        Ok(pool)
    }

    /// Delete an empty pool.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PoolNotFound`] or [`CatalogError::PoolNotEmpty`].
    pub async fn delete_pool(&self, pool: PoolId) -> Result<(), CatalogError> {
        self.store.delete_pool(pool).await?;
        tracing::info!(pool_id = %pool, "Pool deleted");
        Ok(())
    }

    /// List pools with their inventory counts.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    pub async fn list_pools(&self) -> Result<Vec<PoolSummary>, CatalogError> {
        self.store.list_pools().await
    }

    /// Add items to a pool, skipping payloads without account or password.
    ///
    /// Returns the number of items inserted.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PoolNotFound`] if the pool does not exist.
    #[tracing::instrument(skip(self, payloads), fields(offered = payloads.len()))]
    pub async fn add_items(&self, pool: PoolId, payloads: Vec<AccountPayload>) -> Result<usize, CatalogError> {
        let offered = payloads.len();
        let complete: Vec<AccountPayload> = payloads.into_iter().filter(AccountPayload::is_complete).collect();
        if complete.len() < offered {
            tracing::debug!(skipped = offered - complete.len(), "Skipped incomplete payloads");
        }
        if complete.is_empty() {
            return Ok(0);
        }

        let inserted = self.store.insert_items(pool, complete, self.clock.now()).await?;
        tracing::info!(pool_id = %pool, inserted, "Inventory added");
        Ok(inserted)
    }

    /// Delete an item that has not been handed out.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ItemNotFound`] or [`CatalogError::ItemAssigned`].
    pub async fn delete_item(&self, item: ItemId) -> Result<(), CatalogError> {
        self.store.delete_item(item).await
    }

    /// Generate `count` fresh codes for `pool`.
    ///
    /// Codes expire `expires_in_days` days from now when that is positive.
    /// Collisions with existing codes are regenerated a bounded number of
    /// times.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::InvalidInput`] if `count` is outside `1..=1000`
    /// - [`CatalogError::PoolNotFound`] if the pool does not exist
    /// - [`CatalogError::CodeGenerationExhausted`] if collisions persist
    #[tracing::instrument(skip(self))]
    pub async fn generate_codes(
        &self,
        pool: PoolId,
        count: usize,
        expires_in_days: Option<u32>,
    ) -> Result<Vec<RedemptionCode>, CatalogError> {
        if count == 0 || count > MAX_CODES_PER_BATCH {
            return Err(CatalogError::InvalidInput(format!(
                "count must be between 1 and {MAX_CODES_PER_BATCH}"
            )));
        }

        let now = self.clock.now();
        let expires_at = expires_in_days
            .filter(|days| *days > 0)
            .map(|days| now + ChronoDuration::days(i64::from(days)));

        let mut stored: Vec<RedemptionCode> = Vec::with_capacity(count);
        for round in 0..GENERATION_ROUNDS {
            let missing = count - stored.len();
            if missing == 0 {
                break;
            }

            let batch = fresh_codes(missing, &stored)
                .into_iter()
                .map(|value| RedemptionCode::new(&value, pool, now, expires_at))
                .collect();
            let inserted = self.store.insert_codes(batch).await?;
            tracing::debug!(round, requested = missing, inserted = inserted.len(), "Code batch stored");
            stored.extend(inserted);
        }

        if stored.len() < count {
            tracing::warn!(requested = count, generated = stored.len(), "Code generation exhausted");
            return Err(CatalogError::CodeGenerationExhausted {
                requested: count,
                generated: stored.len(),
            });
        }

        tracing::info!(pool_id = %pool, count, "Codes generated");
        Ok(stored)
    }

    /// Delete a code that was never redeemed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CodeNotFound`] or [`CatalogError::CodeActive`].
    pub async fn delete_code(&self, code: CodeId) -> Result<(), CatalogError> {
        self.store.delete_code(code).await
    }

    /// Dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    pub async fn stats(&self) -> Result<InventoryStats, CatalogError> {
        self.store.stats().await
    }

    /// Most recent assignments, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] on storage failure.
    pub async fn recent_assignments(&self, limit: usize) -> Result<Vec<AssignmentRecord>, CatalogError> {
        self.store.recent_assignments(limit).await
    }
}

/// Draw `count` distinct codes that do not collide with `taken`.
///
/// The generator never lives across an await point.
fn fresh_codes(count: usize, taken: &[RedemptionCode]) -> Vec<String> {
    let taken: HashSet<&str> = taken.iter().map(|c| c.code.as_str()).collect();
    let mut rng = rand::thread_rng();
    let mut fresh = HashSet::with_capacity(count);
    while fresh.len() < count {
        let candidate = code::generate(&mut rng);
        if !taken.contains(candidate.as_str()) {
            fresh.insert(candidate);
        }
    }
    fresh.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_codes_are_distinct_and_avoid_taken() {
        let pool = PoolId::new();
        let now = chrono::Utc::now();
        let taken = vec![RedemptionCode::new("AAAAAAAAAAAAAAAA", pool, now, None)];
        let codes = fresh_codes(200, &taken);
        let unique: HashSet<&String> = codes.iter().collect();
        assert_eq!(unique.len(), 200);
        assert!(codes.iter().all(|c| c.len() == code::CODE_LENGTH));
        assert!(!codes.iter().any(|c| c == "AAAAAAAAAAAAAAAA"));
    }
}
