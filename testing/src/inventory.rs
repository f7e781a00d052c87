//! In-memory inventory and catalog store.
//!
//! Every operation takes the state mutex once, so each call is atomic just
//! like a committed transaction. Optional latency is applied before the mutex
//! is taken, which widens race windows between `find_unused_redeemable` and
//! `reserve_and_bind` for concurrency tests. A reservation whose candidate was
//! taken in that window claims the oldest remaining item of the pool.

use crate::mocks::test_time;
use chrono::{DateTime, Utc};
use nexus_core::catalog::{AssignmentRecord, CatalogStore, InventoryStats, PoolSummary};
use nexus_core::store::{CodeRecord, InventoryStore, ReserveOutcome};
use nexus_core::{
    AccountPayload, CatalogError, CodeId, CodeStatus, InventoryItem, ItemId, ItemStatus, Pool, PoolId, RedemptionCode,
    StoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    pools: HashMap<PoolId, Pool>,
    items: HashMap<ItemId, InventoryItem>,
    codes: HashMap<CodeId, RedemptionCode>,
    code_index: HashMap<String, CodeId>,
}

impl State {
    fn bound_item(&self, code: CodeId) -> Option<&InventoryItem> {
        self.items.values().find(|item| item.bound_code == Some(code))
    }

    /// Oldest available item of `pool`, by creation time then id.
    fn first_available(&self, pool: PoolId) -> Option<&InventoryItem> {
        self.items
            .values()
            .filter(|item| item.pool_id == pool && item.is_available())
            .min_by_key(|item| (item.created_at, *item.id.as_uuid()))
    }

    fn pool_name(&self, pool: PoolId) -> String {
        self.pools.get(&pool).map(|p| p.name.clone()).unwrap_or_default()
    }
}

/// Items and codes as of one instant, sorted by id for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// All items
    pub items: Vec<InventoryItem>,
    /// All codes
    pub codes: Vec<RedemptionCode>,
}

/// Mutex-guarded store implementing both [`InventoryStore`] and [`CatalogStore`].
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    latency_micros: AtomicU64,
    forced_item_taken: AtomicUsize,
    reservations: AtomicUsize,
    replay_views: AtomicUsize,
}

impl InMemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self) -> Result<(), StoreError> {
        let latency = self.latency_micros.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_micros(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("in-memory store switched off".into()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Fault injection
    // ═══════════════════════════════════════════════════════════

    /// Make every call fail with [`StoreError::Database`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros.store(micros, Ordering::SeqCst);
    }

    /// Answer the next `count` reservations with [`ReserveOutcome::ItemTaken`]
    /// without writing anything.
    pub fn force_item_taken(&self, count: usize) {
        self.forced_item_taken.store(count, Ordering::SeqCst);
    }

    // ═══════════════════════════════════════════════════════════
    // Seeding
    // ═══════════════════════════════════════════════════════════

    /// Insert a pool named `name`.
    pub fn seed_pool(&self, name: &str) -> Pool {
        let pool = Pool::new(name, None, test_time());
        self.state().pools.insert(pool.id, pool.clone());
        pool
    }

    /// Insert `count` available items into `pool`.
    pub fn seed_items(&self, pool: PoolId, count: usize) -> Vec<InventoryItem> {
        let mut state = self.state();
        (0..count)
            .map(|n| {
                let item = InventoryItem::new(pool, crate::helpers::payload(n), test_time());
                state.items.insert(item.id, item.clone());
                item
            })
            .collect()
    }

    /// Insert one available item with the given payload.
    pub fn seed_item(&self, pool: PoolId, payload: AccountPayload) -> InventoryItem {
        let item = InventoryItem::new(pool, payload, test_time());
        self.state().items.insert(item.id, item.clone());
        item
    }

    /// Insert an unused code.
    pub fn seed_code(&self, code: &str, pool: PoolId, expires_at: Option<DateTime<Utc>>) -> RedemptionCode {
        let code = RedemptionCode::new(code, pool, test_time(), expires_at);
        let mut state = self.state();
        state.code_index.insert(code.code.clone(), code.id);
        state.codes.insert(code.id, code.clone());
        code
    }

    // ═══════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════

    /// Look up a code by its normalized string.
    #[must_use]
    pub fn code(&self, code: &str) -> Option<RedemptionCode> {
        let state = self.state();
        state.code_index.get(code).and_then(|id| state.codes.get(id)).cloned()
    }

    /// Look up an item.
    #[must_use]
    pub fn item(&self, item: ItemId) -> Option<InventoryItem> {
        self.state().items.get(&item).cloned()
    }

    /// Items of `pool` in `status`.
    #[must_use]
    pub fn items_with_status(&self, pool: PoolId, status: ItemStatus) -> Vec<InventoryItem> {
        self.state()
            .items
            .values()
            .filter(|item| item.pool_id == pool && item.status == status)
            .cloned()
            .collect()
    }

    /// Everything, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state();
        let mut items: Vec<InventoryItem> = state.items.values().cloned().collect();
        items.sort_by_key(|item| *item.id.as_uuid());
        let mut codes: Vec<RedemptionCode> = state.codes.values().cloned().collect();
        codes.sort_by_key(|code| *code.id.as_uuid());
        StoreSnapshot { items, codes }
    }

    /// Successful reservations so far.
    #[must_use]
    pub fn reservations(&self) -> usize {
        self.reservations.load(Ordering::SeqCst)
    }

    /// Replay views recorded so far.
    #[must_use]
    pub fn replay_views(&self) -> usize {
        self.replay_views.load(Ordering::SeqCst)
    }

    fn take_forced_item_taken(&self) -> bool {
        self.forced_item_taken
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl InventoryStore for InMemoryInventoryStore {
    async fn get_by_code(&self, code: &str) -> Result<Option<CodeRecord>, StoreError> {
        self.enter().await?;
        let state = self.state();
        let Some(code) = state.code_index.get(code).and_then(|id| state.codes.get(id)) else {
            return Ok(None);
        };
        Ok(Some(CodeRecord {
            code: code.clone(),
            pool_name: state.pool_name(code.pool_id),
            item: state.bound_item(code.id).cloned(),
        }))
    }

    async fn find_unused_redeemable(&self, pool: PoolId) -> Result<Option<InventoryItem>, StoreError> {
        self.enter().await?;
        Ok(self.state().first_available(pool).cloned())
    }

    async fn reserve_and_bind(
        &self,
        item: ItemId,
        code: CodeId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, StoreError> {
        self.enter().await?;
        if self.take_forced_item_taken() {
            return Ok(ReserveOutcome::ItemTaken);
        }

        let mut state = self.state();
        let pool = match state.codes.get(&code) {
            Some(c) if c.status == CodeStatus::Unused => c.pool_id,
            Some(_) => return Ok(ReserveOutcome::CodeAlreadyBound),
            None => return Err(StoreError::Inconsistent(format!("code {code} does not exist"))),
        };
        let preferred = state
            .items
            .get(&item)
            .filter(|candidate| candidate.pool_id == pool && candidate.is_available())
            .map(|candidate| candidate.id);
        let Some(item) = preferred.or_else(|| state.first_available(pool).map(|fallback| fallback.id)) else {
            return Ok(ReserveOutcome::ItemTaken);
        };

        let State { items, codes, .. } = &mut *state;
        let (Some(item), Some(code)) = (items.get_mut(&item), codes.get_mut(&code)) else {
            return Ok(ReserveOutcome::ItemTaken);
        };
        item.status = ItemStatus::Assigned;
        item.assigned_at = Some(now);
        item.bound_code = Some(code.id);
        code.status = CodeStatus::Active;
        code.first_used_at = Some(now);
        code.last_used_at = Some(now);
        code.view_count = 1;

        self.reservations.fetch_add(1, Ordering::SeqCst);
        Ok(ReserveOutcome::Reserved {
            item: item.clone(),
            code: code.clone(),
        })
    }

    async fn record_replay_view(&self, code: CodeId, now: DateTime<Utc>) -> Result<Option<RedemptionCode>, StoreError> {
        self.enter().await?;
        let mut state = self.state();
        let Some(code) = state.codes.get_mut(&code).filter(|c| c.is_active()) else {
            return Ok(None);
        };
        code.view_count += 1;
        code.last_used_at = Some(now);
        self.replay_views.fetch_add(1, Ordering::SeqCst);
        Ok(Some(code.clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await
    }
}

impl CatalogStore for InMemoryInventoryStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<(), CatalogError> {
        self.enter().await?;
        self.state().pools.insert(pool.id, pool.clone());
        Ok(())
    }

    async fn delete_pool(&self, pool: PoolId) -> Result<(), CatalogError> {
        self.enter().await?;
        let mut state = self.state();
        if !state.pools.contains_key(&pool) {
            return Err(CatalogError::PoolNotFound);
        }
        let items = state.items.values().filter(|i| i.pool_id == pool).count() as u64;
        let codes = state.codes.values().filter(|c| c.pool_id == pool).count() as u64;
        if items > 0 || codes > 0 {
            return Err(CatalogError::PoolNotEmpty { items, codes });
        }
        state.pools.remove(&pool);
        Ok(())
    }

    async fn list_pools(&self) -> Result<Vec<PoolSummary>, CatalogError> {
        self.enter().await?;
        let state = self.state();
        let mut pools: Vec<PoolSummary> = state
            .pools
            .values()
            .map(|pool| {
                let items = state.items.values().filter(|i| i.pool_id == pool.id);
                let (total, available) =
                    items.fold((0_u64, 0_u64), |(t, a), i| (t + 1, a + u64::from(i.is_available())));
                PoolSummary {
                    pool: pool.clone(),
                    available_count: available,
                    total_count: total,
                }
            })
            .collect();
        pools.sort_by(|a, b| b.pool.created_at.cmp(&a.pool.created_at));
        Ok(pools)
    }

    async fn insert_items(
        &self,
        pool: PoolId,
        payloads: Vec<AccountPayload>,
        now: DateTime<Utc>,
    ) -> Result<usize, CatalogError> {
        self.enter().await?;
        let mut state = self.state();
        if !state.pools.contains_key(&pool) {
            return Err(CatalogError::PoolNotFound);
        }
        let count = payloads.len();
        for payload in payloads {
            let item = InventoryItem::new(pool, payload, now);
            state.items.insert(item.id, item);
        }
        Ok(count)
    }

    async fn delete_item(&self, item: ItemId) -> Result<(), CatalogError> {
        self.enter().await?;
        let mut state = self.state();
        match state.items.get(&item) {
            None => Err(CatalogError::ItemNotFound),
            Some(existing) if !existing.is_available() => Err(CatalogError::ItemAssigned),
            Some(_) => {
                state.items.remove(&item);
                Ok(())
            },
        }
    }

    async fn insert_codes(&self, codes: Vec<RedemptionCode>) -> Result<Vec<RedemptionCode>, CatalogError> {
        self.enter().await?;
        let mut state = self.state();
        if codes.iter().any(|c| !state.pools.contains_key(&c.pool_id)) {
            return Err(CatalogError::PoolNotFound);
        }
        let mut stored = Vec::with_capacity(codes.len());
        for code in codes {
            if state.code_index.contains_key(&code.code) {
                continue;
            }
            state.code_index.insert(code.code.clone(), code.id);
            state.codes.insert(code.id, code.clone());
            stored.push(code);
        }
        Ok(stored)
    }

    async fn delete_code(&self, code: CodeId) -> Result<(), CatalogError> {
        self.enter().await?;
        let mut state = self.state();
        match state.codes.get(&code) {
            None => Err(CatalogError::CodeNotFound),
            Some(existing) if existing.is_active() => Err(CatalogError::CodeActive),
            Some(existing) => {
                let value = existing.code.clone();
                state.code_index.remove(&value);
                state.codes.remove(&code);
                Ok(())
            },
        }
    }

    async fn stats(&self) -> Result<InventoryStats, CatalogError> {
        self.enter().await?;
        let state = self.state();
        let available_items = state.items.values().filter(|i| i.is_available()).count() as u64;
        let unused_codes = state.codes.values().filter(|c| !c.is_active()).count() as u64;
        let total_items = state.items.len() as u64;
        let total_codes = state.codes.len() as u64;
        Ok(InventoryStats {
            total_pools: state.pools.len() as u64,
            total_items,
            available_items,
            assigned_items: total_items - available_items,
            total_codes,
            unused_codes,
            active_codes: total_codes - unused_codes,
        })
    }

    async fn recent_assignments(&self, limit: usize) -> Result<Vec<AssignmentRecord>, CatalogError> {
        self.enter().await?;
        let state = self.state();
        let mut assigned: Vec<&InventoryItem> = state.items.values().filter(|i| !i.is_available()).collect();
        assigned.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(assigned
            .into_iter()
            .take(limit)
            .filter_map(|item| {
                let code = item.bound_code.and_then(|id| state.codes.get(&id))?;
                Some(AssignmentRecord {
                    item_id: item.id,
                    pool_name: state.pool_name(item.pool_id),
                    account: item.payload.account.clone(),
                    code: code.code.clone(),
                    assigned_at: item.assigned_at?,
                })
            })
            .collect())
    }
}
