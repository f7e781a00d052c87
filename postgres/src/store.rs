//! `PostgreSQL` inventory store.
//!
//! Reservation is one transaction of two conditional updates. The code row is
//! updated first and re-checks its status after any concurrent writer
//! commits. The item row is then claimed through `FOR UPDATE SKIP LOCKED`:
//! the requested candidate if it is still free, otherwise the oldest free
//! item of the code's pool that no other transaction holds. A zero row count
//! on either update rolls the transaction back without writing anything.

use crate::rows::{CODE_COLUMNS, CodeLookupRow, CodeRow, ITEM_COLUMNS, ItemRow};
use chrono::{DateTime, Utc};
use nexus_core::store::{CodeRecord, InventoryStore, ReserveOutcome};
use nexus_core::{CodeId, InventoryItem, ItemId, PoolId, RedemptionCode, StoreError};
use sqlx::PgPool;

/// `PostgreSQL`-backed [`InventoryStore`] and
/// [`CatalogStore`](nexus_core::catalog::CatalogStore).
///
/// # Example
///
/// ```no_run
/// use nexus_postgres::PostgresInventoryStore;
/// use sqlx::PgPool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPool::connect("postgres://localhost/nexus").await?;
/// let store = PostgresInventoryStore::new(pool);
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pub(crate) pool: PgPool,
}

impl PostgresInventoryStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl InventoryStore for PostgresInventoryStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_by_code(&self, code: &str) -> Result<Option<CodeRecord>, StoreError> {
        let row: Option<CodeLookupRow> = sqlx::query_as(
            r"
            SELECT c.id, c.code, c.pool_id, c.status, c.created_at,
                   c.first_used_at, c.last_used_at, c.view_count, c.expires_at,
                   p.name AS pool_name,
                   i.id AS item_id,
                   i.pool_id AS item_pool_id,
                   i.account AS item_account,
                   i.password AS item_password,
                   i.totp_secret AS item_totp_secret,
                   i.extra_info AS item_extra_info,
                   i.status AS item_status,
                   i.created_at AS item_created_at,
                   i.assigned_at AS item_assigned_at
            FROM redemption_codes c
            JOIN pools p ON p.id = c.pool_id
            LEFT JOIN inventory_items i ON i.redemption_code_id = c.id
            WHERE c.code = $1
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to load code: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let (code, pool_name, item) = row.into_parts()?;
        Ok(Some(CodeRecord { code, pool_name, item }))
    }

    /// Oldest available item, skipping rows an in-flight reservation holds.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn find_unused_redeemable(&self, pool: PoolId) -> Result<Option<InventoryItem>, StoreError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            r"
            SELECT {ITEM_COLUMNS} FROM inventory_items
            WHERE pool_id = $1 AND status = 'available'
            ORDER BY created_at, id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "
        ))
        .bind(pool.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to find available item: {e}")))?;

        row.map(InventoryItem::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn reserve_and_bind(
        &self,
        item: ItemId,
        code: CodeId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;

        let code_row: Option<CodeRow> = sqlx::query_as(&format!(
            r"
            UPDATE redemption_codes
            SET status = 'active', first_used_at = $2, last_used_at = $2, view_count = 1
            WHERE id = $1 AND status = 'unused'
            RETURNING {CODE_COLUMNS}
            "
        ))
        .bind(code.as_uuid())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to activate code: {e}")))?;

        let Some(code_row) = code_row else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::Database(format!("Failed to roll back: {e}")))?;
            return Ok(ReserveOutcome::CodeAlreadyBound);
        };

        let item_row: Option<ItemRow> = sqlx::query_as(&format!(
            r"
            UPDATE inventory_items
            SET status = 'assigned', assigned_at = $3, redemption_code_id = $2
            WHERE id = (
                SELECT id FROM inventory_items
                WHERE pool_id = $4 AND status = 'available'
                ORDER BY (id = $1) DESC, created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(item.as_uuid())
        .bind(code.as_uuid())
        .bind(now)
        .bind(code_row.pool_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to assign item: {e}")))?;

        let Some(item_row) = item_row else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::Database(format!("Failed to roll back: {e}")))?;
            return Ok(ReserveOutcome::ItemTaken);
        };

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit reservation: {e}")))?;

        Ok(ReserveOutcome::Reserved {
            item: InventoryItem::try_from(item_row)?,
            code: RedemptionCode::try_from(code_row)?,
        })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn record_replay_view(&self, code: CodeId, now: DateTime<Utc>) -> Result<Option<RedemptionCode>, StoreError> {
        let row: Option<CodeRow> = sqlx::query_as(&format!(
            r"
            UPDATE redemption_codes
            SET view_count = view_count + 1, last_used_at = $2
            WHERE id = $1 AND status = 'active'
            RETURNING {CODE_COLUMNS}
            "
        ))
        .bind(code.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to record view: {e}")))?;

        row.map(RedemptionCode::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Ping failed: {e}")))?;
        Ok(())
    }
}
