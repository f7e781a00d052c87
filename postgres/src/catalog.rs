//! Catalog administration queries.

use crate::rows::{CODE_COLUMNS, CodeRow, PoolRow};
use crate::store::PostgresInventoryStore;
use chrono::{DateTime, Utc};
use nexus_core::catalog::{AssignmentRecord, CatalogStore, InventoryStats, PoolSummary};
use nexus_core::{
    AccountPayload, CatalogError, CodeId, ItemId, ItemStatus, Pool, PoolId, RedemptionCode, StoreError,
};
use sqlx::{Postgres, Row, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

fn db_error(context: &str, e: &sqlx::Error) -> CatalogError {
    CatalogError::Store(StoreError::Database(format!("{context}: {e}")))
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

async fn pool_exists(tx: &mut Transaction<'_, Postgres>, pool: Uuid) -> Result<bool, CatalogError> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM pools WHERE id = $1) AS found")
        .bind(pool)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to check pool", &e))?;
    row.try_get("found").map_err(|e| db_error("Failed to read pool check", &e))
}

#[derive(sqlx::FromRow)]
struct PoolSummaryRow {
    #[sqlx(flatten)]
    pool: PoolRow,
    available_count: i64,
    total_count: i64,
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    item_id: Uuid,
    pool_name: String,
    account: String,
    code: String,
    assigned_at: DateTime<Utc>,
}

impl CatalogStore for PostgresInventoryStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<(), CatalogError> {
        sqlx::query("INSERT INTO pools (id, name, description, created_at) VALUES ($1, $2, $3, $4)")
            .bind(pool.id.as_uuid())
            .bind(&pool.name)
            .bind(pool.description.as_deref())
            .bind(pool.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to create pool", &e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn delete_pool(&self, pool: PoolId) -> Result<(), CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", &e))?;

        // Locks the pool row: concurrent inserts referencing it wait for us.
        let locked = sqlx::query("SELECT id FROM pools WHERE id = $1 FOR UPDATE")
            .bind(pool.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to lock pool", &e))?;
        if locked.is_none() {
            return Err(CatalogError::PoolNotFound);
        }

        let counts = sqlx::query(
            r"
            SELECT (SELECT COUNT(*) FROM inventory_items WHERE pool_id = $1) AS items,
                   (SELECT COUNT(*) FROM redemption_codes WHERE pool_id = $1) AS codes
            ",
        )
        .bind(pool.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to count pool contents", &e))?;
        let items: i64 = counts.try_get("items").map_err(|e| db_error("Failed to read count", &e))?;
        let codes: i64 = counts.try_get("codes").map_err(|e| db_error("Failed to read count", &e))?;
        if items > 0 || codes > 0 {
            return Err(CatalogError::PoolNotEmpty {
                items: count(items),
                codes: count(codes),
            });
        }

        sqlx::query("DELETE FROM pools WHERE id = $1")
            .bind(pool.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to delete pool", &e))?;

        tx.commit().await.map_err(|e| db_error("Failed to commit", &e))?;
        Ok(())
    }

    async fn list_pools(&self) -> Result<Vec<PoolSummary>, CatalogError> {
        let rows: Vec<PoolSummaryRow> = sqlx::query_as(
            r"
            SELECT p.id, p.name, p.description, p.created_at,
                   COUNT(i.id) FILTER (WHERE i.status = 'available') AS available_count,
                   COUNT(i.id) AS total_count
            FROM pools p
            LEFT JOIN inventory_items i ON i.pool_id = p.id
            GROUP BY p.id
            ORDER BY p.created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list pools", &e))?;

        Ok(rows
            .into_iter()
            .map(|row| PoolSummary {
                pool: row.pool.into(),
                available_count: count(row.available_count),
                total_count: count(row.total_count),
            })
            .collect())
    }

    #[tracing::instrument(skip(self, payloads), fields(count = payloads.len()), level = "debug")]
    async fn insert_items(
        &self,
        pool: PoolId,
        payloads: Vec<AccountPayload>,
        now: DateTime<Utc>,
    ) -> Result<usize, CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", &e))?;

        if !pool_exists(&mut tx, *pool.as_uuid()).await? {
            return Err(CatalogError::PoolNotFound);
        }

        for payload in &payloads {
            sqlx::query(
                r"
                INSERT INTO inventory_items
                    (id, pool_id, account, password, totp_secret, extra_info, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(*ItemId::new().as_uuid())
            .bind(pool.as_uuid())
            .bind(&payload.account)
            .bind(&payload.password)
            .bind(payload.totp_secret.as_deref())
            .bind(payload.extra_info.as_deref())
            .bind(ItemStatus::Available.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to insert item", &e))?;
        }

        tx.commit().await.map_err(|e| db_error("Failed to commit", &e))?;
        Ok(payloads.len())
    }

    async fn delete_item(&self, item: ItemId) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1 AND status = 'available'")
            .bind(item.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete item", &e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM inventory_items WHERE id = $1")
            .bind(item.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check item", &e))?;
        Err(if exists.is_some() {
            CatalogError::ItemAssigned
        } else {
            CatalogError::ItemNotFound
        })
    }

    #[tracing::instrument(skip(self, codes), fields(count = codes.len()), level = "debug")]
    async fn insert_codes(&self, codes: Vec<RedemptionCode>) -> Result<Vec<RedemptionCode>, CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", &e))?;

        let pools: BTreeSet<Uuid> = codes.iter().map(|c| *c.pool_id.as_uuid()).collect();
        for pool in pools {
            if !pool_exists(&mut tx, pool).await? {
                return Err(CatalogError::PoolNotFound);
            }
        }

        let mut stored = Vec::with_capacity(codes.len());
        for code in codes {
            let row: Option<CodeRow> = sqlx::query_as(&format!(
                r"
                INSERT INTO redemption_codes (id, code, pool_id, status, created_at, view_count, expires_at)
                VALUES ($1, $2, $3, 'unused', $4, 0, $5)
                ON CONFLICT (code) DO NOTHING
                RETURNING {CODE_COLUMNS}
                "
            ))
            .bind(code.id.as_uuid())
            .bind(&code.code)
            .bind(code.pool_id.as_uuid())
            .bind(code.created_at)
            .bind(code.expires_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to insert code", &e))?;

            if let Some(row) = row {
                stored.push(RedemptionCode::try_from(row)?);
            }
        }

        tx.commit().await.map_err(|e| db_error("Failed to commit", &e))?;
        Ok(stored)
    }

    async fn delete_code(&self, code: CodeId) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM redemption_codes WHERE id = $1 AND status = 'unused'")
            .bind(code.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete code", &e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM redemption_codes WHERE id = $1")
            .bind(code.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check code", &e))?;
        Err(if exists.is_some() {
            CatalogError::CodeActive
        } else {
            CatalogError::CodeNotFound
        })
    }

    async fn stats(&self) -> Result<InventoryStats, CatalogError> {
        let row = sqlx::query(
            r"
            SELECT
                (SELECT COUNT(*) FROM pools) AS total_pools,
                (SELECT COUNT(*) FROM inventory_items) AS total_items,
                (SELECT COUNT(*) FROM inventory_items WHERE status = 'available') AS available_items,
                (SELECT COUNT(*) FROM redemption_codes) AS total_codes,
                (SELECT COUNT(*) FROM redemption_codes WHERE status = 'unused') AS unused_codes
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load stats", &e))?;

        let get = |column: &str| -> Result<u64, CatalogError> {
            row.try_get::<i64, _>(column)
                .map(count)
                .map_err(|e| db_error("Failed to read stats", &e))
        };
        let total_items = get("total_items")?;
        let available_items = get("available_items")?;
        let total_codes = get("total_codes")?;
        let unused_codes = get("unused_codes")?;

        Ok(InventoryStats {
            total_pools: get("total_pools")?,
            total_items,
            available_items,
            assigned_items: total_items.saturating_sub(available_items),
            total_codes,
            unused_codes,
            active_codes: total_codes.saturating_sub(unused_codes),
        })
    }

    async fn recent_assignments(&self, limit: usize) -> Result<Vec<AssignmentRecord>, CatalogError> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            r"
            SELECT i.id AS item_id, p.name AS pool_name, i.account, c.code, i.assigned_at
            FROM inventory_items i
            JOIN redemption_codes c ON c.id = i.redemption_code_id
            JOIN pools p ON p.id = i.pool_id
            WHERE i.status = 'assigned'
            ORDER BY i.assigned_at DESC
            LIMIT $1
            ",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load recent assignments", &e))?;

        Ok(rows
            .into_iter()
            .map(|row| AssignmentRecord {
                item_id: ItemId::from_uuid(row.item_id),
                pool_name: row.pool_name,
                account: row.account,
                code: row.code,
                assigned_at: row.assigned_at,
            })
            .collect())
    }
}
