//! Row types and their conversion into domain types.

use chrono::{DateTime, Utc};
use nexus_core::{
    AccountPayload, CodeId, CodeStatus, InventoryItem, ItemId, ItemStatus, Pool, PoolId, RedemptionCode, StoreError,
};
use uuid::Uuid;

/// Columns selected for a code, in order.
pub(crate) const CODE_COLUMNS: &str =
    "id, code, pool_id, status, created_at, first_used_at, last_used_at, view_count, expires_at";

/// Columns selected for an item, in order.
pub(crate) const ITEM_COLUMNS: &str =
    "id, pool_id, account, password, totp_secret, extra_info, status, created_at, assigned_at, redemption_code_id";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PoolRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PoolRow> for Pool {
    fn from(row: PoolRow) -> Self {
        Self {
            id: PoolId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CodeRow {
    pub id: Uuid,
    pub code: String,
    pub pool_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub first_used_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub view_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<CodeRow> for RedemptionCode {
    type Error = StoreError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        let status = CodeStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Inconsistent(format!("unknown code status: {}", row.status)))?;
        let view_count = u32::try_from(row.view_count)
            .map_err(|_| StoreError::Inconsistent(format!("negative view count on code {}", row.id)))?;
        Ok(Self {
            id: CodeId::from_uuid(row.id),
            code: row.code,
            pool_id: PoolId::from_uuid(row.pool_id),
            status,
            created_at: row.created_at,
            first_used_at: row.first_used_at,
            last_used_at: row.last_used_at,
            view_count,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub account: String,
    pub password: String,
    pub totp_secret: Option<String>,
    pub extra_info: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub redemption_code_id: Option<Uuid>,
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let status = ItemStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Inconsistent(format!("unknown item status: {}", row.status)))?;
        Ok(Self {
            id: ItemId::from_uuid(row.id),
            pool_id: PoolId::from_uuid(row.pool_id),
            payload: AccountPayload {
                account: row.account,
                password: row.password,
                totp_secret: row.totp_secret,
                extra_info: row.extra_info,
            },
            status,
            created_at: row.created_at,
            assigned_at: row.assigned_at,
            bound_code: row.redemption_code_id.map(CodeId::from_uuid),
        })
    }
}

/// A code joined with its pool name and, if bound, its item.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CodeLookupRow {
    #[sqlx(flatten)]
    pub code: CodeRow,
    pub pool_name: String,
    pub item_id: Option<Uuid>,
    pub item_pool_id: Option<Uuid>,
    pub item_account: Option<String>,
    pub item_password: Option<String>,
    pub item_totp_secret: Option<String>,
    pub item_extra_info: Option<String>,
    pub item_status: Option<String>,
    pub item_created_at: Option<DateTime<Utc>>,
    pub item_assigned_at: Option<DateTime<Utc>>,
}

impl CodeLookupRow {
    /// Split into the code and the bound item, if the join found one.
    pub fn into_parts(self) -> Result<(RedemptionCode, String, Option<InventoryItem>), StoreError> {
        let code_id = self.code.id;
        let item = match (
            self.item_id,
            self.item_pool_id,
            self.item_account,
            self.item_password,
            self.item_status,
            self.item_created_at,
        ) {
            (Some(id), Some(pool_id), Some(account), Some(password), Some(status), Some(created_at)) => {
                Some(InventoryItem::try_from(ItemRow {
                    id,
                    pool_id,
                    account,
                    password,
                    totp_secret: self.item_totp_secret,
                    extra_info: self.item_extra_info,
                    status,
                    created_at,
                    assigned_at: self.item_assigned_at,
                    redemption_code_id: Some(code_id),
                })?)
            },
            _ => None,
        };
        Ok((RedemptionCode::try_from(self.code)?, self.pool_name, item))
    }
}
