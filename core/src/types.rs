//! Domain types for pools, inventory items and redemption codes.
//!
//! A [`Pool`] partitions inventory and codes. Each [`InventoryItem`] is
//! claimed at most once, by exactly one [`RedemptionCode`] of the same pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(Uuid);

impl PoolId {
    /// Creates a new random `PoolId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PoolId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an inventory item
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Creates a new random `ItemId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `ItemId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a redemption code record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeId(Uuid);

impl CodeId {
    /// Creates a new random `CodeId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CodeId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Pool
// ============================================================================

/// A named partition of inventory and codes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier
    pub id: PoolId,
    /// Display name
    pub name: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Pool {
    /// Create a new pool.
    #[must_use]
    pub fn new(name: impl Into<String>, description: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: PoolId::new(),
            name: name.into(),
            description,
            created_at,
        }
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Credential bundle handed out on redemption.
///
/// The engine never inspects these fields; they are copied verbatim into the
/// redemption result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPayload {
    /// Primary identifier (login, email, ...)
    pub account: String,
    /// Primary secret
    pub password: String,
    /// Auxiliary secret (TOTP seed)
    pub totp_secret: Option<String>,
    /// Free-form metadata
    pub extra_info: Option<String>,
}

impl AccountPayload {
    /// Create a payload with just an account and password.
    #[must_use]
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            totp_secret: None,
            extra_info: None,
        }
    }

    /// Attach a TOTP secret.
    #[must_use]
    pub fn with_totp_secret(mut self, secret: impl Into<String>) -> Self {
        self.totp_secret = Some(secret.into());
        self
    }

    /// Attach free-form metadata.
    #[must_use]
    pub fn with_extra_info(mut self, extra: impl Into<String>) -> Self {
        self.extra_info = Some(extra.into());
        self
    }

    /// A payload is importable when both account and password are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.account.trim().is_empty() && !self.password.trim().is_empty()
    }
}

/// Inventory item status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not yet handed out
    Available,
    /// Bound to a redemption code
    Assigned,
}

impl ItemStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "assigned" => Some(Self::Assigned),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One redeemable unit of inventory.
///
/// `status == Assigned` iff `bound_code` is set iff `assigned_at` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item identifier
    pub id: ItemId,
    /// Owning pool
    pub pool_id: PoolId,
    /// Credential bundle
    pub payload: AccountPayload,
    /// Current status
    pub status: ItemStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Assignment time (set once)
    pub assigned_at: Option<DateTime<Utc>>,
    /// Code this item is bound to (set once)
    pub bound_code: Option<CodeId>,
}

impl InventoryItem {
    /// Create a new available item.
    #[must_use]
    pub fn new(pool_id: PoolId, payload: AccountPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            pool_id,
            payload,
            status: ItemStatus::Available,
            created_at,
            assigned_at: None,
            bound_code: None,
        }
    }

    /// Whether the item can still be reserved.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::Available
    }
}

// ============================================================================
// Redemption codes
// ============================================================================

/// Redemption code status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    /// Never redeemed
    Unused,
    /// Bound to an inventory item
    Active,
}

impl CodeStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Active => "active",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unused" => Some(Self::Unused),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

impl fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-use claim ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionCode {
    /// Record identifier
    pub id: CodeId,
    /// Normalized (trimmed, uppercase) code string
    pub code: String,
    /// Owning pool
    pub pool_id: PoolId,
    /// Current status
    pub status: CodeStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the first successful redemption
    pub first_used_at: Option<DateTime<Utc>>,
    /// Time of the latest successful redemption
    pub last_used_at: Option<DateTime<Utc>>,
    /// Number of successful redemptions, the first one included
    pub view_count: u32,
    /// Unused codes cannot be redeemed at or after this instant
    pub expires_at: Option<DateTime<Utc>>,
}

impl RedemptionCode {
    /// Create a new unused code. The code string is normalized.
    #[must_use]
    pub fn new(
        code: &str,
        pool_id: PoolId,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: CodeId::new(),
            code: crate::code::normalize(code),
            pool_id,
            status: CodeStatus::Unused,
            created_at,
            first_used_at: None,
            last_used_at: None,
            view_count: 0,
            expires_at,
        }
    }

    /// Whether the code is already bound to an item.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == CodeStatus::Active
    }

    /// Whether the expiry timestamp has been reached at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}
