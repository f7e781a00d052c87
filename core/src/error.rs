//! Error types for redemption, storage, locking and catalog administration.

use thiserror::Error;

/// Result type alias for redemption operations.
pub type Result<T> = std::result::Result<T, RedeemError>;

/// Failure of a redemption attempt.
///
/// Every variant is user-legible; none of them is ever swallowed on the way
/// to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedeemError {
    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// The code is empty or malformed.
    #[error("Invalid redemption code: {reason}")]
    InvalidInput {
        /// What was wrong with the input
        reason: String,
    },

    /// No such code exists.
    #[error("Redemption code not found")]
    NotFound,

    /// The code was never used and is past its expiry.
    #[error("Redemption code has expired")]
    Expired,

    // ═══════════════════════════════════════════════════════════
    // Capacity Errors
    // ═══════════════════════════════════════════════════════════

    /// The code's pool has no available inventory left.
    #[error("Out of stock, please contact support")]
    OutOfStock,

    /// The per-code lock could not be acquired in time.
    #[error("System busy, please retry later")]
    Busy,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The transactional store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RedeemError {
    /// Build an [`RedeemError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying the same request later may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nexus_core::RedeemError;
    /// assert!(RedeemError::Busy.is_retryable());
    /// assert!(!RedeemError::NotFound.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::Store(_))
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::OutOfStock => "out_of_stock",
            Self::Busy => "busy",
            Self::Store(_) => "store_error",
        }
    }
}

/// Failure of the transactional store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Query or commit failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The operation did not complete before the deadline.
    #[error("Store operation timed out")]
    Timeout,

    /// Persisted state violates a data-model invariant.
    #[error("Inconsistent store state: {0}")]
    Inconsistent(String),
}

/// Failure of the backing lock service.
///
/// The lock adapter turns [`LockError::Unavailable`] into degraded mode rather
/// than propagating it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock service could not be reached.
    #[error("Lock service unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a catalog administration operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Rejected input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Pool does not exist.
    #[error("Pool not found")]
    PoolNotFound,

    /// Pool still owns items or codes.
    #[error("Pool still has {items} item(s) and {codes} code(s)")]
    PoolNotEmpty {
        /// Items owned by the pool
        items: u64,
        /// Codes owned by the pool
        codes: u64,
    },

    /// Item does not exist.
    #[error("Inventory item not found")]
    ItemNotFound,

    /// Item is bound to a code and cannot be removed.
    #[error("Inventory item is already assigned")]
    ItemAssigned,

    /// Code does not exist.
    #[error("Redemption code not found")]
    CodeNotFound,

    /// Code is bound to an item and cannot be removed.
    #[error("Redemption code is already active")]
    CodeActive,

    /// Could not produce enough unique codes.
    #[error("Failed to generate {requested} unique codes ({generated} generated)")]
    CodeGenerationExhausted {
        /// Codes asked for
        requested: usize,
        /// Codes actually stored
        generated: usize,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
