//! Shapes a bound item and its code into the payload returned to the caller.

use crate::types::{InventoryItem, RedemptionCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Successful redemption as seen by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionResult {
    /// Account field of the item
    pub account: String,
    /// Primary secret
    pub password: String,
    /// TOTP secret, if the item has one
    pub totp_secret: Option<String>,
    /// Free-form metadata, if any
    pub extra_info: Option<String>,
    /// Name of the pool the item came from
    pub pool_name: String,
    /// Successful redemptions of this code so far, this one included
    pub view_count: u32,
    /// When the code was first redeemed
    pub first_used_at: Option<DateTime<Utc>>,
}

impl RedemptionResult {
    /// Project an item and the code it is bound to.
    #[must_use]
    pub fn project(item: &InventoryItem, code: &RedemptionCode, pool_name: &str) -> Self {
        Self {
            account: item.payload.account.clone(),
            password: item.payload.password.clone(),
            totp_secret: item.payload.totp_secret.clone(),
            extra_info: item.payload.extra_info.clone(),
            pool_name: pool_name.to_string(),
            view_count: code.view_count,
            first_used_at: code.first_used_at,
        }
    }
}
