//! Redemption endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use nexus_core::RedemptionResult;
use nexus_core::lock::LockService;
use nexus_core::store::InventoryStore;
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/redeem`.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Code as typed by the user; normalized by the engine
    pub code: String,
}

/// Successful response body.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    /// Always `true`; failures use the error body instead
    pub success: bool,
    /// The redeemed item and code counters
    #[serde(flatten)]
    pub result: RedemptionResult,
}

/// Redeem a code.
///
/// ```text
/// POST /api/redeem
/// {"code": "abcd-efgh"}
///
/// 200 {"success":true,"account":"…","password":"…","pool_name":"…","view_count":1,…}
/// ```
///
/// # Errors
///
/// A malformed body is `400 INVALID_INPUT`; engine failures map as in
/// [`AppError`]'s `From<RedeemError>`.
pub async fn redeem<S, L>(
    State(state): State<AppState<S, L>>,
    body: Result<Json<RedeemRequest>, JsonRejection>,
) -> Result<Json<RedeemResponse>, AppError>
where
    S: InventoryStore + 'static,
    L: LockService + 'static,
{
    let Json(request) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let result = state.engine().redeem(&request.code).await?;
    Ok(Json(RedeemResponse { success: true, result }))
}
