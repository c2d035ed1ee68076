use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::ApiError,
        fields::Role,
        model::{ReferralRecord, User},
    },
    routes::auth::ReferrerSummary,
    utils::referral::apply_referral_code,
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReferralRequest {
    referral_code: Option<String>,
    user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ApplyReferralResponse {
    success: bool,
    message: String,
    referrer: ReferrerSummary,
}

#[derive(Serialize)]
pub struct ReferredBy {
    id: Uuid,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralInfoResponse {
    success: bool,
    referral: Option<ReferralRecord>,
    referred_by: Option<ReferredBy>,
}

/// The target defaults to the session user; only admins may name someone else.
pub async fn apply_referral(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
    Json(payload): Json<ApplyReferralRequest>,
) -> Result<Json<ApplyReferralResponse>, ApiError> {
    let code = payload
        .referral_code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Please provide a referral code"))?;

    let target = payload.user_id.unwrap_or(session.id);
    if target != session.id && session.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "You can only apply a referral code to your own account".to_string(),
        ));
    }

    let referral = apply_referral_code(state.store.as_ref(), &code, &target).await?;

    Ok(Json(ApplyReferralResponse {
        success: true,
        message: "Referral code applied successfully".to_string(),
        referrer: referral.into(),
    }))
}

pub async fn get_referral_info(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
) -> Result<Json<ReferralInfoResponse>, ApiError> {
    let user = state
        .store
        .get_user_by_id(&session.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User doesn't exist"))?;
    let referral = state.store.get_referral_code_by_owner(&user.id).await?;

    let referred_by = match user.referred_by {
        Some(referrer_id) => state
            .store
            .get_user_by_id(&referrer_id)
            .await?
            .map(|r| ReferredBy {
                id: r.id,
                name: r.name,
            }),
        None => None,
    };

    Ok(Json(ReferralInfoResponse {
        success: true,
        referral,
        referred_by,
    }))
}
