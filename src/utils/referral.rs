//! Referral code issuance and redemption.

use uuid::Uuid;

use crate::{
    domain::{
        errors::{ApiError, DatabaseError},
        fields::ReferralCode,
        model::ReferralRecord,
    },
    repository::UserStore,
};

/// Draws codes until one is not yet owned by anybody.
pub async fn generate_referral_code(
    store: &dyn UserStore,
    name: &str,
) -> Result<ReferralCode, DatabaseError> {
    let mut code = ReferralCode::new(name);
    while store.get_referral_code(&code).await?.is_some() {
        tracing::debug!("referral code collision >>> {}", code);
        code = ReferralCode::new(name);
    }
    Ok(code)
}

/// Resolves a code typed in by a user to the record of its owner.
pub async fn verify_referral_code(
    store: &dyn UserStore,
    input: &str,
) -> Result<Option<ReferralRecord>, DatabaseError> {
    match ReferralCode::parse(input) {
        Some(code) => store.get_referral_code(&code).await,
        None => Ok(None),
    }
}

/// Links `target_user_id` to the owner of `input` and records the usage.
///
/// A user can be referred once, and never by their own code.
pub async fn apply_referral_code(
    store: &dyn UserStore,
    input: &str,
    target_user_id: &Uuid,
) -> Result<ReferralRecord, ApiError> {
    let referral = verify_referral_code(store, input)
        .await?
        .ok_or_else(|| ApiError::not_found("Invalid referral code"))?;

    if &referral.user_id == target_user_id {
        return Err(ApiError::validation("Cannot use your own referral code"));
    }

    let user = store
        .get_user_by_id(target_user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.referred_by.is_some() {
        return Err(ApiError::validation("You have already used a referral code"));
    }

    store
        .redeem_referral(&referral, &user)
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(message) => ApiError::Validation(message),
            other => other.into(),
        })?;

    tracing::info!(
        "referral applied >>> code {} referrer {} referee {}",
        referral.code,
        referral.user_id,
        user.id
    );

    Ok(referral)
}
