use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::ApiError,
        fields::Email,
        model::{Address, PublicUser, User},
    },
    routes::auth::MessageResponse,
    utils::password::{hash_password, verify_password},
};
use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
pub struct UserResponse {
    success: bool,
    user: User,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            success: true,
            user,
        }
    }
}

#[derive(Serialize)]
pub struct PublicUserResponse {
    success: bool,
    user: PublicUser,
}

#[derive(Serialize)]
pub struct GetUsersResponse {
    success: bool,
    users: Vec<User>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInfoRequest {
    name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    id: Option<Uuid>,
    address_type: Option<String>,
    country: Option<String>,
    city: Option<String>,
    address1: Option<String>,
    address2: Option<String>,
    zip_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
    confirm_password: Option<String>,
}

/// The session user as currently stored; the copy in the extension may be stale.
async fn load_session_user(state: &AppState, session: &User) -> Result<User, ApiError> {
    state
        .store
        .get_user_by_id(&session.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User doesn't exist"))
}

pub async fn get_authenticated_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = load_session_user(&state, &session).await?;
    Ok(Json(user.into()))
}

/// Email is a field to update here, never a lookup key: the password is checked
/// against the session user's own record.
pub async fn update_user_info(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
    Json(payload): Json<UpdateUserInfoRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("Please provide your password"))?;
    let mut user = load_session_user(&state, &session).await?;

    if !verify_password(password, user.password.clone()).await {
        return Err(ApiError::auth("Please provide the correct information"));
    }

    if let Some(email) = payload.email.as_deref().and_then(Email::parse) {
        if user.email.as_ref() != Some(&email) {
            let owner = state.store.get_user_by_email(&email).await?;
            if owner.map_or(false, |o| o.id != user.id) {
                return Err(ApiError::conflict("Email is already in use"));
            }
            user.email = Some(email);
        }
    }
    if let Some(name) = payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        user.name = name;
    }
    if let Some(phone) = payload
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
    {
        user.phone_number = phone;
    }

    state
        .store
        .update_profile(&user.id, &user.name, user.email.as_ref(), &user.phone_number)
        .await?;
    tracing::info!("updated user info >>> {}", user.id);

    Ok(Json(user.into()))
}

pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
    multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let form = state.uploads.read_form(multipart).await?;
    let Some(filename) = form.file else {
        return Err(ApiError::validation("Please upload an image"));
    };

    let mut user = match load_session_user(&state, &session).await {
        Ok(user) => user,
        Err(e) => {
            state.uploads.discard(Some(filename.as_str())).await;
            return Err(e);
        }
    };

    if let Err(e) = state.store.update_avatar(&user.id, &filename).await {
        state.uploads.discard(Some(filename.as_str())).await;
        return Err(e.into());
    }

    // the old file goes only once the record points at the new one
    let previous = std::mem::replace(&mut user.avatar, filename);
    if previous != state.config.storage.default_avatar {
        if let Err(e) = state.uploads.delete(&previous).await {
            tracing::warn!("could not remove previous avatar {} >>> {}", previous, e);
        }
    }

    Ok(Json(user.into()))
}

/// One address per type. A matching `id` updates that entry in place, any other
/// request appends a new entry.
pub async fn update_user_addresses(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
    Json(payload): Json<AddressRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let address_type = payload
        .address_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation("Please provide an address type"))?;
    let mut user = load_session_user(&state, &session).await?;
    let loaded = user.addresses.clone();

    let clash = user
        .addresses
        .iter()
        .find(|a| a.address_type == address_type)
        .map(|a| a.id);
    if let Some(clash_id) = clash {
        if payload.id != Some(clash_id) {
            return Err(ApiError::conflict(format!(
                "{} address already exists",
                address_type
            )));
        }
    }

    let existing = payload
        .id
        .and_then(|id| user.addresses.iter_mut().find(|a| a.id == id));
    match existing {
        Some(address) => {
            address.address_type = address_type;
            if payload.country.is_some() {
                address.country = payload.country;
            }
            if payload.city.is_some() {
                address.city = payload.city;
            }
            if payload.address1.is_some() {
                address.address1 = payload.address1;
            }
            if payload.address2.is_some() {
                address.address2 = payload.address2;
            }
            if payload.zip_code.is_some() {
                address.zip_code = payload.zip_code;
            }
        }
        None => user.addresses.push(Address {
            id: Uuid::new_v4(),
            address_type,
            country: payload.country,
            city: payload.city,
            address1: payload.address1,
            address2: payload.address2,
            zip_code: payload.zip_code,
        }),
    }

    state
        .store
        .update_addresses(&user.id, &loaded, &user.addresses)
        .await?;
    Ok(Json(user.into()))
}

/// Removing an id that is not in the list leaves the user unchanged.
pub async fn delete_user_address(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
    Path(address_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut user = load_session_user(&state, &session).await?;

    if let Ok(address_id) = Uuid::parse_str(&address_id) {
        let loaded = user.addresses.clone();
        user.addresses.retain(|a| a.id != address_id);
        if user.addresses.len() != loaded.len() {
            state
                .store
                .update_addresses(&user.id, &loaded, &user.addresses)
                .await?;
        }
    }

    Ok(Json(user.into()))
}

pub async fn update_user_password(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<User>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(old_password), Some(new_password), Some(confirm_password)) = (
        payload.old_password,
        payload.new_password.filter(|p| !p.is_empty()),
        payload.confirm_password,
    ) else {
        return Err(ApiError::validation("Please provide all the fields"));
    };
    let user = load_session_user(&state, &session).await?;

    if !verify_password(old_password, user.password.clone()).await {
        return Err(ApiError::auth("Old password is incorrect!"));
    }

    if new_password != confirm_password {
        return Err(ApiError::validation(
            "Password doesn't match with each other!",
        ));
    }

    let password_hash = hash_password(new_password).await?;
    state.store.update_password(&user.id, &password_hash).await?;
    tracing::info!("password changed >>> {}", user.id);

    Ok(Json(MessageResponse::new("Password updated successfully!")))
}

pub async fn get_user_info(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicUserResponse>, ApiError> {
    let user_id =
        Uuid::parse_str(&user_id).map_err(|_| ApiError::not_found("User doesn't exist"))?;
    let user = state
        .store
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User doesn't exist"))?;

    Ok(Json(PublicUserResponse {
        success: true,
        user: user.into(),
    }))
}

pub async fn get_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GetUsersResponse>, ApiError> {
    let users = state.store.fetch_users().await?;
    Ok(Json(GetUsersResponse {
        success: true,
        users,
    }))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let not_found = || ApiError::not_found("User is not available with this id!");
    let user_id = Uuid::parse_str(&user_id).map_err(|_| not_found())?;
    let user = state
        .store
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(not_found)?;

    if !state.store.delete_user(&user.id).await? {
        return Err(not_found());
    }
    tracing::info!("admin {} deleted user >>> {}", admin.id, user.id);

    if user.avatar != state.config.storage.default_avatar {
        state.uploads.discard(Some(user.avatar.as_str())).await;
    }

    Ok(Json(MessageResponse::new("User deleted successfully!")))
}
