use crate::{
    app::AppState,
    config::CookieConfig,
    domain::{
        errors::ApiError,
        fields::{Email, PanCard, ReferralCode, Role},
        model::{NewUser, ReferralRecord, User},
    },
    utils::{
        jwt::{decode_auth_token, generate_auth_token},
        password::{hash_password, verify_password},
        referral::{generate_referral_code, verify_referral_code},
        uploads::FormData,
    },
};
use axum::{
    extract::{Multipart, State},
    headers::{authorization::Bearer, Authorization},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json, TypedHeader,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferrerSummary {
    pub name: String,
    pub referral_code: ReferralCode,
}

impl From<ReferralRecord> for ReferrerSummary {
    fn from(value: ReferralRecord) -> Self {
        Self {
            name: value.user_name,
            referral_code: value.code,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    success: bool,
    user: User,
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    referrer: Option<ReferrerSummary>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub fn session_cookie(config: &CookieConfig, token: String) -> Cookie<'static> {
    Cookie::build(config.name.clone(), token)
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(config.max_age_days))
        .finish()
}

fn expired_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build(config.name.clone(), "")
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::now_utc() - Duration::days(1))
        .finish()
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
    referrer: Option<ReferralRecord>,
) -> Result<(CookieJar, (StatusCode, Json<SessionResponse>)), ApiError> {
    let token = generate_auth_token(&user.id, &state.config.jwt)?;
    let jar = jar.add(session_cookie(&state.config.cookie, token.clone()));

    Ok((
        jar,
        (
            StatusCode::CREATED,
            Json(SessionResponse {
                success: true,
                user,
                token,
                referrer: referrer.map(|r| r.into()),
            }),
        ),
    ))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(CookieJar, (StatusCode, Json<SessionResponse>)), ApiError> {
    let form = state.uploads.read_form(multipart).await?;

    match register(&state, &form).await {
        Ok((user, referrer)) => {
            tracing::info!("registered user >>> {}", user.id);
            start_session(&state, jar, user, referrer)
        }
        Err(e) => {
            tracing::info!("registration rejected >>> {}", e.message());
            state.uploads.discard(form.file.as_deref()).await;
            Err(e.into_unexpected())
        }
    }
}

async fn register(
    state: &AppState,
    form: &FormData,
) -> Result<(User, Option<ReferralRecord>), ApiError> {
    let (Some(name), Some(password), Some(phone_number), Some(pan_card), Some(gender)) = (
        form.text("name"),
        form.secret("password"),
        form.text("phoneNumber"),
        form.text("panCard"),
        form.text("gender"),
    ) else {
        return Err(ApiError::validation("Please provide all the required fields"));
    };
    let pan_card = PanCard::parse(&pan_card)
        .ok_or_else(|| ApiError::validation("Please provide all the required fields"))?;
    let email = form.text("email").as_deref().and_then(Email::parse);
    let store = state.store.as_ref();

    let referrer = match form.text("inputReferralCode") {
        Some(input) => Some(
            verify_referral_code(store, &input)
                .await?
                .ok_or_else(|| ApiError::validation("Invalid referral code"))?,
        ),
        None => None,
    };

    let referral_code = generate_referral_code(store, &name).await?;

    if let Some(email) = &email {
        if store.get_user_by_email(email).await?.is_some() {
            return Err(ApiError::conflict("User already exists"));
        }
    }

    if store.get_user_by_pan_card(&pan_card).await?.is_some() {
        return Err(ApiError::conflict("PAN card is already registered"));
    }

    let avatar = form
        .file
        .clone()
        .unwrap_or_else(|| state.config.storage.default_avatar.clone());

    let user = store
        .create_user(NewUser {
            name,
            email,
            password: hash_password(password).await?,
            phone_number,
            pan_card,
            gender,
            avatar,
            referral_code,
            referrer: referrer.clone(),
        })
        .await?;

    Ok((user, referrer))
}

pub async fn login_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, (StatusCode, Json<SessionResponse>)), ApiError> {
    let (Some(email), Some(password)) = (
        payload.email.as_deref().and_then(Email::parse),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("Please provide all the fields"));
    };

    tracing::info!("authenticating user >>> {}", email);
    let user = state
        .store
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User doesn't exist"))?;

    if !verify_password(password, user.password.clone()).await {
        return Err(ApiError::auth("Please provide the correct information"));
    }

    start_session(&state, jar, user, None)
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, (StatusCode, Json<MessageResponse>)) {
    (
        jar.add(expired_cookie(&state.config.cookie)),
        (
            StatusCode::CREATED,
            Json(MessageResponse::new("Log out successful!")),
        ),
    )
}

/// Resolves the session from the cookie (or a bearer header) and exposes the
/// user to handlers as `Extension<User>`.
pub async fn check_auth<B>(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let token = jar
        .get(&state.config.cookie.name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| bearer.map(|TypedHeader(auth)| auth.token().to_string()))
        .ok_or(ApiError::Unauthenticated)?;

    let claims = decode_auth_token(&token, &state.config.jwt)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;
    let user = state
        .store
        .get_user_by_id(&user_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub async fn require_admin<B>(
    Extension(user): Extension<User>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    if user.role != Role::Admin {
        tracing::warn!("non-admin hit an admin route >>> {}", user.id);
        return Err(ApiError::Forbidden(format!(
            "{} can not access this resource",
            user.role.as_str()
        )));
    }

    Ok(next.run(request).await)
}
