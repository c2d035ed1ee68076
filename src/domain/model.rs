use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::fields::{Email, PanCard, ReferralCode, Role};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub address_type: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<Email>,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone_number: String,
    pub pan_card: PanCard,
    pub gender: String,
    pub avatar: String,
    pub role: Role,
    pub addresses: Vec<Address>,
    pub referral_code: ReferralCode,
    pub referred_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What `/user-info/:id` exposes about an arbitrary account.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar: value.avatar,
            role: value.role,
            created_at: value.created_at,
        }
    }
}

/// Everything registration needs to persist a user together with its referral code.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: Option<Email>,
    pub password: String,
    pub phone_number: String,
    pub pan_card: PanCard,
    pub gender: String,
    pub avatar: String,
    pub referral_code: ReferralCode,
    pub referrer: Option<ReferralRecord>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReferralUsage {
    pub user_id: Uuid,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub used_at: OffsetDateTime,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRecord {
    pub code: ReferralCode,
    pub user_id: Uuid,
    pub user_name: String,
    pub usages: Vec<ReferralUsage>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub(crate) name: String,
    pub(crate) email: Option<String>,
    pub(crate) password: String,
    pub(crate) phone_number: String,
    pub(crate) pan_card: String,
    pub(crate) gender: String,
    pub(crate) avatar: String,
    pub(crate) role: String,
    pub(crate) addresses: Json<Vec<Address>>,
    pub(crate) referral_code: String,
    pub(crate) referred_by: Option<Uuid>,
    pub(crate) created_at: OffsetDateTime,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email.map(Email::from),
            password: value.password,
            phone_number: value.phone_number,
            pan_card: value.pan_card.into(),
            gender: value.gender,
            avatar: value.avatar,
            role: value.role.into(),
            addresses: value.addresses.0,
            referral_code: value.referral_code.into(),
            referred_by: value.referred_by,
            created_at: value.created_at,
        }
    }
}

#[derive(FromRow)]
pub struct DbReferralCode {
    pub(crate) code: String,
    pub(crate) user_id: Uuid,
    pub(crate) user_name: String,
    pub(crate) created_at: OffsetDateTime,
}

#[derive(FromRow)]
pub struct DbReferralUsage {
    pub(crate) user_id: Uuid,
    pub(crate) user_name: String,
    pub(crate) used_at: OffsetDateTime,
}

impl From<DbReferralUsage> for ReferralUsage {
    fn from(value: DbReferralUsage) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            used_at: value.used_at,
        }
    }
}

impl DbReferralCode {
    pub fn into_record(self, usages: Vec<DbReferralUsage>) -> ReferralRecord {
        ReferralRecord {
            code: self.code.into(),
            user_id: self.user_id,
            user_name: self.user_name,
            usages: usages.into_iter().map(|u| u.into()).collect(),
            created_at: self.created_at,
        }
    }
}
