use crate::domain::{
    errors::DatabaseError,
    fields::{Email, PanCard, ReferralCode},
    model::{Address, NewUser, ReferralRecord, User},
};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

pub(crate) const ADDRESSES_CHANGED: &str =
    "Addresses were changed by another request, please try again";

pub(crate) fn missing_user(id: &Uuid) -> DatabaseError {
    tracing::warn!("write to a missing user >>> {}", id);
    DatabaseError::NotFound("User doesn't exist".to_string())
}

/// Persistence for user accounts and the referral codes they own.
///
/// Multi-step writes (`create_user`, `redeem_referral`) are atomic: either every
/// record they touch is written or none is. The `update_*` writes touch only
/// their own columns and fail with `DatabaseError::NotFound` when the user is gone.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, DatabaseError>;

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, DatabaseError>;

    async fn get_user_by_pan_card(&self, pan_card: &PanCard)
        -> Result<Option<User>, DatabaseError>;

    /// All users, newest first.
    async fn fetch_users(&self) -> Result<Vec<User>, DatabaseError>;

    /// Inserts the user and its referral code. When `new_user.referrer` is set the
    /// user is linked to the referrer and a usage is recorded on the referrer's code.
    async fn create_user(&self, new_user: NewUser) -> Result<User, DatabaseError>;

    /// Writes name, email and phone number only. Also renames the owner on the
    /// user's referral code.
    async fn update_profile(
        &self,
        id: &Uuid,
        name: &str,
        email: Option<&Email>,
        phone_number: &str,
    ) -> Result<(), DatabaseError>;

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<(), DatabaseError>;

    async fn update_avatar(&self, id: &Uuid, avatar: &str) -> Result<(), DatabaseError>;

    /// Replaces the address list only if it still equals `expected`, so two edits
    /// racing on the same list cannot drop each other's entries.
    async fn update_addresses(
        &self,
        id: &Uuid,
        expected: &[Address],
        addresses: &[Address],
    ) -> Result<(), DatabaseError>;

    /// Returns false when no user had that id.
    async fn delete_user(&self, id: &Uuid) -> Result<bool, DatabaseError>;

    async fn get_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<ReferralRecord>, DatabaseError>;

    async fn get_referral_code_by_owner(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<ReferralRecord>, DatabaseError>;

    /// Sets `referred_by` on a user that has none yet and records the usage.
    /// Fails with `DatabaseError::Conflict` if the user was already referred.
    async fn redeem_referral(
        &self,
        referral: &ReferralRecord,
        user: &User,
    ) -> Result<(), DatabaseError>;
}
