use crate::domain::{
    errors::DatabaseError,
    fields::{Email, PanCard, ReferralCode, Role},
    model::{Address, NewUser, ReferralRecord, ReferralUsage, User},
};
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{missing_user, UserStore, ADDRESSES_CHANGED};

#[derive(Default)]
struct Tables {
    /// insertion order, oldest first
    users: Vec<User>,
    referral_codes: HashMap<ReferralCode, ReferralRecord>,
}

impl Tables {
    fn user(&self, id: &Uuid) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    fn user_mut(&mut self, id: &Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| &u.id == id)
    }

    fn email_taken(&self, email: &Email, except: Option<&Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email.as_ref() == Some(email) && Some(&u.id) != except)
    }
}

/// In-process `UserStore` with the same uniqueness and atomicity guarantees as
/// the Postgres schema. Every operation holds a single lock for its duration.
#[derive(Default)]
pub struct MemoryUserStore {
    tables: RwLock<Tables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roles are not editable through the API; this seeds admins for local runs.
    pub async fn set_role(&self, id: &Uuid, role: Role) -> bool {
        match self.tables.write().await.user_mut(id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.user(id).cloned())
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.as_ref() == Some(email))
            .cloned())
    }

    async fn get_user_by_pan_card(
        &self,
        pan_card: &PanCard,
    ) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| &u.pan_card == pan_card)
            .cloned())
    }

    async fn fetch_users(&self) -> Result<Vec<User>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.iter().rev().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;

        if let Some(email) = &new_user.email {
            if tables.email_taken(email, None) {
                return Err(DatabaseError::Conflict("User already exists".to_string()));
            }
        }
        if tables.users.iter().any(|u| u.pan_card == new_user.pan_card) {
            return Err(DatabaseError::Conflict(
                "PAN card is already registered".to_string(),
            ));
        }
        if tables.referral_codes.contains_key(&new_user.referral_code) {
            return Err(DatabaseError::Conflict("Record already exists".to_string()));
        }
        if let Some(referrer) = &new_user.referrer {
            if !tables.referral_codes.contains_key(&referrer.code) {
                return Err(DatabaseError::Query(format!(
                    "referral code {} does not exist",
                    referrer.code
                )));
            }
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password: new_user.password,
            phone_number: new_user.phone_number,
            pan_card: new_user.pan_card,
            gender: new_user.gender,
            avatar: new_user.avatar,
            role: Default::default(),
            addresses: Vec::new(),
            referral_code: new_user.referral_code.clone(),
            referred_by: new_user.referrer.as_ref().map(|r| r.user_id),
            created_at: now,
        };

        tables.referral_codes.insert(
            new_user.referral_code.clone(),
            ReferralRecord {
                code: new_user.referral_code,
                user_id: user.id,
                user_name: user.name.clone(),
                usages: Vec::new(),
                created_at: now,
            },
        );

        if let Some(referrer) = new_user.referrer {
            if let Some(record) = tables.referral_codes.get_mut(&referrer.code) {
                record.usages.push(ReferralUsage {
                    user_id: user.id,
                    user_name: user.name.clone(),
                    used_at: now,
                });
            }
        }

        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: &Uuid,
        name: &str,
        email: Option<&Email>,
        phone_number: &str,
    ) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;

        if let Some(email) = email {
            if tables.email_taken(email, Some(id)) {
                return Err(DatabaseError::Conflict("User already exists".to_string()));
            }
        }

        let stored = tables.user_mut(id).ok_or_else(|| missing_user(id))?;
        stored.name = name.to_string();
        stored.email = email.cloned();
        stored.phone_number = phone_number.to_string();

        for record in tables.referral_codes.values_mut() {
            if &record.user_id == id {
                record.user_name = name.to_string();
            }
        }

        Ok(())
    }

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let stored = tables.user_mut(id).ok_or_else(|| missing_user(id))?;
        stored.password = password_hash.to_string();
        Ok(())
    }

    async fn update_avatar(&self, id: &Uuid, avatar: &str) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let stored = tables.user_mut(id).ok_or_else(|| missing_user(id))?;
        stored.avatar = avatar.to_string();
        Ok(())
    }

    async fn update_addresses(
        &self,
        id: &Uuid,
        expected: &[Address],
        addresses: &[Address],
    ) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let stored = tables.user_mut(id).ok_or_else(|| missing_user(id))?;
        if stored.addresses != expected {
            return Err(DatabaseError::Conflict(ADDRESSES_CHANGED.to_string()));
        }
        stored.addresses = addresses.to_vec();
        Ok(())
    }

    async fn delete_user(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| &u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }

        // mirrors the schema's cascades
        tables.referral_codes.retain(|_, r| &r.user_id != id);
        for record in tables.referral_codes.values_mut() {
            record.usages.retain(|u| &u.user_id != id);
        }
        for user in tables.users.iter_mut() {
            if user.referred_by.as_ref() == Some(id) {
                user.referred_by = None;
            }
        }

        Ok(true)
    }

    async fn get_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<ReferralRecord>, DatabaseError> {
        Ok(self.tables.read().await.referral_codes.get(code).cloned())
    }

    async fn get_referral_code_by_owner(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<ReferralRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .referral_codes
            .values()
            .find(|r| &r.user_id == user_id)
            .cloned())
    }

    async fn redeem_referral(
        &self,
        referral: &ReferralRecord,
        user: &User,
    ) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;

        if !tables.referral_codes.contains_key(&referral.code) {
            return Err(DatabaseError::Query(format!(
                "referral code {} does not exist",
                referral.code
            )));
        }

        let Some(stored) = tables.user_mut(&user.id) else {
            return Err(DatabaseError::Query(format!("user {} does not exist", user.id)));
        };
        if stored.referred_by.is_some() {
            return Err(DatabaseError::Conflict(
                "You have already used a referral code".to_string(),
            ));
        }
        stored.referred_by = Some(referral.user_id);
        let user_name = stored.name.clone();

        if let Some(record) = tables.referral_codes.get_mut(&referral.code) {
            record.usages.push(ReferralUsage {
                user_id: user.id,
                user_name,
                used_at: OffsetDateTime::now_utc(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: Option<&str>, pan: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.and_then(Email::parse),
            password: "hash".to_string(),
            phone_number: "5550100".to_string(),
            pan_card: PanCard::parse(pan).unwrap(),
            gender: "female".to_string(),
            avatar: "default-avatar.png".to_string(),
            referral_code: ReferralCode::new(name),
            referrer: None,
        }
    }

    #[tokio::test]
    async fn create_user_also_creates_its_referral_code() {
        let store = MemoryUserStore::new();
        let user = store
            .create_user(new_user("alice", Some("a@shop.io"), "AAAAA1111A"))
            .await
            .unwrap();

        let record = store
            .get_referral_code(&user.referral_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user.id);
        assert!(record.usages.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_or_pan_is_rejected_without_side_effects() {
        let store = MemoryUserStore::new();
        store
            .create_user(new_user("alice", Some("a@shop.io"), "AAAAA1111A"))
            .await
            .unwrap();

        let dup_email = store
            .create_user(new_user("bob", Some("a@shop.io"), "BBBBB2222B"))
            .await;
        assert!(matches!(dup_email, Err(DatabaseError::Conflict(_))));

        let dup_pan = store
            .create_user(new_user("carol", None, "aaaaa1111a"))
            .await;
        assert!(matches!(dup_pan, Err(DatabaseError::Conflict(_))));

        assert_eq!(store.fetch_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redeem_referral_is_one_time() {
        let store = MemoryUserStore::new();
        let alice = store
            .create_user(new_user("alice", None, "AAAAA1111A"))
            .await
            .unwrap();
        let bob = store
            .create_user(new_user("bob", None, "BBBBB2222B"))
            .await
            .unwrap();
        let code = store
            .get_referral_code(&alice.referral_code)
            .await
            .unwrap()
            .unwrap();

        store.redeem_referral(&code, &bob).await.unwrap();
        let again = store.redeem_referral(&code, &bob).await;
        assert!(matches!(again, Err(DatabaseError::Conflict(_))));

        let code = store
            .get_referral_code(&alice.referral_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code.usages.len(), 1);
        assert_eq!(code.usages[0].user_id, bob.id);
        let bob = store.get_user_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(bob.referred_by, Some(alice.id));
    }

    #[tokio::test]
    async fn narrow_writes_leave_other_columns_alone() {
        let store = MemoryUserStore::new();
        let alice = store
            .create_user(new_user("alice", Some("a@shop.io"), "AAAAA1111A"))
            .await
            .unwrap();
        let stale = store.get_user_by_id(&alice.id).await.unwrap().unwrap();

        store.update_password(&alice.id, "new-hash").await.unwrap();
        store.update_avatar(&alice.id, "new.png").await.unwrap();
        store
            .update_profile(&alice.id, "Alice B", stale.email.as_ref(), &stale.phone_number)
            .await
            .unwrap();

        let alice = store.get_user_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(alice.password, "new-hash");
        assert_eq!(alice.avatar, "new.png");
        assert_eq!(alice.name, "Alice B");
        let code = store
            .get_referral_code(&alice.referral_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code.user_name, "Alice B");
    }

    #[tokio::test]
    async fn racing_address_edits_do_not_overwrite_each_other() {
        let store = MemoryUserStore::new();
        let alice = store
            .create_user(new_user("alice", None, "AAAAA1111A"))
            .await
            .unwrap();
        let address = |kind: &str| Address {
            id: Uuid::new_v4(),
            address_type: kind.to_string(),
            country: None,
            city: None,
            address1: None,
            address2: None,
            zip_code: None,
        };

        let home = vec![address("home")];
        let work = vec![address("work")];
        store.update_addresses(&alice.id, &[], &home).await.unwrap();
        let lost = store.update_addresses(&alice.id, &[], &work).await;
        assert!(matches!(lost, Err(DatabaseError::Conflict(_))));

        let alice = store.get_user_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(alice.addresses, home);
    }

    #[tokio::test]
    async fn writes_to_a_deleted_user_fail() {
        let store = MemoryUserStore::new();
        let ghost = Uuid::new_v4();

        assert!(matches!(
            store.update_avatar(&ghost, "x.png").await,
            Err(DatabaseError::NotFound(_))
        ));
        assert!(matches!(
            store.update_password(&ghost, "hash").await,
            Err(DatabaseError::NotFound(_))
        ));
        assert!(matches!(
            store.update_addresses(&ghost, &[], &[]).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_referrer_clears_links() {
        let store = MemoryUserStore::new();
        let alice = store
            .create_user(new_user("alice", None, "AAAAA1111A"))
            .await
            .unwrap();
        let code = store
            .get_referral_code(&alice.referral_code)
            .await
            .unwrap();
        let mut bob = new_user("bob", None, "BBBBB2222B");
        bob.referrer = code;
        let bob = store.create_user(bob).await.unwrap();

        assert!(store.delete_user(&alice.id).await.unwrap());
        assert!(!store.delete_user(&alice.id).await.unwrap());

        let bob = store.get_user_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(bob.referred_by, None);
        assert!(store
            .get_referral_code(&alice.referral_code)
            .await
            .unwrap()
            .is_none());
    }
}
