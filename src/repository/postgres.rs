use crate::domain::{
    errors::DatabaseError,
    fields::{Email, PanCard, ReferralCode},
    model::{Address, DbReferralCode, DbReferralUsage, DbUser, NewUser, ReferralRecord, User},
};
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{missing_user, UserStore, ADDRESSES_CHANGED};

fn ensure_updated(rows: u64, id: &Uuid) -> Result<(), DatabaseError> {
    if rows == 0 {
        return Err(missing_user(id));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get_user_where(
        &self,
        column: &'static str,
        value: String,
    ) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, DbUser>(&format!(
            "select * from users where {} = $1",
            column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("get user by {} failed >>> {}", column, e);
            DatabaseError::from(e)
        })?;

        Ok(user.map(|u| u.into()))
    }

    async fn attach_usages(
        &self,
        code: Option<DbReferralCode>,
    ) -> Result<Option<ReferralRecord>, DatabaseError> {
        let Some(code) = code else {
            return Ok(None);
        };

        let usages = sqlx::query_as::<_, DbReferralUsage>(
            "select user_id, user_name, used_at from referral_usages where code = $1 order by used_at asc, id asc",
        )
        .bind(&code.code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("fetching referral usages failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        Ok(Some(code.into_record(usages)))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, DbUser>("select * from users where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("get user by id failed >>> {}", e);
                DatabaseError::from(e)
            })?;

        Ok(user.map(|u| u.into()))
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, DatabaseError> {
        self.get_user_where("email", email.inner()).await
    }

    async fn get_user_by_pan_card(
        &self,
        pan_card: &PanCard,
    ) -> Result<Option<User>, DatabaseError> {
        self.get_user_where("pan_card", pan_card.inner()).await
    }

    async fn fetch_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, DbUser>("select * from users order by created_at desc")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("getting list of users failed >>> {}", e);
                DatabaseError::from(e)
            })?;

        Ok(users.into_iter().map(|u| u.into()).collect())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("opening transaction failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        let user = sqlx::query_as::<_, DbUser>(
            "insert into users (id, name, email, password, phone_number, pan_card, gender, avatar, referral_code, referred_by) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) returning *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(new_user.email.as_ref().map(|e| e.inner()))
        .bind(&new_user.password)
        .bind(&new_user.phone_number)
        .bind(new_user.pan_card.inner())
        .bind(&new_user.gender)
        .bind(&new_user.avatar)
        .bind(new_user.referral_code.inner())
        .bind(new_user.referrer.as_ref().map(|r| r.user_id))
        .fetch_one(&mut tx)
        .await
        .map_err(|e| {
            tracing::error!("creating user failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        sqlx::query("insert into referral_codes (code, user_id, user_name) values ($1, $2, $3)")
            .bind(new_user.referral_code.inner())
            .bind(user.id)
            .bind(&new_user.name)
            .execute(&mut tx)
            .await
            .map_err(|e| {
                tracing::error!("creating referral code failed >>> {}", e);
                DatabaseError::from(e)
            })?;

        if let Some(referrer) = &new_user.referrer {
            sqlx::query(
                "insert into referral_usages (code, user_id, user_name) values ($1, $2, $3)",
            )
            .bind(referrer.code.inner())
            .bind(user.id)
            .bind(&new_user.name)
            .execute(&mut tx)
            .await
            .map_err(|e| {
                tracing::error!("recording referral usage failed >>> {}", e);
                DatabaseError::from(e)
            })?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("committing new user failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        Ok(user.into())
    }

    async fn update_profile(
        &self,
        id: &Uuid,
        name: &str,
        email: Option<&Email>,
        phone_number: &str,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("opening transaction failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        let updated = sqlx::query(
            "update users set name = $2, email = $3, phone_number = $4 where id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(email.map(|e| e.inner()))
        .bind(phone_number)
        .execute(&mut tx)
        .await
        .map_err(|e| {
            tracing::error!("updating user profile failed >>> {}", e);
            DatabaseError::from(e)
        })?
        .rows_affected();
        ensure_updated(updated, id)?;

        sqlx::query("update referral_codes set user_name = $2 where user_id = $1")
            .bind(id)
            .bind(name)
            .execute(&mut tx)
            .await
            .map_err(|e| {
                tracing::error!("syncing referral owner name failed >>> {}", e);
                DatabaseError::from(e)
            })?;

        tx.commit().await.map_err(|e| {
            tracing::error!("committing profile update failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        Ok(())
    }

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<(), DatabaseError> {
        let updated = sqlx::query("update users set password = $2 where id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("updating password failed >>> {}", e);
                DatabaseError::from(e)
            })?
            .rows_affected();

        ensure_updated(updated, id)
    }

    async fn update_avatar(&self, id: &Uuid, avatar: &str) -> Result<(), DatabaseError> {
        let updated = sqlx::query("update users set avatar = $2 where id = $1")
            .bind(id)
            .bind(avatar)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("updating avatar failed >>> {}", e);
                DatabaseError::from(e)
            })?
            .rows_affected();

        ensure_updated(updated, id)
    }

    async fn update_addresses(
        &self,
        id: &Uuid,
        expected: &[Address],
        addresses: &[Address],
    ) -> Result<(), DatabaseError> {
        let updated =
            sqlx::query("update users set addresses = $3 where id = $1 and addresses = $2")
                .bind(id)
                .bind(Json(expected))
                .bind(Json(addresses))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("updating addresses failed >>> {}", e);
                    DatabaseError::from(e)
                })?
                .rows_affected();

        if updated > 0 {
            return Ok(());
        }

        match self.get_user_by_id(id).await? {
            Some(_) => Err(DatabaseError::Conflict(ADDRESSES_CHANGED.to_string())),
            None => Err(missing_user(id)),
        }
    }

    async fn delete_user(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("delete from users where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("deleting user failed >>> {}", e);
                DatabaseError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<ReferralRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, DbReferralCode>(
            "select code, user_id, user_name, created_at from referral_codes where code = $1",
        )
        .bind(code.inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("get referral code failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        self.attach_usages(row).await
    }

    async fn get_referral_code_by_owner(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<ReferralRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, DbReferralCode>(
            "select code, user_id, user_name, created_at from referral_codes where user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("get referral code by owner failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        self.attach_usages(row).await
    }

    async fn redeem_referral(
        &self,
        referral: &ReferralRecord,
        user: &User,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("opening transaction failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        let updated =
            sqlx::query("update users set referred_by = $1 where id = $2 and referred_by is null")
                .bind(referral.user_id)
                .bind(user.id)
                .execute(&mut tx)
                .await
                .map_err(|e| {
                    tracing::error!("setting referred_by failed >>> {}", e);
                    DatabaseError::from(e)
                })?
                .rows_affected();

        if updated == 0 {
            return Err(DatabaseError::Conflict(
                "You have already used a referral code".to_string(),
            ));
        }

        sqlx::query("insert into referral_usages (code, user_id, user_name) values ($1, $2, $3)")
            .bind(referral.code.inner())
            .bind(user.id)
            .bind(&user.name)
            .execute(&mut tx)
            .await
            .map_err(|e| {
                tracing::error!("recording referral usage failed >>> {}", e);
                DatabaseError::from(e)
            })?;

        tx.commit().await.map_err(|e| {
            tracing::error!("committing referral redemption failed >>> {}", e);
            DatabaseError::from(e)
        })?;

        Ok(())
    }
}
