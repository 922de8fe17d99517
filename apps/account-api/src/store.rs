//! PostgreSQL-backed account store.

use async_trait::async_trait;
use sqlx::PgPool;
use tessera_social::models::{Role, User, UserStatus};
use tessera_social::store::{ExternalLookup, NewUser, StoreError, UserStore};
use tracing::instrument;

/// Database row for an account.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    display_name: String,
    email: Option<String>,
    google_id: Option<String>,
    role: String,
    status: String,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            email: self.email,
            google_id: self.google_id,
            role: self.role.parse().unwrap_or(Role::Common),
            // An unrecognized status must not let anyone sign in.
            status: self.status.parse().unwrap_or(UserStatus::Disabled),
        }
    }
}

/// Account store backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn find_by_google_id(&self, google_id: &str) -> Result<ExternalLookup, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, display_name, email, google_id, role, status
            FROM users
            WHERE google_id = $1
            ",
        )
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;

        Ok(match row {
            Some(row) => {
                let user = row.into_user();
                if user.status == UserStatus::Deleted {
                    ExternalLookup::Deactivated
                } else {
                    ExternalLookup::Bound(user)
                }
            }
            None => ExternalLookup::Unbound,
        })
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: i64) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, display_name, email, google_id, role, status
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;

        row.map(UserRow::into_user).ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    async fn max_user_id(&self) -> Result<i64, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_store_err)?;

        Ok(max.unwrap_or(0))
    }

    #[instrument(skip(self))]
    async fn find_inviter(&self, aff_code: &str) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar("SELECT id FROM users WHERE aff_code = $1")
            .bind(aff_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_store_err)
    }

    #[instrument(skip(self, new), fields(username = %new.username))]
    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (username, display_name, email, google_id, role, status, inviter_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, display_name, email, google_id, role, status
            ",
        )
        .bind(&new.username)
        .bind(&new.display_name)
        .bind(&new.email)
        .bind(&new.google_id)
        .bind(new.role.as_str())
        .bind(new.status.as_str())
        .bind(new.inviter_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_store_err)?;

        Ok(row.into_user())
    }

    #[instrument(skip(self))]
    async fn bind_google_id(&self, user_id: i64, google_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET google_id = $1 WHERE id = $2")
            .bind(google_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_store_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn map_store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => StoreError::Conflict,
        other => StoreError::Backend(other.to_string()),
    }
}
