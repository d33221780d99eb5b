//! PostgreSQL credential store
//!
//! Account and profile persistence using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::CredentialStore;
use crate::{Account, LoginState, NewAccount, NewProfile, Profile, Result, WardenError};

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    wallet_address VARCHAR(255),
    two_factor_enabled BOOLEAN NOT NULL DEFAULT FALSE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    failed_login_attempts INTEGER NOT NULL DEFAULT 0,
    locked_until TIMESTAMPTZ,
    last_login TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_profiles (
    user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    username VARCHAR(255),
    full_name VARCHAR(255),
    country VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// PostgreSQL credential store
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new credential store connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| WardenError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;
        tracing::debug!(max_connections, "PostgreSQL pool created");

        Ok(Self { pool })
    }

    /// Create the `users` and `user_profiles` tables if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in [CREATE_USERS_TABLE, CREATE_PROFILES_TABLE] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| WardenError::DatabaseError(format!("Schema setup failed: {e}")))?;
        }
        tracing::info!("Credential schema ready");
        Ok(())
    }
}

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    wallet_address: Option<String>,
    two_factor_enabled: bool,
    is_active: bool,
    failed_login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            wallet_address: row.wallet_address,
            two_factor_enabled: row.two_factor_enabled,
            is_active: row.is_active,
            failed_login_attempts: row.failed_login_attempts,
            locked_until: row.locked_until,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Profile row from database
#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: Uuid,
    username: Option<String>,
    full_name: Option<String>,
    country: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            user_id: row.user_id,
            username: row.username,
            full_name: row.full_name,
            country: row.country,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, wallet_address, two_factor_enabled, \
     is_active, failed_login_attempts, locked_until, last_login, created_at, updated_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1");
        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WardenError::DatabaseError(format!("Failed to find account: {e}")))?;

        Ok(row.map(Account::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1");
        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WardenError::DatabaseError(format!("Failed to find account: {e}")))?;

        Ok(row.map(Account::from))
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, password_hash, wallet_address)
            VALUES ($1, $2, $3, $4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let row: AccountRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.wallet_address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    WardenError::Conflict(format!("email already registered: {}", account.email))
                } else {
                    WardenError::DatabaseError(format!("Failed to create account: {e}"))
                }
            })?;

        Ok(row.into())
    }

    async fn create_profile(&self, user_id: Uuid, profile: NewProfile) -> Result<Profile> {
        let row: ProfileRow = sqlx::query_as(
            r#"
            INSERT INTO user_profiles (user_id, username, full_name, country)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, full_name, country, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.country)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                WardenError::Conflict(format!("profile already exists for {user_id}"))
            } else {
                WardenError::DatabaseError(format!("Failed to create profile: {e}"))
            }
        })?;

        Ok(row.into())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT user_id, username, full_name, country, created_at, updated_at
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WardenError::DatabaseError(format!("Failed to find profile: {e}")))?;

        Ok(row.map(Profile::from))
    }

    async fn update_login_state(&self, id: Uuid, state: &LoginState) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                failed_login_attempts = $2,
                locked_until = $3,
                last_login = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(state.failed_attempts)
        .bind(state.locked_until)
        .bind(state.last_login)
        .execute(&self.pool)
        .await
        .map_err(|e| WardenError::DatabaseError(format!("Failed to update login state: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(WardenError::NotFound(format!("account {id}")));
        }
        Ok(())
    }
}
