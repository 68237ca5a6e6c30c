/// User model and database operations
///
/// Users sign up with a role and optionally a team. Only admins are approved
/// at creation; everyone else waits in the pending queue until an approver
/// acts on them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id             BLOB PRIMARY KEY NOT NULL,
///     name           TEXT NOT NULL,
///     email          TEXT NOT NULL UNIQUE COLLATE NOCASE,
///     password_hash  TEXT NOT NULL,
///     role           TEXT NOT NULL DEFAULT 'member',
///     team_id        BLOB REFERENCES teams(id) ON DELETE SET NULL,
///     is_approved    BOOLEAN NOT NULL DEFAULT 0,
///     is_active      BOOLEAN NOT NULL DEFAULT 1,
///     created_at     TEXT NOT NULL,
///     updated_at     TEXT NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use runbook_core::models::role::Role;
/// use runbook_core::models::user::{CreateUser, User};
/// use runbook_core::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     name: "Jane Doe".to_string(),
///     email: "jane@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: Role::Member,
///     team_id: None,
/// }).await?;
/// assert!(!user.is_approved);
///
/// let found = User::find_by_email(&pool, "JANE@example.com").await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use super::role::Role;

/// User account
///
/// Passwords are stored as Argon2id hashes, never in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login identifier, unique and case-insensitive
    pub email: String,

    /// Argon2id password hash (PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Role within the application
    pub role: Role,

    /// Team the user belongs to, if any
    pub team_id: Option<Uuid>,

    /// Whether an approver has accepted the account
    pub is_approved: bool,

    /// Deactivated accounts cannot sign in or act
    pub is_active: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
///
/// There is no approval field: it is derived from the role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Display name
    pub name: String,

    /// Email address (stored trimmed and lowercased)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Role to assign
    pub role: Role,

    /// Team to link, if any
    pub team_id: Option<Uuid>,
}

impl User {
    /// Whether the user can act (active, and approved unless admin)
    pub fn can_act(&self) -> bool {
        self.is_active && (self.is_approved || self.role == Role::Admin)
    }

    /// Creates a new user
    ///
    /// `is_approved` is set from [`Role::default_approval`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique constraint violation)
    /// - Team doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.name.trim())
        .bind(data.email.trim().to_lowercase())
        .bind(&data.password_hash)
        .bind(data.role)
        .bind(data.team_id)
        .bind(data.role.default_approval())
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await
    }

    /// Lists users with pagination, newest first
    pub async fn list<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at
            FROM users
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    /// Lists users awaiting approval, oldest first
    ///
    /// # Arguments
    ///
    /// * `team_id` - Restrict to one team; `None` lists every pending user
    pub async fn list_pending<'e, E>(
        executor: E,
        team_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at
            FROM users
            WHERE is_approved = 0 AND (?1 IS NULL OR team_id = ?1)
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    /// Lists the members of a team, by name
    pub async fn list_by_team<'e, E>(executor: E, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, team_id, is_approved, is_active, created_at, updated_at
            FROM users
            WHERE team_id = ?
            ORDER BY name ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    /// Sets the approval flag
    ///
    /// # Returns
    ///
    /// True if the user exists
    pub async fn set_approved<'e, E>(executor: E, id: Uuid, approved: bool) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET is_approved = ?, updated_at = ? WHERE id = ?")
            .bind(approved)
            .bind(Utc::now())
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Changes the user's role
    pub async fn set_role<'e, E>(executor: E, id: Uuid, role: Role) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(Utc::now())
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Links the user to a team, or unlinks with `None`
    pub async fn assign_team<'e, E>(
        executor: E,
        id: Uuid,
        team_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET team_id = ?, updated_at = ? WHERE id = ?")
            .bind(team_id)
            .bind(Utc::now())
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activates or deactivates the account
    pub async fn set_active<'e, E>(executor: E, id: Uuid, active: bool) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user by ID
    ///
    /// Join requests, checklist status, READMEs and notes owned by the user
    /// are removed with it. Teams the user created lose their creator.
    ///
    /// # Returns
    ///
    /// True if user was deleted, false if user didn't exist
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts all users
    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
