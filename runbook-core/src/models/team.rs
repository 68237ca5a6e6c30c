/// Team model and database operations
///
/// A team is identified to users by its code, two digits, a dash and four
/// digits (`01-0001`). The user who creates a team becomes its approver for
/// join requests.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id          BLOB PRIMARY KEY NOT NULL,
///     name        TEXT NOT NULL,
///     code        TEXT NOT NULL UNIQUE,
///     division    TEXT NOT NULL,
///     created_by  BLOB REFERENCES users(id) ON DELETE SET NULL,
///     created_at  TEXT NOT NULL,
///     updated_at  TEXT NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```
/// use runbook_core::models::team::validate_team_code;
///
/// assert!(validate_team_code("12-3456"));
/// assert!(!validate_team_code("123-456"));
/// assert!(!validate_team_code("AB-1234"));
/// ```

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use std::sync::LazyLock;
use uuid::Uuid;

static TEAM_CODE: LazyLock<Regex> = LazyLock::new(|| {
    // ASCII digits only; \d would also accept other Unicode digits
    Regex::new(r"^[0-9]{2}-[0-9]{4}$").expect("team code pattern is valid")
});

/// Checks the `NN-NNNN` team code format
pub fn validate_team_code(code: &str) -> bool {
    TEAM_CODE.is_match(code)
}

/// Team record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    /// Unique team ID (UUID v4)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Globally unique `NN-NNNN` code
    pub code: String,

    /// Competition division (free text)
    pub division: String,

    /// Creator and join-request approver; `None` once the creator is deleted
    pub created_by: Option<Uuid>,

    /// When the team was created
    pub created_at: DateTime<Utc>,

    /// When the team was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    /// Display name
    pub name: String,

    /// `NN-NNNN` code
    pub code: String,

    /// Division
    pub division: String,

    /// Creating user
    pub created_by: Option<Uuid>,
}

/// Input for updating a team
///
/// Only non-None fields are updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTeam {
    /// New name
    pub name: Option<String>,

    /// New division
    pub division: Option<String>,
}

impl Team {
    /// Whether `user_id` created this team
    pub fn is_created_by(&self, user_id: Uuid) -> bool {
        self.created_by == Some(user_id)
    }

    /// Creates a new team
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Code already exists (unique constraint violation)
    /// - Creator doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create<'e, E>(executor: E, data: CreateTeam) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (id, name, code, division, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, code, division, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.name.trim())
        .bind(data.code.trim())
        .bind(data.division.trim())
        .bind(data.created_by)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds a team by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, code, division, created_by, created_at, updated_at
            FROM teams
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds a team by its `NN-NNNN` code
    pub async fn find_by_code<'e, E>(executor: E, code: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, code, division, created_by, created_at, updated_at
            FROM teams
            WHERE code = ?
            "#,
        )
        .bind(code.trim())
        .fetch_optional(executor)
        .await
    }

    /// Lists all teams ordered by code
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, code, division, created_by, created_at, updated_at
            FROM teams
            ORDER BY code ASC
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Lists the teams a user created
    pub async fn list_by_creator<'e, E>(executor: E, creator_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, code, division, created_by, created_at, updated_at
            FROM teams
            WHERE created_by = ?
            ORDER BY code ASC
            "#,
        )
        .bind(creator_id)
        .fetch_all(executor)
        .await
    }

    /// Updates name and/or division
    ///
    /// # Returns
    ///
    /// The updated team, or `None` if it doesn't exist
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateTeam,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET name = COALESCE(?, name),
                division = COALESCE(?, division),
                updated_at = ?
            WHERE id = ?
            RETURNING id, name, code, division, created_by, created_at, updated_at
            "#,
        )
        .bind(data.name.as_deref().map(str::trim))
        .bind(data.division.as_deref().map(str::trim))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a team
    ///
    /// Members are unlinked; READMEs, notes and join requests are removed.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
