/// Team README model
///
/// READMEs are the per-image briefing documents a team keeps for each
/// operating system it practices on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use uuid::Uuid;

/// README document owned by a team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReadMe {
    pub id: Uuid,
    pub team_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    /// Operating system the document targets
    pub os_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a README
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReadMe {
    pub team_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub os_type: String,
    pub content: String,
}

/// Input for updating a README; only non-None fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReadMe {
    pub title: Option<String>,
    pub os_type: Option<String>,
    pub content: Option<String>,
}

impl ReadMe {
    pub async fn create<'e, E>(executor: E, data: CreateReadMe) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, ReadMe>(
            r#"
            INSERT INTO readmes (id, team_id, author_id, title, os_type, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, team_id, author_id, title, os_type, content, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.team_id)
        .bind(data.author_id)
        .bind(data.title.trim())
        .bind(data.os_type.trim())
        .bind(&data.content)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ReadMe>(
            r#"
            SELECT id, team_id, author_id, title, os_type, content, created_at, updated_at
            FROM readmes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a team's READMEs, most recently updated first
    pub async fn list_for_team<'e, E>(executor: E, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ReadMe>(
            r#"
            SELECT id, team_id, author_id, title, os_type, content, created_at, updated_at
            FROM readmes
            WHERE team_id = ?
            ORDER BY updated_at DESC, rowid DESC
            "#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateReadMe,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ReadMe>(
            r#"
            UPDATE readmes
            SET title = COALESCE(?, title),
                os_type = COALESCE(?, os_type),
                content = COALESCE(?, content),
                updated_at = ?
            WHERE id = ?
            RETURNING id, team_id, author_id, title, os_type, content, created_at, updated_at
            "#,
        )
        .bind(data.title.as_deref().map(str::trim))
        .bind(data.os_type.as_deref().map(str::trim))
        .bind(data.content)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM readmes WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
