/// Checklist models
///
/// A checklist is an ordered list of hardening steps for one platform
/// (Ubuntu, Windows, Cisco, ...). Each user tracks their own progress per
/// item in `checklist_status`; an item without a stored record counts as
/// pending.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE checklist_status (
///     id                 BLOB PRIMARY KEY NOT NULL,
///     user_id            BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     checklist_item_id  BLOB NOT NULL REFERENCES checklist_items(id) ON DELETE CASCADE,
///     status             TEXT NOT NULL DEFAULT 'pending',
///     notes              TEXT,
///     created_at         TEXT NOT NULL,
///     updated_at         TEXT NOT NULL,
///     UNIQUE (user_id, checklist_item_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Per-user state of a checklist item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Completed => "completed",
            ItemStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "completed" => Ok(ItemStatus::Completed),
            "skipped" => Ok(ItemStatus::Skipped),
            other => Err(Error::invalid(
                "status",
                format!("Unknown checklist status '{}'", other),
            )),
        }
    }
}

/// Checklist header
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Checklist {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Platform the checklist applies to
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One step of a checklist
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Sort key within the checklist
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's recorded state for one item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub checklist_item_id: Uuid,
    pub status: ItemStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status counts for one user over one checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub completed: i64,
    pub skipped: i64,
}

impl Checklist {
    /// Creates a checklist
    pub async fn create<'e, E>(
        executor: E,
        title: &str,
        description: Option<&str>,
        category: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Checklist>(
            r#"
            INSERT INTO checklists (id, title, description, category, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, title, description, category, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title.trim())
        .bind(description)
        .bind(category.trim())
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds a checklist by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Checklist>(
            "SELECT id, title, description, category, created_at, updated_at FROM checklists WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists all checklists by category, then title
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Checklist>(
            r#"
            SELECT id, title, description, category, created_at, updated_at
            FROM checklists
            ORDER BY category ASC, title ASC
            "#,
        )
        .fetch_all(executor)
        .await
    }
}

impl ChecklistItem {
    /// Adds an item at `position`
    pub async fn create<'e, E>(
        executor: E,
        checklist_id: Uuid,
        title: &str,
        description: Option<&str>,
        position: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, ChecklistItem>(
            r#"
            INSERT INTO checklist_items (id, checklist_id, title, description, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, checklist_id, title, description, position, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(checklist_id)
        .bind(title.trim())
        .bind(description)
        .bind(position)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds an item by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ChecklistItem>(
            r#"
            SELECT id, checklist_id, title, description, position, created_at, updated_at
            FROM checklist_items
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a checklist's items in position order
    pub async fn list_for_checklist<'e, E>(
        executor: E,
        checklist_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ChecklistItem>(
            r#"
            SELECT id, checklist_id, title, description, position, created_at, updated_at
            FROM checklist_items
            WHERE checklist_id = ?
            ORDER BY position ASC, rowid ASC
            "#,
        )
        .bind(checklist_id)
        .fetch_all(executor)
        .await
    }

    /// Highest position used in a checklist, `None` when it has no items
    pub async fn max_position<'e, E>(executor: E, checklist_id: Uuid) -> Result<Option<i64>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(position) FROM checklist_items WHERE checklist_id = ?")
                .bind(checklist_id)
                .fetch_one(executor)
                .await?;

        Ok(max)
    }
}

impl StatusRecord {
    /// Inserts or overwrites the user's status for an item
    ///
    /// Last write wins. When `notes` is `None` the previously stored notes are
    /// kept.
    pub async fn upsert<'e, E>(
        executor: E,
        user_id: Uuid,
        item_id: Uuid,
        status: ItemStatus,
        notes: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, StatusRecord>(
            r#"
            INSERT INTO checklist_status (id, user_id, checklist_item_id, status, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, checklist_item_id) DO UPDATE
            SET status = excluded.status,
                notes = COALESCE(excluded.notes, checklist_status.notes),
                updated_at = excluded.updated_at
            RETURNING id, user_id, checklist_item_id, status, notes, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(item_id)
        .bind(status)
        .bind(notes)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds the user's record for an item
    pub async fn find<'e, E>(
        executor: E,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, StatusRecord>(
            r#"
            SELECT id, user_id, checklist_item_id, status, notes, created_at, updated_at
            FROM checklist_status
            WHERE user_id = ? AND checklist_item_id = ?
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(executor)
        .await
    }

    /// Number of records stored for a (user, item) pair
    pub async fn count_for<'e, E>(executor: E, user_id: Uuid, item_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM checklist_status WHERE user_id = ? AND checklist_item_id = ?",
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Counts a user's item states over a checklist
    ///
    /// Items without a record are counted in `total` only.
    pub async fn counts<'e, E>(
        executor: E,
        user_id: Uuid,
        checklist_id: Uuid,
    ) -> Result<StatusCounts, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, StatusCounts>(
            r#"
            SELECT COUNT(i.id) AS total,
                   COALESCE(SUM(CASE WHEN s.status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                   COALESCE(SUM(CASE WHEN s.status = 'skipped' THEN 1 ELSE 0 END), 0) AS skipped
            FROM checklist_items i
            LEFT JOIN checklist_status s
                   ON s.checklist_item_id = i.id AND s.user_id = ?
            WHERE i.checklist_id = ?
            "#,
        )
        .bind(user_id)
        .bind(checklist_id)
        .fetch_one(executor)
        .await
    }
}
