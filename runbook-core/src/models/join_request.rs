/// Team join request model
///
/// A user asks to join a team; the team's creator (or an admin) resolves the
/// request. Requests move `pending -> approved` or `pending -> rejected`, and
/// both end states are final: [`JoinRequest::resolve`] only updates rows that
/// are still pending.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE team_join_requests (
///     id               BLOB PRIMARY KEY NOT NULL,
///     team_id          BLOB NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     requester_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     team_creator_id  BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     status           TEXT NOT NULL DEFAULT 'pending',
///     message          TEXT,
///     created_at       TEXT NOT NULL,
///     updated_at       TEXT NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use std::fmt;
use uuid::Uuid;

/// Maximum length of the optional request message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Join request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    /// Waiting for the team creator
    Pending,

    /// Accepted; the requester joined the team
    Approved,

    /// Declined
    Rejected,
}

impl JoinRequestStatus {
    /// Converts status to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Approved => "approved",
            JoinRequestStatus::Rejected => "rejected",
        }
    }

    /// Whether the request can no longer change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JoinRequestStatus::Pending)
    }
}

impl fmt::Display for JoinRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request by a user to join a team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JoinRequest {
    /// Unique request ID
    pub id: Uuid,

    /// Team being joined
    pub team_id: Uuid,

    /// User asking to join
    pub requester_id: Uuid,

    /// Team creator at the time of the request; the designated approver
    pub team_creator_id: Uuid,

    /// Lifecycle state
    pub status: JoinRequestStatus,

    /// Optional note from the requester
    pub message: Option<String>,

    /// When the request was made
    pub created_at: DateTime<Utc>,

    /// When the request was last changed
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a join request
#[derive(Debug, Clone)]
pub struct CreateJoinRequest {
    pub team_id: Uuid,
    pub requester_id: Uuid,
    pub team_creator_id: Uuid,
    pub message: Option<String>,
}

impl JoinRequest {
    /// Creates a pending join request
    ///
    /// # Errors
    ///
    /// Returns a unique violation if a pending request already exists for the
    /// same team and requester.
    pub async fn create<'e, E>(executor: E, data: CreateJoinRequest) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, JoinRequest>(
            r#"
            INSERT INTO team_join_requests (id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)
            RETURNING id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.team_id)
        .bind(data.requester_id)
        .bind(data.team_creator_id)
        .bind(data.message)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds a request by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            FROM team_join_requests
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds the most recent request for a (team, requester) pair, any status
    pub async fn find_for_pair<'e, E>(
        executor: E,
        team_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            FROM team_join_requests
            WHERE team_id = ? AND requester_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .bind(requester_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds the pending request for a (team, requester) pair
    pub async fn find_pending_for_pair<'e, E>(
        executor: E,
        team_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            FROM team_join_requests
            WHERE team_id = ? AND requester_id = ? AND status = 'pending'
            "#,
        )
        .bind(team_id)
        .bind(requester_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists pending requests for a team, oldest first
    pub async fn list_pending_for_team<'e, E>(executor: E, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            FROM team_join_requests
            WHERE team_id = ? AND status = 'pending'
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    /// Lists pending requests addressed to a team creator, oldest first
    pub async fn list_pending_for_creator<'e, E>(
        executor: E,
        creator_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            FROM team_join_requests
            WHERE team_creator_id = ? AND status = 'pending'
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(creator_id)
        .fetch_all(executor)
        .await
    }

    /// Lists a requester's own pending requests
    pub async fn list_pending_for_requester<'e, E>(
        executor: E,
        requester_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            FROM team_join_requests
            WHERE requester_id = ? AND status = 'pending'
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(requester_id)
        .fetch_all(executor)
        .await
    }

    /// Moves a pending request to `status`
    ///
    /// # Returns
    ///
    /// The updated request, or `None` if it doesn't exist or was already
    /// resolved
    pub async fn resolve<'e, E>(
        executor: E,
        id: Uuid,
        status: JoinRequestStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, JoinRequest>(
            r#"
            UPDATE team_join_requests
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            RETURNING id, team_id, requester_id, team_creator_id, status, message, created_at, updated_at
            "#,
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a request
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM team_join_requests WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
