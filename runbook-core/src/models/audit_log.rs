/// Audit log model
///
/// Append-only record of who did what to which resource. There are no update
/// or delete operations. `actor_id` carries no foreign key, so entries outlive
/// the users they mention: a rejected signup still leaves its `reject` entry.
///
/// Entries are written inside the same transaction as the change they
/// describe, so a rolled-back operation leaves no entry.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id             BLOB PRIMARY KEY NOT NULL,
///     actor_id       BLOB NOT NULL,
///     action         TEXT NOT NULL,
///     resource_type  TEXT NOT NULL,
///     resource_id    BLOB,
///     description    TEXT,
///     created_at     TEXT NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use runbook_core::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
/// use sqlx::SqlitePool;
/// use uuid::Uuid;
///
/// # async fn example(pool: SqlitePool, admin_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// AuditLogEntry::append(
///     &pool,
///     NewAuditEntry::new(admin_id, AuditAction::Approve, ResourceType::User)
///         .resource(user_id),
/// )
/// .await?;
///
/// let recent = AuditLogEntry::recent(&pool, 50).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use std::fmt;
use uuid::Uuid;

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Approve,
    Reject,
    ChangeRole,
    RemoveUser,
    SetActive,
    Signup,
    CreateTeam,
    UpdateTeam,
    DeleteTeam,
    RequestJoin,
    ApproveJoinRequest,
    RejectJoinRequest,
    CreateChecklist,
    AddChecklistItem,
    UpdateChecklist,
    CreateReadme,
    UpdateReadme,
    DeleteReadme,
    CreateNote,
    UpdateNote,
    DeleteNote,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::ChangeRole => "change_role",
            AuditAction::RemoveUser => "remove_user",
            AuditAction::SetActive => "set_active",
            AuditAction::Signup => "signup",
            AuditAction::CreateTeam => "create_team",
            AuditAction::UpdateTeam => "update_team",
            AuditAction::DeleteTeam => "delete_team",
            AuditAction::RequestJoin => "request_join",
            AuditAction::ApproveJoinRequest => "approve_join_request",
            AuditAction::RejectJoinRequest => "reject_join_request",
            AuditAction::CreateChecklist => "create_checklist",
            AuditAction::AddChecklistItem => "add_checklist_item",
            AuditAction::UpdateChecklist => "update_checklist",
            AuditAction::CreateReadme => "create_readme",
            AuditAction::UpdateReadme => "update_readme",
            AuditAction::DeleteReadme => "delete_readme",
            AuditAction::CreateNote => "create_note",
            AuditAction::UpdateNote => "update_note",
            AuditAction::DeleteNote => "delete_note",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of resource an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Team,
    JoinRequest,
    Checklist,
    ChecklistItem,
    Readme,
    Note,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Team => "team",
            ResourceType::JoinRequest => "join_request",
            ResourceType::Checklist => "checklist",
            ResourceType::ChecklistItem => "checklist_item",
            ResourceType::Readme => "readme",
            ResourceType::Note => "note",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored audit entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,

    /// User who performed the action (may no longer exist)
    pub actor_id: Uuid,

    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,

    /// Human-readable detail, e.g. `"admin -> coach"`
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Entry to append
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub description: Option<String>,
}

impl NewAuditEntry {
    pub fn new(actor_id: Uuid, action: AuditAction, resource_type: ResourceType) -> Self {
        Self {
            actor_id,
            action,
            resource_type,
            resource_id: None,
            description: None,
        }
    }

    pub fn resource(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl AuditLogEntry {
    /// Appends an entry
    pub async fn append<'e, E>(executor: E, entry: NewAuditEntry) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AuditLogEntry>(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, resource_type, resource_id, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, actor_id, action, resource_type, resource_id, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .bind(entry.description)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Most recent entries, newest first
    pub async fn recent<'e, E>(executor: E, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, actor_id, action, resource_type, resource_id, description, created_at
            FROM audit_logs
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Entries about one resource, oldest first
    pub async fn for_resource<'e, E>(
        executor: E,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, actor_id, action, resource_type, resource_id, description, created_at
            FROM audit_logs
            WHERE resource_type = ? AND resource_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }

    /// Entries written by one actor, newest first
    pub async fn by_actor<'e, E>(executor: E, actor_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, actor_id, action, resource_type, resource_id, description, created_at
            FROM audit_logs
            WHERE actor_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(actor_id)
        .fetch_all(executor)
        .await
    }

    /// Counts all entries
    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
