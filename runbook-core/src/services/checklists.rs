/// Checklist service
///
/// Admins and coaches author checklists; every user tracks their own item
/// status. Status updates are last-write-wins with no history.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{deny, load_user, require_text};
use crate::auth::policy::{ApprovalPolicy, RolePolicy};
use crate::db::with_transaction;
use crate::error::{Error, Result};
use crate::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
use crate::models::checklist::{Checklist, ChecklistItem, ItemStatus, StatusCounts, StatusRecord};

/// A user's progress through one checklist
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChecklistProgress {
    pub total: i64,
    pub completed: i64,
    pub skipped: i64,
    pub pending: i64,
    /// Share of items completed or skipped, 0 to 100
    pub percent: f64,
}

impl From<StatusCounts> for ChecklistProgress {
    fn from(counts: StatusCounts) -> Self {
        let done = counts.completed + counts.skipped;
        let percent = if counts.total == 0 {
            0.0
        } else {
            done as f64 / counts.total as f64 * 100.0
        };

        Self {
            total: counts.total,
            completed: counts.completed,
            skipped: counts.skipped,
            pending: counts.total - done,
            percent,
        }
    }
}

/// Checklist operations
#[derive(Clone)]
pub struct Checklists {
    pool: SqlitePool,
    policy: Arc<dyn ApprovalPolicy>,
}

impl Checklists {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            policy: Arc::new(RolePolicy::default()),
        }
    }

    pub fn with_policy(mut self, policy: impl ApprovalPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Records the user's status for a checklist item
    ///
    /// Exactly one record exists per (user, item); a second call overwrites
    /// the first. Passing `None` or blank `notes` keeps the notes already
    /// stored.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` unless `status` is pending, completed or skipped
    /// - `Error::NotFound` if the user or item doesn't exist
    pub async fn set_status(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        status: &str,
        notes: Option<&str>,
    ) -> Result<StatusRecord> {
        let status: ItemStatus = status.parse()?;
        let notes = notes
            .filter(|notes| !notes.trim().is_empty())
            .map(str::to_string);

        let record = with_transaction(&self.pool, move |conn| {
            Box::pin(set_status_tx(conn, user_id, item_id, status, notes))
        })
        .await?;

        debug!(user_id = %user_id, item_id = %item_id, status = %status, "Checklist status updated");
        Ok(record)
    }

    /// The user's status for an item; `Pending` when nothing is recorded
    pub async fn status_of(&self, user_id: Uuid, item_id: Uuid) -> Result<ItemStatus> {
        Ok(StatusRecord::find(&self.pool, user_id, item_id)
            .await?
            .map(|record| record.status)
            .unwrap_or_default())
    }

    /// Creates a checklist (admins and coaches)
    pub async fn create_checklist(
        &self,
        actor_id: Uuid,
        title: &str,
        description: Option<&str>,
        category: &str,
    ) -> Result<Checklist> {
        require_text("title", title)?;
        require_text("category", category)?;

        let policy = Arc::clone(&self.policy);
        let title = title.to_string();
        let description = description.map(str::to_string);
        let category = category.to_string();
        let checklist = with_transaction(&self.pool, move |conn| {
            Box::pin(create_checklist_tx(conn, policy, actor_id, title, description, category))
        })
        .await?;

        info!(actor_id = %actor_id, checklist_id = %checklist.id, "Checklist created");
        Ok(checklist)
    }

    /// Adds an item to a checklist (admins and coaches)
    ///
    /// Without a `position` the item goes after the current last item.
    pub async fn add_item(
        &self,
        actor_id: Uuid,
        checklist_id: Uuid,
        title: &str,
        description: Option<&str>,
        position: Option<i64>,
    ) -> Result<ChecklistItem> {
        require_text("title", title)?;
        if matches!(position, Some(p) if p < 0) {
            return Err(Error::invalid("position", "Position must not be negative"));
        }

        let policy = Arc::clone(&self.policy);
        let title = title.to_string();
        let description = description.map(str::to_string);
        let item = with_transaction(&self.pool, move |conn| {
            Box::pin(add_item_tx(
                conn,
                policy,
                actor_id,
                checklist_id,
                title,
                description,
                position,
            ))
        })
        .await?;

        info!(actor_id = %actor_id, checklist_id = %checklist_id, item_id = %item.id, "Checklist item added");
        Ok(item)
    }

    /// Items of a checklist in position order
    pub async fn items(&self, checklist_id: Uuid) -> Result<Vec<ChecklistItem>> {
        self.get(checklist_id).await?;
        Ok(ChecklistItem::list_for_checklist(&self.pool, checklist_id).await?)
    }

    pub async fn get(&self, checklist_id: Uuid) -> Result<Checklist> {
        Checklist::find_by_id(&self.pool, checklist_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Checklist {} not found", checklist_id)))
    }

    pub async fn list_checklists(&self) -> Result<Vec<Checklist>> {
        Ok(Checklist::list(&self.pool).await?)
    }

    /// The user's progress through a checklist
    pub async fn progress(&self, user_id: Uuid, checklist_id: Uuid) -> Result<ChecklistProgress> {
        self.get(checklist_id).await?;
        let counts = StatusRecord::counts(&self.pool, user_id, checklist_id).await?;
        Ok(counts.into())
    }
}

async fn set_status_tx(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    item_id: Uuid,
    status: ItemStatus,
    notes: Option<String>,
) -> Result<StatusRecord> {
    let user = load_user(&mut *conn, user_id).await?;
    let item = ChecklistItem::find_by_id(&mut *conn, item_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Checklist item {} not found", item_id)))?;

    let record = StatusRecord::upsert(&mut *conn, user.id, item.id, status, notes.as_deref()).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(user.id, AuditAction::UpdateChecklist, ResourceType::ChecklistItem)
            .resource(item.id)
            .description(format!("Status: {}", status)),
    )
    .await?;

    Ok(record)
}

async fn create_checklist_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    title: String,
    description: Option<String>,
    category: String,
) -> Result<Checklist> {
    let actor = load_user(&mut *conn, actor_id).await?;
    if !policy.can_manage_checklists(&actor) {
        return Err(deny(&actor, "create checklists", actor.id));
    }

    let checklist = Checklist::create(&mut *conn, &title, description.as_deref(), &category).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::CreateChecklist, ResourceType::Checklist)
            .resource(checklist.id)
            .description(format!("{} [{}]", checklist.title, checklist.category)),
    )
    .await?;

    Ok(checklist)
}

async fn add_item_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    checklist_id: Uuid,
    title: String,
    description: Option<String>,
    position: Option<i64>,
) -> Result<ChecklistItem> {
    let actor = load_user(&mut *conn, actor_id).await?;
    if !policy.can_manage_checklists(&actor) {
        return Err(deny(&actor, "edit checklists", checklist_id));
    }

    let checklist = Checklist::find_by_id(&mut *conn, checklist_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Checklist {} not found", checklist_id)))?;

    let position = match position {
        Some(position) => position,
        None => ChecklistItem::max_position(&mut *conn, checklist.id)
            .await?
            .map_or(0, |max| max + 1),
    };

    let item = ChecklistItem::create(
        &mut *conn,
        checklist.id,
        &title,
        description.as_deref(),
        position,
    )
    .await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::AddChecklistItem, ResourceType::ChecklistItem)
            .resource(item.id)
            .description(format!("{} #{}", checklist.title, item.position)),
    )
    .await?;

    Ok(item)
}
