/// Team README service
///
/// READMEs are competition-image notes kept per team and OS. Anyone who can
/// access the team may write one; only the author, the team creator or an
/// admin may change or delete it.

use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{deny, load_team, load_user, require_text};
use crate::auth::policy::{ApprovalPolicy, RolePolicy};
use crate::db::with_transaction;
use crate::error::{Error, Result};
use crate::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
use crate::models::readme::{CreateReadMe, ReadMe, UpdateReadMe};

/// README operations
#[derive(Clone)]
pub struct ReadMes {
    pool: SqlitePool,
    policy: Arc<dyn ApprovalPolicy>,
}

impl ReadMes {
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

    /// Writes a README for a team
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if title, OS type or content is empty
    /// - `Error::NotFound` for an unknown actor or team
    /// - `Error::Forbidden` unless the actor can access the team
    pub async fn create(
        &self,
        actor_id: Uuid,
        team_id: Uuid,
        title: &str,
        os_type: &str,
        content: &str,
    ) -> Result<ReadMe> {
        require_text("title", title)?;
        require_text("os_type", os_type)?;
        require_text("content", content)?;

        let policy = Arc::clone(&self.policy);
        let data = CreateReadMe {
            team_id,
            author_id: actor_id,
            title: title.to_string(),
            os_type: os_type.to_string(),
            content: content.to_string(),
        };
        let readme = with_transaction(&self.pool, move |conn| {
            Box::pin(create_tx(conn, policy, data))
        })
        .await?;

        info!(actor_id = %actor_id, team_id = %team_id, readme_id = %readme.id, "README created");
        Ok(readme)
    }

    /// Applies the fields set in `data`
    pub async fn update(&self, actor_id: Uuid, readme_id: Uuid, data: UpdateReadMe) -> Result<ReadMe> {
        if let Some(title) = &data.title {
            require_text("title", title)?;
        }
        if let Some(os_type) = &data.os_type {
            require_text("os_type", os_type)?;
        }
        if let Some(content) = &data.content {
            require_text("content", content)?;
        }

        let policy = Arc::clone(&self.policy);
        let readme = with_transaction(&self.pool, move |conn| {
            Box::pin(update_tx(conn, policy, actor_id, readme_id, data))
        })
        .await?;

        info!(actor_id = %actor_id, readme_id = %readme_id, "README updated");
        Ok(readme)
    }

    pub async fn delete(&self, actor_id: Uuid, readme_id: Uuid) -> Result<()> {
        let policy = Arc::clone(&self.policy);
        with_transaction(&self.pool, move |conn| {
            Box::pin(delete_tx(conn, policy, actor_id, readme_id))
        })
        .await?;

        info!(actor_id = %actor_id, readme_id = %readme_id, "README deleted");
        Ok(())
    }

    pub async fn get(&self, readme_id: Uuid) -> Result<ReadMe> {
        ReadMe::find_by_id(&self.pool, readme_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("README {} not found", readme_id)))
    }

    /// READMEs of a team, newest first
    pub async fn for_team(&self, team_id: Uuid) -> Result<Vec<ReadMe>> {
        Ok(ReadMe::list_for_team(&self.pool, team_id).await?)
    }
}

async fn load_readme(conn: &mut SqliteConnection, readme_id: Uuid) -> Result<ReadMe> {
    ReadMe::find_by_id(&mut *conn, readme_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("README {} not found", readme_id)))
}

async fn create_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    data: CreateReadMe,
) -> Result<ReadMe> {
    let actor = load_user(&mut *conn, data.author_id).await?;
    let team = load_team(&mut *conn, data.team_id).await?;
    if !policy.can_access_team(&actor, &team) {
        return Err(deny(&actor, "write READMEs for this team", team.id));
    }

    let readme = ReadMe::create(&mut *conn, data).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::CreateReadme, ResourceType::Readme)
            .resource(readme.id)
            .description(format!("{} ({})", readme.title, readme.os_type)),
    )
    .await?;

    Ok(readme)
}

async fn update_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    readme_id: Uuid,
    data: UpdateReadMe,
) -> Result<ReadMe> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let readme = load_readme(&mut *conn, readme_id).await?;
    let team = load_team(&mut *conn, readme.team_id).await?;
    if !policy.can_edit_team_content(&actor, readme.author_id, &team) {
        return Err(deny(&actor, "edit this README", readme.id));
    }

    let updated = ReadMe::update(&mut *conn, readme.id, data)
        .await?
        .ok_or_else(|| Error::NotFound(format!("README {} not found", readme_id)))?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::UpdateReadme, ResourceType::Readme)
            .resource(updated.id),
    )
    .await?;

    Ok(updated)
}

async fn delete_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    readme_id: Uuid,
) -> Result<()> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let readme = load_readme(&mut *conn, readme_id).await?;
    let team = load_team(&mut *conn, readme.team_id).await?;
    if !policy.can_edit_team_content(&actor, readme.author_id, &team) {
        return Err(deny(&actor, "delete this README", readme.id));
    }

    ReadMe::delete(&mut *conn, readme.id).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::DeleteReadme, ResourceType::Readme)
            .resource(readme.id)
            .description(readme.title),
    )
    .await?;

    Ok(())
}
