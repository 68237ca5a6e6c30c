/// Team service
///
/// Admins and coaches create teams; the creator becomes the approver for
/// the team's join requests and pending members.

use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{deny, load_team, load_user, require_text};
use crate::auth::policy::{ApprovalPolicy, RolePolicy};
use crate::db::with_transaction;
use crate::error::{Error, Result};
use crate::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
use crate::models::team::{validate_team_code, CreateTeam, Team, UpdateTeam};

/// Team operations
#[derive(Clone)]
pub struct Teams {
    pool: SqlitePool,
    policy: Arc<dyn ApprovalPolicy>,
}

impl Teams {
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

    /// Creates a team owned by `actor_id`
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for a malformed code or empty name/division
    /// - `Error::Forbidden` unless the actor is an approved admin or coach
    /// - `Error::Conflict` if the code is taken
    pub async fn create_team(
        &self,
        actor_id: Uuid,
        name: &str,
        code: &str,
        division: &str,
    ) -> Result<Team> {
        require_text("name", name)?;
        require_text("division", division)?;
        let code = code.trim();
        if !validate_team_code(code) {
            return Err(Error::invalid(
                "code",
                "Team code must be two digits, a dash and four digits (e.g. 01-0001)",
            ));
        }

        let policy = Arc::clone(&self.policy);
        let data = CreateTeam {
            name: name.to_string(),
            code: code.to_string(),
            division: division.to_string(),
            created_by: Some(actor_id),
        };
        let team = with_transaction(&self.pool, move |conn| {
            Box::pin(create_tx(conn, policy, actor_id, data))
        })
        .await?;

        info!(actor_id = %actor_id, team_id = %team.id, code = %team.code, "Team created");
        Ok(team)
    }

    /// Renames a team or changes its division
    pub async fn update_team(
        &self,
        actor_id: Uuid,
        team_id: Uuid,
        name: Option<&str>,
        division: Option<&str>,
    ) -> Result<Team> {
        if let Some(name) = name {
            require_text("name", name)?;
        }
        if let Some(division) = division {
            require_text("division", division)?;
        }

        let policy = Arc::clone(&self.policy);
        let data = UpdateTeam {
            name: name.map(str::to_string),
            division: division.map(str::to_string),
        };
        let team = with_transaction(&self.pool, move |conn| {
            Box::pin(update_tx(conn, policy, actor_id, team_id, data))
        })
        .await?;

        info!(actor_id = %actor_id, team_id = %team_id, "Team updated");
        Ok(team)
    }

    /// Deletes a team; its members are unlinked, not removed
    pub async fn delete_team(&self, actor_id: Uuid, team_id: Uuid) -> Result<()> {
        let policy = Arc::clone(&self.policy);
        with_transaction(&self.pool, move |conn| {
            Box::pin(delete_tx(conn, policy, actor_id, team_id))
        })
        .await?;

        info!(actor_id = %actor_id, team_id = %team_id, "Team deleted");
        Ok(())
    }

    pub async fn get(&self, team_id: Uuid) -> Result<Team> {
        load_team(&self.pool, team_id).await
    }

    pub async fn by_code(&self, code: &str) -> Result<Team> {
        Team::find_by_code(&self.pool, code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Team with code {} not found", code.trim())))
    }

    pub async fn list(&self) -> Result<Vec<Team>> {
        Ok(Team::list(&self.pool).await?)
    }

    /// Teams created by `actor_id`
    pub async fn created_by(&self, actor_id: Uuid) -> Result<Vec<Team>> {
        Ok(Team::list_by_creator(&self.pool, actor_id).await?)
    }
}

async fn create_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    data: CreateTeam,
) -> Result<Team> {
    let actor = load_user(&mut *conn, actor_id).await?;
    if !policy.can_create_team(&actor) {
        return Err(deny(&actor, "create teams", actor.id));
    }

    if Team::find_by_code(&mut *conn, &data.code).await?.is_some() {
        return Err(Error::Conflict(format!("Team code {} is already in use", data.code)));
    }

    let team = Team::create(&mut *conn, data).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::CreateTeam, ResourceType::Team)
            .resource(team.id)
            .description(format!("{} ({})", team.name, team.code)),
    )
    .await?;

    Ok(team)
}

async fn update_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    team_id: Uuid,
    data: UpdateTeam,
) -> Result<Team> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let team = load_team(&mut *conn, team_id).await?;
    if !policy.can_manage_team(&actor, &team) {
        return Err(deny(&actor, "manage this team", team.id));
    }

    let updated = Team::update(&mut *conn, team.id, data)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Team {} not found", team_id)))?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::UpdateTeam, ResourceType::Team)
            .resource(updated.id),
    )
    .await?;

    Ok(updated)
}

async fn delete_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    team_id: Uuid,
) -> Result<()> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let team = load_team(&mut *conn, team_id).await?;
    if !policy.can_manage_team(&actor, &team) {
        return Err(deny(&actor, "delete this team", team.id));
    }

    Team::delete(&mut *conn, team.id).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::DeleteTeam, ResourceType::Team)
            .resource(team.id)
            .description(format!("{} ({})", team.name, team.code)),
    )
    .await?;

    Ok(())
}
