/// Application services
///
/// Services are the operations a presentation layer calls. Each one loads
/// what it needs, asks the [`ApprovalPolicy`](crate::auth::policy::ApprovalPolicy)
/// and writes its change together with an audit entry in a single
/// transaction. A failure at any step leaves the database unchanged.
///
/// # Services
///
/// - [`accounts::Accounts`]: signup, login, approval, roles
/// - [`teams::Teams`]: team creation and management
/// - [`join_requests::JoinRequests`]: team join workflow
/// - [`checklists::Checklists`]: checklists and per-user progress
/// - [`readmes::ReadMes`]: team README documents
/// - [`notes::Notes`]: team notes with optional encryption
/// - [`audit::AuditTrail`]: read access to the audit log
///
/// # Example
///
/// ```no_run
/// use runbook_core::db::pool::{create_pool, DatabaseConfig};
/// use runbook_core::services::accounts::Accounts;
/// use uuid::Uuid;
///
/// # async fn example(admin_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let accounts = Accounts::new(pool.clone());
///
/// let user = accounts.approve_user(admin_id, user_id).await?;
/// assert!(user.is_approved);
/// # Ok(())
/// # }
/// ```

pub mod accounts;
pub mod audit;
pub mod checklists;
pub mod join_requests;
pub mod notes;
pub mod readmes;
pub mod teams;

use sqlx::SqliteExecutor;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::team::Team;
use crate::models::user::User;

pub(crate) async fn load_user<'e, E>(executor: E, id: Uuid) -> Result<User>
where
    E: SqliteExecutor<'e>,
{
    User::find_by_id(executor, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))
}

pub(crate) async fn load_team<'e, E>(executor: E, id: Uuid) -> Result<Team>
where
    E: SqliteExecutor<'e>,
{
    Team::find_by_id(executor, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Team {} not found", id)))
}

/// Loads the user's team, if they have one
pub(crate) async fn load_team_of<'e, E>(executor: E, user: &User) -> Result<Option<Team>>
where
    E: SqliteExecutor<'e>,
{
    match user.team_id {
        Some(team_id) => Ok(Team::find_by_id(executor, team_id).await?),
        None => Ok(None),
    }
}

/// Logs a policy denial and builds the matching error
pub(crate) fn deny(actor: &User, operation: &'static str, resource_id: Uuid) -> Error {
    warn!(
        actor_id = %actor.id,
        actor_role = %actor.role,
        operation,
        resource_id = %resource_id,
        "Permission denied"
    );
    Error::Forbidden(format!("Role '{}' may not {}", actor.role, operation))
}

/// Rejects empty or whitespace-only text fields
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid(field, format!("{} must not be empty", field)));
    }
    Ok(())
}
