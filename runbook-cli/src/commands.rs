/// Command handlers
///
/// Each handler takes an open pool and returns what the binary prints, so
/// the same code runs against an in-memory database in tests.

use anyhow::Context;
use runbook_core::auth::password::PasswordParams;
use runbook_core::db::migrations::{get_migration_status, run_migrations, MigrationStatus};
use runbook_core::db::pool::{get_pool_stats, health_check};
use runbook_core::models::audit_log::AuditLogEntry;
use runbook_core::models::team::Team;
use runbook_core::models::user::User;
use runbook_core::services::accounts::{Accounts, SignupRequest};
use runbook_core::services::audit::AuditTrail;
use runbook_core::services::teams::Teams;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Snapshot printed by `runbook status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub database_ok: bool,
    pub applied_migrations: usize,
    pub known_migrations: usize,
    pub schema_up_to_date: bool,
    pub users: i64,
    pub pending_users: usize,
    pub teams: usize,
    pub audit_entries: i64,
    pub pool_connections: usize,
}

/// Outcome of `runbook create-admin`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CreateAdminOutcome {
    Created { user: User },
    AlreadyExists { email: String },
}

/// Applies pending migrations and reports the resulting status
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    run_migrations(pool).await.context("Failed to run migrations")?;
    let status = get_migration_status(pool).await?;
    info!(applied = status.applied_migrations, "Schema is up to date");
    Ok(status)
}

pub async fn status(pool: &SqlitePool) -> anyhow::Result<StatusReport> {
    health_check(pool).await.context("Database health check failed")?;
    let migrations = get_migration_status(pool).await?;
    let stats = get_pool_stats(pool);

    if !migrations.is_up_to_date {
        return Ok(StatusReport {
            database_ok: true,
            applied_migrations: migrations.applied_migrations,
            known_migrations: migrations.known_migrations,
            schema_up_to_date: false,
            users: 0,
            pending_users: 0,
            teams: 0,
            audit_entries: 0,
            pool_connections: stats.total_connections,
        });
    }

    Ok(StatusReport {
        database_ok: true,
        applied_migrations: migrations.applied_migrations,
        known_migrations: migrations.known_migrations,
        schema_up_to_date: true,
        users: User::count(pool).await?,
        pending_users: User::list_pending(pool, None).await?.len(),
        teams: Team::list(pool).await?.len(),
        audit_entries: AuditLogEntry::count(pool).await?,
        pool_connections: stats.total_connections,
    })
}

/// Creates the bootstrap admin unless an account with that email exists
pub async fn create_admin(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    password: &str,
    params: PasswordParams,
) -> anyhow::Result<CreateAdminOutcome> {
    if User::find_by_email(pool, email).await?.is_some() {
        info!(email, "Admin account already exists");
        return Ok(CreateAdminOutcome::AlreadyExists {
            email: email.to_string(),
        });
    }

    let user = Accounts::new(pool.clone())
        .with_password_params(params)
        .signup(SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: "admin".to_string(),
            team_code: None,
        })
        .await
        .context("Failed to create admin account")?;

    Ok(CreateAdminOutcome::Created { user })
}

pub async fn teams(pool: &SqlitePool) -> anyhow::Result<Vec<Team>> {
    Ok(Teams::new(pool.clone()).list().await?)
}

/// Pending accounts, optionally only those linked to the team with `team_code`
pub async fn pending(pool: &SqlitePool, team_code: Option<&str>) -> anyhow::Result<Vec<User>> {
    let team_id = match team_code {
        Some(code) => Some(Teams::new(pool.clone()).by_code(code).await?.id),
        None => None,
    };
    Ok(Accounts::new(pool.clone()).list_pending(team_id).await?)
}

pub async fn approve(pool: &SqlitePool, user_id: Uuid, actor_email: &str) -> anyhow::Result<User> {
    let accounts = Accounts::new(pool.clone());
    let actor = accounts
        .get_by_email(actor_email)
        .await
        .with_context(|| format!("Unknown actor {}", actor_email))?;
    Ok(accounts.approve_user(actor.id, user_id).await?)
}

pub async fn reject(pool: &SqlitePool, user_id: Uuid, actor_email: &str) -> anyhow::Result<()> {
    let accounts = Accounts::new(pool.clone());
    let actor = accounts
        .get_by_email(actor_email)
        .await
        .with_context(|| format!("Unknown actor {}", actor_email))?;
    accounts.reject_user(actor.id, user_id).await?;
    Ok(())
}

pub async fn audit(pool: &SqlitePool, limit: i64) -> anyhow::Result<Vec<AuditLogEntry>> {
    Ok(AuditTrail::new(pool.clone()).recent(limit).await?)
}
