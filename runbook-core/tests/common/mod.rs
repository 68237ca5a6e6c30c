//! Shared fixtures for integration tests
//!
//! Every test gets its own in-memory SQLite database with the schema
//! applied, so tests run in parallel without a server.

#![allow(dead_code)]

use runbook_core::auth::password::PasswordParams;
use runbook_core::db::migrations::run_migrations;
use runbook_core::db::pool::{create_pool, DatabaseConfig};
use runbook_core::models::team::Team;
use runbook_core::models::user::User;
use runbook_core::services::accounts::{Accounts, SignupRequest};
use runbook_core::services::teams::Teams;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";

/// Fresh migrated in-memory database
pub async fn test_pool() -> SqlitePool {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

/// Fresh migrated database file inside `dir`, with several connections
pub async fn file_pool(dir: &TempDir) -> SqlitePool {
    let pool = create_pool(DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("runbook.db").display()),
        max_connections: 5,
        ..Default::default()
    })
    .await
    .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

/// Account service with cheap hashing parameters
pub fn accounts(pool: &SqlitePool) -> Accounts {
    Accounts::new(pool.clone()).with_password_params(PasswordParams::insecure_fast())
}

pub fn signup_request(role: &str, team_code: Option<&str>) -> SignupRequest {
    let id = Uuid::new_v4().simple().to_string();
    SignupRequest {
        name: format!("{} {}", role, &id[..8]),
        email: format!("{}-{}@example.com", role, &id[..12]),
        password: PASSWORD.to_string(),
        role: role.to_string(),
        team_code: team_code.map(str::to_string),
    }
}

/// Signs up a user without approving them
pub async fn signup(pool: &SqlitePool, role: &str, team_code: Option<&str>) -> User {
    accounts(pool)
        .signup(signup_request(role, team_code))
        .await
        .expect("Failed to sign up user")
}

/// Admin accounts are approved on signup
pub async fn admin(pool: &SqlitePool) -> User {
    signup(pool, "admin", None).await
}

/// Coach approved by `admin`
pub async fn coach(pool: &SqlitePool, admin: &User) -> User {
    let coach = signup(pool, "coach", None).await;
    accounts(pool)
        .approve_user(admin.id, coach.id)
        .await
        .expect("Failed to approve coach")
}

pub async fn team(pool: &SqlitePool, creator: &User, code: &str) -> Team {
    Teams::new(pool.clone())
        .create_team(creator.id, &format!("Team {}", code), code, "Open")
        .await
        .expect("Failed to create team")
}

/// Approved member linked to `team`
pub async fn member(pool: &SqlitePool, approver: &User, team: &Team) -> User {
    let member = signup(pool, "member", Some(&team.code)).await;
    accounts(pool)
        .approve_user(approver.id, member.id)
        .await
        .expect("Failed to approve member")
}
