/// Database models for Runbook
///
/// Each model owns its SQL. Functions are generic over
/// [`sqlx::SqliteExecutor`], so they run against the pool or inside an open
/// transaction (`&mut *tx`) alike.
///
/// # Models
///
/// - `user`: accounts, approval and activation flags
/// - `role`: the closed set of user roles
/// - `team`: teams and their `NN-NNNN` codes
/// - `join_request`: requests to join a team
/// - `checklist`: checklists, items and per-user item status
/// - `readme`: team README documents
/// - `note`: team notes, optionally encrypted
/// - `audit_log`: append-only audit trail
///
/// # Example
///
/// ```no_run
/// use runbook_core::models::team::{CreateTeam, Team};
/// use runbook_core::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let team = Team::create(&pool, CreateTeam {
///     name: "Alpha".to_string(),
///     code: "01-0001".to_string(),
///     division: "Open".to_string(),
///     created_by: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod audit_log;
pub mod checklist;
pub mod join_request;
pub mod note;
pub mod readme;
pub mod role;
pub mod team;
pub mod user;
