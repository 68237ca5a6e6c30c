/// Account service: signup, login, approval and role management
///
/// New accounts are approved only when their role is admin. Everyone else
/// waits for an approver allowed by the [`ApprovalPolicy`]: an admin, the
/// coach who created their team, or (when enabled) a captain of their team.
///
/// Rejecting a pending signup deletes the account; there is no "rejected"
/// state, so later lookups of the id report not found.
///
/// # Example
///
/// ```no_run
/// use runbook_core::services::accounts::{Accounts, SignupRequest};
/// use sqlx::SqlitePool;
/// use uuid::Uuid;
///
/// # async fn example(pool: SqlitePool, admin_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let accounts = Accounts::new(pool);
///
/// let user = accounts.signup(SignupRequest {
///     name: "Sam".to_string(),
///     email: "sam@example.com".to_string(),
///     password: "hunter2hunter2".to_string(),
///     role: "competitor".to_string(),
///     team_code: Some("01-0001".to_string()),
/// }).await?;
/// assert!(!user.is_approved);
///
/// accounts.approve_user(admin_id, user.id).await?;
/// # Ok(())
/// # }
/// ```

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::{deny, load_team, load_team_of, load_user};
use crate::auth::password::{
    hash_password_with, validate_password_strength, verify_password, PasswordParams,
};
use crate::auth::policy::{ApprovalPolicy, RolePolicy};
use crate::db::with_transaction;
use crate::error::{Error, Result};
use crate::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
use crate::models::role::Role;
use crate::models::team::{validate_team_code, Team};
use crate::models::user::{CreateUser, User};

/// Signup form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked with [`validate_password_strength`]
    pub password: String,

    /// Role label; aliases such as `competitor` are accepted
    pub role: String,

    /// Optional `NN-NNNN` code of the team to link
    pub team_code: Option<String>,
}

/// Account operations
#[derive(Clone)]
pub struct Accounts {
    pool: SqlitePool,
    policy: Arc<dyn ApprovalPolicy>,
    password_params: PasswordParams,
}

impl Accounts {
    /// Creates the service with [`RolePolicy::default`] and default Argon2 parameters
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            policy: Arc::new(RolePolicy::default()),
            password_params: PasswordParams::default(),
        }
    }

    pub fn with_policy(mut self, policy: impl ApprovalPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_password_params(mut self, params: PasswordParams) -> Self {
        self.password_params = params;
        self
    }

    /// Registers a new account
    ///
    /// Input is validated before anything is written: form fields, then the
    /// role, then the team code format. The account is approved only if the
    /// role is admin; linking a team never approves it.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for malformed input
    /// - `Error::Conflict` if the email is already registered
    /// - `Error::NotFound` if the team code does not exist
    pub async fn signup(&self, request: SignupRequest) -> Result<User> {
        request.validate()?;
        super::require_text("name", &request.name)?;
        validate_password_strength(&request.password)
            .map_err(|message| Error::invalid("password", message))?;
        let role: Role = request.role.parse()?;

        let team_code = request
            .team_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);
        if let Some(code) = &team_code {
            if !validate_team_code(code) {
                return Err(Error::invalid(
                    "team_code",
                    "Team code must be two digits, a dash and four digits (e.g. 01-0001)",
                ));
            }
        }

        if User::find_by_email(&self.pool, &request.email).await?.is_some() {
            return Err(Error::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password_with(&request.password, &self.password_params)?;
        let data = CreateUser {
            name: request.name,
            email: request.email,
            password_hash,
            role,
            team_id: None,
        };

        let user = with_transaction(&self.pool, move |conn| {
            Box::pin(signup_tx(conn, data, team_code))
        })
        .await?;

        info!(
            user_id = %user.id,
            role = %user.role,
            team_id = ?user.team_id,
            is_approved = user.is_approved,
            "User signed up"
        );
        Ok(user)
    }

    /// Checks credentials and returns the account
    ///
    /// # Errors
    ///
    /// `Error::Unauthorized` for an unknown email or wrong password, an
    /// inactive account, or a non-admin account still pending approval.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());

        let user = User::find_by_email(&self.pool, email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(invalid());
        }
        if !user.is_active {
            return Err(Error::Unauthorized("Account is inactive".to_string()));
        }
        if user.role != Role::Admin && !user.is_approved {
            return Err(Error::Unauthorized("Account pending approval".to_string()));
        }

        info!(user_id = %user.id, "User authenticated");
        Ok(user)
    }

    /// Approves a pending account
    ///
    /// Approving an account that is already approved changes nothing but is
    /// still recorded in the audit log.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the actor or user doesn't exist
    /// - `Error::Forbidden` if the policy denies the actor
    pub async fn approve_user(&self, actor_id: Uuid, user_id: Uuid) -> Result<User> {
        let policy = Arc::clone(&self.policy);
        let user = with_transaction(&self.pool, move |conn| {
            Box::pin(approve_tx(conn, policy, actor_id, user_id))
        })
        .await?;

        info!(actor_id = %actor_id, user_id = %user_id, "User approved");
        Ok(user)
    }

    /// Rejects a pending account by deleting it
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the actor or user doesn't exist (including a
    ///   user that was already rejected)
    /// - `Error::Forbidden` if the policy denies the actor
    /// - `Error::Conflict` if the user is already approved
    pub async fn reject_user(&self, actor_id: Uuid, user_id: Uuid) -> Result<()> {
        let policy = Arc::clone(&self.policy);
        with_transaction(&self.pool, move |conn| {
            Box::pin(reject_tx(conn, policy, actor_id, user_id))
        })
        .await?;

        info!(actor_id = %actor_id, user_id = %user_id, "User rejected and removed");
        Ok(())
    }

    /// Deletes an account, approved or not
    pub async fn remove_user(&self, actor_id: Uuid, user_id: Uuid) -> Result<()> {
        let policy = Arc::clone(&self.policy);
        with_transaction(&self.pool, move |conn| {
            Box::pin(remove_tx(conn, policy, actor_id, user_id))
        })
        .await?;

        info!(actor_id = %actor_id, user_id = %user_id, "User removed");
        Ok(())
    }

    /// Activates or deactivates an account (admins only)
    pub async fn set_active(&self, actor_id: Uuid, user_id: Uuid, active: bool) -> Result<User> {
        let policy = Arc::clone(&self.policy);
        let user = with_transaction(&self.pool, move |conn| {
            Box::pin(set_active_tx(conn, policy, actor_id, user_id, active))
        })
        .await?;

        info!(actor_id = %actor_id, user_id = %user_id, active, "User activation changed");
        Ok(user)
    }

    /// Changes a user's role
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `new_role` is not a known role
    /// - `Error::NotFound` if the actor or user doesn't exist
    /// - `Error::Forbidden` if the policy denies the change
    pub async fn change_role(&self, actor_id: Uuid, user_id: Uuid, new_role: &str) -> Result<User> {
        let new_role: Role = new_role.parse()?;
        let policy = Arc::clone(&self.policy);
        let user = with_transaction(&self.pool, move |conn| {
            Box::pin(change_role_tx(conn, policy, actor_id, user_id, new_role))
        })
        .await?;

        info!(actor_id = %actor_id, user_id = %user_id, role = %new_role, "Role changed");
        Ok(user)
    }

    /// Looks up an account by ID
    pub async fn get(&self, user_id: Uuid) -> Result<User> {
        load_user(&self.pool, user_id).await
    }

    /// Looks up an account by email
    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        User::find_by_email(&self.pool, email)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No user with email {}", email.trim())))
    }

    /// Lists pending accounts, optionally for one team
    pub async fn list_pending(&self, team_id: Option<Uuid>) -> Result<Vec<User>> {
        Ok(User::list_pending(&self.pool, team_id).await?)
    }

    /// Lists the pending accounts `actor_id` is allowed to approve
    pub async fn pending_for(&self, actor_id: Uuid) -> Result<Vec<User>> {
        let actor = load_user(&self.pool, actor_id).await?;
        let pending = User::list_pending(&self.pool, None).await?;

        let mut teams: HashMap<Uuid, Option<Team>> = HashMap::new();
        let mut approvable = Vec::new();
        for user in pending {
            let team = match user.team_id {
                Some(team_id) => {
                    if !teams.contains_key(&team_id) {
                        let team = Team::find_by_id(&self.pool, team_id).await?;
                        teams.insert(team_id, team);
                    }
                    teams.get(&team_id).and_then(|t| t.as_ref())
                }
                None => None,
            };
            if self.policy.can_approve(&actor, &user, team) {
                approvable.push(user);
            }
        }

        Ok(approvable)
    }

    /// Lists the members of a team
    pub async fn team_members(&self, team_id: Uuid) -> Result<Vec<User>> {
        load_team(&self.pool, team_id).await?;
        Ok(User::list_by_team(&self.pool, team_id).await?)
    }
}

async fn signup_tx(
    conn: &mut SqliteConnection,
    mut data: CreateUser,
    team_code: Option<String>,
) -> Result<User> {
    if User::find_by_email(&mut *conn, &data.email).await?.is_some() {
        return Err(Error::Conflict("Email already registered".to_string()));
    }

    if let Some(code) = team_code {
        let team = Team::find_by_code(&mut *conn, &code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Team with code {} not found", code)))?;
        data.team_id = Some(team.id);
    }

    let user = User::create(&mut *conn, data).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(user.id, AuditAction::Signup, ResourceType::User)
            .resource(user.id)
            .description(format!("Signed up as {}", user.role)),
    )
    .await?;

    Ok(user)
}

async fn approve_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    user_id: Uuid,
) -> Result<User> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let target = load_user(&mut *conn, user_id).await?;
    let team = load_team_of(&mut *conn, &target).await?;

    if !policy.can_approve(&actor, &target, team.as_ref()) {
        return Err(deny(&actor, "approve this user", target.id));
    }

    if target.is_approved {
        debug!(user_id = %target.id, "User already approved");
    } else {
        User::set_approved(&mut *conn, target.id, true).await?;
    }

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::Approve, ResourceType::User).resource(target.id),
    )
    .await?;

    load_user(&mut *conn, target.id).await
}

async fn reject_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let target = load_user(&mut *conn, user_id).await?;
    let team = load_team_of(&mut *conn, &target).await?;

    if !policy.can_approve(&actor, &target, team.as_ref()) {
        return Err(deny(&actor, "reject this user", target.id));
    }
    if target.is_approved {
        return Err(Error::Conflict(
            "User is already approved; remove the account instead".to_string(),
        ));
    }

    User::delete(&mut *conn, target.id).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::Reject, ResourceType::User)
            .resource(target.id)
            .description(format!("Rejected signup of {}", target.email)),
    )
    .await?;

    Ok(())
}

async fn remove_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let target = load_user(&mut *conn, user_id).await?;
    let team = load_team_of(&mut *conn, &target).await?;

    if !policy.can_remove_user(&actor, &target, team.as_ref()) {
        return Err(deny(&actor, "remove this user", target.id));
    }

    User::delete(&mut *conn, target.id).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::RemoveUser, ResourceType::User)
            .resource(target.id)
            .description(format!("Removed {} ({})", target.email, target.role)),
    )
    .await?;

    Ok(())
}

async fn set_active_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    user_id: Uuid,
    active: bool,
) -> Result<User> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let target = load_user(&mut *conn, user_id).await?;

    if !policy.can_set_active(&actor, &target) {
        return Err(deny(&actor, "change account activation", target.id));
    }

    User::set_active(&mut *conn, target.id, active).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::SetActive, ResourceType::User)
            .resource(target.id)
            .description(if active { "activated" } else { "deactivated" }),
    )
    .await?;

    load_user(&mut *conn, target.id).await
}

async fn change_role_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    user_id: Uuid,
    new_role: Role,
) -> Result<User> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let target = load_user(&mut *conn, user_id).await?;
    let team = load_team_of(&mut *conn, &target).await?;

    if !policy.can_change_role(&actor, &target, new_role, team.as_ref()) {
        return Err(deny(&actor, "change this user's role", target.id));
    }

    User::set_role(&mut *conn, target.id, new_role).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::ChangeRole, ResourceType::User)
            .resource(target.id)
            .description(format!("{} -> {}", target.role, new_role)),
    )
    .await?;

    load_user(&mut *conn, target.id).await
}
