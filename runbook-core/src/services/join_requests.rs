/// Team join request workflow
///
/// ```text
///            approve_request
///   pending ─────────────────▶ approved   (requester joins team, account approved)
///      │
///      └──────────────────────▶ rejected  (requester untouched)
///            reject_request
/// ```
///
/// Both end states are final; acting on a resolved request is a conflict.
/// [`JoinRequests::reject_request_and_remove_user`] additionally deletes a
/// requester whose account is still pending.
///
/// # Example
///
/// ```no_run
/// use runbook_core::services::join_requests::JoinRequests;
/// use sqlx::SqlitePool;
/// use uuid::Uuid;
///
/// # async fn example(pool: SqlitePool, member_id: Uuid, coach_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let requests = JoinRequests::new(pool);
///
/// let request = requests.create_request(member_id, "01-0001", Some("I'd like to join")).await?;
/// requests.approve_request(coach_id, request.id).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{deny, load_team, load_user};
use crate::auth::policy::{ApprovalPolicy, RolePolicy};
use crate::db::with_transaction;
use crate::error::{Error, Result};
use crate::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
use crate::models::join_request::{
    CreateJoinRequest, JoinRequest, JoinRequestStatus, MAX_MESSAGE_LENGTH,
};
use crate::models::team::Team;
use crate::models::user::User;

/// Which earlier requests block a new one for the same (team, requester)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateRule {
    /// Any earlier request, whatever its status
    #[default]
    AnyExisting,

    /// Only a request that is still pending; a rejected user may ask again
    PendingOnly,
}

/// Tunables for the join workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinRequestRules {
    pub duplicate_rule: DuplicateRule,
}

/// Team reference by ID or by `NN-NNNN` code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamRef {
    Id(Uuid),
    Code(String),
}

impl From<Uuid> for TeamRef {
    fn from(id: Uuid) -> Self {
        TeamRef::Id(id)
    }
}

impl From<&str> for TeamRef {
    fn from(code: &str) -> Self {
        TeamRef::Code(code.trim().to_string())
    }
}

impl From<String> for TeamRef {
    fn from(code: String) -> Self {
        TeamRef::from(code.as_str())
    }
}

/// Join request operations
#[derive(Clone)]
pub struct JoinRequests {
    pool: SqlitePool,
    policy: Arc<dyn ApprovalPolicy>,
    rules: JoinRequestRules,
}

impl JoinRequests {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            policy: Arc::new(RolePolicy::default()),
            rules: JoinRequestRules::default(),
        }
    }

    pub fn with_policy(mut self, policy: impl ApprovalPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_rules(mut self, rules: JoinRequestRules) -> Self {
        self.rules = rules;
        self
    }

    /// Asks to join a team
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the team or requester doesn't exist
    /// - `Error::Validation` if the team has no creator, the requester is the
    ///   creator, or the message is longer than 500 characters
    /// - `Error::Conflict` if an earlier request blocks this one under the
    ///   configured [`DuplicateRule`]
    pub async fn create_request(
        &self,
        requester_id: Uuid,
        team: impl Into<TeamRef>,
        message: Option<&str>,
    ) -> Result<JoinRequest> {
        let team = team.into();
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let rules = self.rules;

        let request = with_transaction(&self.pool, move |conn| {
            Box::pin(create_tx(conn, rules, requester_id, team, message))
        })
        .await?;

        info!(
            request_id = %request.id,
            team_id = %request.team_id,
            requester_id = %requester_id,
            "Join request created"
        );
        Ok(request)
    }

    /// Approves a pending request
    ///
    /// In one transaction: the request becomes approved, the requester is
    /// linked to the team and their account is approved.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the request, actor or requester doesn't exist
    /// - `Error::Conflict` if the request was already resolved
    /// - `Error::Forbidden` if the policy denies the actor
    pub async fn approve_request(&self, actor_id: Uuid, request_id: Uuid) -> Result<JoinRequest> {
        let policy = Arc::clone(&self.policy);
        let request = with_transaction(&self.pool, move |conn| {
            Box::pin(approve_tx(conn, policy, actor_id, request_id))
        })
        .await?;

        info!(
            actor_id = %actor_id,
            request_id = %request_id,
            requester_id = %request.requester_id,
            team_id = %request.team_id,
            "Join request approved"
        );
        Ok(request)
    }

    /// Rejects a pending request; the requester's account is left as is
    pub async fn reject_request(&self, actor_id: Uuid, request_id: Uuid) -> Result<JoinRequest> {
        let policy = Arc::clone(&self.policy);
        let request = with_transaction(&self.pool, move |conn| {
            Box::pin(reject_tx(conn, policy, actor_id, request_id))
        })
        .await?;

        info!(actor_id = %actor_id, request_id = %request_id, "Join request rejected");
        Ok(request)
    }

    /// Rejects a pending request and deletes the requester's pending account
    ///
    /// The request row is removed along with the account; the audit log keeps
    /// both the `reject_join_request` and the `reject` entry.
    ///
    /// # Errors
    ///
    /// As [`JoinRequests::reject_request`], plus `Error::Conflict` if the
    /// requester's account is already approved.
    pub async fn reject_request_and_remove_user(&self, actor_id: Uuid, request_id: Uuid) -> Result<()> {
        let policy = Arc::clone(&self.policy);
        let requester_id = with_transaction(&self.pool, move |conn| {
            Box::pin(reject_and_remove_tx(conn, policy, actor_id, request_id))
        })
        .await?;

        info!(
            actor_id = %actor_id,
            request_id = %request_id,
            requester_id = %requester_id,
            "Join request rejected and requester removed"
        );
        Ok(())
    }

    pub async fn get(&self, request_id: Uuid) -> Result<JoinRequest> {
        JoinRequest::find_by_id(&self.pool, request_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Join request {} not found", request_id)))
    }

    pub async fn pending_for_team(&self, team_id: Uuid) -> Result<Vec<JoinRequest>> {
        Ok(JoinRequest::list_pending_for_team(&self.pool, team_id).await?)
    }

    /// Pending requests addressed to a team creator
    pub async fn pending_for_creator(&self, creator_id: Uuid) -> Result<Vec<JoinRequest>> {
        Ok(JoinRequest::list_pending_for_creator(&self.pool, creator_id).await?)
    }

    pub async fn pending_for_requester(&self, requester_id: Uuid) -> Result<Vec<JoinRequest>> {
        Ok(JoinRequest::list_pending_for_requester(&self.pool, requester_id).await?)
    }
}

async fn resolve_team(conn: &mut SqliteConnection, team: &TeamRef) -> Result<Team> {
    match team {
        TeamRef::Id(id) => load_team(&mut *conn, *id).await,
        TeamRef::Code(code) => Team::find_by_code(&mut *conn, code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Team with code {} not found", code))),
    }
}

async fn create_tx(
    conn: &mut SqliteConnection,
    rules: JoinRequestRules,
    requester_id: Uuid,
    team: TeamRef,
    message: Option<String>,
) -> Result<JoinRequest> {
    let team = resolve_team(&mut *conn, &team).await?;
    let requester = load_user(&mut *conn, requester_id).await?;

    let creator_id = team.created_by.ok_or_else(|| {
        Error::invalid("team", "Team has no creator to approve join requests")
    })?;
    if creator_id == requester.id {
        return Err(Error::invalid("team", "You cannot request to join your own team"));
    }
    if let Some(message) = &message {
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(Error::invalid(
                "message",
                format!("Message must be at most {} characters", MAX_MESSAGE_LENGTH),
            ));
        }
    }

    let existing = match rules.duplicate_rule {
        DuplicateRule::AnyExisting => {
            JoinRequest::find_for_pair(&mut *conn, team.id, requester.id).await?
        }
        DuplicateRule::PendingOnly => {
            JoinRequest::find_pending_for_pair(&mut *conn, team.id, requester.id).await?
        }
    };
    if let Some(existing) = existing {
        return Err(Error::Conflict(format!(
            "A join request for this team already exists ({})",
            existing.status
        )));
    }

    let request = JoinRequest::create(
        &mut *conn,
        CreateJoinRequest {
            team_id: team.id,
            requester_id: requester.id,
            team_creator_id: creator_id,
            message,
        },
    )
    .await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(requester.id, AuditAction::RequestJoin, ResourceType::JoinRequest)
            .resource(request.id)
            .description(format!("Requested to join {}", team.code)),
    )
    .await?;

    Ok(request)
}

/// Loads a pending request with its actor and requester and checks the policy
async fn load_for_resolution(
    conn: &mut SqliteConnection,
    policy: &dyn ApprovalPolicy,
    actor_id: Uuid,
    request_id: Uuid,
    operation: &'static str,
) -> Result<(JoinRequest, User, User)> {
    let request = JoinRequest::find_by_id(&mut *conn, request_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Join request {} not found", request_id)))?;

    if request.status.is_terminal() {
        return Err(Error::Conflict(format!(
            "Join request was already {}",
            request.status
        )));
    }

    let actor = load_user(&mut *conn, actor_id).await?;
    let requester = load_user(&mut *conn, request.requester_id).await?;

    if !policy.can_resolve_join_request(&actor, &request, &requester) {
        return Err(deny(&actor, operation, request.id));
    }

    Ok((request, actor, requester))
}

/// Moves the request out of pending, guarding against a concurrent resolution
async fn resolve(
    conn: &mut SqliteConnection,
    request_id: Uuid,
    status: JoinRequestStatus,
) -> Result<JoinRequest> {
    JoinRequest::resolve(&mut *conn, request_id, status)
        .await?
        .ok_or_else(|| Error::Conflict("Join request was already resolved".to_string()))
}

async fn approve_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    request_id: Uuid,
) -> Result<JoinRequest> {
    let (request, actor, requester) =
        load_for_resolution(&mut *conn, policy.as_ref(), actor_id, request_id, "approve this join request")
            .await?;

    let approved = resolve(&mut *conn, request.id, JoinRequestStatus::Approved).await?;
    User::assign_team(&mut *conn, requester.id, Some(request.team_id)).await?;
    User::set_approved(&mut *conn, requester.id, true).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::ApproveJoinRequest, ResourceType::JoinRequest)
            .resource(request.id)
            .description(format!("{} joined the team", requester.email)),
    )
    .await?;

    Ok(approved)
}

async fn reject_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    request_id: Uuid,
) -> Result<JoinRequest> {
    let (request, actor, requester) =
        load_for_resolution(&mut *conn, policy.as_ref(), actor_id, request_id, "reject this join request")
            .await?;

    let rejected = resolve(&mut *conn, request.id, JoinRequestStatus::Rejected).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::RejectJoinRequest, ResourceType::JoinRequest)
            .resource(request.id)
            .description(format!("Declined {}", requester.email)),
    )
    .await?;

    Ok(rejected)
}

async fn reject_and_remove_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    request_id: Uuid,
) -> Result<Uuid> {
    let (request, actor, requester) =
        load_for_resolution(&mut *conn, policy.as_ref(), actor_id, request_id, "reject this join request")
            .await?;

    if requester.is_approved {
        return Err(Error::Conflict(
            "Requester's account is already approved and cannot be removed this way".to_string(),
        ));
    }

    resolve(&mut *conn, request.id, JoinRequestStatus::Rejected).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::RejectJoinRequest, ResourceType::JoinRequest)
            .resource(request.id)
            .description(format!("Declined {}", requester.email)),
    )
    .await?;

    User::delete(&mut *conn, requester.id).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::Reject, ResourceType::User)
            .resource(requester.id)
            .description(format!("Rejected signup of {}", requester.email)),
    )
    .await?;

    Ok(requester.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        assert_eq!(JoinRequestRules::default().duplicate_rule, DuplicateRule::AnyExisting);
    }

    #[test]
    fn test_team_ref_conversions() {
        let id = Uuid::new_v4();
        assert_eq!(TeamRef::from(id), TeamRef::Id(id));
        assert_eq!(TeamRef::from(" 01-0001 "), TeamRef::Code("01-0001".to_string()));
        assert_eq!(
            TeamRef::from("02-0002".to_string()),
            TeamRef::Code("02-0002".to_string())
        );
    }
}
