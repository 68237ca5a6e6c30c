/// Authorization policy
///
/// Every permission decision in Runbook goes through an [`ApprovalPolicy`].
/// The checks are pure functions over already-loaded records, so services
/// load the actor, the target and the relevant team inside their transaction
/// and ask the policy before writing anything.
///
/// # Rules
///
/// The actor must be active and approved (admins are exempt from approval).
///
/// | Operation                | Admin          | Coach                          | Captain                            |
/// |--------------------------|----------------|--------------------------------|------------------------------------|
/// | approve / reject user    | anyone but self| users on teams they created    | members of own team, if enabled    |
/// | change role              | anyone but self| captain/mentor/member on own teams | never                          |
/// | resolve join request     | any            | requests to teams they created | member requests to own team, if enabled |
/// | remove user              | anyone but self| users on teams they created    | never                              |
/// | create team              | yes            | yes                            | never                              |
///
/// Mentors and members never approve anyone.
///
/// # Example
///
/// ```
/// use runbook_core::auth::policy::{ApprovalPolicy, RolePolicy};
///
/// let policy = RolePolicy::default();
/// assert!(!policy.captains_approve_members);
///
/// let permissive = RolePolicy::new().with_captain_approval(true);
/// assert!(permissive.captains_approve_members);
/// ```

use uuid::Uuid;

use crate::models::join_request::JoinRequest;
use crate::models::role::Role;
use crate::models::team::Team;
use crate::models::user::User;

/// Permission checks consulted by every service
pub trait ApprovalPolicy: Send + Sync {
    /// May `actor` approve or reject the pending account `target`?
    fn can_approve(&self, actor: &User, target: &User, target_team: Option<&Team>) -> bool;

    /// May `actor` give `target` the role `new_role`?
    fn can_change_role(
        &self,
        actor: &User,
        target: &User,
        new_role: Role,
        target_team: Option<&Team>,
    ) -> bool;

    /// May `actor` approve or reject `request`, made by `requester`?
    fn can_resolve_join_request(&self, actor: &User, request: &JoinRequest, requester: &User) -> bool;

    /// May `actor` delete the account `target`?
    fn can_remove_user(&self, actor: &User, target: &User, target_team: Option<&Team>) -> bool;

    /// May `actor` activate or deactivate accounts?
    fn can_set_active(&self, actor: &User, target: &User) -> bool;

    /// May `actor` create teams?
    fn can_create_team(&self, actor: &User) -> bool;

    /// May `actor` rename or delete `team`?
    fn can_manage_team(&self, actor: &User, team: &Team) -> bool;

    /// May `actor` read and add content for `team`?
    fn can_access_team(&self, actor: &User, team: &Team) -> bool;

    /// May `actor` edit or delete content written by `author_id` in `team`?
    fn can_edit_team_content(&self, actor: &User, author_id: Uuid, team: &Team) -> bool;

    /// May `actor` create checklists and add items?
    fn can_manage_checklists(&self, actor: &User) -> bool;
}

/// Role-based policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolePolicy {
    /// Lets captains approve members of their own team
    pub captains_approve_members: bool,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_captain_approval(mut self, enabled: bool) -> Self {
        self.captains_approve_members = enabled;
        self
    }

    fn captain_may_act_on(&self, actor: &User, target: &User, team_id: Option<Uuid>) -> bool {
        self.captains_approve_members
            && actor.role == Role::Captain
            && target.role == Role::Member
            && team_id.is_some()
            && actor.team_id == team_id
    }
}

fn created_team(actor: &User, team: Option<&Team>) -> bool {
    team.is_some_and(|t| t.is_created_by(actor.id))
}

impl ApprovalPolicy for RolePolicy {
    fn can_approve(&self, actor: &User, target: &User, target_team: Option<&Team>) -> bool {
        if !actor.can_act() || actor.id == target.id {
            return false;
        }

        match actor.role {
            Role::Admin => true,
            Role::Coach => created_team(actor, target_team),
            Role::Captain => self.captain_may_act_on(actor, target, target.team_id),
            Role::Mentor | Role::Member => false,
        }
    }

    fn can_change_role(
        &self,
        actor: &User,
        target: &User,
        new_role: Role,
        target_team: Option<&Team>,
    ) -> bool {
        if !actor.can_act() || actor.id == target.id {
            return false;
        }

        match actor.role {
            Role::Admin => true,
            Role::Coach => {
                new_role.assignable_by_coach()
                    && target.role.assignable_by_coach()
                    && created_team(actor, target_team)
            }
            Role::Captain | Role::Mentor | Role::Member => false,
        }
    }

    fn can_resolve_join_request(&self, actor: &User, request: &JoinRequest, requester: &User) -> bool {
        if !actor.can_act() || actor.id == requester.id {
            return false;
        }

        match actor.role {
            Role::Admin => true,
            _ if request.team_creator_id == actor.id => true,
            Role::Captain => self.captain_may_act_on(actor, requester, Some(request.team_id)),
            _ => false,
        }
    }

    fn can_remove_user(&self, actor: &User, target: &User, target_team: Option<&Team>) -> bool {
        if !actor.can_act() || actor.id == target.id {
            return false;
        }

        match actor.role {
            Role::Admin => true,
            Role::Coach => target.role.assignable_by_coach() && created_team(actor, target_team),
            _ => false,
        }
    }

    fn can_set_active(&self, actor: &User, target: &User) -> bool {
        actor.can_act() && actor.role == Role::Admin && actor.id != target.id
    }

    fn can_create_team(&self, actor: &User) -> bool {
        actor.can_act() && matches!(actor.role, Role::Admin | Role::Coach)
    }

    fn can_manage_team(&self, actor: &User, team: &Team) -> bool {
        actor.can_act() && (actor.role == Role::Admin || team.is_created_by(actor.id))
    }

    fn can_access_team(&self, actor: &User, team: &Team) -> bool {
        actor.can_act()
            && (actor.role == Role::Admin
                || team.is_created_by(actor.id)
                || actor.team_id == Some(team.id))
    }

    fn can_edit_team_content(&self, actor: &User, author_id: Uuid, team: &Team) -> bool {
        actor.can_act()
            && (actor.id == author_id
                || actor.role == Role::Admin
                || team.is_created_by(actor.id))
    }

    fn can_manage_checklists(&self, actor: &User) -> bool {
        actor.can_act() && matches!(actor.role, Role::Admin | Role::Coach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::join_request::JoinRequestStatus;
    use chrono::Utc;

    fn user(role: Role, team_id: Option<Uuid>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: format!("{} user", role),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "hash".to_string(),
            role,
            team_id,
            is_approved: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn pending(role: Role, team_id: Option<Uuid>) -> User {
        User {
            is_approved: false,
            ..user(role, team_id)
        }
    }

    fn team(created_by: Option<Uuid>) -> Team {
        let now = Utc::now();
        Team {
            id: Uuid::new_v4(),
            name: "Alpha".to_string(),
            code: "01-0001".to_string(),
            division: "Open".to_string(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(team: &Team, requester: &User) -> JoinRequest {
        let now = Utc::now();
        JoinRequest {
            id: Uuid::new_v4(),
            team_id: team.id,
            requester_id: requester.id,
            team_creator_id: team.created_by.unwrap_or_else(Uuid::new_v4),
            status: JoinRequestStatus::Pending,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_admin_approves_anyone_but_self() {
        let policy = RolePolicy::default();
        let admin = user(Role::Admin, None);

        for role in Role::ALL {
            assert!(policy.can_approve(&admin, &pending(role, None), None));
        }
        assert!(!policy.can_approve(&admin, &admin, None));
    }

    #[test]
    fn test_coach_approves_only_own_teams() {
        let policy = RolePolicy::default();
        let coach = user(Role::Coach, None);
        let own = team(Some(coach.id));
        let other = team(Some(Uuid::new_v4()));

        let on_own = pending(Role::Member, Some(own.id));
        let on_other = pending(Role::Member, Some(other.id));
        let teamless = pending(Role::Member, None);

        assert!(policy.can_approve(&coach, &on_own, Some(&own)));
        assert!(!policy.can_approve(&coach, &on_other, Some(&other)));
        assert!(!policy.can_approve(&coach, &teamless, None));
    }

    #[test]
    fn test_captain_requires_flag() {
        let t = team(Some(Uuid::new_v4()));
        let captain = user(Role::Captain, Some(t.id));
        let member = pending(Role::Member, Some(t.id));
        let mentor = pending(Role::Mentor, Some(t.id));
        let elsewhere = pending(Role::Member, Some(Uuid::new_v4()));

        let strict = RolePolicy::default();
        assert!(!strict.can_approve(&captain, &member, Some(&t)));

        let lenient = RolePolicy::new().with_captain_approval(true);
        assert!(lenient.can_approve(&captain, &member, Some(&t)));
        assert!(!lenient.can_approve(&captain, &mentor, Some(&t)));
        assert!(!lenient.can_approve(&captain, &elsewhere, None));
    }

    #[test]
    fn test_captain_without_team_cannot_approve_teamless_member() {
        let lenient = RolePolicy::new().with_captain_approval(true);
        let captain = user(Role::Captain, None);
        let member = pending(Role::Member, None);
        assert!(!lenient.can_approve(&captain, &member, None));
    }

    #[test]
    fn test_mentor_and_member_never_approve() {
        let policy = RolePolicy::new().with_captain_approval(true);
        let t = team(None);
        let target = pending(Role::Member, Some(t.id));

        for role in [Role::Mentor, Role::Member] {
            let actor = user(role, Some(t.id));
            assert!(!policy.can_approve(&actor, &target, Some(&t)));
        }
    }

    #[test]
    fn test_inactive_or_unapproved_actor_denied() {
        let policy = RolePolicy::default();
        let target = pending(Role::Member, None);

        let inactive_admin = User {
            is_active: false,
            ..user(Role::Admin, None)
        };
        assert!(!policy.can_approve(&inactive_admin, &target, None));

        let coach = pending(Role::Coach, None);
        let own = team(Some(coach.id));
        let on_own = pending(Role::Member, Some(own.id));
        assert!(!policy.can_approve(&coach, &on_own, Some(&own)));
        assert!(!policy.can_create_team(&coach));
    }

    #[test]
    fn test_unapproved_admin_may_still_act() {
        let policy = RolePolicy::default();
        let admin = pending(Role::Admin, None);
        assert!(policy.can_approve(&admin, &pending(Role::Member, None), None));
    }

    #[test]
    fn test_change_role() {
        let policy = RolePolicy::default();
        let admin = user(Role::Admin, None);
        let coach = user(Role::Coach, None);
        let own = team(Some(coach.id));
        let member = user(Role::Member, Some(own.id));
        let other_coach = user(Role::Coach, Some(own.id));

        assert!(policy.can_change_role(&admin, &member, Role::Coach, Some(&own)));
        assert!(policy.can_change_role(&admin, &coach, Role::Admin, None));
        assert!(!policy.can_change_role(&admin, &admin, Role::Member, None));

        assert!(policy.can_change_role(&coach, &member, Role::Captain, Some(&own)));
        assert!(policy.can_change_role(&coach, &member, Role::Mentor, Some(&own)));
        assert!(!policy.can_change_role(&coach, &member, Role::Admin, Some(&own)));
        assert!(!policy.can_change_role(&coach, &member, Role::Coach, Some(&own)));
        assert!(!policy.can_change_role(&coach, &other_coach, Role::Member, Some(&own)));

        let stranger = user(Role::Member, Some(Uuid::new_v4()));
        assert!(!policy.can_change_role(&coach, &stranger, Role::Captain, None));

        let captain = user(Role::Captain, Some(own.id));
        assert!(!policy.can_change_role(&captain, &member, Role::Mentor, Some(&own)));
    }

    #[test]
    fn test_resolve_join_request() {
        let policy = RolePolicy::default();
        let coach = user(Role::Coach, None);
        let t = team(Some(coach.id));
        let requester = user(Role::Member, None);
        let req = request(&t, &requester);

        assert!(policy.can_resolve_join_request(&coach, &req, &requester));
        assert!(policy.can_resolve_join_request(&user(Role::Admin, None), &req, &requester));
        assert!(!policy.can_resolve_join_request(&user(Role::Coach, None), &req, &requester));

        let captain = user(Role::Captain, Some(t.id));
        assert!(!policy.can_resolve_join_request(&captain, &req, &requester));
        let lenient = RolePolicy::new().with_captain_approval(true);
        assert!(lenient.can_resolve_join_request(&captain, &req, &requester));

        let mentor_requester = user(Role::Mentor, None);
        let mentor_req = request(&t, &mentor_requester);
        assert!(!lenient.can_resolve_join_request(&captain, &mentor_req, &mentor_requester));
    }

    #[test]
    fn test_remove_user() {
        let policy = RolePolicy::default();
        let admin = user(Role::Admin, None);
        let coach = user(Role::Coach, None);
        let own = team(Some(coach.id));
        let member = user(Role::Member, Some(own.id));

        assert!(policy.can_remove_user(&admin, &member, Some(&own)));
        assert!(policy.can_remove_user(&coach, &member, Some(&own)));
        assert!(!policy.can_remove_user(&coach, &admin, None));
        assert!(!policy.can_remove_user(&member, &coach, None));
        assert!(!policy.can_remove_user(&admin, &admin, None));
    }

    #[test]
    fn test_team_permissions() {
        let policy = RolePolicy::default();
        let admin = user(Role::Admin, None);
        let coach = user(Role::Coach, None);
        let own = team(Some(coach.id));
        let member = user(Role::Member, Some(own.id));
        let outsider = user(Role::Member, Some(Uuid::new_v4()));
        let pending_member = pending(Role::Member, Some(own.id));

        assert!(policy.can_create_team(&admin));
        assert!(policy.can_create_team(&coach));
        assert!(!policy.can_create_team(&member));

        assert!(policy.can_manage_team(&admin, &own));
        assert!(policy.can_manage_team(&coach, &own));
        assert!(!policy.can_manage_team(&member, &own));

        assert!(policy.can_access_team(&member, &own));
        assert!(policy.can_access_team(&coach, &own));
        assert!(!policy.can_access_team(&outsider, &own));
        assert!(!policy.can_access_team(&pending_member, &own));

        assert!(policy.can_edit_team_content(&member, member.id, &own));
        assert!(policy.can_edit_team_content(&coach, member.id, &own));
        let teammate = user(Role::Member, Some(own.id));
        assert!(!policy.can_edit_team_content(&teammate, member.id, &own));
    }

    #[test]
    fn test_checklists_and_activation() {
        let policy = RolePolicy::default();
        let admin = user(Role::Admin, None);
        let coach = user(Role::Coach, None);
        let captain = user(Role::Captain, None);

        assert!(policy.can_manage_checklists(&admin));
        assert!(policy.can_manage_checklists(&coach));
        assert!(!policy.can_manage_checklists(&captain));

        assert!(policy.can_set_active(&admin, &coach));
        assert!(!policy.can_set_active(&admin, &admin));
        assert!(!policy.can_set_active(&coach, &captain));
    }
}
