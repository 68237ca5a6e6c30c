/// Integration tests for the team join request workflow

mod common;

use common::{accounts, admin, coach, signup, team, test_pool};
use runbook_core::auth::policy::RolePolicy;
use runbook_core::models::audit_log::{AuditAction, ResourceType};
use runbook_core::models::join_request::JoinRequestStatus;
use runbook_core::services::audit::AuditTrail;
use runbook_core::services::join_requests::{DuplicateRule, JoinRequestRules, JoinRequests};
use runbook_core::Error;

#[tokio::test]
async fn test_fresh_request_is_pending() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let coach = coach(&pool, &admin).await;
    let team = team(&pool, &coach, "01-0001").await;
    let requester = signup(&pool, "member", None).await;

    let request = JoinRequests::new(pool.clone())
        .create_request(requester.id, "01-0001", Some("  Linux hardening  "))
        .await
        .expect("Failed to create join request");

    assert_eq!(request.status, JoinRequestStatus::Pending);
    assert_eq!(request.team_id, team.id);
    assert_eq!(request.team_creator_id, coach.id);
    assert_eq!(request.message.as_deref(), Some("Linux hardening"));
}

#[tokio::test]
async fn test_duplicate_request_conflicts_whatever_its_status() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "02-0002").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    let first = service.create_request(requester.id, team.id, None).await.unwrap();
    assert!(matches!(
        service.create_request(requester.id, team.id, None).await,
        Err(Error::Conflict(_))
    ));

    service.reject_request(admin.id, first.id).await.unwrap();
    assert!(matches!(
        service.create_request(requester.id, "02-0002", None).await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test]
async fn test_pending_only_rule_allows_retry_after_rejection() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "03-0003").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone()).with_rules(JoinRequestRules {
        duplicate_rule: DuplicateRule::PendingOnly,
    });

    let first = service.create_request(requester.id, team.id, None).await.unwrap();
    assert!(matches!(
        service.create_request(requester.id, team.id, None).await,
        Err(Error::Conflict(_))
    ));

    service.reject_request(admin.id, first.id).await.unwrap();
    let retry = service.create_request(requester.id, team.id, None).await.unwrap();
    assert_eq!(retry.status, JoinRequestStatus::Pending);
    assert_ne!(retry.id, first.id);
}

#[tokio::test]
async fn test_request_validation() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "04-0004").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    assert!(matches!(
        service.create_request(admin.id, team.id, None).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.create_request(requester.id, "99-9999", None).await,
        Err(Error::NotFound(_))
    ));

    let long = "x".repeat(501);
    assert!(matches!(
        service.create_request(requester.id, team.id, Some(long.as_str())).await,
        Err(Error::Validation(_))
    ));
    assert!(service.pending_for_team(team.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_approve_links_and_approves_requester() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let coach = coach(&pool, &admin).await;
    let team = team(&pool, &coach, "05-0005").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    let request = service.create_request(requester.id, team.id, None).await.unwrap();
    assert_eq!(service.pending_for_creator(coach.id).await.unwrap().len(), 1);

    let approved = service
        .approve_request(coach.id, request.id)
        .await
        .expect("Failed to approve request");
    assert_eq!(approved.status, JoinRequestStatus::Approved);

    let requester = accounts(&pool).get(requester.id).await.unwrap();
    assert_eq!(requester.team_id, Some(team.id));
    assert!(requester.is_approved);
    assert!(service.pending_for_creator(coach.id).await.unwrap().is_empty());

    let entries = AuditTrail::new(pool.clone())
        .for_resource(ResourceType::JoinRequest, request.id)
        .await
        .unwrap();
    let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::RequestJoin, AuditAction::ApproveJoinRequest]);
}

#[tokio::test]
async fn test_resolved_request_cannot_be_resolved_again() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "06-0006").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    let request = service.create_request(requester.id, team.id, None).await.unwrap();
    service.approve_request(admin.id, request.id).await.unwrap();

    assert!(matches!(
        service.approve_request(admin.id, request.id).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        service.reject_request(admin.id, request.id).await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test]
async fn test_other_coach_cannot_resolve() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let owner = coach(&pool, &admin).await;
    let stranger = common::coach(&pool, &admin).await;
    let team = team(&pool, &owner, "07-0007").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    let request = service.create_request(requester.id, team.id, None).await.unwrap();

    assert!(matches!(
        service.approve_request(stranger.id, request.id).await,
        Err(Error::Forbidden(_))
    ));
    assert_eq!(service.get(request.id).await.unwrap().status, JoinRequestStatus::Pending);
    assert!(matches!(
        service.approve_request(requester.id, request.id).await,
        Err(Error::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_captain_resolves_member_requests_when_enabled() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "08-0008").await;
    let captain = signup(&pool, "captain", Some(&team.code)).await;
    accounts(&pool).approve_user(admin.id, captain.id).await.unwrap();
    let requester = signup(&pool, "member", None).await;

    let strict = JoinRequests::new(pool.clone());
    let request = strict.create_request(requester.id, team.id, None).await.unwrap();
    assert!(matches!(
        strict.approve_request(captain.id, request.id).await,
        Err(Error::Forbidden(_))
    ));

    let permissive = JoinRequests::new(pool.clone())
        .with_policy(RolePolicy::new().with_captain_approval(true));
    let approved = permissive.approve_request(captain.id, request.id).await.unwrap();
    assert_eq!(approved.status, JoinRequestStatus::Approved);
}

#[tokio::test]
async fn test_reject_keeps_the_requester() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "09-0009").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    let request = service.create_request(requester.id, team.id, None).await.unwrap();
    let rejected = service.reject_request(admin.id, request.id).await.unwrap();

    assert_eq!(rejected.status, JoinRequestStatus::Rejected);
    let requester = accounts(&pool).get(requester.id).await.unwrap();
    assert_eq!(requester.team_id, None);
    assert!(!requester.is_approved);
    assert!(service.pending_for_requester(requester.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_and_remove_deletes_pending_requester() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "10-0010").await;
    let requester = signup(&pool, "member", None).await;
    let service = JoinRequests::new(pool.clone());

    let request = service.create_request(requester.id, team.id, None).await.unwrap();
    service
        .reject_request_and_remove_user(admin.id, request.id)
        .await
        .expect("Failed to reject and remove");

    assert!(matches!(accounts(&pool).get(requester.id).await, Err(Error::NotFound(_))));
    assert!(matches!(service.get(request.id).await, Err(Error::NotFound(_))));

    let trail = AuditTrail::new(pool.clone());
    let request_entries = trail.for_resource(ResourceType::JoinRequest, request.id).await.unwrap();
    assert!(request_entries
        .iter()
        .any(|e| e.action == AuditAction::RejectJoinRequest));
    let user_entries = trail.for_resource(ResourceType::User, requester.id).await.unwrap();
    assert!(user_entries.iter().any(|e| e.action == AuditAction::Reject));
}

#[tokio::test]
async fn test_reject_and_remove_refuses_approved_requester() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "11-0011").await;
    let requester = signup(&pool, "member", None).await;
    accounts(&pool).approve_user(admin.id, requester.id).await.unwrap();
    let service = JoinRequests::new(pool.clone());

    let request = service.create_request(requester.id, team.id, None).await.unwrap();

    assert!(matches!(
        service.reject_request_and_remove_user(admin.id, request.id).await,
        Err(Error::Conflict(_))
    ));
    assert_eq!(service.get(request.id).await.unwrap().status, JoinRequestStatus::Pending);
    assert!(accounts(&pool).get(requester.id).await.is_ok());
}
