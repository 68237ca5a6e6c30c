/// Integration tests for team READMEs and notes

mod common;

use common::{admin, coach, member, signup, team, test_pool};
use runbook_core::models::audit_log::{AuditAction, ResourceType};
use runbook_core::models::note::NoteKind;
use runbook_core::models::readme::UpdateReadMe;
use runbook_core::services::audit::AuditTrail;
use runbook_core::services::notes::{NewNote, NoteUpdate, Notes};
use runbook_core::services::readmes::ReadMes;
use runbook_core::Error;
use uuid::Uuid;

fn new_note(team_id: Uuid, passphrase: Option<&str>) -> NewNote {
    NewNote {
        team_id,
        title: "Admin password".to_string(),
        content: "changed to Tr0ub4dor&3".to_string(),
        kind: NoteKind::PasswordChange,
        passphrase: passphrase.map(str::to_string),
    }
}

#[tokio::test]
async fn test_readme_lifecycle() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let coach = coach(&pool, &admin).await;
    let team = team(&pool, &coach, "01-0001").await;
    let author = member(&pool, &coach, &team).await;
    let readmes = ReadMes::new(pool.clone());

    let readme = readmes
        .create(author.id, team.id, "Round 1", "Ubuntu 22", "Forensics first")
        .await
        .expect("Failed to create README");
    assert_eq!(readme.author_id, author.id);

    let updated = readmes
        .update(
            coach.id,
            readme.id,
            UpdateReadMe {
                content: Some("Users, then services".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Round 1");
    assert_eq!(updated.content, "Users, then services");
    assert_eq!(readmes.for_team(team.id).await.unwrap().len(), 1);

    readmes.delete(author.id, readme.id).await.unwrap();
    assert!(matches!(readmes.get(readme.id).await, Err(Error::NotFound(_))));

    let actions: Vec<_> = AuditTrail::new(pool.clone())
        .for_resource(ResourceType::Readme, readme.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::CreateReadme, AuditAction::UpdateReadme, AuditAction::DeleteReadme]
    );
}

#[tokio::test]
async fn test_readme_access_rules() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "02-0002").await;
    let other_team = common::team(&pool, &admin, "03-0003").await;
    let author = member(&pool, &admin, &team).await;
    let teammate = member(&pool, &admin, &team).await;
    let outsider = member(&pool, &admin, &other_team).await;
    let pending = signup(&pool, "member", Some("02-0002")).await;
    let readmes = ReadMes::new(pool.clone());

    assert!(matches!(
        readmes.create(outsider.id, team.id, "Hi", "Windows", "x").await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        readmes.create(pending.id, team.id, "Hi", "Windows", "x").await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        readmes.create(author.id, team.id, "", "Windows", "x").await,
        Err(Error::Validation(_))
    ));

    let readme = readmes
        .create(author.id, team.id, "Round 2", "Windows 10", "Check GPO")
        .await
        .unwrap();
    assert!(matches!(
        readmes.delete(teammate.id, readme.id).await,
        Err(Error::Forbidden(_))
    ));
    readmes.delete(admin.id, readme.id).await.unwrap();
}

#[tokio::test]
async fn test_plain_note() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "04-0004").await;
    let author = member(&pool, &admin, &team).await;
    let notes = Notes::new(pool.clone());

    let note = notes.create(author.id, new_note(team.id, None)).await.unwrap();

    assert!(!note.is_encrypted);
    assert_eq!(note.encryption_salt, None);
    assert_eq!(note.content, "changed to Tr0ub4dor&3");
    assert!(matches!(
        notes.decrypt(author.id, note.id, "anything").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_encrypted_note_round_trip() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "05-0005").await;
    let author = member(&pool, &admin, &team).await;
    let notes = Notes::new(pool.clone());

    let note = notes
        .create(author.id, new_note(team.id, Some("team-secret")))
        .await
        .expect("Failed to create note");

    assert!(note.is_encrypted);
    assert!(note.encryption_salt.is_some());
    assert_ne!(note.content, "changed to Tr0ub4dor&3");

    let plaintext = notes.decrypt(author.id, note.id, "team-secret").await.unwrap();
    assert_eq!(plaintext, "changed to Tr0ub4dor&3");

    assert!(matches!(
        notes.decrypt(author.id, note.id, "wrong").await,
        Err(Error::Decryption(_))
    ));
    assert!(matches!(
        notes.decrypt(author.id, Uuid::new_v4(), "team-secret").await,
        Err(Error::NotFound(_))
    ));

    let entries = AuditTrail::new(pool.clone())
        .for_resource(ResourceType::Note, note.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::CreateNote);
}

#[tokio::test]
async fn test_encrypted_note_update_reencrypts() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "06-0006").await;
    let author = member(&pool, &admin, &team).await;
    let notes = Notes::new(pool.clone());
    let note = notes
        .create(author.id, new_note(team.id, Some("team-secret")))
        .await
        .unwrap();

    let missing = NoteUpdate {
        content: Some("new password".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        notes.update(author.id, note.id, missing).await,
        Err(Error::Validation(_))
    ));

    let wrong = NoteUpdate {
        content: Some("new password".to_string()),
        passphrase: Some("guess".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        notes.update(author.id, note.id, wrong).await,
        Err(Error::Decryption(_))
    ));

    let update = NoteUpdate {
        content: Some("new password".to_string()),
        passphrase: Some("team-secret".to_string()),
        ..Default::default()
    };
    let updated = notes.update(author.id, note.id, update).await.unwrap();

    assert!(updated.is_encrypted);
    assert_ne!(updated.encryption_salt, note.encryption_salt);
    assert_eq!(
        notes.decrypt(author.id, note.id, "team-secret").await.unwrap(),
        "new password"
    );

    let retitled = notes
        .update(
            author.id,
            note.id,
            NoteUpdate {
                title: Some("Root password".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(retitled.title, "Root password");
    assert_eq!(retitled.content, updated.content);
}

#[tokio::test]
async fn test_note_access_and_delete() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "07-0007").await;
    let author = member(&pool, &admin, &team).await;
    let teammate = member(&pool, &admin, &team).await;
    let stranger = signup(&pool, "member", None).await;
    let notes = Notes::new(pool.clone());

    let note = notes
        .create(author.id, new_note(team.id, Some("team-secret")))
        .await
        .unwrap();

    assert_eq!(
        notes.decrypt(teammate.id, note.id, "team-secret").await.unwrap(),
        "changed to Tr0ub4dor&3"
    );
    assert!(matches!(
        notes.decrypt(stranger.id, note.id, "team-secret").await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        notes.create(stranger.id, new_note(team.id, None)).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        notes.delete(teammate.id, note.id).await,
        Err(Error::Forbidden(_))
    ));

    notes.delete(author.id, note.id).await.unwrap();
    assert!(notes.for_team(team.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_encrypted_note_for_foreign_team_is_refused() {
    let pool = test_pool().await;
    let admin = admin(&pool).await;
    let team = team(&pool, &admin, "08-0008").await;
    let stranger = signup(&pool, "member", None).await;
    let notes = Notes::new(pool.clone());

    assert!(matches!(
        notes.create(stranger.id, new_note(team.id, Some("team-secret"))).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        notes.create(admin.id, new_note(Uuid::new_v4(), Some("team-secret"))).await,
        Err(Error::NotFound(_))
    ));

    assert!(notes.for_team(team.id).await.unwrap().is_empty());
    let created = AuditTrail::new(pool.clone())
        .recent(100)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == AuditAction::CreateNote)
        .count();
    assert_eq!(created, 0);
}
