/// Team note service
///
/// Access follows READMEs: team access to write and read, author, team
/// creator or admin to change. A note sealed with a passphrase stays sealed;
/// changing its content needs the passphrase again and re-encrypts under a
/// fresh salt.
///
/// # Example
///
/// ```no_run
/// use runbook_core::models::note::NoteKind;
/// use runbook_core::services::notes::{NewNote, Notes};
/// use sqlx::SqlitePool;
/// use uuid::Uuid;
///
/// # async fn example(pool: SqlitePool, actor: Uuid, team: Uuid) -> runbook_core::Result<()> {
/// let notes = Notes::new(pool);
/// let note = notes
///     .create(actor, NewNote {
///         team_id: team,
///         title: "Root password".to_string(),
///         content: "hunter2 -> c0rrect-h0rse".to_string(),
///         kind: NoteKind::PasswordChange,
///         passphrase: Some("team-secret".to_string()),
///     })
///     .await?;
///
/// let plaintext = notes.decrypt(actor, note.id, "team-secret").await?;
/// # Ok(())
/// # }
/// ```

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{deny, load_team, load_user, require_text};
use crate::auth::policy::{ApprovalPolicy, RolePolicy};
use crate::crypto;
use crate::db::with_transaction;
use crate::error::{Error, Result};
use crate::models::audit_log::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceType};
use crate::models::note::{CreateNote, Note, NoteKind, UpdateNote};

/// Input for [`Notes::create`]
#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub team_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub kind: NoteKind,
    /// Seals the content when set; never stored
    pub passphrase: Option<String>,
}

/// Input for [`Notes::update`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Required to replace the content of a sealed note
    pub passphrase: Option<String>,
}

/// Note operations
#[derive(Clone)]
pub struct Notes {
    pool: SqlitePool,
    policy: Arc<dyn ApprovalPolicy>,
}

impl Notes {
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

    /// Creates a note, encrypting the content when a passphrase is given
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for an empty title, content or passphrase
    /// - `Error::NotFound` for an unknown actor or team
    /// - `Error::Forbidden` unless the actor can access the team
    pub async fn create(&self, actor_id: Uuid, note: NewNote) -> Result<Note> {
        require_text("title", &note.title)?;
        require_text("content", &note.content)?;

        let (content, encryption_salt) = match note.passphrase.as_deref() {
            Some(passphrase) => {
                require_text("passphrase", passphrase)?;
                self.check_team_access(actor_id, note.team_id).await?;
                let (ciphertext, salt) = crypto::encrypt(&note.content, passphrase)?;
                (ciphertext, Some(salt))
            }
            None => (note.content, None),
        };

        let policy = Arc::clone(&self.policy);
        let data = CreateNote {
            team_id: note.team_id,
            author_id: actor_id,
            title: note.title,
            content,
            kind: note.kind,
            encryption_salt,
        };
        let created = with_transaction(&self.pool, move |conn| {
            Box::pin(create_tx(conn, policy, data))
        })
        .await?;

        info!(
            actor_id = %actor_id,
            team_id = %created.team_id,
            note_id = %created.id,
            encrypted = created.is_encrypted,
            "Note created"
        );
        Ok(created)
    }

    /// Access check run before key derivation; `create_tx` repeats it
    async fn check_team_access(&self, actor_id: Uuid, team_id: Uuid) -> Result<()> {
        let actor = load_user(&self.pool, actor_id).await?;
        let team = load_team(&self.pool, team_id).await?;
        if !self.policy.can_access_team(&actor, &team) {
            return Err(deny(&actor, "write notes for this team", team.id));
        }
        Ok(())
    }

    /// Returns the plaintext of a sealed note
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` for an unknown note
    /// - `Error::Validation` if the note is not encrypted
    /// - `Error::Decryption` for a wrong passphrase
    pub async fn decrypt(&self, actor_id: Uuid, note_id: Uuid, passphrase: &str) -> Result<String> {
        let note = self.get(note_id).await?;
        let actor = load_user(&self.pool, actor_id).await?;
        let team = load_team(&self.pool, note.team_id).await?;
        if !self.policy.can_access_team(&actor, &team) {
            return Err(deny(&actor, "read notes of this team", note.id));
        }

        open(&note, passphrase).inspect_err(|_| {
            warn!(actor_id = %actor_id, note_id = %note_id, "Note decryption failed");
        })
    }

    /// Changes a note's title or content
    ///
    /// New content of a sealed note is encrypted again under a fresh salt;
    /// the passphrase must open the current content first.
    pub async fn update(&self, actor_id: Uuid, note_id: Uuid, update: NoteUpdate) -> Result<Note> {
        if let Some(title) = &update.title {
            require_text("title", title)?;
        }
        if let Some(content) = &update.content {
            require_text("content", content)?;
        }

        let policy = Arc::clone(&self.policy);
        let note = with_transaction(&self.pool, move |conn| {
            Box::pin(update_tx(conn, policy, actor_id, note_id, update))
        })
        .await?;

        info!(actor_id = %actor_id, note_id = %note_id, "Note updated");
        Ok(note)
    }

    pub async fn delete(&self, actor_id: Uuid, note_id: Uuid) -> Result<()> {
        let policy = Arc::clone(&self.policy);
        with_transaction(&self.pool, move |conn| {
            Box::pin(delete_tx(conn, policy, actor_id, note_id))
        })
        .await?;

        info!(actor_id = %actor_id, note_id = %note_id, "Note deleted");
        Ok(())
    }

    pub async fn get(&self, note_id: Uuid) -> Result<Note> {
        Note::find_by_id(&self.pool, note_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Note {} not found", note_id)))
    }

    /// Notes of a team, newest first; sealed notes keep their ciphertext
    pub async fn for_team(&self, team_id: Uuid) -> Result<Vec<Note>> {
        Ok(Note::list_for_team(&self.pool, team_id).await?)
    }
}

fn open(note: &Note, passphrase: &str) -> Result<String> {
    let salt = match (note.is_encrypted, note.encryption_salt.as_deref()) {
        (true, Some(salt)) => salt,
        _ => return Err(Error::invalid("note", "Note is not encrypted")),
    };
    Ok(crypto::decrypt(&note.content, passphrase, salt)?)
}

async fn load_note(conn: &mut SqliteConnection, note_id: Uuid) -> Result<Note> {
    Note::find_by_id(&mut *conn, note_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Note {} not found", note_id)))
}

async fn create_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    data: CreateNote,
) -> Result<Note> {
    let actor = load_user(&mut *conn, data.author_id).await?;
    let team = load_team(&mut *conn, data.team_id).await?;
    if !policy.can_access_team(&actor, &team) {
        return Err(deny(&actor, "write notes for this team", team.id));
    }

    let note = Note::create(&mut *conn, data).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::CreateNote, ResourceType::Note)
            .resource(note.id)
            .description(format!("{} [{}]", note.title, note.kind)),
    )
    .await?;

    Ok(note)
}

async fn update_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    note_id: Uuid,
    update: NoteUpdate,
) -> Result<Note> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let note = load_note(&mut *conn, note_id).await?;
    let team = load_team(&mut *conn, note.team_id).await?;
    if !policy.can_edit_team_content(&actor, note.author_id, &team) {
        return Err(deny(&actor, "edit this note", note.id));
    }

    let mut data = UpdateNote {
        title: update.title,
        content: None,
        encryption_salt: None,
    };

    if let Some(content) = update.content {
        if note.is_encrypted {
            let passphrase = update.passphrase.as_deref().ok_or_else(|| {
                Error::invalid("passphrase", "Passphrase is required to change an encrypted note")
            })?;
            open(&note, passphrase)?;
            let (ciphertext, salt) = crypto::encrypt(&content, passphrase)?;
            data.content = Some(ciphertext);
            data.encryption_salt = Some(salt);
        } else {
            data.content = Some(content);
        }
    }

    let updated = Note::update(&mut *conn, note.id, data)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Note {} not found", note_id)))?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::UpdateNote, ResourceType::Note)
            .resource(updated.id),
    )
    .await?;

    Ok(updated)
}

async fn delete_tx(
    conn: &mut SqliteConnection,
    policy: Arc<dyn ApprovalPolicy>,
    actor_id: Uuid,
    note_id: Uuid,
) -> Result<()> {
    let actor = load_user(&mut *conn, actor_id).await?;
    let note = load_note(&mut *conn, note_id).await?;
    let team = load_team(&mut *conn, note.team_id).await?;
    if !policy.can_edit_team_content(&actor, note.author_id, &team) {
        return Err(deny(&actor, "delete this note", note.id));
    }

    Note::delete(&mut *conn, note.id).await?;

    AuditLogEntry::append(
        &mut *conn,
        NewAuditEntry::new(actor.id, AuditAction::DeleteNote, ResourceType::Note)
            .resource(note.id)
            .description(note.title),
    )
    .await?;

    Ok(())
}
