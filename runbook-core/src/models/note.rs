/// Team note model
///
/// Notes hold scoring points, password changes and free-form remarks. A note
/// may be sealed with a passphrase; then `content` holds the base64
/// ciphertext and `encryption_salt` the salt used to derive its key. The
/// passphrase itself is never stored.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notes (
///     id               BLOB PRIMARY KEY NOT NULL,
///     team_id          BLOB NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     author_id        BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title            TEXT NOT NULL,
///     content          TEXT NOT NULL,
///     kind             TEXT NOT NULL DEFAULT 'general',
///     is_encrypted     BOOLEAN NOT NULL DEFAULT 0,
///     encryption_salt  TEXT,
///     created_at       TEXT NOT NULL,
///     updated_at       TEXT NOT NULL,
///     CHECK (is_encrypted = 0 OR encryption_salt IS NOT NULL)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Category of a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    #[default]
    General,

    /// Record of a scored vulnerability
    PointNote,

    /// Record of a changed credential
    PasswordChange,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::General => "general",
            NoteKind::PointNote => "point_note",
            NoteKind::PasswordChange => "password_change",
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "general" => Ok(NoteKind::General),
            "point_note" => Ok(NoteKind::PointNote),
            "password_change" => Ok(NoteKind::PasswordChange),
            other => Err(Error::invalid("kind", format!("Unknown note kind '{}'", other))),
        }
    }
}

/// Note owned by a team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,
    pub team_id: Uuid,
    pub author_id: Uuid,
    pub title: String,

    /// Plaintext, or base64 ciphertext when `is_encrypted`
    pub content: String,

    pub kind: NoteKind,
    pub is_encrypted: bool,

    /// Base64 salt for key derivation; set exactly when `is_encrypted`
    pub encryption_salt: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for storing a note
///
/// Callers encrypt before building this; the model stores what it is given.
#[derive(Debug, Clone)]
pub struct CreateNote {
    pub team_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub kind: NoteKind,
    pub encryption_salt: Option<String>,
}

/// Input for updating a note; only non-None fields change
///
/// `encryption_salt` must be replaced together with `content` for encrypted
/// notes.
#[derive(Debug, Clone, Default)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
    pub encryption_salt: Option<String>,
}

impl Note {
    /// Stores a note; `is_encrypted` follows from the presence of a salt
    pub async fn create<'e, E>(executor: E, data: CreateNote) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (id, team_id, author_id, title, content, kind, is_encrypted, encryption_salt, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, team_id, author_id, title, content, kind, is_encrypted, encryption_salt, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.team_id)
        .bind(data.author_id)
        .bind(data.title.trim())
        .bind(&data.content)
        .bind(data.kind)
        .bind(data.encryption_salt.is_some())
        .bind(&data.encryption_salt)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Note>(
            r#"
            SELECT id, team_id, author_id, title, content, kind, is_encrypted, encryption_salt, created_at, updated_at
            FROM notes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a team's notes, newest first
    pub async fn list_for_team<'e, E>(executor: E, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Note>(
            r#"
            SELECT id, team_id, author_id, title, content, kind, is_encrypted, encryption_salt, created_at, updated_at
            FROM notes
            WHERE team_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateNote,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                encryption_salt = COALESCE(?, encryption_salt),
                updated_at = ?
            WHERE id = ?
            RETURNING id, team_id, author_id, title, content, kind, is_encrypted, encryption_salt, created_at, updated_at
            "#,
        )
        .bind(data.title.as_deref().map(str::trim))
        .bind(data.content)
        .bind(data.encryption_salt)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_kind() {
        assert_eq!("general".parse::<NoteKind>().unwrap(), NoteKind::General);
        assert_eq!("point_note".parse::<NoteKind>().unwrap(), NoteKind::PointNote);
        assert_eq!("Password-Change".parse::<NoteKind>().unwrap(), NoteKind::PasswordChange);
        assert!(matches!("diary".parse::<NoteKind>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_note_kind_serde() {
        assert_eq!(
            serde_json::to_string(&NoteKind::PointNote).unwrap(),
            "\"point_note\""
        );
    }
}
