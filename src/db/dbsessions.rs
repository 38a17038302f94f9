use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::types::Json;
use sqlx::{Error as SqlxError, Row, Sqlite, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    session_ttl, ChatMessage, Creator, Participant, Session, SessionError, SessionFile,
    SessionSummary, UpdateFields, DEFAULT_CODE, DEFAULT_LANGUAGE,
};
use crate::ws::presence::reconcile_participant;

// Global database instance
static DB: OnceCell<Arc<DbSessions>> = OnceCell::const_new();

/// Initialize the global database connection
pub async fn init_db(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = DbSessions::new(database_url).await?;
    DB.set(Arc::new(db))
        .map_err(|_| "Database already initialized")?;
    Ok(())
}

/// Get the global database instance
pub fn get_db() -> Option<Arc<DbSessions>> {
    DB.get().cloned()
}

const SELECT_SESSION: &str = r#"
    SELECT room_id, creator, participants, code, language, messages, files,
           whiteboard, created_at, last_activity, expires_at
    FROM sessions
    WHERE room_id = ?
"#;

/// Session store: one row per room, JSON columns for the nested
/// collections. Every operation is a single transaction against one row.
pub struct DbSessions {
    pool: SqlitePool,
}

impl DbSessions {
    /// Create a new store over the given database URL and ensure the
    /// schema exists.
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        // One connection: SQLite has a single writer anyway, and sharing
        // it keeps read-modify-write transactions from tripping over each
        // other's lock upgrades.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                room_id       TEXT PRIMARY KEY,
                creator       TEXT NOT NULL,
                participants  TEXT NOT NULL,
                code          TEXT NOT NULL,
                language      TEXT NOT NULL,
                messages      TEXT NOT NULL,
                files         TEXT NOT NULL,
                whiteboard    TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                last_activity TEXT NOT NULL,
                expires_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity)",
        )
        .execute(&pool)
        .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn _pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the durable record for a room.
    ///
    /// Fails with `AlreadyExists` when a live row holds the id. An expired
    /// row with the same id is removed first: hard delete frees the id for
    /// immediate reuse.
    pub async fn create_session(
        &self,
        room_id: &str,
        creator: Creator,
        initial_code: Option<String>,
        language: Option<String>,
    ) -> Result<Session, SessionError> {
        let now = Utc::now();

        // A creator without an id gets one minted so listing by user works
        // for them too.
        let creator = Creator {
            user_id: Some(
                creator
                    .user_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
            name: creator.name,
        };
        let creator_id = creator.user_id.clone().unwrap_or_default();

        let session = Session {
            room_id: room_id.to_string(),
            participants: vec![Participant {
                user_id: creator_id,
                name: creator.name.clone(),
                joined_at: now,
                last_seen: now,
            }],
            creator,
            code: initial_code.unwrap_or_else(|| DEFAULT_CODE.to_string()),
            language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            messages: Vec::new(),
            files: BTreeMap::new(),
            whiteboard_elements: Vec::new(),
            created_at: now,
            last_activity: now,
            expires_at: now + session_ttl(),
        };

        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;

        sqlx::query("DELETE FROM sessions WHERE room_id = ? AND expires_at <= ?")
            .bind(room_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(SessionError::Db)?;

        let res = sqlx::query(
            r#"
            INSERT INTO sessions (room_id, creator, participants, code, language,
                                  messages, files, whiteboard, created_at,
                                  last_activity, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(room_id) DO NOTHING
            "#,
        )
        .bind(&session.room_id)
        .bind(Json(&session.creator))
        .bind(Json(&session.participants))
        .bind(&session.code)
        .bind(&session.language)
        .bind(Json(&session.messages))
        .bind(Json(&session.files))
        .bind(Json(&session.whiteboard_elements))
        .bind(session.created_at)
        .bind(session.last_activity)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(SessionError::Db)?;

        if res.rows_affected() == 0 {
            return Err(SessionError::AlreadyExists(room_id.to_string()));
        }

        tx.commit().await.map_err(SessionError::Db)?;
        info!("Session '{}' created, expires at {}", room_id, session.expires_at);
        Ok(session)
    }

    /// Fetch a session. An expired row is deleted as a side effect and
    /// reported as `Expired`; a second call then reports `NotFound`.
    pub async fn get_session(&self, room_id: &str) -> Result<Session, SessionError> {
        let row = sqlx::query(SELECT_SESSION)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SessionError::Db)?;

        let Some(row) = row else {
            return Err(SessionError::NotFound(room_id.to_string()));
        };
        let session = decode_session(&row).map_err(SessionError::Db)?;

        if session.is_expired(Utc::now()) {
            sqlx::query("DELETE FROM sessions WHERE room_id = ?")
                .bind(room_id)
                .execute(&self.pool)
                .await
                .map_err(SessionError::Db)?;
            info!("Session '{}' reaped on read (expired)", room_id);
            return Err(SessionError::Expired(room_id.to_string()));
        }

        Ok(session)
    }

    /// Merge the given fields into the session and touch `last_activity`.
    pub async fn update_fields(
        &self,
        room_id: &str,
        fields: UpdateFields,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        if let Some(code) = fields.code {
            session.code = code;
        }
        if let Some(language) = fields.language {
            session.language = language;
        }
        if let Some(participants) = fields.participants {
            session.participants = participants;
        }

        sqlx::query(
            r#"
            UPDATE sessions
            SET code = ?, language = ?, participants = ?, last_activity = ?
            WHERE room_id = ?
            "#,
        )
        .bind(&session.code)
        .bind(&session.language)
        .bind(Json(&session.participants))
        .bind(Utc::now())
        .bind(room_id)
        .execute(&mut *tx)
        .await
        .map_err(SessionError::Db)?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    /// Replace-or-insert a file, keyed by `file_id`. Never duplicates.
    pub async fn upsert_file(
        &self,
        room_id: &str,
        file_id: &str,
        file: SessionFile,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        session.files.insert(file_id.to_string(), file);
        self.write_files(&mut tx, room_id, &session.files).await?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    /// Content-only update for an existing file, used by the realtime
    /// `fileChange` persistence path.
    pub async fn update_file_content(
        &self,
        room_id: &str,
        file_id: &str,
        content: &str,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        let Some(file) = session.files.get_mut(file_id) else {
            return Err(SessionError::FileNotFound(
                room_id.to_string(),
                file_id.to_string(),
            ));
        };
        file.content = content.as_bytes().to_vec();
        file.size = file.content.len() as i64;
        self.write_files(&mut tx, room_id, &session.files).await?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    pub async fn delete_file(&self, room_id: &str, file_id: &str) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        if session.files.remove(file_id).is_none() {
            return Err(SessionError::FileNotFound(
                room_id.to_string(),
                file_id.to_string(),
            ));
        }
        self.write_files(&mut tx, room_id, &session.files).await?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    /// Append to the chat log. The log is append-only; entries are never
    /// mutated or removed.
    pub async fn append_message(
        &self,
        room_id: &str,
        message: ChatMessage,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        session.messages.push(message);

        sqlx::query("UPDATE sessions SET messages = ?, last_activity = ? WHERE room_id = ?")
            .bind(Json(&session.messages))
            .bind(Utc::now())
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(SessionError::Db)?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    /// Wholesale replacement of the whiteboard element sequence.
    pub async fn update_whiteboard(
        &self,
        room_id: &str,
        elements: Vec<serde_json::Value>,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        self.load_live(&mut tx, room_id).await?;

        sqlx::query("UPDATE sessions SET whiteboard = ?, last_activity = ? WHERE room_id = ?")
            .bind(Json(&elements))
            .bind(Utc::now())
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(SessionError::Db)?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    /// Reconcile one identity into the participant list: refresh
    /// `last_seen`/`name` when already present, append otherwise. One
    /// read-modify-write so concurrent joins cannot lose each other.
    pub async fn record_participant(
        &self,
        room_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<(), SessionError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        reconcile_participant(&mut session.participants, user_id, name, now);

        sqlx::query("UPDATE sessions SET participants = ?, last_activity = ? WHERE room_id = ?")
            .bind(Json(&session.participants))
            .bind(now)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(SessionError::Db)?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    /// Prune one identity from the durable participant list (explicit
    /// leave). Disconnects never call this. Idempotent.
    pub async fn remove_participant(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(SessionError::Db)?;
        let mut session = self.load_live(&mut tx, room_id).await?;

        let before = session.participants.len();
        session.participants.retain(|p| p.user_id != user_id);
        if session.participants.len() == before {
            return Ok(());
        }

        sqlx::query("UPDATE sessions SET participants = ?, last_activity = ? WHERE room_id = ?")
            .bind(Json(&session.participants))
            .bind(Utc::now())
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(SessionError::Db)?;

        tx.commit().await.map_err(SessionError::Db)?;
        Ok(())
    }

    pub async fn delete_session(&self, room_id: &str) -> Result<(), SessionError> {
        let res = sqlx::query("DELETE FROM sessions WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(SessionError::Db)?;

        if res.rows_affected() == 0 {
            return Err(SessionError::NotFound(room_id.to_string()));
        }
        info!("Session '{}' deleted", room_id);
        Ok(())
    }

    /// Sessions the user created or joined, most recently active first.
    /// Expired rows are excluded (the sweep removes them).
    pub async fn list_user_sessions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT room_id,
                   json_extract(creator, '$.name') AS creator_name,
                   language,
                   json_array_length(participants) AS participant_count,
                   created_at, last_activity, expires_at
            FROM sessions
            WHERE expires_at > ?
              AND (json_extract(creator, '$.userId') = ?
                   OR EXISTS (SELECT 1 FROM json_each(sessions.participants)
                              WHERE json_extract(json_each.value, '$.userId') = ?))
            ORDER BY last_activity DESC
            LIMIT ?
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(SessionError::Db)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            summaries.push(SessionSummary {
                room_id: row.try_get("room_id").map_err(SessionError::Db)?,
                creator_name: row.try_get("creator_name").map_err(SessionError::Db)?,
                language: row.try_get("language").map_err(SessionError::Db)?,
                participant_count: row.try_get("participant_count").map_err(SessionError::Db)?,
                created_at: row.try_get("created_at").map_err(SessionError::Db)?,
                last_activity: row.try_get("last_activity").map_err(SessionError::Db)?,
                expires_at: row.try_get("expires_at").map_err(SessionError::Db)?,
            });
        }
        Ok(summaries)
    }

    /// Remove every session whose retention window has passed. Runs from
    /// the periodic sweep, independent of request traffic.
    pub async fn delete_expired(&self) -> Result<u64, SessionError> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(SessionError::Db)?;
        Ok(res.rows_affected())
    }

    /// Count of live sessions, for diagnostics.
    pub async fn count_sessions(&self) -> Result<i64, SessionError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions WHERE expires_at > ?")
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(SessionError::Db)?;
        row.try_get("n").map_err(SessionError::Db)
    }

    /// Fetch the row inside the caller's transaction, rejecting missing
    /// and expired sessions. Expired rows are left for the sweep; the
    /// caller's rollback must not be able to resurrect a reaped row.
    async fn load_live(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        room_id: &str,
    ) -> Result<Session, SessionError> {
        let row = sqlx::query(SELECT_SESSION)
            .bind(room_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(SessionError::Db)?;

        let Some(row) = row else {
            return Err(SessionError::NotFound(room_id.to_string()));
        };
        let session = decode_session(&row).map_err(SessionError::Db)?;
        if session.is_expired(Utc::now()) {
            return Err(SessionError::Expired(room_id.to_string()));
        }
        Ok(session)
    }

    async fn write_files(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        room_id: &str,
        files: &BTreeMap<String, SessionFile>,
    ) -> Result<(), SessionError> {
        sqlx::query("UPDATE sessions SET files = ?, last_activity = ? WHERE room_id = ?")
            .bind(Json(files))
            .bind(Utc::now())
            .bind(room_id)
            .execute(&mut **tx)
            .await
            .map_err(SessionError::Db)?;
        Ok(())
    }
}

fn decode_session(row: &SqliteRow) -> Result<Session, SqlxError> {
    Ok(Session {
        room_id: row.try_get("room_id")?,
        creator: row.try_get::<Json<Creator>, _>("creator")?.0,
        participants: row.try_get::<Json<Vec<Participant>>, _>("participants")?.0,
        code: row.try_get("code")?,
        language: row.try_get("language")?,
        messages: row.try_get::<Json<Vec<ChatMessage>>, _>("messages")?.0,
        files: row
            .try_get::<Json<BTreeMap<String, SessionFile>>, _>("files")?
            .0,
        whiteboard_elements: row
            .try_get::<Json<Vec<serde_json::Value>>, _>("whiteboard")?
            .0,
        created_at: row.try_get("created_at")?,
        last_activity: row.try_get("last_activity")?,
        expires_at: row.try_get("expires_at")?,
    })
}
