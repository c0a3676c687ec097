//! SQLite persistence for downloaded definition tables and OAuth tokens.
//!
//! `Storage` is the synchronous connection wrapper; `Store` shares it across
//! tasks and runs every call on the blocking pool.

use crate::oauth::TokenSet;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 250)?;
        let mut storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut storage = Self {
            conn: Connection::open_in_memory()?,
        };
        storage.init_db()?;
        Ok(storage)
    }

    fn init_db(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS definitions(
                version    TEXT NOT NULL,
                lang       TEXT NOT NULL,
                tbl        TEXT NOT NULL,
                json       TEXT NOT NULL,
                fetched_ms INTEGER NOT NULL,
                PRIMARY KEY(version, lang, tbl)
            );
            CREATE TABLE IF NOT EXISTS oauth_tokens(
                client_id     TEXT NOT NULL,
                membership_id TEXT NOT NULL,
                token_json    TEXT NOT NULL,
                acquired_ms   INTEGER NOT NULL,
                PRIMARY KEY(client_id, membership_id)
            );
            "#,
        )?;
        Ok(())
    }

    // ----- definitions -----

    pub fn get_table(&self, version: &str, lang: &str, table: &str) -> Result<Option<String>> {
        let json = self
            .conn
            .query_row(
                "SELECT json FROM definitions WHERE version = ?1 AND lang = ?2 AND tbl = ?3",
                params![version, lang, table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json)
    }

    pub fn put_table(&self, version: &str, lang: &str, table: &str, json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO definitions(version, lang, tbl, json, fetched_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                version,
                lang,
                table,
                json,
                chrono::Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Drop every cached table that belongs to another manifest version
    pub fn prune_definitions(&self, keep_version: &str) -> Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM definitions WHERE version <> ?1",
            params![keep_version],
        )?;
        Ok(n)
    }

    // ----- tokens -----

    pub fn put_token(&self, client_id: &str, token: &TokenSet) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO oauth_tokens(client_id, membership_id, token_json, acquired_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                client_id,
                token.membership_id,
                serde_json::to_string(token)?,
                token.acquired_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Most recently acquired token for this client, whoever it belongs to
    pub fn latest_token(&self, client_id: &str) -> Result<Option<TokenSet>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT token_json FROM oauth_tokens WHERE client_id = ?1
                 ORDER BY acquired_ms DESC LIMIT 1",
                params![client_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).context("Corrupt stored token"))
            .transpose()
    }

    pub fn token_for(&self, client_id: &str, membership_id: &str) -> Result<Option<TokenSet>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT token_json FROM oauth_tokens WHERE client_id = ?1 AND membership_id = ?2",
                params![client_id, membership_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).context("Corrupt stored token"))
            .transpose()
    }

    pub fn delete_token(&self, client_id: &str, membership_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM oauth_tokens WHERE client_id = ?1 AND membership_id = ?2",
            params![client_id, membership_id],
        )?;
        Ok(())
    }
}

/// Cloneable handle used from async code
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Storage>>,
}

impl Store {
    pub fn new(storage: Storage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Storage::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Storage::open_in_memory()?))
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = inner.lock().map_err(|_| anyhow!("storage lock poisoned"))?;
            f(&guard)
        })
        .await
        .context("storage task failed")?
    }
}
