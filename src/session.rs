//! Persisted key/value state identifying the logged-in client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::ClientSession;

pub const KEY_CLIENT_ID: &str = "client_id";
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_NAME: &str = "nombres";
pub const KEY_EMAIL: &str = "email";
pub const KEY_PHONE: &str = "telefono";
pub const KEY_DOCUMENT_ID: &str = "dni";
pub const KEY_LOGGED_IN: &str = "is_logged_in";

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Writes every entry or none of them.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct SqliteKvStore {
    db: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM session_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(value)
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"INSERT INTO session_entries (key, value) VALUES (?, ?)
                   ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
            )
            .bind(*key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_entries")
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set_many(&self, new_entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (key, value) in new_entries {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }
}

/// Typed view of the session keys. The single source of truth for who is
/// logged in.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::default()))
    }

    pub fn sqlite(db: SqlitePool) -> Self {
        Self::new(Arc::new(SqliteKvStore::new(db)))
    }

    pub async fn load(&self) -> Result<ClientSession, StoreError> {
        let client_id = self.int(KEY_CLIENT_ID).await?.unwrap_or(-1);
        let flag = match self.kv.get(KEY_LOGGED_IN).await? {
            Some(raw) => raw.parse::<bool>().map_err(|_| StoreError::InvalidValue {
                key: KEY_LOGGED_IN.to_string(),
                value: raw,
            })?,
            None => false,
        };

        Ok(ClientSession {
            client_id,
            user_id: self.int(KEY_USER_ID).await?.unwrap_or(-1),
            name: self.text(KEY_NAME).await?,
            email: self.text(KEY_EMAIL).await?,
            phone: self.text(KEY_PHONE).await?,
            document_id: self.text(KEY_DOCUMENT_ID).await?,
            logged_in: flag && client_id > 0,
        })
    }

    pub async fn save(&self, session: &ClientSession) -> Result<(), StoreError> {
        if session.client_id <= 0 {
            return Err(StoreError::Rejected(format!(
                "cannot persist a session for client {}",
                session.client_id
            )));
        }

        self.kv
            .set_many(&[
                (KEY_CLIENT_ID, session.client_id.to_string()),
                (KEY_USER_ID, session.user_id.to_string()),
                (KEY_NAME, session.name.clone()),
                (KEY_EMAIL, session.email.clone()),
                (KEY_PHONE, session.phone.clone()),
                (KEY_DOCUMENT_ID, session.document_id.clone()),
                (KEY_LOGGED_IN, "true".to_string()),
            ])
            .await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.kv.clear().await
    }

    async fn int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.kv.get(key).await? {
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    async fn text(&self, key: &str) -> Result<String, StoreError> {
        Ok(self.kv.get(key).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> ClientSession {
        ClientSession {
            client_id: 7,
            user_id: 70,
            name: "Ana Torres".to_string(),
            email: "ana@example.com".to_string(),
            phone: "987654321".to_string(),
            document_id: "44556677".to_string(),
            logged_in: true,
        }
    }

    #[tokio::test]
    async fn empty_store_is_logged_out() {
        let store = SessionStore::in_memory();
        let session = store.load().await.unwrap();
        assert_eq!(session, ClientSession::default());
        assert_eq!(session.active_client_id(), None);
    }

    #[tokio::test]
    async fn save_then_clear() {
        let store = SessionStore::in_memory();
        store.save(&ana()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ana());

        store.clear().await.unwrap();
        assert!(!store.load().await.unwrap().logged_in);
    }

    #[tokio::test]
    async fn rejects_sessions_without_a_client() {
        let store = SessionStore::in_memory();
        let anonymous = ClientSession {
            client_id: 0,
            ..ana()
        };
        assert!(matches!(store.save(&anonymous).await, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn login_flag_requires_a_positive_client_id() {
        let kv = Arc::new(MemoryKvStore::default());
        kv.set_many(&[(KEY_LOGGED_IN, "true".to_string())]).await.unwrap();
        let store = SessionStore::new(kv);
        assert!(!store.load().await.unwrap().logged_in);
    }

    #[tokio::test]
    async fn corrupt_ids_are_reported() {
        let kv = Arc::new(MemoryKvStore::default());
        kv.set_many(&[(KEY_CLIENT_ID, "seven".to_string())]).await.unwrap();
        let store = SessionStore::new(kv);
        assert!(matches!(
            store.load().await,
            Err(StoreError::InvalidValue { .. })
        ));
    }
}
