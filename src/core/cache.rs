use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Namespaced, TTL-bounded primitives over the shared cache.
///
/// Every operation degrades to a conservative default (`false`, `None`, `0`)
/// when the store is unreachable or a command fails; callers cannot tell
/// "no data" from "store unavailable" and must not rely on the difference.
#[derive(Clone)]
pub(crate) struct CacheStore {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum CacheHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

pub(crate) fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

pub(crate) fn queue_key(session_id: &str) -> String {
    format!("exam_queue:{session_id}")
}

pub(crate) fn generation_status_key(session_id: &str) -> String {
    format!("gen_status:{session_id}")
}

pub(crate) fn answer_key(question_id: &str) -> String {
    format!("answer:{question_id}")
}

impl CacheStore {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    pub(crate) async fn health(&self) -> CacheHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return CacheHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => CacheHealth::Healthy,
            Err(err) => CacheHealth::Unhealthy(err.to_string()),
        }
    }

    pub(crate) async fn is_connected(&self) -> bool {
        matches!(self.health().await, CacheHealth::Healthy)
    }

    async fn manager(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn set_with_ttl(&self, key: &str, payload: &str, ttl_seconds: u64) -> bool {
        let Some(mut manager) = self.manager().await else {
            return false;
        };

        match cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(payload)
            .query_async::<_, ()>(&mut manager)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(error = %err, key, "Cache SETEX failed");
                false
            }
        }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<String> {
        let Some(mut manager) = self.manager().await else {
            return None;
        };

        match cmd("GET").arg(key).query_async::<_, Option<String>>(&mut manager).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, key, "Cache GET failed");
                None
            }
        }
    }

    pub(crate) async fn delete(&self, key: &str) -> bool {
        let Some(mut manager) = self.manager().await else {
            return false;
        };

        match cmd("DEL").arg(key).query_async::<_, i64>(&mut manager).await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(error = %err, key, "Cache DEL failed");
                false
            }
        }
    }

    /// Append to the tail of a list and refresh its expiry. List activity
    /// keeps the whole session alive.
    pub(crate) async fn list_push(&self, key: &str, payload: &str, ttl_seconds: u64) -> bool {
        let Some(mut manager) = self.manager().await else {
            return false;
        };

        if let Err(err) = cmd("RPUSH").arg(key).arg(payload).query_async::<_, i64>(&mut manager).await
        {
            tracing::error!(error = %err, key, "Cache RPUSH failed");
            return false;
        }

        if let Err(err) =
            cmd("EXPIRE").arg(key).arg(ttl_seconds).query_async::<_, i64>(&mut manager).await
        {
            tracing::warn!(error = %err, key, "Cache EXPIRE failed after push");
        }

        true
    }

    pub(crate) async fn list_pop(&self, key: &str) -> Option<String> {
        let Some(mut manager) = self.manager().await else {
            return None;
        };

        match cmd("LPOP").arg(key).query_async::<_, Option<String>>(&mut manager).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, key, "Cache LPOP failed");
                None
            }
        }
    }

    pub(crate) async fn list_len(&self, key: &str) -> u64 {
        let Some(mut manager) = self.manager().await else {
            return 0;
        };

        match cmd("LLEN").arg(key).query_async::<_, u64>(&mut manager).await {
            Ok(len) => len,
            Err(err) => {
                tracing::error!(error = %err, key, "Cache LLEN failed");
                0
            }
        }
    }
}
