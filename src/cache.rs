use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// String-keyed side cache. A miss is always a valid answer.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn delete(&self, key: &str);
}

pub fn doctor_details_key(doctor_id: Uuid) -> String {
    format!("doctor_details:{doctor_id}")
}

pub fn doctor_availability_key(doctor_id: Uuid) -> String {
    format!("doctor_availability:{doctor_id}")
}

pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Also drops every entry that has already expired.
    async fn set(&self, key: &str, value: String) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_owned(), (value, now + self.ttl));
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// Never stores anything, so every read falls through to the database.
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: String) {}

    async fn delete(&self, _key: &str) {}
}
