//! Key-value store abstraction shared by the rate limiter, bullet queue and
//! pool state.
//!
//! Every coordination guarantee in the faucet rests on the atomicity of the
//! operations below; implementations must not emulate them with
//! read-then-write sequences.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{FaucetError, FaucetResult};

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a scalar value.
    async fn get(&self, key: &str) -> FaucetResult<Option<String>>;

    /// Unconditionally store a scalar value without expiry.
    async fn set(&self, key: &str, value: &str) -> FaucetResult<()>;

    /// Remove a key of any type. Returns whether it existed.
    async fn delete(&self, key: &str) -> FaucetResult<bool>;

    /// Atomically increment a counter, creating it with `ttl` when absent.
    /// An existing counter keeps its original expiry.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> FaucetResult<i64>;

    /// Store `value` only if `key` does not exist. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> FaucetResult<bool>;

    /// Delete `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> FaucetResult<bool>;

    /// Remaining time to live, `None` when the key is missing or persistent.
    async fn ttl(&self, key: &str) -> FaucetResult<Option<Duration>>;

    /// Append values to the tail of a list in one atomic step. Returns the new length.
    async fn push_back(&self, key: &str, values: &[String]) -> FaucetResult<usize>;

    /// Atomically remove and return the head of a list.
    async fn pop_front(&self, key: &str) -> FaucetResult<Option<String>>;

    /// Current list length.
    async fn list_len(&self, key: &str) -> FaucetResult<usize>;

    async fn ping(&self) -> FaucetResult<()>;
}

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// In-process store used by tests and single-node development runs.
///
/// All operations take one lock, which gives the same atomicity the redis
/// commands provide. Expiry follows `tokio::time`, so paused-clock tests can
/// advance past a TTL.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live<'a>(data: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if data.get(key).map_or(false, |entry| entry.is_expired(now)) {
            data.remove(key);
        }
        data.get_mut(key)
    }
}

fn wrong_type(key: &str) -> FaucetError {
    FaucetError::Store(format!("WRONGTYPE operation against key {}", key))
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> FaucetResult<Option<String>> {
        let mut data = self.data.lock().await;
        match Self::live(&mut data, key) {
            Some(Entry { value: Value::Scalar(v), .. }) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> FaucetResult<()> {
        let mut data = self.data.lock().await;
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> FaucetResult<bool> {
        let mut data = self.data.lock().await;
        let existed = Self::live(&mut data, key).is_some();
        data.remove(key);
        Ok(existed)
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> FaucetResult<i64> {
        let mut data = self.data.lock().await;
        match Self::live(&mut data, key) {
            Some(entry) => match &mut entry.value {
                Value::Scalar(v) => {
                    let count = v
                        .parse::<i64>()
                        .map_err(|_| FaucetError::Store(format!("value at {} is not an integer", key)))?
                        + 1;
                    *v = count.to_string();
                    Ok(count)
                }
                Value::List(_) => Err(wrong_type(key)),
            },
            None => {
                data.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Scalar("1".to_string()),
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> FaucetResult<bool> {
        let mut data = self.data.lock().await;
        if Self::live(&mut data, key).is_some() {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> FaucetResult<bool> {
        let mut data = self.data.lock().await;
        let matches = matches!(
            Self::live(&mut data, key),
            Some(Entry { value: Value::Scalar(v), .. }) if v.as_str() == expected
        );
        if matches {
            data.remove(key);
        }
        Ok(matches)
    }

    async fn ttl(&self, key: &str) -> FaucetResult<Option<Duration>> {
        let mut data = self.data.lock().await;
        let now = Instant::now();
        Ok(Self::live(&mut data, key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn push_back(&self, key: &str, values: &[String]) -> FaucetResult<usize> {
        let mut data = self.data.lock().await;
        if Self::live(&mut data, key).is_none() {
            data.insert(
                key.to_string(),
                Entry {
                    value: Value::List(VecDeque::new()),
                    expires_at: None,
                },
            );
        }
        match data.get_mut(key).map(|entry| &mut entry.value) {
            Some(Value::List(list)) => {
                list.extend(values.iter().cloned());
                Ok(list.len())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn pop_front(&self, key: &str) -> FaucetResult<Option<String>> {
        let mut data = self.data.lock().await;
        let (popped, now_empty) = match Self::live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => {
                let popped = list.pop_front();
                (popped, list.is_empty())
            }
            Some(_) => return Err(wrong_type(key)),
            None => return Ok(None),
        };
        // redis drops a list once its last element is popped
        if now_empty {
            data.remove(key);
        }
        Ok(popped)
    }

    async fn list_len(&self, key: &str) -> FaucetResult<usize> {
        let mut data = self.data.lock().await;
        match Self::live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => Ok(list.len()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn ping(&self) -> FaucetResult<()> {
        Ok(())
    }
}
