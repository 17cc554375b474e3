use crate::error::{FaucetError, FaucetResult};
use crate::store::KvStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::time::Duration;

/// Creates the counter with its expiry in the same step as the first increment,
/// so concurrent first claims can neither lose an update nor skip the TTL.
const INCR_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

const DELETE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// `KvStore` backed by a shared, auto-reconnecting redis connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    incr_script: Script,
    release_script: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> FaucetResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| FaucetError::Store(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| FaucetError::Store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            manager,
            incr_script: Script::new(INCR_WITH_EXPIRY),
            release_script: Script::new(DELETE_IF_EQUALS),
        })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> FaucetResult<Option<String>> {
        let mut conn = self.connection();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("GET failed: {}", e)))
    }

    async fn set(&self, key: &str, value: &str) -> FaucetResult<()> {
        let mut conn = self.connection();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("SET failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> FaucetResult<bool> {
        let mut conn = self.connection();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|deleted| deleted > 0)
            .map_err(|e| FaucetError::Store(format!("DEL failed: {}", e)))
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> FaucetResult<i64> {
        let mut conn = self.connection();
        self.incr_script
            .key(key)
            .arg(ttl.as_secs().max(1))
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("Counter script failed: {}", e)))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> FaucetResult<bool> {
        let mut conn = self.connection();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("SET NX failed: {}", e)))?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> FaucetResult<bool> {
        let mut conn = self.connection();
        self.release_script
            .key(key)
            .arg(expected)
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map(|deleted| deleted > 0)
            .map_err(|e| FaucetError::Store(format!("Release script failed: {}", e)))
    }

    async fn ttl(&self, key: &str) -> FaucetResult<Option<Duration>> {
        let mut conn = self.connection();
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("PTTL failed: {}", e)))?;

        // -2: missing key, -1: no expiry
        Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
    }

    async fn push_back(&self, key: &str, values: &[String]) -> FaucetResult<usize> {
        if values.is_empty() {
            return self.list_len(key).await;
        }

        let mut conn = self.connection();
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key);
        for value in values {
            cmd.arg(value);
        }

        cmd.query_async::<_, usize>(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("RPUSH failed: {}", e)))
    }

    async fn pop_front(&self, key: &str) -> FaucetResult<Option<String>> {
        let mut conn = self.connection();
        redis::cmd("LPOP")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("LPOP failed: {}", e)))
    }

    async fn list_len(&self, key: &str) -> FaucetResult<usize> {
        let mut conn = self.connection();
        redis::cmd("LLEN")
            .arg(key)
            .query_async::<_, usize>(&mut conn)
            .await
            .map_err(|e| FaucetError::Store(format!("LLEN failed: {}", e)))
    }

    async fn ping(&self) -> FaucetResult<()> {
        let mut conn = self.connection();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| FaucetError::Store(format!("Ping failed: {}", e)))
    }
}
