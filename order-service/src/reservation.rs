use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use shared::{CommerceError, OperationContext, ReservationKey, Result};

const SCAN_BATCH: usize = 100;

/// Short-lived stock holds, keyed by (product, warehouse, user).
///
/// Every write carries the store's TTL; an entry that outlives it is gone
/// without any action from the caller. Writing an existing key replaces both
/// the quantity and the TTL.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn reserve(&self, key: &ReservationKey, quantity: i32) -> Result<()>;
    /// Deleting a missing key is not an error.
    async fn release(&self, key: &ReservationKey) -> Result<()>;
    async fn get(&self, key: &ReservationKey) -> Result<Option<i32>>;
    /// Sum of all live holds on a product in a warehouse, across users.
    async fn reserved_quantity(&self, product_id: &str, warehouse_id: &str) -> Result<i64>;
}

pub fn reservation_key(key: &ReservationKey) -> String {
    format!(
        "reserved:{}:{}:{}",
        key.product_id, key.warehouse_id, key.user_id
    )
}

fn reservation_pattern(product_id: &str, warehouse_id: &str) -> String {
    format!("reserved:{}:{}:*", product_id, warehouse_id)
}

#[derive(Clone)]
pub struct RedisReservationStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisReservationStore {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }

    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url).during("open redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .during("connect to redis")?;
        Ok(Self::new(conn, ttl))
    }

    async fn matching_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        // SCAN may yield a key more than once
        let mut keys = BTreeSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .during("scan reservations")?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys.into_iter().collect())
    }
}

#[async_trait]
impl ReservationStore for RedisReservationStore {
    async fn reserve(&self, key: &ReservationKey, quantity: i32) -> Result<()> {
        let mut conn = self.conn.clone();
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let _: () = redis::cmd("SET")
            .arg(reservation_key(key))
            .arg(quantity)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .during("set reservation")?;
        Ok(())
    }

    async fn release(&self, key: &ReservationKey) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("DEL")
            .arg(reservation_key(key))
            .query_async(&mut conn)
            .await
            .during("delete reservation")?;
        Ok(())
    }

    async fn get(&self, key: &ReservationKey) -> Result<Option<i32>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(reservation_key(key))
            .query_async(&mut conn)
            .await
            .during("get reservation")
    }

    async fn reserved_quantity(&self, product_id: &str, warehouse_id: &str) -> Result<i64> {
        let keys = self
            .matching_keys(&reservation_pattern(product_id, warehouse_id))
            .await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        // keys that expired between SCAN and MGET come back as nil
        let values: Vec<Option<i64>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .during("get reservations")?;
        Ok(values.into_iter().flatten().sum())
    }
}

/// Process-local reservation store with the same expiry semantics as Redis.
#[derive(Debug)]
pub struct InMemoryReservationStore {
    ttl: Duration,
    entries: Mutex<HashMap<ReservationKey, (i32, Instant)>>,
}

impl InMemoryReservationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Locks the entries after dropping everything already expired.
    fn live_entries(&self) -> Result<MutexGuard<'_, HashMap<ReservationKey, (i32, Instant)>>> {
        let mut entries = self.entries.lock().map_err(|_| {
            CommerceError::internal("lock reservations", anyhow::anyhow!("lock poisoned"))
        })?;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(entries)
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn reserve(&self, key: &ReservationKey, quantity: i32) -> Result<()> {
        let mut entries = self.live_entries()?;
        entries.insert(key.clone(), (quantity, Instant::now() + self.ttl));
        Ok(())
    }

    async fn release(&self, key: &ReservationKey) -> Result<()> {
        self.live_entries()?.remove(key);
        Ok(())
    }

    async fn get(&self, key: &ReservationKey) -> Result<Option<i32>> {
        Ok(self.live_entries()?.get(key).map(|(quantity, _)| *quantity))
    }

    async fn reserved_quantity(&self, product_id: &str, warehouse_id: &str) -> Result<i64> {
        Ok(self
            .live_entries()?
            .iter()
            .filter(|(key, _)| key.product_id == product_id && key.warehouse_id == warehouse_id)
            .map(|(_, (quantity, _))| i64::from(*quantity))
            .sum())
    }
}
