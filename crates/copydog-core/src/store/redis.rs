// # Redis Store
//
// Redis implementation of KeyValueStore, enabled with the `redis` feature.
//
// ## Atomicity
//
// Every transaction is sent as one MULTI/EXEC pipeline. Redis does not roll
// back a command that fails inside EXEC, so writes are only queued for keys
// this crate owns and whose types it controls.
//
// ## Prefix scans
//
// `keys_with_prefix` issues `KEYS prefix*`, which walks the whole keyspace.
// Keep copydog on its own logical database when sharing a Redis instance.

use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::traits::{KeyValueStore, Transaction, WriteOp};
use crate::Error;

/// Redis-backed key-value store
///
/// Holds one multiplexed connection that is cloned per call; clones share
/// the underlying socket.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = ::redis::Client::open(url)
            .map_err(|e| Error::config(format!("Invalid redis url: {}", e)))?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::debug!("Connected to redis");
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, Error> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
        Ok(keys)
    }

    async fn commit(&self, tx: Transaction) -> Result<(), Error> {
        if tx.is_empty() {
            return Ok(());
        }

        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for op in tx.ops() {
            match op {
                WriteOp::Set { key, value } => {
                    pipe.set(key, value).ignore();
                }
                WriteOp::HashSet { key, fields } => {
                    pipe.hset_multiple(key, fields.as_slice()).ignore();
                }
                WriteOp::HashDelete { key, fields } => {
                    pipe.hdel(key, fields.as_slice()).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        tracing::trace!("Committed {} writes to redis", tx.len());
        Ok(())
    }
}
