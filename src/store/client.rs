//! Redis Client
//!
//! Endpoint handles built on the `redis` driver: a multiplexed connection
//! for request/response traffic and a dedicated connection for MONITOR.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{Cmd, ConnectionInfo, FromRedisValue, IntoConnectionInfo};
use tokio::time::timeout;

use super::{Expiry, KvStore, NotificationSource, NotificationStream};
use crate::config::EndpointConfig;
use crate::error::{Error, Result};

/// Driver connection parameters for an endpoint
pub fn connection_info(config: &EndpointConfig) -> Result<ConnectionInfo> {
    let mut info = (config.host.clone(), config.port)
        .into_connection_info()
        .map_err(|e| Error::Config(format!("invalid endpoint {}: {}", config.address(), e)))?;
    info.redis.db = i64::from(config.db);
    info.redis.username = config.username.clone();
    info.redis.password = config.password.clone();
    Ok(info)
}

/// Redis endpoint handle
pub struct RedisStore {
    address: String,
    client: redis::Client,
    conn: MultiplexedConnection,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl RedisStore {
    /// Connect, authenticate and select the configured database
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let address = config.address();
        let client = redis::Client::open(connection_info(config)?)
            .map_err(|e| Error::from_redis(&address, e))?;

        let conn = match timeout(
            config.connect_timeout(),
            client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(Error::from_redis(&address, e)),
            Err(_) => return Err(Error::ConnectionTimeout(address)),
        };

        tracing::debug!("Connected to {} (db {})", address, config.db);
        Ok(Self {
            address,
            client,
            conn,
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Address this handle is connected to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run one command within the request timeout
    async fn query<T: FromRedisValue>(&mut self, cmd: &Cmd) -> Result<T> {
        let result = timeout(self.request_timeout, cmd.query_async(&mut self.conn)).await;

        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::from_redis(&self.address, e)),
            Err(_) => Err(Error::ConnectionTimeout(self.address.clone())),
        }
    }
}

#[async_trait::async_trait]
impl KvStore for RedisStore {
    async fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>> {
        let value: Option<Vec<u8>> = self.query(redis::cmd("GET").arg(key)).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.query(redis::cmd("SET").arg(key).arg(value)).await
    }

    async fn setex(&mut self, key: &[u8], value: &[u8], seconds: u64) -> Result<()> {
        self.query(redis::cmd("SETEX").arg(key).arg(seconds).arg(value))
            .await
    }

    async fn psetex(&mut self, key: &[u8], value: &[u8], millis: u64) -> Result<()> {
        self.query(redis::cmd("PSETEX").arg(key).arg(millis).arg(value))
            .await
    }

    async fn ttl(&mut self, key: &[u8]) -> Result<Expiry> {
        let reply: i64 = self.query(redis::cmd("TTL").arg(key)).await?;
        Expiry::from_reply(reply)
    }

    async fn pttl(&mut self, key: &[u8]) -> Result<Expiry> {
        let reply: i64 = self.query(redis::cmd("PTTL").arg(key)).await?;
        Expiry::from_reply(reply)
    }

    async fn del(&mut self, key: &[u8]) -> Result<bool> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn keys(&mut self) -> Result<Vec<Bytes>> {
        let keys: Vec<Vec<u8>> = self.query(redis::cmd("KEYS").arg("*")).await?;
        Ok(keys.into_iter().map(Bytes::from).collect())
    }
}

#[async_trait::async_trait]
impl NotificationSource for RedisStore {
    /// Open a dedicated MONITOR connection. The multiplexed handle is
    /// dropped; lines arrive with no request deadline.
    async fn monitor(self) -> Result<NotificationStream> {
        let address = self.address;

        #[allow(deprecated)]
        let conn = match timeout(self.connect_timeout, self.client.get_async_connection()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(Error::from_redis(&address, e)),
            Err(_) => return Err(Error::ConnectionTimeout(address)),
        };

        let mut monitor = conn.into_monitor();
        monitor
            .monitor()
            .await
            .map_err(|e| Error::from_redis(&address, e))?;
        tracing::info!("Tailing MONITOR stream on {}", address);

        let stream = monitor
            .into_on_message::<String>()
            .map(|line| Ok(Bytes::from(line)));
        Ok(Box::pin(stream))
    }
}
