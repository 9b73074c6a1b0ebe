//! Sentinel client: master discovery over a pool of monitors.
//!
//! A [`SentinelClient`] wraps one pipelined [`Connection`] and pairs every
//! sent command with a one-shot reply callback. Callbacks are dispatched in
//! send order, and [`sync_commit`](SentinelClient::sync_commit) blocks until
//! all of them have run. Monitors registered with
//! [`add_sentinel`](SentinelClient::add_sentinel) are tried in insertion
//! order whenever a connection is needed.

use crate::connection::{Connection, DisconnectHandler, ReplyHandler};
use crate::error::Error;
use crate::Reply;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Receives the reply to one sent command.
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// One monitor entry in the sentinel registry.
#[derive(Debug, Clone)]
pub struct SentinelDef {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SentinelDef {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect timeout used when this monitor is tried.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Client for the `SENTINEL` administrative command family.
#[derive(Default)]
pub struct SentinelClient {
    connection: Connection,
    sentinels: Vec<SentinelDef>,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    callbacks: Mutex<CallbackState>,
    sync: Notify,
    on_disconnect: Mutex<Option<DisconnectHandler>>,
}

#[derive(Default)]
struct CallbackState {
    queue: VecDeque<ReplyCallback>,
    running: usize,
}

impl SentinelClient {
    pub fn new() -> SentinelClient {
        SentinelClient::default()
    }

    /// Registers a monitor to try during
    /// [`connect_sentinel`](SentinelClient::connect_sentinel).
    pub fn add_sentinel(
        &mut self,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
    ) -> &mut Self {
        self.sentinels.push(SentinelDef {
            host: host.into(),
            port,
            timeout,
        });
        self
    }

    pub fn clear_sentinels(&mut self) {
        self.sentinels.clear();
    }

    pub fn get_sentinels(&self) -> &[SentinelDef] {
        &self.sentinels
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Connects to one given sentinel, bypassing the registry.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        on_disconnect: Option<DisconnectHandler>,
        timeout: Duration,
    ) -> crate::Result<()> {
        self.connect_to(host, port, timeout).await?;
        *self.shared.on_disconnect.lock().unwrap() = on_disconnect;
        Ok(())
    }

    /// Walks the registry in insertion order until one monitor accepts the
    /// connection.
    ///
    /// Unreachable monitors are logged and skipped; a half-open attempt is
    /// closed before moving to the next entry.
    pub async fn connect_sentinel(
        &mut self,
        on_disconnect: Option<DisconnectHandler>,
    ) -> crate::Result<()> {
        if self.sentinels.is_empty() {
            return Err(Error::Config(
                "no sentinels configured, call add_sentinel() first",
            ));
        }

        let mut connected = false;
        for index in 0..self.sentinels.len() {
            let (host, port, timeout) = {
                let def = &self.sentinels[index];
                (def.host.clone(), def.port, def.timeout)
            };

            debug!(%host, port, "attempting sentinel connection");
            if let Err(err) = self.connect_to(&host, port, timeout).await {
                warn!(%host, port, %err, "sentinel unreachable");
            }

            if self.is_connected() {
                info!(%host, port, "sentinel connected");
                connected = true;
                break;
            }

            // make sure no half-open state lingers before the next attempt
            self.disconnect(true).await;
        }

        if !connected {
            return Err(Error::Connect("unable to connect to any sentinels".into()));
        }

        *self.shared.on_disconnect.lock().unwrap() = on_disconnect;
        Ok(())
    }

    async fn connect_to(&self, host: &str, port: u16, timeout: Duration) -> crate::Result<()> {
        let shared = self.shared.clone();
        let on_reply: ReplyHandler = Box::new(move |reply| Shared::handle_reply(&shared, reply));

        let shared = self.shared.clone();
        let on_disconnect: DisconnectHandler =
            Box::new(move || Shared::handle_connection_lost(&shared));

        self.connection
            .connect(host, port, Some(on_disconnect), on_reply, timeout)
            .await
    }

    /// Queues one command together with the callback that will receive its
    /// reply.
    ///
    /// Staging the command and enqueueing the callback happen under the same
    /// lock, so queue order always matches send order.
    pub fn send<S: AsRef<[u8]>>(&self, args: &[S], callback: ReplyCallback) -> &Self {
        let mut state = self.shared.callbacks.lock().unwrap();
        self.connection.send(args);
        state.queue.push_back(callback);
        self
    }

    /// Flushes queued commands to the sentinel.
    pub fn commit(&self) -> crate::Result<()> {
        self.try_commit()
    }

    /// Flushes queued commands and waits until every queued callback has
    /// been invoked and has returned.
    pub async fn sync_commit(&self) -> crate::Result<()> {
        self.try_commit()?;

        loop {
            // register the waiter before checking, so a notification landing
            // between the check and the await is not lost
            let notified = self.shared.sync.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.callbacks.lock().unwrap();
                if state.running == 0 && state.queue.is_empty() {
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    fn try_commit(&self) -> crate::Result<()> {
        if let Err(err) = self.connection.commit() {
            warn!(%err, "commit failed, dropping queued callbacks");
            Shared::clear_callbacks(&self.shared);
            return Err(err);
        }
        Ok(())
    }

    pub async fn disconnect(&self, wait_for_removal: bool) {
        self.connection.disconnect(wait_for_removal).await;
    }

    /// Asks the monitors for the current master address of the replication
    /// group `name`.
    ///
    /// With `auto_connect`, the registry is walked for a reachable sentinel
    /// and the connection is closed again before returning, since the same
    /// monitor may not be around for the next call. Returns `None` when no
    /// sentinel could be reached or none reported a master.
    pub async fn get_master_addr_by_name(
        &mut self,
        name: &str,
        auto_connect: bool,
    ) -> crate::Result<Option<(String, u16)>> {
        if auto_connect && self.sentinels.is_empty() {
            return Err(Error::Config(
                "no sentinels configured, call add_sentinel() first",
            ));
        }
        if !auto_connect && !self.is_connected() {
            return Err(Error::NotConnected);
        }

        if auto_connect {
            if let Err(err) = self.connect_sentinel(None).await {
                debug!(%err, "sentinel autoconnect failed");
            }
            if !self.is_connected() {
                return Ok(None);
            }
        }

        let addr = Arc::new(Mutex::new((String::new(), 0u16)));
        let out = addr.clone();
        self.send(
            &["SENTINEL", "get-master-addr-by-name", name],
            Box::new(move |reply| {
                if let Reply::Array(items) = reply {
                    let mut out = out.lock().unwrap();
                    if let Some(host) = items.first().and_then(Reply::as_str) {
                        out.0 = host.to_string();
                    }
                    if let Some(port) = items.get(1).and_then(Reply::as_str) {
                        out.1 = port.parse().unwrap_or(0);
                    }
                }
            }),
        );
        self.sync_commit().await?;

        if auto_connect {
            self.disconnect(true).await;
        }

        let (host, port) = {
            let out = addr.lock().unwrap();
            out.clone()
        };
        if port != 0 {
            Ok(Some((host, port)))
        } else {
            Ok(None)
        }
    }

    /// `PING`.
    pub fn ping(&self, callback: ReplyCallback) -> &Self {
        self.send(&["PING"], callback)
    }

    /// `SENTINEL MASTERS`: state of every monitored master.
    pub fn masters(&self, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "MASTERS"], callback)
    }

    /// `SENTINEL MASTER <name>`.
    pub fn master(&self, name: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "MASTER", name], callback)
    }

    /// `SENTINEL SLAVES <name>`.
    pub fn slaves(&self, name: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "SLAVES", name], callback)
    }

    /// `SENTINEL SENTINELS <name>`: the other monitors of a master.
    pub fn sentinels(&self, name: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "SENTINELS", name], callback)
    }

    /// `SENTINEL CKQUORUM <name>`.
    pub fn ckquorum(&self, name: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "CKQUORUM", name], callback)
    }

    /// `SENTINEL FAILOVER <name>`: force a failover without quorum.
    pub fn failover(&self, name: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "FAILOVER", name], callback)
    }

    /// `SENTINEL RESET <pattern>`.
    pub fn reset(&self, pattern: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "RESET", pattern], callback)
    }

    /// `SENTINEL FLUSHCONFIG`.
    pub fn flushconfig(&self, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "FLUSHCONFIG"], callback)
    }

    /// `SENTINEL MONITOR <name> <ip> <port> <quorum>`.
    pub fn monitor(
        &self,
        name: &str,
        ip: &str,
        port: u16,
        quorum: u32,
        callback: ReplyCallback,
    ) -> &Self {
        let port = port.to_string();
        let quorum = quorum.to_string();
        self.send(&["SENTINEL", "MONITOR", name, ip, &port, &quorum], callback)
    }

    /// `SENTINEL REMOVE <name>`.
    pub fn remove(&self, name: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "REMOVE", name], callback)
    }

    /// `SENTINEL SET <name> <option> <value>`.
    pub fn set(&self, name: &str, option: &str, value: &str, callback: ReplyCallback) -> &Self {
        self.send(&["SENTINEL", "SET", name, option, value], callback)
    }
}

impl Shared {
    /// Inbound dispatch: pop the head callback and run it outside the lock.
    ///
    /// The running counter keeps `sync_commit` from returning while a
    /// callback is still executing.
    fn handle_reply(shared: &Arc<Shared>, reply: Reply) {
        let callback = {
            let mut state = shared.callbacks.lock().unwrap();
            state.running += 1;
            state.queue.pop_front()
        };

        if let Some(callback) = callback {
            debug!("dispatching sentinel reply");
            callback(reply);
        }

        let mut state = shared.callbacks.lock().unwrap();
        state.running -= 1;
        drop(state);
        shared.sync.notify_waiters();
    }

    fn clear_callbacks(shared: &Arc<Shared>) {
        shared.callbacks.lock().unwrap().queue.clear();
        shared.sync.notify_waiters();
    }

    fn handle_connection_lost(shared: &Arc<Shared>) {
        warn!("sentinel connection lost");
        Shared::clear_callbacks(shared);

        let handler = shared.on_disconnect.lock().unwrap().take();
        if let Some(mut handler) = handler {
            handler();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_keeps_insertion_order() {
        let mut client = SentinelClient::new();
        client
            .add_sentinel("10.0.0.1", 26379, Duration::from_millis(100))
            .add_sentinel("10.0.0.2", 26380, Duration::from_millis(200));

        let defs = client.get_sentinels();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].host(), "10.0.0.1");
        assert_eq!(defs[0].port(), 26379);
        assert_eq!(defs[1].timeout(), Duration::from_millis(200));

        client.clear_sentinels();
        assert!(client.get_sentinels().is_empty());
    }

    #[tokio::test]
    async fn connect_sentinel_requires_a_registry() {
        let mut client = SentinelClient::new();
        let err = client.connect_sentinel(None).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn failed_commit_drops_queued_callbacks() {
        let client = SentinelClient::new();
        client.ping(Box::new(|_| panic!("callback must have been dropped")));

        assert!(client.commit().is_err());

        // the queue was cleared, so a sync commit has nothing to wait for
        client.sync_commit().await.unwrap();
    }
}
