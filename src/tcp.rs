//! Thin facade between the client and tokio's TCP sockets.

use crate::error::Error;

use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{self, Duration};
use tracing::debug;

/// Fired at most once per connection, when the peer drops it or an I/O
/// operation fails. Not fired on an explicit [`TcpClient::disconnect`].
pub type OnDisconnection = Box<dyn FnOnce() + Send + 'static>;

/// Asynchronous TCP transport with an explicit connect/disconnect lifecycle.
///
/// Clones are handles to the same socket.
#[derive(Clone, Default)]
pub struct TcpClient {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    read_half: AsyncMutex<Option<OwnedReadHalf>>,
    write_half: AsyncMutex<Option<OwnedWriteHalf>>,
    on_disconnection: Mutex<Option<OnDisconnection>>,
}

impl TcpClient {
    pub fn new() -> TcpClient {
        TcpClient::default()
    }

    /// Opens a connection to `host:port`, bounded by `timeout`.
    pub async fn connect(&self, host: &str, port: u16, timeout: Duration) -> crate::Result<()> {
        if self.is_connected() {
            return Err(Error::Connect("already connected".into()));
        }

        let addr = format!("{}:{}", host, port);
        let stream = time::timeout(timeout, TcpStream::connect(addr.as_str()))
            .await
            .map_err(|_| Error::Connect(format!("{}: connect timed out", addr)))?
            .map_err(|err| Error::Connect(format!("{}: {}", addr, err)))?;
        stream
            .set_nodelay(true)
            .map_err(|err| Error::Connect(format!("{}: {}", addr, err)))?;

        let (read_half, write_half) = stream.into_split();
        *self.inner.read_half.lock().await = Some(read_half);
        *self.inner.write_half.lock().await = Some(write_half);
        self.inner.connected.store(true, Ordering::SeqCst);

        debug!(%addr, "tcp connected");
        Ok(())
    }

    /// Closes the connection. Idempotent.
    ///
    /// Taking the half locks serializes teardown against in-flight reads and
    /// writes, so the socket is quiesced on return regardless of
    /// `wait_for_removal`; the flag is honored at the connection layer where
    /// the I/O tasks live.
    pub async fn disconnect(&self, _wait_for_removal: bool) {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.on_disconnection.lock().unwrap().take();

        self.inner.read_half.lock().await.take();
        if let Some(mut write_half) = self.inner.write_half.lock().await.take() {
            let _ = write_half.shutdown().await;
        }

        debug!("tcp disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Installs the handler fired when the connection is lost.
    pub fn set_on_disconnection_handler(&self, handler: OnDisconnection) {
        *self.inner.on_disconnection.lock().unwrap() = Some(handler);
    }

    /// Reads one chunk of at most `max` bytes.
    ///
    /// End of stream and I/O failures mark the client disconnected, fire the
    /// disconnection handler, and surface as [`Error::Network`].
    pub async fn read_chunk(&self, max: usize) -> crate::Result<Bytes> {
        let mut guard = self.inner.read_half.lock().await;
        let read_half = guard.as_mut().ok_or(Error::NotConnected)?;

        let mut chunk = BytesMut::with_capacity(max);
        match read_half.read_buf(&mut chunk).await {
            Ok(0) => {
                drop(guard);
                self.drop_connection();
                Err(Error::Network("connection closed by peer".into()))
            }
            Ok(_) => Ok(chunk.freeze()),
            Err(err) => {
                drop(guard);
                self.drop_connection();
                Err(Error::Network(err.to_string()))
            }
        }
    }

    /// Writes the whole buffer to the socket.
    pub async fn write_all(&self, data: &[u8]) -> crate::Result<()> {
        let mut guard = self.inner.write_half.lock().await;
        let write_half = guard.as_mut().ok_or(Error::NotConnected)?;

        match write_half.write_all(data).await {
            Ok(()) => Ok(()),
            Err(err) => {
                drop(guard);
                self.drop_connection();
                Err(Error::Network(err.to_string()))
            }
        }
    }

    fn drop_connection(&self) {
        if self.inner.connected.swap(false, Ordering::SeqCst) {
            let handler = self.inner.on_disconnection.lock().unwrap().take();
            if let Some(handler) = handler {
                debug!("tcp connection lost, firing disconnection handler");
                handler();
            }
        }
    }
}
