//! Pipelined connection to a single RESP peer.
//!
//! Commands accumulate in an outbound buffer through [`Connection::send`]
//! and go on the wire as one chunk on [`Connection::commit`]. Inbound bytes
//! stream through a [`ReplyBuilder`] on a dedicated reader task, and every
//! completed reply is handed to the installed reply handler in the order the
//! commands were sent.

use crate::builders::ReplyBuilder;
use crate::error::Error;
use crate::tcp::TcpClient;
use crate::Reply;

use bytes::{BufMut, Bytes, BytesMut};
use std::mem;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error};

/// Size of each read issued against the socket.
const READ_CHUNK_SIZE: usize = 4096;

/// Receives every decoded reply, in the order the commands were sent.
pub type ReplyHandler = Box<dyn FnMut(Reply) + Send + 'static>;

/// Invoked when the connection is lost: peer close, I/O failure, or protocol
/// desync. Not invoked on an explicit [`Connection::disconnect`].
pub type DisconnectHandler = Box<dyn FnMut() + Send + 'static>;

/// Serializes one command as a RESP array of bulk strings.
///
/// Arguments are length-prefixed and binary-safe; there is no quoting or
/// escaping.
pub fn encode_command<S: AsRef<[u8]>>(args: &[S], dst: &mut BytesMut) {
    dst.put_u8(b'*');
    dst.put_slice(args.len().to_string().as_bytes());
    dst.put_slice(b"\r\n");

    for arg in args {
        let arg = arg.as_ref();
        dst.put_u8(b'$');
        dst.put_slice(arg.len().to_string().as_bytes());
        dst.put_slice(b"\r\n");
        dst.put_slice(arg);
        dst.put_slice(b"\r\n");
    }
}

/// A pipelined client connection.
///
/// Clones share the same underlying connection. `send` and `commit` may be
/// called concurrently from any number of tasks; replies always come back in
/// send order because the outbound buffer, the TCP stream, and the decoder
/// all preserve it.
#[derive(Clone, Default)]
pub struct Connection {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    tcp: TcpClient,
    outbound: Mutex<BytesMut>,
    write_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    on_disconnect: Mutex<Option<DisconnectHandler>>,
    notify_shutdown: Mutex<Option<broadcast::Sender<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    pub fn new() -> Connection {
        Connection::default()
    }

    /// Establishes the connection and starts the I/O tasks.
    ///
    /// `on_reply` receives every decoded reply. `on_disconnect`, if present,
    /// fires when the peer drops the connection or the inbound stream stops
    /// decoding; an explicit [`disconnect`](Connection::disconnect) does not
    /// fire it. Reconnecting after a disconnect is supported; connecting an
    /// already-connected instance is an error.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        on_disconnect: Option<DisconnectHandler>,
        on_reply: ReplyHandler,
        timeout: Duration,
    ) -> crate::Result<()> {
        self.inner.tcp.connect(host, port, timeout).await?;

        *self.inner.on_disconnect.lock().unwrap() = on_disconnect;

        let weak = Arc::downgrade(&self.inner);
        self.inner.tcp.set_on_disconnection_handler(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Shared::handle_connection_lost(&inner);
            }
        }));

        let (notify_shutdown, shutdown_rx) = broadcast::channel(1);
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        *self.inner.write_tx.lock().unwrap() = Some(write_tx);
        *self.inner.notify_shutdown.lock().unwrap() = Some(notify_shutdown);

        let reader = tokio::spawn(read_loop(self.inner.clone(), on_reply, shutdown_rx));
        let writer = tokio::spawn(write_loop(self.inner.tcp.clone(), write_rx));
        *self.inner.tasks.lock().unwrap() = vec![reader, writer];

        debug!(%host, port, "connection established");
        Ok(())
    }

    /// Serializes `args` and appends the bytes to the outbound buffer.
    ///
    /// No I/O happens until [`commit`](Connection::commit).
    pub fn send<S: AsRef<[u8]>>(&self, args: &[S]) -> &Self {
        let mut outbound = self.inner.outbound.lock().unwrap();
        encode_command(args, &mut outbound);
        debug!(pending = outbound.len(), "command staged in send buffer");
        self
    }

    /// Flushes every staged command to the socket as a single write.
    ///
    /// Commands staged concurrently with the flush simply land in the next
    /// commit; reply ordering is unaffected by commit boundaries.
    pub fn commit(&self) -> crate::Result<()> {
        let chunk = {
            let mut outbound = self.inner.outbound.lock().unwrap();
            outbound.split().freeze()
        };
        if chunk.is_empty() {
            return Ok(());
        }

        debug!(len = chunk.len(), "committing pipelined commands");
        let write_tx = self.inner.write_tx.lock().unwrap();
        match write_tx.as_ref() {
            Some(tx) => tx
                .send(chunk)
                .map_err(|_| Error::Network("write task stopped".into())),
            None => Err(Error::NotConnected),
        }
    }

    /// Tears the connection down and clears the outbound buffer.
    ///
    /// With `wait_for_removal`, returns only after both I/O tasks have
    /// stopped.
    pub async fn disconnect(&self, wait_for_removal: bool) {
        // Stop the reader before closing the socket so its pending read
        // releases the facade's read lock.
        if let Some(notify) = self.inner.notify_shutdown.lock().unwrap().take() {
            let _ = notify.send(());
        }
        *self.inner.write_tx.lock().unwrap() = None;

        self.inner.tcp.disconnect(wait_for_removal).await;

        self.inner.outbound.lock().unwrap().clear();
        *self.inner.on_disconnect.lock().unwrap() = None;

        if wait_for_removal {
            let tasks = {
                let mut tasks = self.inner.tasks.lock().unwrap();
                mem::take(&mut *tasks)
            };
            for task in tasks {
                let _ = task.await;
            }
        }

        debug!("connection closed");
    }

    pub fn is_connected(&self) -> bool {
        self.inner.tcp.is_connected()
    }
}

impl Shared {
    /// Connection-lost path: clear outbound state, then notify the user.
    fn handle_connection_lost(inner: &Arc<Shared>) {
        inner.outbound.lock().unwrap().clear();
        *inner.write_tx.lock().unwrap() = None;

        let handler = inner.on_disconnect.lock().unwrap().take();
        if let Some(mut handler) = handler {
            debug!("connection lost, invoking disconnect handler");
            handler();
        }
    }
}

async fn read_loop(
    inner: Arc<Shared>,
    mut on_reply: ReplyHandler,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut decoder = ReplyBuilder::new();

    loop {
        let chunk = tokio::select! {
            res = inner.tcp.read_chunk(READ_CHUNK_SIZE) => match res {
                Ok(chunk) => chunk,
                // The facade already ran the disconnection path.
                Err(_) => return,
            },
            _ = shutdown_rx.recv() => return,
        };

        if let Err(err) = decoder.push_bytes(&chunk) {
            error!(%err, "reply decoding failed, dropping connection");
            Shared::handle_connection_lost(&inner);
            return;
        }

        while decoder.reply_available() {
            match decoder.pop_front() {
                Ok(reply) => on_reply(reply),
                Err(_) => break,
            }
        }
    }
}

async fn write_loop(tcp: TcpClient, mut write_rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(chunk) = write_rx.recv().await {
        if let Err(err) = tcp.write_all(&chunk).await {
            error!(%err, "write failed");
            return;
        }
    }
}
