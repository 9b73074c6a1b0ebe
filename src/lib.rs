//! Asynchronous, pipelined client core for the RESP wire protocol, with
//! sentinel-based master discovery.
//!
//! The crate is built leaves-first:
//!
//! - [`Reply`] is the value a server answer decodes into.
//! - [`builders`] holds the incremental per-type decoders and the
//!   [`ReplyBuilder`] driver that turns arbitrarily fragmented bytes into a
//!   FIFO of completed replies.
//! - [`TcpClient`] is the thin facade over tokio's TCP sockets.
//! - [`Connection`] binds the two together: commands are staged with
//!   `send`, flushed with `commit`, and replies are dispatched to a handler
//!   in send order.
//! - [`SentinelClient`] layers a monitor registry and per-command reply
//!   callbacks on top of one connection to answer "who is the master of
//!   this replication group" with round-robin fail-through.

pub mod builders;
pub use builders::ReplyBuilder;

mod connection;
pub use connection::{encode_command, Connection, DisconnectHandler, ReplyHandler};

mod error;
pub use error::{Error, ParseError};

mod reply;
pub use reply::{NullKind, Reply};

mod sentinel;
pub use sentinel::{ReplyCallback, SentinelClient, SentinelDef};

mod tcp;
pub use tcp::{OnDisconnection, TcpClient};

/// Default port a redis sentinel listens on.
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
