//! Error types for the client and the RESP decoder.

use thiserror::Error;

/// Malformed RESP on the wire.
///
/// A parse error is fatal to the session that produced it: the connection
/// tears itself down, since the byte stream can no longer be re-synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Unknown reply type tag.
    #[error("invalid reply tag: {0:#04x}")]
    InvalidTag(u8),

    /// An integer line held something other than an ASCII signed decimal,
    /// or the value does not fit an `i64`.
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    /// A bulk string declared a negative length other than -1.
    #[error("invalid bulk string length: {0}")]
    InvalidLength(i64),

    /// A bulk string payload was not followed by CRLF.
    #[error("wrong ending sequence")]
    WrongEndingSequence,

    /// A simple string or error line was not valid UTF-8.
    #[error("invalid utf-8 in reply")]
    InvalidUtf8,

    /// Array nesting past the accepted bound.
    #[error("nesting too deep: {0}")]
    NestingTooDeep(usize),
}

/// Error returned by client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer sent bytes that do not decode as RESP.
    #[error("protocol error: {0}")]
    Parse(#[from] ParseError),

    /// I/O failure on an established connection.
    #[error("network error: {0}")]
    Network(String),

    /// Establishing a connection failed.
    #[error("connect error: {0}")]
    Connect(String),

    /// The operation was invoked in a configuration that cannot work.
    #[error("configuration error: {0}")]
    Config(&'static str),

    /// The operation requires an established connection.
    #[error("not connected")]
    NotConnected,

    /// The reply queue was inspected while empty.
    #[error("no reply available")]
    NoReplyAvailable,
}
