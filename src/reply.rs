//! Provides a type representing a single reply in the RESP wire format.
//!
//! The protocol is described at <https://redis.io/topics/protocol>.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::str;

/// Which wire form produced a null reply.
///
/// `$-1\r\n` (null bulk string) and `*-1\r\n` (null array) both decode to
/// [`Reply::Null`], but re-encoding must reproduce the form the server sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullKind {
    BulkString,
    Array,
}

/// A single reply decoded from a RESP stream.
///
/// Replies are plain owned values: once handed out by the decoder they are
/// never mutated, and arrays keep their elements in server order.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Null(NullKind),
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::Null(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Reply::Array(_))
    }

    /// Whether the reply carries text, either as a simple or a bulk string.
    pub fn is_string(&self) -> bool {
        matches!(self, Reply::SimpleString(_) | Reply::BulkString(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Reply::Integer(_))
    }

    /// Whether the server reported success, i.e. anything but an error reply.
    pub fn ok(&self) -> bool {
        !self.is_error()
    }

    /// The elements of an array reply.
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The textual payload of a simple or bulk string reply.
    ///
    /// Bulk strings are binary-safe on the wire; `None` is returned when the
    /// payload is not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::SimpleString(text) => Some(text),
            Reply::BulkString(data) => str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// The raw payload of a simple or bulk string reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::SimpleString(text) => Some(text.as_bytes()),
            Reply::BulkString(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Re-encodes the reply in its RESP wire form.
    ///
    /// Encoding a decoded reply reproduces the original byte stream, down to
    /// the null form recorded in [`NullKind`].
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Reply::Null(NullKind::BulkString) => dst.put_slice(b"$-1\r\n"),
            Reply::Null(NullKind::Array) => dst.put_slice(b"*-1\r\n"),
            Reply::SimpleString(text) => {
                dst.put_u8(b'+');
                dst.put_slice(text.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Error(text) => {
                dst.put_u8(b'-');
                dst.put_slice(text.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Integer(value) => {
                dst.put_u8(b':');
                put_decimal_line(dst, *value);
            }
            Reply::BulkString(data) => {
                dst.put_u8(b'$');
                put_decimal_line(dst, data.len() as i64);
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Reply::Array(items) => {
                dst.put_u8(b'*');
                put_decimal_line(dst, items.len() as i64);
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }
}

fn put_decimal_line(dst: &mut BytesMut, value: i64) {
    dst.put_slice(value.to_string().as_bytes());
    dst.put_slice(b"\r\n");
}

impl fmt::Display for Reply {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Null(_) => "(nil)".fmt(fmt),
            Reply::SimpleString(text) => text.fmt(fmt),
            Reply::Error(text) => write!(fmt, "error: {}", text),
            Reply::Integer(value) => value.fmt(fmt),
            Reply::BulkString(data) => match str::from_utf8(data) {
                Ok(text) => text.fmt(fmt),
                Err(_) => write!(fmt, "{:?}", data),
            },
            Reply::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, " ")?;
                    }
                    item.fmt(fmt)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::ReplyBuilder;

    fn roundtrip(reply: Reply) {
        let mut wire = BytesMut::new();
        reply.encode(&mut wire);

        let mut decoder = ReplyBuilder::new();
        decoder.push_bytes(&wire).unwrap();

        assert_eq!(decoder.pop_front().unwrap(), reply);
        assert!(!decoder.reply_available());
    }

    #[test]
    fn roundtrip_scalars() {
        roundtrip(Reply::SimpleString("OK".into()));
        roundtrip(Reply::Error("ERR unknown command".into()));
        roundtrip(Reply::Integer(-42));
        roundtrip(Reply::BulkString(Bytes::from_static(b"hello\r\nworld")));
    }

    #[test]
    fn roundtrip_arrays() {
        roundtrip(Reply::Array(vec![]));
        roundtrip(Reply::Array(vec![
            Reply::Integer(1),
            Reply::Array(vec![Reply::BulkString(Bytes::from_static(b"nested"))]),
            Reply::Null(NullKind::BulkString),
        ]));
    }

    #[test]
    fn roundtrip_preserves_null_kind() {
        roundtrip(Reply::Null(NullKind::BulkString));
        roundtrip(Reply::Null(NullKind::Array));

        let mut wire = BytesMut::new();
        Reply::Null(NullKind::Array).encode(&mut wire);
        assert_eq!(&wire[..], b"*-1\r\n");
    }

    #[test]
    fn string_accessors() {
        let reply = Reply::BulkString(Bytes::from_static(b"master"));
        assert!(reply.is_string());
        assert_eq!(reply.as_str(), Some("master"));
        assert_eq!(reply.as_bytes(), Some(&b"master"[..]));
        assert_eq!(Reply::Integer(7).as_str(), None);
    }
}
