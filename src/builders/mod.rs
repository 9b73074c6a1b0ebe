//! Incremental decoders for the RESP wire format.
//!
//! Every reply type has its own builder holding the partial state of one
//! reply under construction. A builder consumes bytes from a shared buffer
//! and never takes more than its own frame, so a single buffer can serve
//! many consecutive replies across arbitrary fragmentation.

mod array;
pub use array::ArrayBuilder;

mod bulk_string;
pub use bulk_string::BulkStringBuilder;

mod error;
pub use error::ErrorBuilder;

mod integer;
pub use integer::IntegerBuilder;

mod simple_string;
pub use simple_string::SimpleStringBuilder;

mod reply_builder;
pub use reply_builder::ReplyBuilder;

use crate::error::ParseError;
use crate::Reply;

use bytes::{Buf, Bytes, BytesMut};

/// Maximum array nesting accepted from the wire.
pub(crate) const MAX_NESTING_DEPTH: usize = 32;

/// A partially decoded reply of any RESP type.
#[derive(Debug)]
pub enum Builder {
    Integer(IntegerBuilder),
    SimpleString(SimpleStringBuilder),
    Error(ErrorBuilder),
    BulkString(BulkStringBuilder),
    Array(ArrayBuilder),
}

impl Builder {
    /// Creates the builder matching a RESP type tag.
    ///
    /// `depth` is the array nesting level the new builder lives at; input
    /// nested past [`MAX_NESTING_DEPTH`] is rejected.
    pub fn for_tag(tag: u8, depth: usize) -> Result<Builder, ParseError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep(depth));
        }

        match tag {
            b':' => Ok(Builder::Integer(IntegerBuilder::new())),
            b'+' => Ok(Builder::SimpleString(SimpleStringBuilder::new())),
            b'-' => Ok(Builder::Error(ErrorBuilder::new())),
            b'$' => Ok(Builder::BulkString(BulkStringBuilder::new())),
            b'*' => Ok(Builder::Array(ArrayBuilder::new(depth))),
            other => Err(ParseError::InvalidTag(other)),
        }
    }

    /// Consumes as many bytes from `src` as the builder can use.
    ///
    /// Returning without error does not mean the reply is complete; check
    /// [`ready`](Builder::ready) and feed again once more bytes arrive.
    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        match self {
            Builder::Integer(builder) => builder.feed(src),
            Builder::SimpleString(builder) => builder.feed(src),
            Builder::Error(builder) => builder.feed(src),
            Builder::BulkString(builder) => builder.feed(src),
            Builder::Array(builder) => builder.feed(src),
        }
    }

    /// True once one full reply has been assembled.
    pub fn ready(&self) -> bool {
        match self {
            Builder::Integer(builder) => builder.ready(),
            Builder::SimpleString(builder) => builder.ready(),
            Builder::Error(builder) => builder.ready(),
            Builder::BulkString(builder) => builder.ready(),
            Builder::Array(builder) => builder.ready(),
        }
    }

    /// Extracts the finished reply.
    ///
    /// # Panics
    ///
    /// Panics if called before [`ready`](Builder::ready) reports true.
    pub fn take(&mut self) -> Reply {
        match self {
            Builder::Integer(builder) => builder.take(),
            Builder::SimpleString(builder) => builder.take(),
            Builder::Error(builder) => builder.take(),
            Builder::BulkString(builder) => builder.take(),
            Builder::Array(builder) => builder.take(),
        }
    }
}

/// Splits one CRLF-terminated line off the front of `src`.
///
/// Returns `None` without consuming anything when the terminator has not
/// arrived yet.
pub(crate) fn take_line(src: &mut BytesMut) -> Option<Bytes> {
    let end = src.len().checked_sub(1)?;

    for i in 0..end {
        if src[i] == b'\r' && src[i + 1] == b'\n' {
            let line = src.split_to(i).freeze();
            src.advance(2);
            return Some(line);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_rejected() {
        let err = Builder::for_tag(b'%', 0).unwrap_err();
        assert_eq!(err, ParseError::InvalidTag(b'%'));
    }

    #[test]
    fn take_line_waits_for_terminator() {
        let mut src = BytesMut::from(&b"PONG\r"[..]);
        assert_eq!(take_line(&mut src), None);
        assert_eq!(src.len(), 5);

        src.extend_from_slice(b"\nrest");
        assert_eq!(take_line(&mut src).as_deref(), Some(&b"PONG"[..]));
        assert_eq!(&src[..], b"rest");
    }
}
