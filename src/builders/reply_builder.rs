//! Streaming decoder turning raw socket bytes into a FIFO of replies.

use crate::builders::Builder;
use crate::error::{Error, ParseError};
use crate::Reply;

use bytes::{Buf, BytesMut};
use std::collections::VecDeque;

/// Reassembles complete replies from arbitrarily fragmented input.
///
/// Bytes are appended with [`push_bytes`](ReplyBuilder::push_bytes); whole
/// replies come out of the completed queue in arrival order. Feeding the
/// same byte stream in any chunking yields the same sequence of replies.
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    buffer: BytesMut,
    current: Option<Builder>,
    available: VecDeque<Reply>,
}

impl ReplyBuilder {
    pub fn new() -> ReplyBuilder {
        ReplyBuilder::default()
    }

    /// Appends raw bytes and decodes as many complete replies as they allow.
    ///
    /// A `ParseError` means the stream can no longer be trusted; the caller
    /// is expected to drop the session.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        self.buffer.extend_from_slice(bytes);
        while self.build_reply()? {}
        Ok(())
    }

    fn build_reply(&mut self) -> Result<bool, ParseError> {
        if self.current.is_none() {
            if self.buffer.is_empty() {
                return Ok(false);
            }
            let tag = self.buffer[0];
            self.buffer.advance(1);
            self.current = Some(Builder::for_tag(tag, 0)?);
        }

        if let Some(builder) = self.current.as_mut() {
            builder.feed(&mut self.buffer)?;
            if builder.ready() {
                self.available.push_back(builder.take());
                self.current = None;
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn reply_available(&self) -> bool {
        !self.available.is_empty()
    }

    /// A view of the oldest completed reply.
    pub fn front(&self) -> crate::Result<&Reply> {
        self.available.front().ok_or(Error::NoReplyAvailable)
    }

    /// Removes and returns the oldest completed reply.
    pub fn pop_front(&mut self) -> crate::Result<Reply> {
        self.available.pop_front().ok_or(Error::NoReplyAvailable)
    }

    /// Discards the in-progress parse state. Completed replies stay queued.
    pub fn reset(&mut self) {
        self.current = None;
        self.buffer.clear();
    }
}
