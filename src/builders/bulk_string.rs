use crate::builders::IntegerBuilder;
use crate::error::ParseError;
use crate::{NullKind, Reply};

use bytes::{Buf, BytesMut};

/// Builds a bulk string reply.
///
/// Decoding runs in two stages: the length header, then the payload plus
/// its trailing CRLF. `$-1` resolves to a null reply with no payload stage.
#[derive(Debug, Default)]
pub struct BulkStringBuilder {
    header: IntegerBuilder,
    len: Option<usize>,
    reply: Option<Reply>,
}

impl BulkStringBuilder {
    pub fn new() -> BulkStringBuilder {
        BulkStringBuilder::default()
    }

    fn fetch_len(&mut self, src: &mut BytesMut) -> Result<bool, ParseError> {
        if self.len.is_some() {
            return Ok(true);
        }

        self.header.feed(src)?;
        if !self.header.ready() {
            return Ok(false);
        }

        match self.header.value() {
            -1 => {
                self.reply = Some(Reply::Null(NullKind::BulkString));
                Ok(true)
            }
            len if len < -1 => Err(ParseError::InvalidLength(len)),
            len => {
                self.len = Some(len as usize);
                Ok(true)
            }
        }
    }

    fn fetch_payload(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        let len = match self.len {
            Some(len) => len,
            None => return Ok(()),
        };

        // also wait for the terminator
        if src.len() < len + 2 {
            return Ok(());
        }

        if &src[len..len + 2] != b"\r\n" {
            return Err(ParseError::WrongEndingSequence);
        }

        let payload = src.split_to(len).freeze();
        src.advance(2);
        self.reply = Some(Reply::BulkString(payload));

        Ok(())
    }

    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        if self.reply.is_some() {
            return Ok(());
        }

        if !self.fetch_len(src)? || self.reply.is_some() {
            return Ok(());
        }

        self.fetch_payload(src)
    }

    pub fn ready(&self) -> bool {
        self.reply.is_some()
    }

    pub fn take(&mut self) -> Reply {
        match self.reply.take() {
            Some(reply) => reply,
            None => panic!("bulk string reply not ready"),
        }
    }
}
