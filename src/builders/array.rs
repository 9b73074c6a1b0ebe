use crate::builders::{Builder, IntegerBuilder};
use crate::error::ParseError;
use crate::{NullKind, Reply};

use bytes::{Buf, BytesMut};
use std::mem;

/// Builds an array reply.
///
/// The element count line comes first; each element is then decoded by a
/// child builder created from its own type tag. `*-1` resolves to a null
/// reply, `*0` to an empty array.
#[derive(Debug)]
pub struct ArrayBuilder {
    header: IntegerBuilder,
    expected: Option<usize>,
    items: Vec<Reply>,
    child: Option<Box<Builder>>,
    depth: usize,
    reply: Option<Reply>,
}

impl ArrayBuilder {
    /// `depth` is this array's own nesting level; children live one deeper.
    pub fn new(depth: usize) -> ArrayBuilder {
        ArrayBuilder {
            header: IntegerBuilder::new(),
            expected: None,
            items: Vec::new(),
            child: None,
            depth,
            reply: None,
        }
    }

    fn fetch_len(&mut self, src: &mut BytesMut) -> Result<bool, ParseError> {
        if self.expected.is_some() {
            return Ok(true);
        }

        self.header.feed(src)?;
        if !self.header.ready() {
            return Ok(false);
        }

        let len = self.header.value();
        if len < 0 {
            self.reply = Some(Reply::Null(NullKind::Array));
        } else if len == 0 {
            self.reply = Some(Reply::Array(Vec::new()));
        } else {
            self.expected = Some(len as usize);
        }

        Ok(true)
    }

    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        if self.reply.is_some() {
            return Ok(());
        }

        if !self.fetch_len(src)? {
            return Ok(());
        }

        while self.reply.is_none() {
            if self.child.is_none() {
                if src.is_empty() {
                    return Ok(());
                }
                let tag = src[0];
                src.advance(1);
                self.child = Some(Box::new(Builder::for_tag(tag, self.depth + 1)?));
            }

            if let Some(child) = self.child.as_mut() {
                child.feed(src)?;
                if !child.ready() {
                    return Ok(());
                }

                self.items.push(child.take());
                self.child = None;

                if Some(self.items.len()) == self.expected {
                    self.reply = Some(Reply::Array(mem::take(&mut self.items)));
                }
            }
        }

        Ok(())
    }

    pub fn ready(&self) -> bool {
        self.reply.is_some()
    }

    pub fn take(&mut self) -> Reply {
        match self.reply.take() {
            Some(reply) => reply,
            None => panic!("array reply not ready"),
        }
    }
}
