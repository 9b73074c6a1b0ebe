use crate::builders::take_line;
use crate::error::ParseError;
use crate::Reply;

use bytes::BytesMut;

/// Builds a simple string reply, accumulating bytes until CRLF.
#[derive(Debug, Default)]
pub struct SimpleStringBuilder {
    value: Option<String>,
}

impl SimpleStringBuilder {
    pub fn new() -> SimpleStringBuilder {
        SimpleStringBuilder::default()
    }

    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        if self.value.is_some() {
            return Ok(());
        }

        if let Some(line) = take_line(src) {
            let text = String::from_utf8(line.to_vec()).map_err(|_| ParseError::InvalidUtf8)?;
            self.value = Some(text);
        }

        Ok(())
    }

    pub fn ready(&self) -> bool {
        self.value.is_some()
    }

    /// The decoded line. Defined only once `ready` reports true.
    pub(crate) fn take_string(&mut self) -> String {
        match self.value.take() {
            Some(text) => text,
            None => panic!("simple string reply not ready"),
        }
    }

    pub fn take(&mut self) -> Reply {
        Reply::SimpleString(self.take_string())
    }
}
