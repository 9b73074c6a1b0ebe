use crate::builders::take_line;
use crate::error::ParseError;
use crate::Reply;

use bytes::BytesMut;

/// Builds an integer reply from one ASCII signed decimal line.
///
/// Also used internally by the bulk string and array builders to decode
/// their length headers.
#[derive(Debug, Default)]
pub struct IntegerBuilder {
    value: Option<i64>,
}

impl IntegerBuilder {
    pub fn new() -> IntegerBuilder {
        IntegerBuilder::default()
    }

    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        if self.value.is_some() {
            return Ok(());
        }

        let line = match take_line(src) {
            Some(line) => line,
            None => return Ok(()),
        };

        let value = atoi::atoi::<i64>(&line).ok_or_else(|| {
            ParseError::InvalidInteger(String::from_utf8_lossy(&line).into_owned())
        })?;
        self.value = Some(value);

        Ok(())
    }

    pub fn ready(&self) -> bool {
        self.value.is_some()
    }

    /// The decoded value. Defined only once `ready` reports true.
    pub fn value(&self) -> i64 {
        match self.value {
            Some(value) => value,
            None => panic!("integer reply not ready"),
        }
    }

    pub fn take(&mut self) -> Reply {
        Reply::Integer(self.value())
    }
}
