use crate::builders::SimpleStringBuilder;
use crate::error::ParseError;
use crate::Reply;

use bytes::BytesMut;

/// Builds an error reply. Same line format as a simple string.
#[derive(Debug, Default)]
pub struct ErrorBuilder {
    line: SimpleStringBuilder,
}

impl ErrorBuilder {
    pub fn new() -> ErrorBuilder {
        ErrorBuilder::default()
    }

    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        self.line.feed(src)
    }

    pub fn ready(&self) -> bool {
        self.line.ready()
    }

    pub fn take(&mut self) -> Reply {
        Reply::Error(self.line.take_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_error_line() {
        let mut builder = ErrorBuilder::new();
        let mut src = BytesMut::from(&b"ERR unknown command 'foo'\r\n"[..]);

        builder.feed(&mut src).unwrap();
        assert_eq!(
            builder.take(),
            Reply::Error("ERR unknown command 'foo'".into())
        );
    }
}
