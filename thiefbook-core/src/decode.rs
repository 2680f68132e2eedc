use std::borrow::Cow;

use encoding_rs::{Encoding, GBK};

use crate::error::{ReaderError, Result};

/// Decodes raw book lines. Books are expected to be GBK encoded.
#[derive(Debug, Clone, Copy)]
pub struct LineDecoder {
    encoding: &'static Encoding,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self { encoding: GBK }
    }

    /// Decodes `raw`, failing if any byte sequence is malformed.
    pub fn decode<'a>(&self, raw: &'a [u8], line: usize) -> Result<Cow<'a, str>> {
        self.encoding
            .decode_without_bom_handling_and_without_replacement(raw)
            .ok_or(ReaderError::Decode {
                line,
                encoding: self.encoding.name(),
            })
    }

    /// Decodes `raw`, substituting U+FFFD for malformed sequences.
    pub fn decode_lossy<'a>(&self, raw: &'a [u8]) -> Cow<'a, str> {
        self.encoding.decode_without_bom_handling(raw).0
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}
