//! ccnb: a self-describing tag-length binary wire format.
//!
//! Every token begins with a header that packs a 3-bit type and an
//! arbitrary-width value into a byte sequence: continuation bytes (high bit
//! set) each carry 7 value bits, most-significant group first, and the
//! terminal byte (high bit clear) carries its lowest 4 value bits alongside
//! the 3-bit type in `(value << 3) | type`. This is the layout named in the
//! external-interfaces description of the wire format; it is unrelated to
//! NDN-TLV's varint escape-byte scheme.
//!
//! The codec here is pure: it only ever turns bytes into tokens and back,
//! never performing I/O or retaining more than the returned structures.

use crate::error::WireError;
use bytes::{BufMut, Bytes, BytesMut};

/// Maximum token value length accepted by the decoder, guarding against a
/// hostile length field claiming an absurd allocation.
pub const MAX_TOKEN_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenType {
    Extension = 0,
    Tag = 1,
    Dtag = 2,
    Attr = 3,
    Dattr = 4,
    Blob = 5,
    Udata = 6,
    Close = 7,
}

impl TokenType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Extension,
            1 => Self::Tag,
            2 => Self::Dtag,
            3 => Self::Attr,
            4 => Self::Dattr,
            5 => Self::Blob,
            6 => Self::Udata,
            7 => Self::Close,
            _ => return None,
        })
    }

    /// Critical structural tags (name, content, signature) must not be
    /// silently dropped if unrecognized; this mirrors ccnb's convention of
    /// treating `Tag`/`Dtag` elements as semantically load-bearing while
    /// `Attr`/`Dattr` annotations may be skipped.
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Tag | Self::Dtag)
    }
}

/// Writes a single token header `(value, type)` into `out`.
pub fn encode_header(value: u64, typ: TokenType, out: &mut BytesMut) {
    let mut continuation_groups = Vec::new();
    let mut rem = value >> 4;
    while rem > 0 {
        continuation_groups.push((rem & 0x7F) as u8);
        rem >>= 7;
    }
    for g in continuation_groups.iter().rev() {
        out.put_u8(g | 0x80);
    }
    let terminal_low4 = (value & 0x0F) as u8;
    out.put_u8((terminal_low4 << 3) | (typ as u8));
}

/// Reads a single token header, advancing `pos`. Returns `(value, type)`.
pub fn decode_header(buf: &[u8], pos: &mut usize) -> Result<(u64, TokenType), WireError> {
    let mut value: u64 = 0;
    loop {
        let byte = *buf.get(*pos).ok_or(WireError::Incomplete)?;
        *pos += 1;
        if byte & 0x80 != 0 {
            value = value
                .checked_shl(7)
                .ok_or(WireError::LengthOverflow(usize::MAX))?
                | (byte & 0x7F) as u64;
        } else {
            let typ = TokenType::from_u8(byte & 0x07)
                .expect("3-bit field always maps to a TokenType variant");
            value = (value << 4) | ((byte >> 3) as u64);
            return Ok((value, typ));
        }
    }
}

/// Writes a `Dtag` open token for the given predefined tag code.
pub fn start_dtag(tag: u64, out: &mut BytesMut) {
    encode_header(tag, TokenType::Dtag, out);
}

/// Writes a `Close` token, ending the innermost open tagged element.
pub fn end_tag(out: &mut BytesMut) {
    encode_header(0, TokenType::Close, out);
}

/// Writes a length-prefixed binary blob.
pub fn write_blob(bytes: &[u8], out: &mut BytesMut) {
    encode_header(bytes.len() as u64, TokenType::Blob, out);
    out.put_slice(bytes);
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_udata(s: &str, out: &mut BytesMut) {
    encode_header(s.len() as u64, TokenType::Udata, out);
    out.put_slice(s.as_bytes());
}

/// Convenience: a `Dtag`-wrapped blob, e.g. `<Nonce>...</Nonce>`.
pub fn write_tagged_blob(tag: u64, bytes: &[u8], out: &mut BytesMut) {
    start_dtag(tag, out);
    write_blob(bytes, out);
    end_tag(out);
}

/// Convenience: a `Dtag`-wrapped string, e.g. `<Action>register</Action>`.
pub fn write_tagged_udata(tag: u64, s: &str, out: &mut BytesMut) {
    start_dtag(tag, out);
    write_udata(s, out);
    end_tag(out);
}

/// A cursor over a ccnb byte stream offering the structured reads the
/// packet layer needs; it never allocates beyond the `Bytes` slices it
/// returns.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Peeks the next header without consuming it.
    pub fn peek_header(&self) -> Result<(u64, TokenType), WireError> {
        let mut p = self.pos;
        decode_header(self.buf, &mut p)
    }

    /// Expects and consumes a `Dtag` open token for exactly `tag`.
    pub fn expect_dtag(&mut self, tag: u64) -> Result<(), WireError> {
        let (value, typ) = decode_header(self.buf, &mut self.pos)?;
        if typ != TokenType::Dtag || value != tag {
            return Err(WireError::UnknownCriticalTag(tag));
        }
        Ok(())
    }

    /// `true` and consumes the open token if the next element is `Dtag(tag)`.
    pub fn try_dtag(&mut self, tag: u64) -> Result<bool, WireError> {
        if self.at_end() {
            return Ok(false);
        }
        let (value, typ) = self.peek_header()?;
        if typ == TokenType::Dtag && value == tag {
            self.expect_dtag(tag)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// `true` if the next element is `Dtag(tag)`, without consuming it.
    pub fn peek_dtag(&self, tag: u64) -> Result<bool, WireError> {
        if self.at_end() {
            return Ok(false);
        }
        let (value, typ) = self.peek_header()?;
        Ok(typ == TokenType::Dtag && value == tag)
    }

    /// Consumes a `Close` token.
    pub fn expect_close(&mut self) -> Result<(), WireError> {
        let (value, typ) = decode_header(self.buf, &mut self.pos)?;
        if typ != TokenType::Close || value != 0 {
            return Err(WireError::Malformed("expected close token".into()));
        }
        Ok(())
    }

    /// Reads a `Blob` token's payload.
    pub fn read_blob(&mut self) -> Result<Bytes, WireError> {
        let (len, typ) = decode_header(self.buf, &mut self.pos)?;
        if typ != TokenType::Blob {
            return Err(WireError::Malformed("expected blob token".into()));
        }
        self.take(len as usize)
    }

    /// Reads a `Udata` token's payload as a UTF-8 string.
    pub fn read_udata(&mut self) -> Result<String, WireError> {
        let (len, typ) = decode_header(self.buf, &mut self.pos)?;
        if typ != TokenType::Udata {
            return Err(WireError::Malformed("expected udata token".into()));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| WireError::Malformed(format!("non-utf8 udata: {e}")))
    }

    /// Reads `<tag>Blob</tag>`.
    pub fn read_tagged_blob(&mut self, tag: u64) -> Result<Bytes, WireError> {
        self.expect_dtag(tag)?;
        let value = self.read_blob()?;
        self.expect_close()?;
        Ok(value)
    }

    /// Reads `<tag>Blob</tag>` if present.
    pub fn try_tagged_blob(&mut self, tag: u64) -> Result<Option<Bytes>, WireError> {
        if self.try_dtag(tag)? {
            let value = self.read_blob()?;
            self.expect_close()?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Reads `<tag>Udata</tag>` if present.
    pub fn try_tagged_udata(&mut self, tag: u64) -> Result<Option<String>, WireError> {
        if self.try_dtag(tag)? {
            let value = self.read_udata()?;
            self.expect_close()?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    fn take(&mut self, len: usize) -> Result<Bytes, WireError> {
        if len > MAX_TOKEN_LEN {
            return Err(WireError::LengthOverflow(len));
        }
        if self.remaining() < len {
            return Err(WireError::Incomplete);
        }
        let out = Bytes::copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;
        Ok(out)
    }

    /// Skips one full element (token + nested content if a tag) — used to
    /// discard a non-critical unknown tag without failing the parse.
    pub fn skip_element(&mut self) -> Result<(), WireError> {
        let (value, typ) = decode_header(self.buf, &mut self.pos)?;
        match typ {
            TokenType::Blob | TokenType::Udata => {
                self.take(value as usize)?;
            }
            TokenType::Tag | TokenType::Dtag => loop {
                if self.at_end() {
                    return Err(WireError::Incomplete);
                }
                let (peek_value, peek_typ) = self.peek_header()?;
                if peek_typ == TokenType::Close && peek_value == 0 {
                    self.expect_close()?;
                    break;
                }
                self.skip_element()?;
            },
            TokenType::Close => {}
            TokenType::Attr | TokenType::Dattr | TokenType::Extension => {
                // attribute-like tokens carry an inline value, not a nested block
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: u64, typ: TokenType) {
        let mut buf = BytesMut::new();
        encode_header(value, typ, &mut buf);
        let mut pos = 0;
        let (decoded_value, decoded_typ) = decode_header(&buf, &mut pos).unwrap();
        assert_eq!(decoded_value, value);
        assert_eq!(decoded_typ, typ);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn header_round_trips_across_continuation_boundaries() {
        for &v in &[0, 1, 15, 16, 127, 128, 4095, 4096, 1 << 20, u32::MAX as u64] {
            round_trip(v, TokenType::Dtag);
        }
        round_trip(0, TokenType::Close);
    }

    #[test]
    fn tagged_blob_round_trips() {
        let mut buf = BytesMut::new();
        write_tagged_blob(42, b"hello", &mut buf);
        let mut cur = Cursor::new(&buf);
        let value = cur.read_tagged_blob(42).unwrap();
        assert_eq!(&value[..], b"hello");
        assert!(cur.at_end());
    }

    #[test]
    fn truncated_input_is_incomplete_not_malformed() {
        let mut buf = BytesMut::new();
        write_tagged_blob(1, b"abcdef", &mut buf);
        let truncated = &buf[..buf.len() - 2];
        let mut cur = Cursor::new(truncated);
        let err = cur.read_tagged_blob(1).unwrap_err();
        assert_eq!(err, WireError::Incomplete);
    }

    #[test]
    fn skip_element_discards_nested_unknown_tag() {
        let mut inner = BytesMut::new();
        write_tagged_blob(99, b"nested", &mut inner);
        let mut buf = BytesMut::new();
        start_dtag(7, &mut buf);
        buf.extend_from_slice(&inner);
        end_tag(&mut buf);
        write_tagged_blob(2, b"after", &mut buf);

        let mut cur = Cursor::new(&buf);
        cur.skip_element().unwrap();
        let value = cur.read_tagged_blob(2).unwrap();
        assert_eq!(&value[..], b"after");
    }
}
