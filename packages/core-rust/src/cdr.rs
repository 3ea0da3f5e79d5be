//! CDR encapsulation marshalling.
//!
//! Implements the subset of the CORBA Common Data Representation needed to
//! carry transaction policies and propagation contexts inside service
//! contexts and tagged IOR components.
//!
//! # Wire format
//!
//! An encapsulation is an octet stream whose first octet is the byte-order
//! flag (`0` big endian, `1` little endian). Primitives are aligned on their
//! natural boundary, measured from the first octet of the encapsulation
//! (the flag itself sits at offset 0). Strings are a `ulong` length that
//! includes the trailing NUL, followed by the bytes and the NUL. Sequences
//! are a `ulong` element count followed by the elements.
//!
//! The writer always produces big-endian encapsulations; the reader accepts
//! both byte orders.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::CodecError;

/// Byte-order flag for big-endian encapsulations.
pub const BIG_ENDIAN: u8 = 0;

/// Byte-order flag for little-endian encapsulations.
pub const LITTLE_ENDIAN: u8 = 1;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A type with a CDR wire representation.
pub trait CdrEncode {
    /// Appends the CDR representation of `self` to the writer.
    fn encode(&self, w: &mut CdrWriter);
}

/// A type that can be read back from a CDR stream.
pub trait CdrDecode: Sized {
    /// Reads one value from the stream.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FormatMismatch`] if the stream is truncated or
    /// holds octets that are not a valid encoding of `Self`.
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError>;
}

/// Encodes a value as a complete big-endian CDR encapsulation.
#[must_use]
pub fn to_encapsulation<T: CdrEncode + ?Sized>(value: &T) -> Vec<u8> {
    let mut w = CdrWriter::new();
    value.encode(&mut w);
    w.into_bytes()
}

/// Decodes a value from a complete CDR encapsulation.
///
/// Trailing octets after the value are tolerated, as peers may pad
/// encapsulations to a 4-byte boundary.
///
/// # Errors
///
/// Returns [`CodecError::FormatMismatch`] for an empty buffer, an unknown
/// byte-order flag or a malformed body.
pub fn from_encapsulation<T: CdrDecode>(data: &[u8]) -> Result<T, CodecError> {
    let mut r = CdrReader::new(data)?;
    T::decode(&mut r)
}

// ---------------------------------------------------------------------------
// CdrWriter
// ---------------------------------------------------------------------------

/// Big-endian CDR encapsulation writer.
#[derive(Debug)]
pub struct CdrWriter {
    buf: BytesMut,
}

impl CdrWriter {
    /// Starts a new encapsulation (the byte-order flag is written immediately).
    #[must_use]
    pub fn new() -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(BIG_ENDIAN);
        Self { buf }
    }

    fn align(&mut self, boundary: usize) {
        let pad = (boundary - self.buf.len() % boundary) % boundary;
        self.buf.put_bytes(0, pad);
    }

    pub fn write_octet(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_boolean(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn write_short(&mut self, v: i16) {
        self.align(2);
        self.buf.put_i16(v);
    }

    pub fn write_ushort(&mut self, v: u16) {
        self.align(2);
        self.buf.put_u16(v);
    }

    pub fn write_long(&mut self, v: i32) {
        self.align(4);
        self.buf.put_i32(v);
    }

    pub fn write_ulong(&mut self, v: u32) {
        self.align(4);
        self.buf.put_u32(v);
    }

    pub fn write_longlong(&mut self, v: i64) {
        self.align(8);
        self.buf.put_i64(v);
    }

    /// Writes a CDR string: length (including NUL), bytes, NUL.
    pub fn write_string(&mut self, v: &str) {
        self.write_length(v.len() + 1);
        self.buf.put_slice(v.as_bytes());
        self.buf.put_u8(0);
    }

    /// Writes a `sequence<octet>`.
    pub fn write_octet_seq(&mut self, v: &[u8]) {
        self.write_length(v.len());
        self.buf.put_slice(v);
    }

    /// Writes a sequence of encodable elements.
    pub fn write_seq<T: CdrEncode>(&mut self, items: &[T]) {
        self.write_length(items.len());
        for item in items {
            item.encode(self);
        }
    }

    fn write_length(&mut self, len: usize) {
        // Lengths beyond u32 cannot be represented in CDR; callers never
        // build values that large.
        #[allow(clippy::cast_possible_truncation)]
        self.write_ulong(len as u32);
    }

    /// Number of octets written so far, including the byte-order flag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always `false`: the byte-order flag is written on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finishes the encapsulation.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

impl Default for CdrWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// CdrReader
// ---------------------------------------------------------------------------

/// CDR encapsulation reader honouring the encapsulation's byte-order flag.
#[derive(Debug)]
pub struct CdrReader<'a> {
    data: &'a [u8],
    total: usize,
    little_endian: bool,
}

impl<'a> CdrReader<'a> {
    /// Opens an encapsulation, consuming its byte-order flag.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FormatMismatch`] if the buffer is empty or the
    /// flag is neither `0` nor `1`.
    pub fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        let total = data.len();
        let mut data = data;
        if !data.has_remaining() {
            return Err(CodecError::format("empty encapsulation"));
        }
        let little_endian = match data.get_u8() {
            BIG_ENDIAN => false,
            LITTLE_ENDIAN => true,
            other => {
                return Err(CodecError::format(format!("invalid byte-order flag {other}")));
            }
        };
        Ok(Self {
            data,
            total,
            little_endian,
        })
    }

    /// Offset of the next octet, measured from the byte-order flag.
    #[must_use]
    pub fn position(&self) -> usize {
        self.total - self.data.len()
    }

    /// Octets left in the stream.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn align(&mut self, boundary: usize) -> Result<(), CodecError> {
        let pad = (boundary - self.position() % boundary) % boundary;
        self.need(pad)?;
        self.data.advance(pad);
        Ok(())
    }

    fn need(&self, n: usize) -> Result<(), CodecError> {
        if self.data.len() < n {
            return Err(CodecError::format(format!(
                "truncated stream: need {n} octets at offset {}, have {}",
                self.position(),
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn read_octet(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        Ok(self.data.get_u8())
    }

    pub fn read_boolean(&mut self) -> Result<bool, CodecError> {
        match self.read_octet()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::format(format!("invalid boolean octet {other}"))),
        }
    }

    pub fn read_short(&mut self) -> Result<i16, CodecError> {
        self.align(2)?;
        self.need(2)?;
        Ok(if self.little_endian {
            self.data.get_i16_le()
        } else {
            self.data.get_i16()
        })
    }

    pub fn read_ushort(&mut self) -> Result<u16, CodecError> {
        self.align(2)?;
        self.need(2)?;
        Ok(if self.little_endian {
            self.data.get_u16_le()
        } else {
            self.data.get_u16()
        })
    }

    pub fn read_long(&mut self) -> Result<i32, CodecError> {
        self.align(4)?;
        self.need(4)?;
        Ok(if self.little_endian {
            self.data.get_i32_le()
        } else {
            self.data.get_i32()
        })
    }

    pub fn read_ulong(&mut self) -> Result<u32, CodecError> {
        self.align(4)?;
        self.need(4)?;
        Ok(if self.little_endian {
            self.data.get_u32_le()
        } else {
            self.data.get_u32()
        })
    }

    pub fn read_longlong(&mut self) -> Result<i64, CodecError> {
        self.align(8)?;
        self.need(8)?;
        Ok(if self.little_endian {
            self.data.get_i64_le()
        } else {
            self.data.get_i64()
        })
    }

    /// Reads a CDR string. A zero length is accepted as the empty string,
    /// which some ORBs emit for empty repository ids.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_length()?;
        if len == 0 {
            return Ok(String::new());
        }
        self.need(len)?;
        let raw = &self.data[..len];
        let (body, nul) = raw.split_at(len - 1);
        if nul != [0] {
            return Err(CodecError::format("string is not NUL-terminated"));
        }
        let s = std::str::from_utf8(body)
            .map_err(|e| CodecError::format(format!("string is not UTF-8: {e}")))?
            .to_owned();
        self.data.advance(len);
        Ok(s)
    }

    /// Reads a `sequence<octet>`.
    pub fn read_octet_seq(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_length()?;
        self.need(len)?;
        let out = self.data[..len].to_vec();
        self.data.advance(len);
        Ok(out)
    }

    /// Reads a sequence of decodable elements.
    pub fn read_seq<T: CdrDecode>(&mut self) -> Result<Vec<T>, CodecError> {
        let len = self.read_length()?;
        // Every element occupies at least one octet, so a count larger than
        // what is left can only come from a corrupt stream.
        if len > self.remaining() {
            return Err(CodecError::format(format!(
                "sequence length {len} exceeds remaining {} octets",
                self.remaining()
            )));
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    fn read_length(&mut self) -> Result<usize, CodecError> {
        let len = self.read_ulong()?;
        usize::try_from(len).map_err(|_| CodecError::format("length overflows usize"))
    }
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

impl CdrEncode for i16 {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_short(*self);
    }
}

impl CdrDecode for i16 {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        r.read_short()
    }
}

impl CdrEncode for i32 {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_long(*self);
    }
}

impl CdrDecode for i32 {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        r.read_long()
    }
}

impl CdrEncode for u32 {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_ulong(*self);
    }
}

impl CdrDecode for u32 {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        r.read_ulong()
    }
}

impl CdrEncode for bool {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_boolean(*self);
    }
}

impl CdrDecode for bool {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        r.read_boolean()
    }
}

impl CdrEncode for str {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_string(self);
    }
}

impl CdrEncode for String {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_string(self);
    }
}

impl CdrDecode for String {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        r.read_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
