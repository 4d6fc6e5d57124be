//! # Fleetpack
//!
//! A small, position-based binary buffer used for every rpc payload that
//! crosses a node boundary.
//!
//! ## Philosophy
//!
//! - **Untagged**: The buffer stores raw values in write order. Readers must know
//!   what comes next; self-description is the job of the layer above.
//! - **Bounded**: Every read is bounds checked. Arbitrary input yields an `Error`,
//!   never a panic.
//! - **Cheap Views**: Readers are backed by `bytes::Bytes`, nested buffers are
//!   zero-copy slices of their parent.
//!
//! ## Format
//!
//! - **Scalars**: fixed width, Big-Endian.
//! - **Blobs**: `[Len: i32][Data: Len]`
//! - **Nullable**: `[Present: bool][Value?]`
//! - **Unique ids**: 16 raw bytes.

use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use uuid::Uuid;


/// Buffer read and write failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A read needed more bytes than remain.
    #[error("buffer exhausted: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },
    /// A length prefix was negative.
    #[error("negative length prefix: {0}")]
    NegativeLength(i32),
    /// Blob length does not fit the `i32` length prefix.
    #[error("blob of {0} bytes exceeds the length prefix")]
    BlobTooLarge(usize),
    /// A string payload failed UTF-8 validation.
    #[error("string data is not valid utf-8")]
    InvalidUtf8,
    /// Char value is not a unicode scalar.
    #[error("invalid char scalar {0:#x}")]
    InvalidChar(u32),
}

/// Specialized `Result` for buffer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A growable write buffer.
///
/// Fixed-width writes cannot fail and return `&mut Self` for chaining.
/// Blob writes fail only when the payload exceeds `i32::MAX` bytes.
#[derive(Debug, Clone, Default)]
pub struct DataBuf {
    buf: BytesMut,
}

impl DataBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Creates an empty buffer that can hold `capacity` bytes without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns a view of the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Freezes the buffer into immutable bytes.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Freezes the buffer and opens a reader at position zero.
    pub fn into_reader(self) -> DataBufReader {
        DataBufReader::new(self.freeze())
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self { self.buf.put_u8(v as u8); self }
    pub fn write_u8(&mut self, v: u8) -> &mut Self { self.buf.put_u8(v); self }
    pub fn write_byte(&mut self, v: i8) -> &mut Self { self.buf.put_i8(v); self }
    pub fn write_short(&mut self, v: i16) -> &mut Self { self.buf.put_i16(v); self }
    pub fn write_int(&mut self, v: i32) -> &mut Self { self.buf.put_i32(v); self }
    pub fn write_long(&mut self, v: i64) -> &mut Self { self.buf.put_i64(v); self }
    pub fn write_float(&mut self, v: f32) -> &mut Self { self.buf.put_f32(v); self }
    pub fn write_double(&mut self, v: f64) -> &mut Self { self.buf.put_f64(v); self }

    /// Writes a char as its `u32` scalar value.
    pub fn write_char(&mut self, v: char) -> &mut Self { self.buf.put_u32(v as u32); self }

    /// Writes a unique id as 16 raw bytes.
    pub fn write_unique_id(&mut self, v: Uuid) -> &mut Self {
        self.buf.put_slice(v.as_bytes());
        self
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, v: &str) -> Result<&mut Self> {
        self.write_bytes(v.as_bytes())
    }

    /// Writes a length-prefixed byte blob.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<&mut Self> {
        let len = i32::try_from(v.len()).map_err(|_| Error::BlobTooLarge(v.len()))?;
        self.buf.reserve(4 + v.len());
        self.buf.put_i32(len);
        self.buf.put_slice(v);
        Ok(self)
    }

    /// Writes another buffer as a nested blob.
    pub fn write_data_buf(&mut self, other: &DataBuf) -> Result<&mut Self> {
        self.write_bytes(other.as_slice())
    }

    /// Writes a presence flag, then the value through `write` when present.
    pub fn write_nullable<T>(
        &mut self,
        v: Option<T>,
        write: impl FnOnce(&mut Self, T) -> Result<()>,
    ) -> Result<&mut Self> {
        match v {
            Some(inner) => {
                self.write_bool(true);
                write(self, inner)?;
            }
            None => {
                self.write_bool(false);
            }
        }
        Ok(self)
    }
}

impl From<DataBuf> for Bytes {
    fn from(buf: DataBuf) -> Self {
        buf.freeze()
    }
}

/// A bounds-checked read cursor over immutable bytes.
///
/// Reading advances the cursor. A transaction marks the current position so
/// that a caller can peek ahead and rewind.
#[derive(Debug, Clone)]
pub struct DataBufReader {
    buf: Bytes,
    pos: usize,
    mark: Option<usize>,
}

impl DataBufReader {
    /// Opens a reader at the start of `buf`.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into(), pos: 0, mark: None }
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn readable_bytes(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Marks the current position for a later `redo_transaction`.
    pub fn start_transaction(&mut self) -> &mut Self {
        self.mark = Some(self.pos);
        self
    }

    /// Rewinds the cursor to the last mark. A reader without a mark is unchanged.
    pub fn redo_transaction(&mut self) -> &mut Self {
        if let Some(mark) = self.mark.take() {
            self.pos = mark;
        }
        self
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let remaining = self.readable_bytes();
        if n > remaining {
            return Err(Error::UnexpectedEnd { needed: n, remaining });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    pub fn read_bool(&mut self) -> Result<bool> { Ok(self.take(1)?[0] != 0) }
    pub fn read_u8(&mut self) -> Result<u8> { Ok(self.take(1)?[0]) }
    pub fn read_byte(&mut self) -> Result<i8> { Ok(self.take(1)?.get_i8()) }
    pub fn read_short(&mut self) -> Result<i16> { Ok(self.take(2)?.get_i16()) }
    pub fn read_int(&mut self) -> Result<i32> { Ok(self.take(4)?.get_i32()) }
    pub fn read_long(&mut self) -> Result<i64> { Ok(self.take(8)?.get_i64()) }
    pub fn read_float(&mut self) -> Result<f32> { Ok(self.take(4)?.get_f32()) }
    pub fn read_double(&mut self) -> Result<f64> { Ok(self.take(8)?.get_f64()) }

    /// Reads a char from its `u32` scalar value.
    pub fn read_char(&mut self) -> Result<char> {
        let raw = self.take(4)?.get_u32();
        char::from_u32(raw).ok_or(Error::InvalidChar(raw))
    }

    /// Reads a 16 byte unique id.
    pub fn read_unique_id(&mut self) -> Result<Uuid> {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(self.take(16)?);
        Ok(Uuid::from_bytes(raw))
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_int()?;
        usize::try_from(len).map_err(|_| Error::NegativeLength(len))
    }

    /// Reads a length-prefixed byte blob, zero-copy.
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_len()?;
        let remaining = self.readable_bytes();
        if len > remaining {
            return Err(Error::UnexpectedEnd { needed: len, remaining });
        }
        let out = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| Error::InvalidUtf8)
    }

    /// Reads a nested blob as its own reader.
    pub fn read_data_buf(&mut self) -> Result<DataBufReader> {
        Ok(DataBufReader::new(self.read_bytes()?))
    }

    /// Reads a presence flag, then the value through `read` when present.
    pub fn read_nullable<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.read_bool()? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }

    /// Returns the unread remainder without advancing.
    pub fn remaining_bytes(&self) -> Bytes {
        self.buf.slice(self.pos..)
    }
}

impl From<DataBuf> for DataBufReader {
    fn from(buf: DataBuf) -> Self {
        buf.into_reader()
    }
}

impl From<Vec<u8>> for DataBufReader {
    fn from(buf: Vec<u8>) -> Self {
        Self::new(buf)
    }
}
