//! Byte cursor primitives shared by the MessagePack encoder and decoder.
//!
//! * [`SerWrite`] is the append-only sink the encoder writes into,
//! * [`SliceWriter`] is a write cursor over a buffer that was sized up front,
//! * [`SliceReader`] is a read cursor over a fully materialized input.
//!
//! All multi-byte integers are big-endian. Reads borrow from the input, they
//! never copy.
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "std")]
extern crate std;

#[cfg(all(feature = "alloc",not(feature = "std")))]
extern crate alloc;

use core::fmt;

mod foreign;

pub type CursorResult<T> = Result<T, CursorError>;

/// An error returned by [`SerWrite`] and [`SliceReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CursorError {
    /// Buffer is full
    BufferFull,
    /// Reading `needed` bytes at `offset` would run past the end of input
    Truncated {
        offset: usize,
        needed: usize,
    },
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::BufferFull => f.write_str("buffer is full"),
            CursorError::Truncated { offset, needed } => {
                write!(f, "input truncated: {} byte(s) needed at offset {}", needed, offset)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CursorError {}

/// Serializers should write data to the implementations of this trait.
pub trait SerWrite {
    /// Write all bytes from `buf` to the internal buffer.
    ///
    /// When over capacity return `Err(CursorError::BufferFull)`.
    fn write(&mut self, buf: &[u8]) -> CursorResult<()>;
    /// Write a single `byte` to the internal buffer.
    ///
    /// When over capacity return `Err(CursorError::BufferFull)`.
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        self.write(core::slice::from_ref(&byte))
    }
    /// Write a string to the internal buffer.
    ///
    /// When over capacity return `Err(CursorError::BufferFull)`.
    #[inline]
    fn write_str(&mut self, s: &str) -> CursorResult<()> {
        self.write(s.as_bytes())
    }
    /// Hint that exactly `additional` more bytes are about to be written.
    ///
    /// Growable writers allocate once here; fixed buffers ignore it.
    #[inline]
    fn reserve(&mut self, _additional: usize) {}
}

impl<T: SerWrite> SerWrite for &'_ mut T {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        (*self).write(buf)
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        (*self).write_byte(byte)
    }
    #[inline]
    fn reserve(&mut self, additional: usize) {
        (*self).reserve(additional)
    }
}

/// A write cursor over a pre-sized slice.
///
/// `len` is the write offset: everything before it has been written.
#[derive(Debug, PartialEq)]
pub struct SliceWriter<'a> {
    pub buf: &'a mut [u8],
    pub len: usize
}

impl<'a> AsRef<[u8]> for SliceWriter<'a> {
    /// Returns a populated portion of the slice
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl<'a> AsMut<[u8]> for SliceWriter<'a> {
    /// Returns a populated portion of the slice
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }
}

impl<'a> SliceWriter<'a> {
    /// Create new instance
    pub fn new(buf: &'a mut [u8]) -> Self {
        SliceWriter { buf, len: 0 }
    }
    /// Return populated length, which is also the current write offset
    pub fn len(&self) -> usize {
        self.len
    }
    /// Return `true` if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    /// Return total capacity
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
    /// Return remaining capacity
    pub fn rem_capacity(&self) -> usize {
        self.buf.len() - self.len
    }
    /// Split the underlying buffer and return the portion of the populated buffer
    /// with an underlying buffer's borrowed lifetime.
    ///
    /// Once a SliceWriter is dropped the slice stays borrowed as long as an original container lives.
    pub fn split(self) -> (&'a mut[u8], Self) {
        let (res, buf) = self.buf.split_at_mut(self.len);
        (res, Self { buf, len: 0 })
    }
    /// Destruct into an underlying buffer
    pub fn into_buf(self) -> &'a mut [u8] {
        self.buf
    }
}

impl SerWrite for SliceWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        let end = self.len + buf.len();
        match self.buf.get_mut(self.len..end) {
            Some(chunk) => {
                chunk.copy_from_slice(buf);
                self.len = end;
                Ok(())
            }
            None => Err(CursorError::BufferFull)
        }
    }
}

/// A read cursor over a fully materialized input.
///
/// Every read either returns a value borrowed from the input and advances
/// the offset, or fails with [`CursorError::Truncated`] leaving the offset
/// untouched.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    input: &'a [u8],
    offset: usize,
}

macro_rules! impl_read_be {
    ($($name:ident -> $ty:ty),* $(,)?) => {$(
        #[doc = concat!("Read a big-endian `", stringify!($ty), "`.")]
        #[inline]
        pub fn $name(&mut self) -> CursorResult<$ty> {
            Ok(<$ty>::from_be_bytes(*self.read_array()?))
        }
    )*};
}

impl<'a> SliceReader<'a> {
    /// Create a reader positioned at the beginning of `input`.
    pub fn new(input: &'a [u8]) -> Self {
        SliceReader { input, offset: 0 }
    }
    /// Current read offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// The whole underlying input.
    #[inline]
    pub fn input(&self) -> &'a [u8] {
        self.input
    }
    /// Return the number of unread bytes.
    #[inline]
    pub fn remaining_len(&self) -> usize {
        self.input.len().saturating_sub(self.offset)
    }
    /// Return the unread portion of the input.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.offset..).unwrap_or_default()
    }
    /// Look at the next byte without consuming it.
    #[inline]
    pub fn peek(&self) -> CursorResult<u8> {
        self.input.get(self.offset).copied()
        .ok_or(CursorError::Truncated { offset: self.offset, needed: 1 })
    }
    /// Consume `len` bytes and return them borrowed from the input.
    pub fn read_slice(&mut self, len: usize) -> CursorResult<&'a [u8]> {
        let truncated = CursorError::Truncated { offset: self.offset, needed: len };
        let end = self.offset.checked_add(len).ok_or(truncated)?;
        let res = self.input.get(self.offset..end).ok_or(truncated)?;
        self.offset = end;
        Ok(res)
    }
    /// Consume exactly `N` bytes.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> CursorResult<&'a [u8; N]> {
        let offset = self.offset;
        let chunk = self.read_slice(N)?;
        chunk.try_into().map_err(|_| CursorError::Truncated { offset, needed: N })
    }
    /// Consume a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> CursorResult<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        Ok(byte)
    }
    /// Advance the offset by `len` bytes, failing if that leaves the input.
    pub fn skip(&mut self, len: usize) -> CursorResult<()> {
        self.read_slice(len).map(|_| ())
    }

    impl_read_be! {
        read_i8 -> i8,
        read_u16 -> u16,
        read_i16 -> i16,
        read_u32 -> u32,
        read_i32 -> i32,
        read_u64 -> u64,
        read_i64 -> i64,
        read_f32 -> f32,
        read_f64 -> f64,
    }
}
