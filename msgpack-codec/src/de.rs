//! MessagePack serde deserializer

use core::num::NonZeroUsize;
use serde::de::{self, Visitor, SeqAccess, MapAccess, DeserializeSeed};

use msgpack_cursor::SliceReader;

use crate::error::{Error, Kind, Result};
use crate::ext::{self, Extension, EXT_TOKEN};
use crate::magick::*;

/// Deserialize an instance of type `T` from a slice of bytes in a MessagePack format.
///
/// Return a tuple with `(value, msgpack_len)`. `msgpack_len` <= `input.len()`.
///
/// Any `&str` or `&[u8]` in the returned type will contain references to the provided slice.
pub fn from_slice<'a, T>(input: &'a[u8]) -> Result<(T, usize)>
    where T: de::Deserialize<'a>
{
    let mut de = Deserializer::from_slice(input);
    let value = de::Deserialize::deserialize(&mut de)?;
    let tail_len = de.end()?;

    Ok((value, input.len() - tail_len))
}

/// Deserialize an instance of type `T` from a slice of bytes in a MessagePack format.
///
/// Return a tuple with `(value, tail)`, where `tail` is the tail of the input beginning
/// at the byte following the last byte of the serialized data.
///
/// Any `&str` or `&[u8]` in the returned type will contain references to the provided slice.
pub fn from_slice_split_tail<'a, T>(input: &'a[u8]) -> Result<(T, &'a[u8])>
    where T: de::Deserialize<'a>
{
    let (value, len) = from_slice(input)?;
    Ok((value, &input[len..]))
}

/// Serde MessagePack deserializer.
///
/// * deserializes data from a slice,
/// * deserializes borrowed references to `&str` and `&[u8]` types,
/// * deserializes structs from MessagePack maps or arrays.
/// * deserializes enum variants and struct fields from MessagePack strings or integers.
/// * deserializes integers from any MessagePack integer type as long as the number can be casted safely
/// * deserializes floats from any MessagePack integer or float types
/// * deserializes `nil` as an empty string, empty bytes, a zero number or an empty collection
/// * deserializes registered [`Extension`] types from `fixext` and `ext` envelopes
///
/// Errors report the input offset at which they were detected.
///
/// Arrays, maps and enum variants may nest at most [`MAX_DEPTH`] levels
/// deep, deeper input fails with `Err(Error::DepthLimitExceeded)`.
pub struct Deserializer<'de> {
    reader: SliceReader<'de>,
    depth: usize,
}

/// Default nesting limit of a [`Deserializer`].
pub const MAX_DEPTH: usize = 256;

enum MsgType {
    Single(usize),
    Array(usize),
    Map(usize),
}

/// Some methods in a `Deserializer` object are made public to allow custom
/// manipulation of MessagePack encoded data for other purposes than simply
/// deserializing.
///
/// For example, splitting a stream of messages encoded with the MessagePack
/// format without fully decoding messages.
impl<'de> Deserializer<'de> {
    /// Create a new decoder instance by providing a slice from which to
    /// deserialize messages.
    pub fn from_slice(input: &'de[u8]) -> Self {
        Deserializer { reader: SliceReader::new(input), depth: MAX_DEPTH }
    }
    /// Set how many levels of arrays, maps and enum variants may nest.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.depth = max_depth;
        self
    }
    /// Consume [`Deserializer`] and return the number of unparsed bytes in
    /// the input slice on success.
    pub fn end(self) -> Result<usize> {
        Ok(self.reader.remaining_len())
    }
    /// Return the current input offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.reader.offset()
    }
    /// Return the remaining number of unparsed bytes in the input slice.
    #[inline]
    pub fn remaining_len(&self) -> usize {
        self.reader.remaining_len()
    }
    /// Return the unparsed portion of the input slice.
    #[inline]
    pub fn remaining(&self) -> &'de[u8] {
        self.reader.remaining()
    }
    /// Peek at the next byte code and return it on success, otherwise return
    /// `Err(Error::TruncatedInput)` if there are no more unparsed bytes
    /// remaining in the input slice.
    #[inline]
    pub fn peek(&self) -> Result<u8> {
        Ok(self.reader.peek()?)
    }
    /// Fetch the next byte from input or return an `Err::TruncatedInput` error.
    #[inline]
    pub fn fetch(&mut self) -> Result<u8> {
        Ok(self.reader.read_u8()?)
    }
    /// Advance the input cursor by `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        Ok(self.reader.skip(len)?)
    }
    /// Consume `len` bytes and return them with the lifetime of the original
    /// slice container.
    ///
    /// The returned slice can be passed to `visit_borrowed_*` functions of a [`Visitor`].
    pub fn split_input(&mut self, len: usize) -> Result<&'de[u8]> {
        Ok(self.reader.read_slice(len)?)
    }

    /// An error for the format `code` just fetched.
    fn unexpected(&self, code: u8, kind: Kind) -> Error {
        Error::UnexpectedFormatCode { code, offset: self.offset().saturating_sub(1), kind }
    }

    /// Run `f` one nesting level deeper, for a container whose code is at `offset`.
    fn nested<R>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.depth = self.depth.checked_sub(1).ok_or(Error::DepthLimitExceeded { offset })?;
        let res = f(self);
        self.depth += 1;
        res
    }

    fn fetch_len8(&mut self) -> Result<usize> {
        Ok(self.reader.read_u8()?.into())
    }

    fn fetch_len16(&mut self) -> Result<usize> {
        Ok(self.reader.read_u16()?.into())
    }

    fn fetch_len32(&mut self) -> Result<usize> {
        Ok(self.reader.read_u32()?.try_into()?)
    }

    fn parse_str(&mut self) -> Result<&'de str> {
        let len: usize = match self.fetch()? {
            c@(FIXSTR..=FIXSTR_MAX) => (c as usize) & MAX_FIXSTR_SIZE,
            STR_8 => self.fetch_len8()?,
            STR_16 => self.fetch_len16()?,
            STR_32 => self.fetch_len32()?,
            NIL => return Ok(""),
            c => return Err(self.unexpected(c, Kind::Str))
        };
        let offset = self.offset();
        core::str::from_utf8(self.split_input(len)?)
        .map_err(|_| Error::InvalidUtf8 { offset })
    }

    fn parse_bytes(&mut self) -> Result<&'de[u8]> {
        let len: usize = match self.fetch()? {
            BIN_8|STR_8 => self.fetch_len8()?,
            BIN_16|STR_16 => self.fetch_len16()?,
            BIN_32|STR_32 => self.fetch_len32()?,
            c@(FIXSTR..=FIXSTR_MAX) => (c as usize) & MAX_FIXSTR_SIZE,
            NIL => return Ok(&[]),
            c => return Err(self.unexpected(c, Kind::Bin))
        };
        self.split_input(len)
    }

    fn parse_integer<N>(&mut self) -> Result<N>
        where N: TryFrom<i8> + TryFrom<u8> +
                 TryFrom<i16> + TryFrom<u16> +
                 TryFrom<i32> + TryFrom<u32> +
                 TryFrom<i64> + TryFrom<u64>,
              Error: From<<N as TryFrom<i8>>::Error>,
              Error: From<<N as TryFrom<u8>>::Error>,
              Error: From<<N as TryFrom<i16>>::Error>,
              Error: From<<N as TryFrom<u16>>::Error>,
              Error: From<<N as TryFrom<i32>>::Error>,
              Error: From<<N as TryFrom<u32>>::Error>,
              Error: From<<N as TryFrom<i64>>::Error>,
              Error: From<<N as TryFrom<u64>>::Error>,
    {
        let n: N = match self.fetch()? {
            n@(MIN_POSFIXINT..=MAX_POSFIXINT|NEGFIXINT..=0xff) => {
                (n as i8).try_into()?
            }
            UINT_8  => (self.reader.read_u8()?).try_into()?,
            UINT_16 => (self.reader.read_u16()?).try_into()?,
            UINT_32 => (self.reader.read_u32()?).try_into()?,
            UINT_64 => (self.reader.read_u64()?).try_into()?,
            INT_8   => (self.reader.read_i8()?).try_into()?,
            INT_16  => (self.reader.read_i16()?).try_into()?,
            INT_32  => (self.reader.read_i32()?).try_into()?,
            INT_64  => (self.reader.read_i64()?).try_into()?,
            NIL     => 0i8.try_into()?,
            c => return Err(self.unexpected(c, Kind::Integer))
        };
        Ok(n)
    }

    fn parse_f64(&mut self) -> Result<f64> {
        Ok(match self.fetch()? {
            FLOAT_64 => self.reader.read_f64()?,
            FLOAT_32 => self.reader.read_f32()? as f64,
            NIL => 0.0,
            n@(MIN_POSFIXINT..=MAX_POSFIXINT|NEGFIXINT..=0xff) => {
                (n as i8) as f64
            }
            UINT_8  => self.reader.read_u8()?  as f64,
            UINT_16 => self.reader.read_u16()? as f64,
            UINT_32 => self.reader.read_u32()? as f64,
            UINT_64 => self.reader.read_u64()? as f64,
            INT_8   => self.reader.read_i8()?  as f64,
            INT_16  => self.reader.read_i16()? as f64,
            INT_32  => self.reader.read_i32()? as f64,
            INT_64  => self.reader.read_i64()? as f64,
            c => return Err(self.unexpected(c, Kind::Float))
        })
    }

    fn parse_array_len(&mut self) -> Result<usize> {
        match self.fetch()? {
            c@(FIXARRAY..=FIXARRAY_MAX) => Ok((c as usize) & MAX_FIXARRAY_SIZE),
            ARRAY_16 => self.fetch_len16(),
            ARRAY_32 => self.fetch_len32(),
            NIL => Ok(0),
            c => Err(self.unexpected(c, Kind::Array))
        }
    }

    fn parse_map_len(&mut self) -> Result<usize> {
        match self.fetch()? {
            c@(FIXMAP..=FIXMAP_MAX) => Ok((c as usize) & MAX_FIXMAP_SIZE),
            MAP_16 => self.fetch_len16(),
            MAP_32 => self.fetch_len32(),
            NIL => Ok(0),
            c => Err(self.unexpected(c, Kind::Map))
        }
    }

    /// Parse an extension envelope and return its payload.
    ///
    /// The envelope's type tag must equal `expected`, otherwise
    /// `Err(Error::ExtensionTypeMismatch)` is returned.
    pub fn parse_ext(&mut self, expected: i8) -> Result<&'de[u8]> {
        self.parse_ext_envelope(expected, 0)
    }

    /// Like [`parse_ext`](Self::parse_ext), but `fixed` is a non-zero mask of
    /// the accepted `fixext` codes, bit `n` for `FIXEXT_1 + n`, and any
    /// other envelope is rejected with `Err(Error::UnexpectedFormatCode)`.
    fn parse_ext_envelope(&mut self, expected: i8, fixed: u8) -> Result<&'de[u8]> {
        let offset = self.offset();
        let code = self.fetch()?;
        if fixed != 0 && !matches!(code, FIXEXT_1..=FIXEXT_16 if fixed & (1 << (code - FIXEXT_1)) != 0) {
            return Err(self.unexpected(code, Kind::Ext))
        }
        let len = match code {
            FIXEXT_1 => 1,
            FIXEXT_2 => 2,
            FIXEXT_4 => 4,
            FIXEXT_8 => 8,
            FIXEXT_16 => 16,
            EXT_8 => self.fetch_len8()?,
            EXT_16 => self.fetch_len16()?,
            EXT_32 => self.fetch_len32()?,
            c => return Err(self.unexpected(c, Kind::Ext))
        };
        let found = self.reader.read_i8()?;
        if found != expected {
            return Err(Error::ExtensionTypeMismatch { expected, found, offset })
        }
        self.split_input(len)
    }

    /// Decode a registered [`Extension`] type.
    ///
    /// Envelopes not listed in [`Extension::FIXED_WIDTHS`] are rejected.
    /// Unlike the serde path, a payload the type can not interpret is
    /// reported as `Err(Error::InvalidExtPayload)`.
    pub fn decode_ext<T: Extension>(&mut self) -> Result<T> {
        let tag = ext::tag_of::<T>()?;
        let payload = self.parse_ext_envelope(tag, ext::fixext_mask(T::FIXED_WIDTHS))?;
        T::read_payload(payload).ok_or(Error::InvalidExtPayload { tag, len: payload.len() })
    }

    /// Attempts to consume a single MessagePack message from the input without fully decoding its content.
    ///
    /// Return `Ok(())` on success or `Err(Error::TruncatedInput)` if there was not enough data
    /// to fully decode a MessagePack item.
    pub fn eat_message(&mut self) -> Result<()> {
        use MsgType::*;
        let offset = self.offset();
        let mtyp = match self.fetch()? {
            NIL|
            FALSE|
            TRUE|
            MIN_POSFIXINT..=MAX_POSFIXINT|
            NEGFIXINT..=0xff => Single(0),
            c@(FIXMAP..=FIXMAP_MAX) => Map((c as usize) & MAX_FIXMAP_SIZE),
            c@(FIXARRAY..=FIXARRAY_MAX) => Array((c as usize) & MAX_FIXARRAY_SIZE),
            c@(FIXSTR..=FIXSTR_MAX) => Single((c as usize) & MAX_FIXSTR_SIZE),
            RESERVED => return Err(self.unexpected(RESERVED, Kind::Any)),
            BIN_8|STR_8 => Single(self.fetch_len8()?),
            BIN_16|STR_16 => Single(self.fetch_len16()?),
            BIN_32|STR_32 => Single(self.fetch_len32()?),
            EXT_8 => Single(1 + self.fetch_len8()?),
            EXT_16 => Single(1 + self.fetch_len16()?),
            EXT_32 => Single(1usize.saturating_add(self.fetch_len32()?)),
            FLOAT_32 => Single(BYTE_4),
            FLOAT_64 => Single(BYTE_8),
            UINT_8 => Single(BYTE_1),
            UINT_16 => Single(BYTE_2),
            UINT_32 => Single(BYTE_4),
            UINT_64 => Single(BYTE_8),
            INT_8 => Single(BYTE_1),
            INT_16 => Single(BYTE_2),
            INT_32 => Single(BYTE_4),
            INT_64 => Single(BYTE_8),
            FIXEXT_1 => Single(2),
            FIXEXT_2 => Single(3),
            FIXEXT_4 => Single(5),
            FIXEXT_8 => Single(9),
            FIXEXT_16 => Single(17),
            ARRAY_16 => Array(self.fetch_len16()?),
            ARRAY_32 => Array(self.fetch_len32()?),
            MAP_16 => Map(self.fetch_len16()?),
            MAP_32 => Map(self.fetch_len32()?),
        };
        match mtyp {
            Single(len) => self.skip(len)?,
            Array(len) => self.nested(offset, |de| de.eat_seq_items(len))?,
            Map(len) => self.nested(offset, |de| de.eat_map_items(len))?
        }
        Ok(())
    }

    fn eat_seq_items(&mut self, len: usize) -> Result<()> {
        for _ in 0..len {
            self.eat_message()?;
        }
        Ok(())
    }

    fn eat_map_items(&mut self, len: usize) -> Result<()> {
        for _ in 0..len {
            self.eat_message()?;
            self.eat_message()?;
        }
        Ok(())
    }

}

impl<'de> de::Deserializer<'de> for &mut Deserializer<'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        match self.peek()? {
            MIN_POSFIXINT..=MAX_POSFIXINT => self.deserialize_u8(visitor),
            FIXMAP..=FIXMAP_MAX => self.deserialize_map(visitor),
            FIXARRAY..=FIXARRAY_MAX => self.deserialize_seq(visitor),
            FIXSTR..=FIXSTR_MAX => self.deserialize_str(visitor),
            NIL => self.deserialize_unit(visitor),
            RESERVED => Err(Error::UnexpectedFormatCode {
                code: RESERVED, offset: self.offset(), kind: Kind::Any
            }),
            FALSE|
            TRUE => self.deserialize_bool(visitor),
            BIN_8|
            BIN_16|
            BIN_32 => self.deserialize_bytes(visitor),
            code@(EXT_8|
                  EXT_16|
                  EXT_32|
                  FIXEXT_1|
                  FIXEXT_2|
                  FIXEXT_4|
                  FIXEXT_8|
                  FIXEXT_16) => Err(Error::UnsupportedExt { code, offset: self.offset() }),
            FLOAT_32 => self.deserialize_f32(visitor),
            FLOAT_64 => self.deserialize_f64(visitor),
            UINT_8 => self.deserialize_u8(visitor),
            UINT_16 => self.deserialize_u16(visitor),
            UINT_32 => self.deserialize_u32(visitor),
            UINT_64 => self.deserialize_u64(visitor),
            INT_8 => self.deserialize_i8(visitor),
            INT_16 => self.deserialize_i16(visitor),
            INT_32 => self.deserialize_i32(visitor),
            INT_64 => self.deserialize_i64(visitor),
            STR_8|
            STR_16|
            STR_32 => self.deserialize_str(visitor),
            ARRAY_16|
            ARRAY_32 => self.deserialize_seq(visitor),
            MAP_16|
            MAP_32 => self.deserialize_map(visitor),
            NEGFIXINT..=0xff => self.deserialize_i8(visitor),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        let boolean = match self.fetch()? {
            TRUE => true,
            FALSE => false,
            c => return Err(self.unexpected(c, Kind::Bool))
        };
        visitor.visit_bool(boolean)
    }

    fn deserialize_i8<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_i8(self.parse_integer()?)
    }

    fn deserialize_i16<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_i16(self.parse_integer()?)
    }

    fn deserialize_i32<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_i32(self.parse_integer()?)
    }

    fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_i64(self.parse_integer()?)
    }

    fn deserialize_u8<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_u8(self.parse_integer()?)
    }

    fn deserialize_u16<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_u16(self.parse_integer()?)
    }

    fn deserialize_u32<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_u32(self.parse_integer()?)
    }

    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_u64(self.parse_integer()?)
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        let f: f32 = match self.peek()? {
            FLOAT_32 => {
                self.fetch()?;
                self.reader.read_f32()?
            }
            _ => self.parse_f64()? as f32
        };
        visitor.visit_f32(f)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_f64(self.parse_f64()?)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        let s = self.parse_str()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => visitor.visit_char(ch),
            _ => Err(de::Error::invalid_length(s.len(), &"a single character"))
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_borrowed_str(self.parse_str()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_borrowed_bytes(self.parse_bytes()?)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        match self.peek()? {
            NIL => {
                self.fetch()?;
                visitor.visit_none()
            }
            _ => visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        match self.fetch()? {
            NIL => visitor.visit_unit(),
            c => Err(self.unexpected(c, Kind::Nil))
        }
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value>
        where V: Visitor<'de>
    {
        self.deserialize_unit(visitor)
    }

    // Newtype structs are insignificant wrappers around the data they contain.
    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value>
        where V: Visitor<'de>
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        let offset = self.offset();
        self.nested(offset, |de| {
            let len = de.parse_array_len()?;
            let mut access = CountingAccess::new(de, len);
            let value = visitor.visit_seq(&mut access)?;
            if access.count.is_some() {
                return Err(Error::TrailingElements)
            }
            Ok(value)
        })
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value>
        where V: Visitor<'de>
    {
        if name == EXT_TOKEN {
            let (tag, fixed) = ext::split_ext_hint(len);
            let payload = self.parse_ext_envelope(tag, fixed)?;
            return visitor.visit_borrowed_bytes(payload)
        }
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        let offset = self.offset();
        self.nested(offset, |de| {
            let len = de.parse_map_len()?;
            let mut access = CountingAccess::new(de, len);
            let value = visitor.visit_map(&mut access)?;
            if access.count.is_some() {
                return Err(Error::TrailingElements)
            }
            Ok(value)
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
        where V: Visitor<'de>
    {
        let offset = self.offset();
        self.nested(offset, |de| {
            let (map, len): (bool, usize) = match de.fetch()? {
                c@(FIXMAP..=FIXMAP_MAX) => (true, (c as usize) & MAX_FIXMAP_SIZE),
                MAP_16 => (true, de.fetch_len16()?),
                MAP_32 => (true, de.fetch_len32()?),
                c@(FIXARRAY..=FIXARRAY_MAX) => (false, (c as usize) & MAX_FIXARRAY_SIZE),
                ARRAY_16 => (false, de.fetch_len16()?),
                ARRAY_32 => (false, de.fetch_len32()?),
                NIL => (true, 0),
                c => return Err(de.unexpected(c, Kind::Struct))
            };
            let mut access = CountingAccess::new(de, len);
            let value = if map {
                visitor.visit_map(&mut access)?
            }
            else {
                visitor.visit_seq(&mut access)?
            };
            if access.count.is_some() {
                return Err(Error::TrailingElements)
            }
            Ok(value)
        })
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
        where V: Visitor<'de>
    {
        const FIXMAP_1: u8 = FIXMAP|1;
        match self.peek()? {
            FIXMAP_1 => {
                let offset = self.offset();
                self.nested(offset, |de| {
                    de.fetch()?;
                    visitor.visit_enum(VariantAccess { de })
                })
            }
            _ => visitor.visit_enum(UnitVariantAccess { de: self })
        }
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        match self.peek()? {
            MIN_POSFIXINT..=MAX_POSFIXINT|
            UINT_8|
            UINT_16|
            UINT_32 => self.deserialize_u32(visitor),
            FIXSTR..=FIXSTR_MAX|
            STR_8|
            STR_16|
            STR_32  => self.deserialize_str(visitor),
            code => Err(Error::UnexpectedFormatCode {
                code, offset: self.offset(), kind: Kind::Identifier
            })
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
        where V: Visitor<'de>
    {
        self.eat_message()?;
        visitor.visit_unit()
    }
}

struct CountingAccess<'a, 'de: 'a> {
    de: &'a mut Deserializer<'de>,
    count: Option<NonZeroUsize>,
}

impl<'a, 'de> CountingAccess<'a, 'de> {
    fn new(de: &'a mut Deserializer<'de>, count: usize) -> Self {
        CountingAccess {
            de,
            count: NonZeroUsize::new(count),
        }
    }
}

impl<'de> SeqAccess<'de> for CountingAccess<'_, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
        where T: DeserializeSeed<'de>
    {
        if let Some(len) = self.count {
            self.count = NonZeroUsize::new(len.get() - 1);
            return seed.deserialize(&mut *self.de).map(Some)
        }
        Ok(None)
    }

    fn size_hint(&self) -> Option<usize> {
        self.count.map(NonZeroUsize::get).or(Some(0))
    }
}

impl<'de> MapAccess<'de> for CountingAccess<'_, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
        where K: DeserializeSeed<'de>
    {
        if let Some(len) = self.count {
            self.count = NonZeroUsize::new(len.get() - 1);
            return seed.deserialize(&mut *self.de).map(Some)
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
        where V: DeserializeSeed<'de>
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        self.count.map(NonZeroUsize::get).or(Some(0))
    }
}

struct UnitVariantAccess<'a, 'de> {
    de: &'a mut Deserializer<'de>,
}

impl<'de> de::EnumAccess<'de> for UnitVariantAccess<'_, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self)>
        where V: de::DeserializeSeed<'de>
    {
        let variant = seed.deserialize(&mut *self.de)?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for UnitVariantAccess<'_, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, _seed: T) -> Result<T::Value>
        where T: de::DeserializeSeed<'de>
    {
        Err(de::Error::invalid_type(de::Unexpected::UnitVariant, &"newtype variant"))
    }

    fn tuple_variant<V>(self, _len: usize, _visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        Err(de::Error::invalid_type(de::Unexpected::UnitVariant, &"tuple variant"))
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], _visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        Err(de::Error::invalid_type(de::Unexpected::UnitVariant, &"struct variant"))
    }
}

struct VariantAccess<'a, 'de> {
    de: &'a mut Deserializer<'de>,
}

impl<'de> de::EnumAccess<'de> for VariantAccess<'_, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self)>
        where V: de::DeserializeSeed<'de>
    {
        let variant = seed.deserialize(&mut *self.de)?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for VariantAccess<'_, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Err(de::Error::invalid_type(de::Unexpected::Map, &"unit variant"))
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
        where T: de::DeserializeSeed<'de>
    {
        seed.deserialize(self.de)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        de::Deserializer::deserialize_seq(self.de, visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        de::Deserializer::deserialize_struct(self.de, "", fields, visitor)
    }
}
