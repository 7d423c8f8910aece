//! Phase two of encoding: writing MessagePack.
use serde::{ser, Serialize};
use ser::Serializer as _;

use msgpack_cursor::{SerWrite, SliceWriter};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ext::{PayloadSink, EXT_TOKEN};
use crate::magick::*;
use crate::size::SizeCalculator;

/// MessagePack serializer
///
/// The serializer writes every value with the narrowest format code that
/// can hold it. It does not check the capacity of the output in advance,
/// the entry points of this module size the output with a
/// [`SizeCalculator`] first.
pub struct Serializer<W> {
    output: W,
    config: Config,
}

/// Exact size of `value` encoded with `config`.
pub fn encoded_len<T>(value: &T, config: Config) -> Result<usize>
    where T: ?Sized + Serialize
{
    SizeCalculator::new(config).calc(value)
}

/// Serialize as a MessagePack message to a new, exactly sized vector of bytes
///
/// Structs are serialized as maps with field names.
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
    where T: ?Sized + Serialize
{
    to_vec_with(value, Config::default())
}

/// Serialize as a MessagePack message to a new, exactly sized vector of bytes
pub fn to_vec_with<T>(value: &T, config: Config) -> Result<Vec<u8>>
    where T: ?Sized + Serialize
{
    let len = encoded_len(value, config)?;
    let mut vec = vec![0u8; len];
    let written = write_sized(&mut vec, value, config)?;
    debug_assert_eq!(written, len);
    Ok(vec)
}

/// Serialize as a MessagePack message to the beginning of `buf`
///
/// Returns the number of bytes written. If the message doesn't fit,
/// [`Error::BufferFull`] is returned and `buf` is left untouched.
pub fn to_slice<T>(buf: &mut [u8], value: &T, config: Config) -> Result<usize>
    where T: ?Sized + Serialize
{
    let len = encoded_len(value, config)?;
    let target = buf.get_mut(..len).ok_or(Error::BufferFull)?;
    let written = write_sized(target, value, config)?;
    debug_assert_eq!(written, len);
    Ok(written)
}

/// Serialize as a MessagePack message to a [`SerWrite`] implementation
///
/// The writer is asked to reserve the exact size of the message before
/// anything is written. Returns the number of bytes written.
pub fn to_writer<W, T>(mut writer: W, value: &T, config: Config) -> Result<usize>
    where W: SerWrite, T: ?Sized + Serialize
{
    let len = encoded_len(value, config)?;
    writer.reserve(len);
    let mut serializer = Serializer::with_config(writer, config);
    value.serialize(&mut serializer)?;
    Ok(len)
}

fn write_sized<T>(buf: &mut [u8], value: &T, config: Config) -> Result<usize>
    where T: ?Sized + Serialize
{
    let mut serializer = Serializer::with_config(SliceWriter::new(buf), config);
    value.serialize(&mut serializer)?;
    Ok(serializer.into_inner().len())
}

impl<W> Serializer<W> {
    /// Create a serializer with the default [`Config`]
    #[inline(always)]
    pub fn new(output: W) -> Self {
        Serializer { output, config: Config::default() }
    }

    #[inline(always)]
    pub fn with_config(output: W, config: Config) -> Self {
        Serializer { output, config }
    }

    #[inline(always)]
    pub fn config(&self) -> Config {
        self.config
    }

    #[inline(always)]
    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: SerWrite> Serializer<W> {
    fn write_variant(&mut self, variant_index: u32, variant: &'static str) -> Result<()> {
        if self.config.as_array() {
            write_uint(&mut self.output, variant_index.into())
        }
        else {
            self.serialize_str(variant)
        }
    }

    fn write_struct_len(&mut self, len: usize) -> Result<()> {
        if self.config.as_array() {
            write_array_len(&mut self.output, len)
        }
        else {
            write_map_len(&mut self.output, len)
        }
    }
}

impl<'a, W: SerWrite> ser::Serializer for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SerializeSeqMap<'a, W>;
    type SerializeTuple = SerializeTuple<'a, W>;
    type SerializeTupleStruct = SerializeTuple<'a, W>;
    type SerializeTupleVariant = SerializeTuple<'a, W>;
    type SerializeMap = SerializeSeqMap<'a, W>;
    type SerializeStruct = SerializeStruct<'a, W>;
    type SerializeStructVariant = SerializeStruct<'a, W>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        Ok(self.output.write_byte(if v { TRUE } else { FALSE })?)
    }
    #[inline(always)]
    fn serialize_i8(self, v: i8) -> Result<()> {
        write_int(&mut self.output, v.into())
    }
    #[inline(always)]
    fn serialize_i16(self, v: i16) -> Result<()> {
        write_int(&mut self.output, v.into())
    }
    #[inline(always)]
    fn serialize_i32(self, v: i32) -> Result<()> {
        write_int(&mut self.output, v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        write_int(&mut self.output, v)
    }
    #[inline(always)]
    fn serialize_u8(self, v: u8) -> Result<()> {
        write_uint(&mut self.output, v.into())
    }
    #[inline(always)]
    fn serialize_u16(self, v: u16) -> Result<()> {
        write_uint(&mut self.output, v.into())
    }
    #[inline(always)]
    fn serialize_u32(self, v: u32) -> Result<()> {
        write_uint(&mut self.output, v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        write_uint(&mut self.output, v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.output.write_byte(FLOAT_32)?;
        Ok(self.output.write(&v.to_be_bytes())?)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.output.write_byte(FLOAT_64)?;
        Ok(self.output.write(&v.to_be_bytes())?)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut encoding_tmp = [0u8; 4];
        let encoded = v.encode_utf8(&mut encoding_tmp);
        self.serialize_str(encoded)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        write_str_len(&mut self.output, v.len())?;
        Ok(self.output.write_str(v)?)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        write_bin_len(&mut self.output, v.len())?;
        Ok(self.output.write(v)?)
    }

    fn serialize_none(self) -> Result<()> {
        Ok(self.output.write_byte(NIL)?)
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.serialize_none()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.write_variant(variant_index, variant)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.output.write_byte(FIXMAP|1)?;
        self.write_variant(variant_index, variant)?;
        value.serialize(&mut *self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let len = len.ok_or(Error::UnknownLength)?;
        write_array_len(&mut self.output, len)?;
        Ok(SerializeSeqMap { declared: len, count: 0, ser: self })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        write_array_len(&mut self.output, len)?;
        Ok(SerializeTuple { ser: self, ext: None })
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        if name == EXT_TOKEN {
            return Ok(SerializeTuple { ser: self, ext: Some(len as u8 as i8) })
        }
        self.serialize_tuple(len)
    }

    // Variants are externally tagged: `{ variant: [ ... ] }`.
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.output.write_byte(FIXMAP|1)?;
        self.write_variant(variant_index, variant)?;
        self.serialize_tuple(len)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        let len = len.ok_or(Error::UnknownLength)?;
        write_map_len(&mut self.output, len)?;
        Ok(SerializeSeqMap { declared: len, count: 0, ser: self })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct> {
        self.write_struct_len(len)?;
        Ok(SerializeStruct { ser: self })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.output.write_byte(FIXMAP|1)?;
        self.write_variant(variant_index, variant)?;
        self.write_struct_len(len)?;
        Ok(SerializeStruct { ser: self })
    }
}

fn write_int<W: SerWrite>(output: &mut W, v: i64) -> Result<()> {
    if FIXINT_I64.contains(&v) {
        output.write_byte(v as u8)?;
    }
    else if let Ok(v) = i8::try_from(v) {
        output.write_byte(INT_8)?;
        output.write_byte(v as u8)?;
    }
    else if let Ok(v) = u8::try_from(v) {
        output.write_byte(UINT_8)?;
        output.write_byte(v)?;
    }
    else if let Ok(v) = i16::try_from(v) {
        output.write_byte(INT_16)?;
        output.write(&v.to_be_bytes())?;
    }
    else if let Ok(v) = u16::try_from(v) {
        output.write_byte(UINT_16)?;
        output.write(&v.to_be_bytes())?;
    }
    else if let Ok(v) = i32::try_from(v) {
        output.write_byte(INT_32)?;
        output.write(&v.to_be_bytes())?;
    }
    else if let Ok(v) = u32::try_from(v) {
        output.write_byte(UINT_32)?;
        output.write(&v.to_be_bytes())?;
    }
    else {
        output.write_byte(INT_64)?;
        output.write(&v.to_be_bytes())?;
    }
    Ok(())
}

fn write_uint<W: SerWrite>(output: &mut W, v: u64) -> Result<()> {
    if v <= MAX_POSFIXINT as u64 {
        output.write_byte(v as u8)?;
    }
    else if let Ok(v) = u8::try_from(v) {
        output.write_byte(UINT_8)?;
        output.write_byte(v)?;
    }
    else if let Ok(v) = u16::try_from(v) {
        output.write_byte(UINT_16)?;
        output.write(&v.to_be_bytes())?;
    }
    else if let Ok(v) = u32::try_from(v) {
        output.write_byte(UINT_32)?;
        output.write(&v.to_be_bytes())?;
    }
    else {
        output.write_byte(UINT_64)?;
        output.write(&v.to_be_bytes())?;
    }
    Ok(())
}

/// Write one of the 8/16/32-bit prefixed headers
#[inline]
fn write_prefixed<W: SerWrite>(output: &mut W, len: usize, codes: [u8; 3]) -> Result<()> {
    if let Ok(len) = u8::try_from(len) {
        output.write_byte(codes[0])?;
        output.write_byte(len)?;
    }
    else if let Ok(len) = u16::try_from(len) {
        output.write_byte(codes[1])?;
        output.write(&len.to_be_bytes())?;
    }
    else if let Ok(len) = u32::try_from(len) {
        output.write_byte(codes[2])?;
        output.write(&len.to_be_bytes())?;
    }
    else {
        return Err(Error::UnsupportedLength { len })
    }
    Ok(())
}

#[inline]
fn write_str_len<W: SerWrite>(output: &mut W, len: usize) -> Result<()> {
    if len <= MAX_FIXSTR_SIZE {
        Ok(output.write_byte(FIXSTR | (len as u8))?)
    }
    else {
        write_prefixed(output, len, [STR_8, STR_16, STR_32])
    }
}

#[inline]
fn write_bin_len<W: SerWrite>(output: &mut W, len: usize) -> Result<()> {
    write_prefixed(output, len, [BIN_8, BIN_16, BIN_32])
}

#[inline]
fn write_array_len<W: SerWrite>(output: &mut W, len: usize) -> Result<()> {
    if len <= MAX_FIXARRAY_SIZE {
        output.write_byte(FIXARRAY | (len as u8))?;
    }
    else if let Ok(len) = u16::try_from(len) {
        output.write_byte(ARRAY_16)?;
        output.write(&len.to_be_bytes())?;
    }
    else if let Ok(len) = u32::try_from(len) {
        output.write_byte(ARRAY_32)?;
        output.write(&len.to_be_bytes())?;
    }
    else {
        return Err(Error::UnsupportedLength { len })
    }
    Ok(())
}

#[inline]
fn write_map_len<W: SerWrite>(output: &mut W, len: usize) -> Result<()> {
    if len <= MAX_FIXMAP_SIZE {
        output.write_byte(FIXMAP | (len as u8))?;
    }
    else if let Ok(len) = u16::try_from(len) {
        output.write_byte(MAP_16)?;
        output.write(&len.to_be_bytes())?;
    }
    else if let Ok(len) = u32::try_from(len) {
        output.write_byte(MAP_32)?;
        output.write(&len.to_be_bytes())?;
    }
    else {
        return Err(Error::UnsupportedLength { len })
    }
    Ok(())
}

fn write_ext_header<W: SerWrite>(output: &mut W, len: usize, tag: i8) -> Result<()> {
    match len {
        1 => output.write_byte(FIXEXT_1)?,
        2 => output.write_byte(FIXEXT_2)?,
        4 => output.write_byte(FIXEXT_4)?,
        8 => output.write_byte(FIXEXT_8)?,
        16 => output.write_byte(FIXEXT_16)?,
        _ => write_prefixed(output, len, [EXT_8, EXT_16, EXT_32])?
    }
    Ok(output.write_byte(tag as u8)?)
}

pub struct SerializeSeqMap<'a, W> {
    declared: usize,
    count: usize,
    ser: &'a mut Serializer<W>
}

pub struct SerializeTuple<'a, W> {
    ser: &'a mut Serializer<W>,
    ext: Option<i8>,
}

pub struct SerializeStruct<'a, W> {
    ser: &'a mut Serializer<W>
}

impl<W> SerializeSeqMap<'_, W> {
    fn next(&mut self) -> Result<()> {
        self.count += 1;
        if self.count > self.declared {
            return Err(Error::LengthMismatch { declared: self.declared, actual: self.count })
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if self.count != self.declared {
            return Err(Error::LengthMismatch { declared: self.declared, actual: self.count })
        }
        Ok(())
    }
}

impl<W: SerWrite> ser::SerializeSeq for SerializeSeqMap<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.next()?;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<W: SerWrite> ser::SerializeTuple for SerializeTuple<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<W: SerWrite> ser::SerializeTupleStruct for SerializeTuple<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        if let Some(tag) = self.ext {
            let output = &mut self.ser.output;
            return value.serialize(PayloadSink::new(|payload: &[u8]| {
                write_ext_header(output, payload.len(), tag)?;
                Ok(output.write(payload)?)
            }))
        }
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<W: SerWrite> ser::SerializeTupleVariant for SerializeTuple<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<W: SerWrite> ser::SerializeMap for SerializeSeqMap<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.next()?;
        key.serialize(&mut *self.ser)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<W: SerWrite> ser::SerializeStruct for SerializeStruct<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        if !self.ser.config.as_array() {
            self.ser.serialize_str(key)?;
        }
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<W: SerWrite> ser::SerializeStructVariant for SerializeStruct<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
