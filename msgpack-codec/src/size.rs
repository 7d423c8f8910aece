//! Phase one of encoding: exact encoded size without writing anything.
//!
//! The free functions in this module are the length-class rules. The
//! [`Serializer`](crate::Serializer) picks its format codes with the same
//! thresholds, so for any value the number of bytes it writes equals what
//! [`SizeCalculator`] returns.
use serde::{ser, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ext::{PayloadSink, EXT_TOKEN};
use crate::magick::*;

/// Encoded size of an unsigned integer.
#[inline]
pub fn uint(v: u64) -> usize {
    if v <= MAX_POSFIXINT as u64 {
        1
    }
    else if v <= u8::MAX as u64 {
        1 + BYTE_1
    }
    else if v <= u16::MAX as u64 {
        1 + BYTE_2
    }
    else if v <= u32::MAX as u64 {
        1 + BYTE_4
    }
    else {
        1 + BYTE_8
    }
}

/// Encoded size of a signed integer.
///
/// Non-negative values take the narrowest of the signed and unsigned codes.
#[inline]
pub fn int(v: i64) -> usize {
    if FIXINT_I64.contains(&v) {
        1
    }
    else if i8::try_from(v).is_ok() || u8::try_from(v).is_ok() {
        1 + BYTE_1
    }
    else if i16::try_from(v).is_ok() || u16::try_from(v).is_ok() {
        1 + BYTE_2
    }
    else if i32::try_from(v).is_ok() || u32::try_from(v).is_ok() {
        1 + BYTE_4
    }
    else {
        1 + BYTE_8
    }
}

/// Encoded size of a string of `len` bytes, header included.
#[inline]
pub fn str(len: usize) -> Result<usize> {
    let header = if len <= MAX_FIXSTR_SIZE {
        1
    }
    else if len <= u8::MAX as usize {
        1 + BYTE_1
    }
    else {
        prefixed_header(len)?
    };
    Ok(header + len)
}

/// Encoded size of a byte blob of `len` bytes, header included.
#[inline]
pub fn bin(len: usize) -> Result<usize> {
    let header = if len <= u8::MAX as usize {
        1 + BYTE_1
    }
    else {
        prefixed_header(len)?
    };
    Ok(header + len)
}

/// Size of an array header for `len` elements.
#[inline]
pub fn array_header(len: usize) -> Result<usize> {
    if len <= MAX_FIXARRAY_SIZE {
        Ok(1)
    }
    else {
        prefixed_header(len)
    }
}

/// Size of a map header for `len` entries.
#[inline]
pub fn map_header(len: usize) -> Result<usize> {
    if len <= MAX_FIXMAP_SIZE {
        Ok(1)
    }
    else {
        prefixed_header(len)
    }
}

/// Encoded size of an extension envelope with a `len` byte payload: code,
/// optional length prefix, type tag and the payload itself.
#[inline]
pub fn ext(len: usize) -> Result<usize> {
    let header = match len {
        1 | 2 | 4 | 8 | 16 => 1,
        _ if len <= u8::MAX as usize => 1 + BYTE_1,
        _ => prefixed_header(len)?
    };
    Ok(header + 1 + len)
}

/// 16 or 32-bit length prefix plus the code byte
#[inline]
fn prefixed_header(len: usize) -> Result<usize> {
    if len <= u16::MAX as usize {
        Ok(1 + BYTE_2)
    }
    else if u32::try_from(len).is_ok() {
        Ok(1 + BYTE_4)
    }
    else {
        Err(Error::UnsupportedLength { len })
    }
}

/// A serde serializer that computes encoded sizes.
///
/// It must be configured exactly like the [`Serializer`](crate::Serializer)
/// which is going to write the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeCalculator {
    config: Config
}

impl SizeCalculator {
    pub fn new(config: Config) -> Self {
        SizeCalculator { config }
    }

    /// Compute the encoded size of `value`.
    pub fn calc<T>(&self, value: &T) -> Result<usize>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn variant(&self, variant_index: u32, variant: &'static str) -> Result<usize> {
        if self.config.as_array() {
            Ok(uint(variant_index.into()))
        }
        else {
            str(variant.len())
        }
    }

    fn struct_header(&self, len: usize) -> Result<usize> {
        if self.config.as_array() {
            array_header(len)
        }
        else {
            map_header(len)
        }
    }
}

/// Accumulates the size of a compound value
pub struct SizeCompound<'a> {
    calc: &'a SizeCalculator,
    total: usize,
    declared: usize,
    count: usize,
    ext: bool,
}

impl<'a> SizeCompound<'a> {
    fn new(calc: &'a SizeCalculator, header: usize, declared: usize) -> Self {
        SizeCompound { calc, total: header, declared, count: 0, ext: false }
    }

    #[inline]
    fn add<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.total += value.serialize(self.calc)?;
        Ok(())
    }

    fn add_counted<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.count += 1;
        self.add(value)
    }

    fn end_counted(self) -> Result<usize> {
        if self.count != self.declared {
            return Err(Error::LengthMismatch { declared: self.declared, actual: self.count })
        }
        Ok(self.total)
    }
}

impl<'a> ser::Serializer for &'a SizeCalculator {
    type Ok = usize;
    type Error = Error;

    type SerializeSeq = SizeCompound<'a>;
    type SerializeTuple = SizeCompound<'a>;
    type SerializeTupleStruct = SizeCompound<'a>;
    type SerializeTupleVariant = SizeCompound<'a>;
    type SerializeMap = SizeCompound<'a>;
    type SerializeStruct = SizeCompound<'a>;
    type SerializeStructVariant = SizeCompound<'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, _v: bool) -> Result<usize> {
        Ok(1)
    }

    fn serialize_i8(self, v: i8) -> Result<usize> {
        Ok(int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<usize> {
        Ok(int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<usize> {
        Ok(int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<usize> {
        Ok(int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<usize> {
        Ok(uint(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<usize> {
        Ok(uint(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<usize> {
        Ok(uint(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<usize> {
        Ok(uint(v))
    }

    fn serialize_f32(self, _v: f32) -> Result<usize> {
        Ok(1 + BYTE_4)
    }

    fn serialize_f64(self, _v: f64) -> Result<usize> {
        Ok(1 + BYTE_8)
    }

    fn serialize_char(self, v: char) -> Result<usize> {
        str(v.len_utf8())
    }

    fn serialize_str(self, v: &str) -> Result<usize> {
        str(v.len())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<usize> {
        bin(v.len())
    }

    fn serialize_none(self) -> Result<usize> {
        Ok(1)
    }

    fn serialize_some<T>(self, value: &T) -> Result<usize>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<usize> {
        Ok(1)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<usize> {
        Ok(1)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<usize> {
        self.variant(variant_index, variant)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<usize>
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
    ) -> Result<usize>
        where T: ?Sized + Serialize
    {
        Ok(1 + self.variant(variant_index, variant)? + value.serialize(self)?)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let len = len.ok_or(Error::UnknownLength)?;
        Ok(SizeCompound::new(self, array_header(len)?, len))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        Ok(SizeCompound::new(self, array_header(len)?, len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        if name == EXT_TOKEN {
            let mut compound = SizeCompound::new(self, 0, 1);
            compound.ext = true;
            return Ok(compound)
        }
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        let header = 1 + self.variant(variant_index, variant)? + array_header(len)?;
        Ok(SizeCompound::new(self, header, len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        let len = len.ok_or(Error::UnknownLength)?;
        Ok(SizeCompound::new(self, map_header(len)?, len))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct> {
        Ok(SizeCompound::new(self, self.struct_header(len)?, len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        let header = 1 + self.variant(variant_index, variant)? + self.struct_header(len)?;
        Ok(SizeCompound::new(self, header, len))
    }
}

impl ser::SerializeSeq for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.add_counted(value)
    }

    fn end(self) -> Result<usize> {
        self.end_counted()
    }
}

impl ser::SerializeTuple for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.add(value)
    }

    fn end(self) -> Result<usize> {
        Ok(self.total)
    }
}

impl ser::SerializeTupleStruct for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        if self.ext {
            self.total += value.serialize(PayloadSink::new(|payload: &[u8]| ext(payload.len())))?;
            return Ok(())
        }
        self.add(value)
    }

    fn end(self) -> Result<usize> {
        Ok(self.total)
    }
}

impl ser::SerializeTupleVariant for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.add(value)
    }

    fn end(self) -> Result<usize> {
        Ok(self.total)
    }
}

impl ser::SerializeMap for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.add_counted(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        self.add(value)
    }

    fn end(self) -> Result<usize> {
        self.end_counted()
    }
}

impl ser::SerializeStruct for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        if !self.calc.config.as_array() {
            self.total += str(key.len())?;
        }
        self.add(value)
    }

    fn end(self) -> Result<usize> {
        Ok(self.total)
    }
}

impl ser::SerializeStructVariant for SizeCompound<'_> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
        where T: ?Sized + Serialize
    {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<usize> {
        Ok(self.total)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use serde::Serialize;
    use super::*;

    #[test]
    fn test_length_classes() {
        assert_eq!(uint(0), 1);
        assert_eq!(uint(127), 1);
        assert_eq!(uint(128), 2);
        assert_eq!(uint(255), 2);
        assert_eq!(uint(256), 3);
        assert_eq!(uint(65535), 3);
        assert_eq!(uint(65536), 5);
        assert_eq!(uint(u32::MAX as u64), 5);
        assert_eq!(uint(u32::MAX as u64 + 1), 9);
        assert_eq!(int(-32), 1);
        assert_eq!(int(-33), 2);
        assert_eq!(int(200), 2);
        assert_eq!(int(-129), 3);
        assert_eq!(int(40000), 3);
        assert_eq!(int(-32769), 5);
        assert_eq!(int(3_000_000_000), 5);
        assert_eq!(int(i64::MIN), 9);
        assert_eq!(str(0), Ok(1));
        assert_eq!(str(31), Ok(32));
        assert_eq!(str(32), Ok(34));
        assert_eq!(str(256), Ok(259));
        assert_eq!(str(65536), Ok(65541));
        assert_eq!(bin(0), Ok(2));
        assert_eq!(bin(256), Ok(259));
        assert_eq!(array_header(15), Ok(1));
        assert_eq!(array_header(16), Ok(3));
        assert_eq!(array_header(65535), Ok(3));
        assert_eq!(array_header(65536), Ok(5));
        assert_eq!(map_header(15), Ok(1));
        assert_eq!(map_header(16), Ok(3));
        assert_eq!(ext(1), Ok(3));
        assert_eq!(ext(8), Ok(10));
        assert_eq!(ext(16), Ok(18));
        assert_eq!(ext(3), Ok(6));
        assert_eq!(ext(12), Ok(15));
        assert_eq!(ext(256), Ok(260));
        assert_eq!(ext(65536), Ok(65542));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_unsupported_length() {
        let len = u32::MAX as usize + 1;
        assert_eq!(array_header(len), Err(Error::UnsupportedLength { len }));
        assert_eq!(map_header(len), Err(Error::UnsupportedLength { len }));
        assert_eq!(str(len), Err(Error::UnsupportedLength { len }));
        assert_eq!(bin(len), Err(Error::UnsupportedLength { len }));
    }

    #[derive(Serialize)]
    struct Unit;
    #[derive(Serialize)]
    struct Test {
        compact: bool,
        schema: u32,
        unit: Unit
    }

    #[test]
    fn test_calc_struct() {
        let test = Test { compact: true, schema: 0, unit: Unit };
        // \x83\xA7compact\xC3\xA6schema\x00\xA4unit\xC0
        assert_eq!(SizeCalculator::new(Config::map()).calc(&test), Ok(24));
        // \x93\xC3\x00\xC0
        assert_eq!(SizeCalculator::new(Config::array()).calc(&test), Ok(4));
    }

    #[test]
    fn test_calc_collections() {
        let calc = SizeCalculator::default();
        assert_eq!(calc.calc(&[0u8; 0][..]), Ok(1));
        assert_eq!(calc.calc(&vec![1000u16; 16]), Ok(3 + 16 * 3));
        let mut map = BTreeMap::new();
        map.insert("a", -1i8);
        map.insert("b", -100);
        assert_eq!(calc.calc(&map), Ok(1 + 2 + 1 + 2 + 2));
        assert_eq!(calc.calc(&Some("")), Ok(1));
        assert_eq!(calc.calc(&None::<u64>), Ok(1));
        assert_eq!(calc.calc(&(1.0f32, 1.0f64)), Ok(1 + 5 + 9));
        assert_eq!(calc.calc(&'ß'), Ok(3));
        assert_eq!(calc.calc(serde_bytes::Bytes::new(&[0; 300])), Ok(303));
    }

    #[derive(Serialize)]
    enum Variants {
        Unit,
        Newtype(u8),
        Tuple(u8, u8),
        Struct { value: u8 },
    }

    #[test]
    fn test_calc_variants() {
        let map = SizeCalculator::new(Config::map());
        let array = SizeCalculator::new(Config::array());
        assert_eq!(map.calc(&Variants::Unit), Ok(5));
        assert_eq!(array.calc(&Variants::Unit), Ok(1));
        assert_eq!(map.calc(&Variants::Newtype(1)), Ok(1 + 8 + 1));
        assert_eq!(array.calc(&Variants::Newtype(1)), Ok(1 + 1 + 1));
        assert_eq!(map.calc(&Variants::Tuple(1, 2)), Ok(1 + 6 + 1 + 2));
        assert_eq!(map.calc(&Variants::Struct { value: 1 }), Ok(1 + 7 + 1 + 6 + 1));
        assert_eq!(array.calc(&Variants::Struct { value: 1 }), Ok(1 + 1 + 1 + 1));
    }

    struct Liar(usize);

    impl Serialize for Liar {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
            use ser::SerializeSeq;
            let mut seq = serializer.serialize_seq(Some(self.0))?;
            seq.serialize_element(&1u8)?;
            seq.end()
        }
    }

    #[test]
    fn test_calc_length_mismatch() {
        let calc = SizeCalculator::default();
        assert_eq!(calc.calc(&Liar(1)), Ok(2));
        assert_eq!(calc.calc(&Liar(2)), Err(Error::LengthMismatch { declared: 2, actual: 1 }));
    }
}
