//! MessagePack extension types.
//!
//! A type becomes an extension by implementing [`Extension`]: it knows how
//! wide its payload is, how to write it and how to read it back. The type
//! tag it travels under is not part of the implementation, it lives in a
//! process-wide registry so applications can move a family of types to
//! another tag ([`set_family_tag`]) or add their own types ([`register`]).
//!
//! Built-in registrations:
//!
//! | type                   | family        | tag    | envelope
//! |------------------------|---------------|--------|---------------------------
//! | [`Complex<f32>`]       | `complex`     | `-128` | `fixext 8`
//! | [`Complex<f64>`]       | `complex`     | `-128` | `fixext 16`
//! | [`Timestamp`]          | `timestamp`   | `-1`   | `fixext 4`, `fixext 8`, `ext 8`
//!
//! Inside serde an extension value travels as a tuple struct named
//! `EXT_TOKEN` whose single field is the payload as bytes. The low byte of
//! its length argument carries the type tag. When deserializing, the next
//! byte is a mask of the `fixext` codes the type accepts, zero meaning any
//! `fixext` or `ext` envelope. The codec's serializers and deserializer
//! recognize the token and emit or parse the envelope; the deserializer
//! checks the tag before the payload is handed over.
//!
//! Use [`serialize`] and [`deserialize`] with `#[serde(with = "msgpack_codec::ext")]`
//! or wrap the value in [`Ext`].
use core::any::{type_name, TypeId};
use core::fmt;
use core::marker::PhantomData;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::{Error, Result};

mod complex;
mod timestamp;

pub use complex::{Complex, COMPLEX_FAMILY, COMPLEX_TAG};
pub use timestamp::{Timestamp, TIMESTAMP_FAMILY, TIMESTAMP_TAG};

pub(crate) const EXT_TOKEN: &str = "$msgpack_codec::Ext";

/// Payloads up to this size are assembled on the stack.
const INLINE_PAYLOAD: usize = 16;

/// A coder for one concrete extension type.
pub trait Extension: Sized + 'static {
    /// Types of one family share a single type tag and are told apart by
    /// their payload width.
    const FAMILY: &'static str;
    /// Size of the payload [`write_payload`](Self::write_payload) produces.
    fn payload_len(&self) -> usize;
    /// Write the payload, `out` is exactly `payload_len()` bytes long.
    fn write_payload(&self, out: &mut [u8]);
    /// Interpret a payload. Return `None` when its width or content is not
    /// valid for this type.
    fn read_payload(payload: &[u8]) -> Option<Self>;
    /// Payload widths of the `fixext` envelopes this type is decoded from.
    ///
    /// Empty accepts every `fixext` and `ext` envelope. Otherwise any other
    /// envelope is rejected before its type tag is read.
    const FIXED_WIDTHS: &'static [usize] = &[];
}

/// Mask of accepted `fixext` codes, bit `n` stands for `FIXEXT_1 + n`.
pub(crate) fn fixext_mask(widths: &[usize]) -> u8 {
    widths.iter()
    .filter(|w| w.is_power_of_two() && **w <= 16)
    .fold(0u8, |mask, w| mask | (1 << w.trailing_zeros()))
}

fn ext_hint<T: Extension>(tag: i8) -> usize {
    (usize::from(fixext_mask(T::FIXED_WIDTHS)) << 8) | usize::from(tag as u8)
}

/// Split the `EXT_TOKEN` length argument into the tag and the `fixext` mask.
pub(crate) fn split_ext_hint(hint: usize) -> (i8, u8) {
    (hint as u8 as i8, (hint >> 8) as u8)
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    family: &'static str,
    tag: i8,
}

impl Registration {
    fn of<T: Extension>(tag: i8) -> Self {
        Registration {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            family: T::FAMILY,
            tag
        }
    }
}

static REGISTRY: OnceLock<RwLock<Vec<Registration>>> = OnceLock::new();

fn registry() -> &'static RwLock<Vec<Registration>> {
    REGISTRY.get_or_init(|| RwLock::new(vec![
        Registration::of::<Complex<f32>>(COMPLEX_TAG),
        Registration::of::<Complex<f64>>(COMPLEX_TAG),
        Registration::of::<Timestamp>(TIMESTAMP_TAG),
    ]))
}

/// Register an extension type under `tag`.
///
/// Fails with [`Error::ExtensionConflict`] if the type is already
/// registered, if another family owns `tag`, or if the type's family is
/// registered under a different tag.
pub fn register<T: Extension>(tag: i8) -> Result<()> {
    let mut entries = registry().write().unwrap_or_else(PoisonError::into_inner);
    let entry = Registration::of::<T>(tag);
    let conflict = if entries.iter().any(|r| r.type_id == entry.type_id) {
        Some("type is already registered")
    }
    else if entries.iter().any(|r| r.tag == tag && r.family != entry.family) {
        Some("tag is owned by another family")
    }
    else if entries.iter().any(|r| r.family == entry.family && r.tag != tag) {
        Some("family is registered under another tag")
    }
    else {
        None
    };
    if let Some(reason) = conflict {
        warn!(type_name = entry.type_name, tag, reason, "rejected extension registration");
        return Err(Error::ExtensionConflict { type_name: entry.type_name, reason })
    }
    debug!(type_name = entry.type_name, family = entry.family, tag, "registered extension type");
    entries.push(entry);
    Ok(())
}

/// Move every type of `family` to `tag`.
///
/// Fails with [`Error::ExtensionConflict`] if `tag` is owned by another
/// family or nothing of `family` is registered.
pub fn set_family_tag(family: &'static str, tag: i8) -> Result<()> {
    let mut entries = registry().write().unwrap_or_else(PoisonError::into_inner);
    let reason = if entries.iter().any(|r| r.tag == tag && r.family != family) {
        Some("tag is owned by another family")
    }
    else if !entries.iter().any(|r| r.family == family) {
        Some("family is not registered")
    }
    else {
        None
    };
    if let Some(reason) = reason {
        warn!(family, tag, reason, "rejected extension tag change");
        return Err(Error::ExtensionConflict { type_name: family, reason })
    }
    for entry in entries.iter_mut().filter(|r| r.family == family) {
        entry.tag = tag;
    }
    debug!(family, tag, "moved extension family");
    Ok(())
}

/// Return the tag `T` is registered under.
pub fn tag_of<T: Extension>() -> Result<i8> {
    let type_id = TypeId::of::<T>();
    registry().read().unwrap_or_else(PoisonError::into_inner)
    .iter()
    .find(|r| r.type_id == type_id)
    .map(|r| r.tag)
    .ok_or(Error::UnregisteredExtension { type_name: type_name::<T>() })
}

/// Serialize an [`Extension`] value, for use with `#[serde(serialize_with)]`.
pub fn serialize<T, S>(value: &T, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where T: Extension, S: Serializer
{
    use ser::SerializeTupleStruct;
    let tag = tag_of::<T>().map_err(ser::Error::custom)?;
    let mut state = serializer.serialize_tuple_struct(EXT_TOKEN, tag as u8 as usize)?;
    state.serialize_field(&Payload(value))?;
    state.end()
}

/// Deserialize an [`Extension`] value, for use with `#[serde(deserialize_with)]`.
pub fn deserialize<'de, T, D>(deserializer: D) -> core::result::Result<T, D::Error>
    where T: Extension, D: Deserializer<'de>
{
    let tag = tag_of::<T>().map_err(de::Error::custom)?;
    deserializer.deserialize_tuple_struct(EXT_TOKEN, ext_hint::<T>(tag), ExtVisitor(PhantomData))
}

/// Wrapper serializing any registered [`Extension`] as a MessagePack ext.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ext<T>(pub T);

impl<T: Extension> Serialize for Ext<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de, T: Extension> Deserialize<'de> for Ext<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        deserialize(deserializer).map(Ext)
    }
}

struct Payload<'a, T>(&'a T);

impl<T: Extension> Serialize for Payload<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let len = self.0.payload_len();
        if len <= INLINE_PAYLOAD {
            let mut buf = [0u8; INLINE_PAYLOAD];
            self.0.write_payload(&mut buf[..len]);
            serializer.serialize_bytes(&buf[..len])
        }
        else {
            let mut buf = vec![0u8; len];
            self.0.write_payload(&mut buf);
            serializer.serialize_bytes(&buf)
        }
    }
}

struct ExtVisitor<T>(PhantomData<T>);

impl<'de, T: Extension> de::Visitor<'de> for ExtVisitor<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a MessagePack {} extension payload", T::FAMILY)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> core::result::Result<T, E> {
        T::read_payload(v).ok_or_else(|| E::invalid_length(v.len(), &self))
    }
}

/// Captures the payload bytes of an extension value.
///
/// Anything but `serialize_bytes` is rejected.
pub(crate) struct PayloadSink<F>(F);

impl<F> PayloadSink<F> {
    pub(crate) fn new(f: F) -> Self {
        PayloadSink(f)
    }
}

fn not_bytes<R>() -> Result<R> {
    Err(Error::Custom("extension payload must be serialized as bytes".into()))
}

impl<R, F> ser::Serializer for PayloadSink<F>
    where F: FnOnce(&[u8]) -> Result<R>
{
    type Ok = R;
    type Error = Error;

    type SerializeSeq = ser::Impossible<R, Error>;
    type SerializeTuple = ser::Impossible<R, Error>;
    type SerializeTupleStruct = ser::Impossible<R, Error>;
    type SerializeTupleVariant = ser::Impossible<R, Error>;
    type SerializeMap = ser::Impossible<R, Error>;
    type SerializeStruct = ser::Impossible<R, Error>;
    type SerializeStructVariant = ser::Impossible<R, Error>;

    fn serialize_bytes(self, v: &[u8]) -> Result<R> {
        (self.0)(v)
    }

    fn serialize_bool(self, _v: bool) -> Result<R> { not_bytes() }
    fn serialize_i8(self, _v: i8) -> Result<R> { not_bytes() }
    fn serialize_i16(self, _v: i16) -> Result<R> { not_bytes() }
    fn serialize_i32(self, _v: i32) -> Result<R> { not_bytes() }
    fn serialize_i64(self, _v: i64) -> Result<R> { not_bytes() }
    fn serialize_u8(self, _v: u8) -> Result<R> { not_bytes() }
    fn serialize_u16(self, _v: u16) -> Result<R> { not_bytes() }
    fn serialize_u32(self, _v: u32) -> Result<R> { not_bytes() }
    fn serialize_u64(self, _v: u64) -> Result<R> { not_bytes() }
    fn serialize_f32(self, _v: f32) -> Result<R> { not_bytes() }
    fn serialize_f64(self, _v: f64) -> Result<R> { not_bytes() }
    fn serialize_char(self, _v: char) -> Result<R> { not_bytes() }
    fn serialize_str(self, _v: &str) -> Result<R> { not_bytes() }
    fn serialize_none(self) -> Result<R> { not_bytes() }
    fn serialize_unit(self) -> Result<R> { not_bytes() }

    fn serialize_some<T>(self, _value: &T) -> Result<R>
        where T: ?Sized + Serialize
    {
        not_bytes()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<R> {
        not_bytes()
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32, _variant: &'static str) -> Result<R> {
        not_bytes()
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, _value: &T) -> Result<R>
        where T: ?Sized + Serialize
    {
        not_bytes()
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<R>
        where T: ?Sized + Serialize
    {
        not_bytes()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        not_bytes()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        not_bytes()
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct> {
        not_bytes()
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        not_bytes()
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        not_bytes()
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        not_bytes()
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        not_bytes()
    }
}
