//! Struct coder driven by per-type field descriptors.
//!
//! An [`Aggregate`] describes every declared field of a struct once, with the
//! wire name it travels under or no name at all when it is excluded. The
//! resolved list of eligible fields is kept in the [structural cache], so
//! both encoding passes and decoding walk the fields in one fixed order
//! without re-examining the descriptors.
//!
//! Encoding emits a single `serialize_struct` call: the running serializer's
//! [`StructMode`](crate::StructMode) decides between a map keyed by wire
//! names and a positional array, and the header width follows the number of
//! eligible fields.
//!
//! Decoding accepts either layout. Map keys are matched by wire name or by
//! wire position, unknown keys are skipped, and fields absent from the input
//! keep their [`Default`] values.
//!
//! ```
//! use msgpack_codec::{impl_aggregate, from_slice, to_vec, to_vec_with, Config};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Sample {
//!     a: i32,
//!     b: String,
//!     scratch: u64,
//! }
//!
//! impl_aggregate!(Sample { a => "A", b => "B" } skip { scratch });
//!
//! let sample = Sample { a: 1, b: "hi".into(), scratch: 7 };
//! let bytes = to_vec(&sample).unwrap();
//! assert_eq!(bytes, b"\x82\xA1A\x01\xA1B\xA2hi");
//! let bytes = to_vec_with(&sample, Config::array()).unwrap();
//! assert_eq!(bytes, b"\x92\x01\xA2hi");
//!
//! let (decoded, _) = from_slice::<Sample>(&bytes).unwrap();
//! assert_eq!(decoded, Sample { a: 1, b: "hi".into(), scratch: 0 });
//! ```
//!
//! [structural cache]: crate::cache
use core::fmt;
use core::marker::PhantomData;

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserializer, Serializer};

use crate::cache::{self, Layout};

/// Descriptor of a single declared struct field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDef {
    /// Field name as declared
    pub ident: &'static str,
    /// Resolved wire name, `None` if the field is not serialized
    pub wire: Option<&'static str>,
}

impl FieldDef {
    /// A field serialized under its declared name.
    pub const fn new(ident: &'static str) -> Self {
        FieldDef { ident, wire: Some(ident) }
    }
    /// Serialize the field under another name.
    pub const fn rename(self, wire: &'static str) -> Self {
        FieldDef { ident: self.ident, wire: Some(wire) }
    }
    /// A field excluded from serialization.
    pub const fn skip(ident: &'static str) -> Self {
        FieldDef { ident, wire: None }
    }

    pub const fn is_skipped(&self) -> bool {
        self.wire.is_none()
    }
}

/// A struct whose fields are coded through the structural cache.
///
/// Usually implemented with [`impl_aggregate!`](crate::impl_aggregate).
/// Field `index` arguments are positions in [`Aggregate::fields`].
pub trait Aggregate: 'static {
    /// Struct name passed to the serde data model
    const NAME: &'static str;
    /// Every declared field, in declaration order.
    fn fields() -> &'static [FieldDef];
    /// Serialize the value of field `index` under `key`.
    fn serialize_field<S>(&self, index: usize, key: &'static str, state: &mut S) -> Result<(), S::Error>
        where S: SerializeStruct;
    /// Replace the value of field `index` with one read from `deserializer`.
    fn deserialize_field<'de, D>(&mut self, index: usize, deserializer: D) -> Result<(), D::Error>
        where D: Deserializer<'de>;
}

/// Serialize an [`Aggregate`] with its cached layout.
pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where T: Aggregate, S: Serializer
{
    let layout = cache::layout::<T>();
    let mut state = serializer.serialize_struct(T::NAME, layout.len())?;
    for (index, key) in layout.iter() {
        value.serialize_field(index, key, &mut state)?;
    }
    state.end()
}

/// Deserialize an [`Aggregate`] from a map or an array.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where T: Aggregate + Default, D: Deserializer<'de>
{
    let layout = cache::layout::<T>();
    deserializer.deserialize_struct(T::NAME, layout.names(),
                                    AggregateVisitor { layout, marker: PhantomData })
}

struct AggregateVisitor<T> {
    layout: &'static Layout,
    marker: PhantomData<T>,
}

impl<'de, T: Aggregate + Default> Visitor<'de> for AggregateVisitor<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "struct {}", T::NAME)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<T, A::Error>
        where A: SeqAccess<'de>
    {
        let mut value = T::default();
        for &index in self.layout.indexes() {
            let seed = FieldSeed { target: &mut value, index };
            if seq.next_element_seed(seed)?.is_none() {
                break
            }
        }
        Ok(value)
    }

    fn visit_map<A>(self, mut map: A) -> Result<T, A::Error>
        where A: MapAccess<'de>
    {
        let mut value = T::default();
        while let Some(position) = map.next_key_seed(KeySeed(self.layout))? {
            match position {
                Some(position) => {
                    let index = self.layout.indexes()[position];
                    map.next_value_seed(FieldSeed { target: &mut value, index })?;
                }
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(value)
    }
}

/// Resolves a map key to a wire position, `None` for unknown keys.
struct KeySeed(&'static Layout);

impl<'de> DeserializeSeed<'de> for KeySeed {
    type Value = Option<usize>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where D: Deserializer<'de>
    {
        deserializer.deserialize_identifier(self)
    }
}

impl<'de> Visitor<'de> for KeySeed {
    type Value = Option<usize>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a field name or a field position")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(usize::try_from(v).ok().filter(|&position| position < self.0.len()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(self.0.position(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(core::str::from_utf8(v).ok().and_then(|name| self.0.position(name)))
    }
}

struct FieldSeed<'a, T> {
    target: &'a mut T,
    index: usize,
}

impl<'de, T: Aggregate> DeserializeSeed<'de> for FieldSeed<'_, T> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
        where D: Deserializer<'de>
    {
        self.target.deserialize_field(self.index, deserializer)
    }
}

/// Implement [`Aggregate`], `Serialize` and `Deserialize` for a plain struct.
///
/// List the serialized fields in the order they go on the wire, optionally
/// renaming them with `=> "name"`, then the excluded fields in a `skip`
/// group. Field types must implement `Serialize` and `DeserializeOwned`, and
/// the struct must implement [`Default`].
///
/// ```
/// # use msgpack_codec::impl_aggregate;
/// #[derive(Default)]
/// struct Reading {
///     sensor: String,
///     value: f64,
///     cached: Option<f64>,
/// }
///
/// impl_aggregate!(Reading { sensor => "id", value } skip { cached });
/// ```
#[macro_export]
macro_rules! impl_aggregate {
    ($ty:ident {
        $($field:ident $(=> $wire:literal)?),* $(,)?
    } $(skip { $($skipped:ident),* $(,)? })?) => {
        const _: () = {
            #[allow(non_camel_case_types, dead_code)]
            enum __Field { $($field,)* }

            impl $crate::aggregate::Aggregate for $ty {
                const NAME: &'static str = stringify!($ty);

                fn fields() -> &'static [$crate::aggregate::FieldDef] {
                    const FIELDS: &[$crate::aggregate::FieldDef] = &[
                        $($crate::aggregate::FieldDef::new(stringify!($field))$(.rename($wire))?,)*
                        $($($crate::aggregate::FieldDef::skip(stringify!($skipped)),)*)?
                    ];
                    FIELDS
                }

                #[allow(unused_variables)]
                fn serialize_field<S>(&self, index: usize, key: &'static str, state: &mut S)
                    -> ::core::result::Result<(), S::Error>
                    where S: $crate::serde::ser::SerializeStruct
                {
                    $(
                        if index == __Field::$field as usize {
                            return state.serialize_field(key, &self.$field)
                        }
                    )*
                    ::core::result::Result::Ok(())
                }

                #[allow(unused_variables)]
                fn deserialize_field<'de, D>(&mut self, index: usize, deserializer: D)
                    -> ::core::result::Result<(), D::Error>
                    where D: $crate::serde::Deserializer<'de>
                {
                    $(
                        if index == __Field::$field as usize {
                            self.$field = $crate::serde::Deserialize::deserialize(deserializer)?;
                            return ::core::result::Result::Ok(())
                        }
                    )*
                    <$crate::serde::de::IgnoredAny as $crate::serde::Deserialize>::deserialize(deserializer)
                    .map(drop)
                }
            }

            impl $crate::serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
                    where S: $crate::serde::Serializer
                {
                    $crate::aggregate::serialize(self, serializer)
                }
            }

            impl<'de> $crate::serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
                    where D: $crate::serde::Deserializer<'de>
                {
                    $crate::aggregate::deserialize(deserializer)
                }
            }
        };
    };
}
