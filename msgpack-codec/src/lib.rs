//! A two-phase MessagePack serializer and a zero-copy deserializer for serde.
/*!

Encoding always runs in two passes over the value: [`SizeCalculator`] computes
the exact encoded length, the output is allocated once, and [`Serializer`]
writes into it. Both passes pick format codes with the same rules (see
[`size`]), so the written length always equals the computed one.

[`Serializer`] types:

| Serde type ->     | MessagePack type
|-------------------|--------------------
| `()`              | `nil`
| `Unit` struct     | `nil`
| `bool`            | `bool`
| `NewType(T)`      | `T` -> `MessagePack`
| `None`            | `nil`
| `Some(T)`         | `T` -> `MessagePack`
| `u8`-`u64`        | `uint` (smallest representation)
| `i8`-`i64`        | `int`, `uint` (sm. repr.)
| `f32`             | `float-32`
| `f64`             | `float-64`
| `str`             | `str`
| `bytes`           | `bin`
| `array`, `tuple`  | `array` (sm. repr.)
| `seq`-like        | `array` (sm. repr.)
| `map`-like        | `map` (sm. repr.)
| `struct`          | `map` (default) or `array` ([`StructMode`])
| `unit variant`    | `str` (map mode) or `uint` (array mode)
| `newtype variant` | `fixmap:1` `variant`, `T`
| `tuple variant`   | `fixmap:1` `variant`, `array`
| `struct variant`  | `fixmap:1` `variant`, `struct`
| [`Extension`]     | `fixext` or `ext` (by payload width)

[`Deserializer`] types:

| MessagePack type -> | Serde type (depending on context)
|---------------------|----------------------------------------
| `nil`               | `unit`,`none`, zero numbers, `""`, empty `bytes`, empty collections
| `bool`              | `bool`
| `fixint`, `int`     | `f64`,`f32`,`u8`-`u64`,`i8`-`i64`
| `float-32`          | `f64` or `f32`
| `float-64`          | `f64` or `f32`
| `str`               | `str`, `bytes`, `enum variant`, `field name`
| `bin`               | `bytes` (`&[u8]`, `Vec<u8>`)
| `array`             | `array`,`tuple`,`tuple struct`,`tuple variant`,`seq-like`,`struct`
| `map`               | `enum variant`,`struct variant`,`map-like`,`struct`
| `T`                 | `NewType(T)`, `Some(T)`
| `fixext`, `ext`     | registered [`Extension`] types only

Structs that implement [`Aggregate`] (usually through [`impl_aggregate!`])
resolve their serializable fields once per type and keep the result in a
process-wide cache, see [`cache`].

[`Extension`]: ext::Extension
*/
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod de;
pub mod error;
pub mod ext;
pub mod ser;
pub mod size;

pub use msgpack_cursor;
pub use msgpack_cursor::SerWrite;
#[doc(hidden)]
pub use serde;

pub use aggregate::{Aggregate, FieldDef};
pub use config::{Config, StructMode};
pub use error::{Error, Kind, Result};
pub use ext::{Complex, Ext, Extension, Timestamp};
pub use size::SizeCalculator;

pub use ser::{
    Serializer,
    encoded_len,
    to_slice,
    to_vec,
    to_vec_with,
    to_writer,
};

pub use de::{
    Deserializer,
    from_slice,
    from_slice_split_tail
};

/// MessagePack format codes
pub mod magick {
    use core::ops::RangeInclusive;

    pub const MIN_POSFIXINT: u8 = 0x00;
    pub const MAX_POSFIXINT: u8 = 0x7f;
    pub const NEGFIXINT: u8 = 0b11100000;
    pub const MIN_NEGFIXINT: i8 = NEGFIXINT as i8; //-32
    pub const FIXINT_I64: RangeInclusive<i64> = MIN_NEGFIXINT as i64..=MAX_POSFIXINT as i64;
    pub const NIL: u8      = 0xc0;
    pub const RESERVED: u8 = 0xc1;
    pub const FALSE: u8    = 0xc2;
    pub const TRUE: u8     = 0xc3;

    pub const FIXMAP: u8   = 0x80; /* 1000xxxx */
    pub const MAX_FIXMAP_SIZE: usize = 0b1111;
    pub const FIXMAP_MAX: u8 = FIXMAP + MAX_FIXMAP_SIZE as u8; /* 10001111 */

    pub const FIXARRAY: u8 = 0x90; /* 1001xxxx */
    pub const MAX_FIXARRAY_SIZE: usize = 0b1111;
    pub const FIXARRAY_MAX: u8 = FIXARRAY + MAX_FIXARRAY_SIZE as u8; /* 10011111 */

    pub const FIXSTR: u8   = 0xa0; /* 101xxxxx */
    pub const MAX_FIXSTR_SIZE: usize = 0b11111;
    pub const FIXSTR_MAX: u8 = FIXSTR + MAX_FIXSTR_SIZE as u8; /* 10111111 */

    pub const BIN_8: u8     = 0xc4;
    pub const BIN_16: u8    = 0xc5;
    pub const BIN_32: u8    = 0xc6;

    pub const EXT_8: u8     = 0xc7;
    pub const EXT_16: u8    = 0xc8;
    pub const EXT_32: u8    = 0xc9;

    pub const FLOAT_32: u8  = 0xca;
    pub const FLOAT_64: u8  = 0xcb;

    pub const UINT_8: u8    = 0xcc;
    pub const UINT_16: u8   = 0xcd;
    pub const UINT_32: u8   = 0xce;
    pub const UINT_64: u8   = 0xcf;

    pub const INT_8: u8     = 0xd0;
    pub const INT_16: u8    = 0xd1;
    pub const INT_32: u8    = 0xd2;
    pub const INT_64: u8    = 0xd3;

    pub const FIXEXT_1: u8  = 0xd4;
    pub const FIXEXT_2: u8  = 0xd5;
    pub const FIXEXT_4: u8  = 0xd6;
    pub const FIXEXT_8: u8  = 0xd7;
    pub const FIXEXT_16: u8 = 0xd8;

    pub const STR_8: u8     = 0xd9;
    pub const STR_16: u8    = 0xda;
    pub const STR_32: u8    = 0xdb;

    pub const ARRAY_16: u8  = 0xdc;
    pub const ARRAY_32: u8  = 0xdd;

    pub const MAP_16: u8    = 0xde;
    pub const MAP_32: u8    = 0xdf;

    /* byte widths of prefix fields */
    pub const BYTE_1: usize = 1;
    pub const BYTE_2: usize = 2;
    pub const BYTE_4: usize = 4;
    pub const BYTE_8: usize = 8;
}
