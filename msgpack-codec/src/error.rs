//! Codec errors

use core::fmt;

use msgpack_cursor::CursorError;
use serde::{de, ser};
use thiserror::Error;

/// Encoding and decoding result
pub type Result<T> = core::result::Result<T, Error>;

/// The kind of value a decoder was asked for when it met a format code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Any,
    Nil,
    Bool,
    Integer,
    Float,
    Str,
    Bin,
    Array,
    Map,
    Struct,
    Identifier,
    Ext,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Any => "any value",
            Kind::Nil => "nil",
            Kind::Bool => "bool",
            Kind::Integer => "integer",
            Kind::Float => "number",
            Kind::Str => "string",
            Kind::Bin => "bin",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::Struct => "map or array",
            Kind::Identifier => "struct field or enum variant identifier",
            Kind::Ext => "ext or fixext",
        })
    }
}

/// MessagePack codec error
///
/// Decoding errors carry the input offset at which they were detected.
/// After an error the decoder position is unspecified and it must not be
/// reused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Reading past the end of input
    #[error("MessagePack input truncated: {needed} byte(s) needed at offset {offset}")]
    TruncatedInput {
        offset: usize,
        needed: usize,
    },
    /// A format code that is not valid for the kind being decoded
    #[error("unexpected MessagePack code {code:#04x} at offset {offset} while decoding {kind}")]
    UnexpectedFormatCode {
        code: u8,
        offset: usize,
        kind: Kind,
    },
    /// An ext envelope carries another extension's type tag
    #[error("MessagePack extension type mismatch at offset {offset}: expected {expected}, found {found}")]
    ExtensionTypeMismatch {
        expected: i8,
        found: i8,
        offset: usize,
    },
    /// Ext payload has a width or content its coder can not interpret
    #[error("invalid payload of {len} byte(s) for MessagePack extension type {tag}")]
    InvalidExtPayload {
        tag: i8,
        len: usize,
    },
    /// An ext envelope in a place where the concrete extension type is unknown
    #[error("unsupported MessagePack extension code {code:#04x} at offset {offset}")]
    UnsupportedExt {
        code: u8,
        offset: usize,
    },
    /// No format code can represent this many bytes or elements
    #[error("length {len} can not be represented in MessagePack")]
    UnsupportedLength {
        len: usize,
    },
    /// Conflicting extension registration
    #[error("extension registration conflict for {type_name}: {reason}")]
    ExtensionConflict {
        type_name: &'static str,
        reason: &'static str,
    },
    /// No extension tag has been registered for this type
    #[error("no MessagePack extension tag registered for {type_name}")]
    UnregisteredExtension {
        type_name: &'static str,
    },
    /// Number could not be coerced
    #[error("could not coerce integer to a deserialized type")]
    InvalidInteger,
    /// Invalid UTF-8 in a string payload
    #[error("invalid UTF-8 in MessagePack string at offset {offset}")]
    InvalidUtf8 {
        offset: usize,
    },
    /// Arrays, maps and enum variants nested past the decoder's depth limit
    #[error("MessagePack input nested too deeply at offset {offset}")]
    DepthLimitExceeded {
        offset: usize,
    },
    /// Trailing unserialized array or map elements
    #[error("too many elements for a deserialized type")]
    TrailingElements,
    /// Sequence or map serialized without a known length
    #[error("sequences and maps must have a known length")]
    UnknownLength,
    /// Number of serialized elements differs from the declared length
    #[error("declared length {declared} differs from {actual} serialized element(s)")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },
    /// Invalid length reported by a [`serde::Deserialize`] implementation
    #[error("invalid length {len}, expected {expected}")]
    InvalidLength {
        len: usize,
        expected: String,
    },
    /// Output buffer is full
    #[error("output buffer is full")]
    BufferFull,
    /// An error passed down from a serde implementation
    #[error("{0}")]
    Custom(String),
}

impl From<CursorError> for Error {
    fn from(err: CursorError) -> Self {
        match err {
            CursorError::Truncated { offset, needed } => Error::TruncatedInput { offset, needed },
            _ => Error::BufferFull,
        }
    }
}

impl From<core::num::TryFromIntError> for Error {
    fn from(_err: core::num::TryFromIntError) -> Self {
        Error::InvalidInteger
    }
}

impl From<core::convert::Infallible> for Error {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    fn invalid_length(len: usize, exp: &dyn de::Expected) -> Self {
        Error::InvalidLength { len, expected: exp.to_string() }
    }
}
