//! Encoder configuration

/// How structs (and enum variant identifiers) are laid out on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StructMode {
    /// Structs become maps keyed by field wire names, enum variants are
    /// identified by name.
    #[default]
    Map,
    /// Structs become arrays of field values in declaration order, enum
    /// variants are identified by index.
    Array,
}

/// Encoder configuration
///
/// ```
/// use msgpack_codec::{Config, StructMode, to_vec_with};
///
/// let config = Config::array();
/// assert_eq!(config.struct_mode, StructMode::Array);
/// assert_eq!(to_vec_with(&(1u8, "a"), config).unwrap(), b"\x92\x01\xA1a");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Config {
    pub struct_mode: StructMode,
}

impl Config {
    /// Structs as maps with field names
    pub const fn map() -> Self {
        Config { struct_mode: StructMode::Map }
    }
    /// Structs as arrays without field names
    pub const fn array() -> Self {
        Config { struct_mode: StructMode::Array }
    }
    #[inline(always)]
    pub(crate) fn as_array(&self) -> bool {
        self.struct_mode == StructMode::Array
    }
}
