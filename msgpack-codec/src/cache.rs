//! Process-wide structural cache of [`Aggregate`] field layouts.
//!
//! The first encounter of an aggregate type scans its field descriptors once
//! and publishes the resulting [`Layout`] under a write lock. Every later
//! lookup, from any thread, returns the very same `&'static Layout`. Entries
//! are never evicted nor mutated after publication, so both encoding passes
//! and array-mode decoding always traverse fields in one order.
use core::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::aggregate::{Aggregate, FieldDef};

/// Eligible fields of an aggregate type in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    indexes: Box<[usize]>,
    names: Box<[&'static str]>,
}

impl Layout {
    /// Resolve the eligible fields out of `fields`, keeping their order.
    pub fn scan(fields: &[FieldDef]) -> Self {
        let (indexes, names): (Vec<_>, Vec<_>) = fields.iter().enumerate()
            .filter_map(|(index, field)| field.wire.map(|wire| (index, wire)))
            .unzip();
        Layout { indexes: indexes.into(), names: names.into() }
    }
    /// Number of eligible fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
    /// Declared field indexes, one per eligible field.
    #[inline]
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }
    /// Wire names, one per eligible field.
    #[inline]
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
    /// Iterate over `(declared index, wire name)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'static str)> + '_ {
        self.indexes.iter().copied().zip(self.names.iter().copied())
    }
    /// Find the wire position of a field by its wire name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|&wire| wire == name)
    }
}

type LayoutMap = HashMap<TypeId, &'static Layout>;

fn layouts() -> &'static RwLock<LayoutMap> {
    static LAYOUTS: OnceLock<RwLock<LayoutMap>> = OnceLock::new();
    LAYOUTS.get_or_init(Default::default)
}

/// Return the cached layout of `T`, scanning its fields on first use.
pub fn layout<T: Aggregate>() -> &'static Layout {
    let id = TypeId::of::<T>();
    let cached = layouts().read().unwrap_or_else(PoisonError::into_inner)
                 .get(&id).copied();
    if let Some(layout) = cached {
        return layout
    }
    let mut layouts = layouts().write().unwrap_or_else(PoisonError::into_inner);
    *layouts.entry(id).or_insert_with(|| {
        let layout = Layout::scan(T::fields());
        debug!(aggregate = T::NAME, fields = layout.len(), "struct layout cached");
        Box::leak(Box::new(layout))
    })
}

/// Return `true` if the layout of `T` has already been published.
pub fn is_cached<T: 'static>() -> bool {
    layouts().read().unwrap_or_else(PoisonError::into_inner)
    .contains_key(&TypeId::of::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_scan() {
        let fields = [
            FieldDef::new("a"),
            FieldDef::skip("b"),
            FieldDef::new("c").rename("C"),
        ];
        let layout = Layout::scan(&fields);
        assert_eq!(layout.len(), 2);
        assert!(!layout.is_empty());
        assert_eq!(layout.indexes(), &[0, 2]);
        assert_eq!(layout.names(), &["a", "C"]);
        assert_eq!(layout.iter().collect::<Vec<_>>(), [(0, "a"), (2, "C")]);
        assert_eq!(layout.position("C"), Some(1));
        assert_eq!(layout.position("c"), None);
        assert_eq!(layout.position("b"), None);
        assert!(Layout::scan(&[FieldDef::skip("x")]).is_empty());
    }

    #[test]
    fn test_layout_cached_once() {
        #[derive(Default)]
        struct Probe {
            a: u8,
            b: u8,
        }
        crate::impl_aggregate!(Probe { a, b => "B" });

        assert!(!is_cached::<Probe>());
        let first = layout::<Probe>();
        assert!(is_cached::<Probe>());
        let second = layout::<Probe>();
        assert!(core::ptr::eq(first, second));
        assert_eq!(first.names(), &["a", "B"]);
        let probe = Probe { a: 1, b: 2 };
        assert_eq!((probe.a, probe.b), (1, 2));
    }
}
