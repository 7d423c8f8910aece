//! Property-based tests for phase agreement and round-trips.

#![allow(clippy::float_cmp)]

use proptest::prelude::*;
use serde_bytes::ByteBuf;

use msgpack_codec::{
    encoded_len, from_slice, impl_aggregate, size, to_vec, to_vec_with, Complex, Config, Timestamp,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Inner {
    flag: bool,
    small: i8,
    label: String,
}

impl_aggregate!(Inner { flag, small, label => "l" });

#[derive(Debug, Default, Clone, PartialEq)]
struct Record {
    id: u64,
    delta: i64,
    ratio: f64,
    name: String,
    blob: ByteBuf,
    tags: Vec<String>,
    point: Complex<f64>,
    when: Timestamp,
    inner: Inner,
    children: Vec<Inner>,
    scratch: u32,
}

impl_aggregate!(Record {
    id, delta, ratio, name, blob, tags, point, when, inner, children => "kids"
} skip { scratch });

fn arb_float() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("not NaN", |f| !f.is_nan())
}

fn arb_inner() -> impl Strategy<Value = Inner> {
    (any::<bool>(), any::<i8>(), ".{0,40}")
        .prop_map(|(flag, small, label)| Inner { flag, small, label })
}

fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    prop_oneof![
        (0i64..=u32::MAX as i64, Just(0u32)),
        (0i64..1 << 34, 0u32..1_000_000_000),
        (any::<i64>(), 0u32..1_000_000_000),
    ]
    .prop_map(|(secs, nanos)| Timestamp::new(secs, nanos).unwrap_or_default())
}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        (any::<u64>(), any::<i64>(), arb_float(), ".{0,300}"),
        prop::collection::vec(any::<u8>(), 0..300),
        prop::collection::vec(".{0,8}", 0..20),
        (arb_float(), arb_float()),
        arb_timestamp(),
        arb_inner(),
        prop::collection::vec(arb_inner(), 0..18),
    )
        .prop_map(|((id, delta, ratio, name), blob, tags, (re, im), when, inner, children)| Record {
            id,
            delta,
            ratio,
            name,
            blob: ByteBuf::from(blob),
            tags,
            point: Complex::new(re, im),
            when,
            inner,
            children,
            scratch: 0,
        })
}

fn arb_config() -> impl Strategy<Value = Config> {
    prop_oneof![Just(Config::map()), Just(Config::array())]
}

proptest! {
    #[test]
    fn phase_agreement(record in arb_record(), config in arb_config()) {
        let len = encoded_len(&record, config).unwrap();
        let bytes = to_vec_with(&record, config).unwrap();
        prop_assert_eq!(bytes.len(), len);
    }

    #[test]
    fn record_roundtrip(record in arb_record(), config in arb_config()) {
        let bytes = to_vec_with(&record, config).unwrap();
        let (decoded, len) = from_slice::<Record>(&bytes).unwrap();
        prop_assert_eq!(len, bytes.len());
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn signed_integer_width(value in any::<i64>()) {
        let bytes = to_vec(&value).unwrap();
        prop_assert_eq!(bytes.len(), size::int(value));
        prop_assert_eq!(from_slice::<i64>(&bytes).unwrap(), (value, bytes.len()));
    }

    #[test]
    fn unsigned_integer_width(value in any::<u64>()) {
        let bytes = to_vec(&value).unwrap();
        prop_assert_eq!(bytes.len(), size::uint(value));
        prop_assert_eq!(from_slice::<u64>(&bytes).unwrap(), (value, bytes.len()));
    }

    #[test]
    fn string_length_classes(len in 0usize..70_000) {
        let text = "a".repeat(len);
        let bytes = to_vec(&text).unwrap();
        prop_assert_eq!(bytes.len(), size::str(len).unwrap());
        let expected_code = match len {
            0..=31 => 0xA0 | len as u8,
            32..=255 => 0xD9,
            256..=65535 => 0xDA,
            _ => 0xDB,
        };
        prop_assert_eq!(bytes[0], expected_code);
        prop_assert_eq!(from_slice::<&str>(&bytes).unwrap(), (text.as_str(), bytes.len()));
    }

    #[test]
    fn float_bits_roundtrip(value in any::<f64>(), narrow in any::<f32>()) {
        let bytes = to_vec(&value).unwrap();
        let (decoded, _) = from_slice::<f64>(&bytes).unwrap();
        prop_assert_eq!(decoded.to_bits(), value.to_bits());
        let bytes = to_vec(&narrow).unwrap();
        let (decoded, _) = from_slice::<f32>(&bytes).unwrap();
        prop_assert_eq!(decoded.to_bits(), narrow.to_bits());
    }
}
