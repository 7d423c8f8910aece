use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use msgpack_codec::aggregate::{self, Aggregate, FieldDef};
use msgpack_codec::{
    cache, encoded_len, from_slice, impl_aggregate, to_slice, to_vec, to_vec_with, to_writer,
    Config, Error,
};

/// An aggregate with `N` fields named `f0`, `f1`, ...
#[derive(Debug, Clone, PartialEq)]
struct Wide<const N: usize> {
    values: Vec<u8>,
}

impl<const N: usize> Wide<N> {
    fn filled() -> Self {
        Wide { values: (0..N).map(|i| (i % 100) as u8).collect() }
    }
}

impl<const N: usize> Default for Wide<N> {
    fn default() -> Self {
        Wide { values: vec![0; N] }
    }
}

impl<const N: usize> Aggregate for Wide<N> {
    const NAME: &'static str = "Wide";

    fn fields() -> &'static [FieldDef] {
        let fields: Vec<FieldDef> = (0..N)
            .map(|i| FieldDef::new(Box::leak(format!("f{i}").into_boxed_str())))
            .collect();
        Box::leak(fields.into_boxed_slice())
    }

    fn serialize_field<S>(&self, index: usize, key: &'static str, state: &mut S) -> Result<(), S::Error>
        where S: SerializeStruct
    {
        state.serialize_field(key, &self.values[index])
    }

    fn deserialize_field<'de, D>(&mut self, index: usize, deserializer: D) -> Result<(), D::Error>
        where D: Deserializer<'de>
    {
        self.values[index] = u8::deserialize(deserializer)?;
        Ok(())
    }
}

impl<const N: usize> Serialize for Wide<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        aggregate::serialize(self, serializer)
    }
}

impl<'de, const N: usize> Deserialize<'de> for Wide<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        aggregate::deserialize(deserializer)
    }
}

fn check_headers<const N: usize>(map_header: &[u8], array_header: &[u8]) {
    let wide = Wide::<N>::filled();

    let bytes = to_vec(&wide).unwrap();
    assert_eq!(&bytes[..map_header.len()], map_header, "map header of {N} fields");
    assert_eq!(encoded_len(&wide, Config::map()), Ok(bytes.len()));

    let bytes = to_vec_with(&wide, Config::array()).unwrap();
    assert_eq!(&bytes[..array_header.len()], array_header, "array header of {N} fields");
    assert_eq!(bytes.len(), array_header.len() + N);
    assert_eq!(from_slice::<Wide<N>>(&bytes), Ok((wide, bytes.len())));
}

#[test]
fn format_class_boundaries() {
    check_headers::<15>(b"\x8F", b"\x9F");
    check_headers::<16>(b"\xDE\x00\x10", b"\xDC\x00\x10");
    check_headers::<65535>(b"\xDE\xFF\xFF", b"\xDC\xFF\xFF");
    check_headers::<65536>(b"\xDF\x00\x01\x00\x00", b"\xDD\x00\x01\x00\x00");
}

#[test]
fn map_keys_by_name() {
    let wide = Wide::<16>::filled();
    let bytes = to_vec(&wide).unwrap();
    assert_eq!(&bytes[3..7], b"\xA2f0\x00");
    assert_eq!(from_slice::<Wide<16>>(&bytes), Ok((wide, bytes.len())));
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Example {
    a: i64,
    b: String,
}

impl_aggregate!(Example { a => "A", b => "B" });

#[test]
fn struct_example_bytes() {
    let value = Example { a: 1, b: "hi".into() };
    assert_eq!(encoded_len(&value, Config::map()), Ok(9));
    assert_eq!(to_vec(&value).unwrap(), [0x82, 0xA1, b'A', 0x01, 0xA1, b'B', 0xA2, b'h', b'i']);
    assert_eq!(encoded_len(&value, Config::array()), Ok(5));
    assert_eq!(to_vec_with(&value, Config::array()).unwrap(), [0x92, 0x01, 0xA2, b'h', b'i']);
}

#[test]
fn every_entry_point_agrees() {
    let value = Example { a: -40_000, b: "x".repeat(40) };
    for config in [Config::map(), Config::array()] {
        let len = encoded_len(&value, config).unwrap();
        let vec = to_vec_with(&value, config).unwrap();
        assert_eq!(vec.len(), len);

        let mut buf = vec![0xAAu8; len + 3];
        assert_eq!(to_slice(&mut buf, &value, config), Ok(len));
        assert_eq!(&buf[..len], &vec[..]);
        assert_eq!(&buf[len..], &[0xAA; 3]);

        let mut short = vec![0u8; len - 1];
        assert_eq!(to_slice(&mut short, &value, config), Err(Error::BufferFull));
        assert!(short.iter().all(|&b| b == 0));

        let mut out = Vec::new();
        assert_eq!(to_writer(&mut out, &value, config), Ok(len));
        assert_eq!(out, vec);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Shared {
    first: u32,
    second: Vec<u8>,
    third: bool,
    fourth: Option<String>,
}

impl_aggregate!(Shared { first => "1st", second, third => "3rd", fourth });

#[test]
fn cache_is_stable_across_threads() {
    let value = Shared { first: 7, second: vec![1, 2], third: true, fourth: Some("z".into()) };
    let results: Vec<(usize, Vec<u8>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| {
                let mut last = Vec::new();
                for _ in 0..100 {
                    last = to_vec(&value).unwrap();
                }
                let layout = cache::layout::<Shared>();
                (layout as *const cache::Layout as usize, last)
            }))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let layout = cache::layout::<Shared>();
    assert_eq!(layout.names(), &["1st", "second", "3rd", "fourth"]);
    assert_eq!(layout.indexes(), &[0, 1, 2, 3]);
    let expected = to_vec(&value).unwrap();
    for (address, bytes) in results {
        assert_eq!(address, layout as *const cache::Layout as usize);
        assert_eq!(bytes, expected);
    }
    assert_eq!(from_slice::<Shared>(&expected), Ok((value, expected.len())));
}

#[derive(Debug, Default, PartialEq)]
struct Nested {
    name: String,
    inner: Example,
    list: Vec<Example>,
}

impl_aggregate!(Nested { name, inner, list });

#[test]
fn nested_aggregates() {
    let value = Nested {
        name: "n".into(),
        inner: Example { a: 2, b: "b".into() },
        list: vec![Example::default(), Example { a: 300, b: String::new() }],
    };
    let bytes = to_vec_with(&value, Config::array()).unwrap();
    assert_eq!(bytes, b"\x93\xA1n\x92\x02\xA1b\x92\x92\x00\xA0\x92\xCD\x01\x2C\xA0");
    assert_eq!(from_slice::<Nested>(&bytes), Ok((value, bytes.len())));
}
