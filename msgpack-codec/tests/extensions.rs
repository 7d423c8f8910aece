use serde::{Deserialize, Serialize};

use msgpack_codec::ext::{self, Complex, Ext, Extension, Timestamp, COMPLEX_TAG};
use msgpack_codec::{from_slice, to_vec, Deserializer, Error, Kind};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Celsius(i16);

impl Extension for Celsius {
    const FAMILY: &'static str = "celsius";

    fn payload_len(&self) -> usize {
        2
    }

    fn write_payload(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.to_be_bytes());
    }

    fn read_payload(payload: &[u8]) -> Option<Self> {
        Some(Celsius(i16::from_be_bytes(payload.try_into().ok()?)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Unknown;

impl Extension for Unknown {
    const FAMILY: &'static str = "unknown";

    fn payload_len(&self) -> usize {
        0
    }

    fn write_payload(&self, _out: &mut [u8]) {}

    fn read_payload(payload: &[u8]) -> Option<Self> {
        payload.is_empty().then_some(Unknown)
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Reading {
    #[serde(with = "msgpack_codec::ext")]
    temp: Celsius,
    at: Timestamp,
}

#[test]
fn registry() {
    assert_eq!(ext::tag_of::<Complex<f32>>(), Ok(COMPLEX_TAG));
    assert_eq!(ext::tag_of::<Timestamp>(), Ok(-1));
    assert!(matches!(ext::tag_of::<Celsius>(), Err(Error::UnregisteredExtension { .. })));

    assert_eq!(
        ext::register::<Celsius>(-1),
        Err(Error::ExtensionConflict {
            type_name: core::any::type_name::<Celsius>(),
            reason: "tag is owned by another family"
        })
    );
    ext::register::<Celsius>(7).unwrap();
    assert_eq!(ext::tag_of::<Celsius>(), Ok(7));
    assert!(matches!(ext::register::<Celsius>(7),
                     Err(Error::ExtensionConflict { reason: "type is already registered", .. })));
    assert!(matches!(ext::set_family_tag("celsius", -128),
                     Err(Error::ExtensionConflict { reason: "tag is owned by another family", .. })));
    assert!(matches!(ext::set_family_tag("kelvin", 9),
                     Err(Error::ExtensionConflict { reason: "family is not registered", .. })));

    assert_eq!(to_vec(&Ext(Celsius(-5))).unwrap(), b"\xD5\x07\xFF\xFB");
    ext::set_family_tag("celsius", 8).unwrap();
    assert_eq!(ext::tag_of::<Celsius>(), Ok(8));
    assert_eq!(to_vec(&Ext(Celsius(-5))).unwrap(), b"\xD5\x08\xFF\xFB");
    assert_eq!(from_slice::<Ext<Celsius>>(b"\xD5\x08\xFF\xFB"), Ok((Ext(Celsius(-5)), 4)));
    assert_eq!(from_slice::<Ext<Celsius>>(b"\xD5\x07\xFF\xFB"),
               Err(Error::ExtensionTypeMismatch { expected: 8, found: 7, offset: 0 }));

    let reading = Reading { temp: Celsius(21), at: Timestamp::from_secs(1_700_000_000) };
    let bytes = to_vec(&reading).unwrap();
    assert_eq!(&bytes[..10], b"\x82\xA4temp\xD5\x08\x00\x15");
    assert_eq!(from_slice::<Reading>(&bytes), Ok((reading, bytes.len())));

    assert!(matches!(to_vec(&Ext(Unknown)), Err(Error::Custom(..))));
}

#[test]
fn complex_wire_format() {
    let bytes = b"\xD7\x80\x3F\x80\x00\x00\x40\x00\x00\x00";
    assert_eq!(from_slice::<Complex<f32>>(bytes), Ok((Complex::new(1.0, 2.0), 10)));
    let mut de = Deserializer::from_slice(bytes);
    assert_eq!(de.decode_ext::<Complex<f32>>(), Ok(Complex::new(1.0, 2.0)));
    assert_eq!(de.end(), Ok(0));

    let value = Complex::new(1.5f32, -2.5);
    let bytes = to_vec(&value).unwrap();
    assert_eq!(bytes, b"\xD7\x80\x3F\xC0\x00\x00\xC0\x20\x00\x00");
    assert_eq!(from_slice::<Complex<f32>>(&bytes), Ok((value, 10)));
    // the same payload in an ext 8 envelope is not a complex number
    let ext8 = b"\xC7\x08\x80\x3F\xC0\x00\x00\xC0\x20\x00\x00";
    assert_eq!(from_slice::<Complex<f32>>(ext8),
               Err(Error::UnexpectedFormatCode { code: 0xC7, offset: 0, kind: Kind::Ext }));
    assert_eq!(Deserializer::from_slice(ext8).decode_ext::<Complex<f32>>(),
               Err(Error::UnexpectedFormatCode { code: 0xC7, offset: 0, kind: Kind::Ext }));
    // while the untyped ext parser takes any envelope
    assert_eq!(Deserializer::from_slice(ext8).parse_ext(COMPLEX_TAG), Ok(&ext8[3..]));

    let value = Complex::new(1.0f64, -2.0);
    let bytes = to_vec(&value).unwrap();
    assert_eq!(bytes, b"\xD8\x80\x3F\xF0\x00\x00\x00\x00\x00\x00\xC0\x00\x00\x00\x00\x00\x00\x00");
    assert_eq!(from_slice::<Complex<f64>>(&bytes), Ok((value, 18)));
    assert_eq!(from_slice::<Complex<f32>>(&bytes), Ok((Complex::new(1.0, -2.0), 18)));
}

#[test]
fn complex_mismatch() {
    // a 64-bit timestamp where a complex number is expected
    let ts = to_vec(&Timestamp::new(3, 500).unwrap()).unwrap();
    assert_eq!(ts[0], 0xD7);
    assert_eq!(from_slice::<Complex<f32>>(&ts),
               Err(Error::ExtensionTypeMismatch { expected: COMPLEX_TAG, found: -1, offset: 0 }));
    // a 32-bit timestamp is rejected by its envelope before the tag is read
    let ts = to_vec(&Timestamp::from_secs(3)).unwrap();
    assert_eq!(from_slice::<Complex<f32>>(&ts),
               Err(Error::UnexpectedFormatCode { code: 0xD6, offset: 0, kind: Kind::Ext }));
    // a string where a complex number is expected
    assert_eq!(from_slice::<Complex<f64>>(b"\xA1x"),
               Err(Error::UnexpectedFormatCode { code: 0xA1, offset: 0, kind: Kind::Ext }));
    // truncated payload
    assert_eq!(from_slice::<Complex<f64>>(b"\xD8\x80\x00"),
               Err(Error::TruncatedInput { offset: 2, needed: 16 }));
    // envelopes other than fixext 8 and fixext 16
    let mut de = Deserializer::from_slice(b"\xC7\x03\x80\x00\x00\x00");
    assert_eq!(de.decode_ext::<Complex<f64>>(),
               Err(Error::UnexpectedFormatCode { code: 0xC7, offset: 0, kind: Kind::Ext }));
    assert_eq!(from_slice::<Complex<f32>>(b"\xD6\x80\x00\x00\x00\x00"),
               Err(Error::UnexpectedFormatCode { code: 0xD6, offset: 0, kind: Kind::Ext }));
    let mut ext16 = b"\xC8\x00\x10\x80".to_vec();
    ext16.extend_from_slice(&[0; 16]);
    assert_eq!(from_slice::<Complex<f64>>(&ext16),
               Err(Error::UnexpectedFormatCode { code: 0xC8, offset: 0, kind: Kind::Ext }));
}

#[derive(Debug, Default, PartialEq, Deserialize)]
struct Loose<'a> {
    text: &'a str,
    owned: String,
    #[serde(with = "serde_bytes")]
    bin: &'a [u8],
    int: u32,
    signed: i64,
    float: f64,
    list: Vec<u8>,
    map: std::collections::BTreeMap<String, u8>,
    maybe: Option<u8>,
}

#[test]
fn nil_coalescing() {
    let input = b"\x99\xC0\xC0\xC0\xC0\xC0\xC0\xC0\xC0\xC0";
    assert_eq!(from_slice::<Loose>(input), Ok((Loose::default(), 10)));
    assert_eq!(from_slice::<Loose>(b"\xC0"), Err(Error::Custom("missing field `text`".into())));
    assert_eq!(from_slice::<bool>(b"\xC0"),
               Err(Error::UnexpectedFormatCode { code: 0xC0, offset: 0, kind: Kind::Bool }));
}
