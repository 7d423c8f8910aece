use serde::{Deserialize, Deserializer, Serialize, Serializer};

use msgpack_cursor::SliceReader;

use super::Extension;

/// Family of the complex number coders
pub const COMPLEX_FAMILY: &str = "complex";
/// Default extension tag of complex numbers
pub const COMPLEX_TAG: i8 = -128;

/// A complex number encoded as a MessagePack extension
///
/// `Complex<f32>` travels as `fixext 8` with two big-endian `float32`
/// components, `Complex<f64>` as `fixext 16` with two `float64`. Both share
/// one tag and are told apart by the payload width. No other envelope is
/// accepted on decode, not even `ext 8` with an 8 byte payload.
///
/// A `fixext 16` payload decoded into `Complex<f32>` is narrowed with
/// [`Complex::narrow`]: components out of `f32` range become infinities.
/// Decode into `Complex<f64>` and call [`Complex::try_narrow`] to detect
/// that. A `fixext 8` payload decoded into `Complex<f64>` is widened.
///
/// ```
/// use msgpack_codec::{Complex, from_slice, to_vec};
///
/// let c = Complex::new(1.0f32, 2.0);
/// let bytes = to_vec(&c).unwrap();
/// assert_eq!(bytes, b"\xD7\x80\x3F\x80\x00\x00\x40\x00\x00\x00");
/// assert_eq!(from_slice::<Complex<f32>>(&bytes).unwrap(), (c, 10));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Complex { re, im }
    }
}

impl Complex<f64> {
    /// Convert both components to `f32`, rounding to nearest.
    ///
    /// Finite components beyond the `f32` range become infinities.
    pub fn narrow(self) -> Complex<f32> {
        Complex::new(self.re as f32, self.im as f32)
    }
    /// Like [`narrow`](Self::narrow), but return `None` when a finite
    /// component would overflow to an infinity.
    pub fn try_narrow(self) -> Option<Complex<f32>> {
        let narrowed = self.narrow();
        let fits = |wide: f64, narrow: f32| narrow.is_finite() || !wide.is_finite();
        (fits(self.re, narrowed.re) && fits(self.im, narrowed.im)).then_some(narrowed)
    }
}

impl From<Complex<f32>> for Complex<f64> {
    fn from(c: Complex<f32>) -> Self {
        Complex::new(c.re.into(), c.im.into())
    }
}

fn read_pair32(payload: &[u8]) -> Option<Complex<f32>> {
    let mut reader = SliceReader::new(payload);
    Some(Complex::new(reader.read_f32().ok()?, reader.read_f32().ok()?))
}

fn read_pair64(payload: &[u8]) -> Option<Complex<f64>> {
    let mut reader = SliceReader::new(payload);
    Some(Complex::new(reader.read_f64().ok()?, reader.read_f64().ok()?))
}

impl Extension for Complex<f32> {
    const FAMILY: &'static str = COMPLEX_FAMILY;
    const FIXED_WIDTHS: &'static [usize] = &[8, 16];

    fn payload_len(&self) -> usize {
        8
    }

    fn write_payload(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.re.to_be_bytes());
        out[4..].copy_from_slice(&self.im.to_be_bytes());
    }

    fn read_payload(payload: &[u8]) -> Option<Self> {
        match payload.len() {
            8 => read_pair32(payload),
            16 => read_pair64(payload).map(Complex::narrow),
            _ => None
        }
    }
}

impl Extension for Complex<f64> {
    const FAMILY: &'static str = COMPLEX_FAMILY;
    const FIXED_WIDTHS: &'static [usize] = &[8, 16];

    fn payload_len(&self) -> usize {
        16
    }

    fn write_payload(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.re.to_be_bytes());
        out[8..].copy_from_slice(&self.im.to_be_bytes());
    }

    fn read_payload(payload: &[u8]) -> Option<Self> {
        match payload.len() {
            8 => read_pair32(payload).map(Complex::from),
            16 => read_pair64(payload),
            _ => None
        }
    }
}

macro_rules! impl_serde_complex {
    ($($ty:ty),*) => {$(
        impl Serialize for Complex<$ty> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                super::serialize(self, serializer)
            }
        }

        impl<'de> Deserialize<'de> for Complex<$ty> {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                super::deserialize(deserializer)
            }
        }
    )*};
}

impl_serde_complex!(f32, f64);
