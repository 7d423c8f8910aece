use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use msgpack_cursor::SliceReader;

use super::Extension;

/// Family of the timestamp coder
pub const TIMESTAMP_FAMILY: &str = "timestamp";
/// Extension tag reserved by MessagePack for timestamps
pub const TIMESTAMP_TAG: i8 = -1;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point in time as seconds and nanoseconds since the Unix epoch
///
/// Encoded with the narrowest of the three MessagePack timestamp forms:
///
/// * `timestamp 32`: `fixext 4`, whole seconds in `[0, 2^32)`
/// * `timestamp 64`: `fixext 8`, 30-bit nanoseconds and 34-bit seconds
/// * `timestamp 96`: `ext 8` of 12 bytes, 32-bit nanoseconds and signed 64-bit seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Return `None` if `nanos` is not below one second.
    pub const fn new(secs: i64, nanos: u32) -> Option<Self> {
        if nanos < NANOS_PER_SEC {
            Some(Timestamp { secs, nanos })
        }
        else {
            None
        }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Timestamp { secs, nanos: 0 }
    }

    pub const fn secs(&self) -> i64 {
        self.secs
    }

    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Return `None` if the timestamp is out of the range of [`SystemTime`].
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let secs = Duration::from_secs(self.secs.unsigned_abs());
        let whole = if self.secs >= 0 {
            UNIX_EPOCH.checked_add(secs)?
        }
        else {
            UNIX_EPOCH.checked_sub(secs)?
        };
        whole.checked_add(Duration::from_nanos(self.nanos.into()))
    }
}

impl From<SystemTime> for Timestamp {
    /// Saturates at the range of `i64` seconds.
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Timestamp {
                secs: i64::try_from(since.as_secs()).unwrap_or(i64::MAX),
                nanos: since.subsec_nanos()
            },
            Err(err) => {
                let before = err.duration();
                let secs = i64::try_from(before.as_secs()).map_or(i64::MIN, |secs| -secs);
                match before.subsec_nanos() {
                    0 => Timestamp { secs, nanos: 0 },
                    nanos => Timestamp {
                        secs: secs.saturating_sub(1),
                        nanos: NANOS_PER_SEC - nanos
                    }
                }
            }
        }
    }
}

impl Extension for Timestamp {
    const FAMILY: &'static str = TIMESTAMP_FAMILY;

    fn payload_len(&self) -> usize {
        if self.secs >> 34 != 0 {
            12
        }
        else if self.nanos == 0 && self.secs <= u32::MAX as i64 {
            4
        }
        else {
            8
        }
    }

    fn write_payload(&self, out: &mut [u8]) {
        match out.len() {
            4 => out.copy_from_slice(&(self.secs as u32).to_be_bytes()),
            8 => {
                let data = (u64::from(self.nanos) << 34) | self.secs as u64;
                out.copy_from_slice(&data.to_be_bytes());
            }
            _ => {
                out[..4].copy_from_slice(&self.nanos.to_be_bytes());
                out[4..].copy_from_slice(&self.secs.to_be_bytes());
            }
        }
    }

    fn read_payload(payload: &[u8]) -> Option<Self> {
        let mut reader = SliceReader::new(payload);
        match payload.len() {
            4 => Some(Timestamp::from_secs(reader.read_u32().ok()?.into())),
            8 => {
                let data = reader.read_u64().ok()?;
                Timestamp::new((data & 0x3_ffff_ffff) as i64, (data >> 34) as u32)
            }
            12 => {
                let nanos = reader.read_u32().ok()?;
                Timestamp::new(reader.read_i64().ok()?, nanos)
            }
            _ => None
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use crate::{from_slice, to_vec, Error};
    use super::*;

    #[test]
    fn test_timestamp_forms() {
        let ts = Timestamp::from_secs(u32::MAX.into());
        assert_eq!(to_vec(&ts).unwrap(), b"\xD6\xFF\xFF\xFF\xFF\xFF");
        assert_eq!(from_slice::<Timestamp>(b"\xD6\xFF\xFF\xFF\xFF\xFF"), Ok((ts, 6)));

        let ts = Timestamp::new(1, 1).unwrap();
        let bytes = to_vec(&ts).unwrap();
        assert_eq!(bytes, b"\xD7\xFF\x00\x00\x00\x04\x00\x00\x00\x01");
        assert_eq!(from_slice::<Timestamp>(&bytes), Ok((ts, 10)));

        let ts = Timestamp::from_secs(1 << 34);
        let bytes = to_vec(&ts).unwrap();
        assert_eq!(bytes, b"\xC7\x0C\xFF\x00\x00\x00\x00\x00\x00\x00\x04\x00\x00\x00\x00");
        assert_eq!(from_slice::<Timestamp>(&bytes), Ok((ts, 15)));

        let ts = Timestamp::new(-2, 999_999_999).unwrap();
        let bytes = to_vec(&ts).unwrap();
        assert_eq!(bytes.len(), 15);
        assert_eq!(from_slice::<Timestamp>(&bytes), Ok((ts, 15)));
    }

    #[test]
    fn test_timestamp_invalid() {
        assert_eq!(Timestamp::new(0, NANOS_PER_SEC), None);
        // 64-bit form with nanoseconds over the limit
        assert_eq!(from_slice::<Timestamp>(b"\xD7\xFF\xFF\xFF\xFF\xFC\x00\x00\x00\x00"),
                   Err(Error::InvalidLength { len: 8, expected: "a MessagePack timestamp extension payload".into() }));
        assert!(matches!(from_slice::<Timestamp>(b"\xD5\xFF\x00\x00"), Err(Error::InvalidLength { len: 2, .. })));
    }

    #[test]
    fn test_system_time() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let ts = Timestamp::from(time);
        assert_eq!((ts.secs(), ts.subsec_nanos()), (1_700_000_000, 123_456_789));
        assert_eq!(ts.to_system_time(), Some(time));

        let time = UNIX_EPOCH - Duration::new(1, 500_000_000);
        let ts = Timestamp::from(time);
        assert_eq!((ts.secs(), ts.subsec_nanos()), (-2, 500_000_000));
        assert_eq!(ts.to_system_time(), Some(time));

        let time = UNIX_EPOCH - Duration::from_secs(3);
        assert_eq!(Timestamp::from(time), Timestamp::from_secs(-3));
    }
}
