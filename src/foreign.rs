/// Writer back-ends for foreign containers
#[cfg(feature = "std")]
use std::{vec::Vec, collections::VecDeque, io::Cursor};
#[cfg(all(feature = "alloc",not(feature = "std")))]
use alloc::{vec::Vec, collections::VecDeque};

#[allow(unused_imports)]
use super::*;

#[cfg(any(feature = "std", feature = "alloc"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "std", feature = "alloc"))))]
impl SerWrite for Vec<u8> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        self.push(byte);
        Ok(())
    }
    #[inline]
    fn reserve(&mut self, additional: usize) {
        self.reserve_exact(additional)
    }
}

#[cfg(any(feature = "std", feature = "alloc"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "std", feature = "alloc"))))]
impl SerWrite for VecDeque<u8> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        self.extend(buf.iter().copied());
        Ok(())
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        self.push_back(byte);
        Ok(())
    }
    #[inline]
    fn reserve(&mut self, additional: usize) {
        self.reserve_exact(additional)
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
impl<T> SerWrite for Cursor<T>
    where Cursor<T>: std::io::Write
{
    #[inline]
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        std::io::Write::write_all(self, buf).map_err(|_| CursorError::BufferFull)
    }
}

#[cfg(feature = "arrayvec")]
#[cfg_attr(docsrs, doc(cfg(feature = "arrayvec")))]
impl<const CAP: usize> SerWrite for arrayvec::ArrayVec<u8, CAP> {
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        self.try_extend_from_slice(buf).map_err(|_| CursorError::BufferFull)
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        self.try_push(byte).map_err(|_| CursorError::BufferFull)
    }
}

#[cfg(feature = "heapless")]
#[cfg_attr(docsrs, doc(cfg(feature = "heapless")))]
impl<const CAP: usize> SerWrite for heapless::Vec<u8, CAP> {
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        self.extend_from_slice(buf).map_err(|_| CursorError::BufferFull)
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        self.push(byte).map_err(|_| CursorError::BufferFull)
    }
}

#[cfg(feature = "smallvec")]
#[cfg_attr(docsrs, doc(cfg(feature = "smallvec")))]
impl<const N: usize> SerWrite for smallvec::SmallVec<[u8; N]>
    where [u8; N]: smallvec::Array<Item = u8>
{
    #[inline]
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        self.push(byte);
        Ok(())
    }
    #[inline]
    fn reserve(&mut self, additional: usize) {
        self.reserve_exact(additional)
    }
}

#[cfg(feature = "tinyvec")]
#[cfg_attr(docsrs, doc(cfg(feature = "tinyvec")))]
impl<const CAP: usize> SerWrite for tinyvec::ArrayVec<[u8; CAP]>
    where [u8; CAP]: tinyvec::Array<Item = u8>
{
    fn write(&mut self, buf: &[u8]) -> CursorResult<()> {
        let spare = self.grab_spare_slice_mut();
        match spare.get_mut(..buf.len()) {
            Some(chunk) => {
                chunk.copy_from_slice(buf);
                let len = self.len() + buf.len();
                self.set_len(len);
                Ok(())
            }
            None => Err(CursorError::BufferFull)
        }
    }
    #[inline]
    fn write_byte(&mut self, byte: u8) -> CursorResult<()> {
        match self.try_push(byte) {
            None => Ok(()),
            Some(_) => Err(CursorError::BufferFull)
        }
    }
}

#[cfg(test)]
mod tests {
    #[allow(unused_imports)]
    use super::*;

    // fixstr "msgpack" followed by a uint16
    #[allow(dead_code)]
    const MESSAGE: &[u8] = b"\xA7msgpack\xCD\x01\x00";

    #[allow(dead_code)]
    fn fill<W: SerWrite>(writer: &mut W) -> CursorResult<()> {
        writer.reserve(MESSAGE.len());
        writer.write_byte(0xA7)?;
        writer.write_str("msgpack")?;
        writer.write(&[0xCD, 0x01, 0x00])
    }

    #[cfg(any(feature = "std", feature = "alloc"))]
    #[test]
    fn test_writer_vec() {
        let mut writer = Vec::new();
        fill(&mut writer).unwrap();
        assert_eq!(writer, MESSAGE);
        assert!(writer.capacity() >= MESSAGE.len());
        // through the blanket impl
        fill(&mut &mut writer).unwrap();
        assert_eq!(writer.len(), 2 * MESSAGE.len());
    }

    #[cfg(any(feature = "std", feature = "alloc"))]
    #[test]
    fn test_writer_vec_deque() {
        let mut writer = VecDeque::new();
        fill(&mut writer).unwrap();
        assert_eq!(writer, MESSAGE);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_writer_cursor() {
        let mut writer = Cursor::new([0u8;11]);
        fill(&mut writer).unwrap();
        assert_eq!(writer.get_ref(), MESSAGE);
        assert_eq!(writer.write_byte(0xC0), Err(CursorError::BufferFull));
    }

    #[cfg(feature = "arrayvec")]
    #[test]
    fn test_writer_arrayvec() {
        let mut writer = arrayvec::ArrayVec::<u8,11>::new();
        fill(&mut writer).unwrap();
        assert_eq!(writer.as_slice(), MESSAGE);
        assert_eq!(writer.write_byte(0xC0), Err(CursorError::BufferFull));
        let mut writer = arrayvec::ArrayVec::<u8,10>::new();
        assert_eq!(fill(&mut writer), Err(CursorError::BufferFull));
    }

    #[cfg(feature = "heapless")]
    #[test]
    fn test_writer_heapless() {
        let mut writer = heapless::Vec::<u8,11>::new();
        fill(&mut writer).unwrap();
        assert_eq!(writer.as_slice(), MESSAGE);
        assert_eq!(writer.write(&[0xC0]), Err(CursorError::BufferFull));
    }

    #[cfg(feature = "smallvec")]
    #[test]
    fn test_writer_smallvec() {
        let mut writer = smallvec::SmallVec::<[u8; 4]>::new();
        fill(&mut writer).unwrap();
        assert_eq!(writer.as_slice(), MESSAGE);
        assert!(writer.spilled());
    }

    #[cfg(feature = "tinyvec")]
    #[test]
    fn test_writer_tinyvec() {
        let mut writer = tinyvec::ArrayVec::<[u8; 12]>::new();
        fill(&mut writer).unwrap();
        assert_eq!(writer.write(&[0xC0, 0xC0]), Err(CursorError::BufferFull));
        writer.write_byte(0xC0).unwrap();
        assert_eq!(&writer[..11], MESSAGE);
        assert_eq!(writer.write_byte(0xC0), Err(CursorError::BufferFull));
    }
}
