// Random-access byte cursor used by every decoder

use crate::error::{Error, Result};
use crate::utils::bytes;
use crate::utils::guid::Guid;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Anything the cursor can read from
pub trait Source: Read + Seek {}

impl<T: Read + Seek> Source for T {}

/// Cursor over a fixed-size byte source.
///
/// The position is tracked locally so `tell` never touches the source. A stack
/// of boundaries restricts reads to the node currently being decoded: any read
/// crossing the innermost boundary fails with [`Error::Malformed`].
pub struct Reader {
    inner: Box<dyn Source>,
    size: u64,
    pos: u64,
    limits: Vec<u64>,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("size", &self.size)
            .field("pos", &self.pos)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Reader {
    /// Open a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            inner: Box::new(Cursor::new(data)),
            size,
            pos: 0,
            limits: Vec::new(),
        }
    }

    /// Wrap an already-open handle, starting at its current position
    pub fn new<S: Source + 'static>(mut source: S) -> Result<Self> {
        let pos = source.stream_position()?;
        let size = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(pos))?;
        Ok(Self {
            inner: Box::new(source),
            size,
            pos,
            limits: Vec::new(),
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// True while there are bytes left before the end of the source
    pub fn remaining(&self) -> bool {
        self.pos < self.size
    }

    /// Bytes left before the innermost boundary
    pub fn available(&self) -> u64 {
        self.boundary().saturating_sub(self.pos)
    }

    /// Absolute seek; a negative offset is taken from the end of the source
    pub fn seek(&mut self, offset: i64) -> Result<()> {
        let target = if offset < 0 {
            self.size
                .checked_sub(offset.unsigned_abs())
                .ok_or_else(|| Error::invalid(format!("seek {} before start of source", offset)))?
        } else {
            offset as u64
        };
        self.seek_to(target)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset != self.pos {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.pos = offset;
        }
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek_to(self.pos + count)
    }

    /// Read exactly `count` bytes
    pub fn read(&mut self, count: u64) -> Result<Vec<u8>> {
        self.check(count)?;
        let mut buffer = vec![0u8; count as usize];
        self.fill(&mut buffer)?;
        Ok(buffer)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.check(N as u64)?;
        let mut buffer = [0u8; N];
        self.fill(&mut buffer)?;
        Ok(buffer)
    }

    /// Read up to `count` bytes without moving the cursor, clipped to the boundary
    pub fn peek(&mut self, count: u64) -> Result<Vec<u8>> {
        let count = count.min(self.available());
        let start = self.pos;
        let data = self.read(count)?;
        self.seek_to(start)?;
        Ok(data)
    }

    /// Read everything up to the innermost boundary
    pub fn read_rest(&mut self) -> Result<Vec<u8>> {
        self.read(self.available())
    }

    /// Restrict subsequent reads to end before `end`
    pub fn push_limit(&mut self, end: u64) {
        let end = end.min(self.boundary());
        self.limits.push(end);
    }

    pub fn pop_limit(&mut self) {
        self.limits.pop();
    }

    fn boundary(&self) -> u64 {
        self.limits.last().copied().unwrap_or(self.size)
    }

    fn check(&self, count: u64) -> Result<()> {
        let end = self.pos.checked_add(count);
        match end {
            Some(end) if end <= self.boundary() => Ok(()),
            _ => Err(Error::malformed(
                self.pos,
                format!("read of {} bytes crosses boundary at {}", count, self.boundary()),
            )),
        }
    }

    fn fill(&mut self, buffer: &mut [u8]) -> Result<()> {
        if let Err(e) = self.inner.read_exact(buffer) {
            // a failed read may leave the handle anywhere; put it back at `pos`
            self.inner.seek(SeekFrom::Start(self.pos))?;
            return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::malformed(self.pos, "unexpected end of source")
            } else {
                Error::SourceAccess(e)
            });
        }
        self.pos += buffer.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read little-endian 16-bit integer
    pub fn read_le_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read little-endian 32-bit integer
    pub fn read_le_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_le_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_le_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read big-endian 16-bit integer
    pub fn read_be_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read big-endian 32-bit integer
    pub fn read_be_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_be_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Read synchsafe 32-bit integer (7 bits per byte)
    pub fn read_syncsafe_u32(&mut self) -> Result<u32> {
        Ok(bytes::decode_syncsafe(self.read_array()?))
    }

    /// Read a Microsoft mixed-endian GUID
    pub fn read_guid(&mut self) -> Result<Guid> {
        Ok(Guid::from_ms_bytes(self.read_array()?))
    }

    /// Check if the source has `signature` at the current position without consuming it
    pub fn check_signature(&mut self, signature: &[u8]) -> Result<bool> {
        let found = self.peek(signature.len() as u64)?;
        Ok(found == signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_negative_from_end() {
        let mut reader = Reader::from_bytes(b"0123456789".to_vec());
        reader.seek(-3).unwrap();
        assert_eq!(reader.tell(), 7);
        assert_eq!(reader.read(3).unwrap(), b"789");
        assert!(!reader.remaining());
        assert!(matches!(reader.seek(-11), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_short_read_is_malformed() {
        let mut reader = Reader::from_bytes(vec![1, 2, 3]);
        reader.skip(2).unwrap();
        assert!(matches!(reader.read_le_u16(), Err(Error::Malformed { offset: 2, .. })));
        assert_eq!(reader.tell(), 2);
    }

    #[test]
    fn test_limits_nest_and_clip() {
        let mut reader = Reader::from_bytes((0u8..32).collect());
        reader.push_limit(16);
        reader.push_limit(40);
        assert_eq!(reader.available(), 16);
        reader.pop_limit();
        reader.push_limit(4);
        assert_eq!(reader.read(4).unwrap(), vec![0, 1, 2, 3]);
        assert!(reader.read_u8().is_err());
        reader.pop_limit();
        assert_eq!(reader.read_u8().unwrap(), 4);
        reader.pop_limit();
        assert_eq!(reader.available(), 27);
    }

    #[test]
    fn test_typed_reads() {
        let mut reader = Reader::from_bytes(vec![
            0x34, 0x12, 0x12, 0x34, 0x78, 0x56, 0x34, 0x12, 0x7F, 0x7F, 0x7F, 0x7F,
        ]);
        assert_eq!(reader.read_le_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_be_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_le_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.read_syncsafe_u32().unwrap(), 0x0FFF_FFFF);
    }

    #[test]
    fn test_peek_keeps_position() {
        let mut reader = Reader::from_bytes(b"ID3\x04".to_vec());
        assert!(reader.check_signature(b"ID3").unwrap());
        assert_eq!(reader.tell(), 0);
        assert_eq!(reader.peek(10).unwrap().len(), 4);
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"abcdef").unwrap();
        file.seek(SeekFrom::Start(2)).unwrap();
        let mut reader = Reader::new(file).unwrap();
        assert_eq!(reader.size(), 6);
        assert_eq!(reader.tell(), 2);
        assert_eq!(reader.read(2).unwrap(), b"cd");
    }

    #[test]
    fn test_failed_read_keeps_cursor_in_sync() {
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"abcdefghij").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut reader = Reader::new(file.try_clone().unwrap()).unwrap();
        // the source shrinks after its size was taken
        file.set_len(4).unwrap();

        assert!(matches!(reader.read(8), Err(Error::Malformed { offset: 0, .. })));
        assert_eq!(reader.tell(), 0);
        assert_eq!(reader.read(4).unwrap(), b"abcd");
    }
}
