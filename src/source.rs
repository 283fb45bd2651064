//! Random-access byte source abstraction.
//!
//! Every read the decoders issue is an absolute `seek + read` against a
//! [`ByteSource`]: a disk image file, an opened block device, or an in-memory
//! buffer in tests. The source is supplied by the caller; this crate never
//! enumerates devices itself.

use std::io::{self, Read, Seek, SeekFrom};

/// A random-access, seekable sequence of bytes.
///
/// All offsets are absolute from the start of the underlying device or image.
/// The handle is not assumed safe for concurrent use; callers serialize
/// access externally if they share one.
pub trait ByteSource {
    /// Fills `buf` with the bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with an I/O error carrying the attempted offset and length if
    /// the range is unreadable.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Returns the total length of the source in bytes.
    fn len(&mut self) -> io::Result<u64>;

    /// Reads `length` bytes at `offset` into a fresh buffer.
    fn read_vec(&mut self, offset: u64, length: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads one `sector_size`-byte sector into `buf`, resizing it as needed.
    fn read_sector(&mut self, sector: u64, sector_size: usize, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.resize(sector_size, 0);
        self.read_at(sector * sector_size as u64, buf)
    }
}

/// Any seekable reader is a byte source: `File`, `Cursor<Vec<u8>>`, ...
impl<T: Read + Seek> ByteSource for T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!(
                    "failed to read {} bytes at offset {}: {}",
                    buf.len(),
                    offset,
                    err
                ),
            )
        })
    }

    fn len(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }
}
