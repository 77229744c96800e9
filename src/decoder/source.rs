//! Input sources an image can be bound to.
//!
//! File and stream sources are cargo features (`file-source`,
//! `stream-source`) so targets without a host filesystem or without stream
//! drivers compile without them.

use crate::error::{ImageError, Result};
use parking_lot::Mutex;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

#[cfg(feature = "file-source")]
use std::fs::File;
#[cfg(any(feature = "file-source", feature = "stream-source"))]
use std::io::BufReader;
#[cfg(feature = "file-source")]
use std::path::PathBuf;

/// Encoded image bytes held in RAM or flash. Never copied by the widget.
#[derive(Clone)]
pub enum MemoryImage {
    Static(&'static [u8]),
    Shared(Arc<[u8]>),
}

impl AsRef<[u8]> for MemoryImage {
    fn as_ref(&self) -> &[u8] {
        match self {
            MemoryImage::Static(bytes) => bytes,
            MemoryImage::Shared(bytes) => bytes,
        }
    }
}

impl From<&'static [u8]> for MemoryImage {
    fn from(bytes: &'static [u8]) -> Self {
        MemoryImage::Static(bytes)
    }
}

impl From<Arc<[u8]>> for MemoryImage {
    fn from(bytes: Arc<[u8]>) -> Self {
        MemoryImage::Shared(bytes)
    }
}

impl From<Vec<u8>> for MemoryImage {
    fn from(bytes: Vec<u8>) -> Self {
        MemoryImage::Shared(bytes.into())
    }
}

pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// A caller-owned, already open byte stream. The widget only borrows it
/// through the lock and never closes it.
pub type SharedStream = Arc<Mutex<dyn ReadSeek>>;

pub fn shared_stream<S: ReadSeek + 'static>(stream: S) -> SharedStream {
    Arc::new(Mutex::new(stream))
}

/// Where a bound image reads its bytes from
#[derive(Clone)]
pub enum ImageSource {
    Memory(MemoryImage),
    #[cfg(feature = "file-source")]
    File(PathBuf),
    #[cfg(feature = "stream-source")]
    Stream { stream: SharedStream, start: u64 },
}

impl ImageSource {
    pub fn memory(bytes: impl Into<MemoryImage>) -> Self {
        ImageSource::Memory(bytes.into())
    }

    #[cfg(feature = "file-source")]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ImageSource::File(path.into())
    }

    /// Bind to `stream` starting at its current position.
    #[cfg(feature = "stream-source")]
    pub fn stream(stream: SharedStream) -> Result<Self> {
        let start = stream.lock().stream_position()?;
        Ok(ImageSource::Stream { stream, start })
    }

    pub fn describe(&self) -> String {
        match self {
            ImageSource::Memory(bytes) => format!("memory ({} bytes)", bytes.as_ref().len()),
            #[cfg(feature = "file-source")]
            ImageSource::File(path) => format!("file {:?}", path),
            #[cfg(feature = "stream-source")]
            ImageSource::Stream { start, .. } => format!("stream at offset {}", start),
        }
    }

    /// Open a fresh reader positioned at the first byte of the image.
    pub fn reader(&self) -> Result<SourceReader> {
        match self {
            ImageSource::Memory(bytes) => Ok(SourceReader::Memory(Cursor::new(bytes.clone()))),
            #[cfg(feature = "file-source")]
            ImageSource::File(path) => match File::open(path) {
                Ok(file) => Ok(SourceReader::File(BufReader::new(file))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(ImageError::NoSuchFile(path.display().to_string()))
                }
                Err(e) => Err(e.into()),
            },
            #[cfg(feature = "stream-source")]
            ImageSource::Stream { stream, start } => Ok(SourceReader::Stream(BufReader::new(
                StreamReader {
                    stream: Arc::clone(stream),
                    start: *start,
                    pos: 0,
                },
            ))),
        }
    }

    /// Read up to `len` bytes from the start of the image.
    pub fn read_header(&self, len: usize) -> Result<Vec<u8>> {
        let mut reader = self.reader()?;
        let mut header = Vec::with_capacity(len);
        (&mut reader).take(len as u64).read_to_end(&mut header)?;
        Ok(header)
    }
}

/// Reader over a shared stream. Each call re-seeks under the lock, so the
/// caller may use the stream between widget operations.
#[cfg(feature = "stream-source")]
pub struct StreamReader {
    stream: SharedStream,
    start: u64,
    pos: u64,
}

#[cfg(feature = "stream-source")]
impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self.stream.lock();
        stream.seek(SeekFrom::Start(self.start + self.pos))?;
        let n = stream.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(feature = "stream-source")]
impl Seek for StreamReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let end = self.stream.lock().seek(SeekFrom::End(0))?;
                end.checked_sub(self.start)
                    .and_then(|len| len.checked_add_signed(delta))
            }
        };
        match target {
            Some(offset) => {
                self.pos = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of image",
            )),
        }
    }
}

/// Buffered reader over any bound source
pub enum SourceReader {
    Memory(Cursor<MemoryImage>),
    #[cfg(feature = "file-source")]
    File(BufReader<File>),
    #[cfg(feature = "stream-source")]
    Stream(BufReader<StreamReader>),
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceReader::Memory(r) => r.read(buf),
            #[cfg(feature = "file-source")]
            SourceReader::File(r) => r.read(buf),
            #[cfg(feature = "stream-source")]
            SourceReader::Stream(r) => r.read(buf),
        }
    }
}

impl BufRead for SourceReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            SourceReader::Memory(r) => r.fill_buf(),
            #[cfg(feature = "file-source")]
            SourceReader::File(r) => r.fill_buf(),
            #[cfg(feature = "stream-source")]
            SourceReader::Stream(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            SourceReader::Memory(r) => r.consume(amt),
            #[cfg(feature = "file-source")]
            SourceReader::File(r) => r.consume(amt),
            #[cfg(feature = "stream-source")]
            SourceReader::Stream(r) => r.consume(amt),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceReader::Memory(r) => r.seek(pos),
            #[cfg(feature = "file-source")]
            SourceReader::File(r) => r.seek(pos),
            #[cfg(feature = "stream-source")]
            SourceReader::Stream(r) => r.seek(pos),
        }
    }
}
