use crate::core::vlq::{decode_slice, VlqError, CONTINUE};
use log::trace;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A position-tracked wrapper over a seekable byte stream. The parser reads
/// through this type only, so the current offset is always known and unknown
/// chunks can be skipped without reading them.
pub(crate) struct ByteSource<R: Read + Seek> {
    inner: R,
    /// Number of bytes consumed so far (the `tell` of the stream as the
    /// parser sees it; a buffered peek byte is not counted).
    position: u64,
    peeked: Option<u8>,
}

#[derive(Debug, Snafu)]
pub enum ByteError {
    #[snafu(display("io error around byte {}: {}", position, source))]
    Io {
        position: u64,
        source: std::io::Error,
    },

    #[snafu(display("unexpected end reached around byte {}", position))]
    End { position: u64 },

    #[snafu(display("too many bytes while reading vlq around {}", position))]
    VlqTooBig { position: u64 },

    #[snafu(display("problem decoding vlq around {}: {}", position, source))]
    VlqDecode { position: u64, source: VlqError },

    #[snafu(display("unable to open '{}': {}", path.display(), source))]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub(crate) type ByteResult<T> = std::result::Result<T, ByteError>;

const BUF_CAPACITY: usize = 1024 * 1024;

impl ByteSource<BufReader<File>> {
    pub(crate) fn new_file<P: AsRef<Path>>(path: P) -> ByteResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).context(FileOpenSnafu { path })?;
        Ok(Self::new(BufReader::with_capacity(BUF_CAPACITY, f)))
    }
}

impl<R: Read + Seek> ByteSource<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            peeked: None,
        }
    }

    /// The number of bytes consumed so far.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    fn next_byte(&mut self) -> ByteResult<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            return match self.inner.read(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(buf[0])),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
                Err(e) => Err(e).context(IoSnafu {
                    position: self.position,
                }),
            };
        }
    }

    /// Read a single byte and advance. Returns `None` at the end of the
    /// stream.
    pub(crate) fn read(&mut self) -> ByteResult<Option<u8>> {
        let value = match self.peeked.take() {
            Some(b) => Some(b),
            None => self.next_byte()?,
        };
        if let Some(b) = value {
            trace!("read {:#04x} at position {}", b, self.position);
            self.position += 1;
        }
        Ok(value)
    }

    pub(crate) fn read_or_die(&mut self) -> ByteResult<u8> {
        let position = self.position;
        self.read()?.context(EndSnafu { position })
    }

    /// Look at the next byte without consuming it.
    pub(crate) fn peek(&mut self) -> ByteResult<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.next_byte()?;
        }
        Ok(self.peeked)
    }

    pub(crate) fn read2(&mut self) -> ByteResult<[u8; 2]> {
        Ok([self.read_or_die()?, self.read_or_die()?])
    }

    pub(crate) fn read4(&mut self) -> ByteResult<[u8; 4]> {
        Ok([
            self.read_or_die()?,
            self.read_or_die()?,
            self.read_or_die()?,
            self.read_or_die()?,
        ])
    }

    pub(crate) fn read_u16(&mut self) -> ByteResult<u16> {
        let bytes = self.read2()?;
        Ok(u16::from_be_bytes(bytes))
    }

    pub(crate) fn read_u32(&mut self) -> ByteResult<u32> {
        let bytes = self.read4()?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub(crate) fn read_n(&mut self, num_bytes: usize) -> ByteResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(num_bytes);
        for _ in 0..num_bytes {
            bytes.push(self.read_or_die()?)
        }
        Ok(bytes)
    }

    pub(crate) fn read_vlq_bytes(&mut self) -> ByteResult<Vec<u8>> {
        let mut retval = Vec::new();
        // initialize with the continue bit set
        let mut current_byte = CONTINUE;
        while current_byte & CONTINUE == CONTINUE {
            ensure!(
                retval.len() < 4,
                VlqTooBigSnafu {
                    position: self.position
                }
            );
            current_byte = self.read_or_die()?;
            retval.push(current_byte);
        }
        Ok(retval)
    }

    pub(crate) fn read_vlq_u32(&mut self) -> ByteResult<u32> {
        let bytes = self.read_vlq_bytes()?;
        let decoded = decode_slice(&bytes).context(VlqDecodeSnafu {
            position: self.position,
        })?;
        trace!("decoded vlq value {} from {} bytes", decoded, bytes.len());
        Ok(decoded)
    }

    /// Seek forward over `num_bytes` without delivering them.
    pub(crate) fn skip(&mut self, num_bytes: u64) -> ByteResult<()> {
        let mut remaining = num_bytes;
        if remaining > 0 && self.peeked.take().is_some() {
            self.position += 1;
            remaining -= 1;
        }
        if remaining > 0 {
            self.inner
                .seek(SeekFrom::Current(remaining as i64))
                .context(IoSnafu {
                    position: self.position,
                })?;
            self.position += remaining;
        }
        Ok(())
    }
}
