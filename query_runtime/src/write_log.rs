//! Append-only write log: length-prefixed protobuf frames.
//!
//! Storage format:
//!   [4-byte LE length][ProtoWriteBatch bytes][4-byte LE length][...]...
//!
//! Rules:
//!   - append only, sequences start at 1 and increase by exactly 1
//!   - a frame length of 0 or above `MAX_FRAME_LEN` is corrupt
//!   - a partial header or frame at the tail is a truncated log

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use prost::Message;
use thiserror::Error;

use crate::proto_bridge::{batch_to_proto, proto_to_write};
use crate::proto_types::ProtoWriteBatch;
use crate::store::TableWrite;

pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WriteLogError {
    #[error("write log i/o: {0}")]
    Io(#[from] io::Error),

    #[error("invalid frame length {len} at frame {frame}")]
    InvalidFrameLength { frame: usize, len: usize },

    #[error("truncated write log at frame {frame}")]
    Truncated { frame: usize },

    #[error("protobuf decode error at frame {frame}: {reason}")]
    Decode { frame: usize, reason: String },

    #[error("sequence violation in write log: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },

    #[error("malformed write: {0}")]
    Bridge(String),
}

/// One committed batch as recorded in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedBatch {
    pub sequence: u64,
    pub writes: Vec<TableWrite>,
}

pub struct WriteLogWriter<W: Write> {
    inner: W,
    last_sequence: u64,
}

impl<W: Write> WriteLogWriter<W> {
    /// Start a fresh log.
    pub fn new(inner: W) -> Self {
        Self::resume(inner, 0)
    }

    /// Continue a log whose last frame carries `last_sequence`.
    pub fn resume(inner: W, last_sequence: u64) -> Self {
        Self {
            inner,
            last_sequence,
        }
    }

    pub fn append(&mut self, sequence: u64, writes: &[TableWrite]) -> Result<(), WriteLogError> {
        let expected = self.last_sequence + 1;
        if sequence != expected {
            return Err(WriteLogError::SequenceViolation {
                expected,
                got: sequence,
            });
        }

        let buf = batch_to_proto(sequence, writes).encode_to_vec();
        if buf.is_empty() || buf.len() > MAX_FRAME_LEN {
            return Err(WriteLogError::InvalidFrameLength {
                frame: sequence as usize - 1,
                len: buf.len(),
            });
        }
        self.inner.write_all(&(buf.len() as u32).to_le_bytes())?;
        self.inner.write_all(&buf)?;
        self.inner.flush()?;

        self.last_sequence = sequence;
        Ok(())
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl WriteLogWriter<File> {
    /// Open or create a log file, resuming after its last frame.
    pub fn open(path: &Path) -> Result<Self, WriteLogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let last_sequence = if path.exists() {
            let existing = read_write_log(BufReader::new(File::open(path)?))?;
            existing.last().map_or(0, |b| b.sequence)
        } else {
            0
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::resume(file, last_sequence))
    }

    /// fsync the underlying file.
    pub fn sync(&self) -> Result<(), WriteLogError> {
        self.inner.sync_all()?;
        Ok(())
    }
}

/// Fill `buf` from `reader`. Returns the number of bytes read, which is
/// short only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read every batch from a log, validating frame integrity and sequence
/// contiguity.
pub fn read_write_log<R: Read>(mut reader: R) -> Result<Vec<LoggedBatch>, WriteLogError> {
    let mut batches: Vec<LoggedBatch> = Vec::new();
    let mut len_buf = [0u8; 4];

    loop {
        let frame = batches.len();
        match read_full(&mut reader, &mut len_buf)? {
            0 => break,
            4 => {}
            _ => return Err(WriteLogError::Truncated { frame }),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(WriteLogError::InvalidFrameLength { frame, len });
        }

        let mut body = vec![0u8; len];
        if read_full(&mut reader, &mut body)? != len {
            return Err(WriteLogError::Truncated { frame });
        }

        let proto = ProtoWriteBatch::decode(body.as_slice()).map_err(|e| WriteLogError::Decode {
            frame,
            reason: e.to_string(),
        })?;

        let expected = batches.last().map_or(1, |b| b.sequence + 1);
        if proto.sequence != expected {
            return Err(WriteLogError::SequenceViolation {
                expected,
                got: proto.sequence,
            });
        }

        let writes = proto
            .writes
            .iter()
            .map(proto_to_write)
            .collect::<Result<Vec<_>, _>>()?;
        batches.push(LoggedBatch {
            sequence: proto.sequence,
            writes,
        });
    }

    Ok(batches)
}
