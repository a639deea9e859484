// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Append-Only Stream Log
//!
//! One file per stream. Envelopes are framed, checksummed and fsync'd before
//! the store publishes them to readers.
//!
//! # File Format
//! ```text
//! [Header][Frame][Frame][Frame]...
//! ```
//!
//! Header:
//! - magic: u32 ("CIML")
//! - version: u32 (1)
//! - stream_id_len: u32
//! - stream_id: UTF-8 bytes
//!
//! Frame:
//! - len: u32
//! - crc32: u32 (of body)
//! - body: bincode(Envelope)
//!
//! A frame whose declared length runs past EOF is a torn write and is
//! discarded. A complete frame with a bad checksum is corruption.
//!
//! The header is written to `<name>.log.tmp`, fsync'd and renamed into
//! place, so a `.log` file never holds a partial header. A file that does
//! anyway (copied in, or written by an older build) reads as
//! [`EventLogError::IncompleteHeader`]: it never held an envelope.

use cim_kernel::config::MAX_STREAM_ID_LEN;
use cim_kernel::envelope::Envelope;
use cim_kernel::types::id::StreamId;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOG_MAGIC: u32 = u32::from_le_bytes(*b"CIML");
pub const LOG_VERSION: u32 = 1;
pub const LOG_EXTENSION: &str = "log";
pub const TEMP_EXTENSION: &str = "tmp";

const FRAME_HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid header")]
    InvalidHeader,

    /// The file ends inside a well-formed header prefix.
    #[error("Incomplete header ({len} bytes)")]
    IncompleteHeader { len: usize },

    #[error("Log belongs to stream {found}, expected {expected}")]
    StreamMismatch { expected: String, found: String },

    #[error("Corrupted frame at offset {offset}")]
    Corrupted { offset: u64 },
}

pub type Result<T> = std::result::Result<T, EventLogError>;

/// File name of a stream's log: first 16 bytes of BLAKE3(stream_id), hex.
pub fn log_file_name(stream_id: &StreamId) -> String {
    let digest = blake3::hash(stream_id.as_str().as_bytes());
    let mut name = String::with_capacity(32 + 1 + LOG_EXTENSION.len());
    for b in &digest.as_bytes()[..16] {
        name.push_str(&format!("{:02x}", b));
    }
    name.push('.');
    name.push_str(LOG_EXTENSION);
    name
}

struct EventLogHeader {
    version: u32,
    stream_id: StreamId,
}

impl EventLogHeader {
    fn to_bytes(&self) -> Vec<u8> {
        let id = self.stream_id.as_str().as_bytes();
        let mut bytes = Vec::with_capacity(12 + id.len());
        bytes.extend_from_slice(&LOG_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&(id.len() as u32).to_le_bytes());
        bytes.extend_from_slice(id);
        bytes
    }

    /// Parses the header, returning it and its encoded length.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, usize)> {
        let magic = LOG_MAGIC.to_le_bytes();
        let prefix = bytes.len().min(magic.len());
        if bytes[..prefix] != magic[..prefix] {
            return Err(EventLogError::InvalidHeader);
        }
        let incomplete = EventLogError::IncompleteHeader { len: bytes.len() };

        let word = |at: usize| -> Option<u32> {
            bytes
                .get(at..at + 4)
                .and_then(|s| s.try_into().ok())
                .map(u32::from_le_bytes)
        };
        let Some(version) = word(4) else {
            return Err(incomplete);
        };
        if version != LOG_VERSION {
            return Err(EventLogError::InvalidHeader);
        }
        let Some(id_len) = word(8).map(|n| n as usize) else {
            return Err(incomplete);
        };
        if id_len == 0 || id_len > MAX_STREAM_ID_LEN {
            return Err(EventLogError::InvalidHeader);
        }
        let Some(id_bytes) = bytes.get(12..12 + id_len) else {
            return Err(incomplete);
        };
        let id = std::str::from_utf8(id_bytes).map_err(|_| EventLogError::InvalidHeader)?;
        let stream_id = StreamId::new(id).map_err(|_| EventLogError::InvalidHeader)?;
        Ok((Self { version, stream_id }, 12 + id_len))
    }
}

/// Everything recoverable from one log file.
#[derive(Debug)]
pub struct LogContents {
    pub stream_id: StreamId,
    pub envelopes: Vec<Envelope>,
    /// Byte length of the header plus every complete frame.
    pub valid_len: u64,
    /// True if trailing bytes of an incomplete frame were found.
    pub torn_tail: bool,
}

fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(envelope, bincode::config::standard())
        .map_err(|e| EventLogError::Serialization(e.to_string()))?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reads a whole stream log.
pub fn read_stream_log(path: impl AsRef<Path>) -> Result<LogContents> {
    let data = std::fs::read(path.as_ref())?;
    let (header, mut offset) = EventLogHeader::from_bytes(&data)?;

    let mut envelopes = Vec::new();
    let mut torn_tail = false;

    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < FRAME_HEADER_LEN {
            torn_tail = true;
            break;
        }
        let len = u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as usize;
        let crc = u32::from_le_bytes([data[offset + 4], data[offset + 5], data[offset + 6], data[offset + 7]]);
        if remaining - FRAME_HEADER_LEN < len {
            torn_tail = true;
            break;
        }

        let body = &data[offset + FRAME_HEADER_LEN..offset + FRAME_HEADER_LEN + len];
        if crc32fast::hash(body) != crc {
            return Err(EventLogError::Corrupted { offset: offset as u64 });
        }
        let (envelope, read): (Envelope, usize) =
            bincode::serde::decode_from_slice(body, bincode::config::standard())
                .map_err(|_| EventLogError::Corrupted { offset: offset as u64 })?;
        if read != len {
            return Err(EventLogError::Corrupted { offset: offset as u64 });
        }
        if envelope.stream_id != header.stream_id {
            return Err(EventLogError::StreamMismatch {
                expected: header.stream_id.to_string(),
                found: envelope.stream_id.to_string(),
            });
        }

        envelopes.push(envelope);
        offset += FRAME_HEADER_LEN + len;
    }

    if torn_tail {
        tracing::warn!(
            "Torn tail in log of stream {} at offset {} ({} bytes discarded)",
            header.stream_id,
            offset,
            data.len() - offset
        );
    }

    Ok(LogContents {
        stream_id: header.stream_id,
        envelopes,
        valid_len: offset as u64,
        torn_tail,
    })
}

/// `<name>.log.tmp`, the staging file of a log being created.
pub fn temp_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(".");
    name.push(TEMP_EXTENSION);
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Append-Only Stream Log Writer
///
/// # Safety Guarantees
/// - A batch is written with one `write_all` and fsync'd before returning
/// - A failed batch is truncated away, so the file never holds half a batch
pub struct EventLogWriter {
    path: PathBuf,
    file: File,
    len: u64,
    event_count: u64,
    fsync: bool,
}

impl EventLogWriter {
    /// Creates a new, empty log for `stream_id`. Fails if the file exists.
    ///
    /// The header lands in a temp file first and is renamed into place, so
    /// `path` either does not exist or holds a complete header.
    pub fn create(path: impl AsRef<Path>, stream_id: &StreamId, fsync: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("log {:?} already exists", path),
            )
            .into());
        }

        let header = EventLogHeader {
            version: LOG_VERSION,
            stream_id: stream_id.clone(),
        }
        .to_bytes();

        let tmp = temp_path(&path);
        {
            let mut staged = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp)?;
            staged.write_all(&header)?;
            if fsync {
                staged.sync_all()?;
            }
        }
        std::fs::rename(&tmp, &path)?;
        if fsync {
            sync_parent_dir(&path)?;
        }

        let file = OpenOptions::new().read(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            len: header.len() as u64,
            event_count: 0,
            fsync,
        })
    }

    /// Opens an existing log for appending and returns what it holds.
    ///
    /// A torn tail is truncated so new frames follow the last good one.
    pub fn open(path: impl AsRef<Path>, fsync: bool) -> Result<(Self, LogContents)> {
        let path = path.as_ref().to_path_buf();
        let contents = read_stream_log(&path)?;

        let file = OpenOptions::new().read(true).append(true).open(&path)?;
        if contents.torn_tail {
            file.set_len(contents.valid_len)?;
            file.sync_all()?;
        }

        let writer = Self {
            path,
            file,
            len: contents.valid_len,
            event_count: contents.envelopes.len() as u64,
            fsync,
        };
        Ok((writer, contents))
    }

    /// Appends a batch of envelopes atomically.
    ///
    /// Only returns Ok() after durable write (when fsync is enabled).
    pub fn append_batch(&mut self, envelopes: &[Envelope]) -> Result<()> {
        let mut buf = Vec::new();
        for envelope in envelopes {
            buf.extend_from_slice(&encode_frame(envelope)?);
        }

        let written = self.file.write_all(&buf).and_then(|_| {
            if self.fsync {
                self.file.sync_all()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            // Roll the file back to the last complete batch.
            if let Err(trunc) = self.file.set_len(self.len) {
                tracing::error!("Failed to truncate {:?} after write error: {}", self.path, trunc);
            }
            return Err(e.into());
        }

        self.len += buf.len() as u64;
        self.event_count += envelopes.len() as u64;
        Ok(())
    }

    /// Forces buffered data to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of envelopes in the log
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Byte length of the log
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
