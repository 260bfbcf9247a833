//! Append-only action store: binary protobuf log.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Append only; written frames are never rewritten
//!   - fsync after every write
//!   - Sequence strictly increasing (validated on append)

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;

use crate::error::{Result, RuntimeError};
use crate::proto_types::ProtoActionEnvelope;

/// Largest frame accepted when reading a log back.
const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Append-only action log backed by a binary file.
pub struct ActionStore {
    path: PathBuf,
    last_sequence: u64,
}

impl ActionStore {
    /// Open or create an action log at the given path.
    /// Reads existing frames to determine the last sequence number.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_sequence = if path.exists() {
            let actions = Self::read_all_from_file(path)?;
            actions.last().map(|a| a.sequence).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    /// Append a single action to the log.
    ///
    /// Validates strict sequence ordering.
    /// Writes length-prefixed protobuf and fsyncs.
    pub fn append(&mut self, action: &ProtoActionEnvelope) -> Result<()> {
        let expected = self.last_sequence + 1;
        if action.sequence != expected {
            return Err(RuntimeError::CorruptLog(format!(
                "sequence violation on append: expected {}, got {}",
                expected, action.sequence
            )));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let buf = action.encode_to_vec();
        let len = u32::try_from(buf.len())
            .map_err(|_| RuntimeError::CorruptLog(format!("frame too large: {}", buf.len())))?;

        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        file.sync_all()?;

        self.last_sequence = action.sequence;
        Ok(())
    }

    /// Load all actions from the log in sequence order.
    pub fn load_all(&self) -> Result<Vec<ProtoActionEnvelope>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all_from_file(&self.path)
    }

    /// Get the last sequence number in the log.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all frames from a file, validating frame integrity and order.
    fn read_all_from_file(path: &Path) -> Result<Vec<ProtoActionEnvelope>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut actions: Vec<ProtoActionEnvelope> = Vec::new();
        let mut len_buf = [0u8; 4];

        loop {
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(RuntimeError::CorruptLog(format!(
                    "invalid frame length {} after {} frames",
                    len,
                    actions.len()
                )));
            }

            let mut frame = vec![0u8; len];
            reader.read_exact(&mut frame).map_err(|e| {
                RuntimeError::CorruptLog(format!(
                    "truncated frame after {} frames: {}",
                    actions.len(),
                    e
                ))
            })?;

            let action = ProtoActionEnvelope::decode(frame.as_slice())?;

            let expected = actions.last().map(|a| a.sequence).unwrap_or(0) + 1;
            if action.sequence != expected {
                return Err(RuntimeError::CorruptLog(format!(
                    "out-of-order frame: expected sequence {}, found {}",
                    expected, action.sequence
                )));
            }

            actions.push(action);
        }

        Ok(actions)
    }
}
