//! On-disk layouts of the registry file and the per-task status files.
//!
//! Both files are fixed-width little-endian records, independent of any
//! in-memory struct layout.
//!
//! Task record (152 bytes):
//! - `0..4`     id (u32)
//! - `4..132`   path, NUL-padded UTF-8
//! - `132..152` status-file name, NUL-padded UTF-8
//!
//! Registry file: record count (u32) followed by `count` task records.
//!
//! Status record (176 bytes): a task record followed by
//! - `152..156` priority (1..=3)
//! - `156..160` progress (0..=100)
//! - `160..164` state (0 pending, 1 in progress, 2 done)
//! - `164..168` files seen
//! - `168..172` directories seen
//! - `172..176` message length

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::model::{Priority, TaskRecord, TaskState, TaskStatus};

pub const PATH_WIDTH: usize = 128;
pub const STATUS_FILE_WIDTH: usize = 20;
pub const RECORD_SIZE: usize = 4 + PATH_WIDTH + STATUS_FILE_WIDTH;
pub const COUNT_SIZE: usize = 4;
pub const STATUS_SIZE: usize = RECORD_SIZE + 6 * 4;

/// Longest path that survives encoding with a terminating NUL.
pub const MAX_PATH_LEN: usize = PATH_WIDTH - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("invalid state value {0}")]
    InvalidState(u32),

    #[error("invalid priority value {0}")]
    InvalidPriority(u32),

    #[error("field is not valid UTF-8")]
    NotUtf8,

    #[error("unexpected end of record")]
    UnexpectedEof,
}

impl From<std::io::Error> for LayoutError {
    // Cursor reads only fail by running out of bytes.
    fn from(_: std::io::Error) -> Self {
        LayoutError::UnexpectedEof
    }
}

fn write_fixed(out: &mut Vec<u8>, value: &str, width: usize) {
    let mut end = value.len().min(width);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    out.extend_from_slice(&value.as_bytes()[..end]);
    out.resize(out.len() + (width - end), 0);
}

fn read_fixed(cursor: &mut Cursor<&[u8]>, width: usize) -> Result<String, LayoutError> {
    let mut buf = vec![0u8; width];
    cursor.read_exact(&mut buf)?;
    let len = buf.iter().position(|&b| b == 0).unwrap_or(width);
    buf.truncate(len);
    String::from_utf8(buf).map_err(|_| LayoutError::NotUtf8)
}

fn ensure_len(data: &[u8], expected: usize) -> Result<(), LayoutError> {
    if data.len() < expected {
        return Err(LayoutError::Truncated {
            expected,
            got: data.len(),
        });
    }
    Ok(())
}

fn encode_record_into(out: &mut Vec<u8>, record: &TaskRecord) {
    // Writes into a Vec cannot fail.
    let _ = out.write_u32::<LittleEndian>(record.id);
    write_fixed(out, &record.path, PATH_WIDTH);
    write_fixed(out, &record.status_file, STATUS_FILE_WIDTH);
}

fn decode_record_from(cursor: &mut Cursor<&[u8]>) -> Result<TaskRecord, LayoutError> {
    let id = cursor.read_u32::<LittleEndian>()?;
    let path = read_fixed(cursor, PATH_WIDTH)?;
    let status_file = read_fixed(cursor, STATUS_FILE_WIDTH)?;
    Ok(TaskRecord {
        id,
        path,
        status_file,
    })
}

pub fn encode_record(record: &TaskRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_SIZE);
    encode_record_into(&mut out, record);
    out
}

pub fn decode_record(data: &[u8]) -> Result<TaskRecord, LayoutError> {
    ensure_len(data, RECORD_SIZE)?;
    decode_record_from(&mut Cursor::new(data))
}

/// Encode the full registry: count followed by every record.
pub fn encode_registry(records: &[TaskRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(COUNT_SIZE + records.len() * RECORD_SIZE);
    let _ = out.write_u32::<LittleEndian>(records.len() as u32);
    for record in records {
        encode_record_into(&mut out, record);
    }
    out
}

/// Decode a registry file. An empty file is an empty registry.
pub fn decode_registry(data: &[u8]) -> Result<Vec<TaskRecord>, LayoutError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    ensure_len(data, COUNT_SIZE)?;
    let mut cursor = Cursor::new(data);
    let count = cursor.read_u32::<LittleEndian>()? as usize;
    ensure_len(data, COUNT_SIZE + count * RECORD_SIZE)?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(decode_record_from(&mut cursor)?);
    }
    Ok(records)
}

pub fn encode_status(status: &TaskStatus) -> Vec<u8> {
    let mut out = Vec::with_capacity(STATUS_SIZE);
    encode_record_into(&mut out, &status.record);
    for value in [
        status.priority.as_u32(),
        status.progress,
        status.state.as_u32(),
        status.files_seen,
        status.dirs_seen,
        status.message_len,
    ] {
        let _ = out.write_u32::<LittleEndian>(value);
    }
    out
}

pub fn decode_status(data: &[u8]) -> Result<TaskStatus, LayoutError> {
    ensure_len(data, STATUS_SIZE)?;
    let mut cursor = Cursor::new(data);
    let record = decode_record_from(&mut cursor)?;

    let raw_priority = cursor.read_u32::<LittleEndian>()?;
    let progress = cursor.read_u32::<LittleEndian>()?;
    let raw_state = cursor.read_u32::<LittleEndian>()?;
    let files_seen = cursor.read_u32::<LittleEndian>()?;
    let dirs_seen = cursor.read_u32::<LittleEndian>()?;
    let message_len = cursor.read_u32::<LittleEndian>()?;

    let priority =
        Priority::from_u32(raw_priority).ok_or(LayoutError::InvalidPriority(raw_priority))?;
    let state = TaskState::from_u32(raw_state).ok_or(LayoutError::InvalidState(raw_state))?;

    Ok(TaskStatus {
        record,
        priority,
        progress,
        state,
        files_seen,
        dirs_seen,
        message_len,
    })
}

/// Write a status record in one call so readers holding the lock never see half of it.
pub fn write_status<W: Write>(out: &mut W, status: &TaskStatus) -> std::io::Result<()> {
    out.write_all(&encode_status(status))
}
