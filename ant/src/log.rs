// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Append-only msgpack log of transport-level events, for offline replay and
//! debugging. Wire-compatible with the original Python implementation's log
//! format.

use std::io::{Read, Write};

use rmp::decode::{self, ValueReadError};
use rmp::encode;

use crate::error::IoError;

const MAGIC: &[u8] = b"ANT-LOG";
const VERSION: u8 = 0x01;

/// What happened to produce a given log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogEvent {
    Open = 0x01,
    Close = 0x02,
    Read = 0x03,
    Write = 0x04,
}

impl LogEvent {
    fn from_code(code: u8) -> Option<LogEvent> {
        Some(match code {
            0x01 => LogEvent::Open,
            0x02 => LogEvent::Close,
            0x03 => LogEvent::Read,
            0x04 => LogEvent::Write,
            _ => return None,
        })
    }
}

/// One decoded record: the event, when it happened, and the bytes involved
/// (empty for `Open`/`Close`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub event: LogEvent,
    pub timestamp: u64,
    pub data: Vec<u8>,
}

/// Appends records to a log file, writing the header on first use.
pub struct EventLogWriter<W: Write> {
    inner: W,
    header_written: bool,
}

impl<W: Write> EventLogWriter<W> {
    pub fn new(inner: W) -> Self {
        EventLogWriter {
            inner,
            header_written: false,
        }
    }

    fn ensure_header(&mut self) -> Result<(), IoError> {
        if self.header_written {
            return Ok(());
        }
        encode::write_array_len(&mut self.inner, 2)?;
        encode::write_str(&mut self.inner, std::str::from_utf8(MAGIC).unwrap())?;
        encode::write_uint(&mut self.inner, VERSION as u64)?;
        self.header_written = true;
        Ok(())
    }

    fn write_record(&mut self, event: LogEvent, timestamp: u64, data: &[u8]) -> Result<(), IoError> {
        self.ensure_header()?;
        // A zero-length `data` is logged as a bare two-element record, same
        // as the original implementation; only non-empty payloads get a
        // third element.
        if data.is_empty() {
            encode::write_array_len(&mut self.inner, 2)?;
        } else {
            encode::write_array_len(&mut self.inner, 3)?;
        }
        encode::write_uint(&mut self.inner, event as u64)?;
        encode::write_uint(&mut self.inner, timestamp)?;
        if !data.is_empty() {
            encode::write_bin(&mut self.inner, data)?;
        }
        Ok(())
    }

    pub fn log_open(&mut self, timestamp: u64) -> Result<(), IoError> {
        self.write_record(LogEvent::Open, timestamp, &[])
    }

    pub fn log_close(&mut self, timestamp: u64) -> Result<(), IoError> {
        self.write_record(LogEvent::Close, timestamp, &[])
    }

    pub fn log_read(&mut self, timestamp: u64, data: &[u8]) -> Result<(), IoError> {
        if data.is_empty() {
            return Ok(());
        }
        self.write_record(LogEvent::Read, timestamp, data)
    }

    pub fn log_write(&mut self, timestamp: u64, data: &[u8]) -> Result<(), IoError> {
        if data.is_empty() {
            return Ok(());
        }
        self.write_record(LogEvent::Write, timestamp, data)
    }

    pub fn flush(&mut self) -> Result<(), IoError> {
        self.inner.flush().map_err(IoError::Io)
    }
}

/// Reads records back out of a log file written by [`EventLogWriter`].
pub struct EventLogReader<R: Read> {
    inner: R,
    header_checked: bool,
}

impl<R: Read> EventLogReader<R> {
    pub fn new(inner: R) -> Self {
        EventLogReader {
            inner,
            header_checked: false,
        }
    }

    fn check_header(&mut self) -> Result<(), IoError> {
        if self.header_checked {
            return Ok(());
        }
        let len = decode::read_array_len(&mut self.inner).map_err(|_| IoError::BadFormat)?;
        if len != 2 {
            return Err(IoError::BadFormat);
        }
        let mut buf = [0u8; 32];
        let magic = decode::read_str(&mut self.inner, &mut buf).map_err(|_| IoError::BadFormat)?;
        if magic.as_bytes() != MAGIC {
            return Err(IoError::BadFormat);
        }
        let version: u64 = decode::read_int(&mut self.inner).map_err(|_| IoError::BadFormat)?;
        if version != VERSION as u64 {
            return Err(IoError::BadFormat);
        }
        self.header_checked = true;
        Ok(())
    }

    /// Reads the next record, or `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<LogRecord>, IoError> {
        self.check_header()?;

        let len = match decode::read_array_len(&mut self.inner) {
            Ok(len) => len,
            Err(ValueReadError::InvalidMarkerRead(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(None)
            }
            Err(_) => return Err(IoError::BadFormat),
        };
        if len != 2 && len != 3 {
            return Err(IoError::BadFormat);
        }

        let code: u64 = decode::read_int(&mut self.inner).map_err(|_| IoError::BadFormat)?;
        let event = LogEvent::from_code(code as u8).ok_or(IoError::BadFormat)?;
        let timestamp: u64 = decode::read_int(&mut self.inner).map_err(|_| IoError::BadFormat)?;

        let data = if len == 3 {
            let bin_len = decode::read_bin_len(&mut self.inner).map_err(|_| IoError::BadFormat)?;
            let mut buf = vec![0u8; bin_len as usize];
            self.inner.read_exact(&mut buf).map_err(IoError::Io)?;
            buf
        } else {
            Vec::new()
        };

        Ok(Some(LogRecord {
            event,
            timestamp,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_open_and_data_records() {
        let mut buf = Vec::new();
        {
            let mut writer = EventLogWriter::new(&mut buf);
            writer.log_open(1000).unwrap();
            writer.log_write(1001, &[0xA4, 0x01, 0x4A, 0x00, 0xEF]).unwrap();
            writer.log_read(1002, &[]).unwrap();
            writer.log_close(1003).unwrap();
        }

        let mut reader = EventLogReader::new(buf.as_slice());
        let open = reader.next_record().unwrap().unwrap();
        assert_eq!(open.event, LogEvent::Open);
        assert_eq!(open.timestamp, 1000);
        assert!(open.data.is_empty());

        let write = reader.next_record().unwrap().unwrap();
        assert_eq!(write.event, LogEvent::Write);
        assert_eq!(write.data, vec![0xA4, 0x01, 0x4A, 0x00, 0xEF]);

        let close = reader.next_record().unwrap().unwrap();
        assert_eq!(close.event, LogEvent::Close);
        assert_eq!(close.timestamp, 1003);

        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn empty_read_and_write_are_not_logged() {
        let mut buf = Vec::new();
        {
            let mut writer = EventLogWriter::new(&mut buf);
            writer.log_open(0).unwrap();
            writer.log_read(1, &[]).unwrap();
            writer.log_write(2, &[]).unwrap();
        }
        let mut reader = EventLogReader::new(buf.as_slice());
        let only = reader.next_record().unwrap().unwrap();
        assert_eq!(only.event, LogEvent::Open);
        assert!(reader.next_record().unwrap().is_none());
    }
}
