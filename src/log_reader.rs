use std::fmt;
use std::sync::Arc;

use crate::binary_logger::Flags;
use crate::error::{Error, Result};
use crate::format_parser::{is_flag_rune, ArgEncoder};
use crate::handler::Handler;
use crate::handler_cache::DecodeIndex;

/// A single argument value recovered from a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogValue {
    /// Signed integer, sign-extended from its encoded width.
    Int(i64),
    /// Unsigned integer, zero-extended from its encoded width.
    Uint(u64),
    /// Length-prefixed string payload.
    Str(String),
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Int(v) => write!(f, "{v}"),
            LogValue::Uint(v) => write!(f, "{v}"),
            LogValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One decoded log record.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// The format string the frame was encoded against.
    pub fmt_string: String,
    /// Decoded arguments, one per verb.
    pub args: Vec<LogValue>,
    /// Source file of the call site, when the stream carries source lines.
    pub filename: Option<String>,
    /// Source line of the call site, when the stream carries source lines.
    pub line: Option<u16>,
    /// Frame counter, when the stream carries log indexes.
    pub index: Option<u64>,
    /// Clock reading, when the stream carries timestamps.
    pub timestamp: Option<i64>,
}

impl LogEntry {
    /// Renders the format string with the decoded arguments substituted.
    ///
    /// `%d`/`%i` print decimal, `%x` hex, `%c` a character, `%s` the string;
    /// `%%` prints a percent sign. Width and precision runes were never
    /// interpreted by the encoder and are skipped here as well.
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(self.fmt_string.len() + 16);
        let mut args = self.args.iter();
        let mut chars = self.fmt_string.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }
            while matches!(chars.peek(), Some(&c) if is_flag_rune(c)) {
                chars.next();
            }
            let (verb, value) = match (chars.next(), args.next()) {
                (Some(verb), Some(value)) => (verb, value),
                (Some(verb), None) => {
                    out.push('%');
                    out.push(verb);
                    continue;
                }
                (None, _) => break,
            };
            match verb {
                'x' => match value {
                    LogValue::Int(v) if *v < 0 => {
                        out.push_str(&format!("-{:x}", v.unsigned_abs()))
                    }
                    LogValue::Int(v) => out.push_str(&format!("{v:x}")),
                    LogValue::Uint(v) => out.push_str(&format!("{v:x}")),
                    LogValue::Str(s) => out.push_str(s),
                },
                'c' => {
                    let code = match value {
                        LogValue::Int(v) => *v as u32,
                        LogValue::Uint(v) => *v as u32,
                        LogValue::Str(_) => u32::from(char::REPLACEMENT_CHARACTER),
                    };
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                // 'd', 'i', 's', and anything else: plain Display.
                _ => out.push_str(&value.to_string()),
            }
        }
        out
    }
}

/// Offline reader for the binary frame stream.
///
/// Requires the encoder's index snapshot and the exact flag settings the
/// stream was produced with; the flags are part of the stream's grammar, so
/// any disagreement surfaces as `ShortRead`, `UnknownHash`,
/// `UnknownFilename`, or `IndexMismatch`.
///
/// The reader is free to be orders of magnitude slower than the encoder; it
/// allocates per entry and per string argument.
pub struct LogReader<'a> {
    data: &'a [u8],
    pos: usize,
    index: &'a DecodeIndex,
    flags: Flags,
}

impl<'a> LogReader<'a> {
    pub fn new(data: &'a [u8], index: &'a DecodeIndex, flags: Flags) -> Self {
        LogReader { data, pos: 0, index, flags }
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(Error::ShortRead { needed: len, offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads the next frame. Returns `Ok(None)` at a clean end of stream;
    /// an unknown hash leaves the reader positioned just past the hash.
    pub fn read_entry(&mut self) -> Result<Option<LogEntry>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let hash = self.read_u32()?;
        let handler: Arc<Handler> = self
            .index
            .handlers
            .get(&hash)
            .cloned()
            .ok_or(Error::UnknownHash { hash })?;

        if self.flags.send_string_index {
            let frame_index = self.read_u32()?;
            let handler_index = handler.index.unwrap_or(0);
            if frame_index != handler_index {
                return Err(Error::IndexMismatch {
                    frame: frame_index,
                    handler: handler_index,
                });
            }
        }

        let (filename, line) = if self.flags.add_source_line {
            let filename_hash = self.read_u16()?;
            let filename = self
                .index
                .filenames
                .get(&filename_hash)
                .cloned()
                .ok_or(Error::UnknownFilename { hash: filename_hash })?;
            let line = self.read_u16()?;
            (Some(filename), Some(line))
        } else {
            (None, None)
        };

        let index = if self.flags.send_log_index {
            Some(self.read_u64()?)
        } else {
            None
        };

        let timestamp = if self.flags.add_timestamp {
            Some(self.read_u64()? as i64)
        } else {
            None
        };

        let mut args = Vec::with_capacity(handler.plan.args.len());
        for plan in &handler.plan.args {
            match plan.encoder {
                ArgEncoder::FixedBytes(count) => {
                    let raw = self.read_bytes(count)?;
                    args.push(widen_integer(raw, plan.kind.is_signed()));
                }
                ArgEncoder::LengthPrefixedString => {
                    let len = self.read_u16()? as usize;
                    let raw = self.read_bytes(len)?;
                    args.push(LogValue::Str(String::from_utf8_lossy(raw).into_owned()));
                }
            }
        }

        Ok(Some(LogEntry {
            fmt_string: handler.plan.fmt_string.clone(),
            args,
            filename,
            line,
            index,
            timestamp,
        }))
    }
}

/// Reassembles an integer from its encoded width, mirroring the declared
/// type exactly: sign-extend when it was signed, zero-extend otherwise.
fn widen_integer(raw: &[u8], signed: bool) -> LogValue {
    let mut buf = [0u8; 8];
    buf[..raw.len()].copy_from_slice(raw);
    let value = u64::from_le_bytes(buf);
    if signed {
        let shift = 64 - raw.len() * 8;
        LogValue::Int(((value << shift) as i64) >> shift)
    } else {
        LogValue::Uint(value)
    }
}
