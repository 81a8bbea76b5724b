use std::io::{self, Write};
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::format_parser::ArgEncoder;
use crate::handler_cache::{DecodeIndex, HandlerCache, Statistics};
use crate::loggable::LogArg;

/// Optional per-frame fields. The reader must be configured with the same
/// flags: they are part of the stream's grammar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// Include the handler's 4-byte index after the hash.
    pub send_string_index: bool,
    /// Include a 2-byte filename hash and a 2-byte line number.
    pub add_source_line: bool,
    /// Include an 8-byte monotonically increasing frame counter.
    pub send_log_index: bool,
    /// Include an 8-byte timestamp from the injected clock.
    pub add_timestamp: bool,
}

/// Callbacks bracketing every frame. The default does nothing; a sink with
/// packet boundaries (UDP, framed files) can use them to prefix each frame
/// with a length or magic, since the stream itself is not self-synchronizing.
pub trait FrameHook {
    fn frame_start(&mut self, sink: &mut dyn Write) -> io::Result<()> {
        let _ = sink;
        Ok(())
    }

    fn frame_end(&mut self, sink: &mut dyn Write) -> io::Result<()> {
        let _ = sink;
        Ok(())
    }
}

/// The no-op hook.
pub struct NoopHook;

impl FrameHook for NoopHook {}

fn zero_timestamp() -> i64 {
    0
}

/// Construction parameters for a [`Logger`].
///
/// `text_base`/`text_size` come from the text-segment probe; `(0, 0)` is the
/// documented degenerate mode in which every format string resolves through
/// the content-keyed cache.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub text_base: usize,
    pub text_size: usize,
    pub flags: Flags,
    pub timestamp_fn: fn() -> i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            text_base: 0,
            text_size: 0,
            flags: Flags::default(),
            timestamp_fn: zero_timestamp,
        }
    }
}

impl Config {
    pub fn new(text_base: usize, text_size: usize) -> Self {
        Config { text_base, text_size, ..Default::default() }
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn send_string_index(mut self, enabled: bool) -> Self {
        self.flags.send_string_index = enabled;
        self
    }

    pub fn add_source_line(mut self, enabled: bool) -> Self {
        self.flags.add_source_line = enabled;
        self
    }

    pub fn send_log_index(mut self, enabled: bool) -> Self {
        self.flags.send_log_index = enabled;
        self
    }

    pub fn add_timestamp(mut self, enabled: bool) -> Self {
        self.flags.add_timestamp = enabled;
        self
    }

    pub fn timestamp_fn(mut self, f: fn() -> i64) -> Self {
        self.timestamp_fn = f;
        self
    }
}

/// The binary frame encoder.
///
/// Each `log` call appends exactly one frame to the sink:
///
/// ```text
/// [ u32 hash ]
/// [ u32 index            if send_string_index ]
/// [ u16 filename_hash    if add_source_line   ]
/// [ u16 line             if add_source_line   ]
/// [ u64 log_index        if send_log_index    ]
/// [ i64 timestamp        if add_timestamp     ]
/// [ per-arg payload ... ]
/// ```
///
/// All multi-byte integers are little-endian. Integer arguments occupy their
/// native width; string arguments are a u16 length followed by raw UTF-8.
///
/// A logger is single-writer: the cache and the sink are mutated without
/// locks, so concurrent `log` calls need external mutual exclusion.
pub struct Logger<W: Write> {
    sink: W,
    hook: Box<dyn FrameHook>,
    cache: HandlerCache,
    flags: Flags,
    timestamp_fn: fn() -> i64,
    log_index: AtomicU64,
}

impl<W: Write> Logger<W> {
    pub fn new(sink: W, config: Config) -> Self {
        Self::with_hook(sink, Box::new(NoopHook), config)
    }

    pub fn with_hook(sink: W, hook: Box<dyn FrameHook>, config: Config) -> Self {
        Logger {
            sink,
            hook,
            cache: HandlerCache::new(config.text_base, config.text_size),
            flags: config.flags,
            timestamp_fn: config.timestamp_fn,
            log_index: AtomicU64::new(0),
        }
    }

    /// Encodes one frame. On `BadFormat` or `Arity` nothing is written; a
    /// sink failure can leave partial bytes behind `frame_start`, which is
    /// the frame hook's seam to recover.
    #[track_caller]
    pub fn log(&mut self, fmt: &str, args: &[LogArg<'_>]) -> Result<()> {
        let location = if self.flags.add_source_line {
            Some(Location::caller())
        } else {
            None
        };
        let handler =
            self.cache
                .resolve(fmt, args, self.flags.send_string_index, location)?;
        if handler.plan.args.len() != args.len() {
            return Err(Error::Arity {
                expected: handler.plan.args.len(),
                actual: args.len(),
            });
        }

        self.hook.frame_start(&mut self.sink)?;
        self.sink.write_all(&handler.hash_bytes)?;
        if self.flags.send_string_index {
            self.sink.write_all(&handler.index_bytes)?;
        }
        if self.flags.add_source_line {
            if let Some(src) = &handler.source {
                self.sink.write_all(&src.filename_bytes)?;
                self.sink.write_all(&src.line_bytes)?;
            }
        }
        if self.flags.send_log_index {
            let index = self.log_index.fetch_add(1, Ordering::Relaxed) + 1;
            self.sink.write_all(&index.to_le_bytes())?;
        }
        if self.flags.add_timestamp {
            let ts = (self.timestamp_fn)();
            self.sink.write_all(&ts.to_le_bytes())?;
        }

        for (plan, arg) in handler.plan.args.iter().zip(args) {
            match plan.encoder {
                // A type clash against a cached plan still writes plan-shaped
                // bytes so the stream stays decodable.
                ArgEncoder::FixedBytes(count) => {
                    let widened = arg.widened().to_le_bytes();
                    self.sink.write_all(&widened[..count])?;
                }
                ArgEncoder::LengthPrefixedString => {
                    let LogArg::Str(s) = arg else {
                        return Err(Error::BadFormat(format!(
                            "argument for %s in \"{fmt}\" is not a string"
                        )));
                    };
                    let bytes = s.as_bytes();
                    // The length field saturates; longer arguments truncate.
                    let len = bytes.len().min(u16::MAX as usize);
                    self.sink.write_all(&(len as u16).to_le_bytes())?;
                    self.sink.write_all(&bytes[..len])?;
                }
            }
        }
        self.hook.frame_end(&mut self.sink)?;
        Ok(())
    }

    /// Counters accumulated by the resolver, by copy.
    pub fn statistics(&self) -> Statistics {
        self.cache.statistics()
    }

    /// Snapshot of `{hash -> handler, filename hash -> filename}` for the
    /// reader. Take it after encoding has quiesced, or under the caller's
    /// own synchronization.
    pub fn index_snapshot(&self) -> DecodeIndex {
        self.cache.snapshot()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

impl<W: Write> Drop for Logger<W> {
    fn drop(&mut self) {
        let _ = self.sink.flush();
    }
}

/// Printf-like front end: wraps each argument into a [`LogArg`] and forwards
/// to [`Logger::log`], keeping the format string a borrowed literal so the
/// address-indexed cache can see it.
#[macro_export]
macro_rules! log_record {
    ($logger:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($fmt, &[$($crate::LogArg::from($arg)),*])
    };
}
