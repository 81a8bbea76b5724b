//! Binary logger: encodes `log(format, args...)` calls into a compact frame
//! stream, resolving format strings through an address-indexed handler cache,
//! with an offline reader that reconstructs the text.

pub mod binary_logger;
pub mod clock;
pub mod error;
pub mod fmt_hash;
pub mod format_parser;
pub mod handler;
pub mod handler_cache;
pub mod log_reader;
pub mod loggable;
pub mod text_segment;

pub use binary_logger::{Config, Flags, FrameHook, Logger, NoopHook};
pub use error::{Error, Result};
pub use handler::Handler;
pub use handler_cache::{DecodeIndex, Statistics};
pub use log_reader::{LogEntry, LogReader, LogValue};
pub use loggable::{ArgKind, LogArg};
pub use text_segment::self_text_segment;
