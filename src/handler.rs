use std::panic::Location;

use crate::error::{Error, Result};
use crate::fmt_hash;
use crate::format_parser::{parse_format, ArgPlan, FormatPlan};
use crate::loggable::LogArg;

/// Call-site identity stamped on a handler when source lines are enabled.
#[derive(Clone, Copy, Debug)]
pub struct SourceId {
    pub filename_hash: u16,
    pub line: u16,
    pub filename_bytes: [u8; 2],
    pub line_bytes: [u8; 2],
}

impl SourceId {
    fn new(location: &Location<'_>) -> Self {
        let filename_hash = fmt_hash::filename_hash16(location.file());
        let line = location.line() as u16;
        SourceId {
            filename_hash,
            line,
            filename_bytes: filename_hash.to_le_bytes(),
            line_bytes: line.to_le_bytes(),
        }
    }
}

/// A cached, precomputed entry binding a format string to its encoding plan.
///
/// Handlers are immutable once published into the cache. The serialized
/// prefixes are precomputed here so the encoder writes them by reference
/// without any per-call formatting or allocation.
#[derive(Clone, Debug)]
pub struct Handler {
    pub plan: FormatPlan,
    pub hash: u32,
    pub hash_bytes: [u8; 4],
    /// Monotonically assigned id, present when the logger sends string
    /// indexes on the wire.
    pub index: Option<u32>,
    pub index_bytes: [u8; 4],
    /// Present when the logger sends source lines on the wire; stamped from
    /// the call site that caused the cache miss.
    pub source: Option<SourceId>,
}

impl Handler {
    /// Builds a handler from a format string and a representative argument
    /// tuple. Fails with `Arity` when the verb count does not match the
    /// argument count and with `BadFormat` when the string does not parse or
    /// a verb is paired with an incompatible argument type.
    pub fn build(
        fmt: &str,
        args: &[LogArg<'_>],
        index: Option<u32>,
        location: Option<&Location<'_>>,
    ) -> Result<Handler> {
        let verbs = parse_format(fmt)?;
        if verbs.len() != args.len() {
            return Err(Error::Arity { expected: verbs.len(), actual: args.len() });
        }
        let plans = verbs
            .iter()
            .zip(args)
            .map(|(&verb, arg)| ArgPlan::new(verb, arg.kind()))
            .collect::<Result<Vec<_>>>()?;

        let hash = fmt_hash::hash32(fmt);
        Ok(Handler {
            plan: FormatPlan { fmt_string: fmt.to_string(), args: plans },
            hash,
            hash_bytes: hash.to_le_bytes(),
            index,
            index_bytes: index.unwrap_or(0).to_le_bytes(),
            source: location.map(SourceId::new),
        })
    }
}
