use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::handler::Handler;
use crate::loggable::LogArg;

/// Cache and resolver counters, exposed by copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    pub l1_hit: u64,
    pub l1_miss: u64,
    pub l2_hit: u64,
    pub l2_miss: u64,
    /// Calls resolved through the content-keyed path, hits and misses both.
    pub l2_used: u64,
    /// Format string addresses that fell inside the text segment.
    pub string_offset_ok: u64,
    /// Format string addresses that fell outside the text segment.
    pub string_oom: u64,
}

/// Snapshot handed to the offline reader: every live handler keyed by its
/// 32-bit hash, plus the filenames behind the 16-bit filename hashes.
#[derive(Clone, Debug, Default)]
pub struct DecodeIndex {
    pub handlers: HashMap<u32, Arc<Handler>>,
    pub filenames: HashMap<u16, String>,
}

/// Two-level handler cache.
///
/// L1 is an array indexed by `(address - text_base) / 8` over the text
/// segment; literals resolve here without hashing or content comparison.
/// Strings outside the segment (runtime-built formats, or everything when the
/// probe reported `(0, 0)`) fall back to L2, a content-keyed map.
///
/// Two distinct literals within one 8-byte slot would alias in L1; literal
/// storage is assumed 8-aligned. Handlers are never evicted.
pub struct HandlerCache {
    text_base: usize,
    /// Configured segment size divided by 8; the L1 vector holds one slot
    /// more, reserved as the out-of-range sentinel.
    text_slots: usize,
    l1: Vec<Option<Arc<Handler>>>,
    l2: HashMap<String, Arc<Handler>>,
    by_hash: HashMap<u32, Arc<Handler>>,
    filenames: HashMap<u16, String>,
    next_index: AtomicU32,
    stats: Statistics,
}

impl HandlerCache {
    /// `text_size` is in bytes, as reported by the probe.
    pub fn new(text_base: usize, text_size: usize) -> Self {
        let text_slots = text_size / 8;
        HandlerCache {
            text_base,
            text_slots,
            l1: vec![None; text_slots + 1],
            l2: HashMap::new(),
            by_hash: HashMap::new(),
            filenames: HashMap::new(),
            next_index: AtomicU32::new(0),
            stats: Statistics::default(),
        }
    }

    /// Resolves a format string to its handler, building one on a miss.
    ///
    /// `want_index` assigns a monotonically increasing id to newly built
    /// handlers; `location` stamps them with the call site. Both affect only
    /// the miss path.
    pub fn resolve(
        &mut self,
        fmt: &str,
        args: &[LogArg<'_>],
        want_index: bool,
        location: Option<&Location<'_>>,
    ) -> Result<Arc<Handler>> {
        let offset = (fmt.as_ptr() as usize).wrapping_sub(self.text_base) / 8;
        if offset < self.text_slots {
            self.stats.string_offset_ok += 1;
            if let Some(h) = &self.l1[offset] {
                self.stats.l1_hit += 1;
                return Ok(h.clone());
            }
            self.stats.l1_miss += 1;
            let h = self.build(fmt, args, want_index, location)?;
            self.l1[offset] = Some(h.clone());
            Ok(h)
        } else {
            self.stats.string_oom += 1;
            self.stats.l2_used += 1;
            if let Some(h) = self.l2.get(fmt) {
                self.stats.l2_hit += 1;
                return Ok(h.clone());
            }
            self.stats.l2_miss += 1;
            log::debug!(
                "format string at {:#x} is outside the text segment {:#x}..{:#x}",
                fmt.as_ptr() as usize,
                self.text_base,
                self.text_base + self.text_slots * 8
            );
            let h = self.build(fmt, args, want_index, location)?;
            self.l2.insert(fmt.to_string(), h.clone());
            Ok(h)
        }
    }

    /// Builds and publishes a handler. A 32-bit hash collision between two
    /// distinct format strings makes the later handler shadow the earlier
    /// one in the decode index; the encoder stays correct because each
    /// handler keeps its own plan.
    fn build(
        &mut self,
        fmt: &str,
        args: &[LogArg<'_>],
        want_index: bool,
        location: Option<&Location<'_>>,
    ) -> Result<Arc<Handler>> {
        let index =
            want_index.then(|| self.next_index.fetch_add(1, Ordering::Relaxed) + 1);
        let h = Arc::new(Handler::build(fmt, args, index, location)?);
        if let (Some(src), Some(location)) = (&h.source, location) {
            self.filenames
                .entry(src.filename_hash)
                .or_insert_with(|| location.file().to_string());
        }
        self.by_hash.insert(h.hash, h.clone());
        Ok(h)
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn snapshot(&self) -> DecodeIndex {
        DecodeIndex {
            handlers: self.by_hash.clone(),
            filenames: self.filenames.clone(),
        }
    }
}
