use lazy_static::lazy_static;

/// A literal guaranteed to live wherever this binary keeps its constant
/// strings; the probe looks for the mapping that contains its address.
static ANCHOR: &str = "text segment probe anchor";

lazy_static! {
    static ref SELF_SEGMENT: (usize, usize) = probe();
}

/// Returns `(base, size)` of the memory range holding this binary's constant
/// strings, probed once per process.
///
/// The range is a superset of the string literal address space; it may
/// overestimate. On platforms without a usable memory map the probe returns
/// `(0, 0)` and every lookup degrades cleanly to the content-keyed cache.
pub fn self_text_segment() -> (usize, usize) {
    *SELF_SEGMENT
}

#[cfg(target_os = "linux")]
fn probe() -> (usize, usize) {
    let anchor = ANCHOR.as_ptr() as usize;
    let maps = match std::fs::read_to_string("/proc/self/maps") {
        Ok(maps) => maps,
        Err(err) => {
            log::debug!("cannot read /proc/self/maps: {err}");
            return (0, 0);
        }
    };
    for line in maps.lines() {
        // Each line starts with "lo-hi perms ...", addresses in hex.
        let Some(range) = line.split_whitespace().next() else {
            continue;
        };
        let Some((lo, hi)) = range.split_once('-') else {
            continue;
        };
        let (Ok(lo), Ok(hi)) =
            (usize::from_str_radix(lo, 16), usize::from_str_radix(hi, 16))
        else {
            continue;
        };
        if (lo..hi).contains(&anchor) {
            return (lo, hi - lo);
        }
    }
    log::debug!("no mapping contains the probe anchor");
    (0, 0)
}

#[cfg(not(target_os = "linux"))]
fn probe() -> (usize, usize) {
    (0, 0)
}
