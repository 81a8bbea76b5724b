use md5::{Digest, Md5};

/// Derives the stable 32-bit identifier of a format string: MD5 over the
/// UTF-8 bytes, first four digest bytes read as a little-endian u32.
///
/// The construction is independent of the runtime's string interning and
/// yields identical values on the encoding and the decoding side, across
/// runs and across architectures.
pub fn hash32(s: &str) -> u32 {
    let digest = Md5::digest(s.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Low 16 bits of [`hash32`], used to identify source filenames on the wire.
pub fn filename_hash16(s: &str) -> u16 {
    hash32(s) as u16
}
