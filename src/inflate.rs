//! Decompression of compressed array properties.

use std::io::{self, Read};

use flate2::read::ZlibDecoder;

/// Turns a compressed array payload back into its raw little endian bytes.
///
/// `expected_len` is the byte length of the declared array; implementations
/// should not produce more than that.
pub trait Inflate {
    fn inflate(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>>;
}

/// zlib inflate, the encoding binary FBX uses for arrays with encoding `1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zlib;

impl Inflate for Zlib {
    fn inflate(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        // Deflate expands at most 1032:1.
        let mut decompressed = Vec::with_capacity(expected_len.min(compressed.len().saturating_mul(1032)));
        ZlibDecoder::new(compressed)
            .take(expected_len as u64)
            .read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }
}

impl<F> Inflate for F
where
    F: Fn(&[u8], usize) -> io::Result<Vec<u8>>,
{
    fn inflate(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        self(compressed, expected_len)
    }
}
