//! Lazy generator for synthetic file content.

use std::convert::Infallible;
use std::sync::OnceLock;

use bytes::Bytes;
use futures::Stream;

/// Largest chunk the generator yields.
pub const WINDOW_SIZE: usize = 1024 * 1024;

/// Fill byte for generated content.
pub const FILL_BYTE: u8 = b'0';

/// One shared window; chunks are reference-counted slices of it.
fn pattern() -> &'static Bytes {
    static PATTERN: OnceLock<Bytes> = OnceLock::new();
    PATTERN.get_or_init(|| Bytes::from(vec![FILL_BYTE; WINDOW_SIZE]))
}

/// Yield exactly `size_bytes` bytes of [`FILL_BYTE`], in chunks of at most
/// [`WINDOW_SIZE`]. The sequence is produced on demand, so a consumer that
/// stops polling stops generation.
pub fn generate(size_bytes: u64) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    futures::stream::unfold(size_bytes, |remaining| async move {
        if remaining == 0 {
            return None;
        }
        let len = remaining.min(WINDOW_SIZE as u64) as usize;
        let chunk = pattern().slice(..len);
        Some((Ok(chunk), remaining - len as u64))
    })
}
