//! Stream transformers applied when an asset is opened.
//!
//! A transformer wraps the "open" function of an asset: it receives a
//! function producing the upstream stream and returns a function producing
//! the transformed one. Chains are rebuilt on every open.

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use crate::core::AppPath;
use crate::fs::Stream;

/// Deferred stream producer.
pub type OpenStream = Box<dyn FnOnce() -> io::Result<Stream> + Send>;

pub trait Transformer: Send + Sync {
    /// Short identifier, used in debug output.
    fn name(&self) -> &'static str;

    fn transform(&self, open: OpenStream, asset: &AppPath) -> OpenStream;
}

/// Shared transformer handle stored by assets.
pub type SharedTransformer = Arc<dyn Transformer>;

/// Wrap `open` with each transformer in insertion order.
pub fn apply(transformers: &[SharedTransformer], open: OpenStream, asset: &AppPath) -> OpenStream {
    transformers
        .iter()
        .fold(open, |open, transformer| transformer.transform(open, asset))
}

/// Helper for whole-text rewrites: buffer the upstream, map it, re-stream it.
pub fn map_text<F>(open: OpenStream, f: F) -> OpenStream
where
    F: FnOnce(String) -> String + Send + 'static,
{
    Box::new(move || {
        let mut bytes = Vec::new();
        open()?.read_to_end(&mut bytes)?;
        let mapped = f(String::from_utf8_lossy(&bytes).into_owned());
        Ok(Box::new(Cursor::new(mapped.into_bytes())) as Stream)
    })
}

/// Drain a stream producer into memory.
#[cfg(test)]
pub(crate) fn read_all(open: OpenStream) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    open()?.read_to_end(&mut buf)?;
    Ok(buf)
}
