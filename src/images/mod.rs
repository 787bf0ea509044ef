//! Local product images: the on-disk cache and upload payloads

mod cache;
mod payload;

pub use cache::LocalImageCache;
pub use payload::{fingerprint, ImagePayload};

#[cfg(test)]
pub(crate) use payload::tests::png_bytes;
