//! Decoder interface and prefix-based decoder registry.
//!
//! Decoders are the engine's only view of fetching and decoding. Each one
//! is registered for a locator prefix (`http://`, `file://`, ...) and runs
//! on a worker thread; it should check its cancellation token at I/O
//! boundaries and return [`LoadError::Interrupted`] when it fires.

mod blob;
mod registry;

pub use blob::{decode_blob, encode_blob, BlobFileDecoder, BLOB_MAGIC};
pub use registry::{DecoderRegistry, DecoderRegistryBuilder};

use crate::asset::{Asset, DecodeSpec};
use crate::error::LoadError;
use crate::listener::ProgressSink;
use crate::source::Locator;
use tokio_util::sync::CancellationToken;

/// Everything a decoder needs for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    pub locator: &'a Locator,
    pub spec: DecodeSpec,
    /// Fires when the request is cancelled.
    pub cancel: &'a CancellationToken,
}

/// Fetches and decodes an asset.
///
/// Implementations call [`ProgressSink::on_start`] exactly once per attempt
/// and then either return the asset or an error, never both.
pub trait Decoder: Send + Sync {
    fn decode(
        &self,
        request: &DecodeRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<Asset, LoadError>;
}
