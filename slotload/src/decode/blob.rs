//! Persisted asset blob format and the built-in `file://` decoder.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! "SLB1" | kind: u8 | width: u32 | height: u32 | frames: u32
//!        | frames × (delay_ms: u32 | len: u32 | pixels: [u8; len])
//! ```

use super::{DecodeRequest, Decoder};
use crate::asset::{Asset, AssetKind, Frame};
use crate::error::LoadError;
use crate::listener::ProgressSink;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fs::File;
use std::io::Read;
use std::time::Duration;

/// Leading magic of every blob.
pub const BLOB_MAGIC: &[u8; 4] = b"SLB1";

const HEADER_LEN: usize = 4 + 1 + 4 + 4 + 4;
const FRAME_HEADER_LEN: usize = 4 + 4;
const READ_CHUNK: usize = 64 * 1024;

const KIND_IMAGE: u8 = 0;
const KIND_ANIMATION: u8 = 1;

/// Serializes an asset into the blob format.
pub fn encode_blob(asset: &Asset) -> Bytes {
    let frames = asset.frames();
    let mut buf = BytesMut::with_capacity(
        HEADER_LEN + frames.len() * FRAME_HEADER_LEN + asset.byte_size(),
    );

    buf.put_slice(BLOB_MAGIC);
    buf.put_u8(match asset.kind() {
        AssetKind::Image => KIND_IMAGE,
        AssetKind::Animation => KIND_ANIMATION,
    });
    buf.put_u32_le(asset.width());
    buf.put_u32_le(asset.height());
    buf.put_u32_le(frames.len() as u32);

    for frame in frames {
        let delay_ms = u32::try_from(frame.delay.as_millis()).unwrap_or(u32::MAX);
        buf.put_u32_le(delay_ms);
        buf.put_u32_le(frame.pixels.len() as u32);
        buf.put_slice(&frame.pixels);
    }

    buf.freeze()
}

/// Parses a blob. Frame pixels are slices of `data`, not copies.
pub fn decode_blob(mut data: Bytes) -> Result<Asset, LoadError> {
    if data.len() < HEADER_LEN {
        return Err(corrupt("truncated header"));
    }
    if &data[..4] != BLOB_MAGIC {
        return Err(LoadError::Unsupported("not a slotload blob".to_string()));
    }
    data.advance(4);

    let kind = match data.get_u8() {
        KIND_IMAGE => AssetKind::Image,
        KIND_ANIMATION => AssetKind::Animation,
        other => return Err(corrupt(&format!("unknown asset kind {}", other))),
    };
    let width = data.get_u32_le();
    let height = data.get_u32_le();
    let count = data.get_u32_le() as usize;

    let mut frames = Vec::with_capacity(count.min(1024));
    for index in 0..count {
        if data.remaining() < FRAME_HEADER_LEN {
            return Err(corrupt(&format!("truncated frame header {}", index)));
        }
        let delay = Duration::from_millis(u64::from(data.get_u32_le()));
        let len = data.get_u32_le() as usize;
        if data.remaining() < len {
            return Err(corrupt(&format!("truncated frame {}", index)));
        }
        frames.push(Frame {
            pixels: data.split_to(len),
            delay,
        });
    }

    match kind {
        AssetKind::Image => {
            let frame = frames
                .into_iter()
                .next()
                .ok_or_else(|| corrupt("image without frames"))?;
            Ok(Asset::image(width, height, frame.pixels))
        }
        AssetKind::Animation => Ok(Asset::animation(width, height, frames)),
    }
}

fn corrupt(detail: &str) -> LoadError {
    LoadError::Unknown(format!("corrupt blob: {}", detail))
}

/// Decodes blobs from local files, reporting progress per chunk.
///
/// Registered for `file://` by default. Persisted cache hits always use it,
/// whatever decoder owns `file://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobFileDecoder;

impl Decoder for BlobFileDecoder {
    fn decode(
        &self,
        request: &DecodeRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<Asset, LoadError> {
        let path = request
            .locator
            .to_path()
            .ok_or_else(|| LoadError::Unsupported(format!("not a file locator: {}", request.locator)))?;

        progress.on_start();
        let mut file = File::open(&path)?;
        let total = file.metadata().ok().map(|m| m.len());

        let mut buf = BytesMut::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut read_total = 0u64;
        loop {
            if request.cancel.is_cancelled() {
                return Err(LoadError::Interrupted);
            }
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            buf.put_slice(&chunk[..n]);
            read_total += n as u64;
            progress.on_progress(read_total, total);
        }

        decode_blob(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DecodeSpec;
    use crate::listener::NoProgress;
    use crate::source::Locator;
    use std::cell::Cell;
    use tokio_util::sync::CancellationToken;

    fn clip() -> Asset {
        Asset::animation(
            2,
            2,
            vec![
                Frame {
                    pixels: Bytes::from_static(&[1, 2, 3, 4]),
                    delay: Duration::from_millis(40),
                },
                Frame {
                    pixels: Bytes::from_static(&[5, 6, 7, 8]),
                    delay: Duration::from_millis(80),
                },
            ],
        )
    }

    #[test]
    fn test_animation_survives_encoding() {
        let original = clip();
        let decoded = decode_blob(encode_blob(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_header_layout() {
        let blob = encode_blob(&Asset::image(3, 1, vec![9u8; 3]));
        assert_eq!(&blob[..4], b"SLB1");
        assert_eq!(blob[4], KIND_IMAGE);
        assert_eq!(&blob[5..9], &3u32.to_le_bytes());
        assert_eq!(&blob[13..17], &1u32.to_le_bytes());
        assert_eq!(blob.len(), HEADER_LEN + FRAME_HEADER_LEN + 3);
    }

    #[test]
    fn test_bad_magic_is_unsupported() {
        let err = decode_blob(Bytes::from_static(b"PNG\x00aaaaaaaaaaaaaaaaaa")).unwrap_err();
        assert!(matches!(err, LoadError::Unsupported(_)));
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let blob = encode_blob(&clip());
        let cut = blob.slice(..blob.len() - 2);
        assert!(matches!(decode_blob(cut), Err(LoadError::Unknown(_))));
    }

    struct CountingSink {
        starts: Cell<u32>,
        last: Cell<u64>,
    }

    impl ProgressSink for CountingSink {
        fn on_start(&self) {
            self.starts.set(self.starts.get() + 1);
        }

        fn on_progress(&self, read: u64, _total: Option<u64>) {
            self.last.set(read);
        }
    }

    #[test]
    fn test_file_decoder_reads_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.blob");
        let blob = encode_blob(&clip());
        std::fs::write(&path, &blob).unwrap();

        let locator = Locator::from_path(&path);
        let cancel = CancellationToken::new();
        let request = DecodeRequest {
            locator: &locator,
            spec: DecodeSpec::natural(),
            cancel: &cancel,
        };
        let sink = CountingSink {
            starts: Cell::new(0),
            last: Cell::new(0),
        };

        let asset = BlobFileDecoder.decode(&request, &sink).unwrap();
        assert_eq!(asset, clip());
        assert_eq!(sink.starts.get(), 1);
        assert_eq!(sink.last.get(), blob.len() as u64);
    }

    #[test]
    fn test_file_decoder_missing_file_is_not_found() {
        let locator = Locator::new("file:///definitely/not/here.blob");
        let cancel = CancellationToken::new();
        let request = DecodeRequest {
            locator: &locator,
            spec: DecodeSpec::natural(),
            cancel: &cancel,
        };
        let err = BlobFileDecoder.decode(&request, &NoProgress).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_cancelled_decode_is_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.blob");
        std::fs::write(&path, encode_blob(&clip())).unwrap();

        let locator = Locator::from_path(&path);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = DecodeRequest {
            locator: &locator,
            spec: DecodeSpec::natural(),
            cancel: &cancel,
        };
        let err = BlobFileDecoder.decode(&request, &NoProgress).unwrap_err();
        assert_eq!(err, LoadError::Interrupted);
    }
}
