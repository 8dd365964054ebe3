//! Client for the external AprilTag detection service.
//!
//! A frame is encoded as PNG, posted as a single multipart part, and the JSON
//! answer is validated into a [`DetectionBatch`]. The service is treated as
//! untrusted: every failure comes back as a [`DetectError`] and never panics.

mod encoding;
mod error;
mod transport;
mod types;

use std::time::Instant;

use frame_ingest::Frame;
use tracing::{Instrument, debug};

pub use encoding::encode_png;
pub use error::{DecodeError, DetectError, EncodeError, TransportError};
pub use transport::{DEFAULT_ENDPOINT, DetectionTransport, HttpTransport, PING_SENTINEL};
pub use types::{Detection, DetectionBatch, DetectionResponse, MIN_CORNERS, decode_batch};

/// Encodes frames, sends them through a transport, and decodes the answer.
pub struct DetectionClient<T> {
    transport: T,
}

impl<T: DetectionTransport> DetectionClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one detection round-trip for `frame`.
    ///
    /// An absent or empty `detections` list is an `Ok` empty batch.
    pub async fn detect(&self, frame: &Frame) -> Result<DetectionBatch, DetectError> {
        let span = tracing::info_span!(
            "detect.request",
            width = frame.width,
            height = frame.height,
            bytes = tracing::field::Empty
        );
        let started = Instant::now();

        let png = span.in_scope(|| encode_png(frame))?;
        span.record("bytes", png.len());

        let body = self
            .transport
            .post_image(png)
            .instrument(span.clone())
            .await?;
        let batch = span.in_scope(|| decode_batch(&body))?;

        span.in_scope(|| {
            debug!(
                tags = batch.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "detection batch decoded"
            )
        });
        Ok(batch)
    }
}

impl DetectionClient<HttpTransport> {
    /// Liveness probe against the service's `/ping` route.
    pub async fn ping(&self) -> Result<bool, TransportError> {
        self.transport.ping().await
    }
}
