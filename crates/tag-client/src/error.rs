use thiserror::Error;

/// Network or HTTP-level failure talking to the detection service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid detection endpoint {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with status {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

/// Response arrived but does not match the detection schema.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed detection payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tag {id} has {count} corner(s), expected at least 3")]
    TooFewCorners { id: i64, count: usize },
    #[error("tag {id} has a non-finite coordinate")]
    NonFinite { id: i64 },
}

/// Frame could not be turned into a request body.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame buffer of {len} bytes does not match {width}x{height} RGBA")]
    BufferMismatch { width: u32, height: u32, len: usize },
    #[error("PNG encode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Any reason a detection round-trip produced no batch.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl DetectError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::Encode(_) => "encode",
            DetectError::Transport(_) => "transport",
            DetectError::Decode(_) => "decode",
        }
    }
}
