//! Frame acquisition for the overlay pipeline.
//!
//! Camera hardware lives outside this workspace. Consumers see a
//! [`FrameSource`] that hands out one still frame per call, or nothing when
//! the device is not ready.

mod types;

use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, warn};

pub use types::{CaptureError, Frame, FrameFormat};

/// Capture collaborator injected into the frame cycle controller.
pub trait FrameSource {
    /// Snapshot the current frame, or `None` when no data is available.
    fn capture_frame(&mut self) -> Option<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture_frame(&mut self) -> Option<Frame> {
        (**self).capture_frame()
    }
}

/// Reads an image file from disk on every capture.
///
/// An external grabber can keep overwriting the file; each call picks up
/// whatever is there now.
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the file, reporting why it could not be used.
    pub fn read_frame(&self) -> Result<Frame, CaptureError> {
        let uri = self.path.display().to_string();
        if !self.path.is_file() {
            return Err(CaptureError::Open { uri });
        }
        let image = image::open(&self.path).map_err(|source| CaptureError::Decode { uri, source })?;
        Ok(Frame::from_image(image.into_rgba8()))
    }
}

impl FrameSource for ImageFileSource {
    fn capture_frame(&mut self) -> Option<Frame> {
        match self.read_frame() {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!("Frame source not ready: {err}");
                None
            }
        }
    }
}

/// Adapts a capture thread's channel into a [`FrameSource`].
///
/// Each capture drains the channel and keeps only the newest frame, so a slow
/// consumer never works on a backlog.
pub struct ChannelFrameSource {
    rx: Receiver<Result<Frame, CaptureError>>,
}

impl ChannelFrameSource {
    pub fn new(rx: Receiver<Result<Frame, CaptureError>>) -> Self {
        Self { rx }
    }
}

impl FrameSource for ChannelFrameSource {
    fn capture_frame(&mut self) -> Option<Frame> {
        let mut latest: Option<Frame> = None;
        loop {
            match self.rx.try_recv() {
                Ok(Ok(frame)) => latest = Some(frame),
                Ok(Err(err)) => warn!("Capture error: {err}"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Capture channel disconnected");
                    break;
                }
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_not_ready() {
        let dir = tempdir().unwrap();
        let mut source = ImageFileSource::new(dir.path().join("frame.png"));
        assert!(matches!(source.read_frame(), Err(CaptureError::Open { .. })));
        assert!(source.capture_frame().is_none());
    }

    #[test]
    fn garbage_file_fails_to_decode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, b"not an image").unwrap();
        let source = ImageFileSource::new(&path);
        assert!(matches!(source.read_frame(), Err(CaptureError::Decode { .. })));
    }

    #[test]
    fn file_source_reads_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        Frame::filled(8, 6, [10, 20, 30, 255])
            .to_image()
            .unwrap()
            .save(&path)
            .unwrap();

        let mut source = ImageFileSource::new(&path);
        let frame = source.capture_frame().expect("frame");
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(frame.format, FrameFormat::Rgba8);
        assert_eq!(&frame.data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn channel_source_keeps_newest_frame() {
        let (tx, rx) = unbounded();
        let mut source = ChannelFrameSource::new(rx);
        assert!(source.capture_frame().is_none());

        tx.send(Ok(Frame::filled(2, 2, [1, 1, 1, 255]))).unwrap();
        tx.send(Err(CaptureError::Open {
            uri: "/dev/video9".into(),
        }))
        .unwrap();
        tx.send(Ok(Frame::filled(4, 4, [2, 2, 2, 255]))).unwrap();

        let frame = source.capture_frame().expect("frame");
        assert_eq!(frame.width, 4);
        assert!(source.capture_frame().is_none());
    }
}
