use std::io::Cursor;

use frame_ingest::Frame;
use image::ImageFormat;

use crate::EncodeError;

/// Encode a frame as PNG for the detection request body.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let image = frame.to_image().ok_or(EncodeError::BufferMismatch {
        width: frame.width,
        height: frame.height,
        len: frame.data.len(),
    })?;

    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_decodable_png() {
        let frame = Frame::filled(5, 3, [200, 100, 50, 255]);
        let png = encode_png(&frame).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(decoded.dimensions(), (5, 3));
        assert_eq!(decoded.get_pixel(4, 2).0, [200, 100, 50, 255]);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0, 255]);
        frame.data.truncate(10);
        assert!(matches!(
            encode_png(&frame),
            Err(EncodeError::BufferMismatch { len: 10, .. })
        ));
    }
}
