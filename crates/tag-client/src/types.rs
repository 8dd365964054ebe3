use overlay_geometry::Point2;
use serde::{Deserialize, Serialize};

use crate::DecodeError;

/// Minimum corners for a tag polygon.
pub const MIN_CORNERS: usize = 3;

/// Single tag detection in pixel space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: i64,
    pub center: Point2,
    /// Polygon corners in the order the detector returned them.
    pub corners: Vec<Point2>,
}

/// Detections for one frame, in response order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }
}

impl IntoIterator for DetectionBatch {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.into_iter()
    }
}

/// Body returned by `POST /detect`.
///
/// `detections` may be missing or `null`; both mean nothing was found.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
}

/// Parse and validate a `/detect` response body.
pub fn decode_batch(body: &[u8]) -> Result<DetectionBatch, DecodeError> {
    let response: DetectionResponse = serde_json::from_slice(body)?;
    let detections = response.detections.unwrap_or_default();

    for detection in &detections {
        if detection.corners.len() < MIN_CORNERS {
            return Err(DecodeError::TooFewCorners {
                id: detection.id,
                count: detection.corners.len(),
            });
        }
        let finite = std::iter::once(&detection.center)
            .chain(detection.corners.iter())
            .all(|p| p.x.is_finite() && p.y.is_finite());
        if !finite {
            return Err(DecodeError::NonFinite { id: detection.id });
        }
    }

    Ok(DetectionBatch { detections })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_service_payload() {
        let body = br#"{
            "detections": [
                {"id": 7, "center": {"x": 50.0, "y": 50.0},
                 "corners": [{"x": 10, "y": 10}, {"x": 90, "y": 10},
                             {"x": 90, "y": 90}, {"x": 10, "y": 90}]},
                {"id": 3, "center": {"x": 1.5, "y": 2.25},
                 "corners": [{"x": 0, "y": 0}, {"x": 3, "y": 0}, {"x": 3, "y": 4.5}]}
            ]
        }"#;
        let batch = decode_batch(body).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.detections[0].id, 7);
        assert_eq!(batch.detections[0].corners[2], Point2::new(90.0, 90.0));
        assert_eq!(batch.detections[1].center, Point2::new(1.5, 2.25));
    }

    #[test]
    fn empty_null_and_missing_detections_are_empty_batches() {
        for body in [
            &br#"{"detections": []}"#[..],
            &br#"{"detections": null}"#[..],
            &br#"{}"#[..],
        ] {
            let batch = decode_batch(body).unwrap();
            assert!(batch.is_empty());
        }
    }

    #[test]
    fn missing_required_field_is_a_decode_error() {
        let body = br#"{"detections": [{"id": 1, "corners": []}]}"#;
        assert!(matches!(decode_batch(body), Err(DecodeError::Json(_))));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        assert!(matches!(
            decode_batch(b"<html>502</html>"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn out_of_range_coordinate_is_rejected() {
        // 1e39 does not fit an f32 and narrows to infinity.
        let body = br#"{"detections": [{"id": 1, "center": {"x": 1e39, "y": 0},
            "corners": [{"x": 0, "y": 0}, {"x": 2, "y": 0}, {"x": 2, "y": 2}]}]}"#;
        assert!(matches!(
            decode_batch(body),
            Err(DecodeError::NonFinite { id: 1 })
        ));
    }

    #[test]
    fn too_few_corners_is_rejected() {
        let body = br#"{"detections": [{"id": 4, "center": {"x": 1, "y": 1},
            "corners": [{"x": 0, "y": 0}, {"x": 2, "y": 2}]}]}"#;
        match decode_batch(body) {
            Err(DecodeError::TooFewCorners { id, count }) => {
                assert_eq!(id, 4);
                assert_eq!(count, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
