//! Frame cycle orchestration.
//!
//! One cycle is: tear down the previous frame and its overlays, capture a new
//! frame, publish it, run detection, then map, stroke and place every tag.
//! Only one frame is ever active. Each cycle carries a sequence number and a
//! detection result for an older cycle is dropped rather than drawn over the
//! newer frame.

use std::{sync::Arc, time::Instant};

use frame_ingest::{Frame, FrameSource};
use overlay_geometry::{
    Anchor, Point2, Size, StrokeMesh, StrokeStyle, Vector2, map_polygon, tessellate_into,
};
use tag_client::{DetectError, Detection, DetectionBatch, DetectionClient, DetectionTransport};
use tracing::{debug, info_span, warn};

use crate::overlay::{
    assets::AssetResolver,
    cache::OverlayCache,
    surface::{RenderSurface, Viewport},
};

/// UI units trimmed from each overlay axis.
pub(crate) const DEFAULT_OVERLAY_INSET: f32 = 50.0;

/// Where mapped geometry lands on the render surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LayoutOptions {
    /// Destination rect in UI units; `None` uses the frame's pixel size.
    pub(crate) dest: Option<Size>,
    pub(crate) anchor: Anchor,
    pub(crate) overlay_inset: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            dest: None,
            anchor: Anchor::Center,
            overlay_inset: DEFAULT_OVERLAY_INSET,
        }
    }
}

/// Handle for the detection request of one cycle.
#[derive(Clone, Debug)]
pub(crate) struct CycleTicket {
    pub(crate) sequence: u64,
    pub(crate) frame: Arc<Frame>,
}

#[derive(Debug)]
pub(crate) enum CycleOutcome {
    /// No frame could be captured; nothing was sent.
    CaptureUnavailable,
    /// Detection failed; nothing was rendered.
    Failed(DetectError),
    /// The service saw no tags.
    Empty,
    /// Overlays are shown for `tags` distinct tag ids.
    Rendered { tags: usize },
    /// Result belonged to a frame that is no longer current.
    Stale { sequence: u64 },
}

impl CycleOutcome {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            CycleOutcome::CaptureUnavailable => "capture_unavailable",
            CycleOutcome::Failed(_) => "failed",
            CycleOutcome::Empty => "empty",
            CycleOutcome::Rendered { .. } => "rendered",
            CycleOutcome::Stale { .. } => "stale",
        }
    }
}

struct ActiveFrame {
    viewport: Viewport,
    sequence: u64,
}

pub(crate) struct FrameCycleController<S, T, R, U> {
    source: S,
    client: DetectionClient<T>,
    resolver: R,
    surface: U,
    cache: OverlayCache,
    outline: StrokeMesh,
    style: StrokeStyle,
    layout: LayoutOptions,
    current: Option<ActiveFrame>,
    next_sequence: u64,
}

impl<S, T, R, U> FrameCycleController<S, T, R, U>
where
    S: FrameSource,
    T: DetectionTransport,
    R: AssetResolver,
    U: RenderSurface,
{
    pub(crate) fn new(
        source: S,
        client: DetectionClient<T>,
        resolver: R,
        surface: U,
        style: StrokeStyle,
        layout: LayoutOptions,
    ) -> Self {
        Self {
            source,
            client,
            resolver,
            surface,
            cache: OverlayCache::new(),
            outline: StrokeMesh::new(),
            style,
            layout,
            current: None,
            next_sequence: 0,
        }
    }

    /// Run a full cycle: capture, detect, render.
    pub(crate) async fn capture_and_process(&mut self) -> CycleOutcome {
        let Some(ticket) = self.begin_cycle() else {
            return self.conclude(CycleOutcome::CaptureUnavailable, self.next_sequence);
        };

        let started = Instant::now();
        let result = self.client.detect(&ticket.frame).await;
        metrics::histogram!("overlay_detect_seconds").record(started.elapsed().as_secs_f64());

        self.finish_cycle(ticket, result)
    }

    /// Tear down the previous cycle and publish a freshly captured frame.
    ///
    /// Returns `None` when the source has nothing to offer; the surface is
    /// left blank in that case.
    pub(crate) fn begin_cycle(&mut self) -> Option<CycleTicket> {
        self.teardown();

        let frame = self.source.capture_frame()?;
        if frame.is_empty() {
            warn!(
                "Captured frame has zero size ({}x{}); skipping cycle",
                frame.width, frame.height
            );
            return None;
        }

        let frame_size = Size::from_pixels(frame.width, frame.height);
        let viewport = Viewport {
            frame: frame_size,
            dest: self.layout.dest.unwrap_or(frame_size),
            anchor: self.layout.anchor,
        };
        self.next_sequence += 1;
        let sequence = self.next_sequence;

        let frame = Arc::new(frame);
        self.surface.show_frame(&frame, viewport);
        self.current = Some(ActiveFrame { viewport, sequence });
        debug!(
            cycle = sequence,
            width = frame.width,
            height = frame.height,
            "frame published"
        );

        Some(CycleTicket { sequence, frame })
    }

    /// Apply a detection result to the cycle identified by `ticket`.
    pub(crate) fn finish_cycle(
        &mut self,
        ticket: CycleTicket,
        result: Result<DetectionBatch, DetectError>,
    ) -> CycleOutcome {
        let span = info_span!("overlay.cycle", cycle = ticket.sequence);
        let _enter = span.enter();

        let viewport = match self.current.as_ref() {
            Some(active) if active.sequence == ticket.sequence => active.viewport,
            _ => {
                return self.conclude(
                    CycleOutcome::Stale {
                        sequence: ticket.sequence,
                    },
                    ticket.sequence,
                );
            }
        };

        let batch = match result {
            Ok(batch) if batch.is_empty() => {
                return self.conclude(CycleOutcome::Empty, ticket.sequence);
            }
            Ok(batch) => batch,
            Err(err) => return self.conclude(CycleOutcome::Failed(err), ticket.sequence),
        };

        self.cache.clear_all();
        self.outline.clear();
        for detection in batch.iter() {
            self.render_detection(detection, viewport);
        }
        if self.outline.truncated {
            warn!(
                vertices = self.outline.vertex_count(),
                "Outline vertex budget reached; remaining outlines dropped"
            );
        }

        self.surface.draw_outline(&self.outline);
        self.surface.show_overlays(&self.cache);
        metrics::gauge!("overlay_active_tags").set(self.cache.len() as f64);
        metrics::histogram!("overlay_stroke_vertices").record(self.outline.vertex_count() as f64);

        let tags = self.cache.len();
        self.conclude(CycleOutcome::Rendered { tags }, ticket.sequence)
    }

    pub(crate) fn cache(&self) -> &OverlayCache {
        &self.cache
    }

    pub(crate) fn outline(&self) -> &StrokeMesh {
        &self.outline
    }

    #[cfg(test)]
    pub(crate) fn surface(&self) -> &U {
        &self.surface
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &DetectionClient<T> {
        &self.client
    }

    fn render_detection(&mut self, detection: &Detection, viewport: Viewport) {
        let polygon = map_polygon(
            &detection.corners,
            detection.center,
            viewport.frame,
            viewport.dest,
            viewport.anchor,
        );
        if !self.outline.truncated {
            tessellate_into(&mut self.outline, &polygon.closed_loop, &self.style);
        }
        let size = overlay_size(&polygon.closed_loop, self.layout.overlay_inset);
        self.cache
            .place(detection.id, polygon.center, size, &self.resolver);
    }

    fn teardown(&mut self) {
        if self.current.take().is_none() && self.cache.is_empty() && self.outline.is_empty() {
            return;
        }
        self.cache.clear_all();
        self.outline.clear();
        self.surface.clear();
        metrics::gauge!("overlay_active_tags").set(0.0);
    }

    fn conclude(&self, outcome: CycleOutcome, sequence: u64) -> CycleOutcome {
        metrics::counter!("overlay_cycles_total", "outcome" => outcome.label()).increment(1);
        match &outcome {
            CycleOutcome::CaptureUnavailable => debug!("No frame available; cycle skipped"),
            CycleOutcome::Failed(err) => {
                warn!(cycle = sequence, kind = err.kind(), "Detection failed: {err}")
            }
            CycleOutcome::Empty => debug!(cycle = sequence, "No tags detected"),
            CycleOutcome::Rendered { tags } => debug!(
                cycle = sequence,
                tags,
                ids = ?self.cache.tag_ids(),
                vertices = self.outline.vertex_count(),
                "Overlays rendered"
            ),
            CycleOutcome::Stale { sequence: stale } => debug!(
                cycle = stale,
                current = self.next_sequence,
                "Discarding result for superseded frame"
            ),
        }
        outcome
    }
}

/// Overlay extent from the first and third corner of the mapped loop.
fn overlay_size(closed_loop: &[Point2], inset: f32) -> Vector2 {
    match (closed_loop.first(), closed_loop.get(2)) {
        (Some(&first), Some(&third)) => {
            let span = third - first;
            Vector2::new(
                (span.x.abs() - inset).max(0.0),
                (span.y.abs() - inset).max(0.0),
            )
        }
        _ => Vector2::ZERO,
    }
}
