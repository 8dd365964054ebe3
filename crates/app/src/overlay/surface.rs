//! Render surface receiving the frame, outline mesh and overlays.
//!
//! `RasterSurface` composes everything back onto the captured frame in pixel
//! space and optionally writes the result as PNG after every refresh.

use std::path::PathBuf;

use frame_ingest::Frame;
use image::{
    ImageFormat, Rgba, RgbaImage,
    imageops::{self, FilterType},
};
use overlay_geometry::{Anchor, Point2, Size, StrokeMesh, to_pixel_space};
use tracing::{debug, trace, warn};

use crate::overlay::cache::{OverlayCache, OverlayVisual};

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0, 0, 0, 180]);
const CAPTION_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GLYPH_ADVANCE: i32 = 6;

/// Frame size, destination rect and anchor shared by mapping and drawing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Viewport {
    pub(crate) frame: Size,
    pub(crate) dest: Size,
    pub(crate) anchor: Anchor,
}

impl Viewport {
    fn to_pixel(&self, ui: Point2) -> Point2 {
        to_pixel_space(ui, self.frame, self.dest, self.anchor)
    }

    /// Pixels per UI unit along each axis.
    fn scale(&self) -> (f32, f32) {
        (
            self.frame.width / self.dest.width,
            self.frame.height / self.dest.height,
        )
    }
}

/// Display target for one frame cycle. Every call replaces what was shown
/// before; nothing is patched incrementally.
pub(crate) trait RenderSurface {
    fn show_frame(&mut self, frame: &Frame, viewport: Viewport);
    fn draw_outline(&mut self, mesh: &StrokeMesh);
    fn show_overlays(&mut self, overlays: &OverlayCache);
    /// Drop the frame and everything drawn over it.
    fn clear(&mut self);
}

#[derive(Default)]
pub(crate) struct RasterSurface {
    output: Option<PathBuf>,
    frame: Option<(RgbaImage, Viewport)>,
    mesh: StrokeMesh,
    overlays: Vec<OverlayVisual>,
    composed: Option<RgbaImage>,
}

impl RasterSurface {
    pub(crate) fn new(output: Option<PathBuf>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    /// Last composed image, if a frame has been shown.
    #[cfg(test)]
    pub(crate) fn composed(&self) -> Option<&RgbaImage> {
        self.composed.as_ref()
    }

    fn refresh(&mut self) {
        let Some((base, viewport)) = self.frame.as_ref() else {
            self.composed = None;
            return;
        };

        let mut image = base.clone();
        for triangle in self.mesh.triangles.iter() {
            let color = Rgba(self.mesh.colors[triangle[0] as usize]);
            let corners = triangle.map(|idx| viewport.to_pixel(self.mesh.positions[idx as usize]));
            fill_triangle(&mut image, corners, color);
        }
        for visual in &self.overlays {
            draw_overlay(&mut image, viewport, visual);
        }

        if let Some(path) = self.output.as_ref() {
            if let Err(err) = image.save_with_format(path, ImageFormat::Png) {
                warn!("Failed to write annotated frame to {}: {err}", path.display());
            } else {
                trace!("Annotated frame written to {}", path.display());
            }
        }
        self.composed = Some(image);
    }
}

impl RenderSurface for RasterSurface {
    fn show_frame(&mut self, frame: &Frame, viewport: Viewport) {
        match frame.to_image() {
            Some(image) => self.frame = Some((image, viewport)),
            None => {
                warn!(
                    "Frame buffer does not match {}x{}; surface left blank",
                    frame.width, frame.height
                );
                self.frame = None;
            }
        }
        self.mesh.clear();
        self.overlays.clear();
        self.refresh();
    }

    fn draw_outline(&mut self, mesh: &StrokeMesh) {
        self.mesh.clone_from(mesh);
        self.refresh();
    }

    fn show_overlays(&mut self, overlays: &OverlayCache) {
        self.overlays.clear();
        self.overlays.extend(overlays.iter().cloned());
        self.refresh();
    }

    fn clear(&mut self) {
        self.frame = None;
        self.mesh.clear();
        self.overlays.clear();
        self.composed = None;
    }
}

fn draw_overlay(image: &mut RgbaImage, viewport: &Viewport, visual: &OverlayVisual) {
    let center = viewport.to_pixel(visual.position);
    let (scale_x, scale_y) = viewport.scale();
    let width = (visual.size.x * scale_x).round().max(0.0);
    let height = (visual.size.y * scale_y).round().max(0.0);
    let left = (center.x - width / 2.0).round();
    let top = (center.y - height / 2.0).round();
    let right = left + width;
    let bottom = top + height;

    let frame_w = image.width() as f32;
    let frame_h = image.height() as f32;
    let finite = [left, top, right, bottom].iter().all(|v| v.is_finite());
    if !finite || right < 0.0 || bottom < 0.0 || left > frame_w || top > frame_h {
        debug!(tag_id = visual.tag_id, "Overlay lies outside the frame; skipped");
        return;
    }

    // Everything below works on the part of the rect inside the frame.
    let visible = [
        left.max(0.0) as u32,
        top.max(0.0) as u32,
        right.min(frame_w) as u32,
        bottom.min(frame_h) as u32,
    ];
    let [vis_left, vis_top, vis_right, vis_bottom] = visible;
    if vis_right > vis_left && vis_bottom > vis_top {
        match visual.asset.as_ref() {
            Some(asset) => paste_clipped(image, &asset.image, [left, top, width, height], visible),
            None => fill_rect(
                image,
                vis_left as i32,
                vis_top as i32,
                vis_right as i32 - 1,
                vis_bottom as i32 - 1,
                PLACEHOLDER_FILL,
            ),
        }
    }

    let caption = visual.caption();
    let caption_x = left.clamp(0.0, frame_w) as i32;
    let caption_y = (top - 10.0).clamp(0.0, frame_h) as i32;
    let caption_width = i32::try_from(caption.chars().count())
        .unwrap_or(i32::MAX)
        .saturating_mul(GLYPH_ADVANCE);
    fill_rect(
        image,
        caption_x,
        caption_y,
        caption_x.saturating_add(caption_width),
        caption_y + 8,
        PLACEHOLDER_FILL,
    );
    draw_label(image, caption_x + 1, caption_y, &caption, CAPTION_COLOR);
}

/// Paste the part of `asset`, stretched over `rect` (left, top, width,
/// height), that falls inside the `visible` pixel bounds. Only the matching
/// source region is resized, so the scaled image never exceeds the frame.
fn paste_clipped(image: &mut RgbaImage, asset: &RgbaImage, rect: [f32; 4], visible: [u32; 4]) {
    let (asset_w, asset_h) = asset.dimensions();
    if asset_w == 0 || asset_h == 0 {
        return;
    }
    let [left, top, width, height] = rect;
    let [vis_left, vis_top, vis_right, vis_bottom] = visible;
    let (vis_w, vis_h) = (vis_right - vis_left, vis_bottom - vis_top);

    let (src_x, src_w) = source_span(vis_left as f32 - left, vis_w as f32, width, asset_w);
    let (src_y, src_h) = source_span(vis_top as f32 - top, vis_h as f32, height, asset_h);
    let region = imageops::crop_imm(asset, src_x, src_y, src_w, src_h).to_image();
    let resized = imageops::resize(&region, vis_w, vis_h, FilterType::Triangle);
    imageops::overlay(image, &resized, vis_left as i64, vis_top as i64);
}

/// Source pixels backing `visible` destination pixels that start `offset`
/// pixels into a destination `span` wide. Always at least one pixel.
fn source_span(offset: f32, visible: f32, span: f32, source: u32) -> (u32, u32) {
    let ratio = source as f32 / span;
    let start = ((offset * ratio).floor().max(0.0) as u32).min(source - 1);
    let end = (((offset + visible) * ratio).ceil().max(0.0) as u32).clamp(start + 1, source);
    (start, end - start)
}

/// Fill a triangle given in pixel coordinates, sampling pixel centers.
fn fill_triangle(image: &mut RgbaImage, corners: [Point2; 3], color: Rgba<u8>) {
    let [a, b, c] = corners;
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let width = image.width() as i32;
    let height = image.height() as i32;
    let min_x = (a.x.min(b.x).min(c.x).floor() as i32).clamp(0, width);
    let max_x = (a.x.max(b.x).max(c.x).ceil() as i32).clamp(0, width);
    let min_y = (a.y.min(b.y).min(c.y).floor() as i32).clamp(0, height);
    let max_y = (a.y.max(b.y).max(c.y).ceil() as i32).clamp(0, height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                *image.get_pixel_mut(x as u32, y as u32) = color;
            }
        }
    }
}

fn edge(a: Point2, b: Point2, p: Point2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn fill_rect(image: &mut RgbaImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgba<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    if right < 0 || bottom < 0 || left >= width || top >= height {
        return;
    }
    let left = left.clamp(0, width - 1);
    let right = right.clamp(0, width - 1);
    let top = top.clamp(0, height - 1);
    let bottom = bottom.clamp(0, height - 1);

    for y in top..=bottom {
        for x in left..=right {
            blend_pixel(image.get_pixel_mut(x as u32, y as u32), color);
        }
    }
}

fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let alpha = src.0[3] as u32;
    for channel in 0..3 {
        let blended = (src.0[channel] as u32 * alpha + dst.0[channel] as u32 * (255 - alpha)) / 255;
        dst.0[channel] = blended as u8;
    }
    dst.0[3] = dst.0[3].max(src.0[3]);
}

fn draw_label(image: &mut RgbaImage, mut x: i32, y: i32, text: &str, color: Rgba<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if x >= width {
            break;
        }
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let px = x + col;
                        if px >= 0 && px < width {
                            *image.get_pixel_mut(px as u32, py as u32) = color;
                        }
                    }
                }
            }
        }
        x = x.saturating_add(GLYPH_ADVANCE);
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(bits)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use frame_ingest::FrameSource;
    use overlay_geometry::{StrokeStyle, Vector2, map_polygon, tessellate};
    use tag_client::{DetectionClient, DetectionTransport, TransportError, decode_batch};

    use super::*;
    use crate::overlay::{
        assets::{AssetMiss, AssetRef, AssetResolver},
        controller::{CycleOutcome, FrameCycleController, LayoutOptions},
    };

    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    /// Tag 1 is solid red, tag 3 is blue on its left half and red on its
    /// right half. Everything else is unmapped.
    struct RedSquare;

    impl AssetResolver for RedSquare {
        fn resolve(&self, tag_id: i64) -> Result<AssetRef, AssetMiss> {
            match tag_id {
                1 => Ok(AssetRef {
                    name: "red.png".into(),
                    image: Arc::new(RgbaImage::from_pixel(4, 4, Rgba(RED))),
                }),
                3 => Ok(AssetRef {
                    name: "split.png".into(),
                    image: Arc::new(RgbaImage::from_fn(4, 4, |x, _| {
                        if x < 2 { Rgba([0, 0, 255, 255]) } else { Rgba(RED) }
                    })),
                }),
                _ => Err(AssetMiss::Unmapped),
            }
        }
    }

    struct OneFrame(Option<Frame>);

    impl FrameSource for OneFrame {
        fn capture_frame(&mut self) -> Option<Frame> {
            self.0.take()
        }
    }

    /// Results are handed to `finish_cycle` directly, so no request is sent.
    struct NoService;

    impl DetectionTransport for NoService {
        async fn post_image(&self, _png: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::Status {
                url: "test://detect".into(),
                status: 503,
                body: "offline".into(),
            })
        }
    }

    /// Render one detection batch onto a black 100x100 frame.
    fn render_batch(json: &str) -> (CycleOutcome, RgbaImage) {
        let mut ctrl = FrameCycleController::new(
            OneFrame(Some(Frame::filled(100, 100, BLACK))),
            DetectionClient::new(NoService),
            RedSquare,
            RasterSurface::new(None),
            StrokeStyle::default(),
            LayoutOptions::default(),
        );
        let ticket = ctrl.begin_cycle().unwrap();
        let outcome = ctrl.finish_cycle(ticket, Ok(decode_batch(json.as_bytes()).unwrap()));
        let composed = ctrl.surface().composed().unwrap().clone();
        (outcome, composed)
    }

    fn viewport(size: f32) -> Viewport {
        Viewport {
            frame: Size::new(size, size),
            dest: Size::new(size, size),
            anchor: Anchor::Center,
        }
    }

    #[test]
    fn outline_is_painted_at_detected_corners() {
        let frame = Frame::filled(100, 100, [0, 0, 0, 255]);
        let view = viewport(100.0);
        let corners = [
            Point2::new(10.0, 10.0),
            Point2::new(90.0, 10.0),
            Point2::new(90.0, 90.0),
            Point2::new(10.0, 90.0),
        ];
        let polygon = map_polygon(&corners, Point2::new(50.0, 50.0), view.frame, view.dest, view.anchor);
        let mesh = tessellate(&polygon.closed_loop, &StrokeStyle::default());

        let mut surface = RasterSurface::new(None);
        surface.show_frame(&frame, view);
        surface.draw_outline(&mesh);

        let composed = surface.composed().unwrap();
        assert_eq!(composed.get_pixel(10, 10).0, GREEN);
        assert_eq!(composed.get_pixel(50, 10).0, GREEN);
        assert_eq!(composed.get_pixel(50, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn asset_is_pasted_at_overlay_center() {
        let mut cache = OverlayCache::new();
        cache.place(1, Point2::ORIGIN, Vector2::new(20.0, 20.0), &RedSquare);

        let mut surface = RasterSurface::new(None);
        surface.show_frame(&Frame::filled(64, 64, [0, 0, 0, 255]), viewport(64.0));
        surface.show_overlays(&cache);

        let composed = surface.composed().unwrap();
        assert_eq!(composed.get_pixel(32, 32).0, [255, 0, 0, 255]);
        assert_eq!(composed.get_pixel(2, 60).0, [0, 0, 0, 255]);
    }

    #[test]
    fn new_frame_drops_previous_outline_and_overlays() {
        let mut cache = OverlayCache::new();
        cache.place(1, Point2::ORIGIN, Vector2::new(20.0, 20.0), &RedSquare);
        let mesh = tessellate(
            &[Point2::new(-10.0, 0.0), Point2::new(10.0, 0.0)],
            &StrokeStyle::default(),
        );

        let mut surface = RasterSurface::new(None);
        surface.show_frame(&Frame::filled(64, 64, [0, 0, 0, 255]), viewport(64.0));
        surface.draw_outline(&mesh);
        surface.show_overlays(&cache);
        surface.show_frame(&Frame::filled(64, 64, [7, 7, 7, 255]), viewport(64.0));

        let composed = surface.composed().unwrap();
        assert!(composed.pixels().all(|p| p.0 == [7, 7, 7, 255]));
    }

    #[test]
    fn writes_png_when_output_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.png");
        let mut surface = RasterSurface::new(Some(path.clone()));
        surface.show_frame(&Frame::filled(8, 8, [1, 2, 3, 255]), viewport(8.0));

        let written = image::open(&path).unwrap().into_rgba8();
        assert_eq!(written.dimensions(), (8, 8));
    }

    #[test]
    fn every_caption_character_has_a_glyph() {
        for text in [
            "Detected Tag ID: 42",
            "No image mapped for Tag ID: -7",
            "Image mapping exists but failed to load asset for Tag ID 3 at: TagImages/cat_2.png",
        ] {
            for ch in text.chars().flat_map(|c| c.to_uppercase()) {
                assert!(glyph_bits(ch).is_some(), "missing glyph for {ch:?}");
            }
        }
    }

    #[test]
    fn oversized_asset_is_clipped_to_the_frame() {
        let (outcome, composed) = render_batch(
            r#"{"detections":[{"id":1,"center":{"x":50,"y":50},
            "corners":[{"x":0,"y":0},{"x":1e12,"y":0},{"x":1e12,"y":1e12},{"x":0,"y":1e12}]}]}"#,
        );
        assert!(matches!(outcome, CycleOutcome::Rendered { tags: 1 }));
        assert_eq!(composed.dimensions(), (100, 100));
        assert_eq!(composed.get_pixel(50, 50).0, RED);
    }

    #[test]
    fn overlay_centered_far_off_frame_is_skipped() {
        let (outcome, composed) = render_batch(
            r#"{"detections":[{"id":2,"center":{"x":1e12,"y":50},
            "corners":[{"x":45,"y":45},{"x":55,"y":45},{"x":55,"y":55},{"x":45,"y":55}]}]}"#,
        );
        assert!(matches!(outcome, CycleOutcome::Rendered { tags: 1 }));
        assert_eq!(composed.get_pixel(99, 40).0, BLACK);
        assert_eq!(composed.get_pixel(0, 0).0, BLACK);
    }

    #[test]
    fn partly_visible_asset_keeps_its_visible_half() {
        let mut cache = OverlayCache::new();
        cache.place(3, Point2::new(-32.0, 0.0), Vector2::new(20.0, 20.0), &RedSquare);

        let mut surface = RasterSurface::new(None);
        surface.show_frame(&Frame::filled(64, 64, BLACK), viewport(64.0));
        surface.show_overlays(&cache);

        let composed = surface.composed().unwrap();
        assert_eq!(composed.get_pixel(2, 32).0, RED);
        assert_eq!(composed.get_pixel(8, 32).0, RED);
        assert_eq!(composed.get_pixel(15, 32).0, BLACK);
    }
}
