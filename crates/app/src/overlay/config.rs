use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use overlay_geometry::{Anchor, MAX_STROKE_VERTICES, Size, StrokeStyle};
use tag_client::DEFAULT_ENDPOINT;

use crate::overlay::{
    assets::{DEFAULT_ASSET_DIR, DEFAULT_TAG_MAP},
    controller::{DEFAULT_OVERLAY_INSET, LayoutOptions},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum AnchorArg {
    /// Origin at the middle of the destination rect.
    #[default]
    Center,
    /// Origin at the bottom-left corner.
    BottomLeft,
}

impl From<AnchorArg> for Anchor {
    fn from(value: AnchorArg) -> Self {
        match value {
            AnchorArg::Center => Anchor::Center,
            AnchorArg::BottomLeft => Anchor::BottomLeft,
        }
    }
}

/// Flags of the `run` subcommand.
#[derive(Clone, Debug, Args)]
pub(crate) struct OverlayCliArgs {
    /// Image file refreshed by the camera grabber.
    #[arg(long)]
    pub(crate) source: PathBuf,
    /// Detection service endpoint.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub(crate) endpoint: String,
    /// JSON file mapping tag ids to overlay images.
    #[arg(long, default_value = DEFAULT_TAG_MAP)]
    pub(crate) tag_map: PathBuf,
    /// Directory holding the overlay images.
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    pub(crate) asset_dir: PathBuf,
    /// Write the annotated frame here after every refresh.
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    #[arg(long, default_value_t = 1000)]
    pub(crate) interval_ms: u64,
    /// Stop after this many cycles.
    #[arg(long)]
    pub(crate) cycles: Option<u64>,
    /// Per-request timeout for the detection service.
    #[arg(long, default_value_t = 5000)]
    pub(crate) timeout_ms: u64,
    /// Outline stroke width in UI units.
    #[arg(long, default_value_t = 5.0)]
    pub(crate) thickness: f32,
    /// Distance between stamped circles along an edge.
    #[arg(long, default_value_t = 5.0)]
    pub(crate) spacing: f32,
    /// Boundary vertices per stamped circle.
    #[arg(long, default_value_t = 12)]
    pub(crate) segments: u32,
    /// Vertex budget shared by all outlines of one cycle.
    #[arg(long, default_value_t = MAX_STROKE_VERTICES)]
    pub(crate) max_vertices: usize,
    /// UI units trimmed from each overlay axis.
    #[arg(long, default_value_t = DEFAULT_OVERLAY_INSET)]
    pub(crate) overlay_inset: f32,
    /// Destination width in UI units (defaults to the frame width).
    #[arg(long, requires = "dest_height")]
    pub(crate) dest_width: Option<f32>,
    /// Destination height in UI units (defaults to the frame height).
    #[arg(long, requires = "dest_width")]
    pub(crate) dest_height: Option<f32>,
    #[arg(long, value_enum, default_value_t = AnchorArg::Center)]
    pub(crate) anchor: AnchorArg,
    #[arg(long)]
    pub(crate) verbose: bool,
    /// Record spans to a Chrome trace file.
    #[arg(long)]
    pub(crate) chrome_trace: Option<PathBuf>,
    /// Log Prometheus metrics at shutdown.
    #[arg(long)]
    pub(crate) metrics: bool,
}

/// Flags of the `ping` subcommand.
#[derive(Clone, Debug, Args)]
pub(crate) struct PingArgs {
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub(crate) endpoint: String,
    #[arg(long, default_value_t = 2000)]
    pub(crate) timeout_ms: u64,
    #[arg(long)]
    pub(crate) verbose: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TelemetryOptions {
    pub(crate) chrome_trace_path: Option<PathBuf>,
    pub(crate) render_metrics: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct OverlayConfig {
    pub(crate) source: PathBuf,
    pub(crate) endpoint: String,
    pub(crate) tag_map: PathBuf,
    pub(crate) asset_dir: PathBuf,
    pub(crate) output: Option<PathBuf>,
    pub(crate) interval: Duration,
    pub(crate) cycles: Option<u64>,
    pub(crate) timeout: Duration,
    pub(crate) style: StrokeStyle,
    pub(crate) layout: LayoutOptions,
    pub(crate) verbose: bool,
    pub(crate) telemetry: TelemetryOptions,
}

impl OverlayConfig {
    pub(crate) fn from_cli(args: OverlayCliArgs) -> Result<Self> {
        if !(args.thickness.is_finite() && args.thickness > 0.0) {
            bail!("--thickness must be a positive number");
        }
        if !(args.spacing.is_finite() && args.spacing > 0.0) {
            bail!("--spacing must be a positive number");
        }
        if args.segments < 3 {
            bail!("--segments must be at least 3");
        }
        if args.max_vertices < args.segments as usize + 1 {
            bail!(
                "--max-vertices must allow at least one circle ({} vertices)",
                args.segments + 1
            );
        }
        if !(args.overlay_inset.is_finite() && args.overlay_inset >= 0.0) {
            bail!("--overlay-inset must be zero or positive");
        }
        if args.interval_ms == 0 {
            bail!("--interval-ms must be at least 1");
        }
        if args.timeout_ms == 0 {
            bail!("--timeout-ms must be at least 1");
        }
        if args.cycles == Some(0) {
            bail!("--cycles must be at least 1 when given");
        }

        let dest = match (args.dest_width, args.dest_height) {
            (Some(width), Some(height)) => {
                let size = Size::new(width, height);
                if !size.is_valid() {
                    bail!("--dest-width and --dest-height must be positive");
                }
                Some(size)
            }
            (None, None) => None,
            _ => bail!("--dest-width and --dest-height must be given together"),
        };

        Ok(Self {
            source: args.source,
            endpoint: args.endpoint,
            tag_map: args.tag_map,
            asset_dir: args.asset_dir,
            output: args.output,
            interval: Duration::from_millis(args.interval_ms),
            cycles: args.cycles,
            timeout: Duration::from_millis(args.timeout_ms),
            style: StrokeStyle {
                thickness: args.thickness,
                spacing: args.spacing,
                segments: args.segments,
                max_vertices: args.max_vertices,
                ..StrokeStyle::default()
            },
            layout: LayoutOptions {
                dest,
                anchor: args.anchor.into(),
                overlay_inset: args.overlay_inset,
            },
            verbose: args.verbose,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
                render_metrics: args.metrics,
            },
        })
    }
}
