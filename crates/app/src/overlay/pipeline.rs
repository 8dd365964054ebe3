//! Run loop wiring the file source, detection client, asset resolver and
//! raster surface into a frame cycle controller.

use std::sync::{
    Arc, Once,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result, bail};
use frame_ingest::ImageFileSource;
use tag_client::{DetectionClient, HttpTransport};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::overlay::{
    assets::MappedAssetResolver,
    config::{OverlayConfig, PingArgs, TelemetryOptions},
    controller::{CycleOutcome, FrameCycleController},
    surface::RasterSurface,
    telemetry,
};

/// Run frame cycles until Ctrl+C or the configured cycle count.
pub(crate) fn run(config: OverlayConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let _telemetry_guard = telemetry::enter_runtime(&config.telemetry, config.verbose);
    if config.telemetry.render_metrics {
        let _ = telemetry::init_metrics_recorder();
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            handler_shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let resolver = MappedAssetResolver::load(&config.tag_map, &config.asset_dir)
        .context("Failed to load tag image map")?;
    let transport = HttpTransport::new(&config.endpoint, config.timeout)
        .with_context(|| format!("Failed to set up detection client for {}", config.endpoint))?;
    let mut controller = FrameCycleController::new(
        ImageFileSource::new(config.source.clone()),
        DetectionClient::new(transport),
        resolver,
        RasterSurface::new(config.output.clone()),
        config.style.clone(),
        config.layout,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    info!(
        source = %config.source.display(),
        endpoint = %config.endpoint,
        interval_ms = config.interval.as_millis() as u64,
        "Overlay loop started"
    );

    let (cycles, rendered) = runtime.block_on(async {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles: u64 = 0;
        let mut rendered: u64 = 0;
        while !shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            if let CycleOutcome::Rendered { .. } = controller.capture_and_process().await {
                rendered += 1;
            }
            cycles += 1;

            if config.cycles.is_some_and(|limit| cycles >= limit) {
                break;
            }
        }
        (cycles, rendered)
    });

    info!(
        cycles,
        rendered,
        active_tags = controller.cache().len(),
        outline_vertices = controller.outline().vertex_count(),
        "Overlay loop stopped"
    );
    if config.telemetry.render_metrics {
        telemetry::log_metrics_snapshot();
    }
    Ok(())
}

/// Probe the detection service once.
pub(crate) fn run_ping(args: PingArgs) -> Result<()> {
    let _telemetry_guard = telemetry::enter_runtime(&TelemetryOptions::default(), args.verbose);

    let timeout = std::time::Duration::from_millis(args.timeout_ms);
    let transport = HttpTransport::new(&args.endpoint, timeout)
        .with_context(|| format!("Failed to set up detection client for {}", args.endpoint))?;
    let client = DetectionClient::new(transport);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;
    let alive = runtime
        .block_on(client.ping())
        .with_context(|| format!("Detection service at {} unreachable", args.endpoint))?;

    if !alive {
        bail!("Detection service at {} did not answer the ping", args.endpoint);
    }
    info!(endpoint = %args.endpoint, "Detection service is alive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use overlay_geometry::StrokeStyle;

    use super::*;
    use crate::overlay::controller::LayoutOptions;

    fn config(dir: &Path) -> OverlayConfig {
        OverlayConfig {
            source: dir.join("missing.png"),
            endpoint: tag_client::DEFAULT_ENDPOINT.to_string(),
            tag_map: dir.join("map.json"),
            asset_dir: dir.to_path_buf(),
            output: Some(dir.join("out.png")),
            interval: Duration::from_millis(1),
            cycles: Some(2),
            timeout: Duration::from_millis(200),
            style: StrokeStyle::default(),
            layout: LayoutOptions::default(),
            verbose: false,
            telemetry: TelemetryOptions::default(),
        }
    }

    #[test]
    fn loop_stops_after_cycle_limit_without_frames() {
        let dir = tempfile::tempdir().unwrap();
        run(config(dir.path())).unwrap();
        assert!(!dir.path().join("out.png").exists());
    }

    #[test]
    fn invalid_endpoint_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.endpoint = "not a url".into();
        let err = run(config).unwrap_err();
        assert!(format!("{err:#}").contains("not a url"));
    }
}
