//! Tracing subscriber and Prometheus recorder setup for the binary.

use std::{path::Path, sync::OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};
use tracing_subscriber::{
    Registry,
    filter::{EnvFilter, filter_fn},
    fmt,
    prelude::*,
};

use crate::overlay::config::TelemetryOptions;

static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Keeps the thread-local subscriber and the chrome trace writer alive.
pub(crate) struct TelemetryGuard {
    _default_guard: tracing::subscriber::DefaultGuard,
    _chrome_guard: Option<tracing_chrome::FlushGuard>,
}

/// Install the global metrics recorder once and return its handle.
///
/// `None` when another recorder was installed first.
pub(crate) fn init_metrics_recorder() -> Option<&'static PrometheusHandle> {
    PROM_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            match metrics::set_global_recorder(recorder) {
                Ok(()) => Some(handle),
                Err(err) => {
                    warn!("Metrics recorder not installed: {err}");
                    None
                }
            }
        })
        .as_ref()
}

/// Log the current Prometheus exposition text.
pub(crate) fn log_metrics_snapshot() {
    if let Some(handle) = PROM_HANDLE.get().and_then(Option::as_ref) {
        handle.run_upkeep();
        info!("Metrics snapshot:\n{}", handle.render());
    }
}

/// Install the tracing subscriber for the current thread.
pub(crate) fn enter_runtime(opts: &TelemetryOptions, verbose: bool) -> TelemetryGuard {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (chrome_layer, chrome_guard) = match opts.chrome_trace_path.as_ref() {
        Some(path) => match build_chrome_layer(path) {
            Ok((layer, guard)) => (Some(layer), Some(guard)),
            Err(err) => {
                eprintln!(
                    "failed to initialise chrome trace writer at {}: {err}",
                    path.display()
                );
                (None, None)
            }
        },
        None => (None, None),
    };
    let chrome_layer = chrome_layer.map(|layer| layer.with_filter(filter_fn(|meta| meta.is_span())));

    let default_guard = tracing::subscriber::set_default(
        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(fmt::time::uptime())
                    .with_filter(env_filter),
            )
            .with(tracing_error::ErrorLayer::default()),
    );

    TelemetryGuard {
        _default_guard: default_guard,
        _chrome_guard: chrome_guard,
    }
}

fn build_chrome_layer(
    path: &Path,
) -> Result<(tracing_chrome::ChromeLayer<Registry>, tracing_chrome::FlushGuard), std::io::Error> {
    let file = std::fs::File::create(path)?;
    let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .writer(file)
        .include_args(true)
        .trace_style(tracing_chrome::TraceStyle::Threaded)
        .build();
    Ok((layer, guard))
}
