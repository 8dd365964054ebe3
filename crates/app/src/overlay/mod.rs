//! Detection-result rendering pipeline for AprilTag overlays.
//!
//! The module is split into focused submodules:
//! - `config`: CLI flags and validated run configuration.
//! - `controller`: Single-active-frame cycle: capture, detect, map, stroke, place.
//! - `cache`: Per-tag overlay visuals in an arena of reusable slots.
//! - `assets`: Tag id to overlay image resolution.
//! - `surface`: Render surface trait and the PNG-writing raster surface.
//! - `pipeline`: Timed run loop and the service liveness probe.
//! - `telemetry`: Tracing subscriber and Prometheus recorder setup.

pub(crate) use config::{OverlayCliArgs, OverlayConfig, PingArgs};
pub(crate) use pipeline::{run, run_ping};

mod assets;
mod cache;
mod config;
mod controller;
mod pipeline;
mod surface;
mod telemetry;
